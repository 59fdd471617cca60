/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::path::PathBuf;
use structopt::*;

use corert::stackmap::StatepointTable;

#[derive(Debug, StructOpt)]
#[structopt(name = "corert", about = "Inspect an LLVM stackmap v3 blob")]
pub struct Options {
    #[structopt(parse(from_os_str), help = "Stackmap blob to load")]
    input: PathBuf,
    #[structopt(long = "load-factor", default_value = "1.0", help = "Table load factor")]
    load_factor: f32,
    #[structopt(long = "lookup", help = "Look up a single return address (hex, e.g. 0x1020)")]
    lookup: Option<String>,
}

fn parse_addr(s: &str) -> u64 {
    let s = s.trim_start_matches("0x");
    u64::from_str_radix(s, 16).unwrap_or_else(|error| {
        eprintln!("(corert) error: invalid return address '{}': {}", s, error);
        std::process::exit(1);
    })
}

fn main() {
    let opts = Options::from_args();

    let file = std::fs::File::open(&opts.input).unwrap_or_else(|error| {
        eprintln!("(corert) error: failed to open '{}': {}", opts.input.display(), error);
        std::process::exit(1);
    });
    let blob = unsafe { memmap2::Mmap::map(&file) }.unwrap_or_else(|error| {
        eprintln!("(corert) error: failed to map '{}': {}", opts.input.display(), error);
        std::process::exit(1);
    });

    let table = StatepointTable::build(&blob, opts.load_factor);

    match opts.lookup {
        Some(addr) => match table.lookup(parse_addr(&addr)) {
            Some(frame) => print!("{}", frame),
            None => {
                eprintln!("(corert) no frame found for return address {}", addr);
                std::process::exit(1);
            }
        },
        None => print!("{}", table),
    }
}
