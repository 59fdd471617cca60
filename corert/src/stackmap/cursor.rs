/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A bounds-checked little-endian cursor over the stackmap blob. The original C
//! walks a raw pointer with no bounds checking at all; a truncated buffer is
//! undefined behavior there. This is the safe-Rust equivalent of that walk: a
//! short read is just as fatal, but it fails with a diagnostic instead of reading
//! past the end of the mapping.

use std::convert::TryInto;

pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

macro_rules! read_le {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self) -> $ty {
            const N: usize = std::mem::size_of::<$ty>();
            let bytes: [u8; N] = self.take(N).try_into().unwrap();
            <$ty>::from_le_bytes(bytes)
        }
    };
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> &'a [u8] {
        if self.pos + n > self.data.len() {
            eprintln!(
                "(corert) error: stackmap blob truncated (wanted {} bytes at offset {}, have {})",
                n,
                self.pos,
                self.data.len()
            );
            panic!("(corert) malformed stackmap: truncated blob");
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        slice
    }

    read_le!(u8, u8);
    read_le!(u16, u16);
    read_le!(u32, u32);
    read_le!(u64, u64);
    read_le!(i32, i32);

    pub fn skip(&mut self, n: usize) {
        self.take(n);
    }

    /// Aligns the cursor up to the next 8-byte boundary.
    pub fn align8(&mut self) {
        self.pos = (self.pos + 7) & !0x7;
    }
}
