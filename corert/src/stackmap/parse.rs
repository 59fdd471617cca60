/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use super::cursor::Cursor;
use super::frame::{FrameInfo, PointerSlot};

#[allow(dead_code)]
const LOCATION_REGISTER: u8 = 1;
#[allow(dead_code)]
const LOCATION_DIRECT: u8 = 2;
const LOCATION_INDIRECT: u8 = 3;
const LOCATION_CONSTANT: u8 = 4;
#[allow(dead_code)]
const LOCATION_CONST_INDEX: u8 = 5;

const DWARF_RSP: u16 = 7;
const DWARF_RBP: u16 = 6;

#[derive(Clone, Copy, Debug)]
struct Location {
    kind: u8,
    reg_num: u16,
    offset: i32,
}

struct Function {
    address: u64,
    stack_size: u64,
    callsite_count: u64,
}

fn fatal(msg: &str) -> ! {
    eprintln!("(corert) error: {}", msg);
    panic!("(corert) malformed stackmap: {}", msg);
}

fn read_location(c: &mut Cursor) -> Location {
    let kind = c.u8();
    c.u8(); // reserved
    c.u16(); // locSize
    let reg_num = c.u16();
    c.u16(); // reserved2
    let offset = c.i32();
    Location {
        kind,
        reg_num,
        offset,
    }
}

/// Normalizes a location's offset to be relative to the stack pointer.
fn convert_offset(loc: Location, frame_size: u64) -> i32 {
    match loc.reg_num {
        DWARF_RSP => {
            if loc.offset < 0 {
                fatal("unexpected negative offset relative to rsp");
            }
            loc.offset
        }
        DWARF_RBP => {
            if loc.offset > 0 {
                fatal("unexpected positive offset relative to rbp");
            }
            frame_size as i32 + loc.offset
        }
        _ => fatal("live root location is not relative to rsp or rbp; registers are not supported"),
    }
}

fn is_indirect(loc: Location) -> bool {
    loc.kind == LOCATION_INDIRECT
}

fn is_same_location(a: Location, b: Location) -> bool {
    a.kind == b.kind && a.offset == b.offset && a.reg_num == b.reg_num
}

/// Reads one call-site record's locations and builds its `FrameInfo`, leaving the
/// cursor positioned after the (unconsumed) liveout section.
fn generate_frame_info(c: &mut Cursor, function: &Function, code_offset: u32, mut num_locations: u16) -> FrameInfo {
    let ret_addr = function.address + code_offset as u64;
    let frame_size = function.stack_size;

    let mut locations = Vec::with_capacity(num_locations as usize);
    for _ in 0..num_locations {
        locations.push(read_location(c));
    }

    let mut idx = 0usize;
    for _ in 0..2 {
        if locations[idx].kind != LOCATION_CONSTANT {
            fatal("first 2 locations must be constants in statepoint stackmaps");
        }
        idx += 1;
        num_locations -= 1;
    }

    if locations[idx].kind != LOCATION_CONSTANT {
        fatal("3rd location should be a constant");
    }
    let num_deopt = locations[idx].offset;
    idx += 1;
    num_locations -= 1;
    if num_deopt < 0 {
        fatal("negative deopt parameter count");
    }
    idx += num_deopt as usize;
    num_locations -= num_deopt as u16;

    if num_locations % 2 != 0 {
        fatal("pointer locations must come in (base, derived) pairs");
    }
    let pairs = &locations[idx..idx + num_locations as usize];

    // Pass 1: base-is-derived pairs become base slots, frame-local order.
    let mut slots = Vec::new();
    for pair in pairs.chunks_exact(2) {
        let (base, derived) = (pair[0], pair[1]);
        if !(is_indirect(base) && is_indirect(derived)) {
            #[cfg(debug_assertions)]
            eprintln!(
                "(corert) warning: skipping a root location pair (base kind {}, derived kind {})",
                base.kind, derived.kind
            );
            continue;
        }
        if is_same_location(base, derived) {
            slots.push(PointerSlot {
                kind: -1,
                offset: convert_offset(base, frame_size),
            });
        }
    }
    let num_base_ptrs = slots.len();

    // Pass 2: remaining derived pointers, indexed against the base slots above.
    for pair in pairs.chunks_exact(2) {
        let (base, derived) = (pair[0], pair[1]);
        if !is_indirect(base) {
            continue;
        }
        if is_same_location(base, derived) {
            continue;
        }

        let base_idx = slots[..num_base_ptrs]
            .iter()
            .position(|s| s.offset == convert_offset(base, frame_size))
            .unwrap_or_else(|| fatal("couldn't find base for derived pointer"));

        slots.push(PointerSlot {
            kind: base_idx as i32,
            offset: convert_offset(derived, frame_size),
        });
    }

    FrameInfo {
        ret_addr,
        frame_size,
        slots,
    }
}

/// Skips a call-site record's liveout section (padding, count, entries, re-align).
/// There is no base-pointer information in the liveout section; it is discarded.
fn skip_liveouts(c: &mut Cursor) {
    c.align8();
    c.u16(); // padding
    let num_liveouts = c.u16();
    c.skip(num_liveouts as usize * 4);
    c.align8();
}

/// Parses a complete LLVM Stackmap v3 blob into its per-call-site frames, in
/// stream order (not yet bucketed by return address).
pub fn parse(blob: &[u8]) -> Vec<FrameInfo> {
    let mut c = Cursor::new(blob);

    let version = c.u8();
    if version != 3 {
        fatal("only LLVM stackmap version 3 is supported");
    }
    let reserved0 = c.u8();
    let reserved1 = c.u16();
    if reserved0 != 0 || reserved1 != 0 {
        fatal("expected reserved header fields to be 0");
    }
    let num_functions = c.u32();
    let num_constants = c.u32();
    let num_records = c.u32();

    let mut functions = Vec::with_capacity(num_functions as usize);
    for _ in 0..num_functions {
        functions.push(Function {
            address: c.u64(),
            stack_size: c.u64(),
            callsite_count: c.u64(),
        });
    }

    for _ in 0..num_constants {
        c.u64();
    }

    let mut frames = Vec::with_capacity(num_records as usize);
    let mut fn_idx = 0usize;
    let mut visited = 0u64;
    for _ in 0..num_records {
        while fn_idx + 1 < functions.len() && visited >= functions[fn_idx].callsite_count {
            fn_idx += 1;
            visited = 0;
        }

        c.u64(); // patchpointId
        let code_offset = c.u32();
        c.u16(); // flags
        let num_locations = c.u16();

        let frame = generate_frame_info(&mut c, &functions[fn_idx], code_offset, num_locations);
        skip_liveouts(&mut c);
        frames.push(frame);

        visited += 1;
    }

    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blob {
        bytes: Vec<u8>,
    }

    impl Blob {
        fn new() -> Self {
            Self { bytes: Vec::new() }
        }
        fn u8(mut self, v: u8) -> Self {
            self.bytes.push(v);
            self
        }
        fn u16(mut self, v: u16) -> Self {
            self.bytes.extend_from_slice(&v.to_le_bytes());
            self
        }
        fn u32(mut self, v: u32) -> Self {
            self.bytes.extend_from_slice(&v.to_le_bytes());
            self
        }
        fn u64(mut self, v: u64) -> Self {
            self.bytes.extend_from_slice(&v.to_le_bytes());
            self
        }
        fn i32(mut self, v: i32) -> Self {
            self.bytes.extend_from_slice(&v.to_le_bytes());
            self
        }
        fn align8(mut self) -> Self {
            while self.bytes.len() % 8 != 0 {
                self.bytes.push(0);
            }
            self
        }
        fn location(self, kind: u8, reg_num: u16, offset: i32) -> Self {
            self.u8(kind).u8(0).u16(0).u16(reg_num).u16(0).i32(offset)
        }
    }

    /// One function at 0x1000/stackSize 64 with one call-site at codeOffset 0x20 and
    /// one base-is-derived pointer pair at rsp+8.
    fn single_callsite_blob(extra_pairs: &[(u8, u16, i32, u8, u16, i32)]) -> Vec<u8> {
        let mut b = Blob::new()
            .u8(3)
            .u8(0)
            .u16(0)
            .u32(1) // numFunctions
            .u32(0) // numConstants
            .u32(1) // numRecords
            .u64(0x1000) // function address
            .u64(64) // stackSize
            .u64(1); // callsiteCount

        let num_pair_locations = 2 * (1 + extra_pairs.len()) as u16;
        b = b
            .u64(0) // patchpointId
            .u32(0x20) // codeOffset
            .u16(0) // flags
            .u16(3 + num_pair_locations) // numLocations
            .location(LOCATION_CONSTANT, 0, 0)
            .location(LOCATION_CONSTANT, 0, 0)
            .location(LOCATION_CONSTANT, 0, 0) // numDeopt = 0
            .location(LOCATION_INDIRECT, DWARF_RSP, 8)
            .location(LOCATION_INDIRECT, DWARF_RSP, 8);

        for &(bk, br, bo, dk, dr, doff) in extra_pairs {
            b = b.location(bk, br, bo).location(dk, dr, doff);
        }

        b = b.align8().u16(0).u16(0).align8();
        b.bytes
    }

    #[test]
    fn single_base_pointer_round_trips() {
        let blob = single_callsite_blob(&[]);
        let frames = parse(&blob);
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.ret_addr, 0x1020);
        assert_eq!(frame.frame_size, 64);
        assert_eq!(frame.slots, vec![PointerSlot { kind: -1, offset: 8 }]);
    }

    #[test]
    fn derived_pointer_indexes_its_base() {
        let blob = single_callsite_blob(&[(
            LOCATION_INDIRECT,
            DWARF_RSP,
            8,
            LOCATION_INDIRECT,
            DWARF_RSP,
            16,
        )]);
        let frames = parse(&blob);
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].slots,
            vec![
                PointerSlot { kind: -1, offset: 8 },
                PointerSlot { kind: 0, offset: 16 },
            ]
        );
    }

    #[test]
    #[should_panic(expected = "only LLVM stackmap version 3")]
    fn wrong_version_fails_construction() {
        let mut blob = single_callsite_blob(&[]);
        blob[0] = 2;
        parse(&blob);
    }

    #[test]
    #[should_panic(expected = "couldn't find base for derived pointer")]
    fn unmatched_derived_pointer_fails_construction() {
        let blob = single_callsite_blob(&[(
            LOCATION_INDIRECT,
            DWARF_RSP,
            24, // no base slot at offset 24
            LOCATION_INDIRECT,
            DWARF_RSP,
            32,
        )]);
        parse(&blob);
    }

    #[test]
    fn rbp_relative_offset_converts_to_sp_relative() {
        let mut b = Blob::new()
            .u8(3)
            .u8(0)
            .u16(0)
            .u32(1)
            .u32(0)
            .u32(1)
            .u64(0x1000)
            .u64(64)
            .u64(1)
            .u64(0)
            .u32(0x20)
            .u16(0)
            .u16(5)
            .location(LOCATION_CONSTANT, 0, 0)
            .location(LOCATION_CONSTANT, 0, 0)
            .location(LOCATION_CONSTANT, 0, 0)
            .location(LOCATION_INDIRECT, DWARF_RBP, -24)
            .location(LOCATION_INDIRECT, DWARF_RBP, -24);
        b = b.align8().u16(0).u16(0).align8();

        let frames = parse(&b.bytes);
        assert_eq!(frames[0].slots, vec![PointerSlot { kind: -1, offset: 40 }]);
    }
}
