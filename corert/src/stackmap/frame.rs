/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::fmt;

/// One live GC root at a safepoint. `kind < 0` marks a base pointer; `kind >= 0`
/// marks a derived pointer whose base is the slot at that index within the same
/// frame. `offset` is the byte offset from the stack pointer at the safepoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointerSlot {
    pub kind: i32,
    pub offset: i32,
}

impl PointerSlot {
    pub fn is_base(self) -> bool {
        self.kind < 0
    }
}

impl fmt::Display for PointerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_base() {
            write!(f, "kind: base ptr, frame offset: {}", self.offset)
        } else {
            write!(
                f,
                "kind: ptr derived from slot #{}, frame offset: {}",
                self.kind, self.offset
            )
        }
    }
}

/// Everything a safepoint needs to find its live GC roots: the call site's return
/// address, the caller's frame size, and the slots carrying base/derived pointers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    pub ret_addr: u64,
    pub frame_size: u64,
    pub slots: Vec<PointerSlot>,
}

impl fmt::Display for FrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "return address: {:#x}", self.ret_addr)?;
        writeln!(f, "frame size: {}", self.frame_size)?;
        writeln!(f, "num live ptrs: {}", self.slots.len())?;
        for (i, slot) in self.slots.iter().enumerate() {
            writeln!(f, "ptr slot #{} {{ {} }}", i, slot)?;
        }
        Ok(())
    }
}
