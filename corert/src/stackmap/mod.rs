/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Parses the stackmap blob emitted by an LLVM-style precise-GC toolchain
//! (LLVM Stackmap v3) into a [`StatepointTable`] keyed by return address.
//!
//! See <http://llvm.org/docs/StackMaps.html#stack-map-format>.

mod cursor;
mod frame;
mod parse;
mod table;

pub use frame::{FrameInfo, PointerSlot};
pub use table::StatepointTable;
