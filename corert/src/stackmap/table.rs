/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::fmt;

use super::frame::FrameInfo;
use super::parse;

/// One round of xorshift64* — see <https://en.wikipedia.org/wiki/Xorshift>.
fn hash(mut x: u64) -> u64 {
    x ^= x >> 12;
    x ^= x << 25;
    x ^= x >> 27;
    x.wrapping_mul(2685821657736338717)
}

/// A bucket stores its frames as a plain `Vec<FrameInfo>` rather than a linked
/// list of separately-allocated nodes — this keeps the bucket's own entries
/// contiguous at the cost of a linear scan within the bucket. Each `FrameInfo`
/// owns its own `Vec<PointerSlot>`, so a bucket is one allocation per frame plus
/// one for the bucket's vector itself, not a single packed byte run.
#[derive(Default)]
struct Bucket {
    frames: Vec<FrameInfo>,
}

impl Bucket {
    fn insert(&mut self, frame: FrameInfo) {
        self.frames.push(frame);
    }

    fn lookup(&self, ret_addr: u64) -> Option<&FrameInfo> {
        self.frames.iter().find(|f| f.ret_addr == ret_addr)
    }
}

/// A separate-chaining hash table mapping return address to [`FrameInfo`], built
/// once from a stackmap blob and immutable thereafter. Lookups may be performed
/// from any thread without synchronization.
pub struct StatepointTable {
    buckets: Vec<Bucket>,
}

impl StatepointTable {
    /// Parses `blob` as an LLVM Stackmap v3 blob and builds the lookup table.
    /// `load_factor` controls the number of buckets relative to the call-site
    /// count: `num_buckets = ceil(num_callsites / load_factor) + 1`.
    ///
    /// Panics if the blob is malformed (wrong version, an unsupported register,
    /// a derived pointer whose base cannot be found) — see module docs.
    pub fn build(blob: &[u8], load_factor: f32) -> Self {
        assert!(load_factor > 0.0, "load factor must be positive");

        let frames = parse::parse(blob);
        let num_buckets = (frames.len() as f32 / load_factor).ceil() as usize + 1;
        let mut buckets: Vec<Bucket> = (0..num_buckets).map(|_| Bucket::default()).collect();

        for frame in frames {
            let idx = (hash(frame.ret_addr) as usize) % buckets.len();
            buckets[idx].insert(frame);
        }

        Self { buckets }
    }

    /// Looks up the frame for a given post-call return address. A miss at a real
    /// safepoint is a caller bug; the table itself does not judge, it just returns
    /// `None`.
    ///
    /// If a stackmap legitimately contains multiple frames sharing one return
    /// address, only the first one inserted into its bucket is reachable — this
    /// matches the original `StatepointTable_insertKey`/`lookupReturnAddress` pair,
    /// which permits duplicate keys on insert but returns only the first match.
    pub fn lookup(&self, ret_addr: u64) -> Option<&FrameInfo> {
        let idx = (hash(ret_addr) as usize) % self.buckets.len();
        self.buckets[idx].lookup(ret_addr)
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }
}

impl fmt::Display for StatepointTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, bucket) in self.buckets.iter().enumerate() {
            if bucket.frames.is_empty() {
                continue;
            }
            writeln!(f, "--- bucket #{} ---", i)?;
            writeln!(f, "num entries: {}", bucket.frames.len())?;
            for (j, frame) in bucket.frames.iter().enumerate() {
                writeln!(f, "  ** frame #{} **", j)?;
                for line in frame.to_string().lines() {
                    writeln!(f, "    {}", line)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::frame::PointerSlot;

    fn frame(ret_addr: u64) -> FrameInfo {
        FrameInfo {
            ret_addr,
            frame_size: 32,
            slots: vec![PointerSlot { kind: -1, offset: 8 }],
        }
    }

    #[test]
    fn insert_and_lookup_is_associative_on_distinct_keys() {
        let mut buckets: Vec<Bucket> = (0..4).map(|_| Bucket::default()).collect();
        for addr in [0x1000u64, 0x2000, 0x3000, 0x4000] {
            let idx = (hash(addr) as usize) % buckets.len();
            buckets[idx].insert(frame(addr));
        }
        let table = StatepointTable { buckets };
        for addr in [0x1000u64, 0x2000, 0x3000, 0x4000] {
            assert_eq!(table.lookup(addr).unwrap().ret_addr, addr);
        }
        assert!(table.lookup(0x5000).is_none());
    }

    #[test]
    fn duplicate_return_addresses_coexist_but_lookup_returns_first() {
        let mut bucket = Bucket::default();
        bucket.insert(FrameInfo {
            ret_addr: 0x10,
            frame_size: 16,
            slots: vec![],
        });
        bucket.insert(FrameInfo {
            ret_addr: 0x10,
            frame_size: 99,
            slots: vec![],
        });
        assert_eq!(bucket.frames.len(), 2, "both frames are stored");
        assert_eq!(
            bucket.lookup(0x10).unwrap().frame_size,
            16,
            "lookup returns the first match in bucket order"
        );
    }

    #[test]
    fn display_skips_empty_buckets() {
        let mut buckets: Vec<Bucket> = (0..4).map(|_| Bucket::default()).collect();
        buckets[2].insert(frame(0x42));
        let table = StatepointTable { buckets };
        let out = table.to_string();
        assert!(out.contains("bucket #2"));
        assert!(!out.contains("bucket #0"));
    }
}
