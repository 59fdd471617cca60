/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! NaN-boxed 64-bit tagged value representation.
//!
//! The encoding makes use of unused NaN space in the IEEE754 representation. Any value
//! with the top 13 bits set represents a QNaN (with the sign bit set). QNaN values
//! can encode a 51-bit payload. We only make use of the low 49 bits; the top 15 bits
//! being all set to 1 is the indicator that a value is not a double.
//!
//! The top 15 bits denote the type of the encoded value:
//!
//! ```text
//!     Pointer {  0000:PPPP:PPPP:PPPP
//!              / 0002:****:****:****
//!     Double  {         ...
//!              \ FFFC:****:****:****
//!     Integer {  FFFE:0000:IIII:IIII
//! ```
//!
//! Double-precision values are encoded by a 64-bit integer addition of
//! `DOUBLE_ENCODE_OFFSET` (`2^49`). After this manipulation no encoded double begins
//! with the pattern `0x0000` or `0xFFFE`, which keeps the Int32 and Double classes
//! disjoint. 32-bit signed integers are marked with the 16-bit tag `0xFFFE`.
//!
//! The tag `0x0000` denotes a pointer, or another form of tagged immediate. Boolean,
//! null and undefined values are represented by specific, invalid pointer values:
//!
//! ```text
//!     False:     0x06
//!     True:      0x07
//!     Undefined: 0x0a
//!     Null:      0x02
//! ```
//!
//! No valid `Value` has the bit pattern `0x0`; this is `Empty`, used to represent
//! holes in container code. `0x4` is `Deleted`, used by hash-table code.

use std::fmt;
use std::ptr::NonNull;

/// An unforgeable handle to a heap cell. Cell contents, layout and allocation are
/// owned by the broader runtime; this core never dereferences the pointer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(transparent)]
pub struct CellHandle(NonNull<()>);

impl CellHandle {
    /// # Safety
    /// `ptr` must be a live pointer to a heap cell managed by the surrounding runtime,
    /// and must not collide with any of the immediate bit patterns documented above.
    pub unsafe fn from_raw(ptr: NonNull<()>) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(self) -> *mut () {
        self.0.as_ptr()
    }
}

#[derive(Clone, Copy)]
#[repr(C)]
union EncodedValueDescriptor {
    as_int64: i64,
    ptr: *mut (),
}

/// A single NaN-boxed 64-bit word encoding an int32, a double, a boolean, null,
/// undefined, or a cell pointer.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct Value(EncodedValueDescriptor);

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.raw() == other.raw()
    }
}
impl Eq for Value {}

macro_rules! numeric_binop {
    ($name:ident, $slow:ident, $op:tt) => {
        #[inline]
        pub fn $name<S: SlowPath>(self, other: Self) -> Self {
            if self.is_number() && other.is_number() {
                Value::double(self.to_double::<S>() $op other.to_double::<S>())
            } else {
                S::$slow(self, other)
            }
        }
    };
}

macro_rules! numeric_cmp {
    ($name:ident, $slow:ident, $op:tt) => {
        #[inline]
        pub fn $name<S: SlowPath>(self, other: Self) -> Self {
            if self.is_number() && other.is_number() {
                Value::boolean(self.to_double::<S>() $op other.to_double::<S>())
            } else {
                S::$slow(self, other)
            }
        }
    };
}

impl Value {
    pub const DOUBLE_ENCODE_OFFSET_BIT: u32 = 49;
    pub const DOUBLE_ENCODE_OFFSET: i64 = 1i64 << Self::DOUBLE_ENCODE_OFFSET_BIT;
    pub const NUMBER_TAG: i64 = 0xfffe_0000_0000_0000u64 as i64;

    pub const OTHER_TAG: i64 = 0x2;
    pub const BOOL_TAG: i64 = 0x4;
    pub const UNDEFINED_TAG: i64 = 0x8;

    pub const VALUE_FALSE: i64 = Self::OTHER_TAG | Self::BOOL_TAG;
    pub const VALUE_TRUE: i64 = Self::OTHER_TAG | Self::BOOL_TAG | 1;
    pub const VALUE_UNDEFINED: i64 = Self::OTHER_TAG | Self::UNDEFINED_TAG;
    pub const VALUE_NULL: i64 = Self::OTHER_TAG;

    pub const NOT_CELL_MASK: i64 = Self::NUMBER_TAG | Self::OTHER_TAG;

    /// Never surfaced to arithmetic; used by container code for holes.
    pub const VALUE_EMPTY: i64 = 0x0;
    /// Never surfaced to arithmetic; used by hash-table code for tombstones.
    pub const VALUE_DELETED: i64 = 0x4;

    #[inline]
    fn from_raw(bits: i64) -> Self {
        Self(EncodedValueDescriptor { as_int64: bits })
    }

    #[inline]
    fn raw(self) -> i64 {
        unsafe { self.0.as_int64 }
    }

    #[inline]
    pub fn empty() -> Self {
        Self::from_raw(Self::VALUE_EMPTY)
    }

    #[inline]
    pub fn deleted() -> Self {
        Self::from_raw(Self::VALUE_DELETED)
    }

    #[inline]
    pub fn undefined() -> Self {
        Self::from_raw(Self::VALUE_UNDEFINED)
    }

    #[inline]
    pub fn null() -> Self {
        Self::from_raw(Self::VALUE_NULL)
    }

    #[inline]
    pub fn boolean(x: bool) -> Self {
        Self::from_raw(if x { Self::VALUE_TRUE } else { Self::VALUE_FALSE })
    }

    #[inline]
    pub fn int32(x: i32) -> Self {
        Self::from_raw(Self::NUMBER_TAG | (x as u32 as i64))
    }

    /// Encodes a double, purifying it first so that a NaN produced by an external
    /// math routine (e.g. `sin(-inf)`) can never collide with the Int32 tag space —
    /// see `wtf_rs::pure_nan`.
    #[inline]
    pub fn double(x: f64) -> Self {
        let x = wtf_rs::pure_nan::purify_nan(x);
        Self::from_raw((x.to_bits() as i64).wrapping_add(Self::DOUBLE_ENCODE_OFFSET))
    }

    #[inline]
    pub fn cell(handle: CellHandle) -> Self {
        Self(EncodedValueDescriptor {
            ptr: handle.as_ptr(),
        })
    }

    // ---- predicates -----------------------------------------------------

    #[inline]
    pub fn is_empty(self) -> bool {
        self.raw() == Self::VALUE_EMPTY
    }

    #[inline]
    pub fn is_int32(self) -> bool {
        (self.raw() & Self::NUMBER_TAG) == Self::NUMBER_TAG
    }

    #[inline]
    pub fn is_number(self) -> bool {
        (self.raw() & Self::NUMBER_TAG) != 0
    }

    #[inline]
    pub fn is_double(self) -> bool {
        self.is_number() && !self.is_int32()
    }

    #[inline]
    pub fn is_bool(self) -> bool {
        (self.raw() & !1) == Self::VALUE_FALSE
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.raw() == Self::VALUE_NULL
    }

    #[inline]
    pub fn is_undefined(self) -> bool {
        self.raw() == Self::VALUE_UNDEFINED
    }

    #[inline]
    pub fn is_null_or_undefined(self) -> bool {
        (self.raw() & !Self::UNDEFINED_TAG) == Self::VALUE_NULL
    }

    #[inline]
    pub fn is_cell(self) -> bool {
        (self.raw() & Self::NOT_CELL_MASK) == 0
    }

    // ---- conversions ------------------------------------------------------

    #[inline]
    pub fn as_int32(self) -> i32 {
        debug_assert!(self.is_int32());
        self.raw() as i32
    }

    #[inline]
    pub fn as_double(self) -> f64 {
        debug_assert!(self.is_double());
        f64::from_bits((self.raw().wrapping_sub(Self::DOUBLE_ENCODE_OFFSET)) as u64)
    }

    #[inline]
    pub fn as_bool(self) -> bool {
        debug_assert!(self.is_bool());
        self.raw() == Self::VALUE_TRUE
    }

    #[inline]
    pub fn as_cell(self) -> CellHandle {
        debug_assert!(self.is_cell());
        unsafe { CellHandle::from_raw(NonNull::new_unchecked(self.0.ptr)) }
    }

    /// Converts to a double, following the hosted language's coercion rules on the
    /// fast path and handing off to [`SlowPath::to_double`] for cells.
    pub fn to_double<S: SlowPath>(self) -> f64 {
        if self.is_int32() {
            self.as_int32() as f64
        } else if self.is_double() {
            self.as_double()
        } else if self.is_bool() {
            if self.as_bool() {
                1.0
            } else {
                0.0
            }
        } else if self.is_null() {
            0.0
        } else if self.is_undefined() {
            f64::NAN
        } else {
            S::to_double(self)
        }
    }

    // ---- arithmetic fast paths ---------------------------------------------

    numeric_binop!(add, add, +);
    numeric_binop!(sub, sub, -);
    numeric_binop!(mul, mul, *);
    numeric_binop!(div, div, /);

    /// IEEE remainder with the sign of the dividend, i.e. `fmod`, not integer `%`.
    #[inline]
    pub fn rem<S: SlowPath>(self, other: Self) -> Self {
        if self.is_number() && other.is_number() {
            Value::double(self.to_double::<S>() % other.to_double::<S>())
        } else {
            S::rem(self, other)
        }
    }

    /// No fast path: shifts require int32 coercion, which is the hosted language's
    /// concern.
    #[inline]
    pub fn lsh<S: SlowPath>(self, other: Self) -> Self {
        S::lsh(self, other)
    }

    #[inline]
    pub fn rsh<S: SlowPath>(self, other: Self) -> Self {
        S::rsh(self, other)
    }

    #[inline]
    pub fn neg<S: SlowPath>(self) -> Self {
        if self.is_number() {
            Value::double(-self.to_double::<S>())
        } else {
            S::neg(self)
        }
    }

    #[inline]
    pub fn not<S: SlowPath>(self) -> Self {
        S::not(self)
    }

    // ---- comparisons --------------------------------------------------------

    #[inline]
    pub fn eq<S: SlowPath>(self, other: Self) -> Self {
        if self.is_number() && other.is_number() {
            Value::boolean(self.to_double::<S>() == other.to_double::<S>())
        } else if self.is_bool() && other.is_bool() {
            Value::boolean(self.to_double::<S>() == other.to_double::<S>())
        } else {
            S::eq(self, other)
        }
    }

    #[inline]
    pub fn neq<S: SlowPath>(self, other: Self) -> Self {
        if self.is_number() && other.is_number() {
            Value::boolean(self.to_double::<S>() != other.to_double::<S>())
        } else if self.is_bool() && other.is_bool() {
            Value::boolean(self.to_double::<S>() != other.to_double::<S>())
        } else {
            S::neq(self, other)
        }
    }

    numeric_cmp!(lt, lt, <);
    numeric_cmp!(lte, lte, <=);
    numeric_cmp!(gt, gt, >);
    numeric_cmp!(gte, gte, >=);
}

/// The slow-path collaborator supplied by the hosted runtime: full coercion rules
/// (object-to-primitive, string concatenation, etc.) for everything outside the
/// numeric fast path. Free to allocate; this core never calls it on the hot path.
pub trait SlowPath {
    fn add(x: Value, y: Value) -> Value;
    fn sub(x: Value, y: Value) -> Value;
    fn mul(x: Value, y: Value) -> Value;
    fn div(x: Value, y: Value) -> Value;
    fn rem(x: Value, y: Value) -> Value;
    fn lsh(x: Value, y: Value) -> Value;
    fn rsh(x: Value, y: Value) -> Value;
    fn eq(x: Value, y: Value) -> Value;
    fn neq(x: Value, y: Value) -> Value;
    fn lt(x: Value, y: Value) -> Value;
    fn lte(x: Value, y: Value) -> Value;
    fn gt(x: Value, y: Value) -> Value;
    fn gte(x: Value, y: Value) -> Value;
    fn not(x: Value) -> Value;
    fn neg(x: Value) -> Value;
    fn to_double(x: Value) -> f64;
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "<empty>")
        } else if self.raw() == Self::VALUE_DELETED {
            write!(f, "<deleted>")
        } else if self.is_int32() {
            write!(f, "Int32({})", self.as_int32())
        } else if self.is_double() {
            write!(f, "Double({})", self.as_double())
        } else if self.is_bool() {
            write!(f, "Bool({})", self.as_bool())
        } else if self.is_null() {
            write!(f, "Null")
        } else if self.is_undefined() {
            write!(f, "Undefined")
        } else {
            write!(f, "Cell({:p})", unsafe { self.0.ptr })
        }
    }
}
