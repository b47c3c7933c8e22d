//! Hashing primitives shared by the open addressing tables.
//!
//! [`Primitive`] describes the scalar types a table can be keyed by, and a
//! [`Strategy`] decides which keys are considered equal and how they hash.

use core::{cmp::Ordering, fmt};

/// The default number of expected entries of a table.
pub const DEFAULT_INITIAL_SIZE: usize = 16;

/// The default load factor of a table.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// A load factor that trades memory for shorter probe sequences.
pub const FAST_LOAD_FACTOR: f32 = 0.5;

/// A load factor for tables that are read far more often than written.
pub const VERY_FAST_LOAD_FACTOR: f32 = 0.25;

/// The largest table size (number of main slots) a table may grow to.
pub const MAXIMUM_TABLE_SIZE: usize = 1 << 30;

/// A scalar usable as a key or set element.
///
/// # Safety
///
/// The all-zero bit pattern must be a valid value equal to [`Primitive::ZERO`],
/// and [`Primitive::to_bits`] must return zero for that value only. Tables
/// rely on this to treat zero-filled memory as a run of empty slots.
pub unsafe trait Primitive: Copy + fmt::Debug + 'static {
    /// The value whose bit pattern is all zeroes.
    const ZERO: Self;

    /// The raw bit image of the value, widened to 64 bits.
    fn to_bits(self) -> u64;

    /// The conventional 32-bit hash of the value.
    fn hash_code(self) -> u32;

    /// Natural total order of the type.
    fn compare(self, other: Self) -> Ordering;

    #[inline(always)]
    fn is_zero_bits(self) -> bool {
        self.to_bits() == 0
    }

    /// Bit-exact equality.
    #[inline(always)]
    fn bits_eq(self, other: Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

macro_rules! narrow_integer {
    ($($t:ty => $unsigned:ty),* $(,)?) => {$(
        unsafe impl Primitive for $t {
            const ZERO: Self = 0;

            #[inline(always)]
            fn to_bits(self) -> u64 {
                self as $unsigned as u64
            }

            #[inline(always)]
            fn hash_code(self) -> u32 {
                self as i32 as u32
            }

            #[inline(always)]
            fn compare(self, other: Self) -> Ordering {
                self.cmp(&other)
            }
        }
    )*};
}

macro_rules! wide_integer {
    ($($t:ty),* $(,)?) => {$(
        unsafe impl Primitive for $t {
            const ZERO: Self = 0;

            #[inline(always)]
            fn to_bits(self) -> u64 {
                self as u64
            }

            #[inline(always)]
            fn hash_code(self) -> u32 {
                let bits = self as u64;
                (bits ^ (bits >> 32)) as u32
            }

            #[inline(always)]
            fn compare(self, other: Self) -> Ordering {
                self.cmp(&other)
            }
        }
    )*};
}

narrow_integer! {
    i8 => u8,
    i16 => u16,
    i32 => u32,
    u8 => u8,
    u16 => u16,
    u32 => u32,
}

wide_integer!(i64, u64, isize, usize);

unsafe impl Primitive for f64 {
    const ZERO: Self = 0.0;

    #[inline(always)]
    fn to_bits(self) -> u64 {
        f64::to_bits(self)
    }

    #[inline(always)]
    fn hash_code(self) -> u32 {
        let bits = f64::to_bits(self);
        (bits ^ (bits >> 32)) as u32
    }

    #[inline(always)]
    fn compare(self, other: Self) -> Ordering {
        self.total_cmp(&other)
    }
}

unsafe impl Primitive for f32 {
    const ZERO: Self = 0.0;

    #[inline(always)]
    fn to_bits(self) -> u64 {
        u64::from(f32::to_bits(self))
    }

    #[inline(always)]
    fn hash_code(self) -> u32 {
        f32::to_bits(self)
    }

    #[inline(always)]
    fn compare(self, other: Self) -> Ordering {
        self.total_cmp(&other)
    }
}

unsafe impl Primitive for char {
    const ZERO: Self = '\0';

    #[inline(always)]
    fn to_bits(self) -> u64 {
        u64::from(u32::from(self))
    }

    #[inline(always)]
    fn hash_code(self) -> u32 {
        u32::from(self)
    }

    #[inline(always)]
    fn compare(self, other: Self) -> Ordering {
        self.cmp(&other)
    }
}

unsafe impl Primitive for bool {
    const ZERO: Self = false;

    #[inline(always)]
    fn to_bits(self) -> u64 {
        u64::from(self)
    }

    #[inline(always)]
    fn hash_code(self) -> u32 {
        if self {
            1231
        } else {
            1237
        }
    }

    #[inline(always)]
    fn compare(self, other: Self) -> Ordering {
        self.cmp(&other)
    }
}

/// Pluggable equality and hashing for table keys.
///
/// Implementations must be reflexive and consistent: whenever
/// `equals(a, b)` holds, `hash(a) == hash(b)` must hold too.
pub trait Strategy<K> {
    fn hash(&self, key: K) -> u32;
    fn equals(&self, a: K, b: K) -> bool;
}

impl<K, S: Strategy<K> + ?Sized> Strategy<K> for &S {
    #[inline(always)]
    fn hash(&self, key: K) -> u32 {
        S::hash(self, key)
    }

    #[inline(always)]
    fn equals(&self, a: K, b: K) -> bool {
        S::equals(self, a, b)
    }
}

/// Bit-exact equality with the conventional hash of the key type.
///
/// Distinguishes `0.0` from `-0.0`, and treats NaNs as equal only when their
/// bit patterns match.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DefaultStrategy;

impl<K: Primitive> Strategy<K> for DefaultStrategy {
    #[inline(always)]
    fn hash(&self, key: K) -> u32 {
        key.hash_code()
    }

    #[inline(always)]
    fn equals(&self, a: K, b: K) -> bool {
        a.bits_eq(b)
    }
}

/// Numeric equality for floating point keys: `0.0 == -0.0`, and every NaN
/// equals every other NaN.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NumericStrategy;

macro_rules! numeric_strategy {
    ($($t:ty => $nan:expr),* $(,)?) => {$(
        impl Strategy<$t> for NumericStrategy {
            #[inline]
            fn hash(&self, key: $t) -> u32 {
                canonical(key, $nan).hash_code()
            }

            #[inline]
            fn equals(&self, a: $t, b: $t) -> bool {
                canonical(a, $nan).bits_eq(canonical(b, $nan))
            }
        }
    )*};
}

numeric_strategy! {
    f64 => f64::NAN,
    f32 => f32::NAN,
}

#[inline(always)]
fn canonical<F: Primitive + PartialEq>(x: F, nan: F) -> F {
    if x == F::ZERO {
        F::ZERO
    } else if x != x {
        nan
    } else {
        x
    }
}

/// Scrambles a hash code so that poorly distributed inputs (small integers,
/// floats differing in their low mantissa bits) spread over the table.
#[inline(always)]
pub fn mix(x: u32) -> u32 {
    let h = x.wrapping_mul(0x9E37_79B9);
    h ^ (h >> 16)
}

/// The smallest power of two that is at least `x`; `1` for `0`.
#[inline]
pub fn next_power_of_two(x: usize) -> usize {
    x.max(1).next_power_of_two()
}

/// The number of slots needed to hold `expected` entries at load factor `f`,
/// clamped to [`MAXIMUM_TABLE_SIZE`].
pub fn table_size_for(expected: usize, f: f32) -> usize {
    let needed = (expected as f64 / f64::from(f)).ceil();
    if needed >= MAXIMUM_TABLE_SIZE as f64 {
        MAXIMUM_TABLE_SIZE
    } else {
        needed as usize
    }
}

/// The table size needed to hold `expected` entries at load factor `f`, or
/// `None` when it would exceed [`MAXIMUM_TABLE_SIZE`].
pub fn array_size(expected: usize, f: f32) -> Option<usize> {
    let needed = (expected as f64 / f64::from(f)).ceil();
    if needed > MAXIMUM_TABLE_SIZE as f64 {
        return None;
    }
    Some(next_power_of_two(needed as usize).max(2))
}

/// The number of entries a table of size `n` takes before it must grow.
///
/// Always leaves at least one empty slot, which probing relies on.
pub fn max_fill(n: usize, f: f32) -> usize {
    let fill = (n as f64 * f64::from(f)).ceil() as usize;
    fill.min(n - 1)
}
