//! A bitmap is a mutable, bit-packed sequence of booleans, one bit per row of a batch.
#![deny(missing_docs)]
mod arrow;
mod bitops;
mod iter;

use std::fmt::{Debug, Display, Formatter};

use bit_vec::BitVec;
use sieve_error::{SieveResult, sieve_bail};

/// Represents the selected rows of a batch as a bit-packed boolean sequence.
///
/// Unlike an immutable selection mask, a [`Bitmap`] is folded in place: the combinators
/// [`Bitmap::and_with_count`] and [`Bitmap::or_with_count`] mutate the receiver and report how
/// many rows remain undecided, which is what a short-circuiting conjunction needs to detect its
/// fixed point without a second pass over the bits.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Bitmap {
    bits: BitVec,
}

impl Bitmap {
    /// Create a new bitmap where all rows are set.
    pub fn new_set(len: usize) -> Self {
        Self {
            bits: BitVec::from_elem(len, true),
        }
    }

    /// Create a new bitmap where no rows are set.
    pub fn new_unset(len: usize) -> Self {
        Self {
            bits: BitVec::from_elem(len, false),
        }
    }

    /// Create a new bitmap of the given length with the given row indices set.
    ///
    /// ## Panics
    ///
    /// Panics if any index is out of bounds.
    pub fn from_indices(len: usize, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut bitmap = Self::new_unset(len);
        for idx in indices {
            bitmap.set(idx, true);
        }
        bitmap
    }

    /// Returns the number of rows covered by the bitmap (not the number of set rows).
    #[inline]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Returns true if the bitmap covers no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Returns the value of the bit at the given row.
    ///
    /// ## Panics
    ///
    /// Panics if the index is out of bounds.
    #[inline]
    pub fn value(&self, idx: usize) -> bool {
        assert!(
            idx < self.len(),
            "index {idx} out of bounds for bitmap of length {}",
            self.len()
        );
        self.bits[idx]
    }

    /// Returns the value of the bit at the given row, or `None` if out of bounds.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<bool> {
        self.bits.get(idx)
    }

    /// Sets the bit at the given row.
    ///
    /// ## Panics
    ///
    /// Panics if the index is out of bounds.
    #[inline]
    pub fn set(&mut self, idx: usize, value: bool) {
        self.bits.set(idx, value);
    }

    /// Get the number of set rows.
    pub fn true_count(&self) -> usize {
        // BitVec keeps the unused tail of its last block zeroed, so a popcount over the storage
        // is exact.
        self.bits
            .storage()
            .iter()
            .map(|block| block.count_ones() as usize)
            .sum()
    }

    /// Get the number of unset rows.
    pub fn false_count(&self) -> usize {
        self.len() - self.true_count()
    }

    /// Returns true if every row is set. An empty bitmap is trivially all true.
    pub fn all_true(&self) -> bool {
        self.bits.all()
    }

    /// Returns true if no row is set.
    pub fn all_false(&self) -> bool {
        self.bits.none()
    }

    /// Return the fraction of rows that are set.
    pub fn density(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.true_count() as f64 / self.len() as f64
    }

    /// Appends the rows of `other` to the end of this bitmap.
    pub fn append(&mut self, other: &Bitmap) {
        self.bits.extend(other.bits.iter());
    }

    /// Returns a new bitmap covering `len` rows starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> SieveResult<Self> {
        if offset + len > self.len() {
            sieve_bail!(OutOfBounds: offset + len, 0, self.len());
        }
        Ok(self.bits.iter().skip(offset).take(len).collect())
    }
}

impl Debug for Bitmap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bitmap({self})")
    }
}

impl Display for Bitmap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for bit in self.bits.iter() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromIterator<bool> for Bitmap {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        Self {
            bits: BitVec::from_iter(iter),
        }
    }
}

impl From<Vec<bool>> for Bitmap {
    fn from(value: Vec<bool>) -> Self {
        Self::from_iter(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bitmap_all_set() {
        let bitmap = Bitmap::new_set(5);
        assert_eq!(bitmap.len(), 5);
        assert_eq!(bitmap.true_count(), 5);
        assert_eq!(bitmap.false_count(), 0);
        assert_eq!(bitmap.density(), 1.0);
        assert!(bitmap.all_true());
        assert!(!bitmap.all_false());
    }

    #[test]
    fn bitmap_all_unset() {
        let bitmap = Bitmap::new_unset(5);
        assert_eq!(bitmap.len(), 5);
        assert_eq!(bitmap.true_count(), 0);
        assert_eq!(bitmap.density(), 0.0);
        assert!(bitmap.all_false());
        assert!(!bitmap.all_true());
    }

    #[test]
    fn bitmap_from() {
        let bitmaps = [
            Bitmap::from_indices(5, [0, 2, 3]),
            Bitmap::from_iter([true, false, true, true, false]),
            Bitmap::from(vec![true, false, true, true, false]),
        ];

        for bitmap in &bitmaps {
            assert_eq!(bitmap.len(), 5);
            assert_eq!(bitmap.true_count(), 3);
            assert_eq!(bitmap.density(), 0.6);
            assert_eq!(bitmap.to_string(), "10110");
        }
    }

    #[test]
    fn set_and_read_back() {
        let mut bitmap = Bitmap::new_unset(70);
        bitmap.set(0, true);
        bitmap.set(69, true);
        assert!(bitmap.value(0));
        assert!(!bitmap.value(35));
        assert!(bitmap.value(69));
        assert_eq!(bitmap.get(70), None);
        assert_eq!(bitmap.true_count(), 2);
    }

    #[test]
    #[should_panic]
    fn value_out_of_bounds() {
        Bitmap::new_set(3).value(3);
    }

    #[test]
    fn append_and_slice() {
        let mut bitmap = Bitmap::from_iter([true, false]);
        bitmap.append(&Bitmap::from_iter([false, true, true]));
        assert_eq!(bitmap.to_string(), "10011");
        assert_eq!(bitmap.slice(1, 3).unwrap().to_string(), "001");
        assert!(bitmap.slice(3, 3).is_err());
    }

    #[test]
    fn empty_bitmap() {
        let bitmap = Bitmap::default();
        assert!(bitmap.is_empty());
        assert_eq!(bitmap.density(), 0.0);
        assert!(bitmap.all_true());
        assert!(bitmap.all_false());
    }
}
