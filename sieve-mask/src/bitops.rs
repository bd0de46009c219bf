use std::ops::{BitAnd, BitOr, Not};

use sieve_error::{SieveResult, sieve_bail, sieve_panic};

use crate::Bitmap;

impl Bitmap {
    /// Intersects `other` into this bitmap in place and returns the number of rows left set.
    ///
    /// The receiver is left untouched if the lengths differ.
    pub fn and_with_count(&mut self, other: &Bitmap) -> SieveResult<usize> {
        if self.len() != other.len() {
            sieve_bail!(LengthMismatch: self.len(), other.len());
        }
        self.bits.and(&other.bits);
        Ok(self.true_count())
    }

    /// Unions `other` into this bitmap in place and returns the number of rows left *unset*.
    ///
    /// The unset count is the number of rows a disjunction has not yet proven true, so zero means
    /// no further operand can change the result.
    ///
    /// The receiver is left untouched if the lengths differ.
    pub fn or_with_count(&mut self, other: &Bitmap) -> SieveResult<usize> {
        if self.len() != other.len() {
            sieve_bail!(LengthMismatch: self.len(), other.len());
        }
        self.bits.or(&other.bits);
        Ok(self.false_count())
    }

    /// Negates every row in place.
    pub fn flip(&mut self) {
        self.bits.negate();
    }

    /// Returns a negated copy of this bitmap.
    pub fn flipped(&self) -> Bitmap {
        let mut flipped = self.clone();
        flipped.flip();
        flipped
    }
}

impl BitAnd for &Bitmap {
    type Output = Bitmap;

    fn bitand(self, rhs: Self) -> Self::Output {
        if self.len() != rhs.len() {
            sieve_panic!("Bitmaps must have the same length");
        }

        if self.all_true() {
            return rhs.clone();
        }
        if rhs.all_true() {
            return self.clone();
        }

        let mut result = self.clone();
        result.bits.and(&rhs.bits);
        result
    }
}

impl BitOr for &Bitmap {
    type Output = Bitmap;

    fn bitor(self, rhs: Self) -> Self::Output {
        if self.len() != rhs.len() {
            sieve_panic!("Bitmaps must have the same length");
        }

        let mut result = self.clone();
        result.bits.or(&rhs.bits);
        result
    }
}

impl Not for &Bitmap {
    type Output = Bitmap;

    fn not(self) -> Self::Output {
        self.flipped()
    }
}
