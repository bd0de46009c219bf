use std::sync::Arc;

use arrow_array::{Array, ArrayRef, BooleanArray};
use arrow_schema::DataType;
use sieve_error::{SieveResult, sieve_err};
use sieve_mask::Bitmap;

/// The result of evaluating an expression over one batch.
///
/// Boolean results are kept as a mutable [`Bitmap`] so a conjunction can fold them in place; any
/// other column values are carried as Arrow arrays.
#[derive(Debug, Clone)]
pub enum ColumnVector {
    Bitmap(Bitmap),
    Array(ArrayRef),
}

impl ColumnVector {
    pub fn len(&self) -> usize {
        match self {
            Self::Bitmap(bitmap) => bitmap.len(),
            Self::Array(array) => array.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Bitmap(_) => DataType::Boolean,
            Self::Array(array) => array.data_type().clone(),
        }
    }

    pub fn as_bitmap(&self) -> SieveResult<&Bitmap> {
        match self {
            Self::Bitmap(bitmap) => Ok(bitmap),
            Self::Array(array) => Err(sieve_err!(MismatchedTypes: "bitmap", array.data_type())),
        }
    }

    pub fn as_bitmap_mut(&mut self) -> SieveResult<&mut Bitmap> {
        match self {
            Self::Bitmap(bitmap) => Ok(bitmap),
            Self::Array(array) => Err(sieve_err!(MismatchedTypes: "bitmap", array.data_type())),
        }
    }

    /// Consumes the vector, returning its bitmap.
    ///
    /// A boolean Arrow array is converted with nulls treated as unset.
    pub fn into_bitmap(self) -> SieveResult<Bitmap> {
        match self {
            Self::Bitmap(bitmap) => Ok(bitmap),
            Self::Array(array) => match array.as_any().downcast_ref::<BooleanArray>() {
                Some(bools) => Ok(Bitmap::from_boolean_array(bools)),
                None => Err(sieve_err!(MismatchedTypes: "bitmap", array.data_type())),
            },
        }
    }

    pub fn into_array(self) -> ArrayRef {
        match self {
            Self::Bitmap(bitmap) => Arc::new(bitmap.to_boolean_array()),
            Self::Array(array) => array,
        }
    }
}

impl From<Bitmap> for ColumnVector {
    fn from(value: Bitmap) -> Self {
        Self::Bitmap(value)
    }
}

impl From<ArrayRef> for ColumnVector {
    fn from(value: ArrayRef) -> Self {
        Self::Array(value)
    }
}

#[cfg(test)]
mod tests {
    use arrow_array::Int32Array;

    use super::*;

    #[test]
    fn bitmap_vector() {
        let mut vector = ColumnVector::from(Bitmap::from_indices(4, [1, 2]));
        assert_eq!(vector.len(), 4);
        assert_eq!(vector.data_type(), DataType::Boolean);
        vector.as_bitmap_mut().unwrap().set(0, true);
        assert_eq!(vector.as_bitmap().unwrap().to_string(), "1110");
        assert_eq!(vector.into_array().len(), 4);
    }

    #[test]
    fn boolean_array_converts_to_bitmap() {
        let array: ArrayRef = Arc::new(BooleanArray::from(vec![Some(true), None, Some(false)]));
        let bitmap = ColumnVector::from(array).into_bitmap().unwrap();
        assert_eq!(bitmap.to_string(), "100");
    }

    #[test]
    fn non_boolean_array_is_not_a_bitmap() {
        let vector = ColumnVector::from(Arc::new(Int32Array::from(vec![1, 2])) as ArrayRef);
        assert_eq!(vector.data_type(), DataType::Int32);
        assert!(vector.as_bitmap().is_err());
        assert!(vector.into_bitmap().is_err());
    }
}
