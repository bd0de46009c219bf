use arrow_array::{Array, BooleanArray};
use arrow_buffer::BooleanBuffer;

use crate::Bitmap;

impl Bitmap {
    /// Create a bitmap from a boolean array, treating null rows as unset.
    pub fn from_boolean_array(array: &BooleanArray) -> Self {
        match array.nulls() {
            None => Self::from(array.values()),
            Some(nulls) => Self::from(&(array.values() & nulls.inner())),
        }
    }

    /// Return an Arrow [`BooleanBuffer`] with the same bits.
    pub fn to_boolean_buffer(&self) -> BooleanBuffer {
        BooleanBuffer::from_iter(self.iter())
    }

    /// Return a non-nullable Arrow [`BooleanArray`] with the same bits.
    pub fn to_boolean_array(&self) -> BooleanArray {
        BooleanArray::new(self.to_boolean_buffer(), None)
    }
}

impl From<&BooleanBuffer> for Bitmap {
    fn from(value: &BooleanBuffer) -> Self {
        value.iter().collect()
    }
}

impl From<BooleanBuffer> for Bitmap {
    fn from(value: BooleanBuffer) -> Self {
        Self::from(&value)
    }
}
