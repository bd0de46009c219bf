use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use arrow_array::ArrayRef;
use itertools::Itertools;
use sieve_error::{SieveResult, sieve_bail, sieve_err};

use crate::FieldId;

/// A group of rows with one aligned column per field.
///
/// Every column of a batch has exactly [`Batch::row_count`] rows.
#[derive(Debug, Clone)]
pub struct Batch {
    columns: BTreeMap<FieldId, ArrayRef>,
    row_count: usize,
}

impl Batch {
    /// Create a batch from a set of columns, inferring the row count from the first column.
    ///
    /// A batch without columns has zero rows; use [`Batch::try_new_with_row_count`] for a
    /// column-less batch that still covers rows.
    pub fn try_new(columns: impl IntoIterator<Item = (FieldId, ArrayRef)>) -> SieveResult<Self> {
        let columns = columns.into_iter().collect_vec();
        let row_count = columns.first().map(|(_, array)| array.len()).unwrap_or(0);
        Self::try_new_with_row_count(row_count, columns)
    }

    /// Create a batch covering `row_count` rows, checking that every column agrees.
    pub fn try_new_with_row_count(
        row_count: usize,
        columns: impl IntoIterator<Item = (FieldId, ArrayRef)>,
    ) -> SieveResult<Self> {
        let mut by_field = BTreeMap::new();
        for (field, array) in columns {
            if array.len() != row_count {
                sieve_bail!(
                    "column {} has {} rows but the batch has {}",
                    field,
                    array.len(),
                    row_count
                );
            }
            if by_field.insert(field, array).is_some() {
                sieve_bail!("duplicate column {} in batch", field);
            }
        }
        Ok(Self {
            columns: by_field,
            row_count,
        })
    }

    /// Create a batch covering `row_count` rows without any columns.
    pub fn new_empty(row_count: usize) -> Self {
        Self {
            columns: BTreeMap::new(),
            row_count,
        }
    }

    /// Returns this batch with one more column, checking its length and uniqueness.
    pub fn with_column(mut self, field: FieldId, array: ArrayRef) -> SieveResult<Self> {
        if array.len() != self.row_count {
            sieve_bail!(LengthMismatch: self.row_count, array.len());
        }
        if self.columns.contains_key(&field) {
            sieve_bail!("duplicate column {} in batch", field);
        }
        self.columns.insert(field, array);
        Ok(self)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// The fields present in this batch, in ascending id order.
    pub fn fields(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.columns.keys().copied()
    }

    /// Returns the column for `field`.
    pub fn column(&self, field: FieldId) -> SieveResult<&ArrayRef> {
        self.columns
            .get(&field)
            .ok_or_else(|| sieve_err!("batch doesn't contain column {}", field))
    }

    /// Consumes the batch, returning the column for `field`.
    pub fn into_column(mut self, field: FieldId) -> SieveResult<ArrayRef> {
        self.columns
            .remove(&field)
            .ok_or_else(|| sieve_err!("batch doesn't contain column {}", field))
    }

    /// Returns a batch with only the requested fields.
    pub fn project(&self, fields: &[FieldId]) -> SieveResult<Self> {
        let columns = fields
            .iter()
            .map(|&field| Ok((field, self.column(field)?.clone())))
            .collect::<SieveResult<Vec<_>>>()?;
        Self::try_new_with_row_count(self.row_count, columns)
    }

    /// Returns a zero-copy slice of `len` rows starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> SieveResult<Self> {
        if offset + len > self.row_count {
            sieve_bail!(OutOfBounds: offset + len, 0, self.row_count);
        }
        Ok(Self {
            columns: self
                .columns
                .iter()
                .map(|(field, array)| (*field, array.slice(offset, len)))
                .collect(),
            row_count: len,
        })
    }
}

impl Display for Batch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Batch[{} rows; {}]",
            self.row_count,
            self.columns.keys().format(", ")
        )
    }
}
