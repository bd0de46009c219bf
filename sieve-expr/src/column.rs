use std::fmt::Display;
use std::sync::Arc;

use arrow_array::{
    ArrayRef, BooleanArray, Float32Array, Float64Array, Int8Array, Int16Array, Int32Array,
    Int64Array, Scalar, StringArray,
};
use arrow_schema::DataType;
use sieve_batch::FieldId;
use sieve_error::{SieveResult, sieve_bail};

/// How a leaf reaches the rows of its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Access {
    /// Through a positional cursor that must be pulled once per batch.
    #[default]
    Sequential,
    /// By row range, which lets the leaf be skipped without moving anything.
    Random,
}

/// The column a leaf predicate reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    field: FieldId,
    name: Arc<str>,
    data_type: DataType,
    access: Access,
}

impl ColumnRef {
    pub fn new(field: FieldId, name: impl Into<Arc<str>>, data_type: DataType) -> Self {
        Self {
            field,
            name: name.into(),
            data_type,
            access: Access::default(),
        }
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn field(&self) -> FieldId {
        self.field
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn supports_offset_input(&self) -> bool {
        self.access == Access::Random
    }
}

impl Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}", self.name)
    }
}

/// Creates a reference to a sequentially read column.
pub fn col(field: i64, name: impl Into<Arc<str>>, data_type: DataType) -> ColumnRef {
    ColumnRef::new(FieldId::new(field), name, data_type)
}

/// A literal value a column is compared against.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Utf8(String),
}

impl ScalarValue {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Boolean(_) => DataType::Boolean,
            Self::Int8(_) => DataType::Int8,
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Float32(_) => DataType::Float32,
            Self::Float64(_) => DataType::Float64,
            Self::Utf8(_) => DataType::Utf8,
        }
    }

    /// Returns a single-row array holding this value.
    pub fn to_array(&self) -> ArrayRef {
        match self {
            Self::Boolean(v) => Arc::new(BooleanArray::from(vec![*v])),
            Self::Int8(v) => Arc::new(Int8Array::from(vec![*v])),
            Self::Int16(v) => Arc::new(Int16Array::from(vec![*v])),
            Self::Int32(v) => Arc::new(Int32Array::from(vec![*v])),
            Self::Int64(v) => Arc::new(Int64Array::from(vec![*v])),
            Self::Float32(v) => Arc::new(Float32Array::from(vec![*v])),
            Self::Float64(v) => Arc::new(Float64Array::from(vec![*v])),
            Self::Utf8(v) => Arc::new(StringArray::from(vec![v.as_str()])),
        }
    }

    /// Returns the value as an Arrow datum that broadcasts against a column.
    pub fn to_scalar(&self) -> Scalar<ArrayRef> {
        Scalar::new(self.to_array())
    }

    /// Checks that this value can be compared against `column`.
    pub fn check_comparable(&self, column: &ColumnRef) -> SieveResult<()> {
        if &self.data_type() != column.data_type() {
            sieve_bail!(MismatchedTypes: column.data_type(), self.data_type());
        }
        Ok(())
    }
}

impl Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}i8"),
            Self::Int16(v) => write!(f, "{v}i16"),
            Self::Int32(v) => write!(f, "{v}i32"),
            Self::Int64(v) => write!(f, "{v}i64"),
            Self::Float32(v) => write!(f, "{v}f32"),
            Self::Float64(v) => write!(f, "{v}f64"),
            Self::Utf8(v) => write!(f, "\"{v}\""),
        }
    }
}

macro_rules! scalar_from {
    ($T:ty, $variant:ident) => {
        impl From<$T> for ScalarValue {
            fn from(value: $T) -> Self {
                Self::$variant(value)
            }
        }
    };
}

scalar_from!(bool, Boolean);
scalar_from!(i8, Int8);
scalar_from!(i16, Int16);
scalar_from!(i32, Int32);
scalar_from!(i64, Int64);
scalar_from!(f32, Float32);
scalar_from!(f64, Float64);
scalar_from!(String, Utf8);

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_string())
    }
}

/// Creates a literal.
pub fn lit(value: impl Into<ScalarValue>) -> ScalarValue {
    value.into()
}
