use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use super::ScalarValue;

/// Reference identifying a column used inside predicates.
///
/// This is a logical column reference using only the column name. Whether the
/// column exists is decided against a concrete schema at apply time, never at
/// construction time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Canonical column name.
    pub name: Arc<str>,
}

impl ColumnRef {
    /// Creates a new column reference from a name.
    #[must_use]
    pub fn new<N>(name: N) -> Self
    where
        N: Into<Arc<str>>,
    {
        Self { name: name.into() }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Shorthand for [`ColumnRef::new`].
#[must_use]
pub fn col<N>(name: N) -> ColumnRef
where
    N: Into<Arc<str>>,
{
    ColumnRef::new(name)
}

/// Operand used by predicate comparisons.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Reference to a column.
    Column(ColumnRef),
    /// Literal value.
    Literal(ScalarValue),
}

impl Operand {
    /// Returns the referenced column, if this operand is a column.
    #[must_use]
    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self {
            Operand::Column(column) => Some(column),
            Operand::Literal(_) => None,
        }
    }
}

impl From<ColumnRef> for Operand {
    fn from(value: ColumnRef) -> Self {
        Self::Column(value)
    }
}

impl From<ScalarValue> for Operand {
    fn from(value: ScalarValue) -> Self {
        Self::Literal(value)
    }
}

macro_rules! literal_operand {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(value: $ty) -> Self {
                    Self::Literal(ScalarValue::from(value))
                }
            }
        )*
    };
}

literal_operand!(bool, i32, i64, u32, u64, f64, &str, String, Vec<u8>);
