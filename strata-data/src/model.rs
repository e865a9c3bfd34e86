use crate::error::DataError;
use crate::value::{Key, Value, Values};

/// Capability set a type needs to be served by a [`DataService`](crate::DataService).
///
/// Field access goes through an explicit per-model list of field names and a
/// `match`-based getter/setter pair, so no runtime reflection is involved.
/// Implement it by hand or with the [`model!`](crate::model!) macro.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone)]
/// pub struct Item {
///     pub id: Option<i64>,
///     pub name: String,
///     pub price: i64,
/// }
///
/// strata_data::model! {
///     Item {
///         table: "items",
///         primary_key: [id],
///         fields: [id, name, price],
///     }
/// }
/// ```
pub trait Model: Send + Sync + Unpin + 'static {
    fn table_name() -> &'static str;

    /// Declared field names, in column order.
    fn fields() -> &'static [&'static str];

    /// Primary-key column names, in key order.
    fn primary_key() -> &'static [&'static str];

    /// Construct and validate an instance from a field mapping.
    ///
    /// Absent optional fields default to `None`; absent required fields
    /// fail with [`DataError::MissingField`]. Unknown keys are ignored.
    fn from_values(values: &Values) -> Result<Self, DataError>
    where
        Self: Sized;

    /// Current value of a declared field.
    fn value(&self, field: &str) -> Option<Value>;

    /// Overwrite a declared field. Unknown fields are ignored.
    fn set_value(&mut self, field: &str, value: Value) -> Result<(), DataError>;

    fn to_values(&self) -> Values {
        Self::fields()
            .iter()
            .filter_map(|field| self.value(field).map(|v| (*field, v)))
            .collect()
    }

    fn primary_key_values(&self) -> Vec<Value> {
        Self::primary_key()
            .iter()
            .map(|col| self.value(col).unwrap_or(Value::Null))
            .collect()
    }

    /// Apply a sparse patch: every declared field the patch explicitly
    /// carries is overwritten, every other field is left untouched.
    fn apply_values(&mut self, values: &Values) -> Result<(), DataError> {
        for field in Self::fields() {
            if let Some(value) = values.get(field) {
                self.set_value(field, value.clone())?;
            }
        }
        Ok(())
    }

    /// Pair the primary-key columns with the positional elements of `key`.
    fn key_columns(key: &Key) -> Result<Vec<(&'static str, Value)>, DataError> {
        let columns = Self::primary_key();
        if columns.len() != key.values().len() {
            return Err(DataError::InvalidKey {
                table: Self::table_name(),
                expected: columns.len(),
                found: key.values().len(),
            });
        }
        Ok(columns.iter().copied().zip(key.values().iter().cloned()).collect())
    }
}

/// Implement [`Model`] for a plain struct.
///
/// Every struct field must be listed under `fields`; each field type must
/// implement [`FromValue`](crate::FromValue) and `Clone + Into<Value>`.
#[macro_export]
macro_rules! model {
    (
        $ty:ident {
            table: $table:expr,
            primary_key: [$($pk:ident),+ $(,)?],
            fields: [$($field:ident),+ $(,)?] $(,)?
        }
    ) => {
        impl $crate::Model for $ty {
            fn table_name() -> &'static str {
                $table
            }

            fn fields() -> &'static [&'static str] {
                &[$(stringify!($field)),+]
            }

            fn primary_key() -> &'static [&'static str] {
                &[$(stringify!($pk)),+]
            }

            fn from_values(values: &$crate::Values) -> Result<Self, $crate::DataError> {
                Ok(Self {
                    $(
                        $field: match values.get(stringify!($field)) {
                            Some(value) => $crate::FromValue::from_value(value.clone())
                                .map_err(|e| e.for_field(stringify!($field)))?,
                            None => $crate::FromValue::from_missing().ok_or_else(|| {
                                $crate::DataError::MissingField {
                                    table: $table,
                                    field: stringify!($field).to_string(),
                                }
                            })?,
                        },
                    )+
                })
            }

            fn value(&self, field: &str) -> Option<$crate::Value> {
                match field {
                    $(stringify!($field) => Some($crate::Value::from(self.$field.clone())),)+
                    _ => None,
                }
            }

            fn set_value(
                &mut self,
                field: &str,
                value: $crate::Value,
            ) -> Result<(), $crate::DataError> {
                match field {
                    $(
                        stringify!($field) => {
                            self.$field = $crate::FromValue::from_value(value)
                                .map_err(|e| e.for_field(stringify!($field)))?;
                        }
                    )+
                    _ => {}
                }
                Ok(())
            }
        }
    };
}
