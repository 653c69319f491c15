use serde::{Deserialize, Serialize};

/// A positional parameter value bound into raw queries and key lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Integer(i64::from(v))
                }
            }
        )+
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(v: Option<V>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Conversion of a primary-key value into its positional key values.
///
/// Composite keys are tuples; the produced values line up with
/// [`Entity::key_columns`](crate::Entity::key_columns).
pub trait KeyValues {
    fn key_values(&self) -> Vec<Value>;
}

macro_rules! impl_key_values_scalar {
    ($($ty:ty),+) => {
        $(
            impl KeyValues for $ty {
                fn key_values(&self) -> Vec<Value> {
                    vec![Value::from(self.clone())]
                }
            }
        )+
    };
}

impl_key_values_scalar!(i8, i16, i32, i64, u8, u16, u32, bool, String);

impl<A: KeyValues, B: KeyValues> KeyValues for (A, B) {
    fn key_values(&self) -> Vec<Value> {
        let mut values = self.0.key_values();
        values.extend(self.1.key_values());
        values
    }
}

impl<A: KeyValues, B: KeyValues, C: KeyValues> KeyValues for (A, B, C) {
    fn key_values(&self) -> Vec<Value> {
        let mut values = self.0.key_values();
        values.extend(self.1.key_values());
        values.extend(self.2.key_values());
        values
    }
}
