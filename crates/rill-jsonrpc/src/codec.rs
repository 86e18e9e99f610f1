//! Value codec: bidirectional mapping between JSON values and native types.
//!
//! Decoding is strict. Integer types accept only JSON integers of the
//! matching signedness (narrowing fails), floats accept any JSON number,
//! and every other scalar accepts only its own JSON kind. Containers decode
//! recursively. Every mismatch fails with `InvalidParams`.
//!
//! User-defined types join the codec by implementing [`ToJson`] and
//! [`FromJson`]; they then work anywhere the built-in types do, including
//! as registered procedure parameters and return values.

use serde_json::Value;
use std::collections::HashMap;

use crate::error::RpcError;

/// Encode a native value as JSON. Total: encoding never fails.
pub trait ToJson {
    fn to_json(&self) -> Value;
}

/// Decode a native value from JSON. Mismatches fail with `InvalidParams`.
pub trait FromJson: Sized {
    fn from_json(value: &Value) -> Result<Self, RpcError>;
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(expected: &str, value: &Value) -> RpcError {
    RpcError::invalid_params(format!("expected {expected}, got {}", json_kind(value)))
}

impl ToJson for i64 {
    fn to_json(&self) -> Value {
        Value::from(*self)
    }
}

impl FromJson for i64 {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        value.as_i64().ok_or_else(|| mismatch("integer", value))
    }
}

impl ToJson for i32 {
    fn to_json(&self) -> Value {
        Value::from(*self)
    }
}

impl FromJson for i32 {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        let wide = i64::from_json(value)?;
        i32::try_from(wide)
            .map_err(|_| RpcError::invalid_params(format!("integer {wide} out of range for i32")))
    }
}

impl ToJson for u64 {
    fn to_json(&self) -> Value {
        Value::from(*self)
    }
}

impl FromJson for u64 {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        value
            .as_u64()
            .ok_or_else(|| mismatch("unsigned integer", value))
    }
}

impl ToJson for u32 {
    fn to_json(&self) -> Value {
        Value::from(*self)
    }
}

impl FromJson for u32 {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        let wide = u64::from_json(value)?;
        u32::try_from(wide)
            .map_err(|_| RpcError::invalid_params(format!("integer {wide} out of range for u32")))
    }
}

impl ToJson for f64 {
    fn to_json(&self) -> Value {
        Value::from(*self)
    }
}

impl FromJson for f64 {
    // Accepts any JSON number: integers widen to float.
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        value.as_f64().ok_or_else(|| mismatch("number", value))
    }
}

impl ToJson for f32 {
    fn to_json(&self) -> Value {
        Value::from(f64::from(*self))
    }
}

impl FromJson for f32 {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        Ok(f64::from_json(value)? as f32)
    }
}

impl ToJson for bool {
    fn to_json(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromJson for bool {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        value.as_bool().ok_or_else(|| mismatch("boolean", value))
    }
}

impl ToJson for String {
    fn to_json(&self) -> Value {
        Value::String(self.clone())
    }
}

impl ToJson for &str {
    fn to_json(&self) -> Value {
        Value::String((*self).to_string())
    }
}

impl FromJson for String {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| mismatch("string", value))
    }
}

// Identity conversions: an escape hatch for procedures that want the raw
// JSON value.
impl ToJson for Value {
    fn to_json(&self) -> Value {
        self.clone()
    }
}

impl FromJson for Value {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        Ok(value.clone())
    }
}

/// The no-return shape: emits JSON null.
impl ToJson for () {
    fn to_json(&self) -> Value {
        Value::Null
    }
}

impl FromJson for () {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        match value {
            Value::Null => Ok(()),
            other => Err(mismatch("null", other)),
        }
    }
}

impl<T: ToJson> ToJson for Vec<T> {
    fn to_json(&self) -> Value {
        Value::Array(self.iter().map(ToJson::to_json).collect())
    }
}

impl<T: FromJson> FromJson for Vec<T> {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        let items = value.as_array().ok_or_else(|| mismatch("array", value))?;
        items.iter().map(T::from_json).collect()
    }
}

impl<T: ToJson> ToJson for HashMap<String, T> {
    fn to_json(&self) -> Value {
        Value::Object(
            self.iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect(),
        )
    }
}

impl<T: FromJson> FromJson for HashMap<String, T> {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        let obj = value.as_object().ok_or_else(|| mismatch("object", value))?;
        obj.iter()
            .map(|(key, value)| Ok((key.clone(), T::from_json(value)?)))
            .collect()
    }
}

/// Extraction of a `params` value into a fixed-arity tuple of declared
/// types. Implemented for tuples up to arity 8.
pub trait FromParams: Sized {
    fn from_params(params: &Value) -> Result<Self, RpcError>;
}

/// Client-side counterpart: build a positional `params` array from a tuple
/// of argument values.
pub trait ToParams {
    fn to_params(self) -> Value;
}

impl FromParams for () {
    fn from_params(params: &Value) -> Result<Self, RpcError> {
        match params {
            Value::Null => Ok(()),
            Value::Array(items) if items.is_empty() => Ok(()),
            Value::Array(items) => Err(RpcError::invalid_params(format!(
                "expected no parameters, got {}",
                items.len()
            ))),
            other => Err(RpcError::invalid_params(format!(
                "params must be null or an array, got {}",
                json_kind(other)
            ))),
        }
    }
}

impl ToParams for () {
    fn to_params(self) -> Value {
        Value::Null
    }
}

macro_rules! tuple_params {
    ($len:expr; $($ty:ident . $idx:tt),+) => {
        impl<$($ty: FromJson),+> FromParams for ($($ty,)+) {
            fn from_params(params: &Value) -> Result<Self, RpcError> {
                let items = params.as_array().ok_or_else(|| {
                    RpcError::invalid_params(format!(
                        "params must be an array, got {}",
                        json_kind(params)
                    ))
                })?;
                if items.len() != $len {
                    return Err(RpcError::invalid_params(format!(
                        "expected {} parameters, got {}",
                        $len,
                        items.len()
                    )));
                }
                Ok(($($ty::from_json(&items[$idx])?,)+))
            }
        }

        impl<$($ty: ToJson),+> ToParams for ($($ty,)+) {
            fn to_params(self) -> Value {
                Value::Array(vec![$(self.$idx.to_json()),+])
            }
        }
    };
}

tuple_params!(1; A.0);
tuple_params!(2; A.0, B.1);
tuple_params!(3; A.0, B.1, C.2);
tuple_params!(4; A.0, B.1, C.2, D.3);
tuple_params!(5; A.0, B.1, C.2, D.3, E.4);
tuple_params!(6; A.0, B.1, C.2, D.3, E.4, F.5);
tuple_params!(7; A.0, B.1, C.2, D.3, E.4, F.5, G.6);
tuple_params!(8; A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7);
