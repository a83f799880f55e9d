//! Conversion between Firestore's typed values and `serde_json` values.

use super::models::{ArrayValue, MapValue, Value, ValueType};
use super::FirestoreError;
use serde::de::Error;
use serde_json::{json, Map, Number, Value as JsonValue};
use std::collections::HashMap;

pub fn fields_to_json(fields: HashMap<String, Value>) -> Result<Map<String, JsonValue>, FirestoreError> {
    let mut map = Map::new();
    for (key, value) in fields {
        map.insert(key, value_to_json(value)?);
    }
    Ok(map)
}

pub fn value_to_json(value: Value) -> Result<JsonValue, FirestoreError> {
    Ok(match value.value_type {
        ValueType::StringValue(s) => JsonValue::String(s),
        ValueType::IntegerValue(s) => {
            let i: i64 = s.parse().map_err(|e| {
                <serde_json::Error as Error>::custom(format!(
                    "Failed to parse integer string '{}': {}",
                    s, e
                ))
            })?;
            JsonValue::Number(i.into())
        }
        ValueType::DoubleValue(d) => JsonValue::Number(Number::from_f64(d).ok_or_else(|| {
            <serde_json::Error as Error>::custom(format!("Invalid f64 value: {}", d))
        })?),
        ValueType::BooleanValue(b) => JsonValue::Bool(b),
        ValueType::MapValue(map_value) => JsonValue::Object(fields_to_json(map_value.fields)?),
        ValueType::ArrayValue(array_value) => JsonValue::Array(
            array_value
                .values
                .into_iter()
                .map(value_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        ValueType::NullValue(_) => JsonValue::Null,
        // Timestamps surface as RFC 3339 strings.
        ValueType::TimestampValue(s) => JsonValue::String(s),
        ValueType::GeoPointValue(gp) => {
            json!({ "latitude": gp.latitude, "longitude": gp.longitude })
        }
        ValueType::BytesValue(s) => JsonValue::String(s),
        ValueType::ReferenceValue(s) => JsonValue::String(s),
    })
}

pub fn json_to_fields(map: Map<String, JsonValue>) -> Result<HashMap<String, Value>, FirestoreError> {
    let mut fields = HashMap::with_capacity(map.len());
    for (k, v) in map {
        fields.insert(k, json_to_value(v)?);
    }
    Ok(fields)
}

pub fn json_to_value(value: JsonValue) -> Result<Value, FirestoreError> {
    let value_type = match value {
        JsonValue::Null => ValueType::NullValue(()),
        JsonValue::Bool(b) => ValueType::BooleanValue(b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                ValueType::IntegerValue(i.to_string())
            } else if let Some(f) = n.as_f64() {
                ValueType::DoubleValue(f)
            } else {
                return Err(FirestoreError::SerializationError(
                    <serde_json::Error as Error>::custom(format!("Unsupported number type: {}", n)),
                ));
            }
        }
        JsonValue::String(s) => ValueType::StringValue(s),
        JsonValue::Array(a) => ValueType::ArrayValue(ArrayValue {
            values: a
                .into_iter()
                .map(json_to_value)
                .collect::<Result<Vec<_>, _>>()?,
        }),
        JsonValue::Object(o) => ValueType::MapValue(MapValue {
            fields: json_to_fields(o)?,
        }),
    };
    Ok(Value { value_type })
}
