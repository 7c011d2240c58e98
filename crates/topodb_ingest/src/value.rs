//! Attribute value conversion to database values.

use rusqlite::types::Value as SqlValue;
use topodb_schema::AttrType;

/// The serialized form of an empty source-id list; embedded relationship
/// clears reset the column to this instead of NULL.
pub(crate) const EMPTY_SOURCE_IDS: &str = "[]";

/// Converts one attribute value to the database value its declared type
/// maps to. The attribute name is already validated against the registry.
pub(crate) fn attribute_to_sql(attr: AttrType, value: &serde_json::Value) -> SqlValue {
    if value.is_null() {
        return SqlValue::Null;
    }
    match attr {
        AttrType::Primitive => primitive_to_sql(value),
        AttrType::Decimal => match value {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => SqlValue::Real(f),
                None => SqlValue::Text(n.to_string()),
            },
            other => primitive_to_sql(other),
        },
        AttrType::BigInt => match value {
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Text(n.to_string()),
            },
            other => primitive_to_sql(other),
        },
        AttrType::Geographic => match value {
            serde_json::Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        },
        AttrType::Container => SqlValue::Text(value.to_string()),
    }
}

fn primitive_to_sql(value: &serde_json::Value) -> SqlValue {
    match value {
        serde_json::Value::Null => SqlValue::Null,
        serde_json::Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                SqlValue::Text(n.to_string())
            }
        }
        serde_json::Value::String(s) => SqlValue::Text(s.clone()),
        // Nested values under a primitive declaration keep their JSON form.
        other => SqlValue::Text(other.to_string()),
    }
}

/// Serializes a source-id list for storage.
pub(crate) fn source_ids_text(source_ids: &[String]) -> String {
    serde_json::to_string(source_ids).unwrap_or_else(|_| EMPTY_SOURCE_IDS.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitives() {
        assert_eq!(
            attribute_to_sql(AttrType::Primitive, &json!("abc")),
            SqlValue::Text("abc".into())
        );
        assert_eq!(
            attribute_to_sql(AttrType::Primitive, &json!(true)),
            SqlValue::Integer(1)
        );
        assert_eq!(
            attribute_to_sql(AttrType::Primitive, &json!(42)),
            SqlValue::Integer(42)
        );
        assert_eq!(
            attribute_to_sql(AttrType::Primitive, &serde_json::Value::Null),
            SqlValue::Null
        );
    }

    #[test]
    fn numeric_types() {
        assert_eq!(
            attribute_to_sql(AttrType::Decimal, &json!(2.5)),
            SqlValue::Real(2.5)
        );
        assert_eq!(
            attribute_to_sql(AttrType::BigInt, &json!(9_007_199_254_740_993_i64)),
            SqlValue::Integer(9_007_199_254_740_993)
        );
    }

    #[test]
    fn containers_become_json_text() {
        let value = json!({"bands": [78, 79]});
        assert_eq!(
            attribute_to_sql(AttrType::Container, &value),
            SqlValue::Text("{\"bands\":[78,79]}".into())
        );
    }

    #[test]
    fn source_ids_serialize_as_json_array() {
        assert_eq!(source_ids_text(&[]), "[]");
        assert_eq!(
            source_ids_text(&["urn:cmHandle:/abc".to_string()]),
            "[\"urn:cmHandle:/abc\"]"
        );
    }
}
