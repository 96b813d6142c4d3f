use crate::error::DecodeError;
use crate::value::{Bindings, FunctionBindings, Value};

/// Encodes a value to its stable text form. The encoding is tagged JSON so
/// numeric and text table keys survive the round trip.
pub fn encode_value(value: &Value) -> String {
    serde_json::to_string(value).expect("value serialization cannot fail")
}

pub fn decode_value(text: &str) -> Result<Value, DecodeError> {
    Ok(serde_json::from_str(text)?)
}

/// Encodes the variable namespace into the `_vars` attempt-state blob.
pub fn encode_variables(variables: &Bindings) -> String {
    serde_json::to_string(variables).expect("variable serialization cannot fail")
}

/// Decodes a `_vars` blob. An empty blob is an absent namespace, not an
/// error, so attempts persisted before the init script ran still load.
pub fn decode_variables(blob: &str) -> Result<Bindings, DecodeError> {
    if blob.trim().is_empty() {
        return Ok(Bindings::new());
    }
    Ok(serde_json::from_str(blob)?)
}

/// Encodes the function namespace into the `_funcs` attempt-state blob.
pub fn encode_functions(functions: &FunctionBindings) -> String {
    serde_json::to_string(functions).expect("function serialization cannot fail")
}

pub fn decode_functions(blob: &str) -> Result<FunctionBindings, DecodeError> {
    if blob.trim().is_empty() {
        return Ok(FunctionBindings::new());
    }
    Ok(serde_json::from_str(blob)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{FunctionRef, Table, TableKey};

    fn nested_sample() -> Value {
        let mut inner = Table::new();
        inner.insert(TableKey::Name("y".to_string()), Value::Number(4.0));
        inner.insert(TableKey::Index(1), Value::Text("one".to_string()));
        inner.insert(
            TableKey::Name("1".to_string()),
            Value::Text("name one".to_string()),
        );

        let mut outer = Table::new();
        outer.insert(TableKey::Name("x".to_string()), Value::Number(3.0));
        outer.insert(TableKey::Name("t".to_string()), Value::Table(inner));
        outer.insert(
            TableKey::Name("seq".to_string()),
            Value::Sequence(vec![Value::Bool(true), Value::Number(2.5)]),
        );
        outer.insert(
            TableKey::Name("f".to_string()),
            Value::Function(FunctionRef {
                id: 0,
                body: "fn f(x) { x + 1 }".to_string(),
            }),
        );
        Value::Table(outer)
    }

    #[test]
    fn value_round_trips_losslessly() {
        let value = nested_sample();
        let decoded = decode_value(&encode_value(&value)).expect("decode");
        assert_eq!(decoded, value);
    }

    #[test]
    fn round_trip_preserves_insertion_order() {
        let value = nested_sample();
        let encoded = encode_value(&value);
        let reencoded = encode_value(&decode_value(&encoded).expect("decode"));
        assert_eq!(encoded, reencoded);
    }

    #[test]
    fn malformed_blob_is_a_typed_error() {
        assert!(decode_value("{not json").is_err());
        assert!(decode_variables("[1, 2").is_err());
    }

    #[test]
    fn empty_blobs_decode_to_empty_namespaces() {
        assert!(decode_variables("").expect("empty vars").is_empty());
        assert!(decode_functions("  ").expect("empty funcs").is_empty());
    }

    #[test]
    fn variable_blob_round_trips() {
        let mut variables = Bindings::new();
        variables.insert("x".to_string(), Value::Number(3.0));
        variables.insert("name".to_string(), Value::Text("ada".to_string()));

        let blob = encode_variables(&variables);
        assert_eq!(decode_variables(&blob).expect("decode"), variables);
    }
}
