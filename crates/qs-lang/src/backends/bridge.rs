use qs_core::{LanguageError, Table, TableKey, Value};
use rhai::{Array, Dynamic, ImmutableString, Map, FLOAT, INT};

pub(crate) fn value_to_dynamic(value: &Value) -> Result<Dynamic, LanguageError> {
    match value {
        Value::Bool(value) => Ok(Dynamic::from_bool(*value)),
        Value::Number(value) => {
            // Whole numbers enter the script as integers so arithmetic and
            // printing behave the way instructors expect.
            if value.fract() == 0.0 && value.is_finite() && value.abs() < (i64::MAX as f64) {
                Ok(Dynamic::from_int(*value as INT))
            } else {
                Ok(Dynamic::from_float(*value as FLOAT))
            }
        }
        Value::Text(value) => Ok(Dynamic::from(value.clone())),
        Value::Sequence(values) => {
            let mut array = Array::new();
            for value in values {
                array.push(value_to_dynamic(value)?);
            }
            Ok(Dynamic::from_array(array))
        }
        Value::Table(table) => {
            let mut map = Map::new();
            for (key, value) in table.iter() {
                let name = match key {
                    TableKey::Index(index) => index.to_string(),
                    TableKey::Name(name) => name.clone(),
                };
                map.insert(name.into(), value_to_dynamic(value)?);
            }
            Ok(Dynamic::from_map(map))
        }
        Value::Function(_) => Err(LanguageError::Runtime(
            "function values cannot enter the script scope".to_string(),
        )),
    }
}

pub(crate) fn dynamic_to_value(value: Dynamic) -> Result<Value, LanguageError> {
    if value.is::<bool>() {
        return Ok(Value::Bool(value.cast::<bool>()));
    }
    if value.is::<INT>() {
        return Ok(Value::Number(value.cast::<INT>() as f64));
    }
    if value.is::<FLOAT>() {
        return Ok(Value::Number(value.cast::<FLOAT>()));
    }
    if value.is::<ImmutableString>() {
        return Ok(Value::Text(value.cast::<ImmutableString>().to_string()));
    }
    if value.is::<Array>() {
        let array = value.cast::<Array>();
        let mut out = Vec::with_capacity(array.len());
        for item in array {
            out.push(dynamic_to_value(item)?);
        }
        return Ok(Value::Sequence(out));
    }
    if value.is::<Map>() {
        let map = value.cast::<Map>();
        let mut table = Table::new();
        for (key, value) in map {
            table.insert(TableKey::Name(key.to_string()), dynamic_to_value(value)?);
        }
        return Ok(Value::Table(table));
    }

    Err(LanguageError::Runtime(
        "unsupported script value type".to_string(),
    ))
}
