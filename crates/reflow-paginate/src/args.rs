//! Conversion from key params to backend call arguments.

use serde_json::{Map, Value};

use reflow_core::{ParamValue, Params};

/// Render params as a JSON argument object.
pub(crate) fn args_object(params: &Params) -> Map<String, Value> {
    params
        .iter()
        .map(|(name, value)| {
            let json = match value {
                ParamValue::Str(s) => Value::String(s.clone()),
                ParamValue::Int(i) => Value::from(*i),
                ParamValue::Bool(b) => Value::Bool(*b),
            };
            (name.to_string(), json)
        })
        .collect()
}
