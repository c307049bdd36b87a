use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Trait for types usable as structured-output responses.
///
/// Automatically implemented for any `JsonSchema + DeserializeOwned` type.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Generate a schema the structured-output endpoint accepts.
    ///
    /// The endpoint is stricter than plain JSON Schema:
    /// 1. every object must set `additionalProperties: false`
    /// 2. every property must appear in `required`, nullable or not
    /// 3. `$ref`/`definitions` indirection must be fully inlined
    fn response_schema() -> Value {
        let mut value = serde_json::to_value(schema_for!(Self)).unwrap_or_default();

        let definitions = value.get("definitions").cloned();
        sanitize(&mut value, definitions.as_ref());

        if let Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }

        value
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

/// One recursive walk applying all three endpoint requirements.
fn sanitize(value: &mut Value, definitions: Option<&Value>) {
    match value {
        Value::Object(map) => {
            // Inline `$ref` indirection before touching anything else, then
            // re-sanitize the substituted subtree.
            if let Some(Value::String(ref_path)) = map.get("$ref").cloned() {
                if let Some(name) = ref_path.strip_prefix("#/definitions/") {
                    if let Some(def) = definitions.and_then(|d| d.get(name)) {
                        *value = def.clone();
                        sanitize(value, definitions);
                        return;
                    }
                }
            }

            // schemars wraps single refs in `allOf`; unwrap those too.
            if let Some(Value::Array(all_of)) = map.get("allOf").cloned() {
                if all_of.len() == 1 {
                    *value = all_of.into_iter().next().unwrap();
                    sanitize(value, definitions);
                    return;
                }
            }

            if map.get("type") == Some(&Value::String("object".to_string())) {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
                if let Some(Value::Object(props)) = map.get("properties") {
                    let all_keys: Vec<Value> =
                        props.keys().map(|k| Value::String(k.clone())).collect();
                    map.insert("required".to_string(), Value::Array(all_keys));
                }
            }

            for (_, v) in map.iter_mut() {
                sanitize(v, definitions);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                sanitize(item, definitions);
            }
        }
        _ => {}
    }
}
