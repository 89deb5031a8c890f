//! Argument payload sent across the process boundary

use serde_json::{Map, Value};

/// Key of the parent command's context in a command object
pub const PARENT_KEY: &str = "parent";

/// Prefix marking internal command-object fields
pub const PRIVATE_PREFIX: char = '_';

/// Copy of `command` without internal fields and without the parent context
pub fn sanitize(command: &Map<String, Value>) -> Map<String, Value> {
    command
        .iter()
        .filter(|(key, _)| !key.starts_with(PRIVATE_PREFIX) && key.as_str() != PARENT_KEY)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Payload handed to a command module: its positional arguments followed by
/// the sanitized command object
pub fn payload(positionals: Vec<Value>, command: &Map<String, Value>) -> Value {
    let mut args = positionals;
    args.push(Value::Object(sanitize(command)));
    Value::Array(args)
}
