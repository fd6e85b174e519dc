use crate::resource::JsonObject;

use serde_json::Value;

pub static API_VERSION_POINTER: &str = "/apiVersion";
pub static KIND_POINTER: &str = "/kind";
pub static NAMESPACE_POINTER: &str = "/metadata/namespace";
pub static NAME_POINTER: &str = "/metadata/name";

/// Read access to the header fields of a raw json resource, such as the items of a list
/// response.
pub trait ResourceJson {
    fn get_api_version(&self) -> Option<&str>;
    fn get_kind(&self) -> Option<&str>;
    fn get_namespace(&self) -> Option<&str>;
    fn get_name(&self) -> Option<&str>;
}

fn str_value<'a, 'b>(value: &'a Value, pointer: &'b str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

impl ResourceJson for Value {
    fn get_api_version(&self) -> Option<&str> {
        str_value(self, API_VERSION_POINTER)
    }

    fn get_kind(&self) -> Option<&str> {
        str_value(self, KIND_POINTER)
    }

    fn get_namespace(&self) -> Option<&str> {
        str_value(self, NAMESPACE_POINTER)
    }

    fn get_name(&self) -> Option<&str> {
        str_value(self, NAME_POINTER)
    }
}

/// Splits a dotted property path like `spec.clusterIP` into its segments
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

/// Walks the dotted `path` through nested objects
pub fn get_path<'a>(object: &'a JsonObject, path: &str) -> Option<&'a Value> {
    let segments = path_segments(path);
    let (last, parents) = segments.split_last()?;
    let mut current = object;
    for segment in parents {
        current = current.get(*segment)?.as_object()?;
    }
    current.get(*last)
}

/// Writes `value` at the dotted `path`, creating intermediate objects as needed. Anything that
/// is in the way and isn't an object gets replaced by one.
pub fn set_path(object: &mut JsonObject, path: &str, value: Value) {
    let segments = path_segments(path);
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return,
    };
    let mut current = object;
    for segment in parents {
        let next = current
            .entry(*segment)
            .or_insert_with(|| Value::Object(JsonObject::new()));
        if !next.is_object() {
            *next = Value::Object(JsonObject::new());
        }
        current = match next {
            Value::Object(map) => map,
            _ => unreachable!("intermediate was just set to an object"),
        };
    }
    current.insert((*last).to_owned(), value);
}
