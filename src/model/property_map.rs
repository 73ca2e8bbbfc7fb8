//! PropertyMap: the key-value store on nodes and relationships.

use std::collections::BTreeMap;
use super::Value;

/// A map of property names to values.
///
/// Ordered so that rendered context and exports are deterministic.
pub type PropertyMap = BTreeMap<String, Value>;

/// Decode a JSON object into a PropertyMap; non-objects yield an empty map.
pub fn from_json(value: serde_json::Value) -> PropertyMap {
    match value {
        serde_json::Value::Object(map) => {
            map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
        }
        _ => PropertyMap::new(),
    }
}
