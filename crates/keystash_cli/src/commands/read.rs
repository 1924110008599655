//! Get command implementation.

use super::print_json;
use keystash_core::{Converter, KeyValueStore};
use serde_json::Value;

/// Runs the get command.
///
/// An absent value prints `null`; an absent list prints `[]`.
pub fn get<C: Converter>(
    store: &KeyValueStore<C>,
    key: &str,
    as_list: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let value = if as_list {
        Value::Array(store.list::<Value>(key)?.get()?)
    } else {
        store.value::<Value>(key)?.get()?.unwrap_or(Value::Null)
    };
    print_json(&value)
}
