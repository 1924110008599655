//! Mutating command implementations.
//!
//! Each command prints the key's state after the commit.

use super::{parse_json, print_json};
use keystash_core::{Converter, KeyValueStore};
use serde_json::Value;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Runs the put command.
pub fn put<C: Converter>(
    store: &KeyValueStore<C>,
    key: &str,
    json: &str,
    as_list: bool,
) -> CommandResult {
    let payload = parse_json(json)?;
    if as_list {
        let Value::Array(items) = payload else {
            return Err("--list expects a JSON array".into());
        };
        let stored = store.list::<Value>(key)?.put(items)?;
        print_json(&Value::Array(stored))
    } else {
        let stored = store.value::<Value>(key)?.put(payload)?;
        print_json(&stored)
    }
}

/// Runs the append command.
pub fn append<C: Converter>(store: &KeyValueStore<C>, key: &str, json: &str) -> CommandResult {
    let element = parse_json(json)?;
    let list = store.list::<Value>(key)?.append(element)?;
    print_json(&Value::Array(list))
}

/// Runs `remove --index`.
pub fn remove_at<C: Converter>(store: &KeyValueStore<C>, key: &str, index: usize) -> CommandResult {
    let list = store.list::<Value>(key)?.remove_at(index)?;
    print_json(&Value::Array(list))
}

/// Runs `remove --equals`, optionally removing every equal element.
pub fn remove_equal<C: Converter>(
    store: &KeyValueStore<C>,
    key: &str,
    json: &str,
    all: bool,
) -> CommandResult {
    let target = parse_json(json)?;
    let container = store.list::<Value>(key)?;
    let list = if all {
        container.remove_all(|item| *item == target)?
    } else {
        container.remove_item(&target)?
    };
    print_json(&Value::Array(list))
}

/// Runs the clear command.
pub fn clear<C: Converter>(store: &KeyValueStore<C>, key: &str, as_list: bool) -> CommandResult {
    if as_list {
        store.list::<Value>(key)?.clear()?;
        print_json(&Value::Array(Vec::new()))
    } else {
        store.value::<Value>(key)?.clear()?;
        print_json(&Value::Null)
    }
}
