//! CLI command implementations.

pub mod read;
pub mod stress;
pub mod write;

use serde_json::Value;

/// Parses a command-line JSON argument.
pub fn parse_json(text: &str) -> Result<Value, Box<dyn std::error::Error>> {
    serde_json::from_str(text).map_err(|err| format!("invalid JSON argument: {err}").into())
}

/// Prints a JSON value the way every command reports results.
pub fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
