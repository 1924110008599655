//! Property-based test generators using proptest.
//!
//! Provides strategies for keys, payloads and sequences of list
//! operations, plus a plain `Vec` model of the list semantics to check the
//! real containers against.

use proptest::prelude::*;

/// Strategy for generating valid keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_-]{0,31}").expect("Invalid regex")
}

/// Strategy for generating keys that must be rejected.
pub fn invalid_key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just(".".to_string()),
        Just("..".to_string()),
        "[a-z]{0,4}/[a-z]{0,4}",
        "[a-z]{0,4}\\\\[a-z]{0,4}",
        "[a-z]{0,4}\u{0}[a-z]{0,4}",
    ]
}

/// Strategy for generating list elements.
///
/// Values are drawn from a small range so predicates hit duplicates often.
pub fn element_strategy() -> impl Strategy<Value = u8> {
    0u8..8
}

/// Strategy for generating whole lists.
pub fn list_strategy(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(element_strategy(), 0..max_len)
}

/// A list operation, with predicates expressed as "equals `target`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOp {
    /// Replace the whole list.
    Put(Vec<u8>),
    /// Append a value.
    Append(u8),
    /// Replace the first element equal to `target`.
    Replace {
        /// Replacement value.
        value: u8,
        /// Element to look for.
        target: u8,
    },
    /// Replace the first element equal to `target`, or append.
    AddOrReplace {
        /// Replacement or appended value.
        value: u8,
        /// Element to look for.
        target: u8,
    },
    /// Remove the first element equal to the value.
    Remove(u8),
    /// Remove every element equal to the value.
    RemoveAll(u8),
    /// Remove the element at a position (may be out of range).
    RemoveAt(usize),
    /// Delete the list.
    Clear,
}

/// Strategy for generating one list operation.
pub fn list_op_strategy() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        1 => list_strategy(6).prop_map(ListOp::Put),
        4 => element_strategy().prop_map(ListOp::Append),
        2 => (element_strategy(), element_strategy())
            .prop_map(|(value, target)| ListOp::Replace { value, target }),
        2 => (element_strategy(), element_strategy())
            .prop_map(|(value, target)| ListOp::AddOrReplace { value, target }),
        2 => element_strategy().prop_map(ListOp::Remove),
        1 => element_strategy().prop_map(ListOp::RemoveAll),
        1 => (0usize..10).prop_map(ListOp::RemoveAt),
        1 => Just(ListOp::Clear),
    ]
}

/// Strategy for generating a sequence of list operations.
pub fn list_op_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<ListOp>> {
    prop::collection::vec(list_op_strategy(), min_ops..max_ops)
}

/// Expected outcome of applying a [`ListOp`] to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOutcome {
    /// List after the operation.
    pub list: Vec<u8>,
    /// Whether the operation fails with an out-of-bounds error.
    pub out_of_bounds: bool,
    /// Whether the operation publishes an update.
    pub publishes: bool,
}

/// Applies `op` to `model` with the container semantics.
///
/// `exists` tracks whether the key has an artifact, which decides whether
/// a `Remove` on an empty list publishes.
pub fn apply_to_model(model: &mut Vec<u8>, exists: &mut bool, op: &ListOp) -> ModelOutcome {
    let mut outcome = ModelOutcome {
        list: Vec::new(),
        out_of_bounds: false,
        publishes: true,
    };

    match op {
        ListOp::Put(list) => {
            model.clone_from(list);
            *exists = true;
        }
        ListOp::Append(value) => {
            model.push(*value);
            *exists = true;
        }
        ListOp::Replace { value, target } => {
            if let Some(index) = model.iter().position(|v| v == target) {
                model[index] = *value;
            }
        }
        ListOp::AddOrReplace { value, target } => {
            match model.iter().position(|v| v == target) {
                Some(index) => model[index] = *value,
                None => model.push(*value),
            }
            *exists = true;
        }
        ListOp::Remove(target) => {
            if *exists {
                match model.iter().position(|v| v == target) {
                    Some(index) => {
                        model.remove(index);
                    }
                    None => outcome.publishes = false,
                }
            }
        }
        ListOp::RemoveAll(target) => {
            let before = model.len();
            model.retain(|v| v != target);
            outcome.publishes = model.len() < before;
        }
        ListOp::RemoveAt(index) => {
            if *index < model.len() {
                model.remove(*index);
            } else {
                outcome.out_of_bounds = true;
                outcome.publishes = false;
            }
        }
        ListOp::Clear => {
            model.clear();
            *exists = false;
        }
    }

    outcome.list.clone_from(model);
    outcome
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
