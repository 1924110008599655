//! # KeyStash Testkit
//!
//! Test utilities for KeyStash.
//!
//! This crate provides:
//! - Test fixtures and store helpers
//! - Property-based test generators and a list model using proptest
//! - Fault injection for storage backends
//! - Cross-crate integration test helpers
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust
//! use keystash_testkit::prelude::*;
//!
//! let test_store = TestStore::memory();
//! let mut harness = ListHarness::new(test_store.list::<u8>("model").unwrap());
//! harness.apply(&ListOp::Append(1));
//! harness.apply(&ListOp::Remove(1));
//! assert!(harness.model().is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty;
pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use faulty::*;
pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
