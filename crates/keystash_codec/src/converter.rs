//! The converter capability.

use crate::error::CodecResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

/// Converts typed values to and from the bytes of one artifact.
///
/// Implementations are stateless with respect to the data (configuration
/// such as pretty printing is fine) and shared across every key of a store.
///
/// # Invariants
///
/// - `read` of what `write` produced yields an equal value
/// - `read` of an empty source yields `Ok(None)`
/// - `write` never emits zero bytes for a value, so "empty" always means
///   "never written"
pub trait Converter: Send + Sync + 'static {
    /// Serializes `value` into `sink`.
    ///
    /// The sink is not flushed; the caller owns its lifecycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized or the sink fails.
    fn write<T>(&self, value: &T, sink: &mut dyn Write) -> CodecResult<()>
    where
        T: Serialize + ?Sized;

    /// Deserializes a value from `source`.
    ///
    /// Returns `Ok(None)` if the source holds no content.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is malformed or the source fails.
    fn read<T>(&self, source: &mut dyn Read) -> CodecResult<Option<T>>
    where
        T: DeserializeOwned;

    /// File extension used for artifacts written by this converter.
    fn extension(&self) -> &'static str;
}

/// Reads the whole source into memory.
pub(crate) fn read_all(source: &mut dyn Read) -> CodecResult<Vec<u8>> {
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes)?;
    Ok(bytes)
}
