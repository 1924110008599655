//! CBOR converter.

use crate::converter::{read_all, Converter};
use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

/// Stores values as CBOR (RFC 8949) using `ciborium`.
///
/// More compact than JSON and lossless for byte strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CborConverter;

impl CborConverter {
    /// Creates a CBOR converter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Converter for CborConverter {
    fn write<T>(&self, value: &T, sink: &mut dyn Write) -> CodecResult<()>
    where
        T: Serialize + ?Sized,
    {
        ciborium::into_writer(value, sink)
            .map_err(|err| CodecError::encoding_failed(format!("{err:?}")))
    }

    fn read<T>(&self, source: &mut dyn Read) -> CodecResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let bytes = read_all(source)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        ciborium::from_reader(bytes.as_slice())
            .map(Some)
            .map_err(|err| CodecError::decoding_failed(format!("{err:?}")))
    }

    fn extension(&self) -> &'static str {
        "cbor"
    }
}
