//! # KeyStash Codec
//!
//! Converters between typed values and the bytes stored for a key.
//!
//! A [`Converter`] writes a `Serialize` value into a byte sink and reads a
//! `DeserializeOwned` value back from a byte source. Storage never sees the
//! types; containers never see the bytes.
//!
//! ## Empty Artifacts
//!
//! An artifact that has been created but never written is empty. Every
//! converter reads such an artifact as `None` rather than failing. Content
//! that is present but malformed is a [`CodecError::DecodingFailed`].
//!
//! ## Usage
//!
//! ```
//! use keystash_codec::{Converter, JsonConverter};
//!
//! let converter = JsonConverter::new();
//!
//! let mut bytes = Vec::new();
//! converter.write(&vec![1, 2, 3], &mut bytes).unwrap();
//! assert_eq!(bytes, b"[1,2,3]");
//!
//! let decoded: Option<Vec<i32>> = converter.read(&mut bytes.as_slice()).unwrap();
//! assert_eq!(decoded, Some(vec![1, 2, 3]));
//!
//! let empty: Option<Vec<i32>> = converter.read(&mut &b""[..]).unwrap();
//! assert_eq!(empty, None);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod converter;
mod error;
mod json;

pub use cbor::CborConverter;
pub use converter::Converter;
pub use error::{CodecError, CodecResult};
pub use json::JsonConverter;
