//! JSON converter.

use crate::converter::{read_all, Converter};
use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

/// Stores values as JSON text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonConverter {
    pretty: bool,
}

impl JsonConverter {
    /// Creates a converter producing compact JSON.
    #[must_use]
    pub const fn new() -> Self {
        Self { pretty: false }
    }

    /// Creates a converter producing indented JSON.
    #[must_use]
    pub const fn pretty() -> Self {
        Self { pretty: true }
    }

    /// Returns whether output is indented.
    #[must_use]
    pub const fn is_pretty(&self) -> bool {
        self.pretty
    }
}

fn encode_error(err: serde_json::Error) -> CodecError {
    if err.is_io() {
        CodecError::io(err.to_string())
    } else {
        CodecError::encoding_failed(err.to_string())
    }
}

impl Converter for JsonConverter {
    fn write<T>(&self, value: &T, sink: &mut dyn Write) -> CodecResult<()>
    where
        T: Serialize + ?Sized,
    {
        if self.pretty {
            serde_json::to_writer_pretty(sink, value).map_err(encode_error)
        } else {
            serde_json::to_writer(sink, value).map_err(encode_error)
        }
    }

    fn read<T>(&self, source: &mut dyn Read) -> CodecResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let bytes = read_all(source)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| CodecError::decoding_failed(err.to_string()))
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Task {
        title: String,
        done: bool,
        tags: Vec<String>,
    }

    fn encode<T: Serialize>(converter: &JsonConverter, value: &T) -> Vec<u8> {
        let mut bytes = Vec::new();
        converter.write(value, &mut bytes).unwrap();
        bytes
    }

    #[test]
    fn struct_roundtrip() {
        let converter = JsonConverter::new();
        let task = Task {
            title: "write docs".into(),
            done: false,
            tags: vec!["work".into()],
        };

        let bytes = encode(&converter, &task);
        let decoded: Option<Task> = converter.read(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded, Some(task));
    }

    #[test]
    fn list_of_maps_roundtrip() {
        let converter = JsonConverter::new();
        let mut row = BTreeMap::new();
        row.insert("a".to_string(), 1);
        let list = vec![row.clone(), row];

        let bytes = encode(&converter, &list);
        let decoded: Option<Vec<BTreeMap<String, i32>>> =
            converter.read(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded, Some(list));
    }

    #[test]
    fn empty_and_blank_read_as_none() {
        let converter = JsonConverter::new();
        let empty: Option<String> = converter.read(&mut &b""[..]).unwrap();
        let blank: Option<String> = converter.read(&mut &b" \n\t"[..]).unwrap();
        assert_eq!(empty, None);
        assert_eq!(blank, None);
    }

    #[test]
    fn malformed_content_is_an_error() {
        let converter = JsonConverter::new();
        let result: CodecResult<Option<Vec<i32>>> = converter.read(&mut &b"[1, 2"[..]);
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }

    #[test]
    fn wrong_shape_is_an_error() {
        let converter = JsonConverter::new();
        let result: CodecResult<Option<Vec<i32>>> = converter.read(&mut &b"{\"a\":1}"[..]);
        assert!(result.is_err());
    }

    #[test]
    fn pretty_output_is_indented() {
        let converter = JsonConverter::pretty();
        assert!(converter.is_pretty());
        let bytes = encode(&converter, &vec![1, 2]);
        assert_eq!(String::from_utf8(bytes).unwrap(), "[\n  1,\n  2\n]");
    }

    #[test]
    fn unit_value_is_not_empty() {
        let converter = JsonConverter::new();
        let bytes = encode(&converter, &());
        assert_eq!(bytes, b"null");
        let decoded: Option<()> = converter.read(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded, Some(()));
    }

    #[test]
    fn extension() {
        assert_eq!(JsonConverter::new().extension(), "json");
    }
}
