//! Typed load and store on top of a locked storage unit.

use crate::error::StoreResult;
use keystash_codec::Converter;
use keystash_storage::{ArtifactRead, StorageError, WriteAccess};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;

/// Decodes the unit's artifact.
///
/// A missing or empty artifact loads as `None`.
pub(crate) fn load<T, C, A>(converter: &C, access: &A) -> StoreResult<Option<T>>
where
    T: DeserializeOwned,
    C: Converter,
    A: ArtifactRead,
{
    if !access.exists()? {
        return Ok(None);
    }
    let mut reader = match access.open_reader() {
        Ok(reader) => reader,
        // Removed between the existence check and the open
        Err(StorageError::NotFound { .. }) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(converter.read(&mut *reader)?)
}

/// Creates the artifact if needed, then atomically replaces its contents
/// with the encoding of `value`.
pub(crate) fn store<T, C>(converter: &C, access: &WriteAccess<'_>, value: &T) -> StoreResult<()>
where
    T: Serialize + ?Sized,
    C: Converter,
{
    if !access.create_if_absent()? {
        return Err(StorageError::CreateFailed {
            key: access.key().to_string(),
        }
        .into());
    }
    access.atomic_replace(|sink: &mut dyn Write| -> StoreResult<()> {
        Ok(converter.write(value, sink)?)
    })
}
