//! postcard encode/decode helpers shared by every table accessor, with the
//! same deserialization size guard the teacher applies before trusting a
//! stored blob.

use memory_core::Error;
use serde::{de::DeserializeOwned, Serialize};

use crate::tables::MAX_ROW_SIZE;

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    postcard::to_allocvec(value).map_err(|e| Error::Storage(format!("encode failed: {e}")))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    if bytes.len() > MAX_ROW_SIZE {
        return Err(Error::Storage(format!(
            "stored row of {} bytes exceeds the {MAX_ROW_SIZE} byte limit",
            bytes.len()
        )));
    }
    postcard::from_bytes(bytes).map_err(|e| Error::Storage(format!("decode failed: {e}")))
}
