//! Serialization Codec
//!
//! Converts records to and from JSON bytes, and to the document shape the
//! persistent store keeps (`_id` holds the record key).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GridError, Result};
use crate::record::{validate_grid_key, Record, MAX_VALUE_SIZE};

/// Encodes a record as JSON bytes.
pub fn encode(record: &Record) -> Result<Vec<u8>> {
    check(record)?;
    Ok(serde_json::to_vec(record)?)
}

/// Decodes JSON bytes into a record, rejecting schema mismatches.
pub fn decode(bytes: &[u8]) -> Result<Record> {
    let record: Record = serde_json::from_slice(bytes)?;
    check(&record)?;
    Ok(record)
}

// == Stored Document ==
/// On-disk / in-store shape of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    pub value: Value,
    pub version: u64,
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl From<&Record> for Document {
    fn from(record: &Record) -> Self {
        Self {
            id: record.key.clone(),
            value: record.value.clone(),
            version: record.version,
            origin: record.origin.clone(),
            expires_at: record.expires_at,
        }
    }
}

impl From<Document> for Record {
    fn from(doc: Document) -> Self {
        Self {
            key: doc.id,
            value: doc.value,
            version: doc.version,
            origin: doc.origin,
            expires_at: doc.expires_at,
        }
    }
}

/// Encodes a record as a pretty-printed store document.
pub fn encode_document(record: &Record) -> Result<Vec<u8>> {
    check(record)?;
    Ok(serde_json::to_vec_pretty(&Document::from(record))?)
}

/// Decodes a store document back into a record.
pub fn decode_document(bytes: &[u8]) -> Result<Record> {
    let doc: Document = serde_json::from_slice(bytes)?;
    let record = Record::from(doc);
    check(&record)?;
    Ok(record)
}

fn check(record: &Record) -> Result<()> {
    validate_grid_key(&record.key).map_err(|e| GridError::MalformedData(e.to_string()))?;
    if record.origin.is_empty() {
        return Err(GridError::MalformedData("Record origin cannot be empty".to_string()));
    }
    let size = serde_json::to_vec(&record.value)?.len();
    if size > MAX_VALUE_SIZE {
        return Err(GridError::MalformedData(format!(
            "Value exceeds maximum size of {} bytes",
            MAX_VALUE_SIZE
        )));
    }
    Ok(())
}
