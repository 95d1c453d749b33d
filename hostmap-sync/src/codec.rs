//! Persisted record-set encoding: gzip-compressed JSON.
//!
//! ```json
//! [{"hostname": "ncn-w001", "ip-address": "10.252.1.7"}, ...]
//! ```
//!
//! Encoding is canonical (sorted by name, then address; fixed gzip header),
//! so equal sets always produce byte-identical blobs. Decoding accepts any
//! order and drops blank or duplicate entries.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use hostmap_core::{DnsRecord, RecordSet};

use crate::error::SyncError;

fn codec_err(reason: impl std::fmt::Display) -> SyncError {
    SyncError::Codec {
        reason: reason.to_string(),
    }
}

pub fn encode(records: &RecordSet) -> Result<Vec<u8>, SyncError> {
    let json = serde_json::to_vec(&records.canonical()).map_err(codec_err)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json).map_err(codec_err)?;
    encoder.finish().map_err(codec_err)
}

pub fn decode(bytes: &[u8]) -> Result<RecordSet, SyncError> {
    let mut json = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut json)
        .map_err(codec_err)?;
    let records: Vec<DnsRecord> = serde_json::from_slice(&json).map_err(codec_err)?;
    Ok(records.into_iter().collect())
}
