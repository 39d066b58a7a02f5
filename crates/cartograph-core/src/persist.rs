//! The per-document artifact handed to storage, and a gzip codec for it.

use crate::Result;
use crate::groups::canonicalize;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::{Read, Write};

/// Group data of one document version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedGroups {
    /// Every group, keyed by id.
    pub data: Map<String, Value>,
    /// Groups some tag asked to have available live.
    #[serde(default)]
    pub live: Map<String, Value>,
    /// At least one tag was processed successfully.
    #[serde(default)]
    pub valid: bool,
    /// At least one tag failed.
    #[serde(default)]
    pub broken: bool,
}

impl PersistedGroups {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn group(&self, id: &str) -> Option<&Value> {
        self.data.get(id)
    }

    /// JSON with object keys sorted at every depth.
    pub fn to_canonical_json(&self) -> Result<String> {
        Ok(canonicalize(&serde_json::to_value(self)?).to_string())
    }
}

/// Gzip-compressed canonical JSON.
pub fn encode(groups: &PersistedGroups) -> Result<Vec<u8>> {
    let json = groups.to_canonical_json()?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(json.as_bytes())?;
    Ok(encoder.finish()?)
}

pub fn decode(bytes: &[u8]) -> Result<PersistedGroups> {
    let mut json = String::new();
    GzDecoder::new(bytes).read_to_string(&mut json)?;
    Ok(serde_json::from_str(&json)?)
}
