//! Metadata model
//!
//! A configuration file is stored as two keys: the opaque content and a small
//! JSON metadata record next to it. Writers update the metadata record last,
//! so a change to it is the signal watchers act on.
//!
//! ## Record Format
//! ```text
//! {"createTime": 1700000000, "updateTime": 1700000042, "gray": ["host-a"], "version": 3}
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

/// Descriptor stored under a file's metadata key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Unix seconds; set once when the file is created
    #[serde(default)]
    pub create_time: i64,

    /// Unix seconds; refreshed on every mutation
    #[serde(default)]
    pub update_time: i64,

    /// Consumers allowed to see this revision before it goes fleet-wide.
    /// Empty means every consumer.
    #[serde(default, deserialize_with = "deserialize_gray")]
    pub gray: Vec<String>,

    /// Store-assigned version of the content write this record describes
    #[serde(default)]
    pub version: i64,
}

impl Metadata {
    /// Decode a metadata record from its JSON bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode to JSON bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Stamp timestamps for a write at `now`. `create_time` is only set when
    /// it has never been set.
    pub fn touch(&mut self, now: i64) {
        if self.create_time == 0 {
            self.create_time = now;
        }
        self.update_time = now;
    }

    /// True if the revision is restricted to a gray list
    pub fn is_gray(&self) -> bool {
        !self.gray.is_empty()
    }
}

/// Accepts either a list of identities or the legacy comma-separated string.
fn deserialize_gray<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Gray {
        List(Vec<String>),
        Joined(String),
    }

    let entries = match Option::<Gray>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Gray::List(list)) => list,
        Some(Gray::Joined(joined)) => joined.split(',').map(str::to_string).collect(),
    };

    Ok(entries
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// A configuration file and its metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct File {
    pub group: String,
    pub name: String,

    /// Opaque payload
    pub content: Bytes,

    /// Store-assigned version of the content key (0 if never written)
    pub version: i64,

    pub meta: Metadata,
}

impl File {
    /// Create a file with empty metadata
    pub fn new(group: impl Into<String>, name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            content: content.into(),
            version: 0,
            meta: Metadata::default(),
        }
    }

    /// Restrict delivery of the next write to the given consumers
    pub fn with_gray<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta.gray = targets.into_iter().map(Into::into).collect();
        self
    }
}

/// Current time as unix seconds
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
