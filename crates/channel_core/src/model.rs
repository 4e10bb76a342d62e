use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Handle;

pub const MESSAGE_URL_PREFIX: &str = "https://t.me/";
pub const SOURCE_ID_PREFIX: &str = "tg_";

/// How a channel was first observed during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMethod {
    Search,
    Spider,
    Seed,
    Subscribed,
}

impl DiscoveryMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscoveryMethod::Search => "search",
            DiscoveryMethod::Spider => "spider",
            DiscoveryMethod::Seed => "seed",
            DiscoveryMethod::Subscribed => "subscribed",
        }
    }
}

impl fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub handle: Handle,
    pub title: String,
    pub numeric_id: i64,
    pub participant_count: Option<u64>,
    pub discovery_method: DiscoveryMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub channel_handle: Handle,
    pub message_id: i64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub view_count: u64,
    pub forward_count: u64,
    pub has_media: bool,
    pub media_bytes: Option<Vec<u8>>,
}

impl Message {
    pub fn url(&self) -> String {
        message_url(&self.channel_handle, self.message_id)
    }

    pub fn source_id(&self) -> String {
        source_id(&self.channel_handle, self.message_id)
    }
}

pub fn message_url(handle: &Handle, message_id: i64) -> String {
    format!("{MESSAGE_URL_PREFIX}{handle}/{message_id}")
}

/// Stable downstream dedup key. Two messages with the same key are the same listing.
pub fn source_id(handle: &Handle, message_id: i64) -> String {
    format!("{SOURCE_ID_PREFIX}{handle}_{message_id}")
}
