use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{MESSAGE_URL_PREFIX, SOURCE_ID_PREFIX};
use crate::{Handle, Message};

pub const PLATFORM: &str = "telegram";

/// Generic record handed to the downstream ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    pub source_url: String,
    pub source_id: String,
    pub raw_text: String,
    pub photos: Vec<Vec<u8>>,
    pub platform: String,
    pub scraped_at: DateTime<Utc>,
    pub views: u64,
    pub forwards: u64,
    pub channel: String,
    pub message_date: DateTime<Utc>,
}

/// Maps a message to a listing. `scraped_at` is the capture time, not the message time.
pub fn to_listing(message: &Message, scraped_at: DateTime<Utc>) -> ListingRecord {
    ListingRecord {
        source_url: message.url(),
        source_id: message.source_id(),
        raw_text: message.text.clone(),
        photos: message.media_bytes.iter().cloned().collect(),
        platform: PLATFORM.to_string(),
        scraped_at,
        views: message.view_count,
        forwards: message.forward_count,
        channel: message.channel_handle.to_string(),
        message_date: message.timestamp,
    }
}

/// Listing mapper with an injected capture clock.
#[derive(Clone)]
pub struct ListingAdapter {
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl ListingAdapter {
    pub fn new(clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        Self { clock }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(Utc::now))
    }

    pub fn map(&self, message: &Message) -> ListingRecord {
        to_listing(message, (self.clock)())
    }

    pub fn map_all<'a>(&self, messages: impl IntoIterator<Item = &'a Message>) -> Vec<ListingRecord> {
        let scraped_at = (self.clock)();
        messages
            .into_iter()
            .map(|message| to_listing(message, scraped_at))
            .collect()
    }
}

impl fmt::Debug for ListingAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListingAdapter").finish_non_exhaustive()
    }
}

/// Inverse of [`Message::url`].
pub fn parse_source_url(url: &str) -> Option<(Handle, i64)> {
    let rest = url.strip_prefix(MESSAGE_URL_PREFIX)?;
    let (handle, id) = rest.split_once('/')?;
    Some((Handle::parse(handle).ok()?, id.parse().ok()?))
}

/// Inverse of [`Message::source_id`]. Message ids are numeric, so the last `_` separates them.
pub fn parse_source_id(source_id: &str) -> Option<(Handle, i64)> {
    let rest = source_id.strip_prefix(SOURCE_ID_PREFIX)?;
    let (handle, id) = rest.rsplit_once('_')?;
    Some((Handle::parse(handle).ok()?, id.parse().ok()?))
}
