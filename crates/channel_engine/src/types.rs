use std::fmt;
use std::time::Duration;

use channel_core::{Channel, DiscoveryMethod, Handle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Channel,
    Supergroup,
    Group,
    User,
}

impl EntityKind {
    /// Broadcast channels and supergroups; basic groups and users are not crawled.
    pub fn is_channel_like(self) -> bool {
        matches!(self, EntityKind::Channel | EntityKind::Supergroup)
    }
}

/// A resolved peer as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntity {
    pub id: i64,
    pub kind: EntityKind,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub participants_count: Option<u64>,
}

impl RemoteEntity {
    pub fn public_handle(&self) -> Option<Handle> {
        self.username
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .and_then(|u| Handle::parse(u).ok())
    }

    pub fn to_channel(&self, handle: Handle, discovery_method: DiscoveryMethod) -> Channel {
        Channel {
            handle,
            title: self.title.clone(),
            numeric_id: self.id,
            participant_count: self.participants_count,
            discovery_method,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Document,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub id: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMessage {
    pub id: i64,
    /// Numeric id of the channel that posted the message, when known.
    #[serde(default)]
    pub channel_id: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub views: Option<u64>,
    #[serde(default)]
    pub forwards: Option<u64>,
    #[serde(default)]
    pub media: Option<MediaRef>,
}

impl RemoteMessage {
    /// Message text, or `None` when it is missing or blank.
    pub fn content(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Hashtag and free-text search are separate remote operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    Hashtag(String),
    Text(String),
}

impl SearchQuery {
    /// A leading `#` selects hashtag search; the marker is stripped.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        match trimmed.strip_prefix('#') {
            Some(tag) => {
                let tag = tag.trim();
                (!tag.is_empty()).then(|| SearchQuery::Hashtag(tag.to_string()))
            }
            None => (!trimmed.is_empty()).then(|| SearchQuery::Text(trimmed.to_string())),
        }
    }

    pub fn term(&self) -> &str {
        match self {
            SearchQuery::Hashtag(tag) => tag,
            SearchQuery::Text(text) => text,
        }
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchQuery::Hashtag(tag) => write!(f, "#{tag}"),
            SearchQuery::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub chats: Vec<RemoteEntity>,
    #[serde(default)]
    pub messages: Vec<RemoteMessage>,
}

/// Failures reported by a [`crate::RemoteChannelService`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },
    #[error("{0} is private")]
    PrivateResource(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("session unauthorized: {0}")]
    Unauthorized(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Failures surfaced by the discovery, spider and extraction operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CrawlError {
    #[error("{message}; {remediation}")]
    Setup { message: String, remediation: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("rate limited by the service, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },
    #[error(transparent)]
    Service(ServiceError),
}

impl CrawlError {
    pub fn setup(message: impl Into<String>, remediation: impl Into<String>) -> Self {
        CrawlError::Setup {
            message: message.into(),
            remediation: remediation.into(),
        }
    }

    pub fn is_setup(&self) -> bool {
        matches!(self, CrawlError::Setup { .. })
    }
}

impl From<ServiceError> for CrawlError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::RateLimited { retry_after } => CrawlError::RateLimited { retry_after },
            other => CrawlError::Service(other),
        }
    }
}
