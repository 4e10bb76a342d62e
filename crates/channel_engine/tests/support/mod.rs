#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use channel_core::Handle;
use channel_engine::{
    DialogStream, EntityKind, MediaKind, MediaRef, MessageStream, RemoteChannelService,
    RemoteEntity, RemoteMessage, SearchQuery, SearchResults, ServiceError, Sleeper,
};
use chrono::{DateTime, TimeZone, Utc};
use futures_util::{stream, StreamExt};
use tokio_util::sync::CancellationToken;

/// Calls made against the scripted service and sleeper, in order.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn handle(raw: &str) -> Handle {
    Handle::parse(raw).unwrap()
}

pub fn handles(raw: &[&str]) -> Vec<Handle> {
    raw.iter().map(|r| handle(r)).collect()
}

pub fn posted_at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 9, minute, 0).unwrap()
}

pub fn entity(id: i64, kind: EntityKind, username: Option<&str>, title: &str) -> RemoteEntity {
    RemoteEntity {
        id,
        kind,
        username: username.map(str::to_string),
        title: title.to_string(),
        participants_count: Some(1000 + id as u64),
    }
}

pub fn channel_entity(id: i64, username: &str) -> RemoteEntity {
    entity(id, EntityKind::Channel, Some(username), &format!("{username} title"))
}

pub fn message(id: i64, channel_id: i64, text: &str) -> RemoteMessage {
    RemoteMessage {
        id,
        channel_id: Some(channel_id),
        text: Some(text.to_string()),
        date: posted_at((id % 60) as u32),
        views: Some(10 * id as u64),
        forwards: Some(id as u64),
        media: None,
    }
}

pub fn with_photo(mut message: RemoteMessage, media_id: &str) -> RemoteMessage {
    message.media = Some(MediaRef {
        id: media_id.to_string(),
        kind: MediaKind::Photo,
    });
    message
}

#[derive(Default)]
struct Script {
    connect_error: Option<ServiceError>,
    authorized: bool,
    entities: HashMap<String, RemoteEntity>,
    resolve_failures: HashMap<String, VecDeque<ServiceError>>,
    messages: HashMap<i64, Vec<RemoteMessage>>,
    message_failures: HashMap<i64, VecDeque<ServiceError>>,
    history_breaks: HashMap<i64, (usize, ServiceError)>,
    searches: HashMap<String, Result<SearchResults, ServiceError>>,
    dialogs: Vec<Result<RemoteEntity, ServiceError>>,
    media: HashMap<String, Result<Vec<u8>, ServiceError>>,
}

/// In-memory service driven by a fixed script. Scripted failures are
/// consumed one per call before the normal answer is given.
pub struct ScriptedService {
    script: Mutex<Script>,
    log: EventLog,
}

impl ScriptedService {
    pub fn new(log: EventLog) -> Self {
        Self {
            script: Mutex::new(Script {
                authorized: true,
                ..Script::default()
            }),
            log,
        }
    }

    fn edit(self, f: impl FnOnce(&mut Script)) -> Self {
        f(&mut *self.script.lock().unwrap());
        self
    }

    /// A broadcast channel whose messages carry the given texts, newest first.
    pub fn channel(self, username: &str, id: i64, texts: &[&str]) -> Self {
        let messages = texts
            .iter()
            .enumerate()
            .map(|(i, text)| message(id * 100 + i as i64, id, text))
            .collect();
        self.entity(channel_entity(id, username))
            .messages(id, messages)
    }

    pub fn entity(self, entity: RemoteEntity) -> Self {
        self.edit(|s| {
            let key = entity
                .username
                .clone()
                .unwrap_or_else(|| entity.id.to_string())
                .to_lowercase();
            s.entities.insert(key, entity);
        })
    }

    pub fn messages(self, channel_id: i64, messages: Vec<RemoteMessage>) -> Self {
        self.edit(|s| {
            s.messages.insert(channel_id, messages);
        })
    }

    pub fn fail_resolve(self, handle: &str, err: ServiceError) -> Self {
        self.edit(|s| {
            s.resolve_failures
                .entry(handle.to_lowercase())
                .or_default()
                .push_back(err);
        })
    }

    pub fn fail_messages(self, channel_id: i64, err: ServiceError) -> Self {
        self.edit(|s| {
            s.message_failures
                .entry(channel_id)
                .or_default()
                .push_back(err);
        })
    }

    /// Every read of the channel's history yields `after` messages, then `err`.
    pub fn break_history(self, channel_id: i64, after: usize, err: ServiceError) -> Self {
        self.edit(|s| {
            s.history_breaks.insert(channel_id, (after, err));
        })
    }

    pub fn search(self, query: &str, result: Result<SearchResults, ServiceError>) -> Self {
        self.edit(|s| {
            s.searches.insert(query.to_string(), result);
        })
    }

    pub fn dialogs(self, dialogs: Vec<Result<RemoteEntity, ServiceError>>) -> Self {
        self.edit(|s| s.dialogs = dialogs)
    }

    pub fn media(self, media_id: &str, result: Result<Vec<u8>, ServiceError>) -> Self {
        self.edit(|s| {
            s.media.insert(media_id.to_string(), result);
        })
    }

    pub fn unauthorized(self) -> Self {
        self.edit(|s| s.authorized = false)
    }

    pub fn refuse_connect(self, err: ServiceError) -> Self {
        self.edit(|s| s.connect_error = Some(err))
    }

    fn record(&self, event: String) {
        self.log.lock().unwrap().push(event);
    }
}

#[async_trait::async_trait]
impl RemoteChannelService for ScriptedService {
    async fn connect(&self) -> Result<(), ServiceError> {
        self.record("connect".into());
        match self.script.lock().unwrap().connect_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn is_authorized(&self) -> Result<bool, ServiceError> {
        self.record("is_authorized".into());
        Ok(self.script.lock().unwrap().authorized)
    }

    async fn disconnect(&self) {
        self.record("disconnect".into());
    }

    async fn search(
        &self,
        query: &SearchQuery,
        _limit: usize,
    ) -> Result<SearchResults, ServiceError> {
        self.record(format!("search:{query}"));
        self.script
            .lock()
            .unwrap()
            .searches
            .get(&query.to_string())
            .cloned()
            .unwrap_or_else(|| Ok(SearchResults::default()))
    }

    async fn resolve_entity(&self, handle: &Handle) -> Result<RemoteEntity, ServiceError> {
        self.record(format!("resolve:{handle}"));
        let mut script = self.script.lock().unwrap();
        if let Some(err) = script
            .resolve_failures
            .get_mut(handle.as_str())
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        script
            .entities
            .get(handle.as_str())
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(handle.to_string()))
    }

    fn iter_messages<'a>(&'a self, entity: &'a RemoteEntity, limit: usize) -> MessageStream<'a> {
        let label = entity
            .username
            .clone()
            .unwrap_or_else(|| entity.id.to_string())
            .to_lowercase();
        self.record(format!("messages:{label}"));
        let mut script = self.script.lock().unwrap();
        if let Some(err) = script
            .message_failures
            .get_mut(&entity.id)
            .and_then(VecDeque::pop_front)
        {
            return stream::iter(vec![Err(err)]).boxed();
        }
        let stored = script.messages.get(&entity.id).cloned().unwrap_or_default();
        let items: Vec<_> = match script.history_breaks.get(&entity.id) {
            Some((after, err)) => stored
                .into_iter()
                .take(limit.min(*after))
                .map(Ok)
                .chain(std::iter::once(Err(err.clone())))
                .collect(),
            None => stored.into_iter().take(limit).map(Ok).collect(),
        };
        stream::iter(items).boxed()
    }

    fn iter_dialogs(&self) -> DialogStream<'_> {
        self.record("dialogs".into());
        let dialogs = self.script.lock().unwrap().dialogs.clone();
        stream::iter(dialogs).boxed()
    }

    async fn download_media(&self, media: &MediaRef) -> Result<Vec<u8>, ServiceError> {
        self.record(format!("media:{}", media.id));
        self.script
            .lock()
            .unwrap()
            .media
            .get(&media.id)
            .cloned()
            .unwrap_or_else(|| Err(ServiceError::NotFound(media.id.clone())))
    }
}

/// Returns immediately, logging each requested pause into the shared log.
pub struct RecordingSleeper {
    log: EventLog,
    cancel_on_first_sleep: Option<CancellationToken>,
}

impl RecordingSleeper {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            cancel_on_first_sleep: None,
        }
    }

    pub fn cancelling(log: EventLog, token: CancellationToken) -> Self {
        Self {
            log,
            cancel_on_first_sleep: Some(token),
        }
    }
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.log.lock().unwrap().push(format!("sleep:{duration:?}"));
        if let Some(token) = &self.cancel_on_first_sleep {
            token.cancel();
        }
    }
}

/// Never finishes a pause, leaving the caller suspended.
pub struct StalledSleeper;

#[async_trait::async_trait]
impl Sleeper for StalledSleeper {
    async fn sleep(&self, _duration: Duration) {
        std::future::pending::<()>().await;
    }
}
