use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use channel_core::{Channel, ChannelRegistry, DiscoveryMethod, Handle, Message};
use crawl_logging::{crawl_debug, crawl_info, crawl_warn};
use futures_util::StreamExt;

use crate::session::Session;
use crate::{CrawlError, RemoteChannelService, SearchQuery, SearchResults};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryResult {
    pub channels: Vec<Channel>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleDiscovery {
    /// Channels merged across queries, first observation wins.
    pub channels: Vec<Channel>,
    pub messages: Vec<Message>,
    pub completed_queries: usize,
    /// Set when a query was rate limited; later queries were not run.
    pub rate_limited: Option<Duration>,
}

/// Keyword and hashtag search. Rate limits are reported, never waited out.
pub struct DiscoveryEngine {
    service: Arc<dyn RemoteChannelService>,
}

impl DiscoveryEngine {
    pub fn new(service: Arc<dyn RemoteChannelService>) -> Self {
        Self { service }
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<DiscoveryResult, CrawlError> {
        let query = parse_query(query)?;
        let session = Session::open(self.service.clone()).await?;
        let result = self.search_in_session(&query, limit).await;
        session.close().await;
        result
    }

    /// Runs every query in one session and merges their channels.
    pub async fn search_all(
        &self,
        queries: &[String],
        limit: usize,
    ) -> Result<LocaleDiscovery, CrawlError> {
        if queries.is_empty() {
            return Err(CrawlError::InvalidInput("query list is empty".into()));
        }
        let parsed = queries
            .iter()
            .map(|q| parse_query(q))
            .collect::<Result<Vec<_>, _>>()?;

        let session = Session::open(self.service.clone()).await?;
        let mut registry = ChannelRegistry::new();
        let mut discovery = LocaleDiscovery::default();
        let mut outcome = Ok(());
        for query in &parsed {
            match self.search_in_session(query, limit).await {
                Ok(result) => {
                    crawl_info!(
                        "{}: {} channels, {} messages",
                        query,
                        result.channels.len(),
                        result.messages.len()
                    );
                    registry.extend(result.channels);
                    discovery.messages.extend(result.messages);
                    discovery.completed_queries += 1;
                }
                Err(CrawlError::RateLimited { retry_after }) => {
                    crawl_warn!(
                        "Rate limited on {}, wait {}s before searching again",
                        query,
                        retry_after.as_secs()
                    );
                    discovery.rate_limited = Some(retry_after);
                    break;
                }
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }
        session.close().await;

        outcome?;
        discovery.channels = registry.into_channels();
        Ok(discovery)
    }

    /// Channel-like dialogs of the session's account.
    pub async fn list_subscribed(&self) -> Result<Vec<Channel>, CrawlError> {
        let session = Session::open(self.service.clone()).await?;
        let result = self.collect_dialogs().await;
        session.close().await;
        result
    }

    async fn search_in_session(
        &self,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<DiscoveryResult, CrawlError> {
        crawl_debug!("Searching {:?} (limit {})", query, limit);
        let results = self.service.search(query, limit).await?;
        Ok(collate_search_results(results))
    }

    async fn collect_dialogs(&self) -> Result<Vec<Channel>, CrawlError> {
        let mut registry = ChannelRegistry::new();
        let mut dialogs = self.service.iter_dialogs();
        while let Some(entity) = dialogs.next().await {
            let entity = entity.map_err(CrawlError::from)?;
            if !entity.kind.is_channel_like() {
                continue;
            }
            let handle = entity
                .public_handle()
                .unwrap_or_else(|| Handle::from_numeric_id(entity.id));
            registry.record(entity.to_channel(handle, DiscoveryMethod::Subscribed));
        }
        Ok(registry.into_channels())
    }
}

fn parse_query(raw: &str) -> Result<SearchQuery, CrawlError> {
    SearchQuery::parse(raw)
        .ok_or_else(|| CrawlError::InvalidInput(format!("empty search query {raw:?}")))
}

/// Turns a raw search page into channels and fully attributed messages.
///
/// Channels are deduplicated by numeric id and kept only with a public handle.
/// A message is kept only if its channel is among the results with a handle.
pub fn collate_search_results(results: SearchResults) -> DiscoveryResult {
    let mut seen_ids = HashSet::new();
    let mut handles_by_id: HashMap<i64, Handle> = HashMap::new();
    let mut registry = ChannelRegistry::new();

    for chat in &results.chats {
        if !seen_ids.insert(chat.id) {
            continue;
        }
        if !chat.kind.is_channel_like() {
            continue;
        }
        let Some(handle) = chat.public_handle() else {
            continue;
        };
        handles_by_id.insert(chat.id, handle.clone());
        registry.record(chat.to_channel(handle, DiscoveryMethod::Search));
    }

    let messages = results
        .messages
        .into_iter()
        .filter_map(|msg| {
            let text = msg.content()?.to_string();
            let handle = msg.channel_id.and_then(|id| handles_by_id.get(&id))?;
            Some(Message {
                channel_handle: handle.clone(),
                message_id: msg.id,
                text,
                timestamp: msg.date,
                view_count: msg.views.unwrap_or(0),
                forward_count: msg.forwards.unwrap_or(0),
                has_media: msg.media.is_some(),
                media_bytes: None,
            })
        })
        .collect();

    DiscoveryResult {
        channels: registry.into_channels(),
        messages,
    }
}
