use std::sync::Arc;

use channel_core::{
    Handle, ListingAdapter, ListingRecord, Message, PricePatternFilter, RelevanceFilter,
};
use crawl_logging::{crawl_debug, crawl_info, crawl_warn};
use futures_util::TryStreamExt;
use tokio_util::sync::CancellationToken;

use crate::backoff::retry_on_flood_wait;
use crate::session::Session;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::{CrawlError, RemoteChannelService, RemoteEntity, RemoteMessage, ServiceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub limit: usize,
    pub filter_content: bool,
    pub download_media: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            limit: 100,
            filter_content: true,
            download_media: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelExtraction {
    pub channel: Handle,
    pub messages: Vec<Message>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListingBatch {
    pub listings: Vec<ListingRecord>,
    /// Listing count per channel, in request order.
    pub per_channel: Vec<(Handle, usize)>,
    pub failed: Vec<(Handle, String)>,
    pub cancelled: bool,
}

pub struct ExtractionEngine {
    service: Arc<dyn RemoteChannelService>,
    sleeper: Arc<dyn Sleeper>,
    filter: Arc<dyn RelevanceFilter>,
    cancel: CancellationToken,
}

impl ExtractionEngine {
    pub fn new(service: Arc<dyn RemoteChannelService>) -> Self {
        Self {
            service,
            sleeper: Arc::new(TokioSleeper),
            filter: Arc::new(PricePatternFilter::default()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn RelevanceFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Messages from one channel. A private channel or history yields an empty list.
    pub async fn extract(
        &self,
        channel: &Handle,
        options: ExtractOptions,
    ) -> Result<Vec<Message>, CrawlError> {
        let session = Session::open(self.service.clone()).await?;
        let result = self.extract_in_session(channel, options).await;
        session.close().await;
        result
    }

    /// Extracts several channels within one session. Per-channel failures are
    /// recorded and do not stop the batch.
    pub async fn extract_many(
        &self,
        channels: &[Handle],
        options: ExtractOptions,
    ) -> Result<Vec<ChannelExtraction>, CrawlError> {
        if channels.is_empty() {
            return Err(CrawlError::InvalidInput("channel list is empty".into()));
        }

        let session = Session::open(self.service.clone()).await?;
        let mut results = Vec::with_capacity(channels.len());
        for channel in channels {
            if self.cancel.is_cancelled() {
                crawl_warn!("Extraction cancelled before {}", channel);
                break;
            }
            let extraction = match self.extract_in_session(channel, options).await {
                Ok(messages) => ChannelExtraction {
                    channel: channel.clone(),
                    messages,
                    error: None,
                },
                Err(err) => {
                    crawl_warn!("Error extracting from {}: {}", channel, err);
                    ChannelExtraction {
                        channel: channel.clone(),
                        messages: Vec::new(),
                        error: Some(err.to_string()),
                    }
                }
            };
            results.push(extraction);
        }
        session.close().await;
        Ok(results)
    }

    /// Extracts and maps every channel's messages to pipeline listings.
    pub async fn harvest_listings(
        &self,
        channels: &[Handle],
        options: ExtractOptions,
        adapter: &ListingAdapter,
    ) -> Result<ListingBatch, CrawlError> {
        let extractions = self.extract_many(channels, options).await?;
        let mut batch = ListingBatch {
            cancelled: extractions.len() < channels.len(),
            ..ListingBatch::default()
        };
        for extraction in extractions {
            if let Some(error) = extraction.error {
                batch.failed.push((extraction.channel.clone(), error));
            }
            let listings = adapter.map_all(&extraction.messages);
            crawl_info!("{}: {} listings", extraction.channel, listings.len());
            batch
                .per_channel
                .push((extraction.channel, listings.len()));
            batch.listings.extend(listings);
        }
        Ok(batch)
    }

    async fn extract_in_session(
        &self,
        channel: &Handle,
        options: ExtractOptions,
    ) -> Result<Vec<Message>, CrawlError> {
        let sleeper = self.sleeper.as_ref();
        let entity = match retry_on_flood_wait(sleeper, channel.as_str(), || {
            self.service.resolve_entity(channel)
        })
        .await
        {
            Ok(entity) => entity,
            Err(ServiceError::PrivateResource(_)) => {
                crawl_info!("Channel {} is private", channel);
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let raw = match retry_on_flood_wait(sleeper, channel.as_str(), || {
            self.collect_messages(&entity, options.limit)
        })
        .await
        {
            Ok(raw) => raw,
            Err(ServiceError::PrivateResource(_)) => {
                crawl_info!("History of {} is private", channel);
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let mut messages = Vec::new();
        for remote in raw {
            let Some(text) = remote.content() else {
                continue;
            };
            if options.filter_content && !self.filter.is_relevant(text) {
                continue;
            }
            let media_bytes = if options.download_media {
                self.download(channel, &remote).await
            } else {
                None
            };
            messages.push(Message {
                channel_handle: channel.clone(),
                message_id: remote.id,
                text: text.to_string(),
                timestamp: remote.date,
                view_count: remote.views.unwrap_or(0),
                forward_count: remote.forwards.unwrap_or(0),
                has_media: remote.media.is_some(),
                media_bytes,
            });
        }
        crawl_debug!("{}: kept {} messages", channel, messages.len());
        Ok(messages)
    }

    async fn collect_messages(
        &self,
        entity: &RemoteEntity,
        limit: usize,
    ) -> Result<Vec<RemoteMessage>, ServiceError> {
        self.service
            .iter_messages(entity, limit)
            .try_collect()
            .await
    }

    /// A failed download keeps the message, without its bytes.
    async fn download(&self, channel: &Handle, message: &RemoteMessage) -> Option<Vec<u8>> {
        let media = message.media.as_ref()?;
        let label = format!("{channel}/{}", message.id);
        match retry_on_flood_wait(self.sleeper.as_ref(), &label, || {
            self.service.download_media(media)
        })
        .await
        {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                crawl_warn!("Media download failed for {}: {}", label, err);
                None
            }
        }
    }
}
