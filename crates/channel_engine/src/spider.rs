//! Breadth-first channel discovery by following links found in message text.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use channel_core::{
    extract_handles, Channel, ChannelRegistry, DiscoveryMethod, Handle, RateBudget,
    TraversalFrontier,
};
use crawl_logging::{crawl_debug, crawl_info, crawl_warn};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::backoff::retry_on_flood_wait;
use crate::session::Session;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::{CrawlError, EntityKind, RemoteChannelService, RemoteEntity, ServiceError};

#[derive(Debug, Clone)]
pub struct SpiderSettings {
    /// Upper bound on handles resolved per depth level.
    pub level_ceiling: usize,
    /// Pause after every handle, whatever its outcome.
    pub pacing: Duration,
}

impl Default for SpiderSettings {
    fn default() -> Self {
        Self {
            level_ceiling: 25,
            pacing: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiderReport {
    /// Resolved channels in discovery order, one per handle.
    pub channels: Vec<Channel>,
    /// Discovered but not resolved in this run; candidates for a future run.
    pub pending: Vec<Handle>,
    pub private: Vec<Handle>,
    /// Resolved to something other than a channel.
    pub skipped: Vec<(Handle, EntityKind)>,
    pub failed: Vec<(Handle, String)>,
    pub depth_reached: usize,
    pub budget: RateBudget,
    pub cancelled: bool,
}

enum Harvest {
    Channel {
        entity: RemoteEntity,
        links: BTreeSet<Handle>,
    },
    NotAChannel(EntityKind),
}

pub struct SpiderEngine {
    service: Arc<dyn RemoteChannelService>,
    sleeper: Arc<dyn Sleeper>,
    settings: SpiderSettings,
    cancel: CancellationToken,
}

impl SpiderEngine {
    pub fn new(service: Arc<dyn RemoteChannelService>, settings: SpiderSettings) -> Self {
        Self {
            service,
            sleeper: Arc::new(TokioSleeper),
            settings,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Cancellation is observed between handles, never during one.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn spider(
        &self,
        seeds: &[Handle],
        max_depth: usize,
        per_channel_limit: usize,
        budget: RateBudget,
    ) -> Result<SpiderReport, CrawlError> {
        if seeds.is_empty() {
            return Err(CrawlError::InvalidInput("seed list is empty".into()));
        }
        if self.settings.level_ceiling == 0 {
            return Err(CrawlError::InvalidInput(
                "level ceiling must be at least 1".into(),
            ));
        }

        let session = Session::open(self.service.clone()).await?;
        let report = self
            .traverse(seeds, max_depth, per_channel_limit, budget)
            .await;
        session.close().await;

        crawl_info!(
            "Spider finished: {} channels, {} pending, {} private, {} failed, depth {}",
            report.channels.len(),
            report.pending.len(),
            report.private.len(),
            report.failed.len(),
            report.depth_reached
        );
        Ok(report)
    }

    async fn traverse(
        &self,
        seeds: &[Handle],
        max_depth: usize,
        per_channel_limit: usize,
        mut budget: RateBudget,
    ) -> SpiderReport {
        let mut frontier = TraversalFrontier::new(seeds.iter().cloned());
        let mut registry = ChannelRegistry::new();
        let mut private = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = Vec::new();
        let mut cancelled = false;

        'levels: while frontier.current_depth() < max_depth && !frontier.is_exhausted() {
            if budget.is_exhausted() {
                crawl_info!(
                    "Action budget spent at depth {}; {} handles left for a later run",
                    frontier.current_depth() + 1,
                    frontier.queued_len()
                );
                break;
            }

            // Only handles queued before this level started belong to it.
            let batch = budget
                .batch_size(self.settings.level_ceiling)
                .min(frontier.queued_len());
            crawl_info!(
                "Depth {}: processing {} of {} queued channels",
                frontier.current_depth() + 1,
                batch,
                frontier.queued_len()
            );

            for _ in 0..batch {
                if self.cancel.is_cancelled() {
                    crawl_warn!("Spider cancelled before the next handle");
                    cancelled = true;
                    break 'levels;
                }
                let Some(handle) = frontier.pop_next() else {
                    break;
                };
                budget.try_spend();

                let handle = &handle;
                let result = retry_on_flood_wait(self.sleeper.as_ref(), handle.as_str(), || {
                    self.harvest(handle, per_channel_limit)
                })
                .await;

                match result {
                    Ok(Harvest::Channel { entity, links }) => {
                        let method = if frontier.current_depth() == 0 {
                            DiscoveryMethod::Seed
                        } else {
                            DiscoveryMethod::Spider
                        };
                        registry.record(entity.to_channel(handle.clone(), method));
                        let mut added = 0;
                        for link in links {
                            if &link != handle && frontier.enqueue(link) {
                                added += 1;
                            }
                        }
                        crawl_debug!("{}: {} new handles queued", handle, added);
                    }
                    Ok(Harvest::NotAChannel(kind)) => {
                        crawl_debug!("{} resolved to {:?}, skipping", handle, kind);
                        skipped.push((handle.clone(), kind));
                    }
                    Err(ServiceError::PrivateResource(_)) => {
                        crawl_info!("{} is private", handle);
                        private.push(handle.clone());
                    }
                    Err(err) => {
                        crawl_warn!("Error with {}: {}", handle, err);
                        failed.push((handle.clone(), err.to_string()));
                    }
                }
                debug_assert!(frontier.is_disjoint());

                self.sleeper.sleep(self.settings.pacing).await;
            }

            frontier.advance_depth();
        }

        SpiderReport {
            channels: registry.into_channels(),
            pending: frontier.pending(),
            private,
            skipped,
            failed,
            depth_reached: frontier.current_depth(),
            budget,
            cancelled,
        }
    }

    async fn harvest(&self, handle: &Handle, limit: usize) -> Result<Harvest, ServiceError> {
        let entity = self.service.resolve_entity(handle).await?;
        if !entity.kind.is_channel_like() {
            return Ok(Harvest::NotAChannel(entity.kind));
        }

        // A resolved channel is kept even if its history cannot be read in full.
        let mut links = BTreeSet::new();
        let mut messages = self.service.iter_messages(&entity, limit);
        while let Some(message) = messages.next().await {
            match message {
                Ok(message) => {
                    if let Some(text) = message.content() {
                        links.extend(extract_handles(text));
                    }
                }
                Err(err @ ServiceError::RateLimited { .. }) => return Err(err),
                Err(err) => {
                    crawl_warn!(
                        "Reading history of {} stopped after {} links: {}",
                        handle,
                        links.len(),
                        err
                    );
                    break;
                }
            }
        }
        drop(messages);

        Ok(Harvest::Channel { entity, links })
    }
}
