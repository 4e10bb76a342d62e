use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use channel_core::{Channel, Handle, ListingAdapter, LocaleCatalog, Message, RateBudget};
use channel_engine::{
    export_listings, CrawlError, DiscoveryEngine, ExtractOptions, ExtractionEngine,
    RemoteChannelService, SpiderEngine, SpiderSettings,
};
use crawl_logging::{crawl_error, crawl_info, crawl_warn};
use tokio_util::sync::CancellationToken;

use crate::cli::{Command, ExtractArgs, FetchArgs, SearchArgs, SpiderArgs};

const SHOWN_CHANNELS: usize = 20;
const SHOWN_MESSAGES: usize = 10;
const PREVIEW_CHARS: usize = 100;

pub struct Runner {
    service: Arc<dyn RemoteChannelService>,
    catalog: LocaleCatalog,
    cancel: CancellationToken,
}

impl Runner {
    pub fn new(
        service: Arc<dyn RemoteChannelService>,
        catalog: LocaleCatalog,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            catalog,
            cancel,
        }
    }

    pub async fn run(&self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Search(args) => self.search(args).await,
            Command::Spider(args) => self.spider(args).await,
            Command::List => self.list().await,
            Command::Extract(args) => self.extract(args).await,
            Command::Fetch(args) => self.fetch(args).await,
        }
    }

    async fn search(&self, args: SearchArgs) -> anyhow::Result<()> {
        let engine = DiscoveryEngine::new(self.service.clone());

        if let Some(locale) = args.locale {
            let queries = self.catalog.queries(&locale)?;
            println!(
                "Running {} discovery queries for {}",
                queries.len(),
                locale.to_uppercase()
            );
            let Some(found) = settle(engine.search_all(queries, args.limit).await)? else {
                return Ok(());
            };
            print_channels("Found", &found.channels);
            println!("Found {} messages", found.messages.len());
            println!("Completed {} of {} queries", found.completed_queries, queries.len());
            if let Some(wait) = found.rate_limited {
                println!("Rate limited; run again in {}", format_wait(wait));
            }
            return Ok(());
        }

        println!("Searching for: {}", args.query);
        let Some(found) = settle(engine.search(&args.query, args.limit).await)? else {
            return Ok(());
        };
        print_channels("Found", &found.channels);
        println!("Found {} messages", found.messages.len());
        Ok(())
    }

    async fn spider(&self, args: SpiderArgs) -> anyhow::Result<()> {
        let seeds = self.catalog.seeds(&args.locale)?;
        println!(
            "Spidering from {} seed channels for {}",
            seeds.len(),
            args.locale.to_uppercase()
        );

        let settings = SpiderSettings {
            level_ceiling: args.ceiling,
            pacing: Duration::from_secs(args.pacing),
        };
        let engine = SpiderEngine::new(self.service.clone(), settings)
            .with_cancellation(self.cancel.clone());
        let budget = RateBudget::new(args.budget);
        let Some(report) = settle(
            engine
                .spider(seeds, args.depth, args.messages, budget)
                .await,
        )?
        else {
            return Ok(());
        };

        println!("\nDiscovered {} channels:", report.channels.len());
        for channel in &report.channels {
            println!(
                "  @{} - {} [{}]",
                channel.handle, channel.title, channel.discovery_method
            );
        }
        if !report.pending.is_empty() {
            println!(
                "\n{} channels queued for a later run:",
                report.pending.len()
            );
            for handle in &report.pending {
                println!("  @{handle}");
            }
        }
        if !report.private.is_empty() {
            println!("Private: {}", join_handles(&report.private));
        }
        for (handle, error) in &report.failed {
            println!("Failed: @{handle} ({error})");
        }
        println!(
            "Depth reached {}, {} of {} resolutions used",
            report.depth_reached,
            report.budget.spent(),
            args.budget
        );
        if report.cancelled {
            println!("Stopped early on interrupt");
        }
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<()> {
        println!("Listing subscribed channels...");
        let engine = DiscoveryEngine::new(self.service.clone());
        let Some(channels) = settle(engine.list_subscribed().await)? else {
            return Ok(());
        };
        println!("\nSubscribed to {} channels:", channels.len());
        for channel in &channels {
            println!("  @{} - {}", channel.handle, channel.title);
        }
        Ok(())
    }

    async fn extract(&self, args: ExtractArgs) -> anyhow::Result<()> {
        let channel = parse_handle(&args.channel)?;
        println!("Extracting from @{} (limit={})", channel, args.limit);

        let engine = ExtractionEngine::new(self.service.clone());
        let options = ExtractOptions {
            limit: args.limit,
            filter_content: !args.all,
            download_media: false,
        };
        let Some(messages) = settle(engine.extract(&channel, options).await)? else {
            return Ok(());
        };

        println!("\nFound {} messages:", messages.len());
        for message in messages.iter().take(SHOWN_MESSAGES) {
            println!("  [{}] {}...", message.timestamp.date_naive(), preview(message));
        }
        Ok(())
    }

    async fn fetch(&self, args: FetchArgs) -> anyhow::Result<()> {
        let profile = self.catalog.get(&args.locale)?;
        let channels = if args.channels.is_empty() {
            profile.seeds.clone()
        } else {
            args.channels
                .iter()
                .map(|raw| parse_handle(raw))
                .collect::<anyhow::Result<Vec<_>>>()?
        };
        if channels.is_empty() {
            bail!(
                "no seed channels for {}; pass --channel to choose some",
                profile.code
            );
        }
        let filter = profile
            .relevance_filter()
            .with_context(|| format!("building the price filter for {}", profile.code))?;

        println!("Fetching listings for {}", profile.code.to_uppercase());
        let engine = ExtractionEngine::new(self.service.clone())
            .with_filter(Arc::new(filter))
            .with_cancellation(self.cancel.clone());
        let options = ExtractOptions {
            limit: args.messages,
            filter_content: true,
            download_media: !args.no_media,
        };
        let adapter = ListingAdapter::system();
        let Some(batch) = settle(engine.harvest_listings(&channels, options, &adapter).await)?
        else {
            return Ok(());
        };

        for (channel, count) in &batch.per_channel {
            println!("  {channel}: {count} listings");
        }
        for (channel, error) in &batch.failed {
            println!("  {channel}: failed ({error})");
        }
        println!("\nFetched {} listings", batch.listings.len());
        if let Some(first) = batch.listings.first() {
            println!("Sample: {}", first.source_url);
        }
        if batch.cancelled {
            println!("Stopped early on interrupt");
        }

        if let Some(path) = args.output {
            let export = export_listings(&path, &batch.listings)
                .with_context(|| format!("writing listings to {}", path.display()))?;
            println!("Wrote {} listings to {}", export.records, export.path.display());
        }
        Ok(())
    }
}

/// Setup and input errors end the run; remote failures are reported and the
/// command finishes normally.
fn settle<T>(result: Result<T, CrawlError>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err @ (CrawlError::Setup { .. } | CrawlError::InvalidInput(_))) => Err(anyhow!(err)),
        Err(CrawlError::RateLimited { retry_after }) => {
            crawl_warn!("Rate limited by the service");
            println!("Rate limited; run again in {}", format_wait(retry_after));
            Ok(None)
        }
        Err(CrawlError::Service(err)) => {
            crawl_error!("Remote call failed: {}", err);
            println!("Remote call failed: {err}");
            Ok(None)
        }
    }
}

fn parse_handle(raw: &str) -> anyhow::Result<Handle> {
    Handle::parse(raw).with_context(|| format!("invalid channel {raw:?}"))
}

fn print_channels(verb: &str, channels: &[Channel]) {
    println!("\n{} {} channels:", verb, channels.len());
    for channel in channels.iter().take(SHOWN_CHANNELS) {
        let members = channel
            .participant_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!("  @{} - {} ({} members)", channel.handle, channel.title, members);
    }
    if channels.len() > SHOWN_CHANNELS {
        crawl_info!("{} more channels not shown", channels.len() - SHOWN_CHANNELS);
    }
}

fn join_handles(handles: &[Handle]) -> String {
    handles
        .iter()
        .map(|h| format!("@{h}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn preview(message: &Message) -> String {
    message
        .text
        .chars()
        .take(PREVIEW_CHARS)
        .collect::<String>()
        .replace('\n', " ")
}

fn format_wait(wait: Duration) -> String {
    let secs = wait.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}
