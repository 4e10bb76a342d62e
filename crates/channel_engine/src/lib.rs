//! Channel harvester engine: session handling, discovery, spidering and
//! extraction over a remote channel service.
mod backoff;
mod discovery;
mod extraction;
mod http;
mod persist;
mod service;
mod session;
mod sleeper;
mod spider;
mod types;

pub use discovery::{collate_search_results, DiscoveryEngine, DiscoveryResult, LocaleDiscovery};
pub use extraction::{ChannelExtraction, ExtractOptions, ExtractionEngine, ListingBatch};
pub use http::{HttpChannelService, ServiceSettings};
pub use persist::{
    encode_json_lines, ensure_output_dir, export_listings, AtomicFileWriter, ListingExport,
    PersistError,
};
pub use service::{DialogStream, MessageStream, RemoteChannelService};
pub use session::Session;
pub use sleeper::{Sleeper, TokioSleeper};
pub use spider::{SpiderEngine, SpiderReport, SpiderSettings};
pub use types::{
    CrawlError, EntityKind, MediaKind, MediaRef, RemoteEntity, RemoteMessage, SearchQuery,
    SearchResults, ServiceError,
};
