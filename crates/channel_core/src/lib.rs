//! Channel harvester core: pure domain model, traversal state and content helpers.
mod budget;
mod frontier;
mod handle;
mod links;
mod listing;
mod locale;
mod model;
mod registry;
mod relevance;

pub use budget::RateBudget;
pub use frontier::TraversalFrontier;
pub use handle::{Handle, HandleError};
pub use links::{extract_handles, CHANNEL_LINK_PATTERN};
pub use listing::{
    parse_source_id, parse_source_url, to_listing, ListingAdapter, ListingRecord, PLATFORM,
};
pub use locale::{CatalogError, CatalogFile, LocaleCatalog, LocaleProfile};
pub use model::{message_url, source_id, Channel, DiscoveryMethod, Message};
pub use registry::ChannelRegistry;
pub use relevance::{FilterError, PricePatternFilter, RelevanceFilter, DEFAULT_CURRENCIES};
