use channel_core::Handle;
use futures_util::stream::BoxStream;

use crate::{MediaRef, RemoteEntity, RemoteMessage, SearchQuery, SearchResults, ServiceError};

pub type MessageStream<'a> = BoxStream<'a, Result<RemoteMessage, ServiceError>>;
pub type DialogStream<'a> = BoxStream<'a, Result<RemoteEntity, ServiceError>>;

/// The remote messaging service, reached through one sequential session.
///
/// Implementations report server backoff directives as
/// [`ServiceError::RateLimited`] and inaccessible peers as
/// [`ServiceError::PrivateResource`]; callers decide how to honor them.
#[async_trait::async_trait]
pub trait RemoteChannelService: Send + Sync {
    async fn connect(&self) -> Result<(), ServiceError>;

    async fn is_authorized(&self) -> Result<bool, ServiceError>;

    async fn disconnect(&self);

    async fn search(
        &self,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<SearchResults, ServiceError>;

    async fn resolve_entity(&self, handle: &Handle) -> Result<RemoteEntity, ServiceError>;

    /// Most recent messages first, at most `limit`.
    fn iter_messages<'a>(&'a self, entity: &'a RemoteEntity, limit: usize) -> MessageStream<'a>;

    fn iter_dialogs(&self) -> DialogStream<'_>;

    async fn download_media(&self, media: &MediaRef) -> Result<Vec<u8>, ServiceError>;
}
