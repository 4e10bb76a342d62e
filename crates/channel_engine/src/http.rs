use std::time::Duration;

use channel_core::Handle;
use crawl_logging::{crawl_debug, crawl_warn};
use futures_util::{stream, StreamExt, TryStreamExt};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::service::{DialogStream, MessageStream};
use crate::{
    MediaRef, RemoteChannelService, RemoteEntity, RemoteMessage, SearchQuery, SearchResults,
    ServiceError,
};

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub base_url: Url,
    pub api_token: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Messages or dialogs requested per page.
    pub page_size: usize,
}

impl ServiceSettings {
    pub fn new(base_url: Url, api_token: impl Into<String>) -> Self {
        Self {
            base_url,
            api_token: api_token.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            page_size: 100,
        }
    }
}

/// [`RemoteChannelService`] backed by a JSON gateway in front of the
/// messaging network. The gateway owns the authorized account session.
#[derive(Debug, Clone)]
pub struct HttpChannelService {
    settings: ServiceSettings,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SessionState {
    authorized: bool,
}

#[derive(Deserialize)]
struct MessagePage {
    #[serde(default)]
    messages: Vec<RemoteMessage>,
}

#[derive(Deserialize)]
struct DialogPage {
    #[serde(default)]
    dialogs: Vec<RemoteEntity>,
}

#[derive(Deserialize)]
struct RateLimitBody {
    retry_after: u64,
}

enum Cursor {
    Next {
        after: Option<i64>,
        remaining: usize,
    },
    Done,
}

impl HttpChannelService {
    pub fn new(settings: ServiceSettings) -> Result<Self, ServiceError> {
        if settings.page_size == 0 {
            return Err(ServiceError::Protocol("page size must be at least 1".into()));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(map_reqwest_error)?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.settings.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ServiceError::Protocol(format!(
                    "{} cannot serve as a gateway address",
                    self.settings.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        subject: &str,
    ) -> Result<reqwest::Response, ServiceError> {
        let response = request
            .bearer_auth(&self.settings.api_token)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response, subject).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, subject: &str) -> Result<T, ServiceError> {
        let response = self.send(self.client.get(url), subject).await?;
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        serde_json::from_slice(&body).map_err(|err| {
            ServiceError::Protocol(format!("malformed response for {subject}: {err}"))
        })
    }

    async fn message_page(
        &self,
        entity: &RemoteEntity,
        limit: usize,
        offset_id: Option<i64>,
    ) -> Result<Vec<RemoteMessage>, ServiceError> {
        let mut url = self.endpoint(&["channels", &entity.id.to_string(), "messages"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            if let Some(offset_id) = offset_id {
                query.append_pair("offset_id", &offset_id.to_string());
            }
        }
        let page: MessagePage = self.get_json(url, &entity.id.to_string()).await?;
        crawl_debug!("Fetched {} messages from {}", page.messages.len(), entity.id);
        Ok(page.messages)
    }

    async fn dialog_page(&self, offset: usize) -> Result<Vec<RemoteEntity>, ServiceError> {
        let mut url = self.endpoint(&["dialogs"])?;
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("limit", &self.settings.page_size.to_string());
        let page: DialogPage = self.get_json(url, "dialogs").await?;
        Ok(page.dialogs)
    }
}

#[async_trait::async_trait]
impl RemoteChannelService for HttpChannelService {
    async fn connect(&self) -> Result<(), ServiceError> {
        let url = self.endpoint(&["session", "connect"])?;
        self.send(self.client.post(url), "session").await?;
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool, ServiceError> {
        let url = self.endpoint(&["session"])?;
        let state: SessionState = self.get_json(url, "session").await?;
        Ok(state.authorized)
    }

    async fn disconnect(&self) {
        let result = match self.endpoint(&["session", "disconnect"]) {
            Ok(url) => self.send(self.client.post(url), "session").await.map(drop),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            crawl_warn!("Disconnect failed: {}", err);
        }
    }

    async fn search(
        &self,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<SearchResults, ServiceError> {
        let (segment, key) = match query {
            SearchQuery::Hashtag(_) => ("hashtag", "tag"),
            SearchQuery::Text(_) => ("posts", "q"),
        };
        let mut url = self.endpoint(&["search", segment])?;
        url.query_pairs_mut()
            .append_pair(key, query.term())
            .append_pair("limit", &limit.to_string());
        self.get_json(url, &query.to_string()).await
    }

    async fn resolve_entity(&self, handle: &Handle) -> Result<RemoteEntity, ServiceError> {
        let url = self.endpoint(&["entities", handle.as_str()])?;
        self.get_json(url, handle.as_str()).await
    }

    fn iter_messages<'a>(&'a self, entity: &'a RemoteEntity, limit: usize) -> MessageStream<'a> {
        let start = Cursor::Next {
            after: None,
            remaining: limit,
        };
        stream::unfold(start, move |cursor| async move {
            let Cursor::Next { after, remaining } = cursor else {
                return None;
            };
            if remaining == 0 {
                return None;
            }
            let wanted = remaining.min(self.settings.page_size);
            match self.message_page(entity, wanted, after).await {
                Ok(mut page) => {
                    page.truncate(wanted);
                    // A short page means history is exhausted.
                    let next = match page.last() {
                        Some(last) if page.len() >= wanted => Cursor::Next {
                            after: Some(last.id),
                            remaining: remaining - wanted,
                        },
                        _ => Cursor::Done,
                    };
                    Some((Ok(page), next))
                }
                Err(err) => Some((Err(err), Cursor::Done)),
            }
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
    }

    fn iter_dialogs(&self) -> DialogStream<'_> {
        stream::unfold(Some(0usize), move |offset| async move {
            let offset = offset?;
            match self.dialog_page(offset).await {
                Ok(page) if page.is_empty() => None,
                Ok(page) => {
                    let next = (page.len() >= self.settings.page_size).then(|| offset + page.len());
                    Some((Ok(page), next))
                }
                Err(err) => Some((Err(err), None)),
            }
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
    }

    async fn download_media(&self, media: &MediaRef) -> Result<Vec<u8>, ServiceError> {
        let url = self.endpoint(&["media", &media.id])?;
        let response = self.send(self.client.get(url), &media.id).await?;
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(bytes.to_vec())
    }
}

async fn check_status(
    response: reqwest::Response,
    subject: &str,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let header_wait = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok());
            let wait = match header_wait {
                Some(secs) => Some(secs),
                None => response
                    .bytes()
                    .await
                    .ok()
                    .and_then(|body| serde_json::from_slice::<RateLimitBody>(&body).ok())
                    .map(|body| body.retry_after),
            };
            match wait {
                Some(secs) => Err(ServiceError::RateLimited {
                    retry_after: Duration::from_secs(secs),
                }),
                None => Err(ServiceError::Protocol(format!(
                    "rate limited on {subject} without a wait duration"
                ))),
            }
        }
        StatusCode::FORBIDDEN => Err(ServiceError::PrivateResource(subject.to_string())),
        StatusCode::UNAUTHORIZED => Err(ServiceError::Unauthorized(subject.to_string())),
        StatusCode::NOT_FOUND => Err(ServiceError::NotFound(subject.to_string())),
        other => Err(ServiceError::Transport(format!("{other} for {subject}"))),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        return ServiceError::Transport(format!("timed out: {err}"));
    }
    if err.is_decode() {
        return ServiceError::Protocol(err.to_string());
    }
    ServiceError::Transport(err.to_string())
}
