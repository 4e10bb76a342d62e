use std::sync::Arc;

use crawl_logging::{crawl_debug, crawl_warn};

use crate::{CrawlError, RemoteChannelService, ServiceError};

const AUTHORIZE_HINT: &str =
    "authorize the session once through the gateway login flow, then rerun";
const CONNECT_HINT: &str = "check the gateway address and API token, then rerun";

/// One connection to the remote service for the duration of a run.
///
/// End it with [`Session::close`]. A session dropped while still open, for
/// example because the run future was dropped, disconnects on the current
/// tokio runtime.
pub struct Session {
    service: Arc<dyn RemoteChannelService>,
    released: bool,
}

impl Session {
    /// Connects and verifies authorization. Any failure here is a setup error.
    pub async fn open(service: Arc<dyn RemoteChannelService>) -> Result<Session, CrawlError> {
        service.connect().await.map_err(|err| match err {
            ServiceError::Unauthorized(msg) => {
                CrawlError::setup(format!("session not authorized: {msg}"), AUTHORIZE_HINT)
            }
            other => CrawlError::setup(format!("could not connect: {other}"), CONNECT_HINT),
        })?;
        let session = Session {
            service,
            released: false,
        };
        crawl_debug!("Session connected");

        match session.service.is_authorized().await {
            Ok(true) => Ok(session),
            Ok(false) => {
                session.close().await;
                Err(CrawlError::setup("session not authorized", AUTHORIZE_HINT))
            }
            Err(err) => {
                session.close().await;
                Err(CrawlError::setup(
                    format!("could not verify authorization: {err}"),
                    CONNECT_HINT,
                ))
            }
        }
    }

    pub fn service(&self) -> &dyn RemoteChannelService {
        self.service.as_ref()
    }

    pub async fn close(mut self) {
        self.released = true;
        self.service.disconnect().await;
        crawl_debug!("Session released");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                crawl_warn!("Session dropped while open, disconnecting in the background");
                let service = self.service.clone();
                runtime.spawn(async move {
                    service.disconnect().await;
                });
            }
            Err(_) => crawl_warn!("Session dropped outside a runtime; it was not disconnected"),
        }
    }
}
