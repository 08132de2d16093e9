//! Purpose: Define the public resource surface of the SDK on top of the transport.
//! Exports: `BagClient`, `View`, resource DTOs, and core types callers need.
//! Role: Parameter-to-URL mappings; every call goes through the client's single `Transport`.
//! Invariants: A non-empty error slot is re-wrapped with call-site context and returned as `Err`.
//! Invariants: Transport failures pass through unchanged.
#![allow(clippy::result_large_err)]

mod files;
mod folders;
mod notify;
mod objects;
mod views;

pub use crate::config::{ClientConfig, Host};
pub use crate::core::body::{RawBody, RequestBody};
pub use crate::core::error::{Error, ErrorEntry, ErrorKind, to_exit_code};
pub use crate::core::headers::Headers;
pub use crate::core::logging::{LogLevel, LogLevelGuard, LogSettings};
pub use crate::core::transport::{CallOptions, Method, Payload, Reply, Request, Transport};
pub use files::{FileInfo, UploadTicket, VirtualFile};
pub use folders::{EntryKind, FolderEntry};
pub use notify::{Notification, NotificationReceipt};
pub use objects::{ObjectList, ObjectMeta};
pub use views::{NewView, SessionData, View, ViewInfo};

use url::Url;

pub type ApiResult<T> = Result<T, Error>;

/// Entry point: one configuration, one transport, shared by every `View` it hands out.
#[derive(Clone)]
pub struct BagClient {
    config: ClientConfig,
    transport: Transport,
}

impl BagClient {
    pub fn new(config: ClientConfig) -> Self {
        let log = LogSettings::new(config.log_level);
        let transport = Transport::with_timeout(config.timeout, log);
        if let Some(token) = &config.token {
            transport.set_token(Some(token.clone()));
        }
        Self { config, transport }
    }

    pub fn from_env() -> ApiResult<Self> {
        Ok(Self::new(ClientConfig::from_env()?))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn log_settings(&self) -> &LogSettings {
        self.transport.log_settings()
    }

    pub fn view(&self, view_id: impl Into<String>) -> View {
        View::new(self.clone(), view_id.into())
    }

    pub(crate) fn url(&self, host: Host, segments: &[&str]) -> ApiResult<Url> {
        self.config.url(host, segments)
    }
}

/// Turn a reply into a `Result`, prefixing any error message with `operation`.
pub(crate) fn settle<T>(reply: Reply<T>, operation: &str) -> ApiResult<T> {
    reply.into_result().map_err(|err| with_context(err, operation))
}

pub(crate) fn with_context(mut err: Error, operation: &str) -> Error {
    let message = format!("{operation}: {}", err.message());
    err.set_message(message);
    err
}

#[cfg(test)]
mod tests {
    use super::{BagClient, ClientConfig, Error, ErrorEntry, ErrorKind, LogLevel, Reply, settle};

    #[test]
    fn settle_prefixes_context_and_keeps_entries() {
        let err = Error::new(ErrorKind::Status)
            .with_status(404)
            .with_entries(vec![ErrorEntry::new(404, "Not Found", "view missing")]);
        let reply: Reply<u8> = Reply::failed(err);
        let err = settle(reply, "open view v1").expect_err("error");
        assert_eq!(err.message(), "open view v1: view missing");
        assert_eq!(err.entries().len(), 1);
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn settle_passes_payload() {
        assert_eq!(settle(Reply::ok(7u8), "noop").expect("ok"), 7);
    }

    #[test]
    fn client_applies_config_token_and_level() {
        let config = ClientConfig::new("http://api.local")
            .expect("config")
            .with_token("tok")
            .with_log_level(LogLevel::Headers);
        let client = BagClient::new(config);
        assert_eq!(client.transport().token().as_deref(), Some("tok"));
        assert_eq!(client.log_settings().level(), LogLevel::Headers);
    }

    #[test]
    fn views_share_the_client_transport() {
        let client = BagClient::new(ClientConfig::new("http://api.local").expect("config"));
        let view = client.view("v1");
        view.client().transport().set_token(Some("shared".to_string()));
        assert_eq!(client.transport().token().as_deref(), Some("shared"));
    }
}
