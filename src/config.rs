//! Purpose: Client configuration: the two service hosts, credentials, verbosity, and deadline.
//! Exports: `ClientConfig`, `Host`, env variable names.
//! Role: Resolves resource paths into absolute URLs before they reach the transport.
//! Invariants: Base URLs are http(s), carry no query/fragment, and always end with `/`.
//! Invariants: Path segments are percent-encoded and appended after any base path prefix.
use crate::core::error::{Error, ErrorKind};
use crate::core::logging::LogLevel;
use std::time::Duration;
use url::Url;

pub const ENV_API_URL: &str = "BAGSDK_API_URL";
pub const ENV_CONTENT_URL: &str = "BAGSDK_CONTENT_URL";
pub const ENV_TOKEN: &str = "BAGSDK_TOKEN";
pub const ENV_LOG: &str = "BAGSDK_LOG";
pub const ENV_TIMEOUT_MS: &str = "BAGSDK_TIMEOUT_MS";

/// Which configured host a call targets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Host {
    /// JSON API (views, folders, objects, upload tickets).
    Api,
    /// File content delivery (downloads).
    Content,
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    api_url: Url,
    content_url: Url,
    pub token: Option<String>,
    pub log_level: LogLevel,
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_url: impl AsRef<str>) -> Result<Self, Error> {
        let api_url = normalize_base_url(api_url.as_ref())?;
        Ok(Self {
            content_url: api_url.clone(),
            api_url,
            token: None,
            log_level: LogLevel::None,
            timeout: None,
        })
    }

    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source using the `BAGSDK_*` names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let api_url = lookup(ENV_API_URL).ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message(format!("{ENV_API_URL} is not set"))
        })?;
        let mut config = Self::new(api_url)?;
        if let Some(content_url) = lookup(ENV_CONTENT_URL) {
            config = config.with_content_url(content_url)?;
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|token| !token.is_empty()) {
            config = config.with_token(token);
        }
        if let Some(level) = lookup(ENV_LOG) {
            let level = level.parse::<LogLevel>().map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("invalid {ENV_LOG}"))
                    .with_source(err)
            })?;
            config = config.with_log_level(level);
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_MS) {
            let millis = timeout.trim().parse::<u64>().map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("invalid {ENV_TIMEOUT_MS}"))
                    .with_source(err)
            })?;
            config = config.with_timeout(Some(Duration::from_millis(millis)));
        }
        Ok(config)
    }

    pub fn with_content_url(mut self, content_url: impl AsRef<str>) -> Result<Self, Error> {
        self.content_url = normalize_base_url(content_url.as_ref())?;
        Ok(self)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self, host: Host) -> &Url {
        match host {
            Host::Api => &self.api_url,
            Host::Content => &self.content_url,
        }
    }

    /// Absolute URL for `segments` under the selected host.
    pub fn url(&self, host: Host, segments: &[&str]) -> Result<Url, Error> {
        build_url(self.base_url(host), segments)
    }

    /// Resolve a caller-supplied relative path (may contain `/` and a query) against the API host.
    pub fn resolve(&self, host: Host, path: &str) -> Result<Url, Error> {
        self.base_url(host)
            .join(path.trim_start_matches('/'))
            .map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("invalid request path `{path}`"))
                    .with_source(err)
            })
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid base url `{raw}`"))
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage).with_message("base url must use http or https scheme"));
    }
    if url.cannot_be_a_base() {
        return Err(Error::new(ErrorKind::Usage).with_message("base url cannot be a base"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(base_url: &Url, segments: &[&str]) -> Result<Url, Error> {
    let mut url = base_url.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| Error::new(ErrorKind::Usage).with_message("base url cannot be a base"))?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}
