//! Purpose: Execute one HTTP operation and normalize its outcome into a `Reply`.
//! Exports: `Transport`, `Request`, `Method`, `CallOptions`, `Payload`, `Reply`, client identity constants.
//! Role: Single choke point for auth injection, client identification, logging, and classification.
//! Invariants: Application errors and decode failures land in `Reply::error`, never in the outer `Err`.
//! Invariants: The outer `Err` is reserved for transport failures (no response obtained).
//! Invariants: Start time is call-local; the token and log level are only read during a call.
//! Invariants: Non-raw bodies are read to EOF before returning; raw bodies are handed over unread.
use super::body::{RawBody, RequestBody};
use super::error::{Error, ErrorKind};
use super::headers::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, Headers};
use super::logging::{self, LogLevel, LogSettings, MAX_LOGGED_BODY_BYTES, ResponseLog};
use super::tee::tee;
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use std::io::Read;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

pub const CLIENT_NAME: &str = "bagsdk-rust";
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const HEADER_CLIENT_NAME: &str = "X-Client-Name";
pub const HEADER_CLIENT_VERSION: &str = "X-Client-Version";

const LOGGABLE_BODY_TYPES: [&str; 3] = [
    "application/json",
    "application/graphql",
    "application/graphql+json",
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// A fully resolved operation for `Transport::execute`.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Option<RequestBody>,
    pub skip_parse: bool,
    pub skip_auth: bool,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
            skip_parse: false,
            skip_auth: false,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers.merge(headers);
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn skip_parse(mut self, skip_parse: bool) -> Self {
        self.skip_parse = skip_parse;
        self
    }

    pub fn skip_auth(mut self, skip_auth: bool) -> Self {
        self.skip_auth = skip_auth;
        self
    }
}

/// Per-call extras for the convenience operations.
#[derive(Debug, Default)]
pub struct CallOptions {
    pub headers: Headers,
    /// Pre-serialized body; when set it is sent as-is and any structured value is ignored.
    pub body: Option<RequestBody>,
    pub skip_auth: bool,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }
}

/// Success payload of `execute`, selected by `skip_parse`.
#[derive(Debug)]
pub enum Payload<T> {
    Empty,
    Parsed(T),
    Raw(RawBody),
}

impl<T> Default for Payload<T> {
    fn default() -> Self {
        Payload::Empty
    }
}

impl<T> Payload<T> {
    pub fn into_parsed(self) -> Option<T> {
        match self {
            Payload::Parsed(value) => Some(value),
            Payload::Empty | Payload::Raw(_) => None,
        }
    }

    pub fn into_raw(self) -> Option<RawBody> {
        match self {
            Payload::Raw(body) => Some(body),
            Payload::Empty | Payload::Parsed(_) => None,
        }
    }
}

/// Normalized `(payload, error)` pair. When `error` is set, `payload` is the zero value.
#[derive(Debug)]
#[must_use = "the error slot must be checked before using the payload"]
pub struct Reply<T> {
    pub payload: T,
    pub error: Option<Error>,
}

impl<T> Reply<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            payload,
            error: None,
        }
    }

    pub fn failed(error: Error) -> Self
    where
        T: Default,
    {
        Self {
            payload: T::default(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<T, Error> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.payload),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        Reply {
            payload: f(self.payload),
            error: self.error,
        }
    }
}

#[derive(Clone)]
pub struct Transport {
    inner: Arc<TransportInner>,
}

struct TransportInner {
    agent: ureq::Agent,
    token: RwLock<Option<String>>,
    log: LogSettings,
}

impl Transport {
    pub fn new(log: LogSettings) -> Self {
        Self::with_agent(ureq::AgentBuilder::new().build(), log)
    }

    /// Apply an overall per-call deadline. Without one, calls never time out.
    pub fn with_timeout(timeout: Option<Duration>, log: LogSettings) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self::with_agent(builder.build(), log)
    }

    pub fn with_agent(agent: ureq::Agent, log: LogSettings) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                agent,
                token: RwLock::new(None),
                log,
            }),
        }
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.set_token(Some(token.into()));
        self
    }

    pub fn token(&self) -> Option<String> {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the bearer token, returning the previous one.
    pub fn set_token(&self, token: Option<String>) -> Option<String> {
        let mut slot = self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, token)
    }

    pub fn log_settings(&self) -> &LogSettings {
        &self.inner.log
    }

    /// Run one operation. `Err` means no response was obtained.
    pub fn execute<T: DeserializeOwned>(&self, request: Request) -> Result<Reply<Payload<T>>, Error> {
        let Request {
            method,
            url,
            headers,
            body,
            skip_parse,
            skip_auth,
        } = request;
        let headers = self.outgoing_headers(headers, skip_auth);
        let started = Instant::now();
        let level = self.inner.log.level();

        let mut call = self.inner.agent.request(method.as_str(), &url);
        for (name, value) in headers.iter() {
            call = call.set(name, value);
        }

        logging::request_started(level, method.as_str(), &url, &headers);
        let loggable = level >= LogLevel::Body && is_loggable_body(&headers);

        let result = match body {
            None => call.call(),
            Some(RequestBody::Bytes(bytes)) => {
                if loggable {
                    let text = logging::body_text(&bytes, false);
                    logging::request_body(level, method.as_str(), &url, &text);
                }
                call.send_bytes(&bytes)
            }
            Some(RequestBody::Text(text)) => {
                if loggable {
                    let logged = logging::body_text(text.as_bytes(), false);
                    logging::request_body(level, method.as_str(), &url, &logged);
                }
                call.send_string(&text)
            }
            Some(RequestBody::Stream(reader)) if loggable => {
                let (reader, tap) = tee(reader, MAX_LOGGED_BODY_BYTES);
                let result = call.send(reader);
                let captured = tap.drain();
                let text = logging::body_text(&captured.bytes, captured.truncated);
                logging::request_body(level, method.as_str(), &url, &text);
                result
            }
            Some(RequestBody::Stream(reader)) => call.send(reader),
        };

        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(err)) => {
                logging::request_failed(method.as_str(), &url, started.elapsed(), &err);
                return Err(Error::new(ErrorKind::Transport)
                    .with_message(format!("{} {url} failed", method.as_str()))
                    .with_source(err));
            }
        };

        let context = CallContext {
            method,
            url: &url,
            started,
            level,
        };
        context.classify(response, skip_parse)
    }

    /// GET in parsed mode. Any body in `options` is ignored.
    pub fn get<T>(&self, url: &str, options: CallOptions) -> Result<Reply<T>, Error>
    where
        T: DeserializeOwned + Default,
    {
        let request = Request::new(Method::Get, url)
            .headers(options.headers)
            .skip_auth(options.skip_auth);
        Ok(self.execute(request)?.map(Payload::into_parsed_or_default))
    }

    pub fn put<T, V>(&self, url: &str, value: Option<&V>, options: CallOptions) -> Result<Reply<T>, Error>
    where
        T: DeserializeOwned + Default,
        V: Serialize + ?Sized,
    {
        let request = match with_body(Request::new(Method::Put, url), value, options) {
            Ok(request) => request,
            Err(err) => return Ok(Reply::failed(err)),
        };
        Ok(self.execute(request)?.map(Payload::into_parsed_or_default))
    }

    pub fn post<T, V>(&self, url: &str, value: Option<&V>, options: CallOptions) -> Result<Reply<T>, Error>
    where
        T: DeserializeOwned + Default,
        V: Serialize + ?Sized,
    {
        let request = match with_body(Request::new(Method::Post, url), value, options) {
            Ok(request) => request,
            Err(err) => return Ok(Reply::failed(err)),
        };
        Ok(self.execute(request)?.map(Payload::into_parsed_or_default))
    }

    /// DELETE always runs in raw mode; callers get the unread body, if any.
    pub fn delete<V>(
        &self,
        url: &str,
        value: Option<&V>,
        options: CallOptions,
    ) -> Result<Reply<Option<RawBody>>, Error>
    where
        V: Serialize + ?Sized,
    {
        let request = match with_body(Request::new(Method::Delete, url), value, options) {
            Ok(request) => request.skip_parse(true),
            Err(err) => return Ok(Reply::failed(err)),
        };
        Ok(self.execute::<IgnoredAny>(request)?.map(Payload::into_raw))
    }

    fn outgoing_headers(&self, mut headers: Headers, skip_auth: bool) -> Headers {
        if !skip_auth {
            if let Some(token) = self.token() {
                headers.insert(AUTHORIZATION, format!("Bearer {token}"));
            }
        }
        headers.insert(HEADER_CLIENT_NAME, CLIENT_NAME);
        headers.insert(HEADER_CLIENT_VERSION, CLIENT_VERSION);
        headers
    }
}

impl<T: Default> Payload<T> {
    fn into_parsed_or_default(self) -> T {
        self.into_parsed().unwrap_or_default()
    }
}

struct CallContext<'a> {
    method: Method,
    url: &'a str,
    started: Instant,
    level: LogLevel,
}

impl CallContext<'_> {
    fn classify<T: DeserializeOwned>(
        &self,
        response: ureq::Response,
        skip_parse: bool,
    ) -> Result<Reply<Payload<T>>, Error> {
        let status = response.status();
        let headers = response_headers(&response);

        if !(200..300).contains(&status) {
            let mut body = Vec::new();
            // A body that cannot be read degrades to the fallback error.
            let _ = response.into_reader().read_to_end(&mut body);
            self.log_response(status, &headers, Some(&body));
            return Ok(Reply::failed(Error::from_response(status, &body)));
        }

        if skip_parse {
            let content_type = headers.get(CONTENT_TYPE).map(str::to_string);
            let content_length = headers
                .get(CONTENT_LENGTH)
                .and_then(|value| value.trim().parse().ok());
            let raw = RawBody::probe(response.into_reader(), content_type, content_length)
                .map_err(|err| self.failed(err))?;
            self.log_response(status, &headers, None);
            return Ok(Reply::ok(raw.map_or(Payload::Empty, Payload::Raw)));
        }

        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|err| self.failed(err))?;
        self.log_response(status, &headers, Some(&body));
        match serde_json::from_slice::<T>(&body) {
            Ok(value) => Ok(Reply::ok(Payload::Parsed(value))),
            Err(err) => Ok(Reply::failed(Error::decode_failure(status, err))),
        }
    }

    fn failed(&self, err: std::io::Error) -> Error {
        let method = self.method.as_str();
        logging::request_failed(method, self.url, self.started.elapsed(), &err);
        Error::new(ErrorKind::Transport)
            .with_message(format!("{method} {} failed while reading the response", self.url))
            .with_source(err)
    }

    fn log_response(&self, status: u16, headers: &Headers, body: Option<&[u8]>) {
        if self.level == LogLevel::None {
            return;
        }
        let text = body
            .filter(|_| self.level >= LogLevel::Body)
            .map(|bytes| logging::body_text(bytes, false));
        logging::response_finished(
            self.level,
            &ResponseLog {
                method: self.method.as_str(),
                url: self.url,
                status,
                elapsed: self.started.elapsed(),
                headers,
                body: text.as_deref(),
            },
        );
    }
}

fn with_body<V>(request: Request, value: Option<&V>, options: CallOptions) -> Result<Request, Error>
where
    V: Serialize + ?Sized,
{
    let CallOptions {
        mut headers,
        body,
        skip_auth,
    } = options;
    let body = match (body, value) {
        (Some(body), _) => Some(body),
        (None, Some(value)) => {
            headers.insert_default(CONTENT_TYPE, "application/json");
            Some(RequestBody::json(value)?)
        }
        (None, None) => None,
    };
    let mut request = request.headers(headers).skip_auth(skip_auth);
    request.body = body;
    Ok(request)
}

fn is_loggable_body(headers: &Headers) -> bool {
    headers
        .media_type()
        .is_some_and(|media| LOGGABLE_BODY_TYPES.contains(&media.as_str()))
}

fn response_headers(response: &ureq::Response) -> Headers {
    response
        .headers_names()
        .into_iter()
        .filter_map(|name| {
            let value = response.header(&name)?.to_string();
            Some((name, value))
        })
        .collect()
}
