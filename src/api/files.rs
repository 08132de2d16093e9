//! Purpose: File transfer for a view: ticketed uploads, raw downloads, and virtual files.
//! Exports: `UploadTicket`, `FileInfo`, `VirtualFile`.
//! Role: Uploads go ticket -> pre-signed PUT -> completion ping; downloads stream from the content host.
//! Invariants: The pre-signed PUT and the completion ping never carry the bearer token.
//! Invariants: Upload bytes are streamed, never buffered whole.
use super::{
    ApiResult, CallOptions, Error, ErrorKind, Host, Method, RawBody, Request, RequestBody, View,
    settle,
};
use crate::core::headers::{CONTENT_LENGTH, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct FileInfo {
    pub path: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Server grant for one upload; `upload_url` may be absolute or relative to the content host.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct UploadTicket {
    pub upload_id: String,
    pub upload_url: String,
    #[serde(default)]
    pub file: Option<FileInfo>,
}

/// A file whose content is produced by the service from `source`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct VirtualFile {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub source: Value,
}

#[derive(Serialize)]
struct UploadRequest<'a> {
    path: &'a str,
    size: u64,
    content_type: &'a str,
}

impl View {
    pub fn upload<R>(
        &self,
        remote_path: &str,
        reader: R,
        size: u64,
        content_type: Option<&str>,
    ) -> ApiResult<UploadTicket>
    where
        R: Read + Send + 'static,
    {
        let content_type = content_type.unwrap_or(DEFAULT_CONTENT_TYPE);
        let transport = self.client().transport();

        let url = self.url(Host::Api, &["uploads"])?;
        let reply = transport.post(
            url.as_str(),
            Some(&UploadRequest {
                path: remote_path,
                size,
                content_type,
            }),
            CallOptions::new(),
        )?;
        let ticket: UploadTicket = settle(reply, &format!("start upload of {remote_path}"))?;
        if ticket.upload_id.is_empty() || ticket.upload_url.is_empty() {
            return Err(Error::new(ErrorKind::Decode)
                .with_message(format!("start upload of {remote_path}: incomplete upload ticket")));
        }

        let target = self
            .client()
            .config()
            .base_url(Host::Content)
            .join(&ticket.upload_url)
            .map_err(|err| {
                Error::new(ErrorKind::Decode)
                    .with_message(format!("upload {remote_path}: invalid upload url"))
                    .with_source(err)
            })?;
        let put = Request::new(Method::Put, target.as_str())
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, size.to_string())
            .body(RequestBody::reader(reader))
            .skip_auth(true)
            .skip_parse(true);
        let reply = transport.execute::<Value>(put)?;
        settle(reply, &format!("upload {remote_path}"))?;

        let url = self.url(Host::Api, &["uploads", &ticket.upload_id, "complete"])?;
        let complete = Request::new(Method::Post, url.as_str())
            .skip_auth(true)
            .skip_parse(true);
        let reply = transport.execute::<Value>(complete)?;
        settle(reply, &format!("complete upload of {remote_path}"))?;

        Ok(ticket)
    }

    pub fn upload_file(&self, local_path: &Path, remote_path: &str) -> ApiResult<UploadTicket> {
        let file = File::open(local_path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("open {}", local_path.display()))
                .with_source(err)
        })?;
        let size = file
            .metadata()
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message(format!("stat {}", local_path.display()))
                    .with_source(err)
            })?
            .len();
        self.upload(remote_path, file, size, None)
    }

    /// Stream a file from the content host. `None` means the file is empty.
    pub fn download(&self, remote_path: &str) -> ApiResult<Option<RawBody>> {
        let mut url = self.url(Host::Content, &["files"])?;
        url.query_pairs_mut().append_pair("path", remote_path);
        let request = Request::new(Method::Get, url.as_str()).skip_parse(true);
        let reply = self.client().transport().execute::<Value>(request)?;
        settle(reply.map(|payload| payload.into_raw()), &format!("download {remote_path}"))
    }

    pub fn define_virtual_file(&self, file: &VirtualFile) -> ApiResult<FileInfo> {
        let url = self.url(Host::Api, &["virtual-files"])?;
        let reply = self
            .client()
            .transport()
            .post(url.as_str(), Some(file), CallOptions::new())?;
        settle(reply, &format!("define virtual file {}", file.path))
    }
}
