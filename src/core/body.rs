//! Purpose: Outgoing request bodies and the raw response stream handed to callers.
//! Exports: `RequestBody`, `RawBody`.
//! Role: Separates in-memory bodies (cheap to copy for logs) from live streams.
//! Invariants: `RawBody` is only produced for a response that yields at least one byte.
//! Invariants: Dropping a `RawBody` before EOF releases the underlying connection.
use super::error::{Error, ErrorKind};
use serde::Serialize;
use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};

pub enum RequestBody {
    Bytes(Vec<u8>),
    Text(String),
    Stream(Box<dyn Read + Send + 'static>),
}

impl RequestBody {
    /// Serialize `value` as a JSON body.
    pub fn json<V: Serialize + ?Sized>(value: &V) -> Result<Self, Error> {
        serde_json::to_vec(value).map(RequestBody::Bytes).map_err(|err| {
            Error::new(ErrorKind::Encode)
                .with_message("failed to encode request json")
                .with_source(err)
        })
    }

    pub fn reader(reader: impl Read + Send + 'static) -> Self {
        RequestBody::Stream(Box::new(reader))
    }

    /// Bytes of an in-memory body; `None` for streams.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RequestBody::Bytes(bytes) => Some(bytes),
            RequestBody::Text(text) => Some(text.as_bytes()),
            RequestBody::Stream(_) => None,
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            RequestBody::Text(text) => write!(f, "Text({} bytes)", text.len()),
            RequestBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

type ResponseReader = Box<dyn Read + Send + Sync + 'static>;

/// Live response body, returned unread in raw mode.
pub struct RawBody {
    reader: BufReader<ResponseReader>,
    content_type: Option<String>,
    content_length: Option<u64>,
}

impl RawBody {
    /// Wrap `reader`, returning `None` when the stream is already at EOF.
    pub(crate) fn probe(
        reader: ResponseReader,
        content_type: Option<String>,
        content_length: Option<u64>,
    ) -> io::Result<Option<Self>> {
        let mut reader = BufReader::new(reader);
        if reader.fill_buf()?.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self {
            reader,
            content_type,
            content_length,
        }))
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.reader.read_to_end(&mut out)?;
        Ok(out)
    }

    pub fn copy_to(&mut self, writer: &mut dyn Write) -> io::Result<u64> {
        io::copy(&mut self.reader, writer)
    }
}

impl Read for RawBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl BufRead for RawBody {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt)
    }
}

impl fmt::Debug for RawBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawBody")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{RawBody, RequestBody};
    use crate::core::error::ErrorKind;
    use std::io::{Cursor, Read};

    #[test]
    fn probe_empty_stream_is_none() {
        let body = RawBody::probe(Box::new(Cursor::new(Vec::new())), None, Some(0)).expect("probe");
        assert!(body.is_none());
    }

    #[test]
    fn probe_keeps_every_byte() {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(20_000).collect();
        let body = RawBody::probe(
            Box::new(Cursor::new(bytes.clone())),
            Some("application/octet-stream".to_string()),
            None,
        )
        .expect("probe")
        .expect("body");
        assert_eq!(body.content_type(), Some("application/octet-stream"));
        assert_eq!(body.into_bytes().expect("read"), bytes);
    }

    #[test]
    fn raw_body_reads_incrementally() {
        let mut body = RawBody::probe(Box::new(Cursor::new(b"abcdef".to_vec())), None, None)
            .expect("probe")
            .expect("body");
        let mut first = [0u8; 2];
        body.read_exact(&mut first).expect("read");
        assert_eq!(&first, b"ab");
        let mut rest = Vec::new();
        body.copy_to(&mut rest).expect("copy");
        assert_eq!(rest, b"cdef");
    }

    #[test]
    fn json_body_serializes_value() {
        let body = RequestBody::json(&serde_json::json!({"id": "1"})).expect("json");
        assert_eq!(body.as_bytes(), Some(&br#"{"id":"1"}"#[..]));
    }

    #[test]
    fn json_body_reports_encode_errors() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(vec![1u8], 1);
        let err = RequestBody::json(&map).expect_err("non-string keys");
        assert_eq!(err.kind(), ErrorKind::Encode);
    }

    #[test]
    fn stream_body_has_no_bytes() {
        let body = RequestBody::reader(Cursor::new(b"x".to_vec()));
        assert!(body.as_bytes().is_none());
    }
}
