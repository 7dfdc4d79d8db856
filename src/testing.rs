// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scripted in-memory collaborators shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{MetadataError, TransportError};
use crate::http::{ByteStream, BytesResponse, HttpClient, HttpRequest, HttpResponse};
use crate::metadata::{EmbedOutcome, MetadataEmbedder, TagSet};

/// A canned answer for one request
#[derive(Debug, Clone)]
pub enum Reply {
    Body { status: u16, body: Vec<u8> },
    /// Sends `body`, claims `declared_length`, then breaks the connection
    Broken { body: Vec<u8>, declared_length: u64 },
    Unreachable,
}

impl Reply {
    pub fn json(value: serde_json::Value) -> Self {
        Reply::Body {
            status: 200,
            body: value.to_string().into_bytes(),
        }
    }

    pub fn status(status: u16) -> Self {
        Reply::Body {
            status,
            body: Vec::new(),
        }
    }
}

/// Fake client: scripted replies per URL (the last one repeats), plus
/// "files" that honour range requests and HEAD size queries.
#[derive(Default)]
pub struct FakeHttpClient {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<HttpRequest>>,
    head_requests: Mutex<Vec<String>>,
}

impl FakeHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, url: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn with_json(self, url: &str, value: serde_json::Value) -> Self {
        self.with_reply(url, Reply::json(value))
    }

    pub fn with_file(self, url: &str, data: &[u8]) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(url.to_string(), data.to_vec());
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    pub fn head_requests(&self) -> Vec<String> {
        self.head_requests.lock().unwrap().clone()
    }

    fn next_reply(&self, request: &HttpRequest) -> Reply {
        self.requests.lock().unwrap().push(request.clone());

        let mut replies = self.replies.lock().unwrap();
        if let Some(queue) = replies.get_mut(&request.url) {
            if queue.len() > 1 {
                return queue.pop_front().unwrap();
            }
            if let Some(reply) = queue.front() {
                return reply.clone();
            }
        }
        drop(replies);

        if let Some(data) = self.files.lock().unwrap().get(&request.url) {
            return match request.range_start {
                Some(start) if start > 0 => Reply::Body {
                    status: 206,
                    body: data[(start as usize).min(data.len())..].to_vec(),
                },
                _ => Reply::Body {
                    status: 200,
                    body: data.clone(),
                },
            };
        }

        Reply::status(404)
    }
}

fn connection_refused() -> TransportError {
    TransportError::Io(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        "connection refused",
    ))
}

#[async_trait]
impl HttpClient for FakeHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<BytesResponse, TransportError> {
        match self.next_reply(&request) {
            Reply::Body { status, body } => Ok(BytesResponse {
                status,
                body: Bytes::from(body),
            }),
            Reply::Broken { .. } => Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset",
            ))),
            Reply::Unreachable => Err(connection_refused()),
        }
    }

    async fn send_streaming(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        match self.next_reply(&request) {
            Reply::Body { status, body } => {
                let len = body.len() as u64;
                let stream: ByteStream =
                    Box::pin(futures::stream::once(async move { Ok(Bytes::from(body)) }));
                Ok(HttpResponse {
                    status,
                    content_length: Some(len),
                    body: stream,
                })
            }
            Reply::Broken {
                body,
                declared_length,
            } => {
                let chunks: Vec<Result<Bytes, TransportError>> = vec![
                    Ok(Bytes::from(body)),
                    Err(TransportError::Io(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        "connection reset",
                    ))),
                ];
                Ok(HttpResponse {
                    status: 200,
                    content_length: Some(declared_length),
                    body: Box::pin(futures::stream::iter(chunks)),
                })
            }
            Reply::Unreachable => Err(connection_refused()),
        }
    }

    async fn content_length(&self, url: &str) -> Result<Option<u64>, TransportError> {
        self.head_requests.lock().unwrap().push(url.to_string());
        match self.files.lock().unwrap().get(url) {
            Some(data) => Ok(Some(data.len() as u64)),
            None => Err(connection_refused()),
        }
    }
}

/// Embedder that remembers every call, including the cover bytes present
/// on disk at the time of the call
#[derive(Debug)]
pub struct RecordingEmbedder {
    calls: Mutex<Vec<(PathBuf, TagSet, Option<Vec<u8>>)>>,
    outcome: EmbedOutcome,
    fail: bool,
}

impl Default for RecordingEmbedder {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            outcome: EmbedOutcome::Written,
            fail: false,
        }
    }
}

impl RecordingEmbedder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn unchanged() -> Self {
        Self {
            outcome: EmbedOutcome::Unchanged,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(PathBuf, TagSet, Option<Vec<u8>>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataEmbedder for RecordingEmbedder {
    async fn embed(&self, path: &Path, tags: &TagSet) -> Result<EmbedOutcome, MetadataError> {
        let cover = tags.cover.as_ref().and_then(|cover| std::fs::read(cover).ok());
        self.calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), tags.clone(), cover));

        if self.fail {
            return Err(MetadataError::CoverReadFailed {
                path: path.to_path_buf(),
                source: io::Error::other("embedding disabled"),
            });
        }
        Ok(self.outcome)
    }
}
