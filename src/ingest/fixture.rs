// src/ingest/fixture.rs
//! Deterministic in-memory feed: each `open()` replays the next scripted attempt.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::ingest::lines::split_lines;
use crate::ingest::types::{FeedError, FeedSource, LineStream};

#[derive(Debug, Clone)]
pub enum Chunk {
    Data(Bytes),
    /// Connection drops with this message; nothing after it is delivered.
    Drop(String),
    /// Connection stays open with nothing more to say.
    Stall,
}

#[derive(Debug, Clone)]
enum Attempt {
    Refuse(String),
    Chunks(Vec<Chunk>),
}

#[derive(Default)]
pub struct ScriptedFeed {
    script: Mutex<VecDeque<Attempt>>,
    opens: AtomicU32,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next attempt fails to connect.
    pub fn refuse(self, msg: &str) -> Self {
        self.push(Attempt::Refuse(msg.to_string()))
    }

    /// Next attempt delivers `lines` (each `\n`-terminated) and closes cleanly.
    pub fn lines(self, lines: &[&str]) -> Self {
        self.push(Attempt::Chunks(line_chunks(lines)))
    }

    /// Next attempt delivers `lines`, then the connection drops.
    pub fn lines_then_drop(self, lines: &[&str], msg: &str) -> Self {
        let mut chunks = line_chunks(lines);
        chunks.push(Chunk::Drop(msg.to_string()));
        self.push(Attempt::Chunks(chunks))
    }

    /// Next attempt delivers `lines`, then hangs.
    pub fn lines_then_stall(self, lines: &[&str]) -> Self {
        let mut chunks = line_chunks(lines);
        chunks.push(Chunk::Stall);
        self.push(Attempt::Chunks(chunks))
    }

    pub fn chunks(self, chunks: Vec<Chunk>) -> Self {
        self.push(Attempt::Chunks(chunks))
    }

    /// Number of times `open()` was called.
    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    fn push(self, attempt: Attempt) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(attempt);
        self
    }
}

fn line_chunks(lines: &[&str]) -> Vec<Chunk> {
    lines
        .iter()
        .map(|l| Chunk::Data(Bytes::from(format!("{l}\n"))))
        .collect()
}

#[async_trait]
impl FeedSource for ScriptedFeed {
    async fn open(&self) -> Result<LineStream, FeedError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();

        let chunks = match next {
            None => return Err(FeedError::Disconnected("script exhausted".into())),
            Some(Attempt::Refuse(msg)) => return Err(FeedError::Disconnected(msg)),
            Some(Attempt::Chunks(chunks)) => chunks,
        };

        let mut items = Vec::with_capacity(chunks.len());
        let mut stall = false;
        for c in chunks {
            match c {
                Chunk::Data(b) => items.push(Ok(b)),
                Chunk::Drop(msg) => {
                    items.push(Err(FeedError::Disconnected(msg)));
                    break;
                }
                Chunk::Stall => {
                    stall = true;
                    break;
                }
            }
        }

        let body = stream::iter(items);
        if stall {
            Ok(split_lines(body.chain(stream::pending())))
        } else {
            Ok(split_lines(body))
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
