// src/ingest/lines.rs
//! Turns an arbitrarily chunked byte stream into lines.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;

use crate::ingest::types::{FeedError, LineStream};

/// Incremental splitter on `\n`; a trailing `\r` is stripped from each line.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: BytesMut,
}

impl LineSplitter {
    /// Feed one chunk; returns every line it completed (empty lines included).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line = self.buf.split_to(pos + 1);
            line.truncate(pos);
            out.push(strip_cr(line.freeze()));
        }
        out
    }

    /// Unterminated remainder at clean end of stream, if any.
    pub fn finish(&mut self) -> Option<Bytes> {
        if self.buf.is_empty() {
            return None;
        }
        Some(strip_cr(self.buf.split().freeze()))
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn strip_cr(line: Bytes) -> Bytes {
    if line.last() == Some(&b'\r') {
        line.slice(..line.len() - 1)
    } else {
        line
    }
}

struct SplitState {
    chunks: futures::stream::BoxStream<'static, Result<Bytes, FeedError>>,
    splitter: LineSplitter,
    ready: VecDeque<Bytes>,
    done: bool,
}

/// Adapt a chunk stream into a [`LineStream`]. After an error the stream
/// ends and the partial buffered line is dropped.
pub fn split_lines<S>(chunks: S) -> LineStream
where
    S: Stream<Item = Result<Bytes, FeedError>> + Send + 'static,
{
    let state = SplitState {
        chunks: chunks.boxed(),
        splitter: LineSplitter::default(),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(line) = st.ready.pop_front() {
                return Some((Ok(line), st));
            }
            if st.done {
                return None;
            }
            match st.chunks.next().await {
                Some(Ok(chunk)) => st.ready.extend(st.splitter.push(&chunk)),
                Some(Err(e)) => {
                    st.done = true;
                    if st.splitter.pending() > 0 {
                        tracing::debug!(
                            target: "ingest",
                            dropped_bytes = st.splitter.pending(),
                            "discarding partial line after feed error"
                        );
                    }
                    return Some((Err(e), st));
                }
                None => {
                    st.done = true;
                    st.ready.extend(st.splitter.finish());
                }
            }
        }
    })
    .boxed()
}
