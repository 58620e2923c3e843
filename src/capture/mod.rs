// Capture module - accumulates audio for the open trigger window
//
// At most one CaptureSession is open. While open, every chunk the source
// delivers is appended in arrival order, PCM frames and source-encoded bytes
// alike; `close` moves the finished session out by value and leaves the
// buffer empty for the next crossing. Session ids come from a counter that
// can be shared between buffers, so ids keep increasing across restarts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::analysis::spectrum::AmplitudeReading;
use crate::audio::frame::{AudioChunk, ChunkKind, StreamFormat};

/// One open-to-close cycle of the trigger.
///
/// Chunks can only be appended through [`CaptureBuffer`]; once closed, the
/// session is read-only (or consumed whole via [`CaptureSession::into_chunks`]).
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSession {
    id: u64,
    started_at_ms: u64,
    closed_at_ms: Option<u64>,
    trigger: AmplitudeReading,
    format: StreamFormat,
    chunks: Vec<AudioChunk>,
}

impl CaptureSession {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Trigger timestamp (unix milliseconds)
    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    pub fn closed_at_ms(&self) -> Option<u64> {
        self.closed_at_ms
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at_ms.is_some()
    }

    /// Reading that opened the session
    pub fn trigger(&self) -> AmplitudeReading {
        self.trigger
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn chunks(&self) -> &[AudioChunk] {
        &self.chunks
    }

    /// True when at least one chunk of `kind` was captured.
    pub fn holds(&self, kind: ChunkKind) -> bool {
        self.chunks.iter().any(|chunk| chunk.kind() == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Interleaved PCM samples of every frame chunk, in arrival order.
    pub fn pcm_samples(&self) -> Vec<f32> {
        self.chunks
            .iter()
            .filter_map(|chunk| match chunk {
                AudioChunk::Pcm(frame) => Some(frame.samples()),
                AudioChunk::Encoded(_) => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    /// Concatenated bytes of every encoded chunk, in arrival order.
    pub fn encoded_bytes(&self) -> Vec<u8> {
        self.chunks
            .iter()
            .filter_map(|chunk| match chunk {
                AudioChunk::Encoded(bytes) => Some(bytes.as_slice()),
                AudioChunk::Pcm(_) => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    pub fn into_chunks(self) -> Vec<AudioChunk> {
        self.chunks
    }
}

/// Owner of the (single) open session.
#[derive(Debug)]
pub struct CaptureBuffer {
    current: Option<CaptureSession>,
    next_id: Arc<AtomicU64>,
}

impl Default for CaptureBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::with_session_ids(Arc::new(AtomicU64::new(1)))
    }

    /// Draw session ids from `next_id` (the value is the next id handed out).
    pub fn with_session_ids(next_id: Arc<AtomicU64>) -> Self {
        Self {
            current: None,
            next_id,
        }
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&CaptureSession> {
        self.current.as_ref()
    }

    /// Open a new session and return its id.
    ///
    /// A session left open is closed first and returned alongside, so no two
    /// sessions ever overlap.
    pub fn open(
        &mut self,
        started_at_ms: u64,
        trigger: AmplitudeReading,
        format: StreamFormat,
    ) -> (u64, Option<CaptureSession>) {
        let dangling = self.close(started_at_ms);
        if let Some(ref session) = dangling {
            tracing::warn!(
                "[CaptureBuffer] Session {} was still open, closing before opening a new one",
                session.id
            );
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.current = Some(CaptureSession {
            id,
            started_at_ms,
            closed_at_ms: None,
            trigger,
            format,
            chunks: Vec::new(),
        });
        (id, dangling)
    }

    /// Append a chunk to the open session.
    ///
    /// Returns false when nothing is open.
    pub fn append(&mut self, chunk: AudioChunk) -> bool {
        match self.current.as_mut() {
            Some(session) => {
                session.chunks.push(chunk);
                true
            }
            None => {
                tracing::trace!(
                    "[CaptureBuffer] No open session, {:?} chunk ignored",
                    chunk.kind()
                );
                false
            }
        }
    }

    /// Close the open session, handing it off by value.
    pub fn close(&mut self, closed_at_ms: u64) -> Option<CaptureSession> {
        self.current.take().map(|mut session| {
            session.closed_at_ms = Some(closed_at_ms);
            session
        })
    }
}
