//! Reconstruction of canonical chunk streams from vendor event streams
//!
//! A [`StreamReconstructor`] is a synchronous state machine owned by exactly
//! one in-flight stream. [`ChunkStream`] drives it from the vendor event
//! stream and exposes the result as a pull-based, cancellable
//! `futures::Stream`.

pub mod anthropic;
pub mod llama;
pub mod openai;

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

pub use self::anthropic::AnthropicReconstructor;
pub use self::llama::LlamaReconstructor;
pub use self::openai::OpenAiReconstructor;
use crate::error::LlmError;
use crate::protocol::VendorEvent;
use crate::types::StreamChunk;

/// Ordered vendor events as produced by a transport
pub type VendorEventStream = Pin<Box<dyn Stream<Item = Result<VendorEvent, LlmError>> + Send>>;

/// Where a reconstructor is within the current turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructorState {
    /// No event seen yet
    Idle,
    /// Streaming text incrementally
    TextTurn,
    /// A tool or function call was detected; output is held until the turn ends
    BufferingToolCall,
    /// Terminal chunk emitted; no further events are accepted
    Done,
}

/// Per-stream state machine turning vendor events into canonical chunks
pub trait StreamReconstructor: Send {
    /// Feed the next vendor event, returning the chunks it completes
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Adaptation` for structurally invalid event sequences
    /// and events of the wrong vendor family.
    fn push(&mut self, event: VendorEvent) -> Result<Vec<StreamChunk>, LlmError>;

    /// Signal the end of the vendor stream, returning any held-back chunks
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Adaptation` when the stream ended mid-turn in a way
    /// the vendor protocol does not allow.
    fn finish(&mut self) -> Result<Vec<StreamChunk>, LlmError>;

    /// Current state
    fn state(&self) -> ReconstructorState;
}

/// Error for an event from a family the reconstructor does not speak
pub(crate) fn wrong_family(expected: &str, event: &VendorEvent) -> LlmError {
    LlmError::adaptation(format!(
        "{expected} reconstructor received a {} event",
        event.family()
    ))
}

/// Canonical chunk stream for one call
///
/// Yields chunks in vendor order. A fatal error is yielded once and ends the
/// stream. Dropping the stream, or cancelling its token, drops the upstream
/// transport stream and discards any state not yet emitted.
pub struct ChunkStream {
    inner: Pin<Box<dyn Stream<Item = Result<StreamChunk, LlmError>> + Send>>,
    cancel: CancellationToken,
}

impl ChunkStream {
    /// Drive `reconstructor` from `upstream`
    pub fn new(upstream: VendorEventStream, reconstructor: Box<dyn StreamReconstructor>) -> Self {
        Self::with_cancellation(upstream, reconstructor, CancellationToken::new())
    }

    /// Drive `reconstructor` from `upstream`, stopping when `cancel` fires
    pub fn with_cancellation(
        upstream: VendorEventStream,
        reconstructor: Box<dyn StreamReconstructor>,
        cancel: CancellationToken,
    ) -> Self {
        let pump = Pump {
            upstream: Some(upstream),
            reconstructor,
            pending: VecDeque::new(),
            cancel: cancel.clone(),
        };

        let inner = futures_util::stream::unfold(pump, Pump::next);

        Self {
            inner: Box::pin(inner),
            cancel,
        }
    }

    /// Token that cancels this stream when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the stream and close the upstream transport
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStream")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Stream for ChunkStream {
    type Item = Result<StreamChunk, LlmError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// State threaded through the unfold loop
struct Pump {
    /// `None` once the upstream ended or failed
    upstream: Option<VendorEventStream>,
    reconstructor: Box<dyn StreamReconstructor>,
    pending: VecDeque<StreamChunk>,
    cancel: CancellationToken,
}

impl Pump {
    async fn next(mut self) -> Option<(Result<StreamChunk, LlmError>, Self)> {
        loop {
            if self.cancel.is_cancelled() {
                tracing::debug!(discarded = self.pending.len(), "chunk stream cancelled");
                return None;
            }

            if let Some(chunk) = self.pending.pop_front() {
                return Some((Ok(chunk), self));
            }

            let upstream = self.upstream.as_mut()?;

            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    tracing::debug!("chunk stream cancelled while waiting for vendor");
                    return None;
                }
                next = upstream.next() => next,
            };

            let produced = match next {
                Some(Ok(event)) => self.reconstructor.push(event),
                Some(Err(e)) => Err(e),
                None => {
                    self.upstream = None;
                    self.reconstructor.finish()
                }
            };

            match produced {
                Ok(chunks) => self.pending.extend(chunks),
                Err(e) => {
                    tracing::debug!(error = %e, state = ?self.reconstructor.state(), "chunk stream failed");
                    self.upstream = None;
                    self.pending.clear();
                    return Some((Err(e), self));
                }
            }
        }
    }
}
