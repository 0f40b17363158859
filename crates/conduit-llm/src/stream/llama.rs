use std::collections::VecDeque;

use super::{ReconstructorState, StreamReconstructor, wrong_family};
use crate::convert::llama::{llama_usage, parse_function_tag, response_id};
use crate::error::LlmError;
use crate::protocol::VendorEvent;
use crate::protocol::anthropic::BedrockInvocationMetrics;
use crate::protocol::llama::LlamaResponse;
use crate::types::{FinishReason, StreamChunk, StreamDelta, StreamFunctionCall};

/// Fragments held back while looking for a `<function>` tag
const WINDOW: usize = 3;

/// Reconstructs canonical chunks from Llama generation fragments
///
/// Llama tokenizes `<function>` as `"<"` followed by `"function"`, so the
/// reconstructor keeps a three-fragment lookahead window. When the second and
/// third fragments complete the tag, the rest of the turn is accumulated and
/// released as a single `function_call` chunk at stream end.
#[derive(Debug)]
pub struct LlamaReconstructor {
    state: ReconstructorState,
    id: String,
    model: String,
    window: VecDeque<LlamaResponse>,
    buffer: String,
    last_stop_reason: Option<String>,
    counts: LlamaResponse,
}

impl LlamaReconstructor {
    /// Reconstructor for a call to `model`
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            state: ReconstructorState::Idle,
            id: response_id(),
            model: model.into(),
            window: VecDeque::with_capacity(WINDOW),
            buffer: String::new(),
            last_stop_reason: None,
            counts: LlamaResponse::default(),
        }
    }

    /// Track token counts across fragments; later values win
    fn record(&mut self, fragment: &LlamaResponse) {
        if fragment.prompt_token_count.is_some() {
            self.counts.prompt_token_count = fragment.prompt_token_count;
        }
        if fragment.generation_token_count.is_some() {
            self.counts.generation_token_count = fragment.generation_token_count;
        }
        if let Some(metrics) = fragment.metrics {
            let running = self.counts.metrics.get_or_insert_with(BedrockInvocationMetrics::default);
            if metrics.input_token_count.is_some() {
                running.input_token_count = metrics.input_token_count;
            }
            if metrics.output_token_count.is_some() {
                running.output_token_count = metrics.output_token_count;
            }
        }
        if fragment.stop_reason.is_some() {
            self.last_stop_reason.clone_from(&fragment.stop_reason);
        }
    }

    fn opens_function(&self) -> bool {
        self.window.len() == WINDOW && self.window[1].generation == "<" && self.window[2].generation == "function"
    }

    /// Chunk for one fragment emitted as text
    fn text_chunk(&self, fragment: LlamaResponse) -> StreamChunk {
        let chunk = StreamChunk::text(&self.id, &self.model, fragment.generation);
        match fragment.stop_reason.as_deref() {
            Some(reason) => {
                let mut chunk = chunk.with_usage(Some(llama_usage(&self.counts)));
                chunk.choices[0].finish_reason = Some(FinishReason::from_vendor(reason).unwrap_or(FinishReason::Stop));
                chunk
            }
            None => chunk,
        }
    }

    /// Single `function_call` chunk for an accumulated function turn
    fn function_chunk(&mut self) -> StreamChunk {
        let text = std::mem::take(&mut self.buffer);
        let function_call = match parse_function_tag(&text) {
            Some((name, arguments)) => StreamFunctionCall {
                name: Some(name),
                arguments,
            },
            None => {
                tracing::warn!(generation = %text, "could not extract function call from llama output");
                StreamFunctionCall {
                    name: None,
                    arguments: "{}".to_owned(),
                }
            }
        };

        let delta = StreamDelta {
            role: Some("assistant".to_owned()),
            function_call: Some(function_call),
            ..StreamDelta::default()
        };
        let finish_reason = self.last_stop_reason.as_deref().map(|reason| {
            FinishReason::from_vendor(reason).unwrap_or(FinishReason::Stop)
        });

        StreamChunk::new(&self.id, &self.model, delta, finish_reason).with_usage(Some(llama_usage(&self.counts)))
    }
}

impl StreamReconstructor for LlamaReconstructor {
    fn push(&mut self, event: VendorEvent) -> Result<Vec<StreamChunk>, LlmError> {
        let VendorEvent::Llama(fragment) = event else {
            return Err(wrong_family("llama", &event));
        };

        match self.state {
            ReconstructorState::Done => Err(LlmError::adaptation("llama fragment after end of stream")),
            ReconstructorState::BufferingToolCall => {
                self.record(&fragment);
                self.buffer.push_str(&fragment.generation);
                Ok(Vec::new())
            }
            ReconstructorState::Idle | ReconstructorState::TextTurn => {
                self.state = ReconstructorState::TextTurn;
                self.record(&fragment);
                self.window.push_back(fragment);

                if self.opens_function() {
                    tracing::debug!("function tag detected in llama stream");
                    self.state = ReconstructorState::BufferingToolCall;
                    self.buffer = self.window.drain(..).map(|f| f.generation).collect();
                    return Ok(Vec::new());
                }

                if self.window.len() < WINDOW {
                    return Ok(Vec::new());
                }

                Ok(self.window.pop_front().map(|f| self.text_chunk(f)).into_iter().collect())
            }
        }
    }

    fn finish(&mut self) -> Result<Vec<StreamChunk>, LlmError> {
        let chunks = match self.state {
            ReconstructorState::Idle | ReconstructorState::Done => Vec::new(),
            ReconstructorState::BufferingToolCall => vec![self.function_chunk()],
            ReconstructorState::TextTurn => {
                let window = std::mem::take(&mut self.window);
                window.into_iter().map(|f| self.text_chunk(f)).collect()
            }
        };
        self.state = ReconstructorState::Done;
        Ok(chunks)
    }

    fn state(&self) -> ReconstructorState {
        self.state
    }
}
