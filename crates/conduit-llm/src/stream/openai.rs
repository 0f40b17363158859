use std::collections::BTreeMap;

use super::{ReconstructorState, StreamReconstructor, wrong_family};
use crate::error::LlmError;
use crate::protocol::VendorEvent;
use crate::protocol::openai::{OpenAiStreamChunk, OpenAiStreamFunctionCall};
use crate::types::message::synthesize_call_id;
use crate::types::{FinishReason, StreamChunk, StreamDelta, StreamFunctionCall, ToolCall};

/// Reconstructs canonical chunks from `OpenAI` SSE chunks
///
/// Text passes through as it arrives. Tool-call fragments are assembled per
/// index and released whole on the chunk that carries the finish reason.
#[derive(Debug)]
pub struct OpenAiReconstructor {
    state: ReconstructorState,
    id: String,
    model: String,
    tool_calls: BTreeMap<u32, PartialCall>,
    function_call: Option<PartialCall>,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl PartialCall {
    fn absorb(&mut self, fragment: OpenAiStreamFunctionCall) {
        if let Some(name) = fragment.name {
            self.name.push_str(&name);
        }
        if let Some(arguments) = fragment.arguments {
            self.arguments.push_str(&arguments);
        }
    }

    fn arguments(&self) -> String {
        if self.arguments.trim().is_empty() {
            "{}".to_owned()
        } else {
            self.arguments.clone()
        }
    }
}

impl OpenAiReconstructor {
    /// Reconstructor for a call to `model`
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            state: ReconstructorState::Idle,
            id: String::new(),
            model: model.into(),
            tool_calls: BTreeMap::new(),
            function_call: None,
        }
    }

    /// Move buffered calls into `delta`
    fn drain_calls(&mut self, delta: &mut StreamDelta) {
        if !self.tool_calls.is_empty() {
            let calls = std::mem::take(&mut self.tool_calls)
                .into_values()
                .map(|call| {
                    let arguments = call.arguments();
                    ToolCall::new(call.id.unwrap_or_else(synthesize_call_id), call.name, arguments)
                })
                .collect();
            delta.tool_calls = Some(calls);
        }
        if let Some(call) = self.function_call.take() {
            delta.function_call = Some(StreamFunctionCall {
                arguments: call.arguments(),
                name: Some(call.name),
            });
        }
    }

    fn on_chunk(&mut self, chunk: OpenAiStreamChunk) -> Vec<StreamChunk> {
        if self.state == ReconstructorState::Done {
            if chunk.choices.is_empty() && chunk.usage.is_some() {
                let mut usage_only = StreamChunk::new(&self.id, &self.model, StreamDelta::default(), None);
                usage_only.choices.clear();
                return vec![usage_only.with_usage(chunk.usage)];
            }
            tracing::debug!(id = %chunk.id, "ignoring chunk after finish");
            return Vec::new();
        }

        if self.state == ReconstructorState::Idle {
            self.state = ReconstructorState::TextTurn;
        }
        if !chunk.id.is_empty() {
            self.id = chunk.id;
        }
        if !chunk.model.is_empty() {
            self.model = chunk.model;
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            // Usage-only chunk before any finish reason
            if chunk.usage.is_some() {
                let mut usage_only = StreamChunk::new(&self.id, &self.model, StreamDelta::default(), None);
                usage_only.choices.clear();
                return vec![usage_only.with_usage(chunk.usage)];
            }
            return Vec::new();
        };

        let vendor = choice.delta;
        if let Some(fragments) = vendor.tool_calls {
            self.state = ReconstructorState::BufferingToolCall;
            for fragment in fragments {
                let call = self.tool_calls.entry(fragment.index).or_default();
                if fragment.id.is_some() {
                    call.id = fragment.id;
                }
                if let Some(function) = fragment.function {
                    call.absorb(function);
                }
            }
        }
        if let Some(fragment) = vendor.function_call {
            self.state = ReconstructorState::BufferingToolCall;
            self.function_call.get_or_insert_with(PartialCall::default).absorb(fragment);
        }

        let mut delta = StreamDelta {
            role: vendor.role,
            content: vendor.content,
            ..StreamDelta::default()
        };

        match choice.finish_reason {
            Some(reason) => {
                self.drain_calls(&mut delta);
                self.state = ReconstructorState::Done;
                let finish_reason = FinishReason::from_vendor(&reason);
                vec![StreamChunk::new(&self.id, &self.model, delta, finish_reason).with_usage(chunk.usage)]
            }
            None if delta.role.is_some() || delta.content.is_some() => {
                vec![StreamChunk::new(&self.id, &self.model, delta, None).with_usage(chunk.usage)]
            }
            None => Vec::new(),
        }
    }
}

impl StreamReconstructor for OpenAiReconstructor {
    fn push(&mut self, event: VendorEvent) -> Result<Vec<StreamChunk>, LlmError> {
        match event {
            VendorEvent::OpenAi(chunk) => Ok(self.on_chunk(chunk)),
            other => Err(wrong_family("openai", &other)),
        }
    }

    fn finish(&mut self) -> Result<Vec<StreamChunk>, LlmError> {
        let chunks = if self.state == ReconstructorState::BufferingToolCall {
            tracing::debug!("openai stream ended without a finish reason, releasing buffered calls");
            let mut delta = StreamDelta {
                role: Some("assistant".to_owned()),
                ..StreamDelta::default()
            };
            let finish_reason = if self.function_call.is_some() && self.tool_calls.is_empty() {
                FinishReason::FunctionCall
            } else {
                FinishReason::ToolCalls
            };
            self.drain_calls(&mut delta);
            vec![StreamChunk::new(&self.id, &self.model, delta, Some(finish_reason))]
        } else {
            Vec::new()
        };
        self.state = ReconstructorState::Done;
        Ok(chunks)
    }

    fn state(&self) -> ReconstructorState {
        self.state
    }
}
