use super::{ReconstructorState, StreamReconstructor, wrong_family};
use crate::convert::anthropic::{apply_metrics, merge_usage};
use crate::convert::tools::{parse_arguments, serialize_arguments};
use crate::error::LlmError;
use crate::protocol::VendorEvent;
use crate::protocol::anthropic::{
    AnthropicStreamContentBlock, AnthropicStreamDelta, AnthropicStreamEvent, AnthropicUsage, BedrockInvocationMetrics,
};
use crate::types::{FinishReason, StreamChunk, StreamDelta, ToolCall, Usage};

/// Reconstructs canonical chunks from Anthropic Messages events
///
/// Serves both the first-party API and Bedrock; the latter may attach
/// invocation metrics to any frame.
#[derive(Debug)]
pub struct AnthropicReconstructor {
    state: ReconstructorState,
    id: String,
    model: String,
    usage: AnthropicUsage,
    metrics: BedrockInvocationMetrics,
    stop_reason: Option<String>,
    open: Option<OpenBlock>,
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug)]
enum OpenBlock {
    Text { index: u32 },
    ToolUse { index: u32, id: String, name: String, json: String },
    Other { index: u32 },
}

impl OpenBlock {
    const fn index(&self) -> u32 {
        match self {
            Self::Text { index } | Self::ToolUse { index, .. } | Self::Other { index } => *index,
        }
    }
}

impl AnthropicReconstructor {
    /// Reconstructor for a call to `model`, used until `message_start` names one
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            state: ReconstructorState::Idle,
            id: String::new(),
            model: model.into(),
            usage: AnthropicUsage::default(),
            metrics: BedrockInvocationMetrics::default(),
            stop_reason: None,
            open: None,
            tool_calls: Vec::new(),
        }
    }

    fn require_turn(&self, event: &str) -> Result<(), LlmError> {
        match self.state {
            ReconstructorState::TextTurn | ReconstructorState::BufferingToolCall => Ok(()),
            ReconstructorState::Idle => Err(LlmError::adaptation(format!("{event} before message_start"))),
            ReconstructorState::Done => Err(LlmError::adaptation(format!("{event} after message_stop"))),
        }
    }

    fn on_event(&mut self, event: AnthropicStreamEvent) -> Result<Vec<StreamChunk>, LlmError> {
        match event {
            AnthropicStreamEvent::MessageStart { message } => {
                if self.state != ReconstructorState::Idle {
                    return Err(LlmError::adaptation("message_start in the middle of a turn"));
                }
                self.id = message.id;
                if !message.model.is_empty() {
                    self.model = message.model;
                }
                if let Some(usage) = message.usage {
                    merge_usage(&mut self.usage, &usage);
                }
                self.state = ReconstructorState::TextTurn;
                Ok(Vec::new())
            }

            AnthropicStreamEvent::ContentBlockStart { index, content_block } => {
                self.require_turn("content_block_start")?;
                if let Some(open) = &self.open {
                    return Err(LlmError::adaptation(format!(
                        "content_block_start for block {index} while block {} is open",
                        open.index()
                    )));
                }

                let mut chunks = Vec::new();
                self.open = Some(match content_block {
                    AnthropicStreamContentBlock::Text { text } => {
                        if !text.is_empty() && self.state == ReconstructorState::TextTurn {
                            chunks.push(StreamChunk::text(&self.id, &self.model, text));
                        }
                        OpenBlock::Text { index }
                    }
                    AnthropicStreamContentBlock::ToolUse { id, name } => {
                        self.state = ReconstructorState::BufferingToolCall;
                        OpenBlock::ToolUse {
                            index,
                            id,
                            name,
                            json: String::new(),
                        }
                    }
                    AnthropicStreamContentBlock::Unknown => {
                        tracing::debug!(index, "ignoring content block of unknown type");
                        OpenBlock::Other { index }
                    }
                });
                Ok(chunks)
            }

            AnthropicStreamEvent::ContentBlockDelta { index, delta } => {
                self.require_turn("content_block_delta")?;
                let Some(open) = self.open.as_mut() else {
                    return Err(LlmError::adaptation(format!(
                        "content_block_delta for block {index} with no open block"
                    )));
                };
                if open.index() != index {
                    return Err(LlmError::adaptation(format!(
                        "content_block_delta for block {index} while block {} is open",
                        open.index()
                    )));
                }

                match (open, delta) {
                    (OpenBlock::Text { .. }, AnthropicStreamDelta::TextDelta { text }) => {
                        if self.state == ReconstructorState::TextTurn {
                            return Ok(vec![StreamChunk::text(&self.id, &self.model, text)]);
                        }
                        // Text alongside a tool call is held back with the rest of the turn
                        tracing::debug!(index, "dropping text delta in a tool turn");
                    }
                    (OpenBlock::ToolUse { json, .. }, AnthropicStreamDelta::InputJsonDelta { partial_json }) => {
                        json.push_str(&partial_json);
                    }
                    (_, other) => {
                        tracing::debug!(index, delta = ?other, "ignoring delta that does not match the open block");
                    }
                }
                Ok(Vec::new())
            }

            AnthropicStreamEvent::ContentBlockStop { index } => {
                self.require_turn("content_block_stop")?;
                match self.open.take() {
                    None => Err(LlmError::adaptation(format!(
                        "content_block_stop for block {index} with no open block"
                    ))),
                    Some(open) if open.index() != index => Err(LlmError::adaptation(format!(
                        "content_block_stop for block {index} while block {} is open",
                        open.index()
                    ))),
                    Some(OpenBlock::ToolUse { id, name, json, .. }) => {
                        let arguments = if json.trim().is_empty() {
                            "{}".to_owned()
                        } else {
                            serialize_arguments(&parse_arguments(&json))
                        };
                        self.tool_calls.push(ToolCall::new(id, name, arguments));
                        Ok(Vec::new())
                    }
                    Some(_) => Ok(Vec::new()),
                }
            }

            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                self.require_turn("message_delta")?;
                if delta.stop_reason.is_some() {
                    self.stop_reason = delta.stop_reason;
                }
                if let Some(usage) = usage {
                    merge_usage(&mut self.usage, &usage);
                }
                Ok(Vec::new())
            }

            AnthropicStreamEvent::MessageStop { usage } => {
                self.require_turn("message_stop")?;
                if let Some(open) = &self.open {
                    return Err(LlmError::adaptation(format!(
                        "message_stop while block {} is open",
                        open.index()
                    )));
                }
                if let Some(usage) = usage {
                    merge_usage(&mut self.usage, &usage);
                }
                Ok(vec![self.finalize()])
            }

            AnthropicStreamEvent::Ping => Ok(Vec::new()),

            AnthropicStreamEvent::Error { error } => Err(LlmError::Streaming(format!(
                "{}: {}",
                error.error_type, error.message
            ))),

            AnthropicStreamEvent::Unknown => {
                tracing::debug!("ignoring unknown stream event");
                Ok(Vec::new())
            }
        }
    }

    /// Terminal chunk for the turn; moves to `Done`
    fn finalize(&mut self) -> StreamChunk {
        let mut usage = self.usage;
        apply_metrics(&mut usage, &self.metrics);
        let usage = Some(Usage::from(usage));

        let was_tool_turn = self.state == ReconstructorState::BufferingToolCall;
        self.state = ReconstructorState::Done;

        if was_tool_turn || !self.tool_calls.is_empty() {
            let delta = StreamDelta {
                role: Some("assistant".to_owned()),
                tool_calls: Some(std::mem::take(&mut self.tool_calls)),
                ..StreamDelta::default()
            };
            return StreamChunk::new(&self.id, &self.model, delta, Some(FinishReason::ToolCalls)).with_usage(usage);
        }

        let finish_reason = self
            .stop_reason
            .as_deref()
            .map_or(Some(FinishReason::Stop), FinishReason::from_vendor);

        StreamChunk::new(&self.id, &self.model, StreamDelta::default(), finish_reason).with_usage(usage)
    }
}

impl StreamReconstructor for AnthropicReconstructor {
    fn push(&mut self, event: VendorEvent) -> Result<Vec<StreamChunk>, LlmError> {
        let VendorEvent::Anthropic(frame) = event else {
            return Err(wrong_family("anthropic", &event));
        };

        if self.state == ReconstructorState::Done {
            return Err(LlmError::adaptation("stream event after message_stop"));
        }

        if let Some(metrics) = frame.metrics {
            if metrics.input_token_count.is_some() {
                self.metrics.input_token_count = metrics.input_token_count;
            }
            if metrics.output_token_count.is_some() {
                self.metrics.output_token_count = metrics.output_token_count;
            }
        }

        self.on_event(frame.event)
    }

    fn finish(&mut self) -> Result<Vec<StreamChunk>, LlmError> {
        match self.state {
            ReconstructorState::Idle | ReconstructorState::Done => Ok(Vec::new()),
            ReconstructorState::TextTurn | ReconstructorState::BufferingToolCall => {
                Err(LlmError::adaptation("stream ended before message_stop"))
            }
        }
    }

    fn state(&self) -> ReconstructorState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::protocol::anthropic::AnthropicStreamFrame;

    fn event(value: serde_json::Value) -> VendorEvent {
        let frame: AnthropicStreamFrame = serde_json::from_value(value).unwrap();
        VendorEvent::Anthropic(frame)
    }

    fn run(rec: &mut AnthropicReconstructor, events: Vec<serde_json::Value>) -> Vec<StreamChunk> {
        events
            .into_iter()
            .flat_map(|e| rec.push(event(e)).unwrap())
            .collect()
    }

    fn message_start() -> serde_json::Value {
        json!({
            "type": "message_start",
            "message": {"id": "msg_01", "model": "claude-3-5-sonnet-20241022", "usage": {"input_tokens": 25, "output_tokens": 1}}
        })
    }

    #[test]
    fn text_turn_streams_each_delta() {
        let mut rec = AnthropicReconstructor::new("claude-3-5-sonnet-20241022");
        let chunks = run(
            &mut rec,
            vec![
                message_start(),
                json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
                json!({"type": "ping"}),
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hel"}}),
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "lo"}}),
                json!({"type": "content_block_stop", "index": 0}),
                json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 12}}),
                json!({"type": "message_stop", "usage": {"input_tokens": 25, "output_tokens": 15}}),
            ],
        );

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].delta().unwrap().content.as_deref(), Some("Hel"));
        assert_eq!(chunks[1].delta().unwrap().content.as_deref(), Some("lo"));
        assert!(chunks[..2].iter().all(|c| c.usage.is_none() && c.finish_reason().is_none()));

        let last = &chunks[2];
        assert_eq!(last.finish_reason(), Some(FinishReason::Stop));
        assert_eq!(last.usage, Some(Usage::new(25, 15)));
        assert_eq!(last.id, "msg_01");
        assert_eq!(rec.state(), ReconstructorState::Done);
        assert!(rec.finish().unwrap().is_empty());
    }

    #[test]
    fn tool_turn_emits_single_terminal_chunk() {
        let mut rec = AnthropicReconstructor::new("claude-3-5-sonnet-20241022");
        let chunks = run(
            &mut rec,
            vec![
                message_start(),
                json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Checking"}}),
                json!({"type": "content_block_stop", "index": 0}),
                json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_01", "name": "get_weather"}}),
                json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"city\":"}}),
                json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": " \"Paris\"}"}}),
                json!({"type": "content_block_stop", "index": 1}),
                json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 30}}),
                json!({"type": "message_stop"}),
            ],
        );

        // Text before the tool block streams; nothing else until the end
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].delta().unwrap().content.as_deref(), Some("Checking"));

        let last = &chunks[1];
        assert_eq!(last.finish_reason(), Some(FinishReason::ToolCalls));
        let calls = last.delta().unwrap().tool_calls.as_ref().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "toolu_01");
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(calls[0].function.arguments, r#"{"city":"Paris"}"#);
        assert_eq!(last.usage, Some(Usage::new(25, 30)));
    }

    #[test]
    fn invalid_tool_json_becomes_empty_object() {
        let mut rec = AnthropicReconstructor::new("claude-3-5-sonnet-20241022");
        let chunks = run(
            &mut rec,
            vec![
                message_start(),
                json!({"type": "content_block_start", "index": 0, "content_block": {"type": "tool_use", "id": "toolu_01", "name": "lookup"}}),
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "input_json_delta", "partial_json": "{\"q\": "}}),
                json!({"type": "content_block_stop", "index": 0}),
                json!({"type": "message_stop"}),
            ],
        );

        assert_eq!(chunks.len(), 1);
        let calls = chunks[0].delta().unwrap().tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.arguments, "{}");
    }

    #[test]
    fn bedrock_metrics_override_native_usage() {
        let mut rec = AnthropicReconstructor::new("anthropic.claude-3-haiku-20240307-v1:0");
        let chunks = run(
            &mut rec,
            vec![
                message_start(),
                json!({"type": "message_delta", "delta": {"stop_reason": "max_tokens"}, "usage": {"output_tokens": 10}}),
                json!({
                    "type": "message_stop",
                    "amazon-bedrock-invocationMetrics": {"inputTokenCount": 30, "outputTokenCount": 11}
                }),
            ],
        );

        let last = chunks.last().unwrap();
        assert_eq!(last.usage, Some(Usage::new(30, 11)));
        assert_eq!(last.finish_reason(), Some(FinishReason::Length));
    }

    #[test]
    fn structural_violations_are_adaptation_errors() {
        let mut rec = AnthropicReconstructor::new("m");
        let err = rec
            .push(event(json!({"type": "content_block_stop", "index": 0})))
            .unwrap_err();
        assert!(matches!(err, LlmError::Adaptation { .. }));

        let mut rec = AnthropicReconstructor::new("m");
        rec.push(event(message_start())).unwrap();
        let err = rec.push(event(message_start())).unwrap_err();
        assert!(matches!(err, LlmError::Adaptation { .. }));

        let mut rec = AnthropicReconstructor::new("m");
        rec.push(event(message_start())).unwrap();
        let err = rec
            .push(event(
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "x"}}),
            ))
            .unwrap_err();
        assert!(matches!(err, LlmError::Adaptation { .. }));

        let mut rec = AnthropicReconstructor::new("m");
        rec.push(event(message_start())).unwrap();
        rec.push(event(
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        ))
        .unwrap();
        let err = rec
            .push(event(json!({"type": "content_block_stop", "index": 3})))
            .unwrap_err();
        assert!(matches!(err, LlmError::Adaptation { .. }));
    }

    #[test]
    fn events_after_stop_are_rejected() {
        let mut rec = AnthropicReconstructor::new("m");
        run(&mut rec, vec![message_start(), json!({"type": "message_stop"})]);

        let err = rec.push(event(json!({"type": "ping"}))).unwrap_err();
        assert!(matches!(err, LlmError::Adaptation { .. }));
    }

    #[test]
    fn premature_end_is_an_error() {
        let mut rec = AnthropicReconstructor::new("m");
        rec.push(event(message_start())).unwrap();
        assert!(matches!(rec.finish(), Err(LlmError::Adaptation { .. })));

        let mut idle = AnthropicReconstructor::new("m");
        assert!(idle.finish().unwrap().is_empty());
    }

    #[test]
    fn vendor_error_event_is_streaming_error() {
        let mut rec = AnthropicReconstructor::new("m");
        rec.push(event(message_start())).unwrap();
        let err = rec
            .push(event(
                json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
            ))
            .unwrap_err();

        assert!(matches!(err, LlmError::Streaming(ref m) if m == "overloaded_error: Overloaded"));
    }
}
