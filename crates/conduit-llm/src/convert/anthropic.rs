//! Conversion between canonical types and the Anthropic wire format
//!
//! The Messages API takes the system prompt out of band and only accepts
//! strictly alternating `user`/`assistant` turns, so every other role is
//! folded into that shape with `":"` placeholders.

use super::ResponseContext;
use super::tools::{serialize_arguments, to_anthropic_tools};
use crate::error::LlmError;
use crate::protocol::anthropic::{
    AnthropicContentBlock, AnthropicMessage, AnthropicRequest, AnthropicResponse, AnthropicResponseBlock,
    AnthropicRole, AnthropicUsage, BEDROCK_ANTHROPIC_VERSION, BedrockInvocationMetrics,
};
use crate::types::{
    Choice, ChoiceMessage, CompletionRequest, CompletionResponse, FinishReason, Message, ResponseObject, Role,
    ToolCall, Usage, unix_now,
};

/// Default max tokens when not specified (Anthropic requires this field)
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f64 = 0.0;

/// Text used wherever the vendor needs a non-empty turn
const PLACEHOLDER: &str = ":";

// -- Outbound: canonical request -> Anthropic wire format --

/// Build the Anthropic request; `bedrock` selects the Bedrock body variant
///
/// # Errors
///
/// Returns `LlmError::Validation` when the message list is empty or does not
/// start with a system message.
pub fn build_request(request: &CompletionRequest, bedrock: bool) -> Result<AnthropicRequest, LlmError> {
    let (system, messages) = adapt_messages(&request.messages)?;
    let tools = request.tools();

    Ok(AnthropicRequest {
        model: (!bedrock).then(|| request.model.clone()),
        anthropic_version: bedrock.then(|| BEDROCK_ANTHROPIC_VERSION.to_owned()),
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        system,
        messages,
        temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        stream: None,
        tools: (!tools.is_empty()).then(|| to_anthropic_tools(tools)),
    })
}

/// Split out the system prompt and fold the rest into alternating turns
///
/// # Errors
///
/// Returns `LlmError::Validation` when the list is empty or its first message
/// is not a system message.
pub fn adapt_messages(messages: &[Message]) -> Result<(String, Vec<AnthropicMessage>), LlmError> {
    let Some((first, rest)) = messages.split_first() else {
        return Err(LlmError::Validation("messages cannot be empty for Anthropic".to_owned()));
    };

    if first.role != Role::System {
        return Err(LlmError::Validation(format!(
            "first message must have role 'system' for Anthropic, got '{}'",
            first.role.as_str()
        )));
    }

    let mut adapted = Vec::with_capacity(rest.len() * 2);
    for msg in rest {
        match msg.role {
            Role::User => adapted.push(text_message(AnthropicRole::User, standard_text(msg))),
            Role::Assistant => adapted.push(text_message(AnthropicRole::Assistant, standard_text(msg))),
            Role::System | Role::Tool | Role::Function => {
                adapted.push(text_message(AnthropicRole::User, PLACEHOLDER.to_owned()));
                adapted.push(text_message(AnthropicRole::Assistant, msg.text().to_owned()));
            }
        }
    }

    Ok((first.text().to_owned(), ensure_alternating(adapted)))
}

/// Text of a user/assistant turn, falling back to call arguments
fn standard_text(msg: &Message) -> String {
    if let Some(content) = msg.content.as_deref()
        && !content.is_empty()
    {
        return content.to_owned();
    }

    if let Some(call) = &msg.function_call {
        return call.arguments.clone();
    }

    msg.tool_calls
        .as_deref()
        .map(|calls| {
            calls
                .iter()
                .map(|call| call.function.arguments.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

/// Single text block message; the vendor rejects empty text
fn text_message(role: AnthropicRole, text: String) -> AnthropicMessage {
    let text = if text.is_empty() { PLACEHOLDER.to_owned() } else { text };

    AnthropicMessage {
        role,
        content: vec![AnthropicContentBlock::Text { text }],
    }
}

/// Insert an opposite-role placeholder between same-role neighbours
fn ensure_alternating(messages: Vec<AnthropicMessage>) -> Vec<AnthropicMessage> {
    let mut out: Vec<AnthropicMessage> = Vec::with_capacity(messages.len());

    for msg in messages {
        if out.last().map(|prev| prev.role) == Some(msg.role) {
            out.push(text_message(msg.role.opposite(), PLACEHOLDER.to_owned()));
        }
        out.push(msg);
    }

    out
}

// -- Usage --

/// Overlay the fields present in `update` onto `running`
pub(crate) fn merge_usage(running: &mut AnthropicUsage, update: &AnthropicUsage) {
    if update.input_tokens.is_some() {
        running.input_tokens = update.input_tokens;
    }
    if update.output_tokens.is_some() {
        running.output_tokens = update.output_tokens;
    }
    if update.cache_read_input_tokens.is_some() {
        running.cache_read_input_tokens = update.cache_read_input_tokens;
    }
}

/// Bedrock invocation metrics win over native usage, field by field
pub(crate) fn apply_metrics(running: &mut AnthropicUsage, metrics: &BedrockInvocationMetrics) {
    if metrics.input_token_count.is_some() {
        running.input_tokens = metrics.input_token_count;
    }
    if metrics.output_token_count.is_some() {
        running.output_tokens = metrics.output_token_count;
    }
}

impl From<AnthropicUsage> for Usage {
    fn from(usage: AnthropicUsage) -> Self {
        Self::new(usage.input_tokens.unwrap_or(0), usage.output_tokens.unwrap_or(0))
            .with_cached_tokens(usage.cache_read_input_tokens.unwrap_or(0))
    }
}

// -- Inbound: Anthropic wire format -> canonical response --

/// Adapt a complete Anthropic response
pub fn adapt_response(resp: AnthropicResponse, ctx: &ResponseContext) -> CompletionResponse {
    let finish_reason = resp.stop_reason.as_deref().and_then(FinishReason::from_vendor);

    let tool_calls: Vec<ToolCall> = resp
        .content
        .iter()
        .filter_map(|block| match block {
            AnthropicResponseBlock::ToolUse { id, name, input } => {
                Some(ToolCall::new(id.clone(), name.clone(), serialize_arguments(input)))
            }
            _ => None,
        })
        .collect();

    let choices = if tool_calls.is_empty() {
        resp.content
            .into_iter()
            .zip(0u32..)
            .map(|(block, index)| Choice {
                index,
                message: block_message(block),
                logprobs: None,
                finish_reason,
            })
            .collect()
    } else {
        vec![Choice {
            index: 0,
            message: ChoiceMessage::with_tool_calls(tool_calls),
            logprobs: None,
            finish_reason: Some(FinishReason::ToolCalls),
        }]
    };

    CompletionResponse {
        id: resp.id,
        object: ResponseObject::ChatCompletion,
        created: unix_now(),
        model: if resp.model.is_empty() { ctx.model.clone() } else { resp.model },
        choices,
        usage: resp.usage.into(),
        system_fingerprint: None,
    }
}

/// Canonical message for a single non-tool-use block
fn block_message(block: AnthropicResponseBlock) -> ChoiceMessage {
    match block {
        AnthropicResponseBlock::Text { text } => ChoiceMessage::text("assistant", text),
        AnthropicResponseBlock::ToolResult { content, .. } => {
            let text = match content {
                serde_json::Value::String(text) => text,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            ChoiceMessage::text("tool", text)
        }
        AnthropicResponseBlock::ToolUse { id, name, input } => {
            ChoiceMessage::with_tool_calls(vec![ToolCall::new(id, name, serialize_arguments(&input))])
        }
        AnthropicResponseBlock::Unknown => {
            tracing::debug!("unrecognized content block, mapping to assistant");
            ChoiceMessage::text("assistant", String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::convert::tools::parse_arguments;
    use crate::router::Provider;
    use crate::types::{FunctionCall, ToolDefinition};

    fn roles(messages: &[AnthropicMessage]) -> Vec<AnthropicRole> {
        messages.iter().map(|m| m.role).collect()
    }

    fn text(msg: &AnthropicMessage) -> &str {
        let AnthropicContentBlock::Text { text } = &msg.content[0];
        text
    }

    fn ctx() -> ResponseContext {
        ResponseContext::new(Provider::Anthropic, "claude-3-5-sonnet-20241022")
    }

    #[test]
    fn bedrock_example_extracts_system_prompt() {
        let request = CompletionRequest::new(
            "anthropic.claude-3-5-sonnet-20240620-v1:0",
            vec![Message::system("You are helpful"), Message::user("Hi")],
        );

        let wire = build_request(&request, true).unwrap();

        assert_eq!(wire.system, "You are helpful");
        assert_eq!(wire.messages.len(), 1);
        assert_eq!(wire.messages[0].role, AnthropicRole::User);
        assert_eq!(text(&wire.messages[0]), "Hi");
        assert_eq!(wire.anthropic_version.as_deref(), Some("bedrock-2023-05-31"));
        assert!(wire.model.is_none());
        assert_eq!(wire.max_tokens, DEFAULT_MAX_TOKENS);

        let body = serde_json::to_value(&wire).unwrap();
        assert_eq!(body["messages"][0], json!({"role": "user", "content": [{"type": "text", "text": "Hi"}]}));
        assert!(body.get("model").is_none());
    }

    #[test]
    fn first_party_keeps_model() {
        let request = CompletionRequest::new("claude-3-5-sonnet-20241022", vec![
            Message::system("s"),
            Message::user("u"),
        ]);

        let wire = build_request(&request, false).unwrap();

        assert_eq!(wire.model.as_deref(), Some("claude-3-5-sonnet-20241022"));
        assert!(wire.anthropic_version.is_none());
    }

    #[test]
    fn rejects_empty_and_missing_system() {
        assert!(matches!(adapt_messages(&[]), Err(LlmError::Validation(_))));
        assert!(matches!(
            adapt_messages(&[Message::user("hi")]),
            Err(LlmError::Validation(_))
        ));
    }

    #[test]
    fn tool_roles_expand_into_placeholder_pair() {
        let (_, out) = adapt_messages(&[
            Message::system("s"),
            Message::user("call it"),
            Message::tool("call_1", "42"),
        ])
        .unwrap();

        assert_eq!(roles(&out), [
            AnthropicRole::User,
            AnthropicRole::Assistant,
            AnthropicRole::User,
            AnthropicRole::Assistant,
        ]);
        assert_eq!(text(&out[1]), ":");
        assert_eq!(text(&out[2]), ":");
        assert_eq!(text(&out[3]), "42");
    }

    #[test]
    fn adjacent_roles_always_alternate() {
        let messages = vec![
            Message::system("s"),
            Message::user("a"),
            Message::user("b"),
            Message::assistant("c"),
            Message::assistant("d"),
            Message::function("f", "r"),
            Message::system("late"),
            Message::user("e"),
        ];

        let (system, out) = adapt_messages(&messages).unwrap();

        assert_eq!(system, "s");
        assert!(out.windows(2).all(|pair| pair[0].role != pair[1].role));
        assert!(out.iter().all(|m| !text(m).is_empty()));
    }

    #[test]
    fn assistant_call_text_falls_back_to_arguments() {
        let legacy = Message {
            content: None,
            function_call: Some(FunctionCall {
                name: "f".to_owned(),
                arguments: r#"{"x":1}"#.to_owned(),
            }),
            ..Message::assistant("")
        };
        let (_, out) = adapt_messages(&[Message::system("s"), Message::user("u"), legacy]).unwrap();

        assert_eq!(text(&out[1]), r#"{"x":1}"#);
    }

    #[test]
    fn tools_use_custom_shape() {
        let mut request = CompletionRequest::new("claude-3-5-sonnet-20241022", vec![
            Message::system("s"),
            Message::user("u"),
        ]);
        request.tools = Some(vec![ToolDefinition::function(
            "get_weather",
            Some("Weather".to_owned()),
            json!({"type": "object"}),
        )]);

        let body = serde_json::to_value(build_request(&request, false).unwrap()).unwrap();

        assert_eq!(body["tools"][0], json!({
            "type": "custom",
            "name": "get_weather",
            "description": "Weather",
            "input_schema": {"type": "object"}
        }));
    }

    #[test]
    fn tool_use_response_yields_single_call_choice() {
        let resp: AnthropicResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "model": "claude-3-5-sonnet-20241022",
            "content": [
                {"type": "text", "text": "Let me check"},
                {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"city": "NYC"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 20, "output_tokens": 10}
        }))
        .unwrap();

        let out = adapt_response(resp, &ctx());

        assert_eq!(out.choices.len(), 1);
        let choice = &out.choices[0];
        assert!(choice.message.content.is_none());
        assert_eq!(choice.finish_reason, Some(FinishReason::ToolCalls));
        let call = &choice.message.tool_calls.as_ref().unwrap()[0];
        assert_eq!(call.id, "toolu_1");
        assert_eq!(call.function.name, "get_weather");
        assert_eq!(parse_arguments(&call.function.arguments), json!({"city": "NYC"}));
        assert_eq!(out.usage.total_tokens, 30);
    }

    #[test]
    fn tool_call_round_trips_through_tool_use_form() {
        let original = ToolCall::new("call_1", "get_weather", r#"{"city":"NYC"}"#);
        let resp = AnthropicResponse {
            id: "msg_1".to_owned(),
            model: String::new(),
            content: vec![AnthropicResponseBlock::ToolUse {
                id: original.id.clone(),
                name: original.function.name.clone(),
                input: parse_arguments(&original.function.arguments),
            }],
            stop_reason: Some("tool_use".to_owned()),
            usage: AnthropicUsage::default(),
        };

        let out = adapt_response(resp, &ctx());
        let call = &out.choices[0].message.tool_calls.as_ref().unwrap()[0];

        assert_eq!(call.function.name, original.function.name);
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&call.function.arguments).unwrap(),
            serde_json::from_str::<serde_json::Value>(&original.function.arguments).unwrap()
        );
        assert_eq!(out.model, "claude-3-5-sonnet-20241022");
    }

    #[test]
    fn blocks_map_to_roles_by_type() {
        let resp: AnthropicResponse = serde_json::from_value(json!({
            "id": "msg_2",
            "model": "m",
            "content": [
                {"type": "text", "text": "hello"},
                {"type": "tool_result", "tool_use_id": "toolu_1", "content": "42"},
                {"type": "redacted_thinking", "data": "xyz"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 5, "output_tokens": 1, "cache_read_input_tokens": 3}
        }))
        .unwrap();

        let out = adapt_response(resp, &ctx());

        let roles: Vec<&str> = out.choices.iter().map(|c| c.message.role.as_str()).collect();
        assert_eq!(roles, ["assistant", "tool", "assistant"]);
        assert_eq!(out.choices[1].message.content.as_deref(), Some("42"));
        assert_eq!(out.usage.prompt_tokens_details.cached_tokens, 3);
        assert_eq!(out.usage.total_tokens, 6);
    }
}
