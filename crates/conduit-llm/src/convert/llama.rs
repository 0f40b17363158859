//! Conversion between canonical types and the Llama 3.x prompt format
//!
//! Llama has no message list and no native tool calling. The conversation is
//! rendered into one header-delimited prompt, and tools are described in the
//! system header with an instruction to answer in a `<function>` tag.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::ResponseContext;
use super::tools::{parse_arguments, serialize_arguments};
use crate::protocol::llama::{LlamaRequest, LlamaResponse};
use crate::types::{
    Choice, ChoiceMessage, CompletionRequest, CompletionResponse, FinishReason, FunctionCall, Message,
    ResponseObject, Role, ToolDefinition, Usage, unix_now,
};

/// Default generation length when the request sets none
pub const DEFAULT_MAX_GEN_LEN: u32 = 512;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

const TOP_P: f64 = 0.9;

const BEGIN_OF_TEXT: &str = "<|begin_of_text|>";

/// Marker the model emits when it decides to call a function
pub const FUNCTION_TAG: &str = "<function>";

// -- Regex patterns compiled once via LazyLock --

static SYSTEM_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(<\|start_header_id\|>system<\|end_header_id\|>\n+)([\s\S]*?)(<\|eot_id\|>)").unwrap()
});

static FUNCTION_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<function>\s*\{\s*"function_name":\s*"([^"]+)",\s*"parameters":\s*(\{.*?\})\s*\}\s*</function>"#)
        .unwrap()
});

// -- Outbound: canonical request -> Llama prompt --

/// Build the Bedrock Llama request body
pub fn build_request(request: &CompletionRequest) -> LlamaRequest {
    LlamaRequest {
        prompt: render_prompt(&request.messages, request.tools()),
        max_gen_len: request.max_tokens.unwrap_or(DEFAULT_MAX_GEN_LEN),
        temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        top_p: TOP_P,
    }
}

/// Render the conversation (and tool instructions) into one prompt string
pub fn render_prompt(messages: &[Message], tools: &[ToolDefinition]) -> String {
    let mut prompt = String::from(BEGIN_OF_TEXT);

    for msg in messages {
        push_turn(&mut prompt, header_role(msg.role), &turn_text(msg));
    }

    if messages.last().is_some_and(|m| m.role == Role::User) {
        prompt.push_str("<|start_header_id|>assistant<|end_header_id|>\n");
    }

    if tools.is_empty() {
        prompt
    } else {
        insert_tool_block(&prompt, &tool_block(tools))
    }
}

fn push_turn(prompt: &mut String, role: &str, content: &str) {
    prompt.push_str("<|start_header_id|>");
    prompt.push_str(role);
    prompt.push_str("<|end_header_id|>\n");
    prompt.push_str(content);
    prompt.push_str("<|eot_id|>\n");
}

/// Llama 3.1 puts tool output under the `ipython` header
const fn header_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool | Role::Function => "ipython",
    }
}

/// Message text, or the `<function>` tag for a content-less call turn
fn turn_text(msg: &Message) -> String {
    if let Some(content) = msg.content.as_deref()
        && !content.is_empty()
    {
        return content.to_owned();
    }

    let call = msg
        .function_call
        .as_ref()
        .or_else(|| msg.tool_calls.as_deref().and_then(<[_]>::first).map(|tc| &tc.function));

    call.map_or_else(String::new, render_function_tag)
}

fn render_function_tag(call: &FunctionCall) -> String {
    let tag = serde_json::json!({
        "function_name": call.name,
        "parameters": parse_arguments(&call.arguments),
    });
    format!("{FUNCTION_TAG}{tag}</function>")
}

/// Instruction block describing the tools and the expected call format
fn tool_block(tools: &[ToolDefinition]) -> String {
    let listing = serde_json::to_string_pretty(tools).unwrap_or_else(|_| "[]".to_owned());

    format!(
        r#"
You have access to the following functions:

{listing}

If you choose to call a function ONLY reply in the following format with no prefix or suffix:

<function>{{"function_name": "the name of the function", "parameters": {{"parameter_key": "the value of the parameter"}}}}</function>

Reminder:
- Function calls MUST follow the specified format, start with <function> and end with </function>
- Required parameters MUST be specified
- Only call one function at a time
- Put the entire function call reply on one line
- If there is no function call available, answer the question like normal with your current knowledge and do not tell the user about function calls
"#
    )
}

/// Append the tool block to the system header, creating one if needed
fn insert_tool_block(prompt: &str, block: &str) -> String {
    if SYSTEM_HEADER_RE.is_match(prompt) {
        return SYSTEM_HEADER_RE
            .replacen(prompt, 1, |caps: &Captures<'_>| format!("{}{}\n{block}{}", &caps[1], &caps[2], &caps[3]))
            .into_owned();
    }

    tracing::warn!("prompt has no system header, inserting one for tool instructions");
    let rest = prompt.strip_prefix(BEGIN_OF_TEXT).unwrap_or(prompt);
    let mut out = String::with_capacity(prompt.len() + block.len() + 64);
    out.push_str(BEGIN_OF_TEXT);
    push_turn(&mut out, "system", block);
    out.push_str(rest);
    out
}

// -- Inbound: Llama generation -> canonical --

/// Extract `(name, canonical arguments)` from a `<function>` tag
pub fn parse_function_tag(text: &str) -> Option<(String, String)> {
    let caps = FUNCTION_CALL_RE.captures(text)?;
    let arguments = serialize_arguments(&parse_arguments(&caps[2]));
    Some((caps[1].to_owned(), arguments))
}

/// Usage from Llama token counts, overridden by Bedrock metrics when present
pub(crate) fn llama_usage(resp: &LlamaResponse) -> Usage {
    let metrics = resp.metrics.unwrap_or_default();
    let prompt = metrics.input_token_count.or(resp.prompt_token_count).unwrap_or(0);
    let completion = metrics
        .output_token_count
        .or(resp.generation_token_count)
        .unwrap_or(0);
    Usage::new(prompt, completion)
}

/// Identifier for Llama turns, which carry none of their own
pub(crate) fn response_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

/// Adapt a complete Llama generation
pub fn adapt_response(resp: LlamaResponse, ctx: &ResponseContext) -> CompletionResponse {
    let usage = llama_usage(&resp);
    let generation = resp.generation.trim();

    let function_call = generation
        .contains(FUNCTION_TAG)
        .then(|| parse_function_tag(generation))
        .flatten();

    let (message, finish_reason) = match function_call {
        Some((name, arguments)) => (
            ChoiceMessage::with_function_call(FunctionCall { name, arguments }),
            Some(FinishReason::FunctionCall),
        ),
        None => (
            ChoiceMessage::text("assistant", generation.to_owned()),
            resp.stop_reason.as_deref().and_then(FinishReason::from_vendor),
        ),
    };

    CompletionResponse {
        id: response_id(),
        object: ResponseObject::TextCompletion,
        created: unix_now(),
        model: ctx.model.clone(),
        choices: vec![Choice {
            index: 0,
            message,
            logprobs: None,
            finish_reason,
        }],
        usage,
        system_fingerprint: None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::protocol::anthropic::BedrockInvocationMetrics;
    use crate::router::Provider;
    use crate::types::ToolCall;

    fn ctx() -> ResponseContext {
        ResponseContext::new(Provider::LlamaBedrock, "meta.llama3-1-70b-instruct-v1:0")
    }

    #[test]
    fn renders_headers_and_open_assistant_turn() {
        let prompt = render_prompt(&[Message::system("Be brief"), Message::user("Hi")], &[]);

        assert_eq!(
            prompt,
            "<|begin_of_text|>\
             <|start_header_id|>system<|end_header_id|>\nBe brief<|eot_id|>\n\
             <|start_header_id|>user<|end_header_id|>\nHi<|eot_id|>\n\
             <|start_header_id|>assistant<|end_header_id|>\n"
        );
    }

    #[test]
    fn no_open_header_after_assistant_turn() {
        let prompt = render_prompt(&[Message::user("Hi"), Message::assistant("Hello")], &[]);
        assert!(prompt.ends_with("Hello<|eot_id|>\n"));
    }

    #[test]
    fn tool_results_use_ipython_header() {
        let prompt = render_prompt(&[Message::tool("call_1", "42")], &[]);
        assert!(prompt.contains("<|start_header_id|>ipython<|end_header_id|>\n42<|eot_id|>"));
    }

    #[test]
    fn call_turn_renders_function_tag() {
        let msg = Message::assistant_tool_calls(vec![ToolCall::new("call_1", "get_weather", r#"{"city":"NYC"}"#)]);
        let prompt = render_prompt(&[msg], &[]);

        assert!(prompt.contains(r#"<function>{"function_name":"get_weather","parameters":{"city":"NYC"}}</function>"#));
    }

    #[test]
    fn tool_block_lands_inside_system_header() {
        let tools = [ToolDefinition::function("get_weather", None, json!({"type": "object"}))];
        let prompt = render_prompt(&[Message::system("Be brief"), Message::user("Hi")], &tools);

        let system_end = prompt.find("<|eot_id|>").unwrap();
        let system_region = &prompt[..system_end];
        assert!(system_region.starts_with("<|begin_of_text|><|start_header_id|>system<|end_header_id|>\nBe brief\n"));
        assert!(system_region.contains("\"get_weather\""));
        assert!(system_region.contains("<function>"));
        assert!(prompt.contains("<|start_header_id|>user<|end_header_id|>\nHi<|eot_id|>"));
    }

    #[test]
    fn tool_block_creates_missing_system_header() {
        let tools = [ToolDefinition::function("get_weather", None, json!({"type": "object"}))];
        let prompt = render_prompt(&[Message::user("Hi")], &tools);

        assert!(prompt.starts_with("<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n"));
        assert_eq!(prompt.matches("<|begin_of_text|>").count(), 1);
        assert!(prompt.ends_with("<|start_header_id|>assistant<|end_header_id|>\n"));
    }

    #[test]
    fn request_defaults() {
        let request = CompletionRequest::new("meta.llama3-1-8b-instruct-v1:0", vec![Message::user("Hi")]);
        let wire = build_request(&request);

        assert_eq!(wire.max_gen_len, 512);
        assert!((wire.temperature - 0.7).abs() < f64::EPSILON);
        assert!((wire.top_p - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_function_tag() {
        let (name, arguments) =
            parse_function_tag(r#"<function>{"function_name": "get_weather", "parameters": {"city": "NYC"}}</function>"#)
                .unwrap();

        assert_eq!(name, "get_weather");
        assert_eq!(parse_arguments(&arguments), json!({"city": "NYC"}));
        assert!(parse_function_tag("<function>oops</function>").is_none());
    }

    #[test]
    fn text_response_is_trimmed_text_completion() {
        let resp = LlamaResponse {
            generation: "  Hello there \n".to_owned(),
            prompt_token_count: Some(9),
            generation_token_count: Some(3),
            stop_reason: Some("stop".to_owned()),
            metrics: None,
        };

        let out = adapt_response(resp, &ctx());

        assert_eq!(out.object, ResponseObject::TextCompletion);
        assert_eq!(out.first_text(), Some("Hello there"));
        assert_eq!(out.choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(out.usage, Usage::new(9, 3));
        assert_eq!(out.model, "meta.llama3-1-70b-instruct-v1:0");
    }

    #[test]
    fn function_response_becomes_function_call() {
        let resp = LlamaResponse {
            generation: r#"<function>{"function_name": "get_weather", "parameters": {"city": "NYC"}}</function>"#
                .to_owned(),
            prompt_token_count: Some(50),
            generation_token_count: Some(20),
            stop_reason: Some("stop".to_owned()),
            metrics: Some(BedrockInvocationMetrics {
                input_token_count: Some(51),
                output_token_count: None,
            }),
        };

        let out = adapt_response(resp, &ctx());
        let message = &out.choices[0].message;

        assert!(message.content.is_none());
        assert_eq!(message.function_call.as_ref().unwrap().name, "get_weather");
        assert_eq!(out.usage, Usage::new(51, 20));
    }
}
