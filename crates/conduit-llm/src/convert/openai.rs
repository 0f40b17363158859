//! Conversion between canonical types and the `OpenAI` wire format
//!
//! Requests are nearly pass-through. The one real transformation is moving
//! conversations written against the legacy `function_call` protocol onto the
//! `tool_calls` protocol that modern models validate strictly.

use std::collections::HashSet;

use super::tools::{to_openai_functions, to_openai_tools};
use crate::protocol::openai::{OpenAiRequest, OpenAiResponse};
use crate::router::{Provider, requires_tool_calls};
use crate::types::{
    Choice, CompletionRequest, CompletionResponse, FinishReason, Message, ResponseObject, Role, ToolCall, Usage,
    unix_now,
};

/// Content given to an assistant turn whose calls were all stripped
const STRIPPED_CALL_PLACEHOLDER: &str = "function call";

// -- Outbound: canonical request -> OpenAI wire format --

/// Build the `OpenAI` request for the given provider
pub fn build_request(request: &CompletionRequest, provider: Provider) -> OpenAiRequest {
    let modern = requires_tool_calls(provider, &request.model);
    let tools = request.tools();

    let (messages, tools, functions) = if modern {
        let tools = (!tools.is_empty()).then(|| to_openai_tools(tools));
        (rewrite_for_tool_calls(&request.messages), tools, None)
    } else {
        let functions = (!tools.is_empty()).then(|| to_openai_functions(tools));
        (legacy_messages(&request.messages), None, functions)
    };

    OpenAiRequest {
        model: request.model.clone(),
        messages,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        tools,
        functions,
        stream: None,
        stream_options: None,
    }
}

/// Legacy models take messages as-is; function results need string content
fn legacy_messages(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .cloned()
        .map(|mut msg| {
            if msg.role == Role::Function && msg.content.is_none() {
                msg.content = Some(String::new());
            }
            msg
        })
        .collect()
}

/// Rewrite a conversation so every `tool_calls` id is answered
///
/// - A legacy `function_call` immediately followed by a `function` message of
///   the same name becomes a `tool_calls` entry with a synthesized id plus a
///   `tool` message answering it.
/// - For an assistant turn with `tool_calls`, only calls answered by the run of
///   tool/function messages right after it survive.
/// - Assistant turns left without calls fall back to their text, or to a
///   placeholder when they had none.
/// - Tool and function messages that answer nothing surviving are dropped.
pub fn rewrite_for_tool_calls(messages: &[Message]) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len());
    let mut i = 0;

    while i < messages.len() {
        let msg = &messages[i];

        match msg.role {
            Role::Assistant if msg.function_call.is_some() && msg.tool_calls.is_none() => {
                i += rewrite_legacy_pair(msg, messages.get(i + 1), &mut out);
            }
            Role::Assistant if msg.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty()) => {
                let run_len = messages[i + 1..]
                    .iter()
                    .take_while(|m| matches!(m.role, Role::Tool | Role::Function))
                    .count();
                reconcile_tool_turn(msg, &messages[i + 1..i + 1 + run_len], &mut out);
                i += 1 + run_len;
            }
            Role::Tool | Role::Function => {
                tracing::debug!(role = msg.role.as_str(), "dropping tool result with no matching call");
                i += 1;
            }
            _ => {
                out.push(msg.clone());
                i += 1;
            }
        }
    }

    out
}

/// Handle a legacy `function_call`; returns how many input messages it consumed
fn rewrite_legacy_pair(assistant: &Message, next: Option<&Message>, out: &mut Vec<Message>) -> usize {
    let Some(call) = &assistant.function_call else {
        out.push(assistant.clone());
        return 1;
    };

    match next {
        Some(answer) if answer.role == Role::Function && answer.name.as_deref() == Some(call.name.as_str()) => {
            let tool_call = ToolCall::synthesized(call.name.clone(), call.arguments.clone());
            let tool_message = Message::tool(tool_call.id.clone(), answer.text());

            out.push(Message {
                content: assistant.content.clone(),
                tool_calls: Some(vec![tool_call]),
                function_call: None,
                ..Message::assistant("")
            });
            out.push(tool_message);
            2
        }
        _ => {
            tracing::debug!(function = %call.name, "stripping unanswered legacy function call");
            out.push(plain_assistant(assistant));
            1
        }
    }
}

/// Keep only answered calls of an assistant turn and the answers to them
fn reconcile_tool_turn(assistant: &Message, run: &[Message], out: &mut Vec<Message>) {
    let calls = assistant.tool_calls.as_deref().unwrap_or_default();

    let answered: Vec<&ToolCall> = calls
        .iter()
        .filter(|call| run.iter().any(|answer| answers(answer, call)))
        .collect();

    if answered.len() < calls.len() {
        tracing::debug!(
            kept = answered.len(),
            dropped = calls.len() - answered.len(),
            "stripping unanswered tool calls"
        );
    }

    if answered.is_empty() {
        out.push(plain_assistant(assistant));
        return;
    }

    out.push(Message {
        tool_calls: Some(answered.iter().map(|call| (*call).clone()).collect()),
        function_call: None,
        ..assistant.clone()
    });

    let mut answered_ids: HashSet<&str> = HashSet::new();
    for answer in run {
        let Some(call) = answered.iter().find(|call| answers(answer, call)) else {
            tracing::debug!(role = answer.role.as_str(), "dropping tool result for unknown call");
            continue;
        };

        // One answer per call; later duplicates would fail vendor validation
        if !answered_ids.insert(call.id.as_str()) {
            continue;
        }

        out.push(Message::tool(call.id.clone(), answer.text()));
    }
}

/// Whether a tool/function message answers the call
fn answers(answer: &Message, call: &ToolCall) -> bool {
    match answer.role {
        Role::Tool => answer.tool_call_id.as_deref() == Some(call.id.as_str()),
        Role::Function => answer.name.as_deref() == Some(call.function.name.as_str()),
        _ => false,
    }
}

/// Assistant turn with every call removed
fn plain_assistant(assistant: &Message) -> Message {
    let content = match assistant.content.as_deref() {
        Some(text) if !text.is_empty() => text.to_owned(),
        _ => STRIPPED_CALL_PLACEHOLDER.to_owned(),
    };

    Message {
        name: assistant.name.clone(),
        ..Message::assistant(content)
    }
}

// -- Inbound: OpenAI wire format -> canonical response --

impl From<OpenAiResponse> for CompletionResponse {
    fn from(resp: OpenAiResponse) -> Self {
        let choices = resp
            .choices
            .into_iter()
            .map(|choice| Choice {
                index: choice.index,
                message: choice.message,
                logprobs: None,
                finish_reason: choice.finish_reason.as_deref().and_then(FinishReason::from_vendor),
            })
            .collect();

        Self {
            id: resp.id,
            object: ResponseObject::ChatCompletion,
            created: if resp.created == 0 { unix_now() } else { resp.created },
            model: resp.model,
            choices,
            usage: resp.usage.unwrap_or_else(|| Usage::new(0, 0)),
            system_fingerprint: resp.system_fingerprint,
        }
    }
}
