//! LLM-as-judge evaluation of a conversation trajectory
//!
//! The trajectory is rendered as numbered turns, substituted into the judge
//! prompt, and sent to a judge model through the regular client. The verdict
//! is parsed from a JSON object in the reply, falling back to keyword
//! detection when the judge answers in prose.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::Conduit;
use crate::error::LlmError;
use crate::transport::VendorTransport;
use crate::types::{CompletionRequest, CompletionResponse, Message, ProviderCredentials, Role, Usage};

/// Judge generation budget when the request sets none
pub const DEFAULT_JUDGE_MAX_TOKENS: u32 = 500;

/// Judge temperature when the request sets none
pub const DEFAULT_JUDGE_TEMPERATURE: f64 = 0.0;

// -- Regex patterns compiled once via LazyLock --

static JSON_OBJECT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").unwrap());

static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)score[:\s]+([0-9.]+)").unwrap());

const PASS_KEYWORDS: &[&str] = &["pass", "correct", "yes", "true", "satisfied", "successful"];

/// Keywords used when the reply contains a malformed JSON object
const MALFORMED_PASS_KEYWORDS: &[&str] = &["pass", "correct", "yes", "satisfied"];

/// What to evaluate and with which judge model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeRequest {
    /// Conversation under evaluation
    pub messages: Vec<Message>,
    /// Judge instructions; may contain `{{messages}}`, `{{trajectory}}`, and
    /// `{{messages[-1]}}` placeholders
    pub judge_prompt: String,
    /// Judge model id
    pub model: String,
    /// Judge generation budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Judge temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Outcome of a judge evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    /// Whether the judge considered the trajectory acceptable
    pub passed: bool,
    /// Score normalised to 0..=1, when the judge gave one
    pub score: Option<f64>,
    /// Raw judge reply, or the error text when the call failed
    pub response: String,
    /// Judge call usage
    pub usage: Option<Usage>,
}

impl JudgeVerdict {
    fn failed(error: &LlmError) -> Self {
        Self {
            passed: false,
            score: None,
            response: format!("Error in judge evaluation: {error}"),
            usage: None,
        }
    }

    fn from_response(response: &CompletionResponse) -> Self {
        let reply = response.first_text().unwrap_or_default().to_owned();
        let (passed, score) = parse_verdict(&reply);

        Self {
            passed,
            score,
            response: reply,
            usage: Some(response.usage),
        }
    }
}

impl Conduit {
    /// Evaluate a trajectory with a judge model
    ///
    /// Never fails: call errors are folded into a failed verdict.
    pub async fn judge(&self, request: JudgeRequest, credentials: &ProviderCredentials) -> JudgeVerdict {
        self.run_judge(request, credentials, None).await
    }

    /// Evaluate a trajectory through an explicit transport
    pub async fn judge_with_transport(
        &self,
        request: JudgeRequest,
        credentials: &ProviderCredentials,
        transport: &dyn VendorTransport,
    ) -> JudgeVerdict {
        self.run_judge(request, credentials, Some(transport)).await
    }

    async fn run_judge(
        &self,
        request: JudgeRequest,
        credentials: &ProviderCredentials,
        transport: Option<&dyn VendorTransport>,
    ) -> JudgeVerdict {
        let completion = judge_completion(&request);
        let model = completion.model.clone();

        let outcome = match transport {
            Some(transport) => self.generate_with_transport(completion, credentials, transport).await,
            None => self.generate(completion, credentials).await,
        };

        match outcome {
            Ok(response) => JudgeVerdict::from_response(&response),
            Err(e) => {
                tracing::warn!(model = %model, error = %e, "judge evaluation failed");
                JudgeVerdict::failed(&e)
            }
        }
    }
}

/// Render messages as `Turn N [Role]: content` blocks
pub fn render_trajectory(messages: &[Message]) -> String {
    messages
        .iter()
        .enumerate()
        .map(|(i, msg)| format!("Turn {} [{}]: {}", i + 1, turn_label(msg.role), msg.text()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

const fn turn_label(role: Role) -> &'static str {
    match role {
        Role::System => "System",
        Role::User => "User",
        Role::Assistant => "Assistant",
        Role::Tool | Role::Function => "Tool",
    }
}

/// Canonical request for the judge model
pub fn judge_completion(request: &JudgeRequest) -> CompletionRequest {
    let trajectory = render_trajectory(&request.messages);
    let last = request.messages.last().map(Message::text).unwrap_or_default();

    let system = request
        .judge_prompt
        .replace("{{messages[-1]}}", last)
        .replace("{{messages}}", &trajectory)
        .replace("{{trajectory}}", &trajectory);

    let user = format!(
        "Please evaluate the following conversation trajectory:\n\n{trajectory}\n\n\
         Respond with JSON format: {{\"passed\": true/false, \"score\": 0.0-1.0, \"reasoning\": \"your explanation\"}}"
    );

    let mut completion = CompletionRequest::new(request.model.clone(), vec![Message::system(system), Message::user(user)]);
    completion.max_tokens = Some(request.max_tokens.unwrap_or(DEFAULT_JUDGE_MAX_TOKENS));
    completion.temperature = Some(request.temperature.unwrap_or(DEFAULT_JUDGE_TEMPERATURE));
    completion
}

/// Extract `(passed, score)` from a judge reply
pub fn parse_verdict(reply: &str) -> (bool, Option<f64>) {
    let Some(object) = JSON_OBJECT_RE.find(reply) else {
        let lower = reply.to_lowercase();
        let passed = PASS_KEYWORDS.iter().any(|k| lower.contains(k));
        let score = SCORE_RE
            .captures(reply)
            .and_then(|caps| caps[1].parse::<f64>().ok())
            .and_then(normalize_score);
        return (passed, score);
    };

    match serde_json::from_str::<Value>(object.as_str()) {
        Ok(parsed) => {
            let passed = matches!(parsed.get("passed"), Some(Value::Bool(true)))
                || matches!(parsed.get("passed"), Some(Value::String(s)) if s == "true");
            let score = parsed.get("score").and_then(score_value).and_then(normalize_score);
            (passed, score)
        }
        Err(e) => {
            tracing::debug!(error = %e, "judge reply has malformed JSON, using keywords");
            let lower = reply.to_lowercase();
            (MALFORMED_PASS_KEYWORDS.iter().any(|k| lower.contains(k)), None)
        }
    }
}

fn score_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Scores in (1, 10] are read as a ten-point scale; the result is clamped
fn normalize_score(score: f64) -> Option<f64> {
    if score.is_nan() {
        return None;
    }
    let score = if score > 1.0 && score <= 10.0 { score / 10.0 } else { score };
    Some(score.clamp(0.0, 1.0))
}
