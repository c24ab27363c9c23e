use crate::estimate::estimate;
use crate::openai::{ChatCompletionRequest, ChatMessage};
use crate::policy;
use crate::policy::ToolSpec;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Ordered keyword table for the language hint. First case-insensitive
/// substring match in the last message wins.
const LANGUAGE_KEYWORDS: &[(&str, &str)] = &[
    ("html", "HTML"),
    ("python", "Python"),
    ("javascript", "JavaScript"),
    ("go", "Go"),
    ("rust", "Rust"),
    ("java", "Java"),
    ("c++", "C++"),
    ("c#", "C#"),
    ("php", "PHP"),
    ("ruby", "Ruby"),
    ("swift", "Swift"),
    ("kotlin", "Kotlin"),
    ("typescript", "TypeScript"),
    ("c", "C"),
];

const DEFAULT_LANGUAGE: &str = "HTML";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseNode {
    pub content: String,
    pub tool_use: Value,
    pub agent_memory: String,
}

/// One reconstructed (user request, assistant response) pair of upstream
/// chat history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub request_message: String,
    pub response_text: String,
    #[serde(rename = "requestID")]
    pub request_id: String,
    pub response_node: ResponseNode,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamRequest {
    pub path: String,
    pub mode: String,
    pub system_preamble: String,
    pub suffix: String,
    pub language_hint: String,
    pub message: String,
    pub user_guidelines: String,
    pub history: Vec<ChatTurn>,
    #[serde(rename = "checkpointID")]
    pub checkpoint_id: String,
    pub tool_manifest: Vec<ToolSpec>,
    pub blobs: Value,
    pub feature_flags: Value,
}

impl UpstreamRequest {
    /// Prompt-side estimate over everything sent upstream: the current
    /// message plus both sides of every history turn.
    pub fn prompt_token_estimate(&self) -> u64 {
        let mut total = estimate(&self.message);
        for turn in &self.history {
            total += estimate(&turn.request_message) + estimate(&turn.response_text);
        }
        total
    }
}

/// Converts an OpenAI-style chat request into the upstream agent-chat shape.
pub fn translate(request: &ChatCompletionRequest) -> UpstreamRequest {
    let current = request
        .messages
        .last()
        .map(|msg| msg.extract_text())
        .unwrap_or_default();
    UpstreamRequest {
        path: String::new(),
        mode: policy::AGENT_MODE.to_string(),
        system_preamble: policy::SYSTEM_PREAMBLE.to_string(),
        suffix: policy::SUFFIX.to_string(),
        language_hint: language_hint(&request.messages),
        message: format!("{}\n{}", policy::SYSTEM_PREAMBLE, current),
        user_guidelines: policy::USER_GUIDELINES.to_string(),
        history: build_history(&request.messages),
        checkpoint_id: checkpoint_id(),
        tool_manifest: policy::tool_manifest(),
        blobs: policy::blobs(),
        feature_flags: policy::feature_flags(),
    }
}

/// Scans only the last message. No messages at all hints nothing; a message
/// with no keyword match falls back to "HTML".
pub fn language_hint(messages: &[ChatMessage]) -> String {
    let Some(last) = messages.last() else {
        return String::new();
    };
    let text = last.extract_text().to_lowercase();
    for (keyword, name) in LANGUAGE_KEYWORDS {
        if text.contains(keyword) {
            return (*name).to_string();
        }
    }
    DEFAULT_LANGUAGE.to_string()
}

/// Pairs messages `(0,1),(2,3),...` into turns; a trailing unpaired message
/// contributes no turn. The last message is independently re-read as the
/// current message by `translate`, so with an even-length list it appears in
/// the final turn as well. Faithful to the upstream's expectations, not to a
/// "last message is current, rest are history" split.
pub fn build_history(messages: &[ChatMessage]) -> Vec<ChatTurn> {
    let mut history = Vec::new();
    let mut i = 0;
    while i + 1 < messages.len() {
        let request_message = messages[i].extract_text();
        let response_text = messages[i + 1].extract_text();
        history.push(ChatTurn {
            request_message,
            response_text: response_text.clone(),
            request_id: uuid::Uuid::new_v4().to_string(),
            response_node: ResponseNode {
                content: response_text,
                tool_use: serde_json::json!({}),
                agent_memory: String::new(),
            },
        });
        i += 2;
    }
    history
}

/// Hash of the current millisecond timestamp. Only a cache-partition key for
/// the upstream, not a security token, so collisions within one millisecond
/// are acceptable.
pub fn checkpoint_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let digest = Sha256::digest(millis.to_string().as_bytes());
    hex::encode(digest)
}
