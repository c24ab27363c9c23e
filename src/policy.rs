use serde::Serialize;
use serde_json::{json, Value};

/// Behavioral preamble prepended to every outbound message. Supplied here as
/// configuration data; the translator treats it as opaque text.
pub const SYSTEM_PREAMBLE: &str = "You are a helpful coding assistant. \
Answer directly and concisely. When the user asks for code, produce complete, \
runnable code in the requested language without placeholder omissions.";

/// Trailing instruction block sent in the request's `suffix` slot.
pub const SUFFIX: &str = "Format answers in markdown. Prefer fenced code \
blocks with a language tag.";

/// Per-workspace guidance slot. Empty: the gateway does not model workspaces.
pub const USER_GUIDELINES: &str = "";

/// Highest-capability agent mode; the upstream gates tool access on it.
pub const AGENT_MODE: &str = "AGENT";

#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchemaJSON")]
    pub input_schema_json: String,
    /// 0 = safe/read-only, 1 = moderate, 2 = execution-capable.
    #[serde(rename = "toolSafety")]
    pub tool_safety: u8,
}

fn tool(name: &str, description: &str, schema: Value, tool_safety: u8) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        description: description.to_string(),
        input_schema_json: schema.to_string(),
        tool_safety,
    }
}

/// The fixed capability manifest advertised to the upstream on every request.
/// Not configurable per request.
pub fn tool_manifest() -> Vec<ToolSpec> {
    vec![
        tool(
            "web-search",
            "Search the web for information relevant to the query.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "The search query." },
                    "num_results": { "type": "integer", "description": "Number of results to return." }
                },
                "required": ["query"]
            }),
            0,
        ),
        tool(
            "web-fetch",
            "Fetch a URL and return its contents as markdown.",
            json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "The URL to fetch." }
                },
                "required": ["url"]
            }),
            0,
        ),
        tool(
            "codebase-retrieval",
            "Retrieve code snippets from the workspace relevant to a natural-language description.",
            json!({
                "type": "object",
                "properties": {
                    "information_request": { "type": "string", "description": "Description of the code being looked for." }
                },
                "required": ["information_request"]
            }),
            0,
        ),
        tool(
            "launch-process",
            "Launch a shell command in the workspace and capture its output.",
            json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "The shell command to run." },
                    "wait": { "type": "boolean", "description": "Wait for the command to finish." },
                    "cwd": { "type": "string", "description": "Working directory for the command." }
                },
                "required": ["command"]
            }),
            2,
        ),
        tool(
            "str-replace-editor",
            "Edit a file by replacing an exact string or inserting at a line.",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path of the file to edit." },
                    "old_str": { "type": "string", "description": "Exact text to replace." },
                    "new_str": { "type": "string", "description": "Replacement text." }
                },
                "required": ["path"]
            }),
            1,
        ),
        tool(
            "kill-process",
            "Terminate a process previously started with launch-process.",
            json!({
                "type": "object",
                "properties": {
                    "process_id": { "type": "integer", "description": "Identifier returned by launch-process." }
                },
                "required": ["process_id"]
            }),
            2,
        ),
    ]
}

/// Static blob bookkeeping slot; the gateway never uploads workspace blobs.
pub fn blobs() -> Value {
    json!({ "checkpoint_id": Value::Null, "added_blobs": [], "deleted_blobs": [] })
}

pub fn feature_flags() -> Value {
    json!({ "support_raw_output": true })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_covers_all_capabilities() {
        let names: Vec<String> = tool_manifest().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "web-search",
                "web-fetch",
                "codebase-retrieval",
                "launch-process",
                "str-replace-editor",
                "kill-process"
            ]
        );
    }

    #[test]
    fn safety_tiers_match_capability() {
        for tool in tool_manifest() {
            let expected = match tool.name.as_str() {
                "launch-process" | "kill-process" => 2,
                "str-replace-editor" => 1,
                _ => 0,
            };
            assert_eq!(tool.tool_safety, expected, "tool {}", tool.name);
        }
    }

    #[test]
    fn schemas_are_valid_json_objects() {
        for tool in tool_manifest() {
            let schema: Value = serde_json::from_str(&tool.input_schema_json).expect("schema");
            assert_eq!(schema.get("type").and_then(|v| v.as_str()), Some("object"));
        }
    }
}
