//! Text generation backends and the mind-map prompt flows built on them
//!
//! Every flow takes a `&dyn TextGenerator` so the server, the CLI and the
//! tests can swap Anthropic, Ollama or a canned generator freely.

use crate::db::{DetailLevel, ExportMeta, MindMap, NodeSummary, SummaryAttachment};
use crate::hierarchy::FlatNode;
use crate::settings::{LlmBackend, Settings};
use crate::utils::safe_truncate;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest source text sent to the generator, in bytes
const MAX_PAYLOAD_BYTES: usize = 60_000;
const MAX_CONTEXT_BYTES: usize = 100_000;
const EXCERPT_BYTES: usize = 280;

pub const UNTITLED_MAP: &str = "Untitled Mind Map";

/// A prompt-in, text-out language model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, String>;
}

// ============================================================================
// Anthropic
// ============================================================================

/// Anthropic API message format
#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

/// Anthropic API request format
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

/// Anthropic API response format
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Without a key every call fails with "ANTHROPIC_API_KEY not set".
pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    url: String,
}

impl AnthropicGenerator {
    pub fn new(api_key: Option<String>, model: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            model,
            url: ANTHROPIC_API_URL.to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, String> {
        let api_key = self.api_key.as_deref().ok_or("ANTHROPIC_API_KEY not set")?;
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("API error {}: {}", status, body));
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        if let Some(usage) = &api_response.usage {
            tracing::debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                model = %self.model,
                "Anthropic usage"
            );
        }

        Ok(api_response
            .content
            .into_iter()
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

// ============================================================================
// Ollama
// ============================================================================

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(url: String, model: String) -> Self {
        Self {
            client: http_client(),
            url: url.trim_end_matches('/').to_string(),
            model,
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, String> {
        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions { num_predict: max_tokens },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Ollama request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Ollama error {}: {}", status, body));
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse Ollama response: {}", e))?;
        Ok(parsed.response)
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Build the generator the settings ask for.
pub fn generator_from_settings(settings: &Settings) -> Arc<dyn TextGenerator> {
    match settings.llm_backend {
        LlmBackend::Anthropic => {
            if !settings.has_api_key() {
                tracing::warn!("No Anthropic API key configured; AI operations will fail");
            }
            Arc::new(AnthropicGenerator::new(
                settings.api_key().map(String::from),
                settings.anthropic_model.clone(),
            ))
        }
        LlmBackend::Ollama => Arc::new(OllamaGenerator::new(
            settings.ollama_url.clone(),
            settings.ollama_model.clone(),
        )),
    }
}

// ============================================================================
// Response parsing
// ============================================================================

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*\n?(.*?)```").expect("fence pattern"))
}

/// Pull the JSON payload out of a model answer. Handles bare JSON, markdown
/// code fences, and JSON surrounded by prose.
pub fn extract_json(text: &str) -> Result<serde_json::Value, String> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    for caps in fence_regex().captures_iter(trimmed) {
        if let Some(body) = caps.get(1) {
            if let Ok(value) = serde_json::from_str(body.as_str().trim()) {
                return Ok(value);
            }
        }
    }

    // Outermost {...} or [...] span
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                    return Ok(value);
                }
            }
        }
    }

    Err(format!(
        "No JSON found in AI response: {}",
        safe_truncate(trimmed, 200)
    ))
}

fn str_field(json: &serde_json::Value, key: &str) -> Option<String> {
    json.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

// ============================================================================
// Mind map generation
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    File,
    Audio,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOptions {
    #[serde(default)]
    pub detail_level: DetailLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub input_type: InputType,
    pub payload: String,
    #[serde(default)]
    pub options: GenerateOptions,
}

fn mind_map_prompt(request: &GenerateRequest) -> String {
    let source = match request.input_type {
        InputType::Text => "pasted text",
        InputType::File => "document text",
        InputType::Audio => "voice transcript",
    };
    let detail = match request.options.detail_level {
        DetailLevel::Detailed => "Cover every important idea; use as many levels as the material needs.",
        DetailLevel::Simplest => "Keep it small: the main idea and at most two levels of key points.",
    };

    format!(
        r#"You are an expert at creating hierarchical mind maps from text.
Your output MUST be a single JSON object. Do not add any commentary outside of the JSON object.

Generate a FLAT LIST of nodes. Each node object MUST have:
1. A unique "id" (e.g. "special-relativity").
2. A non-empty "label" (e.g. "Special Relativity").
3. An optional "parentId", the "id" of its parent. The single top-level node has no "parentId".

Example:
{{
  "title": "Theory of Relativity",
  "nodes": [
    {{ "id": "theory-of-relativity", "label": "Theory of Relativity" }},
    {{ "id": "special-relativity", "label": "Special Relativity", "parentId": "theory-of-relativity" }},
    {{ "id": "general-relativity", "label": "General Relativity", "parentId": "theory-of-relativity" }},
    {{ "id": "time-dilation", "label": "Time Dilation", "parentId": "special-relativity" }}
  ]
}}

{}

Build the mind map for the following {}:
---
{}
---"#,
        detail,
        source,
        safe_truncate(&request.payload, MAX_PAYLOAD_BYTES)
    )
}

/// Turn a model answer into a map document, filling in whatever the model
/// left out. The node list is taken as-is; whether it forms a tree is the
/// hierarchy builder's call.
pub fn parse_generated_map(text: &str, now: DateTime<Utc>) -> Result<MindMap, String> {
    let json = extract_json(text)?;

    let raw_nodes = match &json {
        serde_json::Value::Array(items) => items,
        other => other
            .get("nodes")
            .and_then(serde_json::Value::as_array)
            .ok_or("AI response has no \"nodes\" list")?,
    };
    // Records decode one by one; anything that isn't an object becomes an
    // empty record for the builder to drop
    let nodes: Vec<FlatNode> = raw_nodes
        .iter()
        .map(|raw| serde_json::from_value::<FlatNode>(raw.clone()).unwrap_or_default())
        .collect();

    let title = str_field(&json, "title").unwrap_or_else(|| default_title(&nodes));
    let map_id = str_field(&json, "mapId").unwrap_or_else(|| format!("map-{}", now.timestamp_millis()));
    let created_at = str_field(&json, "createdAt").unwrap_or_else(|| now.to_rfc3339());
    let export_meta = json
        .get("exportMeta")
        .and_then(|m| serde_json::from_value::<ExportMeta>(m.clone()).ok())
        .unwrap_or_default();

    Ok(MindMap {
        map_id,
        title,
        created_at,
        node_count: nodes.len(),
        nodes,
        export_meta,
        user_id: None,
        is_saved: false,
        source_text: None,
    })
}

/// Label of the first node without a parent
pub fn default_title(nodes: &[FlatNode]) -> String {
    nodes
        .iter()
        .find(|n| n.parent_id.as_deref().map_or(true, str::is_empty))
        .map(|n| n.label.trim())
        .filter(|label| !label.is_empty())
        .map(String::from)
        .unwrap_or_else(|| UNTITLED_MAP.to_string())
}

pub async fn generate_mind_map(
    generator: &dyn TextGenerator,
    request: &GenerateRequest,
) -> Result<MindMap, String> {
    if request.payload.trim().is_empty() {
        return Err("Nothing to build a mind map from: input is empty".to_string());
    }

    tracing::info!(
        backend = generator.name(),
        input_type = ?request.input_type,
        bytes = request.payload.len(),
        "Generating mind map"
    );
    let text = generator.complete(&mind_map_prompt(request), 4096).await?;
    let mut map = parse_generated_map(&text, Utc::now())?;
    map.source_text = Some(safe_truncate(&request.payload, MAX_CONTEXT_BYTES).to_string());
    Ok(map)
}

// ============================================================================
// Node summaries
// ============================================================================

fn summary_prompt(label: &str, detail_level: DetailLevel, context: Option<&str>) -> String {
    let context_block = match context {
        Some(ctx) => format!(
            "\nThe map was built from this source; stay consistent with it:\n---\n{}\n---\n",
            safe_truncate(ctx, MAX_CONTEXT_BYTES)
        ),
        None => String::new(),
    };
    format!(
        r#"You are an expert at explaining complex topics.
Explain the mind map node below. The detail level is {}.
{}
Node label: {}

Output a JSON object with exactly these keys:
- "tl_dr": at most 2 sentences, max 28 words.
- "detailed": 1-3 concise paragraphs, may include bullet points.
- "analogy": 1-2 short analogies using everyday examples.

JSON only."#,
        detail_level.as_str(),
        context_block,
        label
    )
}

/// Parse the three summary texts. With `context`, the record carries an
/// excerpt of it and is tagged as a grounded summary.
pub fn parse_summary(text: &str, node_id: &str, context: Option<&str>) -> Result<NodeSummary, String> {
    let json = extract_json(text)?;
    let tl_dr = str_field(&json, "tl_dr")
        .or_else(|| str_field(&json, "tldr"))
        .ok_or("AI summary is missing \"tl_dr\"")?;

    let attachment = match context {
        Some(ctx) => SummaryAttachment::Context {
            context_excerpt: Some(safe_truncate(ctx.trim(), EXCERPT_BYTES).to_string()),
        },
        None => SummaryAttachment::None,
    };

    Ok(NodeSummary {
        node_id: node_id.to_string(),
        tl_dr,
        detailed: str_field(&json, "detailed").unwrap_or_default(),
        analogy: str_field(&json, "analogy").unwrap_or_default(),
        attachment,
    })
}

pub async fn summarize_node(
    generator: &dyn TextGenerator,
    node_id: &str,
    label: &str,
    detail_level: DetailLevel,
    context: Option<&str>,
) -> Result<NodeSummary, String> {
    tracing::debug!(node_id, label, detail = detail_level.as_str(), "Summarizing node");
    let text = generator
        .complete(&summary_prompt(label, detail_level, context), 1500)
        .await?;
    parse_summary(&text, node_id, context)
}

// ============================================================================
// Voice commands
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VoiceAction {
    Explain,
    Analogy,
    Save,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCommand {
    pub action: VoiceAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node_id: Option<String>,
}

fn voice_prompt(transcript: &str) -> String {
    format!(
        r#"You interpret voice commands inside a mind mapping application.
Possible actions:
- "explain": explain a concept in more detail.
- "analogy": give an analogy for a concept.
- "save": save a note on a node.
If the command names a specific node, put its id in "targetNodeId"; otherwise omit it.

Examples:
Transcript: "Explain this concept." -> {{"action":"explain"}}
Transcript: "Give me an analogy for this." -> {{"action":"analogy"}}
Transcript: "Save note for node XYZ." -> {{"action":"save","targetNodeId":"XYZ"}}

Transcript: {}
JSON only."#,
        transcript.trim()
    )
}

pub fn parse_voice_command(text: &str) -> Result<VoiceCommand, String> {
    let json = extract_json(text)?;
    let action = str_field(&json, "action").ok_or("Voice command has no action")?;
    let action = match action.to_ascii_lowercase().as_str() {
        "explain" => VoiceAction::Explain,
        "analogy" => VoiceAction::Analogy,
        "save" => VoiceAction::Save,
        other => return Err(format!("Unknown voice action: {}", other)),
    };
    Ok(VoiceCommand {
        action,
        target_node_id: str_field(&json, "targetNodeId"),
    })
}

pub async fn interpret_voice_command(
    generator: &dyn TextGenerator,
    transcript: &str,
) -> Result<VoiceCommand, String> {
    if transcript.trim().is_empty() {
        return Err("Voice transcript is empty".to_string());
    }
    let text = generator.complete(&voice_prompt(transcript), 200).await?;
    parse_voice_command(&text)
}

// ============================================================================
// Context chat
// ============================================================================

pub const NOT_IN_CONTEXT: &str =
    "I cannot find the answer to that question within the context of the current mind map source document.";

fn chat_prompt(question: &str, context: &str) -> String {
    format!(
        r#"You answer questions based ONLY on the content in the "Context" section.
Do not use any outside knowledge. If the answer is not in the context, reply exactly:
"{}"
Be concise and direct.

Context:
---
{}
---
User question: {}"#,
        NOT_IN_CONTEXT,
        safe_truncate(context, MAX_CONTEXT_BYTES),
        question.trim()
    )
}

pub async fn context_chat(
    generator: &dyn TextGenerator,
    question: &str,
    context: &str,
) -> Result<String, String> {
    if question.trim().is_empty() {
        return Err("Question is empty".to_string());
    }
    let text = generator.complete(&chat_prompt(question, context), 1000).await?;
    let answer = text.trim();
    if answer.is_empty() {
        return Err("AI returned an empty answer".to_string());
    }
    Ok(answer.to_string())
}

// ============================================================================
// Test support
// ============================================================================


#[cfg(test)]
mod tests {
    use super::scripted::ScriptedGenerator;
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_extract_json_bare() {
        let v = extract_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn test_extract_json_with_markdown() {
        let v = extract_json("```json\n{\"title\": \"Test\"}\n```").unwrap();
        assert_eq!(v["title"], "Test");
    }

    #[test]
    fn test_extract_json_with_prose() {
        let v = extract_json("Sure! Here is your map:\n{\"nodes\": []}\nHope that helps.").unwrap();
        assert!(v["nodes"].is_array());
    }

    #[test]
    fn test_extract_json_rejects_plain_text() {
        assert!(extract_json("I cannot do that").is_err());
    }

    #[test]
    fn test_parse_generated_map_fills_defaults() {
        let text = r#"{"nodes":[
            {"id":"b","label":"Child","parentId":"a"},
            {"id":"a","label":"Photosynthesis"}
        ]}"#;
        let map = parse_generated_map(text, fixed_now()).unwrap();
        assert_eq!(map.title, "Photosynthesis");
        assert_eq!(map.map_id, format!("map-{}", fixed_now().timestamp_millis()));
        assert_eq!(map.created_at, fixed_now().to_rfc3339());
        assert_eq!(map.export_meta, ExportMeta::default());
        assert_eq!(map.node_count, 2);
        assert!(!map.is_saved);
    }

    #[test]
    fn test_parse_generated_map_keeps_model_fields() {
        let text = r#"```json
{"mapId":"m-7","title":"Given","createdAt":"2020-01-01T00:00:00Z",
 "exportMeta":{"exportedBy":"model","mode":"oneday","oneDayModeApplied":true},
 "nodes":[{"id":"a","label":"A"}]}
```"#;
        let map = parse_generated_map(text, fixed_now()).unwrap();
        assert_eq!(map.map_id, "m-7");
        assert_eq!(map.title, "Given");
        assert_eq!(map.created_at, "2020-01-01T00:00:00Z");
        assert_eq!(map.export_meta.exported_by, "model");
    }

    #[test]
    fn test_parse_generated_map_tolerates_bad_records() {
        // Missing labels and null parents reach the builder untouched
        let text = r#"[{"id":"a","label":"A","parentId":null},{"id":"b"},{"label":"no id"}]"#;
        let map = parse_generated_map(text, fixed_now()).unwrap();
        assert_eq!(map.nodes.len(), 3);
        assert_eq!(map.nodes[1].label, "");
        assert_eq!(map.title, "A");
    }

    #[test]
    fn test_parse_generated_map_null_label_and_numeric_id() {
        let text = r#"{"nodes":[
            {"id":"r","label":"Root"},
            {"id":"b","label":null,"parentId":"r"},
            {"id":"c","label":"C","parentId":"r"},
            {"id":7,"label":"Seven","parentId":"c"},
            "not a record"
        ]}"#;
        let map = parse_generated_map(text, fixed_now()).unwrap();
        assert_eq!(map.nodes.len(), 5);
        assert_eq!(map.nodes[1].label, "");
        assert_eq!(map.nodes[3].id, "7");
        assert_eq!(map.nodes[4], FlatNode::default());

        let build = crate::hierarchy::build_hierarchy_with_report(&map.nodes);
        let root = build.root.unwrap();
        assert_eq!(root.node_count(), 3);
        assert!(root.find("7").is_some());
        assert_eq!(build.report.count(crate::hierarchy::IssueReason::MissingLabel), 1);
        assert_eq!(build.report.count(crate::hierarchy::IssueReason::MissingId), 1);
    }

    #[test]
    fn test_parse_generated_map_untitled() {
        let map = parse_generated_map(r#"{"nodes":[{"id":"x","label":"X","parentId":"gone"}]}"#, fixed_now()).unwrap();
        assert_eq!(map.title, UNTITLED_MAP);
        assert!(parse_generated_map(r#"{"title":"no nodes"}"#, fixed_now()).is_err());
    }

    #[test]
    fn test_parse_summary() {
        let s = parse_summary(
            r#"{"tl_dr":"Short.","detailed":"Long.","analogy":"Like a kitchen."}"#,
            "n1",
            None,
        )
        .unwrap();
        assert_eq!(s.node_id, "n1");
        assert_eq!(s.schema_version(), 1);
        assert_eq!(s.analogy, "Like a kitchen.");

        let grounded = parse_summary(r#"{"tl_dr":"Short."}"#, "n1", Some("  Source text  ")).unwrap();
        assert_eq!(grounded.schema_version(), 3);
        assert_eq!(grounded.context_excerpt(), Some("Source text"));
        assert_eq!(grounded.detailed, "");

        assert!(parse_summary(r#"{"detailed":"x"}"#, "n1", None).is_err());
    }

    #[test]
    fn test_parse_voice_command() {
        let c = parse_voice_command(r#"{"action":"explain"}"#).unwrap();
        assert_eq!(c, VoiceCommand { action: VoiceAction::Explain, target_node_id: None });
        let c = parse_voice_command("```\n{\"action\":\"Save\",\"targetNodeId\":\"XYZ\"}\n```").unwrap();
        assert_eq!(c.action, VoiceAction::Save);
        assert_eq!(c.target_node_id.as_deref(), Some("XYZ"));
        assert!(parse_voice_command(r#"{"action":"dance"}"#).is_err());
    }

    #[tokio::test]
    async fn test_generate_mind_map_flow() {
        let gen = ScriptedGenerator::new([r#"{"nodes":[{"id":"a","label":"Cells"}]}"#]);
        let request = GenerateRequest {
            input_type: InputType::Text,
            payload: "Cells are the unit of life.".into(),
            options: GenerateOptions::default(),
        };
        let map = generate_mind_map(&gen, &request).await.unwrap();
        assert_eq!(map.title, "Cells");
        assert_eq!(map.source_text.as_deref(), Some("Cells are the unit of life."));
        assert!(gen.last_prompt().contains("Cells are the unit of life."));
        assert!(gen.last_prompt().contains("pasted text"));
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_payload() {
        let gen = ScriptedGenerator::new(Vec::<String>::new());
        let request = GenerateRequest {
            input_type: InputType::Audio,
            payload: "   ".into(),
            options: GenerateOptions::default(),
        };
        assert!(generate_mind_map(&gen, &request).await.is_err());
        assert_eq!(gen.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_voice_command_empty_transcript() {
        let gen = ScriptedGenerator::new(Vec::<String>::new());
        assert!(interpret_voice_command(&gen, "").await.is_err());
        assert_eq!(gen.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_context_chat_passes_context() {
        let gen = ScriptedGenerator::new(["  Mitochondria.  "]);
        let answer = context_chat(&gen, "What makes ATP?", "Mitochondria make ATP.").await.unwrap();
        assert_eq!(answer, "Mitochondria.");
        let prompt = gen.last_prompt();
        assert!(prompt.contains("Mitochondria make ATP."));
        assert!(prompt.contains(NOT_IN_CONTEXT));
    }

    #[tokio::test]
    async fn test_generator_errors_propagate() {
        let gen = ScriptedGenerator::failing("API error 529: overloaded");
        let err = summarize_node(&gen, "n", "Label", DetailLevel::Simplest, None).await.unwrap_err();
        assert!(err.contains("529"));
    }

    #[test]
    fn test_generator_from_settings() {
        let mut settings = Settings::default();
        assert_eq!(generator_from_settings(&settings).name(), "anthropic");
        settings.llm_backend = LlmBackend::Ollama;
        assert_eq!(generator_from_settings(&settings).name(), "ollama");
    }

    #[tokio::test]
    async fn test_anthropic_without_key_fails_at_call_time() {
        let gen = AnthropicGenerator::new(None, "model".into());
        let err = gen.complete("hi", 10).await.unwrap_err();
        assert_eq!(err, "ANTHROPIC_API_KEY not set");
    }
}
