use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use tracing::{debug, info};

use crate::models::{fit_tier_for, AiAnalysis};

pub const DEFAULT_MODEL: &str = "claude-sonnet";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

// --- Provider trait ---

pub trait AIProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAI,
    ClaudeCli,
    Ollama,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
    pub short_name: String,
}

impl ModelSpec {
    fn new(provider: ProviderKind, model_id: &str, short_name: &str) -> Self {
        Self {
            provider,
            model_id: model_id.to_string(),
            short_name: short_name.to_string(),
        }
    }
}

const OLLAMA_MODELS: [&str; 8] = [
    "llama3.2", "llama3.1", "llama3", "mixtral", "mistral", "qwen2.5", "phi3", "codellama",
];

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    let name = name.trim();
    if let Some(model) = name.strip_prefix("ollama:") {
        if model.is_empty() {
            return Err(anyhow!("Missing model after 'ollama:'"));
        }
        return Ok(ModelSpec::new(ProviderKind::Ollama, model, name));
    }
    if OLLAMA_MODELS.contains(&name) {
        return Ok(ModelSpec::new(ProviderKind::Ollama, name, name));
    }
    match name {
        // Local `claude` CLI, no API key needed
        "claude-sonnet" | "sonnet" => Ok(ModelSpec::new(
            ProviderKind::ClaudeCli,
            "claude-sonnet-4-5-20250929",
            "claude-sonnet",
        )),
        "claude-haiku" | "haiku" => Ok(ModelSpec::new(
            ProviderKind::ClaudeCli,
            "claude-haiku-4-5-20251001",
            "claude-haiku",
        )),
        // Anthropic API (ANTHROPIC_API_KEY)
        "api-sonnet" => Ok(ModelSpec::new(
            ProviderKind::Anthropic,
            "claude-sonnet-4-5-20250929",
            "api-sonnet",
        )),
        "api-haiku" => Ok(ModelSpec::new(
            ProviderKind::Anthropic,
            "claude-haiku-4-5-20251001",
            "api-haiku",
        )),
        // OpenAI (OPENAI_API_KEY)
        "gpt-4o" => Ok(ModelSpec::new(ProviderKind::OpenAI, "gpt-4o", "gpt-4o")),
        "gpt-4o-mini" => Ok(ModelSpec::new(ProviderKind::OpenAI, "gpt-4o-mini", "gpt-4o-mini")),
        "o3" => Ok(ModelSpec::new(ProviderKind::OpenAI, "o3", "o3")),
        _ => Err(anyhow!(
            "Unknown model '{}'. Available: claude-sonnet (default), claude-haiku, api-sonnet, \
             api-haiku, gpt-4o, gpt-4o-mini, o3, {} or ollama:<model>",
            name,
            OLLAMA_MODELS.join(", ")
        )),
    }
}

pub fn create_provider(spec: &ModelSpec) -> Result<Box<dyn AIProvider>> {
    debug!(model = %spec.model_id, provider = ?spec.provider, "creating provider");
    match spec.provider {
        ProviderKind::ClaudeCli => Ok(Box::new(ClaudeCliProvider::new(spec.model_id.clone())?)),
        ProviderKind::Anthropic => Ok(Box::new(AnthropicProvider::new(spec.model_id.clone())?)),
        ProviderKind::OpenAI => Ok(Box::new(OpenAIProvider::new(spec.model_id.clone())?)),
        ProviderKind::Ollama => Ok(Box::new(OllamaProvider::new(
            spec.model_id.clone(),
            ollama_host(env::var("OLLAMA_HOST").ok()),
        ))),
    }
}

fn require_key(var: &str) -> Result<String> {
    env::var(var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            anyhow!(
                "{} environment variable not set. Set it with: export {}=your-key-here",
                var,
                var
            )
        })
}

fn check_response(response: reqwest::blocking::Response, service: &str) -> Result<reqwest::blocking::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().unwrap_or_default();
    Err(anyhow!("{} request failed with status {}: {}", service, status, body))
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

fn user_message(prompt: &str) -> Vec<ChatMessage> {
    vec![ChatMessage {
        role: "user".to_string(),
        content: prompt.to_string(),
    }]
}

// --- Anthropic ---

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug)]
pub struct AnthropicProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl AnthropicProvider {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = require_key("ANTHROPIC_API_KEY")?;
        Ok(Self {
            api_key,
            model_id,
            client: reqwest::blocking::Client::new(),
        })
    }
}

impl AIProvider for AnthropicProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model_id.clone(),
            max_tokens,
            messages: user_message(prompt),
        };
        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .context("Failed to send request to Anthropic API")?;
        let parsed: AnthropicResponse = check_response(response, "Anthropic API")?
            .json()
            .context("Failed to parse Anthropic API response")?;
        parsed
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| anyhow!("No content in Anthropic API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- OpenAI ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    max_completion_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug)]
pub struct OpenAIProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl OpenAIProvider {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = require_key("OPENAI_API_KEY")?;
        Ok(Self {
            api_key,
            model_id,
            client: reqwest::blocking::Client::new(),
        })
    }
}

impl AIProvider for OpenAIProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = OpenAIRequest {
            model: self.model_id.clone(),
            max_completion_tokens: max_tokens,
            messages: user_message(prompt),
        };
        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .context("Failed to send request to OpenAI API")?;
        let parsed: OpenAIResponse = check_response(response, "OpenAI API")?
            .json()
            .context("Failed to parse OpenAI API response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("No choices in OpenAI API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Ollama (local server) ---

pub fn ollama_host(configured: Option<String>) -> String {
    configured
        .map(|h| h.trim().trim_end_matches('/').to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string())
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: ReplyMessage,
}

#[derive(Debug)]
pub struct OllamaProvider {
    base_url: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl OllamaProvider {
    pub fn new(model_id: String, base_url: String) -> Self {
        Self {
            base_url,
            model_id,
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl AIProvider for OllamaProvider {
    fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        let request = OllamaRequest {
            model: self.model_id.clone(),
            messages: user_message(prompt),
            stream: false,
        };
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .with_context(|| format!("Failed to reach Ollama at {}. Is `ollama serve` running?", self.base_url))?;
        let parsed: OllamaResponse = check_response(response, "Ollama")?
            .json()
            .context("Failed to parse Ollama response")?;
        Ok(parsed.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Claude CLI (shells out to `claude`) ---

#[derive(Debug)]
pub struct ClaudeCliProvider {
    model_id: String,
}

impl ClaudeCliProvider {
    pub fn new(model_id: String) -> Result<Self> {
        std::process::Command::new("claude")
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .context("'claude' CLI not found. Install it or pick an api-*, gpt-* or ollama model.")?;
        Ok(Self { model_id })
    }
}

impl AIProvider for ClaudeCliProvider {
    fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        let output = std::process::Command::new("claude")
            .arg("-p")
            .arg(prompt)
            .arg("--model")
            .arg(&self.model_id)
            .output()
            .context("Failed to run 'claude' CLI")?;
        if !output.status.success() {
            return Err(anyhow!(
                "claude CLI failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }
        let response = String::from_utf8(output.stdout).context("Invalid UTF-8 in claude CLI output")?;
        if response.trim().is_empty() {
            return Err(anyhow!("Empty response from claude CLI"));
        }
        Ok(response)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Qualification analysis ---

fn qualification_prompt(resume: &str, job_description: &str) -> String {
    format!(
        "You are an expert career advisor. Analyze the candidate's resume against the job posting \
        and give an honest, objective qualification assessment. Focus on concrete requirements from \
        the posting and specific evidence from the resume.\n\n\
        Return ONLY a JSON object with this exact structure:\n\
        {{\n\
          \"fitScore\": <number 0-100>,\n\
          \"fitTier\": \"<Strong Fit|Good Fit|Stretch|Long Shot>\",\n\
          \"levelFit\": \"<Under-qualified|Right Level|Over-qualified>\",\n\
          \"laneFit\": \"<In Lane|Adjacent|Out of Lane>\",\n\
          \"requirementsMet\": <number>,\n\
          \"requirementsTotal\": <number>,\n\
          \"qualifications\": [{{\"requirement\": \"..\", \"status\": \"<Met|Partial|Gap>\", \
        \"evidence\": \"..\", \"suggestion\": \"..\"}}],\n\
          \"strengths\": [\"..\"],\n\
          \"gaps\": [\"..\"],\n\
          \"recommendations\": [\"..\"],\n\
          \"summary\": \"<2-3 sentence assessment>\"\n\
        }}\n\n\
        Scoring: 80-100 Strong Fit, 60-79 Good Fit, 40-59 Stretch, 0-39 Long Shot.\n\n\
        ## RESUME:\n{}\n\n## JOB POSTING:\n{}",
        resume, job_description
    )
}

/// Pulls the outermost JSON object out of a model reply, ignoring code fences
/// and any prose around it.
pub fn extract_json_object(reply: &str) -> Option<&str> {
    let fenced = Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").ok()?;
    if let Some(inner) = fenced.captures(reply).and_then(|c| c.get(1)) {
        return Some(inner.as_str());
    }
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

fn number_field(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

/// Parses a qualification reply into an analysis stamped with `now`.
pub fn parse_analysis(reply: &str, now: DateTime<Utc>) -> Result<AiAnalysis> {
    let json = extract_json_object(reply)
        .ok_or_else(|| anyhow!("Model reply did not contain a JSON object"))?;
    let mut value: Value = serde_json::from_str(json).context("Model reply was not valid JSON")?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| anyhow!("Model reply was not a JSON object"))?;

    let score = obj
        .get("fitScore")
        .and_then(number_field)
        .unwrap_or(0.0)
        .clamp(0.0, 100.0);
    obj.insert("fitScore".into(), Value::from(score));
    for key in ["requirementsMet", "requirementsTotal"] {
        let count = obj
            .get(key)
            .and_then(number_field)
            .filter(|n| *n >= 0.0)
            .map(|n| Value::from(n.round() as u32))
            .unwrap_or(Value::Null);
        obj.insert(key.into(), count);
    }
    obj.remove("analyzedAt");

    let mut analysis: AiAnalysis =
        serde_json::from_value(value).context("Model reply did not match the analysis shape")?;
    if analysis.fit_tier.trim().is_empty() {
        analysis.fit_tier = fit_tier_for(score).to_string();
    }
    analysis.analyzed_at = Some(now);
    Ok(analysis)
}

pub fn analyze_qualifications(
    provider: &dyn AIProvider,
    resume: &str,
    job_description: &str,
    now: DateTime<Utc>,
) -> Result<AiAnalysis> {
    info!(model = provider.model_name(), "requesting qualification analysis");
    let reply = provider.complete(&qualification_prompt(resume, job_description), 4096)?;
    parse_analysis(&reply, now)
}

// --- Coaching ---

fn coaching_prompt(dashboard_json: &str, question: Option<&str>) -> String {
    let ask = match question {
        Some(q) if !q.trim().is_empty() => format!("My question: {}", q.trim()),
        _ => "Provide:\n\
              1. Overall assessment of my job search\n\
              2. What's working and what isn't\n\
              3. Top 3 actionable recommendations for next week\n\
              4. Any patterns or red flags you notice"
            .to_string(),
    };
    format!(
        "You are an expert job search coach. Be direct and honest, back observations with the \
        data, and focus on high-impact, specific recommendations. Look at response rates across \
        factors, what is working versus not, and any concerning patterns.\n\n\
        Here is my job search data:\n\n{}\n\n{}",
        dashboard_json, ask
    )
}

pub fn coach(provider: &dyn AIProvider, dashboard_json: &str, question: Option<&str>) -> Result<String> {
    info!(model = provider.model_name(), "requesting coaching");
    provider.complete(&coaching_prompt(dashboard_json, question), 4096)
}
