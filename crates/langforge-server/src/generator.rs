//! Generation capability: the OpenAI-compatible chat client and the
//! prompts that ask it for a language toolchain.
//!
//! The provider is opaque to the pipeline; anything implementing
//! [`Generator`] can stand in for it (tests use canned responders).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use langforge_core::bundle::ArtifactBundle;

use crate::pipeline::PipelineError;

/// Invokes the generative model with a fully rendered prompt and returns
/// the raw response text.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError>;
}

/// Renders the initial generation prompt for a language description.
///
/// The model is instructed to answer with exactly the five sentinel-
/// delimited artifacts the bundle parser expects.
pub fn initial_prompt(description: &str) -> String {
    format!(
        "Generate Bison and Flex sources plus a C interpreter that uses the \
         generated parser, for a language defined as: {description}\n\
         Output files ONLY in the following format (no extra text whatsoever):\n\
         ===FILE parser.y===\n<content>\n===END===\n\
         ===FILE flex.l===\n<content>\n===END===\n\
         ===FILE interpreter.c===\n<content>\n===END===\n\
         ===FILE README.md===\n<documentation>\n===END===\n\
         ===FILE example.txt===\n<example_code>\n===END===\n"
    )
}

/// Renders the self-repair prompt: the original description, the previous
/// artifacts, and the build diagnostic to fix.
pub fn repair_prompt(description: &str, bundle: &ArtifactBundle, diagnostic: &str) -> String {
    let mut prompt = format!(
        "The toolchain you generated for this language failed to compile.\n\
         Language description: {description}\n\nPrevious files:\n"
    );
    for (name, content) in bundle.iter() {
        prompt.push_str(&format!("===FILE {name}===\n{content}\n===END===\n"));
    }
    prompt.push_str(&format!(
        "\nCompiler diagnostic:\n{diagnostic}\n\n\
         Fix the problem and output the complete corrected files in the same \
         ===FILE ...=== / ===END=== format, nothing else.\n"
    ));
    prompt
}

/// HTTP client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatGenerator {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        ChatGenerator {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        let endpoint = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }]
        });

        let response = self
            .client
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|err| PipelineError::Transient(format!("model request failed: {err}")))?;

        let status = response.status();
        let text = response.text().await.map_err(|err| {
            PipelineError::Transient(format!("model response read failed: {err}"))
        })?;
        if !status.is_success() {
            return Err(PipelineError::Transient(format!(
                "model request failed ({status}): {text}"
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|err| {
            PipelineError::Transient(format!("model response parse failed: {err}"))
        })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                PipelineError::Transient("model response missing assistant content".to_string())
            })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}
