//! Build client: ships validated artifacts to the external compile
//! service and interprets its response.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use langforge_core::bundle::{
    ArtifactBundle, EXAMPLE, GRAMMAR_SOURCE, INTERPRETER_SOURCE, LEXER_SOURCE, README,
};

use crate::pipeline::PipelineError;

/// Result of one compile call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// 2xx: the response body is the built package.
    Package(Vec<u8>),
    /// Non-2xx: the response body is a diagnostic for self-repair.
    Rejected { diagnostic: String },
}

/// Submits an artifact bundle for compilation.
///
/// Transport-level failures (connect errors, timeouts) surface as
/// [`PipelineError::Transient`]; a reachable service that rejects the
/// artifacts yields [`BuildOutcome::Rejected`] instead of an error.
#[async_trait]
pub trait BuildService: Send + Sync {
    async fn build(&self, bundle: &ArtifactBundle) -> Result<BuildOutcome, PipelineError>;
}

/// Multipart field names the compile service expects, paired with the
/// bundle artifact each one carries.
const FIELDS: [(&str, &str); 5] = [
    ("parser", GRAMMAR_SOURCE),
    ("lexer", LEXER_SOURCE),
    ("interpreter", INTERPRETER_SOURCE),
    ("README", README),
    ("example", EXAMPLE),
];

/// HTTP implementation of [`BuildService`].
pub struct HttpBuilder {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBuilder {
    pub fn new(endpoint: &str) -> Self {
        HttpBuilder {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl BuildService for HttpBuilder {
    async fn build(&self, bundle: &ArtifactBundle) -> Result<BuildOutcome, PipelineError> {
        let mut form = Form::new();
        for (field, artifact) in FIELDS {
            let content = bundle.get(artifact).unwrap_or_default().to_string();
            form = form.part(field, Part::text(content).file_name(artifact));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|err| PipelineError::Transient(format!("compile request failed: {err}")))?;

        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await.map_err(|err| {
                PipelineError::Transient(format!("compile response read failed: {err}"))
            })?;
            Ok(BuildOutcome::Package(bytes.to_vec()))
        } else {
            let diagnostic = response.text().await.unwrap_or_else(|_| status.to_string());
            Ok(BuildOutcome::Rejected { diagnostic })
        }
    }
}
