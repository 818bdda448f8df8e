//! Server configuration from environment variables.

/// Runtime configuration for the langforge server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// SQLite database file path.
    pub db_path: String,
    /// Listen port.
    pub port: u16,
    /// Base URL of the OpenAI-compatible model provider.
    pub model_url: String,
    /// Model identifier sent with each generation request.
    pub model: String,
    /// Bearer token for the model provider.
    pub api_key: String,
    /// Endpoint of the external compile service.
    pub builder_url: String,
}

impl ServerConfig {
    /// Reads configuration from the environment:
    /// - `LANGFORGE_DB_PATH` (default: "langforge.db")
    /// - `LANGFORGE_PORT` (default: "3000")
    /// - `LANGFORGE_MODEL_URL` (default: "https://openrouter.ai/api/v1")
    /// - `LANGFORGE_MODEL` (default: "meta-llama/llama-3.3-70b-instruct")
    /// - `LANGFORGE_API_KEY` (default: empty)
    /// - `LANGFORGE_BUILDER_URL` (default: "http://localhost:9657/compile")
    pub fn from_env() -> Self {
        let var = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };
        ServerConfig {
            db_path: var("LANGFORGE_DB_PATH", "langforge.db"),
            port: var("LANGFORGE_PORT", "3000").parse().unwrap_or(3000),
            model_url: var("LANGFORGE_MODEL_URL", "https://openrouter.ai/api/v1"),
            model: var("LANGFORGE_MODEL", "meta-llama/llama-3.3-70b-instruct"),
            api_key: var("LANGFORGE_API_KEY", ""),
            builder_url: var("LANGFORGE_BUILDER_URL", "http://localhost:9657/compile"),
        }
    }
}
