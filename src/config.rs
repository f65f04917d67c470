use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ApiError;

/// Filesystem layout for the knowledge base. Directories are created
/// eagerly so later failures are about data, not missing paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub db_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let data_dir = discover_data_dir();
        let log_dir = data_dir.join("logs");
        let db_path = data_dir.join("kbase.db");

        for dir in [&data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            log_dir,
            db_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_data_dir() -> PathBuf {
    if let Ok(dir) = env::var("KBASE_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(target_os = "windows") {
        let base = env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string()));
        return PathBuf::from(base).join("kbase");
    }

    if cfg!(target_os = "macos") {
        return home_dir()
            .join("Library")
            .join("Application Support")
            .join("kbase");
    }

    let xdg = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        home_dir()
            .join(".local/share")
            .to_string_lossy()
            .to_string()
    });
    PathBuf::from(xdg).join("kbase")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the OpenAI-compatible provider.
    pub llm_base_url: String,
    /// API key for the chat/embedding provider.
    pub api_key: String,
    pub chat_model: String,
    pub embed_model: String,
    /// Source documents directory for topic ingestion (optional; the
    /// ingesting binary requires it).
    pub docs_dir: Option<PathBuf>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Minimum relevance score for the shared-collection search.
    pub min_score: f32,
    pub request_timeout: Duration,
    pub max_agent_steps: usize,
}

impl AppConfig {
    /// Loads and validates configuration. Fails before any network or
    /// storage call is attempted.
    pub fn from_env() -> Result<Self, ApiError> {
        let api_key = env::var("KBASE_API_KEY")
            .map_err(|_| ApiError::BadRequest("KBASE_API_KEY is not set".to_string()))?;
        if api_key.trim().is_empty() {
            return Err(ApiError::BadRequest("KBASE_API_KEY is empty".to_string()));
        }

        let llm_base_url = env::var("KBASE_LLM_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let chat_model =
            env::var("KBASE_CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let embed_model = env::var("KBASE_EMBED_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());

        let docs_dir = env::var("KBASE_DOCS_DIR").ok().map(PathBuf::from);
        if let Some(dir) = &docs_dir {
            if !dir.is_dir() {
                return Err(ApiError::BadRequest(format!(
                    "KBASE_DOCS_DIR is not a directory: {}",
                    dir.display()
                )));
            }
        }

        let chunk_size = env_usize("KBASE_CHUNK_SIZE", 800)?;
        let chunk_overlap = env_usize("KBASE_CHUNK_OVERLAP", 100)?;
        if chunk_overlap >= chunk_size {
            return Err(ApiError::BadRequest(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }

        let min_score = match env::var("KBASE_MIN_SCORE") {
            Ok(raw) => raw.parse::<f32>().map_err(|_| {
                ApiError::BadRequest(format!("KBASE_MIN_SCORE is not a number: {}", raw))
            })?,
            Err(_) => 0.0,
        };

        let timeout_secs = env_usize("KBASE_REQUEST_TIMEOUT_SECS", 30)? as u64;
        let max_agent_steps = env_usize("KBASE_MAX_AGENT_STEPS", 10)?;

        Ok(AppConfig {
            llm_base_url,
            api_key,
            chat_model,
            embed_model,
            docs_dir,
            chunk_size,
            chunk_overlap,
            min_score,
            request_timeout: Duration::from_secs(timeout_secs),
            max_agent_steps,
        })
    }

    /// The ingesting binary cannot run without a source directory.
    pub fn require_docs_dir(&self) -> Result<&PathBuf, ApiError> {
        self.docs_dir
            .as_ref()
            .ok_or_else(|| ApiError::BadRequest("KBASE_DOCS_DIR is not set".to_string()))
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize, ApiError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<usize>()
            .map_err(|_| ApiError::BadRequest(format!("{} is not a number: {}", key, raw))),
        Err(_) => Ok(default),
    }
}
