use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- History Store Args ---
    /// History chat store type (file, redis)
    #[arg(long, env = "HISTORY_TYPE", default_value = "file")]
    pub history_type: String,

    /// Directory holding one JSON record per session when HISTORY_TYPE=file.
    #[arg(long, env = "HISTORY_DIR", default_value = "chat_history")]
    pub history_dir: String,

    /// Redis endpoint used when HISTORY_TYPE=redis (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "HISTORY_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub history_redis_url: String,

    /// Prefix for Redis history keys.
    #[arg(long, env = "HISTORY_REDIS_PREFIX", default_value = "history:")]
    pub history_redis_prefix: String,

    /// Batch size for Redis SCAN command when listing history.
    #[arg(long, env = "HISTORY_REDIS_SCAN_COUNT", default_value = "100")]
    pub history_redis_scan_count: usize,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (gemini, openai, groq, deepseek, xai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "gemini")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434/v1 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gemini-2.0-flash, gpt-4o-mini, llama3)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Per-request timeout for LLM calls, in seconds.
    #[arg(long, env = "LLM_TIMEOUT_SECS", default_value = "60")]
    pub llm_timeout_secs: u64,

    /// Attempts per LLM call before giving up on rate limits and outages.
    #[arg(long, env = "LLM_MAX_ATTEMPTS", default_value = "3")]
    pub llm_max_attempts: u32,

    // --- Data Source Args ---
    /// Directory containing classifier.txt, learning.txt, tracking.txt and recommendation.txt.
    #[arg(long, env = "PROMPTS_DIR", default_value = "prompts")]
    pub prompts_dir: String,

    /// Path to the courses catalog file.
    #[arg(long, env = "COURSES_PATH", default_value = "data/courses.json")]
    pub courses_path: String,

    /// Path to the learning paths catalog file.
    #[arg(long, env = "LEARNING_PATHS_PATH", default_value = "data/learning_paths.json")]
    pub learning_paths_path: String,

    /// Path to the course levels catalog file.
    #[arg(long, env = "COURSE_LEVELS_PATH", default_value = "data/course_levels.json")]
    pub course_levels_path: String,

    /// URL returning user progress ({"users": [...]}). Tracking questions fail without it.
    #[arg(long, env = "USER_API_URL")]
    pub progress_api_url: Option<String>,

    /// Timeout for progress API requests, in seconds.
    #[arg(long, env = "USER_API_TIMEOUT_SECS", default_value = "10")]
    pub progress_timeout_secs: u64,

    /// User whose progress is used when a request does not name one.
    #[arg(long, env = "USER_ID")]
    pub default_user_id: Option<String>,

    // --- Server Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
