use std::path::PathBuf;
use std::time::Duration;

/// Credentials for the external conversion API.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub public_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: String,
    pub external_api: Option<ApiCredentials>,
    pub external_api_base: String,
    pub enable_fallback: bool,
    pub temp_dir: PathBuf,
    pub cleanup_interval: Duration,
    pub temp_retention: Duration,
    pub max_file_size_mb: usize,
    pub browser_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let external_api = match (
            std::env::var("CONVERT_API_PUBLIC_KEY"),
            std::env::var("CONVERT_API_SECRET_KEY"),
        ) {
            (Ok(public_key), Ok(secret_key)) => Some(ApiCredentials {
                public_key,
                secret_key,
            }),
            _ => None,
        };

        Self {
            addr: std::env::var("PDFPRESS_ADDR").unwrap_or_else(|_| "0.0.0.0:3004".to_string()),
            external_api,
            external_api_base: std::env::var("CONVERT_API_BASE")
                .unwrap_or_else(|_| "https://api.ilovepdf.com".to_string()),
            enable_fallback: std::env::var("ENABLE_FALLBACK").as_deref() != Ok("false"),
            temp_dir: std::env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("pdfpress")),
            cleanup_interval: Duration::from_millis(env_u64("CLEANUP_INTERVAL_MS", 300_000)),
            temp_retention: Duration::from_millis(env_u64("TEMP_RETENTION_MS", 300_000)),
            max_file_size_mb: env_u64("MAX_FILE_SIZE_MB", 10) as usize,
            browser_path: std::env::var("CHROME_PATH").ok(),
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
