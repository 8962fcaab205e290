use anyhow::{Context, Result};
use dotenvy::dotenv;

fn default_max_upload_bytes() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_path: String,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "data/analytics.db".to_string());
        let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());

        let max_upload_bytes = match std::env::var("MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("invalid MAX_UPLOAD_BYTES: {raw}"))?,
            Err(_) => default_max_upload_bytes(),
        };

        Ok(Config {
            bind_addr,
            database_path,
            upload_dir,
            max_upload_bytes,
        })
    }
}
