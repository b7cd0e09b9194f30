//! Configuration

use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub web_host: String,
    pub port: u16,
    pub cors: String,
    pub stats_file: PathBuf,
    pub bot_token: Option<String>,
    pub admin_id: Option<String>,
    pub telegram_api_url: String,
    pub poll_timeout: u64, // seconds
    pub poll_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Config {
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            cors: env::var("WEB_CORS").unwrap_or_else(|_| "*".to_string()),
            stats_file: env::var("STATS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("stats.json")),
            bot_token: non_empty_var("TELEGRAM_BOT_TOKEN"),
            admin_id: non_empty_var("ADMIN_ID"),
            telegram_api_url: env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            poll_timeout: env::var("BOT_POLL_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            poll_delay_ms: env::var("BOT_POLL_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1500),
        }
    }

    pub fn web_addr(&self) -> String {
        format!("{}:{}", self.web_host, self.port)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);
