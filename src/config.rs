use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub card_processor_url: Option<String>,
    pub card_processor_secret: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let card_processor_url = env::var("CARD_PROCESSOR_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let card_processor_secret = env::var("CARD_PROCESSOR_SECRET")
            .ok()
            .filter(|v| !v.trim().is_empty());
        Ok(Self {
            port,
            database_url,
            host,
            card_processor_url,
            card_processor_secret,
        })
    }
}
