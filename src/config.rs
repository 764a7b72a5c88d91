// Application settings, loaded with the 'config' crate after '.env'

use anyhow::Result;
use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

// The backend rejects page sizes above this
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_address: String,
    // Root of the REST API, e.g. http://localhost:8000/api
    pub api_base_url: String,
    pub page_size: u32,
    pub request_timeout_secs: u64,
    pub token_store_path: String,
    pub static_dir: String,
}

pub fn clamp_page_size(page_size: u32) -> u32 {
    page_size.clamp(1, MAX_PAGE_SIZE)
}

fn with_defaults() -> Result<ConfigBuilder<DefaultState>> {
    Ok(Config::builder()
        .set_default("server_address", "127.0.0.1:3000")?
        .set_default("api_base_url", "http://localhost:8000/api")?
        .set_default("page_size", 20)?
        .set_default("request_timeout_secs", 30)?
        .set_default("token_store_path", "session.json")?
        .set_default("static_dir", "static")?)
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = with_defaults()?
            // Optional config.toml next to the binary
            .add_source(File::with_name("config").required(false))
            // VELOCE_API_BASE_URL, VELOCE_PAGE_SIZE, ...
            .add_source(Environment::with_prefix("VELOCE").prefix_separator("_").try_parsing(true));

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.page_size = clamp_page_size(settings.page_size);
        Ok(settings)
    }
}
