use anyhow::Result;
use chrono_tz::Tz;
use std::env;
use crate::constants::{DEFAULT_DISPLAY_TZ, DEFAULT_PROFILE_IMAGE_BUCKET};

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the platform's HTTP API (auth and storage)
    pub api_url: String,
    pub api_key: String,
    pub profile_image_bucket: String,
    pub display_tz: Tz,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            api_url: var("SUPABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("SUPABASE_URL must be set"))?,
            api_key: var("SUPABASE_ANON_KEY")
                .ok_or_else(|| anyhow::anyhow!("SUPABASE_ANON_KEY must be set"))?,
            profile_image_bucket: var("PROFILE_IMAGE_BUCKET")
                .unwrap_or_else(|| DEFAULT_PROFILE_IMAGE_BUCKET.to_string()),
            display_tz: parse_tz(
                &var("DISPLAY_TZ").unwrap_or_else(|| DEFAULT_DISPLAY_TZ.to_string()),
            )?,
        })
    }
}

fn parse_tz(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| anyhow::anyhow!("DISPLAY_TZ '{}' is not a known time zone", name))
}
