use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

const ENV_PREFIX: &str = "PRICE_WATCH";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: String,
    pub seed_url: String,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub interval_secs: u64,
    pub request_timeout_secs: u64,
    pub concurrency: usize,
    pub menu_selector: String,
    pub pagination_selector: String,
    pub tile_selector: String,
    pub name_selector: String,
    pub price_selector: String,
    pub link_selector: String,
}

/// Bot credential plus the chat the report goes to.
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub token: String,
    pub chat_id: String,
}

impl Settings {
    /// Defaults overlaid with `PRICE_WATCH_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_builder(Config::builder().add_source(Environment::with_prefix(ENV_PREFIX)))
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let settings: Settings = builder
            .set_default("db_path", "data/prices.sqlite")?
            .set_default("seed_url", "https://www.suplementoscolombia.co/")?
            .set_default("interval_secs", 30)?
            .set_default("request_timeout_secs", 20)?
            .set_default("concurrency", 8)?
            .set_default("menu_selector", ".submenu li a")?
            .set_default("pagination_selector", ".page-link")?
            .set_default("tile_selector", ".grid_item")?
            .set_default("name_selector", "h3")?
            .set_default("price_selector", "span.new_price")?
            .set_default("link_selector", "a")?
            .build()?
            .try_deserialize()
            .context("Invalid PRICE_WATCH_* configuration")?;

        if settings.concurrency == 0 {
            bail!("PRICE_WATCH_CONCURRENCY must be at least 1");
        }
        settings.telegram()?;
        Ok(settings)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `None` when no bot is configured. Half a configuration is an error.
    pub fn telegram(&self) -> Result<Option<TelegramSettings>> {
        match (&self.telegram_token, &self.telegram_chat_id) {
            (Some(token), Some(chat_id)) => Ok(Some(TelegramSettings {
                token: token.clone(),
                chat_id: chat_id.clone(),
            })),
            (None, None) => Ok(None),
            (Some(_), None) => bail!("PRICE_WATCH_TELEGRAM_TOKEN is set but PRICE_WATCH_TELEGRAM_CHAT_ID is not"),
            (None, Some(_)) => bail!("PRICE_WATCH_TELEGRAM_CHAT_ID is set but PRICE_WATCH_TELEGRAM_TOKEN is not"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> config::ConfigBuilder<config::builder::DefaultState> {
        Config::builder()
    }

    #[test]
    fn defaults_match_the_target_site() {
        let s = Settings::from_builder(builder()).unwrap();
        assert_eq!(s.seed_url, "https://www.suplementoscolombia.co/");
        assert_eq!(s.interval(), Duration::from_secs(30));
        assert_eq!(s.tile_selector, ".grid_item");
        assert!(s.telegram().unwrap().is_none());
    }

    #[test]
    fn overrides_win_over_defaults() {
        let b = builder()
            .set_override("interval_secs", 5)
            .unwrap()
            .set_override("telegram_token", "123:abc")
            .unwrap()
            .set_override("telegram_chat_id", "-100")
            .unwrap();
        let s = Settings::from_builder(b).unwrap();
        assert_eq!(s.interval_secs, 5);
        let tg = s.telegram().unwrap().unwrap();
        assert_eq!(tg.chat_id, "-100");
    }

    #[test]
    fn token_without_chat_is_rejected() {
        let b = builder().set_override("telegram_token", "123:abc").unwrap();
        assert!(Settings::from_builder(b).is_err());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let b = builder().set_override("concurrency", 0).unwrap();
        assert!(Settings::from_builder(b).is_err());
    }
}
