use crate::core::RateSource;
use crate::core::config::SourceConfig;
use crate::providers::extract::{RateExtractor, UsdTextExtractor};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

/// Scrapes the official USD rate from the BCV home page (or any page the
/// configured extractor understands).
pub struct BcvProvider {
    url: String,
    client: reqwest::Client,
    extractor: Box<dyn RateExtractor>,
}

impl BcvProvider {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Self::with_extractor(config, Box::new(UsdTextExtractor))
    }

    pub fn with_extractor(
        config: &SourceConfig,
        extractor: Box<dyn RateExtractor>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(BcvProvider {
            url: config.url.clone(),
            client,
            extractor,
        })
    }

    async fn fetch_page(&self) -> Result<String> {
        debug!("Requesting rate page from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", self.url))?
            .error_for_status()
            .with_context(|| format!("Rate source {} returned an error status", self.url))?;

        response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", self.url))
    }

    async fn try_fetch_rate(&self) -> Result<Decimal> {
        let body = self.fetch_page().await?;
        self.extractor
            .extract(&body)
            .ok_or_else(|| anyhow!("No USD rate found in page from {}", self.url))
    }
}

#[async_trait]
impl RateSource for BcvProvider {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_rate(&self) -> Option<Decimal> {
        match self.try_fetch_rate().await {
            Ok(rate) => {
                info!(%rate, "Fetched rate");
                Some(rate)
            }
            Err(e) => {
                warn!("Could not obtain rate: {e:#}");
                None
            }
        }
    }
}
