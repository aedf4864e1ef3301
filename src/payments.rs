use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::error::AppError;

/// Metadata tag every intent created by this platform carries. Intents
/// without it are treated as foreign and never accepted.
pub const PLATFORM_TAG: &str = "yuancity";

/// Thin client for the card processor's payment-intent API. When base URL or
/// secret are missing the client is disabled: card checkouts are rejected
/// while cash checkouts keep working.
#[derive(Clone)]
pub struct CardProcessor {
    base_url: Option<String>,
    secret: Option<String>,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    status: String,
    #[serde(default)]
    metadata: IntentMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct IntentMetadata {
    #[serde(default)]
    platform: String,
}

impl CardProcessor {
    pub fn new(base_url: Option<String>, secret: Option<String>) -> Self {
        Self {
            base_url,
            secret,
            http: Client::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some() && self.secret.is_some()
    }

    /// Look up a payment intent and report whether it settled for this
    /// platform. An unknown intent id is `Ok(false)`; transport problems and
    /// unexpected upstream statuses surface as gateway errors.
    pub async fn verify_intent(&self, intent_id: &str) -> Result<bool, AppError> {
        let (Some(base_url), Some(secret)) = (self.base_url.as_deref(), self.secret.as_deref())
        else {
            return Err(AppError::Internal(anyhow::anyhow!(
                "card processor is not configured"
            )));
        };

        let url = format!(
            "{}/v1/payment_intents/{}",
            base_url.trim_end_matches('/'),
            intent_id
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(secret)
            .send()
            .await
            .map_err(|err| AppError::Gateway(err.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "intent lookup returned {}",
                response.status()
            )));
        }

        let intent: PaymentIntent = response
            .json()
            .await
            .map_err(|err| AppError::Gateway(err.to_string()))?;

        Ok(intent.status == "succeeded" && intent.metadata.platform == PLATFORM_TAG)
    }
}
