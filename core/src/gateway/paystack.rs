//! Paystack gateway adapter.
//!
//! Talks to the Paystack transaction API. Amounts cross this boundary in
//! minor units already (the `Money` representation), matching Paystack's
//! kobo-denominated wire format. The secret key is held here and never
//! surfaces in errors or logs.

use super::{GatewayStatus, InitializedPayment, PaymentGateway, VerifiedPayment};
use crate::error::{MarketError, Result};
use crate::types::Money;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;

const DEFAULT_API_URL: &str = "https://api.paystack.co";

/// Paystack payment gateway client.
#[derive(Clone)]
pub struct PaystackGateway {
    client: Client,
    secret_key: String,
    api_url: String,
}

impl PaystackGateway {
    /// Create a new client with an explicit secret key.
    #[must_use]
    pub fn new(secret_key: String) -> Self {
        Self {
            client: Client::new(),
            secret_key,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// Create a new client with the secret key from `PAYSTACK_SECRET_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Unconfigured`] if the variable is not set.
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("PAYSTACK_SECRET_KEY")
            .map_err(|_| MarketError::Unconfigured {
                what: "PAYSTACK_SECRET_KEY",
            })?;
        Ok(Self::new(secret_key))
    }

    /// Override the API base URL (used by tests against a local stub).
    #[must_use]
    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    async fn do_initialize(
        client: Client,
        api_url: String,
        secret_key: String,
        email: String,
        amount: Money,
        reference: String,
        metadata: serde_json::Value,
    ) -> Result<InitializedPayment> {
        let body = serde_json::json!({
            "email": email,
            "amount": amount.minor(),
            "reference": reference,
            "metadata": metadata,
        });

        let response = client
            .post(format!("{api_url}/transaction/initialize"))
            .bearer_auth(&secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MarketError::external(format!("gateway request failed: {e}")))?;

        match response.status() {
            StatusCode::OK => {
                let parsed: PaystackEnvelope<InitializeData> = response
                    .json()
                    .await
                    .map_err(|e| MarketError::external(format!("gateway response parse: {e}")))?;
                let data = parsed.data.ok_or_else(|| {
                    MarketError::external("gateway returned no transaction data")
                })?;
                Ok(InitializedPayment {
                    authorization_url: data.authorization_url,
                    access_code: data.access_code,
                    reference: data.reference,
                })
            }
            status => {
                // Body is discarded: gateway error pages can echo request
                // details we do not want in caller-visible messages.
                Err(MarketError::external(format!(
                    "gateway initialize returned {status}"
                )))
            }
        }
    }

    async fn do_verify(
        client: Client,
        api_url: String,
        secret_key: String,
        reference: String,
    ) -> Result<VerifiedPayment> {
        let response = client
            .get(format!("{api_url}/transaction/verify/{reference}"))
            .bearer_auth(&secret_key)
            .send()
            .await
            .map_err(|e| MarketError::external(format!("gateway request failed: {e}")))?;

        match response.status() {
            StatusCode::OK => {
                let parsed: PaystackEnvelope<VerifyData> = response
                    .json()
                    .await
                    .map_err(|e| MarketError::external(format!("gateway response parse: {e}")))?;
                let data = parsed.data.ok_or_else(|| {
                    MarketError::external("gateway returned no transaction data")
                })?;

                let status = match data.status.as_str() {
                    "success" => GatewayStatus::Success,
                    "abandoned" => GatewayStatus::Abandoned,
                    _ => GatewayStatus::Failed,
                };

                Ok(VerifiedPayment {
                    status,
                    amount: Money::from_minor(data.amount),
                    paid_at: data.paid_at,
                    metadata: data.metadata.unwrap_or(serde_json::Value::Null),
                })
            }
            StatusCode::NOT_FOUND => {
                // Deliberately generic: do not reveal which references exist.
                Err(MarketError::external("transaction could not be verified"))
            }
            status => Err(MarketError::external(format!(
                "gateway verify returned {status}"
            ))),
        }
    }
}

impl PaymentGateway for PaystackGateway {
    fn initialize(
        &self,
        email: &str,
        amount: Money,
        reference: &str,
        metadata: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<InitializedPayment>> + Send>> {
        Box::pin(Self::do_initialize(
            self.client.clone(),
            self.api_url.clone(),
            self.secret_key.clone(),
            email.to_string(),
            amount,
            reference.to_string(),
            metadata,
        ))
    }

    fn verify(
        &self,
        reference: &str,
    ) -> Pin<Box<dyn Future<Output = Result<VerifiedPayment>> + Send>> {
        Box::pin(Self::do_verify(
            self.client.clone(),
            self.api_url.clone(),
            self.secret_key.clone(),
            reference.to_string(),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct PaystackEnvelope<T> {
    #[allow(dead_code)]
    status: bool,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    amount: i64,
    paid_at: Option<DateTime<Utc>>,
    metadata: Option<serde_json::Value>,
}
