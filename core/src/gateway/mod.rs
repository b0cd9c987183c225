//! Payment gateway capability.
//!
//! The reservation ledger talks to a third-party card processor through
//! this interface. The adapter owns all wire-format concerns, including
//! major↔minor currency unit conversion; the state machine only ever sees
//! minor units and the three-way settlement status.

mod paystack;

pub use paystack::PaystackGateway;

use crate::error::{MarketError, Result};
use crate::types::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

/// Settlement status reported by the gateway for a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayStatus {
    /// The charge settled
    Success,
    /// The charge failed
    Failed,
    /// The payer abandoned the checkout page
    Abandoned,
}

impl GatewayStatus {
    /// Did the charge settle?
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Result of initializing a transaction with the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializedPayment {
    /// Hosted checkout URL the payer is redirected to
    pub authorization_url: String,
    /// Gateway access code for the checkout session
    pub access_code: String,
    /// The reference echoed back by the gateway
    pub reference: String,
}

/// Result of verifying a transaction with the gateway.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerifiedPayment {
    /// Settlement status
    pub status: GatewayStatus,
    /// Amount charged, in minor units
    pub amount: Money,
    /// When the charge settled, if it did
    pub paid_at: Option<DateTime<Utc>>,
    /// Metadata echoed back from initialization
    pub metadata: serde_json::Value,
}

/// Payment gateway trait.
///
/// Abstraction over hosted-checkout processors (Paystack and compatible).
/// Both calls are suspension points; the ledger treats any transport error
/// as [`MarketError::ExternalFailure`].
pub trait PaymentGateway: Send + Sync {
    /// Initialize a transaction and obtain a hosted checkout URL.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::ExternalFailure`] if the gateway is
    /// unreachable or rejects the request.
    fn initialize(
        &self,
        email: &str,
        amount: Money,
        reference: &str,
        metadata: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<InitializedPayment>> + Send>>;

    /// Verify the settlement status of a transaction by reference.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::ExternalFailure`] if the gateway is
    /// unreachable. A reachable gateway reporting a failed charge is NOT an
    /// error here; the status is returned for the ledger to act on.
    fn verify(
        &self,
        reference: &str,
    ) -> Pin<Box<dyn Future<Output = Result<VerifiedPayment>> + Send>>;
}

/// Scriptable in-memory payment gateway for development and testing.
///
/// Every reference settles successfully unless scripted otherwise, so tests
/// can force the race and failure paths deterministically.
#[derive(Clone, Debug, Default)]
pub struct MockPaymentGateway {
    outcomes: Arc<Mutex<HashMap<String, GatewayStatus>>>,
    unreachable: Arc<Mutex<bool>>,
}

impl MockPaymentGateway {
    /// Creates a new mock gateway where every charge settles.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an Arc-wrapped instance for sharing.
    #[must_use]
    pub fn shared() -> Arc<dyn PaymentGateway> {
        Arc::new(Self::new())
    }

    /// Script the verification outcome for a specific reference.
    pub fn script_outcome(&self, reference: &str, status: GatewayStatus) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(reference.to_string(), status);
    }

    /// Make every subsequent call fail as if the gateway were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        *self
            .unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = unreachable;
    }

    fn outcome_for(&self, reference: &str) -> GatewayStatus {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reference)
            .copied()
            .unwrap_or(GatewayStatus::Success)
    }

    fn is_unreachable(&self) -> bool {
        *self
            .unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl PaymentGateway for MockPaymentGateway {
    fn initialize(
        &self,
        email: &str,
        amount: Money,
        reference: &str,
        _metadata: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<InitializedPayment>> + Send>> {
        let unreachable = self.is_unreachable();
        let reference = reference.to_string();
        let email = email.to_string();
        Box::pin(async move {
            if unreachable {
                return Err(MarketError::external("payment gateway unreachable"));
            }

            tracing::info!(
                email = %email,
                amount = amount.minor(),
                reference = %reference,
                "mock payment initialized"
            );

            Ok(InitializedPayment {
                authorization_url: format!("https://checkout.mock/{reference}"),
                access_code: format!("mock_access_{reference}"),
                reference,
            })
        })
    }

    fn verify(
        &self,
        reference: &str,
    ) -> Pin<Box<dyn Future<Output = Result<VerifiedPayment>> + Send>> {
        let unreachable = self.is_unreachable();
        let status = self.outcome_for(reference);
        let reference = reference.to_string();
        Box::pin(async move {
            if unreachable {
                return Err(MarketError::external("payment gateway unreachable"));
            }

            tracing::info!(reference = %reference, ?status, "mock payment verified");

            Ok(VerifiedPayment {
                status,
                amount: Money::ZERO,
                paid_at: status.is_success().then(Utc::now),
                metadata: serde_json::Value::Null,
            })
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_defaults_to_success() {
        let gateway = MockPaymentGateway::new();
        let verified = gateway.verify("RSV-1-abc").await.unwrap();
        assert_eq!(verified.status, GatewayStatus::Success);
        assert!(verified.paid_at.is_some());
    }

    #[tokio::test]
    async fn test_mock_scripted_failure() {
        let gateway = MockPaymentGateway::new();
        gateway.script_outcome("RSV-2-def", GatewayStatus::Failed);

        let verified = gateway.verify("RSV-2-def").await.unwrap();
        assert_eq!(verified.status, GatewayStatus::Failed);
        assert!(verified.paid_at.is_none());
    }

    #[tokio::test]
    async fn test_mock_unreachable() {
        let gateway = MockPaymentGateway::new();
        gateway.set_unreachable(true);

        let err = gateway.verify("RSV-3-ghi").await.unwrap_err();
        assert!(err.is_external());
    }
}
