//! Marketplace configuration.
//!
//! Configuration is an immutable value object resolved once at process
//! start and passed to service constructors. Business logic never reads the
//! environment directly; that keeps the fee math unit-testable without
//! environment mutation.

use crate::types::Money;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Company bank details surfaced to buyers paying by manual transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    /// Bank name
    pub bank_name: String,
    /// Account holder name
    pub account_name: String,
    /// Account number
    pub account_number: String,
}

/// Marketplace configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct MarketplaceConfig {
    /// Fixed reservation fee charged to lock a property.
    ///
    /// Default: 10,000 major currency units
    pub reservation_fee: Money,

    /// How long a verified reservation holds the property.
    ///
    /// Default: 7 days
    pub reservation_ttl: Duration,

    /// How long a non-paid soft hold lasts without renewal.
    ///
    /// Default: 15 minutes
    pub soft_hold_ttl: Duration,

    /// Agent fee as a percentage of property price.
    ///
    /// Default: 10
    pub agent_fee_percentage: u8,

    /// Agent's cut as a percentage of the agent fee.
    ///
    /// Default: 70
    pub agent_cut_percentage: u8,

    /// Commission rate applied to confirmed sale amounts, in percent.
    ///
    /// Default: 5
    pub commission_percentage: u8,

    /// First-reply latency (minutes) under which an agent counts as
    /// responsive.
    ///
    /// Default: 1440 (24 hours)
    pub responsive_reply_minutes: i64,

    /// Company bank details for manual-transfer payment instructions.
    ///
    /// `None` means the deployment has not configured payment
    /// instructions; operations that need them fail with `Unconfigured`.
    pub company_bank_details: Option<BankDetails>,
}

impl MarketplaceConfig {
    /// Create a configuration with the standard defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reservation_fee: Money::from_major(10_000),
            reservation_ttl: Duration::days(7),
            soft_hold_ttl: Duration::minutes(15),
            agent_fee_percentage: 10,
            agent_cut_percentage: 70,
            commission_percentage: 5,
            responsive_reply_minutes: 1440,
            company_bank_details: None,
        }
    }

    /// Set the fixed reservation fee.
    #[must_use]
    pub const fn with_reservation_fee(mut self, fee: Money) -> Self {
        self.reservation_fee = fee;
        self
    }

    /// Set the paid-reservation time-to-live.
    #[must_use]
    pub const fn with_reservation_ttl(mut self, ttl: Duration) -> Self {
        self.reservation_ttl = ttl;
        self
    }

    /// Set the soft-hold time-to-live.
    #[must_use]
    pub const fn with_soft_hold_ttl(mut self, ttl: Duration) -> Self {
        self.soft_hold_ttl = ttl;
        self
    }

    /// Set the agent fee percentage of property price.
    #[must_use]
    pub const fn with_agent_fee_percentage(mut self, pct: u8) -> Self {
        self.agent_fee_percentage = pct;
        self
    }

    /// Set the agent's cut percentage of the agent fee.
    #[must_use]
    pub const fn with_agent_cut_percentage(mut self, pct: u8) -> Self {
        self.agent_cut_percentage = pct;
        self
    }

    /// Set the commission percentage of confirmed sale amounts.
    #[must_use]
    pub const fn with_commission_percentage(mut self, pct: u8) -> Self {
        self.commission_percentage = pct;
        self
    }

    /// Set the responsive first-reply threshold in minutes.
    #[must_use]
    pub const fn with_responsive_reply_minutes(mut self, minutes: i64) -> Self {
        self.responsive_reply_minutes = minutes;
        self
    }

    /// Set the company bank details for payment instructions.
    #[must_use]
    pub fn with_company_bank_details(mut self, details: BankDetails) -> Self {
        self.company_bank_details = Some(details);
        self
    }

    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset.
    ///
    /// Recognized variables: `RESERVATION_FEE_MAJOR`, `RESERVATION_TTL_DAYS`,
    /// `SOFT_HOLD_TTL_MINUTES`, `AGENT_FEE_PERCENTAGE`,
    /// `AGENT_CUT_PERCENTAGE`, `COMMISSION_PERCENTAGE`,
    /// `COMPANY_BANK_NAME` / `COMPANY_ACCOUNT_NAME` /
    /// `COMPANY_ACCOUNT_NUMBER` (all three required together).
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::new();

        if let Some(fee) = env_parse::<i64>("RESERVATION_FEE_MAJOR") {
            config.reservation_fee = Money::from_major(fee);
        }
        if let Some(days) = env_parse::<i64>("RESERVATION_TTL_DAYS") {
            config.reservation_ttl = Duration::days(days);
        }
        if let Some(minutes) = env_parse::<i64>("SOFT_HOLD_TTL_MINUTES") {
            config.soft_hold_ttl = Duration::minutes(minutes);
        }
        if let Some(pct) = env_parse::<u8>("AGENT_FEE_PERCENTAGE") {
            config.agent_fee_percentage = pct;
        }
        if let Some(pct) = env_parse::<u8>("AGENT_CUT_PERCENTAGE") {
            config.agent_cut_percentage = pct;
        }
        if let Some(pct) = env_parse::<u8>("COMMISSION_PERCENTAGE") {
            config.commission_percentage = pct;
        }

        let bank = (
            std::env::var("COMPANY_BANK_NAME").ok(),
            std::env::var("COMPANY_ACCOUNT_NAME").ok(),
            std::env::var("COMPANY_ACCOUNT_NUMBER").ok(),
        );
        if let (Some(bank_name), Some(account_name), Some(account_number)) = bank {
            config.company_bank_details = Some(BankDetails {
                bank_name,
                account_name,
                account_number,
            });
        }

        config
    }
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
