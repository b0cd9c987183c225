//! Core state machine for a property marketplace.
//!
//! Three intertwined processes share this crate:
//!
//! - A time-limited, paid **reservation lock** on a property
//!   ([`services::ReservationService`]), guaranteeing at most one active
//!   claim per property under concurrent payment verifications.
//! - A **chat lifecycle** ([`services::ChatService`]) gated on that
//!   reservation, with assistant or human-agent replies, payment-closure,
//!   and agent ratings.
//! - A **sale/finance pipeline** ([`services::SaleService`]) reconciling
//!   out-of-band bank payments through a one-shot finance review that
//!   creates commissions.
//!
//! External collaborators (payment gateway, text generation, persistence)
//! are consumed as capabilities behind traits, with scriptable in-memory
//! implementations for tests and development.
//!
//! # Example
//!
//! ```
//! use homestead_core::config::MarketplaceConfig;
//! use homestead_core::types::Money;
//!
//! let config = MarketplaceConfig::new().with_reservation_fee(Money::from_major(25_000));
//! assert_eq!(config.reservation_fee, Money::from_major(25_000));
//! ```

pub mod assistant;
pub mod config;
pub mod error;
pub mod gateway;
pub mod services;
pub mod stores;
pub mod types;

pub use config::MarketplaceConfig;
pub use error::{MarketError, Result};
