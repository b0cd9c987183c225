//! Error types for marketplace state-machine operations.

use thiserror::Error;

/// Result type alias for marketplace operations.
pub type Result<T> = std::result::Result<T, MarketError>;

/// Error taxonomy for the reservation, chat, and sale pipelines.
///
/// Every operation validates synchronously before mutating; a validation
/// failure is returned immediately with no partial writes. Categories map
/// one-to-one onto the HTTP statuses surfaced by the web layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarketError {
    // ═══════════════════════════════════════════════════════════
    // Lookup Errors
    // ═══════════════════════════════════════════════════════════

    /// The referenced entity does not exist.
    ///
    /// The message is deliberately generic for payment references so that
    /// callers cannot probe which references are valid.
    #[error("{entity} not found")]
    NotFound {
        /// Kind of entity that was missing (e.g. "property", "chat").
        entity: &'static str,
    },

    // ═══════════════════════════════════════════════════════════
    // Authorization Errors
    // ═══════════════════════════════════════════════════════════

    /// The actor is authenticated but not allowed to perform the operation.
    #[error("forbidden: {reason}")]
    Forbidden {
        /// Why the actor was rejected.
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════
    // State-Transition Errors
    // ═══════════════════════════════════════════════════════════

    /// A competing claim already holds the resource.
    #[error("conflict: {reason}")]
    Conflict {
        /// Why the claim was rejected.
        reason: String,
    },

    /// Valid actor, but the requested transition is illegal in the current
    /// state or its precondition is already satisfied.
    #[error("bad request: {reason}")]
    BadRequest {
        /// Why the transition was rejected.
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════
    // Collaborator Errors
    // ═══════════════════════════════════════════════════════════

    /// An external collaborator failed or reported a non-success outcome.
    ///
    /// Gateway secrets never appear in the message.
    #[error("external failure: {reason}")]
    ExternalFailure {
        /// What the collaborator reported.
        reason: String,
    },

    /// Required process-level configuration is absent.
    #[error("not configured: {what}")]
    Unconfigured {
        /// The missing configuration item.
        what: &'static str,
    },

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// The persistence capability failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl MarketError {
    /// Build a [`MarketError::NotFound`] for an entity kind.
    #[must_use]
    pub const fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    /// Build a [`MarketError::Forbidden`] with a reason.
    #[must_use]
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// Build a [`MarketError::Conflict`] with a reason.
    #[must_use]
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    /// Build a [`MarketError::BadRequest`] with a reason.
    #[must_use]
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest {
            reason: reason.into(),
        }
    }

    /// Build a [`MarketError::ExternalFailure`] with a reason.
    #[must_use]
    pub fn external(reason: impl Into<String>) -> Self {
        Self::ExternalFailure {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error was caused by the caller's input or
    /// timing rather than by the system itself.
    ///
    /// # Examples
    ///
    /// ```
    /// # use homestead_core::error::MarketError;
    /// assert!(MarketError::bad_request("chat is closed").is_user_error());
    /// assert!(!MarketError::Storage("io".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Forbidden { .. }
                | Self::Conflict { .. }
                | Self::BadRequest { .. }
        )
    }

    /// Returns `true` if the error originated outside the process.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        matches!(self, Self::ExternalFailure { .. })
    }
}
