//! The three marketplace state-machine services.
//!
//! Each service validates synchronously before mutating, so a failed
//! precondition never leaves partial writes behind. Authorization is an
//! explicit predicate at the head of each operation, evaluated against the
//! actor's stored role — never ambient middleware.

pub mod chats;
pub mod reservations;
pub mod sales;

pub use chats::ChatService;
pub use reservations::{ReservationService, VerifiedReservation};
pub use sales::{MarkSoldRequest, ReviewDecision, SaleService};
