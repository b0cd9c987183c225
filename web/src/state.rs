//! Application state shared across HTTP handlers.

use homestead_core::assistant::{MockTextGeneration, TextGeneration};
use homestead_core::config::MarketplaceConfig;
use homestead_core::gateway::{MockPaymentGateway, PaymentGateway};
use homestead_core::services::{ChatService, ReservationService, SaleService};
use homestead_core::stores::memory::{
    MemoryAgentStatsStore, MemoryChatStore, MemoryCommissionStore, MemoryInterestStore,
    MemoryMessageStore, MemoryPaymentStore, MemoryPropertyStore, MemoryRatingStore,
    MemoryReportStore, MemorySaleStore, MemoryUserStore,
};
use homestead_core::stores::{PropertyRepository, UserRepository};
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Reservation-lock lifecycle service
    pub reservations: Arc<ReservationService>,
    /// Chat lifecycle service
    pub chats: Arc<ChatService>,
    /// Sale/finance pipeline service
    pub sales: Arc<SaleService>,
    /// Property store, for listing endpoints
    pub properties: Arc<dyn PropertyRepository>,
    /// User store, for account endpoints
    pub users: Arc<dyn UserRepository>,
}

impl AppState {
    /// Wire the full service graph over in-memory stores with the given
    /// external collaborators.
    #[must_use]
    pub fn in_memory(
        gateway: Arc<dyn PaymentGateway>,
        assistant: Arc<dyn TextGeneration>,
        config: MarketplaceConfig,
    ) -> Self {
        let properties: Arc<MemoryPropertyStore> = Arc::new(MemoryPropertyStore::new());
        let payments = Arc::new(MemoryPaymentStore::new());
        let users: Arc<MemoryUserStore> = Arc::new(MemoryUserStore::new());
        let agent_stats = Arc::new(MemoryAgentStatsStore::new());

        let reservations = Arc::new(ReservationService::new(
            properties.clone(),
            payments,
            users.clone(),
            gateway,
            config.clone(),
        ));

        let chats = Arc::new(ChatService::new(
            Arc::new(MemoryChatStore::new()),
            Arc::new(MemoryMessageStore::new()),
            Arc::new(MemoryRatingStore::new()),
            Arc::new(MemoryReportStore::new()),
            agent_stats,
            properties.clone(),
            users.clone(),
            reservations.clone(),
            assistant,
            config.clone(),
        ));

        let sales = Arc::new(SaleService::new(
            Arc::new(MemorySaleStore::new()),
            Arc::new(MemoryCommissionStore::new()),
            properties.clone(),
            Arc::new(MemoryInterestStore::new()),
            users.clone(),
            config,
        ));

        Self {
            reservations,
            chats,
            sales,
            properties,
            users,
        }
    }

    /// Development wiring: in-memory stores, a gateway where every charge
    /// settles, and a canned assistant.
    #[must_use]
    pub fn development(config: MarketplaceConfig) -> Self {
        Self::in_memory(
            Arc::new(MockPaymentGateway::new()),
            Arc::new(MockTextGeneration::new()),
            config,
        )
    }
}
