//! Live chain queries.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::auction::{AuctionId, DutchAuction};
use crate::error::QueryError;

/// Looks up the current on-chain state of an auction.
#[async_trait]
pub trait AuctionQuerier: Send + Sync {
    async fn auction_state_by_id(&self, id: &AuctionId) -> Result<Option<DutchAuction>, QueryError>;
}

/// Querier for a wallet with no chain connection. Always answers `None`.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineQuerier;

#[async_trait]
impl AuctionQuerier for OfflineQuerier {
    async fn auction_state_by_id(&self, _id: &AuctionId) -> Result<Option<DutchAuction>, QueryError> {
        Ok(None)
    }
}

/// Querier backed by a fixed table of auction states.
#[derive(Debug, Default)]
pub struct StaticQuerier {
    states: RwLock<HashMap<AuctionId, Result<DutchAuction, QueryError>>>,
}

impl StaticQuerier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: AuctionId, auction: DutchAuction) {
        self.states.write().await.insert(id, Ok(auction));
    }

    /// Make queries for `id` fail with `error`.
    pub async fn fail(&self, id: AuctionId, error: QueryError) {
        self.states.write().await.insert(id, Err(error));
    }
}

#[async_trait]
impl AuctionQuerier for StaticQuerier {
    async fn auction_state_by_id(&self, id: &AuctionId) -> Result<Option<DutchAuction>, QueryError> {
        match self.states.read().await.get(id) {
            Some(Ok(auction)) => Ok(Some(auction.clone())),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_querier_answers_from_table() {
        let querier = StaticQuerier::new();
        let known = AuctionId([1u8; 32]);
        let broken = AuctionId([2u8; 32]);
        querier.insert(known, DutchAuction::default()).await;
        querier
            .fail(broken, QueryError::Transport("connection reset".into()))
            .await;

        assert_eq!(
            querier.auction_state_by_id(&known).await,
            Ok(Some(DutchAuction::default()))
        );
        assert!(querier.auction_state_by_id(&broken).await.is_err());
        assert_eq!(
            querier.auction_state_by_id(&AuctionId([3u8; 32])).await,
            Ok(None)
        );
    }
}
