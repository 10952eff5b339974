//! Auction discovery.
//!
//! Auctions the wallet controls are found indirectly: each one is held as an
//! auction NFT in the wallet's balances. Discovery walks the balances, keeps
//! those whose display denomination decodes to an [`AuctionId`], and joins
//! each with the local auction index and, on request, live chain state.

use async_stream::try_stream;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    decode_auction_nft, Any, AuctionId, AuctionRecord, AuctionsResponse, DutchAuction,
    DutchAuctionState, OutstandingReserves,
};
use crate::error::{QueryError, ViewError};
use crate::keys::AddressIndex;
use crate::query::AuctionQuerier;
use crate::store::{BalanceSource, ViewStore};

/// Parameters of one discovery pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AuctionsRequest {
    pub account_filter: Option<AddressIndex>,
    /// Also yield closed and withdrawn auctions.
    pub include_inactive: bool,
    /// Ask the chain for current state instead of relying on the local cache.
    pub query_latest_state: bool,
}

/// Joins balances, the local auction index, and live chain state.
#[derive(Clone)]
pub struct AuctionDiscovery {
    store: Arc<dyn ViewStore>,
    balances: Arc<dyn BalanceSource>,
    querier: Arc<dyn AuctionQuerier>,
    live_query_timeout: Duration,
}

impl AuctionDiscovery {
    pub fn new(
        store: Arc<dyn ViewStore>,
        balances: Arc<dyn BalanceSource>,
        querier: Arc<dyn AuctionQuerier>,
        live_query_timeout: Duration,
    ) -> Self {
        Self {
            store,
            balances,
            querier,
            live_query_timeout,
        }
    }

    /// Enumerate the auctions behind the wallet's balances, in balance order.
    ///
    /// Each call re-scans current balances. A failed live query degrades
    /// that one record to its cached state; store failures end the stream.
    pub fn discover(
        &self,
        request: AuctionsRequest,
    ) -> BoxStream<'static, Result<AuctionsResponse, ViewError>> {
        let this = self.clone();
        let stream = try_stream! {
            let mut balances = this.balances.balances(request.account_filter);
            while let Some(balance) = balances.next().await {
                let balance = balance?;
                let denom = balance.balance_view.display_denom();
                let Some(id) = decode_auction_nft(&denom) else {
                    continue;
                };

                let record = this.store.auction(&id).await?.unwrap_or_default();
                if !request.include_inactive && record.is_inactive() {
                    debug!(auction = %id.to_bech32m(), seq = ?record.seq_num, "skipping inactive auction");
                    continue;
                }

                yield this.resolve(id, record, request.query_latest_state).await?;
            }
        };
        stream.boxed()
    }

    async fn resolve(
        &self,
        id: AuctionId,
        record: AuctionRecord,
        query_latest_state: bool,
    ) -> Result<AuctionsResponse, ViewError> {
        let note_record = match record.note_commitment {
            Some(commitment) => self.store.spendable_note_by_commitment(&commitment).await?,
            None => None,
        };

        let live = if query_latest_state {
            self.live_state(&id).await
        } else {
            None
        };

        let reserves = if live.is_none() {
            self.store.auction_outstanding_reserves(&id).await?
        } else {
            None
        };

        let auction = match reconcile(&record, live, reserves) {
            Some(auction) => match Any::pack_dutch_auction(&auction) {
                Ok(any) => Some(any),
                Err(e) => {
                    warn!(auction = %id.to_bech32m(), error = %e, "could not pack auction");
                    None
                }
            },
            None => None,
        };

        Ok(AuctionsResponse {
            id,
            auction,
            note_record,
            local_seq: record.seq_num,
        })
    }

    /// Live state for `id`, or `None` when the query fails or times out.
    async fn live_state(&self, id: &AuctionId) -> Option<DutchAuctionState> {
        let query = self.querier.auction_state_by_id(id);
        let result = match tokio::time::timeout(self.live_query_timeout, query).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::Timeout(self.live_query_timeout.as_millis() as u64)),
        };
        match result {
            Ok(auction) => auction.and_then(|a| a.state),
            Err(e) => {
                warn!(auction = %id.to_bech32m(), error = %e, "live auction query failed, using cached state");
                None
            }
        }
    }
}

/// Merge cached and live data into the auction reported to the caller.
///
/// Live state wins. Without it, a state is synthesized from outstanding
/// reserves when those are tracked. `None` when nothing at all is known.
pub fn reconcile(
    record: &AuctionRecord,
    live: Option<DutchAuctionState>,
    reserves: Option<OutstandingReserves>,
) -> Option<DutchAuction> {
    let state = live.or_else(|| {
        reserves.map(|r| DutchAuctionState {
            seq: record.seq_num.unwrap_or_default(),
            input_reserves: Some(r.input.amount),
            output_reserves: Some(r.output.amount),
            next_trigger: None,
        })
    });

    if state.is_none() && record.auction.is_none() {
        return None;
    }
    Some(DutchAuction {
        state,
        description: record.auction.clone(),
    })
}
