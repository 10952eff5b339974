//! View service: the engine's external surface.
//!
//! Every collaborator is passed in at construction; nothing is looked up
//! from ambient state.

use futures::stream::BoxStream;
use std::sync::Arc;

use crate::auction::{AuctionDiscovery, AuctionsRequest, AuctionsResponse};
use crate::build::{AuthorizationFuture, BuildStatus, TransactionBuilder};
use crate::config::EngineConfig;
use crate::error::ViewError;
use crate::guard;
use crate::keys::FullViewingKey;
use crate::pipeline::WitnessAndBuild;
use crate::plan::TransactionPlan;
use crate::query::AuctionQuerier;
use crate::store::{BalanceSource, ViewStore};

/// Collaborators of a [`ViewService`].
pub struct Collaborators {
    pub store: Arc<dyn ViewStore>,
    pub balances: Arc<dyn BalanceSource>,
    pub querier: Arc<dyn AuctionQuerier>,
    pub builder: Arc<dyn TransactionBuilder>,
}

/// Query-and-build engine for one wallet.
#[derive(Clone)]
pub struct ViewService {
    fvk: FullViewingKey,
    pipeline: WitnessAndBuild,
    discovery: AuctionDiscovery,
}

impl ViewService {
    pub fn new(config: &EngineConfig, fvk: FullViewingKey, collaborators: Collaborators) -> Self {
        let Collaborators {
            store,
            balances,
            querier,
            builder,
        } = collaborators;
        Self {
            fvk,
            pipeline: WitnessAndBuild::new(Arc::clone(&store), builder),
            discovery: AuctionDiscovery::new(store, balances, querier, config.live_query_timeout()),
        }
    }

    pub fn full_viewing_key(&self) -> &FullViewingKey {
        &self.fvk
    }

    /// Witness and build a plan, streaming [`BuildStatus`].
    pub fn witness_and_build(
        &self,
        plan: Option<TransactionPlan>,
        authorization: Option<AuthorizationFuture>,
    ) -> BoxStream<'static, Result<BuildStatus, ViewError>> {
        self.pipeline.run(plan, authorization, self.fvk)
    }

    /// Enumerate the auctions this wallet controls.
    pub fn auctions(
        &self,
        request: AuctionsRequest,
    ) -> BoxStream<'static, Result<AuctionsResponse, ViewError>> {
        self.discovery.discover(request)
    }

    /// Run the authorization guard for this wallet.
    pub fn assert_valid_authorize_request(
        &self,
        plan: Option<&TransactionPlan>,
    ) -> Result<(), ViewError> {
        guard::assert_valid_authorize_request(plan, &self.fvk)
    }
}
