//! Witness & build pipeline.
//!
//! Witnesses a plan against one tree snapshot, hands the build capability a
//! guarded authorization future, and forwards build status to the caller one
//! element at a time. The guarded future is shared with the pipeline, so its
//! checks hold before completion is forwarded whether or not the builder
//! awaited it. When the plan spends notes, the anchor is checked against the
//! live tree when authorization resolves and again before completion.

use async_stream::try_stream;
use futures::future::{FutureExt, Shared};
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

use crate::authorization::AuthorizationData;
use crate::build::{AuthorizationFuture, BuildStatus, TransactionBuilder};
use crate::error::{BuildError, ViewError};
use crate::keys::FullViewingKey;
use crate::plan::TransactionPlan;
use crate::store::ViewStore;
use crate::tree::Anchor;
use crate::witness::get_witness;

/// Authorization that is already known.
pub fn ready_authorization(data: AuthorizationData) -> AuthorizationFuture {
    Box::pin(async move { Ok::<_, ViewError>(data) })
}

/// Drives one build per call.
#[derive(Clone)]
pub struct WitnessAndBuild {
    store: Arc<dyn ViewStore>,
    builder: Arc<dyn TransactionBuilder>,
}

impl WitnessAndBuild {
    pub fn new(store: Arc<dyn ViewStore>, builder: Arc<dyn TransactionBuilder>) -> Self {
        Self { store, builder }
    }

    /// Witness and build `plan`, streaming progress then the transaction.
    ///
    /// `authorization` may still be pending; `None` stands for empty
    /// authorization data. Errors end the stream.
    pub fn run(
        &self,
        plan: Option<TransactionPlan>,
        authorization: Option<AuthorizationFuture>,
        fvk: FullViewingKey,
    ) -> BoxStream<'static, Result<BuildStatus, ViewError>> {
        let store = Arc::clone(&self.store);
        let builder = Arc::clone(&self.builder);
        let stream = try_stream! {
            let plan = plan.ok_or(ViewError::PlanMissing)?;

            let witness = {
                let tree = store.state_commitment_tree().await?;
                get_witness(&plan, &tree)?
            };
            // Without spends there is no membership proof to go stale.
            let witnessed = (!witness.is_empty()).then_some(witness.anchor);
            info!(anchor = %witness.anchor, actions = plan.actions.len(), "witnessed plan, building");

            let authorization = guard_authorization(
                authorization.unwrap_or_else(|| ready_authorization(AuthorizationData::default())),
                plan.clone(),
                Arc::clone(&store),
                witnessed,
            );

            let mut statuses = builder.build(plan, witness, Box::pin(authorization.clone()), fvk);
            let mut last_percent = 0u8;
            let mut completed = false;
            while let Some(status) = statuses.next().await {
                match status? {
                    BuildStatus::Progress { percent_complete } => {
                        ensure_monotone(last_percent, percent_complete)?;
                        last_percent = percent_complete;
                        yield BuildStatus::Progress { percent_complete };
                    }
                    BuildStatus::Complete { transaction } => {
                        authorization.clone().await?;
                        if let Some(witnessed) = witnessed {
                            ensure_fresh(store.as_ref(), witnessed).await?;
                        }
                        info!(id = %transaction.id, "build complete");
                        completed = true;
                        yield BuildStatus::Complete { transaction };
                        break;
                    }
                }
            }
            if !completed {
                Err::<(), _>(ViewError::from(BuildError::Internal(
                    "build ended without a transaction".into(),
                )))?;
            }
        };
        stream.boxed()
    }
}

/// Wrap the caller's authorization with the correlation and staleness checks.
///
/// The result resolves once; every clone sees the same outcome.
fn guard_authorization(
    authorization: AuthorizationFuture,
    plan: TransactionPlan,
    store: Arc<dyn ViewStore>,
    witnessed: Option<Anchor>,
) -> Shared<AuthorizationFuture> {
    let checked: AuthorizationFuture =
        Box::pin(checked_authorization(authorization, plan, store, witnessed));
    checked.shared()
}

async fn checked_authorization(
    authorization: AuthorizationFuture,
    plan: TransactionPlan,
    store: Arc<dyn ViewStore>,
    witnessed: Option<Anchor>,
) -> Result<AuthorizationData, ViewError> {
    let data = authorization.await?;
    data.check_against(&plan)?;
    if let Some(witnessed) = witnessed {
        ensure_fresh(store.as_ref(), witnessed).await?;
    }
    Ok(data)
}

fn ensure_monotone(last: u8, next: u8) -> Result<(), BuildError> {
    if next < last {
        return Err(BuildError::Internal(format!(
            "progress went backwards from {last} to {next}"
        )));
    }
    Ok(())
}

async fn ensure_fresh(store: &dyn ViewStore, witnessed: Anchor) -> Result<(), ViewError> {
    let current = store.current_anchor().await?;
    if current != witnessed {
        warn!(%witnessed, %current, "state commitment tree moved during build");
        return Err(ViewError::WitnessStale { witnessed, current });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::SpendAuthSignature;
    use crate::build::OptimisticBuilder;
    use crate::witness::WitnessData;
    use crate::error::AuthorizationError;
    use crate::store::MemoryStore;
    use futures::TryStreamExt;

    fn pipeline(store: Arc<MemoryStore>) -> WitnessAndBuild {
        WitnessAndBuild::new(store, Arc::new(OptimisticBuilder::new()))
    }

    #[tokio::test]
    async fn missing_plan_fails_immediately() {
        let store = Arc::new(MemoryStore::new(8));
        let result: Result<Vec<_>, _> = pipeline(store)
            .run(None, None, FullViewingKey([1u8; 32]))
            .try_collect()
            .await;
        assert!(matches!(result, Err(ViewError::PlanMissing)));
    }

    #[tokio::test]
    async fn plan_without_spends_builds_with_absent_authorization() {
        let store = Arc::new(MemoryStore::new(8));
        let statuses: Vec<_> = pipeline(store)
            .run(Some(TransactionPlan::default()), None, FullViewingKey([1u8; 32]))
            .try_collect()
            .await
            .unwrap();
        assert!(statuses.last().is_some_and(BuildStatus::is_complete));
    }

    /// Builds with empty authorization and drops the one it is handed.
    struct IgnoresAuthorization;

    impl TransactionBuilder for IgnoresAuthorization {
        fn build(
            &self,
            plan: TransactionPlan,
            witness: WitnessData,
            _authorization: AuthorizationFuture,
            fvk: FullViewingKey,
        ) -> BoxStream<'static, Result<BuildStatus, ViewError>> {
            OptimisticBuilder::new().build(
                plan,
                witness,
                ready_authorization(AuthorizationData::default()),
                fvk,
            )
        }
    }

    fn declined() -> AuthorizationFuture {
        Box::pin(async {
            Err::<AuthorizationData, _>(ViewError::from(AuthorizationError::Declined))
        })
    }

    #[tokio::test]
    async fn rejection_surfaces_even_if_builder_never_awaits_it() {
        let store = Arc::new(MemoryStore::new(8));
        let pipeline = WitnessAndBuild::new(store, Arc::new(IgnoresAuthorization));
        let result: Result<Vec<_>, _> = pipeline
            .run(
                Some(TransactionPlan::default()),
                Some(declined()),
                FullViewingKey([1u8; 32]),
            )
            .try_collect()
            .await;
        assert!(matches!(
            result,
            Err(ViewError::AuthorizationRejected(AuthorizationError::Declined))
        ));
    }

    #[tokio::test]
    async fn mismatch_surfaces_even_if_builder_never_awaits_it() {
        let store = Arc::new(MemoryStore::new(8));
        let pipeline = WitnessAndBuild::new(store, Arc::new(IgnoresAuthorization));
        let stray = AuthorizationData {
            spend_auths: vec![SpendAuthSignature([0u8; 64])],
            ..Default::default()
        };
        let result: Result<Vec<_>, _> = pipeline
            .run(
                Some(TransactionPlan::default()),
                Some(ready_authorization(stray)),
                FullViewingKey([1u8; 32]),
            )
            .try_collect()
            .await;
        assert!(matches!(result, Err(ViewError::AuthorizationMismatch(_))));
    }

    struct StopsEarly;

    impl TransactionBuilder for StopsEarly {
        fn build(
            &self,
            _plan: TransactionPlan,
            _witness: WitnessData,
            _authorization: AuthorizationFuture,
            _fvk: FullViewingKey,
        ) -> BoxStream<'static, Result<BuildStatus, ViewError>> {
            futures::stream::iter([Ok(BuildStatus::Progress { percent_complete: 0 })]).boxed()
        }
    }

    #[tokio::test]
    async fn build_without_transaction_is_aborted() {
        let store = Arc::new(MemoryStore::new(8));
        let pipeline = WitnessAndBuild::new(store, Arc::new(StopsEarly));
        let result: Result<Vec<_>, _> = pipeline
            .run(Some(TransactionPlan::default()), None, FullViewingKey([1u8; 32]))
            .try_collect()
            .await;
        assert!(matches!(
            result,
            Err(ViewError::BuildAborted(BuildError::Internal(_)))
        ));
    }

    #[tokio::test]
    async fn rejection_is_propagated() {
        let store = Arc::new(MemoryStore::new(8));
        let result: Result<Vec<_>, _> = pipeline(store)
            .run(
                Some(TransactionPlan::default()),
                Some(declined()),
                FullViewingKey([1u8; 32]),
            )
            .try_collect()
            .await;
        assert!(matches!(
            result,
            Err(ViewError::AuthorizationRejected(AuthorizationError::Declined))
        ));
    }
}
