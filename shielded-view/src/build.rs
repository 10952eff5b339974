//! Transaction building.
//!
//! [`TransactionBuilder`] is the build capability the pipeline drives.
//! [`OptimisticBuilder`] assembles every action speculatively while
//! authorization is still outstanding, and only joins with the
//! authorization future when it needs the signatures.

use async_stream::try_stream;
use ed25519_dalek::VerifyingKey;
use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::asset::Amount;
use crate::authorization::{AuthorizationData, SpendAuthSignature};
use crate::bytes::{hash_with_domain, hex_newtype};
use crate::custody::{verify_spend_auth, AuthKind};
use crate::error::{BuildError, ViewError};
use crate::keys::{FullViewingKey, Nullifier};
use crate::plan::{ActionPlan, EffectHash, Note, SwapPlaintext, TransactionPlan, Vote};
use crate::tree::{Anchor, NoteCommitment};
use crate::witness::WitnessData;

const SWAP_COMMITMENT_DOMAIN: &[u8] = b"shielded_view_swap_commitment_v1";
const TRANSACTION_ID_DOMAIN: &[u8] = b"shielded_view_transaction_id_v1";

/// Authorization that may still be pending when the build starts.
pub type AuthorizationFuture = BoxFuture<'static, Result<AuthorizationData, ViewError>>;

hex_newtype!(
    /// Hash identifying a built transaction.
    TransactionId,
    32
);

/// One element of a build stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildStatus {
    Progress { percent_complete: u8 },
    Complete { transaction: Transaction },
}

impl BuildStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

/// A built action as it appears in the transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionBody {
    Spend {
        nullifier: Nullifier,
        auth_sig: SpendAuthSignature,
    },
    Output {
        note_commitment: NoteCommitment,
    },
    Swap {
        swap_commitment: NoteCommitment,
    },
    SwapClaim {
        nullifier: Nullifier,
    },
    DelegatorVote {
        proposal: u64,
        vote: Vote,
        nullifier: Nullifier,
        auth_sig: SpendAuthSignature,
    },
    /// Actions without shielded state are carried as planned.
    Transparent(ActionPlan),
}

/// A fully witnessed, authorized transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Anchor every spend was witnessed against.
    pub anchor: Anchor,
    pub actions: Vec<ActionBody>,
    pub authorization: AuthorizationData,
    pub fee: Amount,
    pub memo: Option<String>,
    pub chain_id: String,
    pub expiry_height: u64,
}

/// The build capability.
pub trait TransactionBuilder: Send + Sync {
    /// Stream zero or more non-decreasing progress updates, then exactly one
    /// `Complete`, or fail.
    fn build(
        &self,
        plan: TransactionPlan,
        witness: WitnessData,
        authorization: AuthorizationFuture,
        fvk: FullViewingKey,
    ) -> BoxStream<'static, Result<BuildStatus, ViewError>>;
}

/// Action body before signatures are attached.
enum Speculative {
    Ready(ActionBody),
    Spend { index: usize, nullifier: Nullifier },
    DelegatorVote {
        index: usize,
        proposal: u64,
        vote: Vote,
        nullifier: Nullifier,
    },
}

/// Builds actions while authorization is still resolving.
#[derive(Clone, Debug, Default)]
pub struct OptimisticBuilder {
    verifying_key: Option<VerifyingKey>,
}

impl OptimisticBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also check every signature against `key` before completing.
    pub fn with_verifying_key(key: VerifyingKey) -> Self {
        Self {
            verifying_key: Some(key),
        }
    }
}

impl TransactionBuilder for OptimisticBuilder {
    fn build(
        &self,
        plan: TransactionPlan,
        witness: WitnessData,
        authorization: AuthorizationFuture,
        fvk: FullViewingKey,
    ) -> BoxStream<'static, Result<BuildStatus, ViewError>> {
        let verifying_key = self.verifying_key;
        let stream = try_stream! {
            yield BuildStatus::Progress { percent_complete: 0 };

            let total = plan.actions.len();
            let mut speculative = Vec::with_capacity(total);
            let (mut spends, mut votes) = (0usize, 0usize);
            for (index, action) in plan.actions.iter().enumerate() {
                speculative.push(build_action(index, action, &witness, &fvk, &mut spends, &mut votes)?);
                yield BuildStatus::Progress {
                    percent_complete: ((index + 1) * 100 / total) as u8,
                };
            }
            if total == 0 {
                yield BuildStatus::Progress { percent_complete: 100 };
            }

            let authorization = authorization.await?;
            if let Some(key) = &verifying_key {
                verify_signatures(key, &plan.effect_hash()?, &authorization)?;
            }
            let actions = speculative
                .into_iter()
                .map(|action| attach_signature(action, &authorization))
                .collect::<Result<Vec<_>, BuildError>>()?;

            let transaction = finalize(&plan, witness.anchor, actions, authorization)?;
            debug!(id = %transaction.id, anchor = %transaction.anchor, "transaction built");
            yield BuildStatus::Complete { transaction };
        };
        stream.boxed()
    }
}

fn build_action(
    index: usize,
    action: &ActionPlan,
    witness: &WitnessData,
    fvk: &FullViewingKey,
    spends: &mut usize,
    votes: &mut usize,
) -> Result<Speculative, BuildError> {
    let built = match action {
        ActionPlan::Spend(spend) => {
            let commitment = spend.note_commitment();
            let path = witness
                .path(&commitment)
                .ok_or_else(|| BuildError::MissingWitness(commitment.to_string()))?;
            if !path.verify(&commitment, &witness.anchor) {
                return Err(BuildError::InvalidWitness {
                    commitment: commitment.to_string(),
                    anchor: witness.anchor.to_string(),
                });
            }
            let nullifier = fvk.derive_nullifier(path.position, &commitment);
            *spends += 1;
            Speculative::Spend {
                index: *spends - 1,
                nullifier,
            }
        }
        ActionPlan::Output(output) => {
            let note = Note {
                value: output.value,
                address: output.dest_address,
                rseed: output.rseed,
            };
            Speculative::Ready(ActionBody::Output {
                note_commitment: note.commit(),
            })
        }
        ActionPlan::Swap(swap) => Speculative::Ready(ActionBody::Swap {
            swap_commitment: swap_commitment(&swap.swap_plaintext),
        }),
        ActionPlan::SwapClaim(claim) => {
            let commitment = swap_commitment(&claim.swap_plaintext);
            Speculative::Ready(ActionBody::SwapClaim {
                nullifier: fvk.derive_nullifier(claim.position, &commitment),
            })
        }
        ActionPlan::DelegatorVote(vote) => {
            let commitment = vote.staked_note.commit();
            *votes += 1;
            Speculative::DelegatorVote {
                index: *votes - 1,
                proposal: vote.proposal,
                vote: vote.vote,
                nullifier: fvk.derive_nullifier(vote.staked_note_position, &commitment),
            }
        }
        other => Speculative::Ready(ActionBody::Transparent(other.clone())),
    };
    debug!(action = index, kind = action.kind(), "action built");
    Ok(built)
}

fn attach_signature(
    action: Speculative,
    authorization: &AuthorizationData,
) -> Result<ActionBody, BuildError> {
    Ok(match action {
        Speculative::Ready(body) => body,
        Speculative::Spend { index, nullifier } => ActionBody::Spend {
            nullifier,
            auth_sig: *authorization.spend_auths.get(index).ok_or_else(|| {
                BuildError::Action {
                    index,
                    reason: "no spend authorization".into(),
                }
            })?,
        },
        Speculative::DelegatorVote {
            index,
            proposal,
            vote,
            nullifier,
        } => ActionBody::DelegatorVote {
            proposal,
            vote,
            nullifier,
            auth_sig: *authorization.delegator_vote_auths.get(index).ok_or_else(|| {
                BuildError::Action {
                    index,
                    reason: "no delegator vote authorization".into(),
                }
            })?,
        },
    })
}

fn verify_signatures(
    key: &VerifyingKey,
    effect_hash: &EffectHash,
    authorization: &AuthorizationData,
) -> Result<(), BuildError> {
    let signed = [
        (AuthKind::Spend, &authorization.spend_auths),
        (AuthKind::DelegatorVote, &authorization.delegator_vote_auths),
    ];
    for (kind, signatures) in signed {
        for (index, signature) in signatures.iter().enumerate() {
            if !verify_spend_auth(key, effect_hash, kind, index, signature) {
                return Err(BuildError::Action {
                    index,
                    reason: format!("{kind:?} authorization signature does not verify"),
                });
            }
        }
    }
    Ok(())
}

fn swap_commitment(plaintext: &SwapPlaintext) -> NoteCommitment {
    NoteCommitment(hash_with_domain(
        SWAP_COMMITMENT_DOMAIN,
        &[
            plaintext.trading_pair.0.as_bytes(),
            plaintext.trading_pair.1.as_bytes(),
            &plaintext.delta_1.to_le_bytes(),
            &plaintext.delta_2.to_le_bytes(),
            &plaintext.claim_fee.to_le_bytes(),
            &plaintext.claim_address.diversifier,
            &plaintext.claim_address.transmission_key,
            &plaintext.rseed,
        ],
    ))
}

fn finalize(
    plan: &TransactionPlan,
    anchor: Anchor,
    actions: Vec<ActionBody>,
    authorization: AuthorizationData,
) -> Result<Transaction, BuildError> {
    let body = (&anchor, &actions, plan.fee, &plan.memo, &plan.chain_id, plan.expiry_height);
    let body = bincode::serialize(&body)
        .map_err(|e| BuildError::Internal(format!("transaction body is not encodable: {e}")))?;
    Ok(Transaction {
        id: TransactionId(hash_with_domain(TRANSACTION_ID_DOMAIN, &[&body])),
        anchor,
        actions,
        authorization,
        fee: plan.fee,
        memo: plan.memo.clone(),
        chain_id: plan.chain_id.clone(),
        expiry_height: plan.expiry_height,
    })
}
