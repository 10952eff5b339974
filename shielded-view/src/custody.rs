//! Custody: the only component holding spend authority.
//!
//! [`Custody::authorize`] is the authorization boundary. It runs the guard
//! on every request before any signature is produced; there is no way to
//! authorize a plan without it.

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::authorization::{AuthorizationData, SpendAuthSignature};
use crate::error::{AuthorizationError, ViewError};
use crate::guard::assert_valid_authorize_request;
use crate::keys::FullViewingKey;
use crate::plan::{EffectHash, TransactionPlan};

/// Request to authorize a plan.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub plan: Option<TransactionPlan>,
}

/// Which kind of action a signature authorizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthKind {
    Spend,
    DelegatorVote,
}

impl AuthKind {
    fn tag(self) -> u8 {
        match self {
            Self::Spend => 0,
            Self::DelegatorVote => 1,
        }
    }
}

/// Produces signatures over effect hashes.
#[async_trait]
pub trait SpendAuthority: Send + Sync {
    /// Sign `effect_hash` for the `index`th action of `kind`.
    ///
    /// Returning [`AuthorizationError::Declined`] means the user refused.
    async fn sign(
        &self,
        effect_hash: &EffectHash,
        kind: AuthKind,
        index: usize,
    ) -> Result<SpendAuthSignature, AuthorizationError>;
}

/// Authorization boundary bound to one wallet.
pub struct Custody<A> {
    fvk: FullViewingKey,
    authority: A,
}

impl<A: SpendAuthority> Custody<A> {
    pub fn new(fvk: FullViewingKey, authority: A) -> Self {
        Self { fvk, authority }
    }

    pub fn full_viewing_key(&self) -> &FullViewingKey {
        &self.fvk
    }

    /// Validate and sign a plan.
    pub async fn authorize(&self, request: AuthorizeRequest) -> Result<AuthorizationData, ViewError> {
        assert_valid_authorize_request(request.plan.as_ref(), &self.fvk)?;
        let plan = request.plan.ok_or(ViewError::PlanMissing)?;
        let effect_hash = plan.effect_hash()?;

        let mut spend_auths = Vec::new();
        for index in 0..plan.spend_plans().count() {
            spend_auths.push(self.sign(&effect_hash, AuthKind::Spend, index).await?);
        }
        let mut delegator_vote_auths = Vec::new();
        for index in 0..plan.delegator_vote_plans().count() {
            delegator_vote_auths.push(self.sign(&effect_hash, AuthKind::DelegatorVote, index).await?);
        }

        info!(
            %effect_hash,
            spends = spend_auths.len(),
            votes = delegator_vote_auths.len(),
            "plan authorized"
        );
        Ok(AuthorizationData {
            effect_hash: Some(effect_hash),
            spend_auths,
            delegator_vote_auths,
        })
    }

    async fn sign(
        &self,
        effect_hash: &EffectHash,
        kind: AuthKind,
        index: usize,
    ) -> Result<SpendAuthSignature, ViewError> {
        self.authority
            .sign(effect_hash, kind, index)
            .await
            .map_err(|e| {
                warn!(?kind, index, error = %e, "authorization refused");
                ViewError::AuthorizationRejected(e)
            })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOFTWARE SIGNER
// ═══════════════════════════════════════════════════════════════════════════════

/// Ed25519 spend authority holding its key in memory.
pub struct Ed25519SpendAuthority {
    signing_key: SigningKey,
}

impl Ed25519SpendAuthority {
    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: SigningKey::generate(&mut csprng),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

#[async_trait]
impl SpendAuthority for Ed25519SpendAuthority {
    async fn sign(
        &self,
        effect_hash: &EffectHash,
        kind: AuthKind,
        index: usize,
    ) -> Result<SpendAuthSignature, AuthorizationError> {
        let message = signing_message(effect_hash, kind, index);
        Ok(SpendAuthSignature(self.signing_key.sign(&message).to_bytes()))
    }
}

/// Check a signature produced by [`Ed25519SpendAuthority`].
pub fn verify_spend_auth(
    key: &VerifyingKey,
    effect_hash: &EffectHash,
    kind: AuthKind,
    index: usize,
    signature: &SpendAuthSignature,
) -> bool {
    let signature = Signature::from_bytes(signature.as_bytes());
    key.verify(&signing_message(effect_hash, kind, index), &signature)
        .is_ok()
}

fn signing_message(effect_hash: &EffectHash, kind: AuthKind, index: usize) -> Vec<u8> {
    let mut message = Vec::with_capacity(32 + 1 + 8);
    message.extend_from_slice(effect_hash.as_bytes());
    message.push(kind.tag());
    message.extend_from_slice(&(index as u64).to_le_bytes());
    message
}
