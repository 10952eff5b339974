//! Authorization data produced by custody.

use serde::{Deserialize, Serialize};

use crate::bytes::hex_newtype;
use crate::error::ViewError;
use crate::plan::{EffectHash, TransactionPlan};

hex_newtype!(
    /// Signature authorizing one spend or delegator vote.
    SpendAuthSignature,
    64
);

/// Authorizations for a plan, correlated with its actions by position.
///
/// `spend_auths[i]` authorizes the `i`th spend in plan order, and likewise
/// for delegator votes. The signatures themselves are opaque here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationData {
    #[serde(default)]
    pub effect_hash: Option<EffectHash>,
    #[serde(default)]
    pub spend_auths: Vec<SpendAuthSignature>,
    #[serde(default)]
    pub delegator_vote_auths: Vec<SpendAuthSignature>,
}

impl AuthorizationData {
    /// Check that this data structurally matches `plan`.
    pub fn check_against(&self, plan: &TransactionPlan) -> Result<(), ViewError> {
        let spends = plan.spend_plans().count();
        if self.spend_auths.len() != spends {
            return Err(ViewError::AuthorizationMismatch(format!(
                "plan has {spends} spends but {} spend authorizations were supplied",
                self.spend_auths.len()
            )));
        }

        let votes = plan.delegator_vote_plans().count();
        if self.delegator_vote_auths.len() != votes {
            return Err(ViewError::AuthorizationMismatch(format!(
                "plan has {votes} delegator votes but {} vote authorizations were supplied",
                self.delegator_vote_auths.len()
            )));
        }

        if let Some(signed) = self.effect_hash {
            let expected = plan.effect_hash()?;
            if signed != expected {
                return Err(ViewError::AuthorizationMismatch(format!(
                    "authorization signs effect hash {signed}, plan has {expected}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetId, Value};
    use crate::keys::{AddressIndex, FullViewingKey};
    use crate::plan::{ActionPlan, Note, SpendPlan};

    fn plan_with_spends(n: usize) -> TransactionPlan {
        let address = FullViewingKey([1u8; 32]).payment_address(AddressIndex::account(0));
        TransactionPlan {
            actions: (0..n)
                .map(|i| {
                    ActionPlan::Spend(SpendPlan {
                        note: Note {
                            value: Value {
                                amount: 1,
                                asset_id: AssetId([0u8; 32]),
                            },
                            address,
                            rseed: [i as u8; 32],
                        },
                        position: i as u64,
                    })
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_authorization_fits_plan_without_spends() {
        assert!(AuthorizationData::default()
            .check_against(&TransactionPlan::default())
            .is_ok());
    }

    #[test]
    fn empty_authorization_does_not_fit_spends() {
        let err = AuthorizationData::default()
            .check_against(&plan_with_spends(1))
            .unwrap_err();
        assert!(matches!(err, ViewError::AuthorizationMismatch(_)));
    }

    #[test]
    fn wrong_effect_hash_is_a_mismatch() {
        let plan = plan_with_spends(1);
        let auth = AuthorizationData {
            effect_hash: Some(EffectHash([0u8; 32])),
            spend_auths: vec![SpendAuthSignature([1u8; 64])],
            delegator_vote_auths: vec![],
        };
        assert!(matches!(
            auth.check_against(&plan),
            Err(ViewError::AuthorizationMismatch(_))
        ));

        let auth = AuthorizationData {
            effect_hash: Some(plan.effect_hash().unwrap()),
            ..auth
        };
        assert!(auth.check_against(&plan).is_ok());
    }
}
