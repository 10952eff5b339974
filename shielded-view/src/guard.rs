//! Authorization guard.
//!
//! Security assertions run on every authorization request before anything
//! is signed. A plan can be built by an untrusted caller and submitted for
//! authorization directly, so plan construction is not a safe place for
//! these checks; authorization is the one step a caller cannot skip.

use tracing::warn;

use crate::error::ViewError;
use crate::keys::{AddressOwnership, FullViewingKey};
use crate::plan::TransactionPlan;

/// One security assertion over a plan.
type Rule = fn(&TransactionPlan, &dyn AddressOwnership) -> Result<(), ViewError>;

/// Every rule enforced at the authorization boundary. New rules go here.
const RULES: &[Rule] = &[assert_swap_claim_addresses_belong_to_current_user];

/// Validate a plan submitted for authorization by the holder of `fvk`.
pub fn assert_valid_authorize_request(
    plan: Option<&TransactionPlan>,
    fvk: &FullViewingKey,
) -> Result<(), ViewError> {
    let plan = plan.ok_or(ViewError::PlanMissing)?;
    assert_valid_plan(plan, fvk)
}

/// Run every rule against `plan` with an injected ownership test.
pub fn assert_valid_plan(
    plan: &TransactionPlan,
    is_controlled: &dyn AddressOwnership,
) -> Result<(), ViewError> {
    RULES.iter().try_for_each(|rule| rule(plan, is_controlled))
}

/// Swap outputs must be claimable only by the current user.
///
/// Checks the claim address of every swap and swap claim.
pub fn assert_swap_claim_addresses_belong_to_current_user(
    plan: &TransactionPlan,
    is_controlled: &dyn AddressOwnership,
) -> Result<(), ViewError> {
    for (index, address) in plan.swap_claim_addresses() {
        if !is_controlled.is_controlled(address) {
            warn!(action = index, %address, "swap claim address is not controlled by this wallet");
            return Err(ViewError::SecurityViolation(format!(
                "action {index}: tried to initiate a swap with a claim address belonging to a different user"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetId, Value};
    use crate::keys::{Address, AddressIndex};
    use crate::plan::{
        ActionPlan, Note, OutputPlan, SpendPlan, SwapClaimPlan, SwapPlan, SwapPlaintext,
    };
    use proptest::prelude::*;

    fn mine() -> FullViewingKey {
        FullViewingKey([1u8; 32])
    }

    fn theirs() -> FullViewingKey {
        FullViewingKey([2u8; 32])
    }

    fn plaintext(claim_address: Address) -> SwapPlaintext {
        SwapPlaintext {
            trading_pair: (AssetId([1u8; 32]), AssetId([2u8; 32])),
            delta_1: 10,
            delta_2: 0,
            claim_fee: 0,
            claim_address,
            rseed: [0u8; 32],
        }
    }

    #[derive(Clone, Debug)]
    enum Shape {
        Spend,
        Output,
        Swap { ours: bool, account: u32 },
        SwapClaim { ours: bool, account: u32 },
    }

    fn action(shape: &Shape) -> ActionPlan {
        let address_of = |ours: bool, account: u32| {
            let fvk = if ours { mine() } else { theirs() };
            fvk.payment_address(AddressIndex::account(account))
        };
        let value = Value {
            amount: 1,
            asset_id: AssetId([3u8; 32]),
        };
        match *shape {
            Shape::Spend => ActionPlan::Spend(SpendPlan {
                note: Note {
                    value,
                    address: address_of(true, 0),
                    rseed: [0u8; 32],
                },
                position: 0,
            }),
            Shape::Output => ActionPlan::Output(OutputPlan {
                value,
                dest_address: address_of(false, 0),
                rseed: [0u8; 32],
            }),
            Shape::Swap { ours, account } => ActionPlan::Swap(SwapPlan {
                swap_plaintext: plaintext(address_of(ours, account)),
            }),
            Shape::SwapClaim { ours, account } => ActionPlan::SwapClaim(SwapClaimPlan {
                swap_plaintext: plaintext(address_of(ours, account)),
                position: 0,
                epoch_duration: 719,
            }),
        }
    }

    fn shape() -> impl Strategy<Value = Shape> {
        prop_oneof![
            Just(Shape::Spend),
            Just(Shape::Output),
            (any::<bool>(), 0u32..8).prop_map(|(ours, account)| Shape::Swap { ours, account }),
            (any::<bool>(), 0u32..8)
                .prop_map(|(ours, account)| Shape::SwapClaim { ours, account }),
        ]
    }

    fn plan_of(shapes: &[Shape]) -> TransactionPlan {
        TransactionPlan {
            actions: shapes.iter().map(action).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn missing_plan_is_rejected() {
        assert!(matches!(
            assert_valid_authorize_request(None, &mine()),
            Err(ViewError::PlanMissing)
        ));
    }

    #[test]
    fn foreign_swap_claim_address_is_a_security_violation() {
        let plan = plan_of(&[Shape::Output, Shape::Swap { ours: false, account: 0 }]);
        assert!(matches!(
            assert_valid_authorize_request(Some(&plan), &mine()),
            Err(ViewError::SecurityViolation(_))
        ));
    }

    #[test]
    fn injected_predicate_is_consulted() {
        let plan = plan_of(&[Shape::SwapClaim { ours: true, account: 0 }]);
        let deny_all = |_: &Address| false;
        assert!(assert_valid_plan(&plan, &deny_all).is_err());
        let allow_all = |_: &Address| true;
        assert!(assert_valid_plan(&plan, &allow_all).is_ok());
    }

    proptest! {
        #[test]
        fn any_foreign_claim_address_fails(
            mut shapes in prop::collection::vec(shape(), 0..8),
            insert_at in any::<prop::sample::Index>(),
            claim in any::<bool>(),
        ) {
            let foreign = if claim {
                Shape::SwapClaim { ours: false, account: 0 }
            } else {
                Shape::Swap { ours: false, account: 0 }
            };
            let at = insert_at.index(shapes.len() + 1);
            shapes.insert(at, foreign);
            let result = assert_valid_authorize_request(Some(&plan_of(&shapes)), &mine());
            prop_assert!(matches!(result, Err(ViewError::SecurityViolation(_))));
        }

        #[test]
        fn controlled_claim_addresses_pass(accounts in prop::collection::vec(0u32..64, 0..8)) {
            let shapes: Vec<_> = accounts
                .into_iter()
                .map(|account| Shape::SwapClaim { ours: true, account })
                .collect();
            prop_assert!(assert_valid_authorize_request(Some(&plan_of(&shapes)), &mine()).is_ok());
        }
    }
}
