//! Witness derivation for a transaction plan.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::ViewError;
use crate::plan::TransactionPlan;
use crate::tree::{Anchor, AuthPath, NoteCommitment, StateCommitmentTree};

/// Authentication paths for a plan's spends, all against one anchor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessData {
    pub anchor: Anchor,
    pub auth_paths: BTreeMap<NoteCommitment, AuthPath>,
}

impl WitnessData {
    pub fn path(&self, commitment: &NoteCommitment) -> Option<&AuthPath> {
        self.auth_paths.get(commitment)
    }

    pub fn is_empty(&self) -> bool {
        self.auth_paths.is_empty()
    }
}

/// Witness every note spent by `plan` against the tree snapshot.
///
/// Pure function of its inputs. A plan with no spends yields an empty
/// witness set anchored at the snapshot root.
pub fn get_witness(
    plan: &TransactionPlan,
    tree: &StateCommitmentTree,
) -> Result<WitnessData, ViewError> {
    let anchor = tree.root();
    let commitments: Vec<NoteCommitment> =
        plan.spend_plans().map(|spend| spend.note_commitment()).collect();

    let mut auth_paths = BTreeMap::new();
    for (commitment, path) in tree.witness_many(commitments.iter()) {
        let path = path.ok_or_else(|| {
            ViewError::InvalidArgument(format!(
                "note commitment {commitment} is not in the state commitment tree"
            ))
        })?;
        auth_paths.insert(commitment, path);
    }

    debug!(%anchor, spends = auth_paths.len(), "derived witness data");
    Ok(WitnessData { anchor, auth_paths })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetId, Value};
    use crate::keys::{AddressIndex, FullViewingKey};
    use crate::plan::{ActionPlan, Note, OutputPlan, SpendPlan};

    fn note(n: u8) -> Note {
        Note {
            value: Value {
                amount: 10,
                asset_id: AssetId([1u8; 32]),
            },
            address: FullViewingKey([1u8; 32]).payment_address(AddressIndex::account(0)),
            rseed: [n; 32],
        }
    }

    #[test]
    fn plan_without_spends_has_empty_witness() {
        let mut tree = StateCommitmentTree::new(8);
        tree.append(NoteCommitment([9u8; 32])).unwrap();
        let note = note(1);
        let plan = TransactionPlan {
            actions: vec![ActionPlan::Output(OutputPlan {
                value: note.value,
                dest_address: note.address,
                rseed: [0u8; 32],
            })],
            ..Default::default()
        };
        let witness = get_witness(&plan, &tree).unwrap();
        assert!(witness.is_empty());
        assert_eq!(witness.anchor, tree.root());
    }

    #[test]
    fn spends_are_witnessed_against_snapshot_root() {
        let mut tree = StateCommitmentTree::new(8);
        let first = note(1);
        let second = note(2);
        tree.append(first.commit()).unwrap();
        tree.append(second.commit()).unwrap();
        let plan = TransactionPlan {
            actions: vec![
                ActionPlan::Spend(SpendPlan { note: first.clone(), position: 0 }),
                ActionPlan::Spend(SpendPlan { note: second.clone(), position: 1 }),
            ],
            ..Default::default()
        };
        let witness = get_witness(&plan, &tree).unwrap();
        assert_eq!(witness.auth_paths.len(), 2);
        for n in [first, second] {
            let c = n.commit();
            assert!(witness.path(&c).unwrap().verify(&c, &witness.anchor));
        }
    }

    #[test]
    fn unknown_spend_is_invalid_argument() {
        let tree = StateCommitmentTree::new(8);
        let plan = TransactionPlan {
            actions: vec![ActionPlan::Spend(SpendPlan { note: note(1), position: 0 })],
            ..Default::default()
        };
        assert!(matches!(
            get_witness(&plan, &tree),
            Err(ViewError::InvalidArgument(_))
        ));
    }
}
