//! Transaction plans.
//!
//! A plan is an ordered, immutable description of the actions a transaction
//! will contain. It is owned by the caller and read-only to the engine.

use serde::{Deserialize, Serialize};

use crate::asset::{Amount, AssetId, Value};
use crate::auction::{AuctionId, DutchAuctionDescription};
use crate::bytes::{hash_with_domain, hex_newtype};
use crate::error::ViewError;
use crate::keys::Address;
use crate::tree::{NoteCommitment, Position};

const NOTE_COMMITMENT_DOMAIN: &[u8] = b"shielded_view_note_commitment_v1";
const EFFECT_HASH_DOMAIN: &[u8] = b"shielded_view_effect_hash_v1";

hex_newtype!(
    /// Hash of everything a transaction does; what spend authority signs.
    EffectHash,
    32
);

hex_newtype!(
    /// Validator identity key.
    IdentityKey,
    32
);

/// A spendable note.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub value: Value,
    pub address: Address,
    pub rseed: [u8; 32],
}

impl Note {
    pub fn commit(&self) -> NoteCommitment {
        NoteCommitment(hash_with_domain(
            NOTE_COMMITMENT_DOMAIN,
            &[
                &self.value.amount.to_le_bytes(),
                self.value.asset_id.as_bytes(),
                &self.address.diversifier,
                &self.address.transmission_key,
                &self.rseed,
            ],
        ))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendPlan {
    pub note: Note,
    pub position: Position,
}

impl SpendPlan {
    pub fn note_commitment(&self) -> NoteCommitment {
        self.note.commit()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPlan {
    pub value: Value,
    pub dest_address: Address,
    pub rseed: [u8; 32],
}

/// The plaintext of a swap, including where its outputs may be claimed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPlaintext {
    pub trading_pair: (AssetId, AssetId),
    pub delta_1: Amount,
    pub delta_2: Amount,
    pub claim_fee: Amount,
    /// Address the swap outputs are minted to when claimed.
    pub claim_address: Address,
    pub rseed: [u8; 32],
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPlan {
    pub swap_plaintext: SwapPlaintext,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapClaimPlan {
    pub swap_plaintext: SwapPlaintext,
    pub position: Position,
    pub epoch_duration: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatePlan {
    pub validator_identity: IdentityKey,
    pub epoch_index: u64,
    pub unbonded_amount: Amount,
    pub delegation_amount: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndelegatePlan {
    pub validator_identity: IdentityKey,
    pub start_epoch_index: u64,
    pub unbonded_amount: Amount,
    pub delegation_amount: Amount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    Yes,
    No,
    Abstain,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorVotePlan {
    pub proposal: u64,
    pub vote: Vote,
    pub staked_note: Note,
    pub staked_note_position: Position,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutchAuctionWithdrawPlan {
    pub auction_id: AuctionId,
    pub seq: u64,
    pub reserves_input: Value,
    pub reserves_output: Value,
}

/// One planned action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPlan {
    Spend(SpendPlan),
    Output(OutputPlan),
    Swap(SwapPlan),
    SwapClaim(SwapClaimPlan),
    Delegate(DelegatePlan),
    Undelegate(UndelegatePlan),
    DelegatorVote(DelegatorVotePlan),
    ActionDutchAuctionSchedule(DutchAuctionDescription),
    ActionDutchAuctionEnd(AuctionId),
    ActionDutchAuctionWithdraw(DutchAuctionWithdrawPlan),
}

impl ActionPlan {
    /// Short action name for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spend(_) => "spend",
            Self::Output(_) => "output",
            Self::Swap(_) => "swap",
            Self::SwapClaim(_) => "swap_claim",
            Self::Delegate(_) => "delegate",
            Self::Undelegate(_) => "undelegate",
            Self::DelegatorVote(_) => "delegator_vote",
            Self::ActionDutchAuctionSchedule(_) => "dutch_auction_schedule",
            Self::ActionDutchAuctionEnd(_) => "dutch_auction_end",
            Self::ActionDutchAuctionWithdraw(_) => "dutch_auction_withdraw",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPlan {
    pub actions: Vec<ActionPlan>,
    #[serde(default)]
    pub fee: Amount,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub expiry_height: u64,
}

impl TransactionPlan {
    pub fn spend_plans(&self) -> impl Iterator<Item = &SpendPlan> {
        self.actions.iter().filter_map(|a| match a {
            ActionPlan::Spend(spend) => Some(spend),
            _ => None,
        })
    }

    pub fn delegator_vote_plans(&self) -> impl Iterator<Item = &DelegatorVotePlan> {
        self.actions.iter().filter_map(|a| match a {
            ActionPlan::DelegatorVote(vote) => Some(vote),
            _ => None,
        })
    }

    /// Claim destinations of every swap and swap claim, with action index.
    pub fn swap_claim_addresses(&self) -> impl Iterator<Item = (usize, &Address)> {
        self.actions
            .iter()
            .enumerate()
            .filter_map(|(index, action)| match action {
                ActionPlan::Swap(swap) => Some((index, &swap.swap_plaintext.claim_address)),
                ActionPlan::SwapClaim(claim) => Some((index, &claim.swap_plaintext.claim_address)),
                _ => None,
            })
    }

    /// Hash of the plan's effects, signed by spend authority.
    pub fn effect_hash(&self) -> Result<EffectHash, ViewError> {
        let encoded = bincode::serialize(self)
            .map_err(|e| ViewError::InvalidArgument(format!("plan is not encodable: {e}")))?;
        Ok(EffectHash(hash_with_domain(EFFECT_HASH_DOMAIN, &[&encoded])))
    }
}
