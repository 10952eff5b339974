//! Dutch auctions: identifiers, local records, and discovery.

pub mod discovery;
pub mod id;

use serde::{Deserialize, Serialize};

use crate::asset::{Amount, Value};
use crate::error::CodecError;
use crate::store::SpendableNoteRecord;
use crate::tree::NoteCommitment;

pub use discovery::{AuctionDiscovery, AuctionsRequest};
pub use id::{decode_auction_nft, encode_auction_nft, AuctionId, DutchAuctionDescription};

/// Type URL under which [`DutchAuction`] values are packed.
pub const DUTCH_AUCTION_TYPE_URL: &str = "/core.component.auction.v1.DutchAuction";

/// Mutable state of a Dutch auction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutchAuctionState {
    /// `0` while open; any larger value means closed or withdrawn.
    pub seq: u64,
    pub input_reserves: Option<Amount>,
    pub output_reserves: Option<Amount>,
    pub next_trigger: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutchAuction {
    pub state: Option<DutchAuctionState>,
    pub description: Option<DutchAuctionDescription>,
}

/// What the local index knows about an auction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionRecord {
    /// Description cached when the auction was scheduled.
    #[serde(default)]
    pub auction: Option<DutchAuctionDescription>,
    /// Commitment of the note holding the auction NFT.
    #[serde(default)]
    pub note_commitment: Option<NoteCommitment>,
    #[serde(default)]
    pub seq_num: Option<u64>,
}

impl AuctionRecord {
    /// Closed or withdrawn auctions have a positive sequence number.
    pub fn is_inactive(&self) -> bool {
        self.seq_num.is_some_and(|seq| seq > 0)
    }
}

/// Reserves still held by an auction, tracked locally as it executes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutstandingReserves {
    pub input: Value,
    pub output: Value,
}

/// Self-describing packed value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Any {
    pub type_url: String,
    #[serde(with = "hex::serde")]
    pub value: Vec<u8>,
}

impl Any {
    pub fn pack_dutch_auction(auction: &DutchAuction) -> Result<Self, CodecError> {
        Ok(Self {
            type_url: DUTCH_AUCTION_TYPE_URL.to_string(),
            value: bincode::serialize(auction).map_err(|e| CodecError::Encoding(e.to_string()))?,
        })
    }

    /// Unpack as a [`DutchAuction`], or `None` if this holds something else.
    pub fn unpack_dutch_auction(&self) -> Option<DutchAuction> {
        if self.type_url != DUTCH_AUCTION_TYPE_URL {
            return None;
        }
        bincode::deserialize(&self.value).ok()
    }
}

/// One auction yielded to a caller enumerating auctions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionsResponse {
    pub id: AuctionId,
    pub auction: Option<Any>,
    pub note_record: Option<SpendableNoteRecord>,
    pub local_seq: Option<u64>,
}
