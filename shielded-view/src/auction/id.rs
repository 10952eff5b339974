//! Auction identifiers and the auction-NFT denomination that carries them.
//!
//! An auction the wallet controls shows up in its balances as one unit of a
//! synthetic asset whose denomination is `auctionnft_<seq>_pauctid1<data>`.
//! The Bech32m part decodes back to the [`AuctionId`].

use serde::{Deserialize, Serialize};

use crate::asset::{decode_bech32m, encode_bech32m, Amount, AssetId, Value};
use crate::bytes::{hash_with_domain, hex_newtype};
use crate::denom::AssetPattern;
use crate::error::CodecError;

/// Bech32m prefix for auction identifiers.
pub const AUCTION_ID_PREFIX: &str = "pauctid";

const AUCTION_ID_DOMAIN: &[u8] = b"shielded_view_dutch_auction_id_v1";

hex_newtype!(
    /// Identifier of an on-chain auction.
    AuctionId,
    32
);

/// Parameters of a Dutch auction, fixed when it is scheduled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutchAuctionDescription {
    pub input: Value,
    pub output_id: AssetId,
    pub max_output: Amount,
    pub min_output: Amount,
    pub start_height: u64,
    pub end_height: u64,
    pub step_count: u64,
    pub nonce: [u8; 32],
}

impl DutchAuctionDescription {
    /// The id this auction receives when scheduled.
    pub fn id(&self) -> AuctionId {
        AuctionId(hash_with_domain(
            AUCTION_ID_DOMAIN,
            &[
                &self.input.amount.to_le_bytes(),
                self.input.asset_id.as_bytes(),
                self.output_id.as_bytes(),
                &self.max_output.to_le_bytes(),
                &self.min_output.to_le_bytes(),
                &self.start_height.to_le_bytes(),
                &self.end_height.to_le_bytes(),
                &self.step_count.to_le_bytes(),
                &self.nonce,
            ],
        ))
    }
}

impl AuctionId {
    pub fn to_bech32m(&self) -> String {
        encode_bech32m(AUCTION_ID_PREFIX, &self.0)
    }

    pub fn from_bech32m(encoded: &str) -> Result<Self, CodecError> {
        decode_bech32m(AUCTION_ID_PREFIX, encoded).map(Self)
    }
}

/// Denomination of the NFT representing auction `id` at sequence number `seq`.
pub fn encode_auction_nft(id: &AuctionId, seq: u64) -> String {
    format!("auctionnft_{seq}_{}", id.to_bech32m())
}

/// Extract the auction id from an auction-NFT denomination.
///
/// Returns `None` for anything else, including auction-shaped denominations
/// whose id does not decode: most balances are not auctions, so this is a
/// filter rather than a parse.
pub fn decode_auction_nft(denom: &str) -> Option<AuctionId> {
    let encoded = AssetPattern::auction_id(denom)?;
    AuctionId::from_bech32m(&encoded).ok()
}
