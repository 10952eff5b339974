//! Assets, values, and the value views balances are reported in.

use bech32::{Bech32m, Hrp};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::bytes::hex_newtype;
use crate::error::CodecError;

/// Bech32m prefix for asset identifiers.
pub const ASSET_ID_PREFIX: &str = "passet";

/// Token amount in base units.
pub type Amount = u128;

hex_newtype!(
    /// Identifier of an asset type.
    AssetId,
    32
);

impl AssetId {
    pub fn to_bech32m(&self) -> String {
        encode_bech32m(ASSET_ID_PREFIX, &self.0)
    }

    pub fn from_bech32m(encoded: &str) -> Result<Self, CodecError> {
        decode_bech32m(ASSET_ID_PREFIX, encoded).map(Self)
    }
}

/// Bech32m-encode a 32-byte identifier for display. Falls back to hex, with
/// an error logged, if `prefix` pushes the string past the Bech32m limit.
pub(crate) fn encode_bech32m(prefix: &str, bytes: &[u8; 32]) -> String {
    try_encode_bech32m(prefix, bytes).unwrap_or_else(|err| {
        error!(prefix, %err, "bech32m encoding failed, displaying hex");
        hex::encode(bytes)
    })
}

pub(crate) fn try_encode_bech32m(prefix: &str, bytes: &[u8; 32]) -> Result<String, CodecError> {
    let hrp = Hrp::parse(prefix).map_err(|e| CodecError::Encoding(e.to_string()))?;
    bech32::encode::<Bech32m>(hrp, bytes).map_err(|e| CodecError::Encoding(e.to_string()))
}

/// Decode a Bech32m string, requiring `prefix` and exactly 32 data bytes.
pub(crate) fn decode_bech32m(prefix: &'static str, encoded: &str) -> Result<[u8; 32], CodecError> {
    let (hrp, data) = bech32::decode(encoded)?;
    if hrp.as_str() != prefix {
        return Err(CodecError::Prefix {
            expected: prefix,
            found: hrp.as_str().to_string(),
        });
    }
    <[u8; 32]>::try_from(data.as_slice()).map_err(|_| CodecError::Length {
        expected: 32,
        actual: data.len(),
    })
}

/// An amount of a specific asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    pub amount: Amount,
    pub asset_id: AssetId,
}

/// One unit of denomination for an asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenomUnit {
    pub denom: String,
    pub exponent: u8,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Registry metadata for an asset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Base denomination (smallest unit).
    pub base: String,
    /// Display denomination.
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub denom_units: Vec<DenomUnit>,
    #[serde(default)]
    pub asset_id: Option<AssetId>,
}

/// A value as presented to the wallet holder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "case", rename_all = "snake_case")]
pub enum ValueView {
    KnownAssetId { amount: Amount, metadata: Metadata },
    UnknownAssetId { amount: Amount, asset_id: AssetId },
}

impl ValueView {
    pub fn amount(&self) -> Amount {
        match self {
            Self::KnownAssetId { amount, .. } | Self::UnknownAssetId { amount, .. } => *amount,
        }
    }

    pub fn asset_id(&self) -> Option<AssetId> {
        match self {
            Self::KnownAssetId { metadata, .. } => metadata.asset_id,
            Self::UnknownAssetId { asset_id, .. } => Some(*asset_id),
        }
    }

    /// Display denomination used for pattern matching and presentation.
    ///
    /// Unknown assets fall back to their Bech32m asset id; known assets use
    /// the display denom, then the Bech32m asset id, then `"unknown"`.
    pub fn display_denom(&self) -> String {
        match self {
            Self::UnknownAssetId { asset_id, .. } => asset_id.to_bech32m(),
            Self::KnownAssetId { metadata, .. } => {
                if !metadata.display.is_empty() {
                    metadata.display.clone()
                } else if let Some(asset_id) = metadata.asset_id {
                    asset_id.to_bech32m()
                } else {
                    "unknown".to_string()
                }
            }
        }
    }
}
