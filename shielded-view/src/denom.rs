//! Synthetic denominations.
//!
//! Several positions are represented in the balance set by synthetic
//! denominations that embed an identifier: auction NFTs, liquidity-position
//! NFTs, delegation and unbonding tokens, and voting receipts. This module
//! recognizes them and derives display symbols for them.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::error;

use crate::asset::Metadata;

static UNBONDING_TOKEN: Lazy<Option<Regex>> = Lazy::new(|| {
    compile("^uunbonding_(?P<data>start_at_(?P<start>[0-9]+)_(?P<validator>penumbravalid1(?P<id>[a-zA-HJ-NP-Z0-9]+)))$")
});

static DELEGATION_TOKEN: Lazy<Option<Regex>> = Lazy::new(|| {
    compile("^udelegation_(?P<data>penumbravalid1(?P<id>[a-zA-HJ-NP-Z0-9]+))$")
});

static AUCTION_NFT: Lazy<Option<Regex>> = Lazy::new(|| {
    compile("^auctionnft_(?P<data>(?P<seq_num>[a-z_0-9]+)_(?P<auction_id>pauctid1(?P<id>[a-zA-HJ-NP-Z0-9]+)))$")
});

static VOTING_RECEIPT: Lazy<Option<Regex>> = Lazy::new(|| {
    compile("^uvoted_on_(?P<data>(?P<proposal_id>[0-9]+))$")
});

static LP_NFT: Lazy<Option<Regex>> = Lazy::new(|| {
    compile("^lpnft_(?P<lp_state>[a-z_0-9]+)_plpid1(?P<id>[a-zA-HJ-NP-Z0-9]+)$")
});

/// Patterns are literals; a failure here is logged and the pattern then
/// matches nothing.
fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern)
        .map_err(|err| error!(pattern, %err, "denomination pattern failed to compile"))
        .ok()
}

fn captures<'d>(pattern: &Lazy<Option<Regex>>, denom: &'d str) -> Option<Captures<'d>> {
    pattern.as_ref()?.captures(denom)
}

/// A denomination recognized as one of the synthetic patterns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetPattern {
    /// `auctionnft_<seq>_pauctid1…`
    AuctionNft {
        seq_num: String,
        /// Full Bech32m auction id, prefix included.
        auction_id: String,
        /// Bech32m data part only.
        id: String,
    },
    /// `lpnft_<state>_plpid1…`
    LpNft { state: String, id: String },
    /// `udelegation_penumbravalid1…`
    Delegation { id: String },
    /// `uunbonding_start_at_<height>_penumbravalid1…`
    Unbonding { start_at: String, id: String },
    /// `uvoted_on_<proposal>`
    VotingReceipt { proposal_id: String },
}

impl AssetPattern {
    /// Classify `denom`, returning `None` for ordinary denominations.
    pub fn classify(denom: &str) -> Option<Self> {
        if let Some(c) = captures(&AUCTION_NFT, denom) {
            return Some(Self::AuctionNft {
                seq_num: group(&c, "seq_num"),
                auction_id: group(&c, "auction_id"),
                id: group(&c, "id"),
            });
        }
        if let Some(c) = captures(&LP_NFT, denom) {
            return Some(Self::LpNft {
                state: group(&c, "lp_state"),
                id: group(&c, "id"),
            });
        }
        if let Some(c) = captures(&DELEGATION_TOKEN, denom) {
            return Some(Self::Delegation { id: group(&c, "id") });
        }
        if let Some(c) = captures(&UNBONDING_TOKEN, denom) {
            return Some(Self::Unbonding {
                start_at: group(&c, "start"),
                id: group(&c, "id"),
            });
        }
        if let Some(c) = captures(&VOTING_RECEIPT, denom) {
            return Some(Self::VotingReceipt {
                proposal_id: group(&c, "proposal_id"),
            });
        }
        None
    }

    /// The full Bech32m auction id if `denom` is an auction NFT.
    pub fn auction_id(denom: &str) -> Option<String> {
        captures(&AUCTION_NFT, denom).map(|c| group(&c, "auction_id"))
    }

    fn symbol(&self) -> String {
        match self {
            Self::AuctionNft { seq_num, id, .. } => format!("auction@{seq_num}({id})"),
            Self::LpNft { state, id } => format!("lpNft:{state}({id})"),
            Self::Delegation { id } => format!("delUM({id})"),
            Self::Unbonding { start_at, id } => format!("unbondUMat{start_at}({id})"),
            Self::VotingReceipt { proposal_id } => format!("VotedOn{proposal_id}"),
        }
    }
}

fn group(captures: &Captures<'_>, name: &str) -> String {
    captures
        .name(name)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Fill in a symbol for synthetic denominations, which carry none of their
/// own. Other metadata is returned unchanged.
pub fn customize_symbol(metadata: Metadata) -> Metadata {
    match AssetPattern::classify(&metadata.base) {
        Some(pattern) => Metadata {
            symbol: pattern.symbol(),
            ..metadata
        },
        None => metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::DenomUnit;

    fn metadata_for(display_denom: &str, base_is_display: bool) -> Metadata {
        let base = if base_is_display {
            display_denom.to_string()
        } else {
            format!("u{display_denom}")
        };
        let mut denom_units = vec![DenomUnit {
            denom: base.clone(),
            exponent: 0,
            aliases: Vec::new(),
        }];
        if !base_is_display {
            denom_units.push(DenomUnit {
                denom: display_denom.to_string(),
                exponent: 6,
                aliases: Vec::new(),
            });
        }
        Metadata {
            base,
            display: display_denom.to_string(),
            denom_units,
            ..Default::default()
        }
    }

    #[test]
    fn every_pattern_compiles() {
        for pattern in [
            &UNBONDING_TOKEN,
            &DELEGATION_TOKEN,
            &AUCTION_NFT,
            &VOTING_RECEIPT,
            &LP_NFT,
        ] {
            assert!(pattern.is_some());
        }
    }

    #[test]
    fn leaves_ordinary_metadata_alone() {
        let metadata = Metadata {
            symbol: "UM".into(),
            ..metadata_for("penumbra", false)
        };
        assert_eq!(customize_symbol(metadata.clone()), metadata);
    }

    #[test]
    fn unbonding_token_symbol() {
        let m = customize_symbol(metadata_for(
            "unbonding_start_at_1234_penumbravalid1abcdef123456",
            false,
        ));
        assert_eq!(m.symbol, "unbondUMat1234(abcdef123456)");
    }

    #[test]
    fn delegation_token_symbol() {
        let m = customize_symbol(metadata_for("delegation_penumbravalid1abcdef123456", false));
        assert_eq!(m.symbol, "delUM(abcdef123456)");
    }

    #[test]
    fn auction_nft_symbol_carries_seq_num() {
        let m = customize_symbol(metadata_for(
            "auctionnft_0_pauctid1jqyupqnzznyfpq940mv0ac33pyx77s7af3kgdw4nstjmp3567dks8n5amh",
            true,
        ));
        assert_eq!(
            m.symbol,
            "auction@0(jqyupqnzznyfpq940mv0ac33pyx77s7af3kgdw4nstjmp3567dks8n5amh)"
        );

        let m = customize_symbol(metadata_for(
            "auctionnft_123_pauctid1jqyupqnzznyfpq940mv0ac33pyx77s7af3kgdw4nstjmp3567dks8n5amh",
            true,
        ));
        assert_eq!(
            m.symbol,
            "auction@123(jqyupqnzznyfpq940mv0ac33pyx77s7af3kgdw4nstjmp3567dks8n5amh)"
        );
    }

    #[test]
    fn voting_receipt_symbol() {
        let m = customize_symbol(metadata_for("voted_on_234", false));
        assert_eq!(m.symbol, "VotedOn234");
    }

    #[test]
    fn lp_nft_symbols() {
        let cases = [
            (
                "lpnft_opened_plpid1pae7ssx6uwct9srws9uxznp7n087me8j9jvpmf5tve8fjupky4rqspvcd5",
                "lpNft:opened(pae7ssx6uwct9srws9uxznp7n087me8j9jvpmf5tve8fjupky4rqspvcd5)",
            ),
            (
                "lpnft_withdrawn_0_plpid1pae7ssx6uwct9srws9uxznp7n087me8j9jvpmf5tve8fjupky4rqspvcd5",
                "lpNft:withdrawn_0(pae7ssx6uwct9srws9uxznp7n087me8j9jvpmf5tve8fjupky4rqspvcd5)",
            ),
        ];
        for (denom, symbol) in cases {
            assert_eq!(customize_symbol(metadata_for(denom, true)).symbol, symbol);
        }
    }

    #[test]
    fn auction_id_capture_includes_prefix() {
        let denom = "auctionnft_7_pauctid1jqyupqnzznyfpq940mv0ac33pyx77s7af3kgdw4nstjmp3567dks8n5amh";
        assert_eq!(
            AssetPattern::auction_id(denom).as_deref(),
            Some("pauctid1jqyupqnzznyfpq940mv0ac33pyx77s7af3kgdw4nstjmp3567dks8n5amh")
        );
        assert_eq!(AssetPattern::auction_id("upenumbra"), None);
    }
}
