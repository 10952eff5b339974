//! Viewing keys, addresses, and the address-ownership capability.
//!
//! Key derivation itself is not this crate's concern: a [`FullViewingKey`] is
//! an opaque 32-byte capability from which addresses are derived
//! deterministically. Everything that needs to know "is this address mine?"
//! takes an [`AddressOwnership`] instead of a concrete key type.

use serde::{Deserialize, Serialize};

use crate::bytes::{hash_with_domain, hex_newtype};
use crate::tree::{NoteCommitment, Position};

const DIVERSIFIER_DOMAIN: &[u8] = b"shielded_view_diversifier_v1";
const TRANSMISSION_DOMAIN: &[u8] = b"shielded_view_transmission_key_v1";
const NULLIFIER_DOMAIN: &[u8] = b"shielded_view_nullifier_v1";

hex_newtype!(
    /// Full viewing key: detects the holder's notes without spend authority.
    FullViewingKey,
    32
);

hex_newtype!(
    /// Revealed when a note is spent.
    Nullifier,
    32
);

/// Index of an address within a wallet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressIndex {
    pub account: u32,
    /// Non-zero for one-time (ephemeral) addresses.
    #[serde(default)]
    pub randomizer: [u8; 12],
}

impl AddressIndex {
    pub fn account(account: u32) -> Self {
        Self {
            account,
            randomizer: [0u8; 12],
        }
    }

    fn to_bytes(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..4].copy_from_slice(&self.account.to_le_bytes());
        out[4..].copy_from_slice(&self.randomizer);
        out
    }

    fn from_bytes(bytes: &[u8; 16]) -> Self {
        let mut account = [0u8; 4];
        account.copy_from_slice(&bytes[..4]);
        let mut randomizer = [0u8; 12];
        randomizer.copy_from_slice(&bytes[4..]);
        Self {
            account: u32::from_le_bytes(account),
            randomizer,
        }
    }
}

/// A shielded payment address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub diversifier: [u8; 16],
    pub transmission_key: [u8; 32],
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({self})")
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}…{}",
            hex::encode(&self.diversifier[..4]),
            hex::encode(&self.transmission_key[28..])
        )
    }
}

impl FullViewingKey {
    /// Derive the payment address for `index`.
    pub fn payment_address(&self, index: AddressIndex) -> Address {
        let diversifier = self.encrypt_index(index.to_bytes());
        Address {
            diversifier,
            transmission_key: self.transmission_key(&diversifier),
        }
    }

    /// Recover the index behind `address` if it was derived from this key.
    pub fn address_index(&self, address: &Address) -> Option<AddressIndex> {
        if address.transmission_key != self.transmission_key(&address.diversifier) {
            return None;
        }
        Some(AddressIndex::from_bytes(&self.decrypt_diversifier(
            &address.diversifier,
        )))
    }

    /// Whether `address` is controlled by this key.
    pub fn is_controlled_address(&self, address: &Address) -> bool {
        self.address_index(address).is_some()
    }

    /// Nullifier for the note at `position` with `commitment`.
    pub fn derive_nullifier(&self, position: Position, commitment: &NoteCommitment) -> Nullifier {
        Nullifier(hash_with_domain(
            NULLIFIER_DOMAIN,
            &[&self.0, &position.to_le_bytes(), commitment.as_bytes()],
        ))
    }

    fn transmission_key(&self, diversifier: &[u8; 16]) -> [u8; 32] {
        hash_with_domain(TRANSMISSION_DOMAIN, &[&self.0, diversifier])
    }

    /// Diversifiers are the index XORed with a key-bound pad, so the key
    /// holder can invert them while outsiders see unlinkable bytes.
    fn encrypt_index(&self, index: [u8; 16]) -> [u8; 16] {
        let pad = self.diversifier_pad();
        let mut out = [0u8; 16];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = index[i] ^ pad[i];
        }
        out
    }

    fn decrypt_diversifier(&self, diversifier: &[u8; 16]) -> [u8; 16] {
        self.encrypt_index(*diversifier)
    }

    fn diversifier_pad(&self) -> [u8; 16] {
        let full = hash_with_domain(DIVERSIFIER_DOMAIN, &[&self.0]);
        let mut pad = [0u8; 16];
        pad.copy_from_slice(&full[..16]);
        pad
    }
}

/// The `(address) -> bool` ownership test, bound to one viewing key.
///
/// Used transiently while evaluating a plan; never persisted.
pub trait AddressOwnership {
    fn is_controlled(&self, address: &Address) -> bool;
}

impl AddressOwnership for FullViewingKey {
    fn is_controlled(&self, address: &Address) -> bool {
        self.is_controlled_address(address)
    }
}

impl<F> AddressOwnership for F
where
    F: Fn(&Address) -> bool,
{
    fn is_controlled(&self, address: &Address) -> bool {
        self(address)
    }
}
