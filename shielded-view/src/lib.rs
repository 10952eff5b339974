//! shielded-view
//!
//! Local wallet query-and-build engine. Given a locally synchronized view of
//! a wallet's shielded state it:
//!
//! - witnesses and builds transactions from plans, streaming progress
//!   ([`pipeline`]);
//! - guards authorization so a plan cannot redirect swap outputs to an
//!   address the wallet does not control ([`guard`], [`custody`]);
//! - discovers the Dutch auctions the wallet holds, joining balances with
//!   the local auction index and live chain state ([`auction`]).
//!
//! Storage, chain queries and building are collaborators behind traits
//! ([`store::ViewStore`], [`store::BalanceSource`],
//! [`query::AuctionQuerier`], [`build::TransactionBuilder`]) and are passed
//! in explicitly through [`service::ViewService`].

mod bytes;

pub mod asset;
pub mod auction;
pub mod authorization;
pub mod build;
pub mod config;
pub mod custody;
pub mod denom;
pub mod error;
pub mod guard;
pub mod keys;
pub mod pipeline;
pub mod plan;
pub mod query;
pub mod service;
pub mod store;
pub mod tree;
pub mod witness;

pub use auction::{AuctionDiscovery, AuctionId, AuctionsRequest, AuctionsResponse};
pub use authorization::AuthorizationData;
pub use build::{BuildStatus, OptimisticBuilder, Transaction, TransactionBuilder};
pub use config::EngineConfig;
pub use custody::{AuthorizeRequest, Custody, Ed25519SpendAuthority, SpendAuthority};
pub use error::{ErrorCode, Result, ViewError};
pub use guard::assert_valid_authorize_request;
pub use keys::{Address, AddressIndex, AddressOwnership, FullViewingKey};
pub use pipeline::WitnessAndBuild;
pub use plan::TransactionPlan;
pub use service::{Collaborators, ViewService};
pub use store::{MemoryStore, ViewStore};
pub use tree::{Anchor, NoteCommitment, StateCommitmentTree};
pub use witness::{get_witness, WitnessData};
