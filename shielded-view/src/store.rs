//! Local indexed store.
//!
//! The store is an external collaborator: a synchronization process writes
//! to it, the engine only reads. [`ViewStore`] and [`BalanceSource`] are the
//! seams; [`MemoryStore`] implements both in memory for tests and for the
//! command-line tool.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::asset::{AssetId, Metadata, ValueView};
use crate::auction::{AuctionId, AuctionRecord, OutstandingReserves};
use crate::denom::customize_symbol;
use crate::error::StoreError;
use crate::keys::{AddressIndex, Nullifier};
use crate::plan::Note;
use crate::tree::{Anchor, NoteCommitment, Position, StateCommitmentTree, DEFAULT_TREE_DEPTH};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A note the wallet can spend (or has spent).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendableNoteRecord {
    pub note_commitment: NoteCommitment,
    pub note: Note,
    pub address_index: AddressIndex,
    pub nullifier: Nullifier,
    pub height_created: u64,
    #[serde(default)]
    pub height_spent: Option<u64>,
    pub position: Position,
}

/// Aggregate balance of one asset in one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub account_address: AddressIndex,
    pub balance_view: ValueView,
}

/// Change notifications published by a store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    CommitmentAppended { position: Position, anchor: Anchor },
    NoteAdded(NoteCommitment),
    AuctionUpdated(AuctionId),
    ReservesUpdated(AuctionId),
}

/// Typed `get`/`put`/`subscribe` access to the local index.
#[async_trait]
pub trait ViewStore: Send + Sync {
    /// Immutable snapshot of the state commitment tree.
    async fn state_commitment_tree(&self) -> Result<Arc<StateCommitmentTree>, StoreError>;

    /// Current tree root, without taking a full snapshot.
    async fn current_anchor(&self) -> Result<Anchor, StoreError>;

    async fn auction(&self, id: &AuctionId) -> Result<Option<AuctionRecord>, StoreError>;

    async fn auction_outstanding_reserves(
        &self,
        id: &AuctionId,
    ) -> Result<Option<OutstandingReserves>, StoreError>;

    async fn spendable_note_by_commitment(
        &self,
        commitment: &NoteCommitment,
    ) -> Result<Option<SpendableNoteRecord>, StoreError>;

    async fn put_auction(&self, id: AuctionId, record: AuctionRecord) -> Result<(), StoreError>;

    async fn put_outstanding_reserves(
        &self,
        id: AuctionId,
        reserves: OutstandingReserves,
    ) -> Result<(), StoreError>;

    async fn put_spendable_note(&self, record: SpendableNoteRecord) -> Result<(), StoreError>;

    async fn append_commitment(&self, commitment: NoteCommitment) -> Result<Position, StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

/// Lazy enumeration of balances over locally indexed notes.
pub trait BalanceSource: Send + Sync {
    fn balances(
        &self,
        account_filter: Option<AddressIndex>,
    ) -> BoxStream<'_, Result<BalanceRecord, StoreError>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Inner {
    tree: Arc<StateCommitmentTree>,
    assets: HashMap<AssetId, Metadata>,
    /// Notes in insertion order; balances are reported in this order.
    notes: Vec<SpendableNoteRecord>,
    note_index: HashMap<NoteCommitment, usize>,
    auctions: HashMap<AuctionId, AuctionRecord>,
    reserves: HashMap<AuctionId, OutstandingReserves>,
}

/// In-memory [`ViewStore`] and [`BalanceSource`].
pub struct MemoryStore {
    inner: RwLock<Inner>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_TREE_DEPTH)
    }
}

impl MemoryStore {
    pub fn new(tree_depth: u8) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: RwLock::new(Inner {
                tree: Arc::new(StateCommitmentTree::new(tree_depth)),
                ..Default::default()
            }),
            events,
        }
    }

    /// Build a store from a serialized wallet snapshot.
    pub async fn from_snapshot(snapshot: WalletSnapshot) -> Result<Self, StoreError> {
        let store = Self::new(snapshot.tree_depth.unwrap_or(DEFAULT_TREE_DEPTH));
        for metadata in snapshot.assets {
            store.put_asset(metadata).await;
        }
        for commitment in snapshot.commitments {
            store.append_commitment(commitment).await?;
        }
        for mut record in snapshot.notes {
            record.position = store.append_commitment(record.note_commitment).await?;
            store.put_spendable_note(record).await?;
        }
        for entry in snapshot.auctions {
            if let Some(reserves) = entry.outstanding_reserves {
                store.put_outstanding_reserves(entry.id, reserves).await?;
            }
            store.put_auction(entry.id, entry.record).await?;
        }
        Ok(store)
    }

    /// Register metadata so balances in this asset render as known assets.
    pub async fn put_asset(&self, metadata: Metadata) {
        let metadata = customize_symbol(metadata);
        if let Some(asset_id) = metadata.asset_id {
            self.inner.write().await.assets.insert(asset_id, metadata);
        }
    }

    fn publish(&self, event: StoreEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl ViewStore for MemoryStore {
    async fn state_commitment_tree(&self) -> Result<Arc<StateCommitmentTree>, StoreError> {
        Ok(Arc::clone(&self.inner.read().await.tree))
    }

    async fn current_anchor(&self) -> Result<Anchor, StoreError> {
        Ok(self.inner.read().await.tree.root())
    }

    async fn auction(&self, id: &AuctionId) -> Result<Option<AuctionRecord>, StoreError> {
        Ok(self.inner.read().await.auctions.get(id).cloned())
    }

    async fn auction_outstanding_reserves(
        &self,
        id: &AuctionId,
    ) -> Result<Option<OutstandingReserves>, StoreError> {
        Ok(self.inner.read().await.reserves.get(id).copied())
    }

    async fn spendable_note_by_commitment(
        &self,
        commitment: &NoteCommitment,
    ) -> Result<Option<SpendableNoteRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .note_index
            .get(commitment)
            .and_then(|i| inner.notes.get(*i))
            .cloned())
    }

    async fn put_auction(&self, id: AuctionId, record: AuctionRecord) -> Result<(), StoreError> {
        self.inner.write().await.auctions.insert(id, record);
        self.publish(StoreEvent::AuctionUpdated(id));
        Ok(())
    }

    async fn put_outstanding_reserves(
        &self,
        id: AuctionId,
        reserves: OutstandingReserves,
    ) -> Result<(), StoreError> {
        self.inner.write().await.reserves.insert(id, reserves);
        self.publish(StoreEvent::ReservesUpdated(id));
        Ok(())
    }

    async fn put_spendable_note(&self, record: SpendableNoteRecord) -> Result<(), StoreError> {
        let commitment = record.note_commitment;
        {
            let mut inner = self.inner.write().await;
            match inner.note_index.get(&commitment).copied() {
                Some(i) => inner.notes[i] = record,
                None => {
                    let i = inner.notes.len();
                    inner.notes.push(record);
                    inner.note_index.insert(commitment, i);
                }
            }
        }
        self.publish(StoreEvent::NoteAdded(commitment));
        Ok(())
    }

    async fn append_commitment(&self, commitment: NoteCommitment) -> Result<Position, StoreError> {
        let (position, anchor) = {
            let mut inner = self.inner.write().await;
            // Snapshots handed out earlier keep the old tree.
            let tree = Arc::make_mut(&mut inner.tree);
            let position = tree.append(commitment)?;
            (position, tree.root())
        };
        debug!(position, %anchor, "state commitment tree advanced");
        self.publish(StoreEvent::CommitmentAppended { position, anchor });
        Ok(position)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

impl BalanceSource for MemoryStore {
    fn balances(
        &self,
        account_filter: Option<AddressIndex>,
    ) -> BoxStream<'_, Result<BalanceRecord, StoreError>> {
        stream::once(async move {
            let inner = self.inner.read().await;
            let records = aggregate_balances(&inner, account_filter);
            stream::iter(records.into_iter().map(Ok))
        })
        .flatten()
        .boxed()
    }
}

/// Sum unspent notes per (account, asset), in order of first appearance.
fn aggregate_balances(inner: &Inner, account_filter: Option<AddressIndex>) -> Vec<BalanceRecord> {
    let mut order: Vec<(u32, AssetId)> = Vec::new();
    let mut totals: HashMap<(u32, AssetId), u128> = HashMap::new();

    let unspent = inner.notes.iter().filter(|n| n.height_spent.is_none());
    for record in unspent {
        let account = record.address_index.account;
        if account_filter.is_some_and(|f| f.account != account) {
            continue;
        }
        let key = (account, record.note.value.asset_id);
        let total = totals.entry(key).or_insert_with(|| {
            order.push(key);
            0
        });
        *total = total.saturating_add(record.note.value.amount);
    }

    order
        .into_iter()
        .map(|key @ (account, asset_id)| {
            let amount = totals.get(&key).copied().unwrap_or_default();
            let balance_view = match inner.assets.get(&asset_id) {
                Some(metadata) => ValueView::KnownAssetId {
                    amount,
                    metadata: metadata.clone(),
                },
                None => ValueView::UnknownAssetId { amount, asset_id },
            };
            BalanceRecord {
                account_address: AddressIndex::account(account),
                balance_view,
            }
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// SNAPSHOT FILE FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// Serialized wallet state loaded by the command-line tool.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WalletSnapshot {
    #[serde(default)]
    pub tree_depth: Option<u8>,
    #[serde(default)]
    pub assets: Vec<Metadata>,
    /// Leaves appended before any wallet note, in order.
    #[serde(default)]
    pub commitments: Vec<NoteCommitment>,
    #[serde(default)]
    pub notes: Vec<SpendableNoteRecord>,
    #[serde(default)]
    pub auctions: Vec<AuctionEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuctionEntry {
    pub id: AuctionId,
    #[serde(flatten)]
    pub record: AuctionRecord,
    #[serde(default)]
    pub outstanding_reserves: Option<OutstandingReserves>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Value;
    use crate::keys::FullViewingKey;
    use futures::TryStreamExt;

    fn record(fvk: &FullViewingKey, account: u32, asset: u8, amount: u128, n: u8) -> SpendableNoteRecord {
        let note = Note {
            value: Value {
                amount,
                asset_id: AssetId([asset; 32]),
            },
            address: fvk.payment_address(AddressIndex::account(account)),
            rseed: [n; 32],
        };
        let note_commitment = note.commit();
        SpendableNoteRecord {
            note_commitment,
            nullifier: fvk.derive_nullifier(0, &note_commitment),
            note,
            address_index: AddressIndex::account(account),
            height_created: 1,
            height_spent: None,
            position: 0,
        }
    }

    #[tokio::test]
    async fn snapshots_are_isolated_from_later_appends() {
        let store = MemoryStore::new(8);
        store.append_commitment(NoteCommitment([1u8; 32])).await.unwrap();
        let snapshot = store.state_commitment_tree().await.unwrap();
        store.append_commitment(NoteCommitment([2u8; 32])).await.unwrap();

        assert_eq!(snapshot.size(), 1);
        assert_ne!(snapshot.root(), store.current_anchor().await.unwrap());
    }

    #[tokio::test]
    async fn subscribers_see_appends() {
        let store = MemoryStore::new(8);
        let mut events = store.subscribe();
        store.append_commitment(NoteCommitment([1u8; 32])).await.unwrap();
        match events.recv().await.unwrap() {
            StoreEvent::CommitmentAppended { position, .. } => assert_eq!(position, 0),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn balances_aggregate_unspent_notes_in_first_seen_order() {
        let fvk = FullViewingKey([1u8; 32]);
        let store = MemoryStore::new(8);
        store.put_spendable_note(record(&fvk, 0, 9, 5, 1)).await.unwrap();
        store.put_spendable_note(record(&fvk, 0, 3, 7, 2)).await.unwrap();
        store.put_spendable_note(record(&fvk, 0, 9, 6, 3)).await.unwrap();
        let mut spent = record(&fvk, 0, 3, 100, 4);
        spent.height_spent = Some(2);
        store.put_spendable_note(spent).await.unwrap();
        store.put_spendable_note(record(&fvk, 1, 3, 1, 5)).await.unwrap();

        let all: Vec<_> = store.balances(None).try_collect().await.unwrap();
        let amounts: Vec<_> = all
            .iter()
            .map(|b| (b.account_address.account, b.balance_view.amount()))
            .collect();
        assert_eq!(amounts, vec![(0, 11), (0, 7), (1, 1)]);

        let filtered: Vec<_> = store
            .balances(Some(AddressIndex::account(1)))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn known_assets_render_with_metadata() {
        let fvk = FullViewingKey([1u8; 32]);
        let store = MemoryStore::new(8);
        store
            .put_asset(Metadata {
                base: "upenumbra".into(),
                display: "penumbra".into(),
                asset_id: Some(AssetId([9u8; 32])),
                ..Default::default()
            })
            .await;
        store.put_spendable_note(record(&fvk, 0, 9, 5, 1)).await.unwrap();
        let all: Vec<_> = store.balances(None).try_collect().await.unwrap();
        assert_eq!(all[0].balance_view.display_denom(), "penumbra");
    }

    #[tokio::test]
    async fn synthetic_assets_get_symbols_on_registration() {
        let fvk = FullViewingKey([1u8; 32]);
        let store = MemoryStore::new(8);
        store
            .put_asset(Metadata {
                base: "uvoted_on_12".into(),
                display: "uvoted_on_12".into(),
                asset_id: Some(AssetId([9u8; 32])),
                ..Default::default()
            })
            .await;
        store.put_spendable_note(record(&fvk, 0, 9, 1, 1)).await.unwrap();
        let all: Vec<_> = store.balances(None).try_collect().await.unwrap();
        match &all[0].balance_view {
            ValueView::KnownAssetId { metadata, .. } => assert_eq!(metadata.symbol, "VotedOn12"),
            other => panic!("expected known asset, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn snapshot_loading_assigns_tree_positions() {
        let fvk = FullViewingKey([1u8; 32]);
        let note = record(&fvk, 0, 9, 5, 1);
        let commitment = note.note_commitment;
        let snapshot = WalletSnapshot {
            commitments: vec![NoteCommitment([7u8; 32])],
            notes: vec![note],
            ..Default::default()
        };
        let store = MemoryStore::from_snapshot(snapshot).await.unwrap();
        let loaded = store
            .spendable_note_by_commitment(&commitment)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.position, 1);
    }
}
