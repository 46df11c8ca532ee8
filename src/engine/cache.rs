//! Per-user view of remote state. Snapshots go stale after a fixed age and
//! every refetch bumps the generation, so a failed mutation can tell whether
//! its optimistic change is still the thing on screen.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use uuid::Uuid;

use crate::api::Listing;
use crate::entities::{BidReply, BidRequest, Wallet};
use crate::error::Error;

const MUTATION_HISTORY: usize = 64;

#[derive(Clone, Debug)]
pub struct Snapshot<T> {
    pub value: T,
    pub fetched_at: Instant,
}

impl<T> Snapshot<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
        }
    }

    pub fn is_fresh(&self, max_age: Duration) -> bool {
        self.fetched_at.elapsed() < max_age
    }
}

fn fresh<T>(slot: &Option<Snapshot<T>>, max_age: Duration) -> Option<&T> {
    slot.as_ref()
        .filter(|snapshot| snapshot.is_fresh(max_age))
        .map(|snapshot| &snapshot.value)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MutationState {
    Pending,
    Confirmed,
    Failed { reason: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct Mutation {
    pub id: u64,
    pub kind: &'static str,
    pub state: MutationState,
}

type Flights = Arc<Mutex<HashSet<Uuid>>>;

fn flights(keys: &Flights) -> MutexGuard<'_, HashSet<Uuid>> {
    keys.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds a key in the in-flight set until dropped. Releasing does not need
/// the cache lock, so a cancelled submission frees its key straight away.
#[derive(Debug)]
pub struct Flight {
    keys: Flights,
    key: Uuid,
}

impl Drop for Flight {
    fn drop(&mut self) {
        flights(&self.keys).remove(&self.key);
    }
}

/// Handle returned when a mutation starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    id: u64,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct SessionCache {
    generation: u64,
    browse: Option<Snapshot<Listing>>,
    my_requests: Option<Snapshot<Vec<BidRequest>>>,
    my_bids: Option<Snapshot<Vec<BidReply>>>,
    replies: HashMap<Uuid, Snapshot<Vec<BidReply>>>,
    wallet: Option<Snapshot<Wallet>>,
    in_flight: Flights,
    mutations: Vec<Mutation>,
    next_mutation: u64,
}

impl SessionCache {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fresh_wallet(&self, max_age: Duration) -> Option<&Wallet> {
        fresh(&self.wallet, max_age)
    }

    pub fn fresh_my_requests(&self, max_age: Duration) -> Option<&Vec<BidRequest>> {
        fresh(&self.my_requests, max_age)
    }

    /// Own requests regardless of age.
    pub fn my_requests(&self) -> Option<&Vec<BidRequest>> {
        self.my_requests.as_ref().map(|snapshot| &snapshot.value)
    }

    pub fn fresh_my_bids(&self, max_age: Duration) -> Option<&Vec<BidReply>> {
        fresh(&self.my_bids, max_age)
    }

    pub fn store_browse(&mut self, listing: Listing) {
        self.browse = Some(Snapshot::new(listing));
        self.generation += 1;
    }

    pub fn store_my_requests(&mut self, requests: Vec<BidRequest>) {
        self.my_requests = Some(Snapshot::new(requests));
        self.generation += 1;
    }

    pub fn store_my_bids(&mut self, bids: Vec<BidReply>) {
        self.my_bids = Some(Snapshot::new(bids));
        self.generation += 1;
    }

    pub fn store_replies(&mut self, request_id: Uuid, replies: Vec<BidReply>) {
        self.replies.insert(request_id, Snapshot::new(replies));
        self.generation += 1;
    }

    pub fn store_wallet(&mut self, wallet: Wallet) {
        self.wallet = Some(Snapshot::new(wallet));
        self.generation += 1;
    }

    /// Drops every snapshot so the next read goes back to the server.
    pub fn invalidate(&mut self) {
        self.browse = None;
        self.my_requests = None;
        self.my_bids = None;
        self.replies.clear();
        self.wallet = None;
        self.generation += 1;
    }

    pub fn wallet_mut(&mut self) -> Option<&mut Wallet> {
        self.wallet.as_mut().map(|snapshot| &mut snapshot.value)
    }

    pub fn my_requests_mut(&mut self) -> Option<&mut Vec<BidRequest>> {
        self.my_requests.as_mut().map(|snapshot| &mut snapshot.value)
    }

    pub fn my_bids_mut(&mut self) -> Option<&mut Vec<BidReply>> {
        self.my_bids.as_mut().map(|snapshot| &mut snapshot.value)
    }

    /// Replies received on one of the user's own requests.
    pub fn received_mut(&mut self, request_id: Uuid) -> Option<&mut Vec<BidReply>> {
        self.replies
            .get_mut(&request_id)
            .map(|snapshot| &mut snapshot.value)
    }

    /// Known copies of a request across the browse and own-request views.
    pub fn requests_mut(&mut self, id: Uuid) -> impl Iterator<Item = &mut BidRequest> {
        let browse = self
            .browse
            .as_mut()
            .map(|snapshot| snapshot.value.requests.iter_mut())
            .into_iter()
            .flatten();
        let mine = self
            .my_requests
            .as_mut()
            .map(|snapshot| snapshot.value.iter_mut())
            .into_iter()
            .flatten();

        browse.chain(mine).filter(move |request| request.id == id)
    }

    /// Known copies of a reply across the own-bids and per-request views.
    pub fn replies_mut(&mut self, id: Uuid) -> impl Iterator<Item = &mut BidReply> {
        let mine = self
            .my_bids
            .as_mut()
            .map(|snapshot| snapshot.value.iter_mut())
            .into_iter()
            .flatten();
        let received = self
            .replies
            .values_mut()
            .flat_map(|snapshot| snapshot.value.iter_mut());

        mine.chain(received).filter(move |reply| reply.id == id)
    }

    pub fn find_request(&self, id: Uuid) -> Option<&BidRequest> {
        let browse = self.browse.iter().flat_map(|s| s.value.requests.iter());
        let mine = self.my_requests.iter().flat_map(|s| s.value.iter());

        browse.chain(mine).find(|request| request.id == id)
    }

    pub fn find_reply(&self, id: Uuid) -> Option<&BidReply> {
        let mine = self.my_bids.iter().flat_map(|s| s.value.iter());
        let received = self.replies.values().flat_map(|s| s.value.iter());

        mine.chain(received).find(|reply| reply.id == id)
    }

    /// Refuses a second submission for `key` while one is outstanding.
    pub fn enter_flight(&self, key: Uuid) -> Result<Flight, Error> {
        if !flights(&self.in_flight).insert(key) {
            tracing::warn!(%key, "submission already in flight");
            return Err(Error::in_flight_error());
        }

        Ok(Flight {
            keys: self.in_flight.clone(),
            key,
        })
    }

    pub fn begin(&mut self, kind: &'static str) -> Ticket {
        self.next_mutation += 1;
        let ticket = Ticket {
            id: self.next_mutation,
            generation: self.generation,
        };

        if self.mutations.len() == MUTATION_HISTORY {
            self.mutations.remove(0);
        }
        self.mutations.push(Mutation {
            id: ticket.id,
            kind,
            state: MutationState::Pending,
        });

        ticket
    }

    pub fn confirm(&mut self, ticket: Ticket) {
        self.settle(ticket, MutationState::Confirmed);
    }

    /// Marks the mutation failed. Returns `true` when the optimistic change
    /// should be rolled back; when a refetch has replaced the snapshots in
    /// the meantime the cache is invalidated instead and `false` is returned.
    pub fn fail(&mut self, ticket: Ticket, reason: impl Into<String>) -> bool {
        self.settle(
            ticket,
            MutationState::Failed {
                reason: reason.into(),
            },
        );

        if self.generation == ticket.generation {
            true
        } else {
            self.invalidate();
            false
        }
    }

    /// The caller went away before the backend answered. Whether the remote
    /// call landed is unknown, so every snapshot is dropped.
    pub fn abandon(&mut self, ticket: Ticket) {
        tracing::warn!(mutation = ticket.id, "mutation abandoned");
        self.settle(
            ticket,
            MutationState::Failed {
                reason: "cancelled".into(),
            },
        );
        self.invalidate();
    }

    fn settle(&mut self, ticket: Ticket, state: MutationState) {
        if let Some(mutation) = self.mutations.iter_mut().find(|m| m.id == ticket.id) {
            mutation.state = state;
        }
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn mutation(&self, ticket: Ticket) -> Option<&Mutation> {
        self.mutations.iter().find(|m| m.id == ticket.id)
    }
}

#[test]
fn staleness_test() {
    let mut cache = SessionCache::default();
    cache.store_wallet(Wallet::default());

    assert!(cache.fresh_wallet(Duration::from_secs(30)).is_some());
    assert!(cache.fresh_wallet(Duration::ZERO).is_none());
}

#[test]
fn store_bumps_generation() {
    let mut cache = SessionCache::default();
    let before = cache.generation();

    cache.store_my_bids(vec![]);
    cache.store_wallet(Wallet::default());

    assert_eq!(cache.generation(), before + 2);
}

#[test]
fn failed_mutation_rolls_back_without_refetch() {
    let mut cache = SessionCache::default();
    cache.store_wallet(Wallet::default());

    let ticket = cache.begin("place_bid");
    assert_eq!(
        cache.mutation(ticket).unwrap().state,
        MutationState::Pending
    );

    assert!(cache.fail(ticket, "network down"));
    assert!(cache.fresh_wallet(Duration::from_secs(30)).is_some());
    assert_eq!(
        cache.mutation(ticket).unwrap().state,
        MutationState::Failed {
            reason: "network down".into()
        }
    );
}

#[test]
fn failed_mutation_after_refetch_invalidates() {
    let mut cache = SessionCache::default();
    cache.store_wallet(Wallet::default());

    let ticket = cache.begin("place_bid");
    cache.store_my_bids(vec![]);

    assert!(!cache.fail(ticket, "conflict"));
    assert!(cache.fresh_wallet(Duration::from_secs(30)).is_none());
    assert!(cache.fresh_my_bids(Duration::from_secs(30)).is_none());
}

#[test]
fn in_flight_guard_test() {
    let cache = SessionCache::default();
    let request_id = Uuid::new_v4();

    let flight = cache.enter_flight(request_id).unwrap();
    assert!(cache
        .enter_flight(request_id)
        .unwrap_err()
        .is_in_flight_error());

    // other requests are unaffected
    assert!(cache.enter_flight(Uuid::new_v4()).is_ok());

    drop(flight);
    assert!(cache.enter_flight(request_id).is_ok());
}

#[test]
fn flight_outlives_invalidate() {
    let mut cache = SessionCache::default();
    let request_id = Uuid::new_v4();

    let _flight = cache.enter_flight(request_id).unwrap();
    cache.invalidate();

    assert!(cache.enter_flight(request_id).is_err());
}

#[test]
fn abandoned_mutation_drops_snapshots() {
    let mut cache = SessionCache::default();
    cache.store_wallet(Wallet::default());

    let ticket = cache.begin("place_bid");
    cache.abandon(ticket);

    assert!(cache.fresh_wallet(Duration::from_secs(30)).is_none());
    assert_eq!(
        cache.mutation(ticket).unwrap().state,
        MutationState::Failed {
            reason: "cancelled".into()
        }
    );
}

#[test]
fn confirm_test() {
    let mut cache = SessionCache::default();
    let ticket = cache.begin("create_bid_request");
    cache.confirm(ticket);

    assert_eq!(cache.mutations().len(), 1);
    assert_eq!(cache.mutations()[0].state, MutationState::Confirmed);
    assert_eq!(cache.mutations()[0].kind, "create_bid_request");
}
