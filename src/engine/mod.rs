mod bid_reply_api;
mod bid_request_api;
mod cache;
mod refund_api;
mod refund_desk;
mod session_api;
mod wallet_api;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use oso::Oso;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::{
    api::API,
    auth::{authorizor, Session},
    backend::Backend,
    config::EngineConfig,
    entities::{BidReply, BidRequest, Wallet},
    error::Error,
};

use cache::{Snapshot, Ticket};
pub use cache::{Flight, Mutation, MutationState, SessionCache};
pub use refund_desk::RefundDesk;

type SharedCache = Arc<Mutex<SessionCache>>;

/// A mutation whose optimistic change is applied and whose backend call has
/// not answered yet. Dropping it unsettled abandons the mutation.
struct OpenMutation {
    cache: SharedCache,
    ticket: Ticket,
    settled: bool,
}

impl OpenMutation {
    fn new(cache: &SharedCache, ticket: Ticket) -> Self {
        Self {
            cache: cache.clone(),
            ticket,
            settled: false,
        }
    }

    /// Hands the ticket back for `confirm` or `fail`.
    fn settle(mut self) -> Ticket {
        self.settled = true;
        self.ticket
    }
}

impl Drop for OpenMutation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let ticket = self.ticket;

        if let Ok(mut cache) = self.cache.try_lock() {
            cache.abandon(ticket);
            return;
        }

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let cache = self.cache.clone();
            runtime.spawn(async move {
                cache.lock().await.abandon(ticket);
            });
        }
    }
}

pub struct Engine {
    backend: Arc<dyn Backend>,
    authorizor: Oso,
    config: EngineConfig,
    sessions: RwLock<HashMap<String, Snapshot<Session>>>,
    caches: RwLock<HashMap<Uuid, SharedCache>>,
    refunds: Mutex<RefundDesk>,
}

impl Engine {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub fn new(backend: Arc<dyn Backend>, config: EngineConfig) -> Result<Self, Error> {
        Ok(Self {
            backend,
            authorizor: authorizor::new()?,
            config,
            sessions: RwLock::new(HashMap::new()),
            caches: RwLock::new(HashMap::new()),
            refunds: Mutex::new(RefundDesk::default()),
        })
    }

    pub fn authorize<Actor, Action, Resource>(
        &self,
        actor: Actor,
        action: Action,
        resource: Resource,
        denial: &str,
    ) -> Result<(), Error>
    where
        Actor: oso::ToPolar,
        Action: oso::ToPolar,
        Resource: oso::ToPolar,
    {
        if self.authorizor.is_allowed(actor, action, resource)? {
            return Ok(());
        }

        Err(Error::forbidden_error(denial))
    }

    async fn cache(&self, session: &Session) -> SharedCache {
        if let Some(cache) = self.caches.read().await.get(&session.user.id) {
            return cache.clone();
        }

        self.caches
            .write()
            .await
            .entry(session.user.id)
            .or_default()
            .clone()
    }

    /// Mutation history for the session's user, newest last.
    pub async fn mutations(&self, session: &Session) -> Vec<Mutation> {
        self.cache(session).await.lock().await.mutations().to_vec()
    }

    async fn fetch_wallet(&self, session: &Session, cache: &SharedCache) -> Result<Wallet, Error> {
        let wallet = self
            .backend
            .fetch_wallet(&session.user)
            .await
            .map_err(remote_failure("fetch_wallet"))?
            .unwrap_or_default();

        cache.lock().await.store_wallet(wallet.clone());

        Ok(wallet)
    }

    /// Cached wallet when fresh, otherwise refetched.
    async fn load_wallet(&self, session: &Session, cache: &SharedCache) -> Result<Wallet, Error> {
        if let Some(wallet) = cache.lock().await.fresh_wallet(self.config.cache_max_age) {
            return Ok(wallet.clone());
        }

        self.fetch_wallet(session, cache).await
    }

    async fn fetch_my_bids(
        &self,
        session: &Session,
        cache: &SharedCache,
    ) -> Result<Vec<BidReply>, Error> {
        let bids = self
            .backend
            .fetch_replies_by_garage(&session.user)
            .await
            .map_err(remote_failure("fetch_replies_by_garage"))?;

        cache.lock().await.store_my_bids(bids.clone());

        Ok(bids)
    }

    async fn load_my_bids(
        &self,
        session: &Session,
        cache: &SharedCache,
    ) -> Result<Vec<BidReply>, Error> {
        if let Some(bids) = cache.lock().await.fresh_my_bids(self.config.cache_max_age) {
            return Ok(bids.clone());
        }

        self.fetch_my_bids(session, cache).await
    }

    async fn fetch_my_requests(
        &self,
        session: &Session,
        cache: &SharedCache,
    ) -> Result<Vec<BidRequest>, Error> {
        let mut requests = self
            .backend
            .fetch_requests_by_owner(&session.user)
            .await
            .map_err(remote_failure("fetch_requests_by_owner"))?;

        let mut cache = cache.lock().await;

        // display ids only exist locally, carry them over
        if let Some(known) = cache.my_requests() {
            for request in requests.iter_mut() {
                if let Some(previous) = known.iter().find(|r| r.id == request.id) {
                    request.display_id = previous.display_id.clone();
                }
            }
        }

        cache.store_my_requests(requests.clone());

        Ok(requests)
    }

    async fn load_my_requests(
        &self,
        session: &Session,
        cache: &SharedCache,
    ) -> Result<Vec<BidRequest>, Error> {
        if let Some(requests) = cache
            .lock()
            .await
            .fresh_my_requests(self.config.cache_max_age)
        {
            return Ok(requests.clone());
        }

        self.fetch_my_requests(session, cache).await
    }

    async fn fetch_request(&self, session: &Session, id: Uuid) -> Result<BidRequest, Error> {
        self.backend
            .fetch_request(&session.user, id)
            .await
            .map_err(remote_failure("fetch_request"))?
            .ok_or_else(|| Error::not_found_error("Bid request not found"))
    }

    async fn fetch_reply(&self, session: &Session, id: Uuid) -> Result<BidReply, Error> {
        self.backend
            .fetch_reply(&session.user, id)
            .await
            .map_err(remote_failure("fetch_reply"))?
            .ok_or_else(|| Error::not_found_error("Bid not found"))
    }
}

/// Logs a failed remote call before handing the error back. Nothing is retried.
fn remote_failure(operation: &'static str) -> impl Fn(Error) -> Error {
    move |err| {
        tracing::error!(operation, %err, "remote call failed");
        err
    }
}

impl API for Engine {}
