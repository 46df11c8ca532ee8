use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard, Semaphore};
use uuid::Uuid;

use crate::auth::{Role, User};
use crate::backend::Backend;
use crate::entities::{
    BidDraft, BidReply, BidRequest, CheckoutRequest, CheckoutSession, Contact, NewBidRequest,
    RefundRequest, ReplyStatus, TransactionKind, TransactionStatus, Wallet,
    WalletTransaction, BID_COST,
};
use crate::error::Error;

/// Stand-in for the hosted database. Mirrors what the stored procedures do
/// closely enough for the engine to be exercised end to end.
#[derive(Default)]
pub struct State {
    pub users: HashMap<String, User>,
    pub requests: Vec<BidRequest>,
    pub replies: Vec<BidReply>,
    pub wallets: HashMap<Uuid, Wallet>,
    pub transactions: HashMap<Uuid, Vec<WalletTransaction>>,
    pub contacts: HashMap<Uuid, Contact>,
    pub refunds: Vec<RefundRequest>,
    pub checkout: Option<CheckoutSession>,
    pub checkouts: Vec<CheckoutRequest>,
    pub topups: Vec<(Uuid, f64, String)>,
    pub calls: Vec<&'static str>,
    failures: HashMap<&'static str, Error>,
}

impl State {
    fn enter(&mut self, call: &'static str) -> Result<(), Error> {
        self.calls.push(call);
        match self.failures.remove(call) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn calls_to(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    pub fn request_mut(&mut self, id: Uuid) -> Option<&mut BidRequest> {
        self.requests.iter_mut().find(|r| r.id == id)
    }

    pub fn reply_mut(&mut self, id: Uuid) -> Option<&mut BidReply> {
        self.replies.iter_mut().find(|r| r.id == id)
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    reply_gate: Option<Arc<Semaphore>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `reply_to_bid` wait for a permit on `gate` first.
    pub fn with_reply_gate(gate: Arc<Semaphore>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            reply_gate: Some(gate),
        }
    }

    pub async fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().await
    }

    /// The next call named `call` fails with `err`.
    pub async fn fail_on(&self, call: &'static str, err: Error) {
        self.state.lock().await.failures.insert(call, err);
    }

    pub async fn add_user(&self, role: Role, name: &str, phone: Option<&str>) -> User {
        let id = Uuid::new_v4();
        let token = format!("token-{}", id);
        let mut user = User::new(id, role, token.clone());
        user.display_name = Some(name.into());

        let mut state = self.state.lock().await;
        state.users.insert(token, user.clone());
        state.contacts.insert(
            id,
            Contact {
                id,
                name: Some(name.into()),
                phone: phone.map(String::from),
            },
        );

        user
    }

    pub async fn set_balance(&self, user_id: Uuid, balance: f64) {
        let mut state = self.state.lock().await;
        let wallet = state.wallets.entry(user_id).or_default();
        wallet.balance = balance;
    }

    pub async fn insert_request(&self, owner: &User, title: &str) -> BidRequest {
        let new = NewBidRequest {
            title: title.into(),
            description: format!("{} needed", title),
            category: "Engine".into(),
            ..Default::default()
        };
        let mut request = BidRequest::draft(owner.id, &new, String::new());
        request.display_id = None;

        self.state.lock().await.requests.insert(0, request.clone());
        request
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn current_user(&self, access_token: &str) -> Result<User, Error> {
        let mut state = self.state.lock().await;
        state.enter("current_user")?;

        state
            .users
            .get(access_token)
            .cloned()
            .ok_or_else(Error::unauthenticated_error)
    }

    async fn fetch_open_requests(&self, _user: &User) -> Result<Vec<BidRequest>, Error> {
        let mut state = self.state.lock().await;
        state.enter("fetch_open_requests")?;

        Ok(state.requests.iter().filter(|r| r.is_open()).cloned().collect())
    }

    async fn fetch_requests_by_owner(&self, user: &User) -> Result<Vec<BidRequest>, Error> {
        let mut state = self.state.lock().await;
        state.enter("fetch_requests_by_owner")?;

        Ok(state
            .requests
            .iter()
            .filter(|r| r.owner_id == user.id)
            .cloned()
            .collect())
    }

    async fn fetch_request(&self, _user: &User, id: Uuid) -> Result<Option<BidRequest>, Error> {
        let mut state = self.state.lock().await;
        state.enter("fetch_request")?;

        Ok(state.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn create_bid_request(
        &self,
        user: &User,
        new: &NewBidRequest,
    ) -> Result<BidRequest, Error> {
        let mut state = self.state.lock().await;
        state.enter("fn_create_bid_request")?;

        let mut request = BidRequest::draft(user.id, new, String::new());
        request.display_id = None;
        state.requests.insert(0, request.clone());

        Ok(request)
    }

    async fn fetch_replies_by_garage(&self, user: &User) -> Result<Vec<BidReply>, Error> {
        let mut state = self.state.lock().await;
        state.enter("fetch_replies_by_garage")?;

        Ok(state
            .replies
            .iter()
            .filter(|r| r.garage_id == user.id)
            .cloned()
            .collect())
    }

    async fn fetch_replies_for_request(
        &self,
        _user: &User,
        request_id: Uuid,
    ) -> Result<Vec<BidReply>, Error> {
        let mut state = self.state.lock().await;
        state.enter("fetch_replies_for_request")?;

        Ok(state
            .replies
            .iter()
            .filter(|r| r.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn fetch_reply(&self, _user: &User, id: Uuid) -> Result<Option<BidReply>, Error> {
        let mut state = self.state.lock().await;
        state.enter("fetch_reply")?;

        Ok(state.replies.iter().find(|r| r.id == id).cloned())
    }

    async fn reply_to_bid(
        &self,
        user: &User,
        request_id: Uuid,
        draft: &BidDraft,
    ) -> Result<BidReply, Error> {
        if let Some(gate) = &self.reply_gate {
            gate.acquire()
                .await
                .map_err(|_| Error::unexpected_error())?
                .forget();
        }

        let mut state = self.state.lock().await;
        state.enter("fn_reply_to_bid")?;

        let open = state
            .requests
            .iter()
            .any(|r| r.id == request_id && r.is_open());
        if !open {
            return Err(Error::rejected_error("Bid request is not open"));
        }

        if state
            .replies
            .iter()
            .any(|r| r.request_id == request_id && r.garage_id == user.id)
        {
            return Err(Error::rejected_error("You already replied to this request"));
        }

        let wallet = state.wallets.entry(user.id).or_default();
        if wallet.balance < BID_COST {
            return Err(Error::rejected_error("Insufficient credits"));
        }
        wallet.balance -= BID_COST;
        wallet.total_spent = Some(wallet.total_spent.unwrap_or(0.0) + BID_COST);

        state
            .transactions
            .entry(user.id)
            .or_default()
            .insert(
                0,
                WalletTransaction {
                    id: Uuid::new_v4(),
                    amount: BID_COST,
                    kind: TransactionKind::Debit,
                    source: "bid_reply".into(),
                    status: TransactionStatus::Completed,
                    description: Some("Bid submission".into()),
                    created_at: Utc::now(),
                },
            );

        if let Some(request) = state.request_mut(request_id) {
            request.reply_count += 1;
        }

        let reply = BidReply::new(request_id, user.id, draft);
        state.replies.push(reply.clone());

        Ok(reply)
    }

    async fn update_reply(
        &self,
        user: &User,
        reply_id: Uuid,
        draft: &BidDraft,
    ) -> Result<BidReply, Error> {
        let mut state = self.state.lock().await;
        state.enter("update_reply")?;

        let reply = state
            .reply_mut(reply_id)
            .filter(|r| r.garage_id == user.id)
            .ok_or_else(|| Error::rejected_error("Reply not found"))?;
        reply.revise(draft);

        Ok(reply.clone())
    }

    async fn withdraw_reply(&self, user: &User, reply_id: Uuid) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        state.enter("withdraw_reply")?;

        let reply = state
            .reply_mut(reply_id)
            .filter(|r| r.garage_id == user.id)
            .ok_or_else(|| Error::rejected_error("Reply not found"))?;
        reply
            .withdraw()
            .map_err(|err| Error::rejected_error(err.message))
    }

    async fn accept_bid(&self, user: &User, reply_id: Uuid) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        state.enter("fn_accept_bid")?;

        let request_id = state
            .replies
            .iter()
            .find(|r| r.id == reply_id)
            .map(|r| r.request_id)
            .ok_or_else(|| Error::rejected_error("Reply not found"))?;

        let request = state
            .request_mut(request_id)
            .filter(|r| r.owner_id == user.id)
            .ok_or_else(|| Error::rejected_error("Not allowed"))?;
        request
            .accept_reply(reply_id)
            .map_err(|err| Error::rejected_error(err.message))?;

        for reply in state.replies.iter_mut().filter(|r| r.request_id == request_id) {
            if reply.id == reply_id {
                reply.status = ReplyStatus::Accepted;
            } else if reply.is_pending() {
                reply.status = ReplyStatus::Rejected;
            }
        }

        Ok(())
    }

    async fn can_message(&self, user: &User, request_id: Uuid) -> Result<bool, Error> {
        let mut state = self.state.lock().await;
        state.enter("fn_can_message")?;

        let request = match state.requests.iter().find(|r| r.id == request_id) {
            Some(request) => request,
            None => return Ok(false),
        };
        let accepted = state
            .replies
            .iter()
            .find(|r| Some(r.id) == request.accepted_reply_id);

        Ok(match accepted {
            Some(reply) => user.id == request.owner_id || user.id == reply.garage_id,
            None => false,
        })
    }

    async fn fetch_contact(&self, _user: &User, profile_id: Uuid) -> Result<Contact, Error> {
        let mut state = self.state.lock().await;
        state.enter("fetch_contact")?;

        state
            .contacts
            .get(&profile_id)
            .cloned()
            .ok_or_else(|| Error::not_found_error("profile not found"))
    }

    async fn fetch_wallet(&self, user: &User) -> Result<Option<Wallet>, Error> {
        let mut state = self.state.lock().await;
        state.enter("fetch_wallet")?;

        Ok(state.wallets.get(&user.id).cloned())
    }

    async fn fetch_transactions(
        &self,
        user: &User,
        limit: usize,
    ) -> Result<Vec<WalletTransaction>, Error> {
        let mut state = self.state.lock().await;
        state.enter("fetch_transactions")?;

        Ok(state
            .transactions
            .get(&user.id)
            .map(|txs| txs.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn create_checkout(
        &self,
        _user: &User,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, Error> {
        let mut state = self.state.lock().await;
        state.enter("stripe-create-checkout")?;

        state.checkouts.push(request.clone());

        Ok(state.checkout.clone().unwrap_or_else(|| CheckoutSession {
            url: Some("https://checkout.stripe.com/c/pay/cs_test_memory".into()),
            session_id: Some("cs_test_memory".into()),
            order_id: Some("ord_memory".into()),
        }))
    }

    async fn topup_wallet(
        &self,
        _user: &User,
        garage_id: Uuid,
        amount: f64,
        reason: &str,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        state.enter("fn_topup_wallet")?;

        let wallet = state.wallets.entry(garage_id).or_default();
        wallet.balance += amount;
        wallet.total_earned = Some(wallet.total_earned.unwrap_or(0.0) + amount);
        state.topups.push((garage_id, amount, reason.into()));

        Ok(())
    }

    async fn fetch_refund_requests(&self, _user: &User) -> Result<Vec<RefundRequest>, Error> {
        let mut state = self.state.lock().await;
        state.enter("fetch_refund_requests")?;

        Ok(state.refunds.clone())
    }
}

