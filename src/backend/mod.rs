//! Remote collaborators: hosted tables, stored procedures, auth and the
//! checkout edge function. The engine only ever talks to them through
//! [`Backend`].

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{
    BidDraft, BidReply, BidRequest, CheckoutRequest, CheckoutSession, Contact, NewBidRequest,
    RefundRequest, Wallet, WalletTransaction,
};
use crate::error::Error;

#[cfg(test)]
pub mod memory;

pub const TRANSACTION_PAGE: usize = 50;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Resolves an access token into the signed-in user and their profile role.
    async fn current_user(&self, access_token: &str) -> Result<User, Error>;

    async fn fetch_open_requests(&self, user: &User) -> Result<Vec<BidRequest>, Error>;

    async fn fetch_requests_by_owner(&self, user: &User) -> Result<Vec<BidRequest>, Error>;

    async fn fetch_request(&self, user: &User, id: Uuid) -> Result<Option<BidRequest>, Error>;

    /// `fn_create_bid_request`
    async fn create_bid_request(
        &self,
        user: &User,
        new: &NewBidRequest,
    ) -> Result<BidRequest, Error>;

    async fn fetch_replies_by_garage(&self, user: &User) -> Result<Vec<BidReply>, Error>;

    async fn fetch_replies_for_request(
        &self,
        user: &User,
        request_id: Uuid,
    ) -> Result<Vec<BidReply>, Error>;

    async fn fetch_reply(&self, user: &User, id: Uuid) -> Result<Option<BidReply>, Error>;

    /// `fn_reply_to_bid`, which also debits the bid cost from the garage wallet.
    async fn reply_to_bid(
        &self,
        user: &User,
        request_id: Uuid,
        draft: &BidDraft,
    ) -> Result<BidReply, Error>;

    async fn update_reply(
        &self,
        user: &User,
        reply_id: Uuid,
        draft: &BidDraft,
    ) -> Result<BidReply, Error>;

    async fn withdraw_reply(&self, user: &User, reply_id: Uuid) -> Result<(), Error>;

    /// `fn_accept_bid`
    async fn accept_bid(&self, user: &User, reply_id: Uuid) -> Result<(), Error>;

    /// `fn_can_message`
    async fn can_message(&self, user: &User, request_id: Uuid) -> Result<bool, Error>;

    async fn fetch_contact(&self, user: &User, profile_id: Uuid) -> Result<Contact, Error>;

    async fn fetch_wallet(&self, user: &User) -> Result<Option<Wallet>, Error>;

    async fn fetch_transactions(
        &self,
        user: &User,
        limit: usize,
    ) -> Result<Vec<WalletTransaction>, Error>;

    async fn create_checkout(
        &self,
        user: &User,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, Error>;

    /// `fn_topup_wallet`
    async fn topup_wallet(
        &self,
        user: &User,
        garage_id: Uuid,
        amount: f64,
        reason: &str,
    ) -> Result<(), Error>;

    async fn fetch_refund_requests(&self, user: &User) -> Result<Vec<RefundRequest>, Error>;
}
