use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Session;
use crate::entities::{
    BidDraft, BidReply, BidRequest, ContactLink, NewBidRequest, RefundRequest, RefundStatus,
    TopUpRedirect, Wallet, WalletTransaction,
};
use crate::error::Error;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListingSource {
    Remote,
    Sample,
}

/// Requests shown in the browse view, and where they came from.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub source: ListingSource,
    pub requests: Vec<BidRequest>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BidOutcome {
    pub reply: BidReply,
    /// `false` when an existing quote was revised.
    pub created: bool,
    pub charged: f64,
    pub wallet: Option<Wallet>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WalletOverview {
    pub wallet: Wallet,
    pub bids: Vec<BidReply>,
    pub requests: Vec<BidRequest>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefundFilter {
    pub status: Option<RefundStatus>,
    pub search: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RefundStats {
    pub pending: usize,
    pub approved: usize,
    pub total_refunded: f64,
    pub high_priority_pending: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CsvExport {
    pub filename: String,
    pub content: String,
}

#[async_trait]
pub trait SessionAPI {
    async fn open_session(&self, access_token: &str) -> Result<Session, Error>;
    async fn find_session(&self, access_token: &str) -> Result<Session, Error>;
    async fn close_session(&self, access_token: &str) -> Result<(), Error>;
}

#[async_trait]
pub trait BidRequestAPI {
    async fn list_available_requests(&self, session: &Session) -> Result<Listing, Error>;
    async fn list_my_requests(&self, session: &Session) -> Result<Vec<BidRequest>, Error>;
    async fn create_bid_request(
        &self,
        session: &Session,
        new: NewBidRequest,
    ) -> Result<BidRequest, Error>;
    async fn list_replies(&self, session: &Session, request_id: Uuid)
        -> Result<Vec<BidReply>, Error>;
}

#[async_trait]
pub trait BidReplyAPI {
    async fn place_bid(
        &self,
        session: &Session,
        request_id: Uuid,
        draft: BidDraft,
    ) -> Result<BidOutcome, Error>;
    async fn list_my_bids(&self, session: &Session) -> Result<Vec<BidReply>, Error>;
    async fn accept_bid(&self, session: &Session, reply_id: Uuid) -> Result<BidReply, Error>;
    async fn withdraw_bid(&self, session: &Session, reply_id: Uuid) -> Result<BidReply, Error>;
    async fn contact_counterparty(
        &self,
        session: &Session,
        reply_id: Uuid,
    ) -> Result<ContactLink, Error>;
}

#[async_trait]
pub trait WalletAPI {
    async fn wallet(&self, session: &Session) -> Result<Wallet, Error>;
    async fn transactions(&self, session: &Session) -> Result<Vec<WalletTransaction>, Error>;
    async fn refresh(&self, session: &Session) -> Result<WalletOverview, Error>;
    async fn top_up(&self, session: &Session, amount: f64) -> Result<TopUpRedirect, Error>;
    async fn adjust_wallet(
        &self,
        session: &Session,
        garage_id: Uuid,
        amount: f64,
        reason: String,
    ) -> Result<(), Error>;
}

#[async_trait]
pub trait RefundAPI {
    async fn list_refunds(
        &self,
        session: &Session,
        filter: RefundFilter,
    ) -> Result<Vec<RefundRequest>, Error>;
    async fn refund_stats(&self, session: &Session) -> Result<RefundStats, Error>;
    async fn export_refunds(
        &self,
        session: &Session,
        filter: RefundFilter,
    ) -> Result<CsvExport, Error>;
    async fn approve_refund(
        &self,
        session: &Session,
        id: String,
        notes: String,
    ) -> Result<RefundRequest, Error>;
    async fn reject_refund(
        &self,
        session: &Session,
        id: String,
        notes: String,
    ) -> Result<RefundRequest, Error>;
    async fn process_refund(&self, session: &Session, id: String) -> Result<RefundRequest, Error>;
}

pub trait API: SessionAPI + BidRequestAPI + BidReplyAPI + WalletAPI + RefundAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;
