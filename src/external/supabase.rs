use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{Role, User};
use crate::backend::Backend;
use crate::entities::{
    BidDraft, BidReply, BidRequest, Budget, CheckoutRequest, CheckoutSession, Contact,
    NewBidRequest, Priority, RefundRequest, RefundStatus, ReplyStatus, RequestStatus,
    TransactionKind, TransactionStatus, Urgency, Vehicle, Wallet, WalletTransaction,
    DEFAULT_CURRENCY,
};
use crate::error::Error;

const REQUESTS_TABLE: &str = "bid_repair";
const REPLIES_TABLE: &str = "bid_repair_replies";
const CHECKOUT_FUNCTION: &str = "stripe-create-checkout";
const ADMIN_ADJUSTMENT: &str = "admin_adjustment";

/// PostgREST, RPC, auth and edge-function client for the hosted backend.
#[derive(Clone)]
pub struct SupabaseBackend {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl std::fmt::Debug for SupabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseBackend")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl SupabaseBackend {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    fn authed(&self, builder: RequestBuilder, access_token: &str) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        user: &User,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, Error> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);

        let res = self
            .authed(self.client.get(url), &user.access_token)
            .query(query)
            .send()
            .await?;

        Ok(check(res).await?.json().await?)
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        user: &User,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, Error> {
        let mut query = query.to_vec();
        query.push(("limit", "1".into()));

        let rows: Vec<T> = self.select(user, table, &query).await?;
        Ok(rows.into_iter().next())
    }

    async fn update<T: DeserializeOwned>(
        &self,
        user: &User,
        table: &str,
        id: Uuid,
        patch: Value,
    ) -> Result<Vec<T>, Error> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);

        let res = self
            .authed(self.client.patch(url), &user.access_token)
            .query(&[("id", eq(id))])
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;

        Ok(check(res).await?.json().await?)
    }

    async fn rpc(&self, user: &User, function: &str, args: Value) -> Result<Value, Error> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, function);

        let res = self
            .authed(self.client.post(url), &user.access_token)
            .json(&args)
            .send()
            .await?;

        let res = check(res).await?;
        let body = res.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn request_row(&self, user: &User, id: Uuid) -> Result<Option<BidRequest>, Error> {
        let row: Option<RequestRow> = self
            .select_one(user, REQUESTS_TABLE, &[("id", eq(id)), ("select", "*".into())])
            .await?;
        row.map(BidRequest::try_from).transpose()
    }

    async fn reply_row(&self, user: &User, id: Uuid) -> Result<Option<BidReply>, Error> {
        let row: Option<ReplyRow> = self
            .select_one(user, REPLIES_TABLE, &[("id", eq(id)), ("select", "*".into())])
            .await?;
        row.map(BidReply::try_from).transpose()
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

async fn check(res: Response) -> Result<Response, Error> {
    let status = res.status();

    if status.is_success() {
        return Ok(res);
    }

    if status.as_u16() == 401 {
        return Err(Error::unauthenticated_error());
    }

    if status.is_client_error() {
        let body: Value = res.json().await.unwrap_or(Value::Null);
        let message = body
            .get("message")
            .or_else(|| body.get("error"))
            .and_then(Value::as_str)
            .unwrap_or("request rejected by backend")
            .to_string();

        tracing::warn!(status = status.as_u16(), %message, "backend rejected call");
        return Err(Error::rejected_error(message));
    }

    tracing::error!(status = status.as_u16(), "unexpected backend response");
    Err(Error::upstream_error())
}

/// Stored procedures answer with a bare id or with the inserted row.
fn returned_id(value: &Value) -> Result<Uuid, Error> {
    let raw = match value {
        Value::String(id) => Some(id.as_str()),
        Value::Object(row) => row.get("id").and_then(Value::as_str),
        Value::Array(rows) => rows
            .first()
            .and_then(|row| row.get("id"))
            .and_then(Value::as_str),
        _ => None,
    };

    raw.and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(Error::upstream_error)
}

/// First whole number in a free-text estimate such as "2-3 days".
fn estimated_days(time_estimate: &str) -> Option<i64> {
    let digits: String = time_estimate
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn text(value: &Option<Value>, keys: &[&str]) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Object(map)) => keys
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(String::from),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    id: Uuid,
    role: Option<String>,
    display_name: Option<String>,
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RequestRow {
    id: Uuid,
    #[serde(alias = "user_id")]
    owner_id: Uuid,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    urgency: Option<Urgency>,
    #[serde(default)]
    budget: Option<f64>,
    #[serde(default)]
    budget_min: Option<f64>,
    #[serde(default)]
    budget_max: Option<f64>,
    #[serde(default)]
    location: Option<Value>,
    #[serde(default)]
    vehicle_info: Option<Value>,
    #[serde(default)]
    images: Option<Vec<String>>,
    status: String,
    #[serde(default, alias = "reply_count")]
    replies_count: Option<i64>,
    #[serde(default)]
    accepted_reply_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for BidRequest {
    type Error = Error;

    fn try_from(row: RequestRow) -> Result<Self, Error> {
        let status = RequestStatus::parse(&row.status).ok_or_else(|| {
            tracing::error!(status = %row.status, "unknown bid request status");
            Error::upstream_error()
        })?;

        let budget = match (row.budget_min, row.budget_max, row.budget) {
            (Some(min), Some(max), _) => Some(Budget { min, max }),
            (None, Some(max), _) => Some(Budget { min: 0.0, max }),
            (_, None, Some(max)) => Some(Budget { min: 0.0, max }),
            _ => None,
        };

        let vehicle = match &row.vehicle_info {
            Some(Value::Object(map)) => Some(Vehicle {
                make: map.get("make").and_then(Value::as_str).unwrap_or_default().into(),
                model: map.get("model").and_then(Value::as_str).unwrap_or_default().into(),
                year: match map.get("year") {
                    Some(Value::String(year)) => year.clone(),
                    Some(Value::Number(year)) => year.to_string(),
                    _ => String::new(),
                },
            }),
            _ => None,
        };

        Ok(Self {
            id: row.id,
            display_id: None,
            owner_id: row.owner_id,
            title: row.title,
            description: row.description.unwrap_or_default(),
            category: row.category.unwrap_or_default(),
            urgency: row.urgency.unwrap_or_default(),
            budget,
            location: text(&row.location, &["address", "area", "city"]),
            vehicle,
            images: row.images.unwrap_or_default(),
            status,
            reply_count: row.replies_count.unwrap_or(0),
            accepted_reply_id: row.accepted_reply_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ReplyRow {
    id: Uuid,
    #[serde(alias = "request_id")]
    bid_id: Uuid,
    #[serde(alias = "garage_id")]
    garage_owner_id: Uuid,
    #[serde(alias = "amount")]
    quote_amount: f64,
    #[serde(default)]
    estimated_time: Option<String>,
    #[serde(default)]
    estimated_days: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    warranty_offered: Option<String>,
    #[serde(default)]
    includes: Option<Vec<String>>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReplyRow> for BidReply {
    type Error = Error;

    fn try_from(row: ReplyRow) -> Result<Self, Error> {
        let status = ReplyStatus::parse(&row.status).ok_or_else(|| {
            tracing::error!(status = %row.status, "unknown bid reply status");
            Error::upstream_error()
        })?;

        let time_estimate = row
            .estimated_time
            .or_else(|| row.estimated_days.map(|days| format!("{} days", days)))
            .unwrap_or_default();

        Ok(Self {
            id: row.id,
            request_id: row.bid_id,
            garage_id: row.garage_owner_id,
            amount: row.quote_amount,
            time_estimate,
            message: row.message.unwrap_or_default(),
            warranty: row.warranty_offered,
            includes: row.includes.unwrap_or_default(),
            status,
            submitted_at: row.created_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct BidWalletRow {
    balance: f64,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    total_earned: Option<f64>,
    #[serde(default)]
    total_spent: Option<f64>,
}

impl From<BidWalletRow> for Wallet {
    fn from(row: BidWalletRow) -> Self {
        Self {
            balance: row.balance,
            currency: row.currency.unwrap_or_else(|| DEFAULT_CURRENCY.into()),
            total_earned: row.total_earned,
            total_spent: row.total_spent,
        }
    }
}

/// `billing_wallets` keeps balances in minor units.
#[derive(Debug, Deserialize)]
struct BillingWalletRow {
    balance: i64,
    #[serde(default)]
    currency: Option<String>,
}

impl From<BillingWalletRow> for Wallet {
    fn from(row: BillingWalletRow) -> Self {
        Self {
            balance: row.balance as f64 / 100.0,
            currency: row
                .currency
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| DEFAULT_CURRENCY.into()),
            total_earned: None,
            total_spent: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TransactionRow {
    id: Uuid,
    amount: f64,
    #[serde(alias = "type")]
    kind: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<TransactionRow> for WalletTransaction {
    fn from(row: TransactionRow) -> Self {
        let kind = match row.kind.as_deref() {
            Some("credit") | Some("topup") | Some("refund") => TransactionKind::Credit,
            Some("debit") => TransactionKind::Debit,
            _ if row.amount < 0.0 => TransactionKind::Debit,
            _ => TransactionKind::Credit,
        };

        let status = match row.status.as_deref() {
            Some("pending") => TransactionStatus::Pending,
            Some("failed") => TransactionStatus::Failed,
            _ => TransactionStatus::Completed,
        };

        Self {
            id: row.id,
            amount: row.amount.abs(),
            kind,
            source: row.source.unwrap_or_default(),
            status,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProfileSummary {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundRow {
    id: Value,
    user_id: Uuid,
    #[serde(default)]
    transaction_id: Option<String>,
    original_amount: f64,
    requested_amount: f64,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    description: Option<String>,
    status: RefundStatus,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    admin_notes: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    payment_reference: Option<String>,
    #[serde(default)]
    listing_type: Option<String>,
    #[serde(default)]
    supporting_documents: Option<Vec<String>>,
    #[serde(default)]
    user: Option<ProfileSummary>,
}

impl From<RefundRow> for RefundRequest {
    fn from(row: RefundRow) -> Self {
        let id = match row.id {
            Value::String(id) => id,
            other => other.to_string(),
        };
        let (user_name, user_email) = match row.user {
            Some(profile) => (
                profile.display_name.unwrap_or_else(|| "Unknown".into()),
                profile.email.unwrap_or_default(),
            ),
            None => ("Unknown".into(), String::new()),
        };

        Self {
            id,
            transaction_id: row.transaction_id.unwrap_or_default(),
            user_id: row.user_id,
            user_name,
            user_email,
            original_amount: row.original_amount,
            requested_amount: row.requested_amount,
            currency: row.currency.unwrap_or_else(|| DEFAULT_CURRENCY.into()),
            reason: row.reason.unwrap_or_default(),
            description: row.description.unwrap_or_default(),
            status: row.status,
            priority: row.priority.unwrap_or(Priority::Medium),
            created_at: row.created_at,
            reviewed_at: row.reviewed_at,
            processed_at: row.processed_at,
            admin_notes: row.admin_notes,
            payment_reference: row.payment_reference.unwrap_or_default(),
            listing_type: row.listing_type.unwrap_or_default(),
            supporting_documents: row.supporting_documents.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ReplyPatch<'a> {
    quote_amount: f64,
    estimated_time: &'a str,
    message: &'a str,
    warranty_offered: Option<&'a str>,
    includes: &'a [String],
}

impl<'a> From<&'a BidDraft> for ReplyPatch<'a> {
    fn from(draft: &'a BidDraft) -> Self {
        Self {
            quote_amount: draft.amount,
            estimated_time: draft.time_estimate.trim(),
            message: draft.message.trim(),
            warranty_offered: draft.warranty.as_deref(),
            includes: &draft.includes,
        }
    }
}

#[async_trait]
impl Backend for SupabaseBackend {
    #[tracing::instrument(skip(self, access_token))]
    async fn current_user(&self, access_token: &str) -> Result<User, Error> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let res = self
            .authed(self.client.get(url), access_token)
            .send()
            .await?;
        let auth: AuthUser = check(res).await?.json().await?;

        let mut user = User::new(auth.id, Role::CarOwner, access_token);

        let profile: Option<ProfileRow> = self
            .select_one(
                &user,
                "profiles",
                &[
                    ("id", eq(auth.id)),
                    ("select", "id,role,display_name,phone".into()),
                ],
            )
            .await?;

        if let Some(profile) = profile {
            user.role = Role::parse(profile.role.as_deref())?;
            user.display_name = profile.display_name;
        }

        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_open_requests(&self, user: &User) -> Result<Vec<BidRequest>, Error> {
        let rows: Vec<RequestRow> = self
            .select(
                user,
                REQUESTS_TABLE,
                &[
                    ("status", eq("open")),
                    ("select", "*".into()),
                    ("order", "created_at.desc".into()),
                ],
            )
            .await?;

        rows.into_iter().map(BidRequest::try_from).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_requests_by_owner(&self, user: &User) -> Result<Vec<BidRequest>, Error> {
        let rows: Vec<RequestRow> = self
            .select(
                user,
                REQUESTS_TABLE,
                &[
                    ("owner_id", eq(user.id)),
                    ("select", "*".into()),
                    ("order", "created_at.desc".into()),
                ],
            )
            .await?;

        rows.into_iter().map(BidRequest::try_from).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_request(&self, user: &User, id: Uuid) -> Result<Option<BidRequest>, Error> {
        self.request_row(user, id).await
    }

    #[tracing::instrument(skip(self, new))]
    async fn create_bid_request(
        &self,
        user: &User,
        new: &NewBidRequest,
    ) -> Result<BidRequest, Error> {
        let returned = self
            .rpc(
                user,
                "fn_create_bid_request",
                json!({
                    "p_title": new.title.trim(),
                    "p_description": new.description.trim(),
                    "p_category": new.category.trim(),
                    "p_budget": new.budget.map(|b| b.max),
                    "p_images": new.images,
                }),
            )
            .await?;

        let id = returned_id(&returned)?;
        self.request_row(user, id)
            .await?
            .ok_or_else(Error::upstream_error)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_replies_by_garage(&self, user: &User) -> Result<Vec<BidReply>, Error> {
        let rows: Vec<ReplyRow> = self
            .select(
                user,
                REPLIES_TABLE,
                &[
                    ("garage_owner_id", eq(user.id)),
                    ("select", "*".into()),
                    ("order", "created_at.desc".into()),
                ],
            )
            .await?;

        rows.into_iter().map(BidReply::try_from).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_replies_for_request(
        &self,
        user: &User,
        request_id: Uuid,
    ) -> Result<Vec<BidReply>, Error> {
        let rows: Vec<ReplyRow> = self
            .select(
                user,
                REPLIES_TABLE,
                &[
                    ("bid_id", eq(request_id)),
                    ("select", "*".into()),
                    ("order", "created_at.desc".into()),
                ],
            )
            .await?;

        rows.into_iter().map(BidReply::try_from).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_reply(&self, user: &User, id: Uuid) -> Result<Option<BidReply>, Error> {
        self.reply_row(user, id).await
    }

    #[tracing::instrument(skip(self, draft))]
    async fn reply_to_bid(
        &self,
        user: &User,
        request_id: Uuid,
        draft: &BidDraft,
    ) -> Result<BidReply, Error> {
        let returned = self
            .rpc(
                user,
                "fn_reply_to_bid",
                json!({
                    "p_request_id": request_id,
                    "p_message": draft.message.trim(),
                    "p_amount": draft.amount,
                    "p_estimated_days": estimated_days(&draft.time_estimate),
                }),
            )
            .await?;

        // the procedure only stores the core quote fields
        let id = returned_id(&returned)?;
        self.update_reply(user, id, draft).await
    }

    #[tracing::instrument(skip(self, draft))]
    async fn update_reply(
        &self,
        user: &User,
        reply_id: Uuid,
        draft: &BidDraft,
    ) -> Result<BidReply, Error> {
        let patch = serde_json::to_value(ReplyPatch::from(draft))?;
        let rows: Vec<ReplyRow> = self.update(user, REPLIES_TABLE, reply_id, patch).await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| Error::rejected_error("Reply not found"))
            .and_then(BidReply::try_from)
    }

    #[tracing::instrument(skip(self))]
    async fn withdraw_reply(&self, user: &User, reply_id: Uuid) -> Result<(), Error> {
        let rows: Vec<Value> = self
            .update(user, REPLIES_TABLE, reply_id, json!({ "status": "withdrawn" }))
            .await?;

        if rows.is_empty() {
            return Err(Error::rejected_error("Reply not found"));
        }

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn accept_bid(&self, user: &User, reply_id: Uuid) -> Result<(), Error> {
        self.rpc(user, "fn_accept_bid", json!({ "p_reply_id": reply_id }))
            .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn can_message(&self, user: &User, request_id: Uuid) -> Result<bool, Error> {
        let allowed = self
            .rpc(
                user,
                "fn_can_message",
                json!({ "p_request_id": request_id, "p_user_id": user.id }),
            )
            .await?;

        Ok(allowed.as_bool().unwrap_or(false))
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_contact(&self, user: &User, profile_id: Uuid) -> Result<Contact, Error> {
        let profile: Option<ProfileRow> = self
            .select_one(
                user,
                "profiles",
                &[
                    ("id", eq(profile_id)),
                    ("select", "id,role,display_name,phone".into()),
                ],
            )
            .await?;

        let profile = profile.ok_or_else(|| Error::not_found_error("profile not found"))?;

        Ok(Contact {
            id: profile.id,
            name: profile.display_name,
            phone: profile.phone,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_wallet(&self, user: &User) -> Result<Option<Wallet>, Error> {
        let bid_wallet: Option<BidWalletRow> = self
            .select_one(
                user,
                "bid_wallet",
                &[("garage_owner_id", eq(user.id)), ("select", "*".into())],
            )
            .await?;

        if let Some(row) = bid_wallet {
            return Ok(Some(row.into()));
        }

        let billing: Option<BillingWalletRow> = self
            .select_one(
                user,
                "billing_wallets",
                &[("owner_id", eq(user.id)), ("select", "*".into())],
            )
            .await?;

        Ok(billing.map(Wallet::from))
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_transactions(
        &self,
        user: &User,
        limit: usize,
    ) -> Result<Vec<WalletTransaction>, Error> {
        let rows: Vec<TransactionRow> = self
            .select(
                user,
                "wallet_transactions",
                &[
                    ("user_id", eq(user.id)),
                    ("select", "*".into()),
                    ("order", "created_at.desc".into()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        Ok(rows.into_iter().map(WalletTransaction::from).collect())
    }

    #[tracing::instrument(skip(self, request))]
    async fn create_checkout(
        &self,
        user: &User,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, Error> {
        let url = format!("{}/functions/v1/{}", self.base_url, CHECKOUT_FUNCTION);

        let res = self
            .authed(self.client.post(url), &user.access_token)
            .json(request)
            .send()
            .await?;

        Ok(check(res).await?.json().await?)
    }

    #[tracing::instrument(skip(self))]
    async fn topup_wallet(
        &self,
        user: &User,
        garage_id: Uuid,
        amount: f64,
        reason: &str,
    ) -> Result<(), Error> {
        self.rpc(
            user,
            "fn_topup_wallet",
            json!({
                "p_garage_owner_id": garage_id,
                "p_amount": amount,
                "p_stripe_payment_intent_id": ADMIN_ADJUSTMENT,
                "p_metadata": { "reason": reason, "admin_action": true },
            }),
        )
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_refund_requests(&self, user: &User) -> Result<Vec<RefundRequest>, Error> {
        let rows: Vec<RefundRow> = self
            .select(
                user,
                "refund_requests",
                &[
                    ("select", "*,user:profiles(display_name,email)".into()),
                    ("order", "created_at.desc".into()),
                ],
            )
            .await?;

        Ok(rows.into_iter().map(RefundRequest::from).collect())
    }
}

#[test]
fn request_row_decode_test() {
    let row: RequestRow = serde_json::from_value(json!({
        "id": "7d0c9a36-5d1a-4c52-9d0a-6b2b7c1f0a11",
        "owner_id": "0f8fad5b-d9cb-469f-a165-70867728950e",
        "title": "Engine Oil Leak Repair",
        "description": "Oil under the car every morning",
        "category": "Engine",
        "urgency": "high",
        "budget_min": 500,
        "budget_max": 1200,
        "location": { "address": "Dubai Marina" },
        "vehicle_info": { "make": "BYD", "model": "Han", "year": 2018 },
        "images": ["https://cdn.example.com/leak.jpg"],
        "status": "open",
        "replies_count": 3,
        "accepted_reply_id": null,
        "created_at": "2024-01-15T10:00:00Z"
    }))
    .unwrap();

    let request = BidRequest::try_from(row).unwrap();

    assert_eq!(request.status, RequestStatus::Open);
    assert_eq!(request.urgency, Urgency::High);
    assert_eq!(request.budget, Some(Budget { min: 500.0, max: 1200.0 }));
    assert_eq!(request.location.as_deref(), Some("Dubai Marina"));
    assert_eq!(request.vehicle.as_ref().unwrap().year, "2018");
    assert_eq!(request.reply_count, 3);
    assert!(request.display_id.is_none());
}

#[test]
fn legacy_request_row_decode_test() {
    let row: RequestRow = serde_json::from_value(json!({
        "id": "7d0c9a36-5d1a-4c52-9d0a-6b2b7c1f0a11",
        "user_id": "0f8fad5b-d9cb-469f-a165-70867728950e",
        "title": "Brakes",
        "budget": 300,
        "status": "closed",
        "created_at": "2024-01-15T10:00:00Z"
    }))
    .unwrap();

    let request = BidRequest::try_from(row).unwrap();

    assert_eq!(request.status, RequestStatus::Closed);
    assert_eq!(request.budget, Some(Budget { min: 0.0, max: 300.0 }));
    assert_eq!(request.urgency, Urgency::Medium);
    assert!(request.images.is_empty());
}

#[test]
fn unknown_status_is_upstream_error() {
    let row: ReplyRow = serde_json::from_value(json!({
        "id": "7d0c9a36-5d1a-4c52-9d0a-6b2b7c1f0a11",
        "bid_id": "0f8fad5b-d9cb-469f-a165-70867728950e",
        "garage_owner_id": "0f8fad5b-d9cb-469f-a165-70867728950f",
        "quote_amount": 450,
        "status": "exploded",
        "created_at": "2024-01-15T10:00:00Z"
    }))
    .unwrap();

    assert!(BidReply::try_from(row).unwrap_err().is_internal());
}

#[test]
fn reply_row_decode_test() {
    let row: ReplyRow = serde_json::from_value(json!({
        "id": "7d0c9a36-5d1a-4c52-9d0a-6b2b7c1f0a11",
        "bid_id": "0f8fad5b-d9cb-469f-a165-70867728950e",
        "garage_owner_id": "0f8fad5b-d9cb-469f-a165-70867728950f",
        "quote_amount": 450.5,
        "estimated_days": 3,
        "message": "OEM parts in stock",
        "warranty_offered": "6 months",
        "status": "accepted",
        "created_at": "2024-01-15T10:00:00Z"
    }))
    .unwrap();

    let reply = BidReply::try_from(row).unwrap();

    assert_eq!(reply.amount, 450.5);
    assert_eq!(reply.time_estimate, "3 days");
    assert_eq!(reply.warranty.as_deref(), Some("6 months"));
    assert!(reply.is_contact_unlocked());
}

#[test]
fn billing_wallet_is_minor_units() {
    let row: BillingWalletRow =
        serde_json::from_value(json!({ "balance": 12550, "currency": "aed" })).unwrap();
    let wallet = Wallet::from(row);

    assert_eq!(wallet.balance, 125.5);
    assert_eq!(wallet.currency, "AED");
}

#[test]
fn transaction_row_decode_test() {
    let row: TransactionRow = serde_json::from_value(json!({
        "id": "7d0c9a36-5d1a-4c52-9d0a-6b2b7c1f0a11",
        "amount": -2,
        "source": "bid_reply",
        "created_at": "2024-01-15T10:00:00Z"
    }))
    .unwrap();
    let tx = WalletTransaction::from(row);

    assert_eq!(tx.kind, TransactionKind::Debit);
    assert_eq!(tx.amount, 2.0);
    assert_eq!(tx.status, TransactionStatus::Completed);
}

#[test]
fn refund_row_decode_test() {
    let row: RefundRow = serde_json::from_value(json!({
        "id": 17,
        "user_id": "0f8fad5b-d9cb-469f-a165-70867728950e",
        "transaction_id": "txn_17",
        "original_amount": 50,
        "requested_amount": 25,
        "status": "pending",
        "priority": "high",
        "created_at": "2024-01-15T10:00:00Z",
        "user": { "display_name": "Sara", "email": "sara@example.com" }
    }))
    .unwrap();
    let refund = RefundRequest::from(row);

    assert_eq!(refund.id, "17");
    assert_eq!(refund.user_name, "Sara");
    assert_eq!(refund.priority, Priority::High);
    assert_eq!(refund.currency, "AED");
}

#[test]
fn returned_id_test() {
    let id = Uuid::new_v4();

    assert_eq!(returned_id(&json!(id.to_string())).unwrap(), id);
    assert_eq!(returned_id(&json!({ "id": id.to_string() })).unwrap(), id);
    assert_eq!(returned_id(&json!([{ "id": id.to_string() }])).unwrap(), id);
    assert!(returned_id(&Value::Null).is_err());
}

#[test]
fn estimated_days_test() {
    assert_eq!(estimated_days("2-3 days"), Some(2));
    assert_eq!(estimated_days("about 10 days"), Some(10));
    assert_eq!(estimated_days("same day"), None);
}
