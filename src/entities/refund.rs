use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RefundRequest {
    pub id: String,
    pub transaction_id: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub original_amount: f64,
    pub requested_amount: f64,
    pub currency: String,
    pub reason: String,
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub admin_notes: Option<String>,
    pub payment_reference: String,
    pub listing_type: String,
    #[serde(default)]
    pub supporting_documents: Vec<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Approved,
    Rejected,
    Processed,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Processed => "processed",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl RefundRequest {
    #[tracing::instrument(skip(self, notes))]
    pub fn approve(&mut self, notes: &str, at: DateTime<Utc>) -> Result<(), Error> {
        self.review(Status::Approved, notes, at)
    }

    #[tracing::instrument(skip(self, notes))]
    pub fn reject(&mut self, notes: &str, at: DateTime<Utc>) -> Result<(), Error> {
        self.review(Status::Rejected, notes, at)
    }

    #[tracing::instrument(skip(self))]
    pub fn process(&mut self, at: DateTime<Utc>) -> Result<(), Error> {
        match self.status {
            Status::Approved => {
                self.status = Status::Processed;
                self.processed_at = Some(at);
                Ok(())
            }
            _ => Err(Error::invalid_state_error(
                "only approved refunds can be processed",
            )),
        }
    }

    fn review(&mut self, outcome: Status, notes: &str, at: DateTime<Utc>) -> Result<(), Error> {
        let notes = notes.trim();
        if notes.is_empty() {
            return Err(Error::invalid_input_error("admin notes are required"));
        }

        match self.status {
            Status::Pending => {
                self.status = outcome;
                self.admin_notes = Some(notes.into());
                self.reviewed_at = Some(at);
                Ok(())
            }
            _ => Err(Error::invalid_state_error(
                "only pending refunds can be reviewed",
            )),
        }
    }
}

#[cfg(test)]
pub fn sample_refund(id: &str, status: Status) -> RefundRequest {
    RefundRequest {
        id: id.into(),
        transaction_id: format!("txn_{}", id),
        user_id: Uuid::new_v4(),
        user_name: "Ahmad Al-Rashid".into(),
        user_email: "ahmad@example.com".into(),
        original_amount: 50.0,
        requested_amount: 50.0,
        currency: "AED".into(),
        reason: "listing_not_approved".into(),
        description: "Listing was rejected".into(),
        status,
        priority: Priority::Medium,
        created_at: Utc::now(),
        reviewed_at: None,
        processed_at: None,
        admin_notes: None,
        payment_reference: "pi_1234567890".into(),
        listing_type: "Car Listing".into(),
        supporting_documents: vec![],
    }
}

#[test]
fn approve_then_process() {
    let mut refund = sample_refund("ref_001", Status::Pending);
    let now = Utc::now();

    refund.approve("Verified duplicate payment", now).unwrap();
    assert_eq!(refund.status, Status::Approved);
    assert_eq!(refund.reviewed_at, Some(now));
    assert_eq!(refund.admin_notes.as_deref(), Some("Verified duplicate payment"));

    refund.process(now).unwrap();
    assert_eq!(refund.status, Status::Processed);
    assert_eq!(refund.processed_at, Some(now));
}

#[test]
fn review_requires_notes() {
    let mut refund = sample_refund("ref_002", Status::Pending);

    assert!(refund
        .approve("   ", Utc::now())
        .unwrap_err()
        .is_invalid_input_error());
    assert_eq!(refund.status, Status::Pending);
    assert!(refund.reviewed_at.is_none());
}

#[test]
fn rejected_refunds_are_final() {
    let mut refund = sample_refund("ref_003", Status::Pending);
    refund.reject("Service delivered as promised", Utc::now()).unwrap();

    assert!(refund.process(Utc::now()).is_err());
    assert!(refund.approve("changed my mind", Utc::now()).is_err());
    assert_eq!(refund.status, Status::Rejected);
}

#[test]
fn pending_refund_cannot_be_processed() {
    let mut refund = sample_refund("ref_004", Status::Pending);
    assert!(refund.process(Utc::now()).is_err());
}
