use chrono::{DateTime, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BidReply {
    pub id: Uuid,
    pub request_id: Uuid,
    pub garage_id: Uuid,
    pub amount: f64,
    pub time_estimate: String,
    pub message: String,
    pub warranty: Option<String>,
    pub includes: Vec<String>,
    pub status: Status,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
    // legacy rows written before acceptance moved to its own status
    Closed,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
            Self::Closed => "closed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "withdrawn" => Some(Self::Withdrawn),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// A garage's quote as typed into the bid form.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct BidDraft {
    pub amount: f64,
    pub time_estimate: String,
    pub message: String,
    pub warranty: Option<String>,
    #[serde(default)]
    pub includes: Vec<String>,
}

impl BidDraft {
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.amount > 0.0)
            || self.time_estimate.trim().is_empty()
            || self.message.trim().is_empty()
        {
            return Err(Error::invalid_input_error(
                "Please fill in all required fields",
            ));
        }

        Ok(())
    }
}

impl BidReply {
    pub fn new(request_id: Uuid, garage_id: Uuid, draft: &BidDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            garage_id,
            amount: draft.amount,
            time_estimate: draft.time_estimate.trim().into(),
            message: draft.message.trim().into(),
            warranty: draft.warranty.clone(),
            includes: draft.includes.clone(),
            status: Status::Pending,
            submitted_at: Utc::now(),
        }
    }

    /// Replaces the quote fields in place. Status and identity are kept.
    pub fn revise(&mut self, draft: &BidDraft) {
        self.amount = draft.amount;
        self.time_estimate = draft.time_estimate.trim().into();
        self.message = draft.message.trim().into();
        self.warranty = draft.warranty.clone();
        self.includes = draft.includes.clone();
        self.submitted_at = Utc::now();
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, Status::Pending)
    }

    /// Direct contact between the two parties opens once the quote is accepted.
    pub fn is_contact_unlocked(&self) -> bool {
        matches!(self.status, Status::Accepted | Status::Closed)
    }

    pub fn accept(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Pending | Status::Accepted => {
                self.status = Status::Accepted;
                Ok(())
            }
            _ => Err(Error::invalid_state_error(
                "only pending bids can be accepted",
            )),
        }
    }

    pub fn withdraw(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Pending => {
                self.status = Status::Withdrawn;
                Ok(())
            }
            _ => Err(Error::invalid_state_error(
                "only pending bids can be withdrawn",
            )),
        }
    }
}

impl PolarClass for BidReply {
    fn get_polar_class_builder() -> oso::ClassBuilder<BidReply> {
        oso::Class::builder()
            .name("BidReply")
            .add_attribute_getter("id", |recv: &BidReply| recv.id.to_string())
            .add_attribute_getter("garage_id", |recv: &BidReply| recv.garage_id.to_string())
            .add_attribute_getter("status", |recv: &BidReply| recv.status.name().to_string())
    }

    fn get_polar_class() -> oso::Class {
        BidReply::get_polar_class_builder().build()
    }
}

#[cfg(test)]
fn draft() -> BidDraft {
    BidDraft {
        amount: 500.0,
        time_estimate: "2-3 days".into(),
        message: "Genuine parts available".into(),
        warranty: Some("6 months".into()),
        includes: vec!["Diagnosis".into(), "Labor".into()],
    }
}

#[test]
fn draft_validation_test() {
    assert!(draft().validate().is_ok());

    let mut missing = draft();
    missing.message = "".into();
    assert!(missing.validate().unwrap_err().is_invalid_input_error());

    let mut zero = draft();
    zero.amount = 0.0;
    assert!(zero.validate().is_err());

    let mut nan = draft();
    nan.amount = f64::NAN;
    assert!(nan.validate().is_err());
}

#[test]
fn contact_unlocks_only_after_acceptance() {
    let mut reply = BidReply::new(Uuid::new_v4(), Uuid::new_v4(), &draft());
    assert!(!reply.is_contact_unlocked());

    reply.status = Status::Rejected;
    assert!(!reply.is_contact_unlocked());

    reply.status = Status::Withdrawn;
    assert!(!reply.is_contact_unlocked());

    reply.status = Status::Closed;
    assert!(reply.is_contact_unlocked());

    reply.status = Status::Pending;
    reply.accept().unwrap();
    assert!(reply.is_contact_unlocked());
}

#[test]
fn revise_keeps_identity_and_status() {
    let mut reply = BidReply::new(Uuid::new_v4(), Uuid::new_v4(), &draft());
    let id = reply.id;

    let mut changed = draft();
    changed.amount = 600.0;
    reply.revise(&changed);

    assert_eq!(reply.id, id);
    assert_eq!(reply.amount, 600.0);
    assert_eq!(reply.status, Status::Pending);
}

#[test]
fn withdraw_only_pending() {
    let mut reply = BidReply::new(Uuid::new_v4(), Uuid::new_v4(), &draft());
    reply.withdraw().unwrap();
    assert_eq!(reply.status, Status::Withdrawn);
    assert!(reply.withdraw().is_err());
    assert!(reply.accept().is_err());
}
