use chrono::{DateTime, Datelike, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

pub const MAX_IMAGES: usize = 6;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BidRequest {
    pub id: Uuid,
    pub display_id: Option<String>,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub urgency: Urgency,
    pub budget: Option<Budget>,
    pub location: Option<String>,
    pub vehicle: Option<Vehicle>,
    pub images: Vec<String>,
    pub status: Status,
    pub reply_count: i64,
    pub accepted_reply_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Open,
    InProgress,
    Accepted,
    Completed,
    Closed,
    Cancelled,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Accepted => "accepted",
            Self::Completed => "completed",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "open" => Some(Self::Open),
            "in_progress" => Some(Self::InProgress),
            "accepted" => Some(Self::Accepted),
            "completed" => Some(Self::Completed),
            "closed" => Some(Self::Closed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    pub min: f64,
    pub max: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Vehicle {
    pub make: String,
    pub model: String,
    pub year: String,
}

/// What a car owner fills in before posting a repair request.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct NewBidRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub urgency: Urgency,
    pub budget: Option<Budget>,
    pub location: Option<String>,
    pub vehicle: Option<Vehicle>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl NewBidRequest {
    pub fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty()
            || self.description.trim().is_empty()
            || self.category.trim().is_empty()
        {
            return Err(Error::invalid_input_error(
                "Please fill in all required fields",
            ));
        }

        if self.images.len() > MAX_IMAGES {
            return Err(Error::invalid_input_error(format!(
                "Maximum {} images allowed",
                MAX_IMAGES
            )));
        }

        if let Some(budget) = &self.budget {
            if budget.min < 0.0 || budget.max < budget.min {
                return Err(Error::invalid_input_error("budget range is invalid"));
            }
        }

        Ok(())
    }
}

impl BidRequest {
    /// Builds the optimistic local copy shown until the server row arrives.
    pub fn draft(owner_id: Uuid, new: &NewBidRequest, display_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_id: Some(display_id),
            owner_id,
            title: new.title.trim().into(),
            description: new.description.trim().into(),
            category: new.category.trim().into(),
            urgency: new.urgency,
            budget: new.budget,
            location: new.location.clone(),
            vehicle: new.vehicle.clone(),
            images: new.images.clone(),
            status: Status::Open,
            reply_count: 0,
            accepted_reply_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, Status::Open)
    }

    #[tracing::instrument(skip(self))]
    pub fn accept_reply(&mut self, reply_id: Uuid) -> Result<(), Error> {
        if let Some(accepted) = self.accepted_reply_id {
            if accepted != reply_id {
                return Err(Error::invalid_state_error(
                    "this request already has an accepted bid",
                ));
            }
        }

        match self.status {
            Status::Open | Status::InProgress | Status::Accepted | Status::Closed => {
                self.accepted_reply_id = Some(reply_id);
                self.status = Status::Closed;
                Ok(())
            }
            _ => Err(Error::invalid_state_error(
                "bids can only be accepted on open requests",
            )),
        }
    }
}

/// Display id shown next to a freshly posted request, e.g. `REQ-2024-001`.
/// It is not a durable identifier.
pub fn display_id(at: DateTime<Utc>, ordinal: usize) -> String {
    format!("REQ-{}-{:03}", at.year(), ordinal)
}

impl PolarClass for BidRequest {
    fn get_polar_class_builder() -> oso::ClassBuilder<BidRequest> {
        oso::Class::builder()
            .name("BidRequest")
            .add_attribute_getter("id", |recv: &BidRequest| recv.id.to_string())
            .add_attribute_getter("owner_id", |recv: &BidRequest| recv.owner_id.to_string())
            .add_attribute_getter("status", |recv: &BidRequest| {
                recv.status.name().to_string()
            })
    }

    fn get_polar_class() -> oso::Class {
        BidRequest::get_polar_class_builder().build()
    }
}

#[test]
fn validate_requires_title_description_category() {
    let mut new = NewBidRequest {
        title: "Engine Oil Leak Repair".into(),
        description: "Oil leak near the engine bay".into(),
        category: "Engine".into(),
        ..Default::default()
    };
    assert!(new.validate().is_ok());

    new.category = "   ".into();
    assert!(new.validate().unwrap_err().is_invalid_input_error());
}

#[test]
fn validate_limits_images_and_budget() {
    let mut new = NewBidRequest {
        title: "AC Service".into(),
        description: "Not cooling".into(),
        category: "AC/Cooling".into(),
        images: vec!["a.jpg".into(); 7],
        ..Default::default()
    };
    assert!(new.validate().is_err());

    new.images.truncate(6);
    new.budget = Some(Budget {
        min: 600.0,
        max: 200.0,
    });
    assert!(new.validate().is_err());

    new.budget = Some(Budget {
        min: 200.0,
        max: 600.0,
    });
    assert!(new.validate().is_ok());
}

#[test]
fn display_id_test() {
    use chrono::TimeZone;

    let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
    assert_eq!(display_id(at, 1), "REQ-2024-001");
    assert_eq!(display_id(at, 42), "REQ-2024-042");
    assert_eq!(display_id(at, 1234), "REQ-2024-1234");
}

#[test]
fn accept_reply_closes_request_once() {
    let new = NewBidRequest {
        title: "Brake pads".into(),
        description: "Squeaking".into(),
        category: "Brakes".into(),
        ..Default::default()
    };
    let mut request = BidRequest::draft(Uuid::new_v4(), &new, "REQ-2024-001".into());
    let first = Uuid::new_v4();

    request.accept_reply(first).unwrap();
    assert_eq!(request.status, Status::Closed);
    assert_eq!(request.accepted_reply_id, Some(first));

    // accepting the same reply again is harmless, another one is not
    assert!(request.accept_reply(first).is_ok());
    assert!(request.accept_reply(Uuid::new_v4()).is_err());
}
