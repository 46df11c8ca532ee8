use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public contact details of a marketplace profile.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Contact {
    pub id: Uuid,
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl Contact {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("there")
    }
}

/// A ready-to-open chat link to the other party of an accepted bid.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ContactLink {
    pub url: String,
    pub phone: String,
    pub message: String,
}
