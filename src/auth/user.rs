use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    CarOwner,
    GarageOwner,
    Admin,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CarOwner => "car_owner",
            Self::GarageOwner => "garage_owner",
            Self::Admin => "admin",
        }
    }

    /// Parses a profile role. Profiles without a role are treated as car owners.
    pub fn parse(raw: Option<&str>) -> Result<Self, Error> {
        match raw.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("car_owner") | Some("car-owner") | Some("user") => {
                Ok(Self::CarOwner)
            }
            Some("garage_owner") | Some("garage-owner") => Ok(Self::GarageOwner),
            Some("admin") | Some("super_admin") => Ok(Self::Admin),
            Some(other) => Err(Error::invalid_input_error(format!(
                "unknown role '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub role: Role,
    pub display_name: Option<String>,
    #[serde(skip)]
    pub access_token: String,
}

impl User {
    pub fn new(id: Uuid, role: Role, access_token: impl Into<String>) -> Self {
        Self {
            id,
            role,
            display_name: None,
            access_token: access_token.into(),
        }
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("role", &self.role)
            .finish()
    }
}

impl PolarClass for User {
    fn get_polar_class_builder() -> oso::ClassBuilder<User> {
        oso::Class::builder()
            .name("User")
            .add_attribute_getter("id", |recv: &User| recv.id.to_string())
            .add_attribute_getter("role", |recv: &User| recv.role.name().to_string())
    }

    fn get_polar_class() -> oso::Class {
        let builder = User::get_polar_class_builder();
        builder.build()
    }
}

#[test]
fn role_parse_test() {
    assert_eq!(Role::parse(Some("garage_owner")).unwrap(), Role::GarageOwner);
    assert_eq!(Role::parse(Some("garage-owner")).unwrap(), Role::GarageOwner);
    assert_eq!(Role::parse(Some(" Admin ")).unwrap(), Role::Admin);
    assert_eq!(Role::parse(None).unwrap(), Role::CarOwner);
    assert_eq!(Role::parse(Some("car_owner")).unwrap(), Role::CarOwner);
    assert!(Role::parse(Some("mechanic"))
        .unwrap_err()
        .is_invalid_input_error());
}
