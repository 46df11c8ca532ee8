use oso::Oso;
use serde::Serialize;

use crate::auth::{Marketplace, Role, User};
use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    CreateBidRequest,
    PlaceBid,
    TopUpWallet,
    ReviewRefunds,
    AdjustWallet,
}

impl Capability {
    pub fn action(&self) -> &'static str {
        match self {
            Self::CreateBidRequest => "create_bid_request",
            Self::PlaceBid => "place_bid",
            Self::TopUpWallet => "top_up_wallet",
            Self::ReviewRefunds => "review_refunds",
            Self::AdjustWallet => "adjust_wallet",
        }
    }

    fn denial(&self) -> &'static str {
        match self {
            Self::CreateBidRequest => "Only car owners can create bid requests",
            Self::PlaceBid => "Only garage owners can submit bids",
            Self::TopUpWallet => "Wallet top-ups are not available for this account",
            Self::ReviewRefunds => "Only admins can review refunds",
            Self::AdjustWallet => "Only admins can adjust wallets",
        }
    }
}

/// Marketplace-wide permissions, resolved once when a session opens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub create_bid_request: bool,
    pub place_bid: bool,
    pub top_up_wallet: bool,
    pub review_refunds: bool,
    pub adjust_wallet: bool,
}

impl Capabilities {
    #[tracing::instrument(skip(authorizor, user), fields(user_id = %user.id))]
    pub fn resolve(authorizor: &Oso, user: &User) -> Result<Self, Error> {
        let allowed =
            |capability: Capability| authorizor.is_allowed(user.clone(), capability.action(), Marketplace);

        Ok(Self {
            create_bid_request: allowed(Capability::CreateBidRequest)?,
            place_bid: allowed(Capability::PlaceBid)?,
            top_up_wallet: allowed(Capability::TopUpWallet)?,
            review_refunds: allowed(Capability::ReviewRefunds)?,
            adjust_wallet: allowed(Capability::AdjustWallet)?,
        })
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::CreateBidRequest => self.create_bid_request,
            Capability::PlaceBid => self.place_bid,
            Capability::TopUpWallet => self.top_up_wallet,
            Capability::ReviewRefunds => self.review_refunds,
            Capability::AdjustWallet => self.adjust_wallet,
        }
    }
}

/// Authorization context handed explicitly to every operation.
#[derive(Clone, Debug, Serialize)]
pub struct Session {
    pub user: User,
    pub capabilities: Capabilities,
}

impl Session {
    pub fn open(authorizor: &Oso, user: User) -> Result<Self, Error> {
        let capabilities = Capabilities::resolve(authorizor, &user)?;
        Ok(Self { user, capabilities })
    }

    pub fn require(&self, capability: Capability) -> Result<(), Error> {
        if self.capabilities.allows(capability) {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.user.id, action = capability.action(), "capability denied");
            Err(Error::forbidden_error(capability.denial()))
        }
    }

    pub fn role(&self) -> Role {
        self.user.role
    }
}

#[test]
fn capabilities_per_role_test() {
    use uuid::Uuid;

    let authorizor = crate::auth::authorizor::new().unwrap();

    let owner = Session::open(&authorizor, User::new(Uuid::new_v4(), Role::CarOwner, "t")).unwrap();
    assert_eq!(
        owner.capabilities,
        Capabilities {
            create_bid_request: true,
            place_bid: false,
            top_up_wallet: true,
            review_refunds: false,
            adjust_wallet: false,
        }
    );

    let garage =
        Session::open(&authorizor, User::new(Uuid::new_v4(), Role::GarageOwner, "t")).unwrap();
    assert_eq!(
        garage.capabilities,
        Capabilities {
            create_bid_request: false,
            place_bid: true,
            top_up_wallet: true,
            review_refunds: false,
            adjust_wallet: false,
        }
    );

    let admin = Session::open(&authorizor, User::new(Uuid::new_v4(), Role::Admin, "t")).unwrap();
    assert!(admin.capabilities.review_refunds);
    assert!(admin.capabilities.adjust_wallet);
    assert!(!admin.capabilities.place_bid);
}

#[test]
fn require_test() {
    use uuid::Uuid;

    let authorizor = crate::auth::authorizor::new().unwrap();
    let garage =
        Session::open(&authorizor, User::new(Uuid::new_v4(), Role::GarageOwner, "t")).unwrap();

    assert!(garage.require(Capability::PlaceBid).is_ok());

    let err = garage.require(Capability::CreateBidRequest).unwrap_err();
    assert!(err.is_forbidden_error());
    assert_eq!(err.message, "Only car owners can create bid requests");
}
