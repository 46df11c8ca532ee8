use oso::{Oso, PolarClass};

use crate::auth::{Conversation, Marketplace, User};
use crate::entities::{BidReply, BidRequest};
use crate::error::Error;

pub fn new() -> Result<Oso, Error> {
    let mut o = Oso::new();

    o.register_class(Marketplace::get_polar_class())?;
    o.register_class(User::get_polar_class())?;
    o.register_class(BidRequest::get_polar_class())?;
    o.register_class(BidReply::get_polar_class())?;
    o.register_class(Conversation::get_polar_class())?;

    o.load_str(include_str!("rules.polar"))?;

    Ok(o)
}

#[cfg(test)]
fn request_owned_by(owner_id: uuid::Uuid) -> BidRequest {
    use crate::entities::NewBidRequest;

    let new = NewBidRequest {
        title: "Engine Oil Leak Repair".into(),
        description: "Oil drips after parking".into(),
        category: "Engine".into(),
        ..Default::default()
    };
    BidRequest::draft(owner_id, &new, "REQ-2024-001".into())
}

#[cfg(test)]
fn reply_from(request_id: uuid::Uuid, garage_id: uuid::Uuid) -> BidReply {
    use crate::entities::BidDraft;

    let draft = BidDraft {
        amount: 500.0,
        time_estimate: "2 days".into(),
        message: "Can start tomorrow".into(),
        ..Default::default()
    };
    BidReply::new(request_id, garage_id, &draft)
}

#[test]
fn marketplace_role_test() {
    use crate::auth::Role;
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let garage = User::new(Uuid::new_v4(), Role::GarageOwner, "token");

    let result = authorizor.query_rule("has_role", (garage.clone(), "garage_owner", Marketplace));
    assert!(result.unwrap().next().unwrap().is_ok());

    let result = authorizor.query_rule("has_role", (garage.clone(), "car_owner", Marketplace));
    assert!(result.unwrap().next().is_none());
}

#[test]
fn marketplace_permission_test() {
    use crate::auth::Role;
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let owner = User::new(Uuid::new_v4(), Role::CarOwner, "token");
    let garage = User::new(Uuid::new_v4(), Role::GarageOwner, "token");
    let admin = User::new(Uuid::new_v4(), Role::Admin, "token");

    let result = authorizor.is_allowed(owner.clone(), "create_bid_request", Marketplace);
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(owner.clone(), "place_bid", Marketplace);
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(garage.clone(), "create_bid_request", Marketplace);
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(garage.clone(), "place_bid", Marketplace);
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(garage.clone(), "top_up_wallet", Marketplace);
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(garage.clone(), "review_refunds", Marketplace);
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(admin.clone(), "review_refunds", Marketplace);
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(admin.clone(), "adjust_wallet", Marketplace);
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(admin.clone(), "place_bid", Marketplace);
    assert_eq!(result.unwrap(), false);
}

#[test]
fn bid_request_owner_role_test() {
    use crate::auth::Role;
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let owner = User::new(Uuid::new_v4(), Role::CarOwner, "token");
    let stranger = User::new(Uuid::new_v4(), Role::CarOwner, "token");
    let request = request_owned_by(owner.id);

    let result = authorizor.query_rule("has_role", (owner.clone(), "owner", request.clone()));
    assert!(result.unwrap().next().unwrap().is_ok());

    let result = authorizor.is_allowed(owner.clone(), "accept_bid", request.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(owner.clone(), "read_replies", request.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(stranger.clone(), "accept_bid", request.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(stranger.clone(), "read_replies", request.clone());
    assert_eq!(result.unwrap(), false);
}

#[test]
fn bid_reply_bidder_role_test() {
    use crate::auth::Role;
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let garage = User::new(Uuid::new_v4(), Role::GarageOwner, "token");
    let other = User::new(Uuid::new_v4(), Role::GarageOwner, "token");
    let reply = reply_from(Uuid::new_v4(), garage.id);

    let result = authorizor.is_allowed(garage.clone(), "withdraw", reply.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(other.clone(), "withdraw", reply.clone());
    assert_eq!(result.unwrap(), false);
}

#[test]
fn conversation_party_test() {
    use crate::auth::Role;
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let owner = User::new(Uuid::new_v4(), Role::CarOwner, "token");
    let garage = User::new(Uuid::new_v4(), Role::GarageOwner, "token");
    let stranger = User::new(Uuid::new_v4(), Role::GarageOwner, "token");

    let request = request_owned_by(owner.id);
    let mut reply = reply_from(request.id, garage.id);

    // before acceptance

    let conversation = Conversation::new(&request, &reply);

    let result = authorizor.query_rule("has_role", (garage.clone(), "party", conversation.clone()));
    assert!(result.unwrap().next().unwrap().is_ok());

    let result = authorizor.is_allowed(garage.clone(), "message", conversation.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(owner.clone(), "message", conversation.clone());
    assert_eq!(result.unwrap(), false);

    reply.accept().unwrap();

    // after acceptance

    let conversation = Conversation::new(&request, &reply);

    let result = authorizor.is_allowed(garage.clone(), "message", conversation.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(owner.clone(), "message", conversation.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(stranger.clone(), "message", conversation.clone());
    assert_eq!(result.unwrap(), false);
}
