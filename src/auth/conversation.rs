use oso::PolarClass;
use uuid::Uuid;

use crate::entities::{BidReply, BidRequest};

/// The two parties around an accepted quote.
#[derive(Clone, Debug)]
pub struct Conversation {
    pub request_id: Uuid,
    pub reply_id: Uuid,
    pub owner_id: Uuid,
    pub garage_id: Uuid,
    pub reply_status: String,
}

impl Conversation {
    pub fn new(request: &BidRequest, reply: &BidReply) -> Self {
        Self {
            request_id: request.id,
            reply_id: reply.id,
            owner_id: request.owner_id,
            garage_id: reply.garage_id,
            reply_status: reply.status.name().into(),
        }
    }

    /// The other side of the conversation, if `user_id` is a party at all.
    pub fn counterparty(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.owner_id {
            Some(self.garage_id)
        } else if user_id == self.garage_id {
            Some(self.owner_id)
        } else {
            None
        }
    }
}

impl PolarClass for Conversation {
    fn get_polar_class_builder() -> oso::ClassBuilder<Conversation> {
        oso::Class::builder()
            .name("Conversation")
            .add_attribute_getter("owner_id", |recv: &Conversation| recv.owner_id.to_string())
            .add_attribute_getter("garage_id", |recv: &Conversation| {
                recv.garage_id.to_string()
            })
            .add_attribute_getter("reply_status", |recv: &Conversation| {
                recv.reply_status.clone()
            })
    }

    fn get_polar_class() -> oso::Class {
        Conversation::get_polar_class_builder().build()
    }
}

#[test]
fn counterparty_test() {
    let owner = Uuid::new_v4();
    let garage = Uuid::new_v4();
    let conversation = Conversation {
        request_id: Uuid::new_v4(),
        reply_id: Uuid::new_v4(),
        owner_id: owner,
        garage_id: garage,
        reply_status: "accepted".into(),
    };

    assert_eq!(conversation.counterparty(owner), Some(garage));
    assert_eq!(conversation.counterparty(garage), Some(owner));
    assert_eq!(conversation.counterparty(Uuid::new_v4()), None);
}
