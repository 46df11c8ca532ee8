use async_trait::async_trait;
use uuid::Uuid;

use super::{remote_failure, Engine, OpenMutation, SharedCache};
use crate::{
    api::{BidOutcome, BidReplyAPI},
    auth::{Capability, Conversation, Session},
    entities::{BidDraft, BidReply, ContactLink, ReplyStatus, RequestStatus, BID_COST},
    error::Error,
    external::whatsapp::{self, Sender},
    samples,
};

#[async_trait]
impl BidReplyAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn place_bid(
        &self,
        session: &Session,
        request_id: Uuid,
        draft: BidDraft,
    ) -> Result<BidOutcome, Error> {
        session.require(Capability::PlaceBid)?;
        draft.validate()?;

        let cache = self.cache(session).await;
        let _flight = cache.lock().await.enter_flight(request_id)?;

        self.submit_bid(session, &cache, request_id, &draft).await
    }

    #[tracing::instrument(skip(self))]
    async fn list_my_bids(&self, session: &Session) -> Result<Vec<BidReply>, Error> {
        let cache = self.cache(session).await;
        self.fetch_my_bids(session, &cache).await
    }

    #[tracing::instrument(skip(self))]
    async fn accept_bid(&self, session: &Session, reply_id: Uuid) -> Result<BidReply, Error> {
        let reply = self.fetch_reply(session, reply_id).await?;
        let request = self.fetch_request(session, reply.request_id).await?;

        self.authorize(
            session.user.clone(),
            "accept_bid",
            request.clone(),
            "Only the request owner can accept bids",
        )?;

        let mut accepted = reply.clone();
        accepted.accept()?;
        let mut closed = request.clone();
        closed.accept_reply(reply_id)?;

        let cache = self.cache(session).await;
        let (ticket, previous_reply, previous_request, rejected) = {
            let mut cache = cache.lock().await;
            let ticket = cache.begin("accept_bid");

            let previous_reply = cache.find_reply(reply_id).map(|r| r.status);
            let previous_request = cache
                .find_request(request.id)
                .map(|r| (r.status, r.accepted_reply_id));

            for copy in cache.replies_mut(reply_id) {
                copy.status = ReplyStatus::Accepted;
            }
            for copy in cache.requests_mut(request.id) {
                copy.status = closed.status;
                copy.accepted_reply_id = closed.accepted_reply_id;
            }

            // the other pending quotes on the request lose
            let mut rejected = Vec::new();
            if let Some(received) = cache.received_mut(request.id) {
                for sibling in received
                    .iter_mut()
                    .filter(|r| r.id != reply_id && r.is_pending())
                {
                    sibling.status = ReplyStatus::Rejected;
                    rejected.push(sibling.id);
                }
            }

            (ticket, previous_reply, previous_request, rejected)
        };
        let ticket = OpenMutation::new(&cache, ticket);

        match self.backend.accept_bid(&session.user, reply_id).await {
            Ok(()) => {
                cache.lock().await.confirm(ticket.settle());
                tracing::info!(%reply_id, request_id = %request.id, "bid accepted");
                Ok(accepted)
            }
            Err(err) => {
                tracing::error!(%err, %reply_id, "failed to accept bid");

                let mut cache = cache.lock().await;
                if cache.fail(ticket.settle(), err.message.clone()) {
                    restore_reply(&mut cache, reply_id, previous_reply);
                    for sibling in rejected {
                        restore_reply(&mut cache, sibling, Some(ReplyStatus::Pending));
                    }
                    if let Some((status, accepted_reply_id)) = previous_request {
                        for copy in cache.requests_mut(request.id) {
                            copy.status = status;
                            copy.accepted_reply_id = accepted_reply_id;
                        }
                    }
                }

                Err(err)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn withdraw_bid(&self, session: &Session, reply_id: Uuid) -> Result<BidReply, Error> {
        let reply = self.fetch_reply(session, reply_id).await?;

        self.authorize(
            session.user.clone(),
            "withdraw",
            reply.clone(),
            "Only the bidding garage can withdraw this bid",
        )?;

        let mut withdrawn = reply;
        withdrawn.withdraw()?;

        let cache = self.cache(session).await;
        let (ticket, previous) = {
            let mut cache = cache.lock().await;
            let ticket = cache.begin("withdraw_bid");
            let previous = cache.find_reply(reply_id).map(|r| r.status);
            for copy in cache.replies_mut(reply_id) {
                copy.status = ReplyStatus::Withdrawn;
            }
            (ticket, previous)
        };
        let ticket = OpenMutation::new(&cache, ticket);

        match self.backend.withdraw_reply(&session.user, reply_id).await {
            Ok(()) => {
                cache.lock().await.confirm(ticket.settle());
                Ok(withdrawn)
            }
            Err(err) => {
                tracing::error!(%err, %reply_id, "failed to withdraw bid");

                let mut cache = cache.lock().await;
                if cache.fail(ticket.settle(), err.message.clone()) {
                    restore_reply(&mut cache, reply_id, previous);
                }

                Err(err)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn contact_counterparty(
        &self,
        session: &Session,
        reply_id: Uuid,
    ) -> Result<ContactLink, Error> {
        let reply = self.fetch_reply(session, reply_id).await?;

        if !reply.is_contact_unlocked() {
            return Err(Error::locked_error());
        }

        let request = self.fetch_request(session, reply.request_id).await?;
        let conversation = Conversation::new(&request, &reply);

        self.authorize(
            session.user.clone(),
            "message",
            conversation.clone(),
            "Only the request owner and the accepted garage can contact each other",
        )?;

        let allowed = self
            .backend
            .can_message(&session.user, request.id)
            .await
            .map_err(remote_failure("fn_can_message"))?;
        if !allowed {
            tracing::warn!(%reply_id, "messaging refused by backend");
            return Err(Error::forbidden_error(
                "Messaging is not available for this bid",
            ));
        }

        let counterparty = conversation
            .counterparty(session.user.id)
            .ok_or_else(|| Error::forbidden_error("Not a party to this bid"))?;
        let contact = self
            .backend
            .fetch_contact(&session.user, counterparty)
            .await
            .map_err(remote_failure("fetch_contact"))?;

        let sender = if session.user.id == reply.garage_id {
            Sender::Garage
        } else {
            Sender::Owner
        };
        let message =
            whatsapp::message(sender, contact.display_name(), &request.title, reply.amount);

        whatsapp::link(contact.phone.as_deref().unwrap_or_default(), message)
    }
}

impl Engine {
    async fn submit_bid(
        &self,
        session: &Session,
        cache: &SharedCache,
        request_id: Uuid,
        draft: &BidDraft,
    ) -> Result<BidOutcome, Error> {
        if samples::is_sample(request_id) {
            return Err(Error::invalid_state_error(
                "Sample requests cannot receive bids",
            ));
        }

        let request = self.fetch_request(session, request_id).await?;
        if request.status != RequestStatus::Open {
            return Err(Error::invalid_state_error(
                "This request is no longer accepting bids",
            ));
        }

        let bids = self.load_my_bids(session, cache).await?;
        let existing = bids.into_iter().find(|bid| bid.request_id == request_id);

        match existing {
            Some(existing) => self.revise_bid(session, cache, existing, draft).await,
            None => self.new_bid(session, cache, request_id, draft).await,
        }
    }

    /// Editing a quote already on the request. Free of charge.
    async fn revise_bid(
        &self,
        session: &Session,
        cache: &SharedCache,
        existing: BidReply,
        draft: &BidDraft,
    ) -> Result<BidOutcome, Error> {
        if !existing.is_pending() {
            return Err(Error::invalid_state_error(
                "Only pending bids can be updated",
            ));
        }

        let reply_id = existing.id;
        let ticket = {
            let mut cache = cache.lock().await;
            let ticket = cache.begin("update_bid");
            for copy in cache.replies_mut(reply_id) {
                copy.revise(draft);
            }
            ticket
        };
        let ticket = OpenMutation::new(cache, ticket);

        match self.backend.update_reply(&session.user, reply_id, draft).await {
            Ok(updated) => {
                let mut cache = cache.lock().await;
                cache.confirm(ticket.settle());
                for copy in cache.replies_mut(reply_id) {
                    *copy = updated.clone();
                }

                Ok(BidOutcome {
                    reply: updated,
                    created: false,
                    charged: 0.0,
                    wallet: cache.fresh_wallet(self.config.cache_max_age).cloned(),
                })
            }
            Err(err) => {
                tracing::error!(%err, %reply_id, "failed to update bid");

                let mut cache = cache.lock().await;
                if cache.fail(ticket.settle(), err.message.clone()) {
                    for copy in cache.replies_mut(reply_id) {
                        *copy = existing.clone();
                    }
                }

                Err(err)
            }
        }
    }

    /// First quote from this garage on the request. Costs the bid fee.
    async fn new_bid(
        &self,
        session: &Session,
        cache: &SharedCache,
        request_id: Uuid,
        draft: &BidDraft,
    ) -> Result<BidOutcome, Error> {
        let wallet = self.load_wallet(session, cache).await?;
        if !wallet.can_afford_bid() {
            tracing::info!(balance = wallet.balance, "not enough credits to bid");
            return Err(Error::top_up_required_error());
        }

        let optimistic = BidReply::new(request_id, session.user.id, draft);
        let optimistic_id = optimistic.id;

        let ticket = {
            let mut cache = cache.lock().await;
            let ticket = cache.begin("place_bid");

            if let Some(Err(err)) = cache.wallet_mut().map(|wallet| wallet.charge_bid()) {
                cache.fail(ticket, err.message.clone());
                return Err(err);
            }
            if let Some(mine) = cache.my_bids_mut() {
                mine.insert(0, optimistic);
            }
            for copy in cache.requests_mut(request_id) {
                copy.reply_count += 1;
            }

            ticket
        };
        let ticket = OpenMutation::new(cache, ticket);

        match self
            .backend
            .reply_to_bid(&session.user, request_id, draft)
            .await
        {
            Ok(reply) => {
                let mut cache = cache.lock().await;
                cache.confirm(ticket.settle());
                if let Some(mine) = cache.my_bids_mut() {
                    mine.retain(|r| r.id != optimistic_id && r.id != reply.id);
                    mine.insert(0, reply.clone());
                }

                tracing::info!(reply_id = %reply.id, %request_id, "bid placed");

                Ok(BidOutcome {
                    reply,
                    created: true,
                    charged: BID_COST,
                    wallet: cache.fresh_wallet(self.config.cache_max_age).cloned(),
                })
            }
            Err(err) => {
                tracing::error!(%err, %request_id, "failed to place bid");

                let mut cache = cache.lock().await;
                if cache.fail(ticket.settle(), err.message.clone()) {
                    if let Some(wallet) = cache.wallet_mut() {
                        wallet.refund_charge(BID_COST);
                    }
                    if let Some(mine) = cache.my_bids_mut() {
                        mine.retain(|r| r.id != optimistic_id);
                    }
                    for copy in cache.requests_mut(request_id) {
                        copy.reply_count -= 1;
                    }
                }

                Err(err)
            }
        }
    }
}

fn restore_reply(
    cache: &mut super::SessionCache,
    reply_id: Uuid,
    previous: Option<ReplyStatus>,
) {
    if let Some(status) = previous {
        for copy in cache.replies_mut(reply_id) {
            copy.status = status;
        }
    }
}
