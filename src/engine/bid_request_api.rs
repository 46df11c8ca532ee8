use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{remote_failure, Engine, OpenMutation};
use crate::{
    api::{BidRequestAPI, Listing, ListingSource},
    auth::{Capability, Session},
    entities::{display_id, BidReply, BidRequest, NewBidRequest},
    error::Error,
    samples,
};

#[async_trait]
impl BidRequestAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn list_available_requests(&self, session: &Session) -> Result<Listing, Error> {
        let requests = self
            .backend
            .fetch_open_requests(&session.user)
            .await
            .map_err(remote_failure("fetch_open_requests"))?;

        let listing = if requests.is_empty() && self.config.sample_fallback {
            tracing::info!("no open requests, showing samples");
            Listing {
                source: ListingSource::Sample,
                requests: samples::requests(),
            }
        } else {
            Listing {
                source: ListingSource::Remote,
                requests,
            }
        };

        self.cache(session).await.lock().await.store_browse(listing.clone());

        Ok(listing)
    }

    #[tracing::instrument(skip(self))]
    async fn list_my_requests(&self, session: &Session) -> Result<Vec<BidRequest>, Error> {
        let cache = self.cache(session).await;
        self.fetch_my_requests(session, &cache).await
    }

    #[tracing::instrument(skip(self))]
    async fn create_bid_request(
        &self,
        session: &Session,
        new: NewBidRequest,
    ) -> Result<BidRequest, Error> {
        session.require(Capability::CreateBidRequest)?;
        new.validate()?;

        let cache = self.cache(session).await;
        let known = self.load_my_requests(session, &cache).await?;

        let display = display_id(Utc::now(), known.len() + 1);
        let optimistic = BidRequest::draft(session.user.id, &new, display.clone());
        let optimistic_id = optimistic.id;

        let ticket = {
            let mut cache = cache.lock().await;
            let ticket = cache.begin("create_bid_request");
            if let Some(mine) = cache.my_requests_mut() {
                mine.insert(0, optimistic);
            }
            ticket
        };
        let ticket = OpenMutation::new(&cache, ticket);

        match self.backend.create_bid_request(&session.user, &new).await {
            Ok(mut created) => {
                created.display_id = Some(display);

                let mut cache = cache.lock().await;
                cache.confirm(ticket.settle());
                if let Some(mine) = cache.my_requests_mut() {
                    mine.retain(|r| r.id != optimistic_id && r.id != created.id);
                    mine.insert(0, created.clone());
                }

                tracing::info!(request_id = %created.id, "bid request created");
                Ok(created)
            }
            Err(err) => {
                tracing::error!(%err, "failed to create bid request");

                let mut cache = cache.lock().await;
                if cache.fail(ticket.settle(), err.message.clone()) {
                    if let Some(mine) = cache.my_requests_mut() {
                        mine.retain(|r| r.id != optimistic_id);
                    }
                }

                Err(err)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn list_replies(
        &self,
        session: &Session,
        request_id: Uuid,
    ) -> Result<Vec<BidReply>, Error> {
        let request = self.fetch_request(session, request_id).await?;
        self.authorize(
            session.user.clone(),
            "read_replies",
            request,
            "Only the request owner can view its bids",
        )?;

        let replies = self
            .backend
            .fetch_replies_for_request(&session.user, request_id)
            .await
            .map_err(remote_failure("fetch_replies_for_request"))?;

        self.cache(session)
            .await
            .lock()
            .await
            .store_replies(request_id, replies.clone());

        Ok(replies)
    }
}
