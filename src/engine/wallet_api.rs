use async_trait::async_trait;
use uuid::Uuid;

use super::{remote_failure, Engine};
use crate::{
    api::{WalletAPI, WalletOverview},
    auth::{Capability, Session},
    backend::TRANSACTION_PAGE,
    entities::{validate_top_up, CheckoutRequest, TopUpRedirect, Wallet, WalletTransaction},
    error::Error,
};

#[async_trait]
impl WalletAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn wallet(&self, session: &Session) -> Result<Wallet, Error> {
        let cache = self.cache(session).await;
        self.load_wallet(session, &cache).await
    }

    #[tracing::instrument(skip(self))]
    async fn transactions(&self, session: &Session) -> Result<Vec<WalletTransaction>, Error> {
        self.backend
            .fetch_transactions(&session.user, TRANSACTION_PAGE)
            .await
            .map_err(remote_failure("fetch_transactions"))
    }

    /// Refetches the wallet together with the user's bids and requests.
    #[tracing::instrument(skip(self))]
    async fn refresh(&self, session: &Session) -> Result<WalletOverview, Error> {
        let cache = self.cache(session).await;

        let (wallet, bids, requests) = futures::join!(
            self.fetch_wallet(session, &cache),
            self.fetch_my_bids(session, &cache),
            self.fetch_my_requests(session, &cache),
        );

        Ok(WalletOverview {
            wallet: wallet?,
            bids: bids?,
            requests: requests?,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn top_up(&self, session: &Session, amount: f64) -> Result<TopUpRedirect, Error> {
        session.require(Capability::TopUpWallet)?;
        validate_top_up(amount)?;

        let request = CheckoutRequest::wallet_credit(amount, &self.config.app_origin);
        let checkout = self
            .backend
            .create_checkout(&session.user, &request)
            .await
            .map_err(remote_failure("stripe-create-checkout"))?;

        tracing::info!(amount, order_id = ?checkout.order_id, "checkout session created");

        if let Some(url) = checkout.url {
            return Ok(TopUpRedirect::Url {
                url,
                order_id: checkout.order_id,
            });
        }

        match (checkout.session_id, &self.config.stripe_publishable_key) {
            (Some(session_id), Some(key)) => Ok(TopUpRedirect::StripeSession {
                session_id,
                publishable_key: key.clone(),
                order_id: checkout.order_id,
            }),
            (session_id, key) => {
                tracing::error!(
                    has_session = session_id.is_some(),
                    has_key = key.is_some(),
                    "checkout returned no usable redirect"
                );
                Err(Error::upstream_error())
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn adjust_wallet(
        &self,
        session: &Session,
        garage_id: Uuid,
        amount: f64,
        reason: String,
    ) -> Result<(), Error> {
        session.require(Capability::AdjustWallet)?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(Error::invalid_input_error(
                "A reason is required for wallet adjustments",
            ));
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Error::out_of_range_error(
                "Adjustment amount must be greater than zero",
            ));
        }

        self.backend
            .topup_wallet(&session.user, garage_id, amount, reason)
            .await
            .map_err(remote_failure("fn_topup_wallet"))?;

        tracing::info!(
            admin_id = %session.user.id,
            %garage_id,
            amount,
            "wallet adjusted"
        );

        Ok(())
    }
}
