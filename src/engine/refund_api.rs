use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::MutexGuard;

use super::{remote_failure, Engine, RefundDesk};
use crate::{
    api::{CsvExport, RefundAPI, RefundFilter, RefundStats},
    auth::{Capability, Session},
    entities::RefundRequest,
    error::Error,
    export,
};

impl Engine {
    /// The refund desk, fetched from the backend the first time an admin opens it.
    async fn refund_desk(&self, session: &Session) -> Result<MutexGuard<'_, RefundDesk>, Error> {
        session.require(Capability::ReviewRefunds)?;

        if !self.refunds.lock().await.is_loaded() {
            let refunds = self
                .backend
                .fetch_refund_requests(&session.user)
                .await
                .map_err(remote_failure("fetch_refund_requests"))?;

            tracing::info!(count = refunds.len(), "refund requests loaded");
            self.refunds.lock().await.load(refunds);
        }

        Ok(self.refunds.lock().await)
    }
}

#[async_trait]
impl RefundAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn list_refunds(
        &self,
        session: &Session,
        filter: RefundFilter,
    ) -> Result<Vec<RefundRequest>, Error> {
        Ok(self.refund_desk(session).await?.filtered(&filter))
    }

    #[tracing::instrument(skip(self))]
    async fn refund_stats(&self, session: &Session) -> Result<RefundStats, Error> {
        Ok(self.refund_desk(session).await?.stats())
    }

    #[tracing::instrument(skip(self))]
    async fn export_refunds(
        &self,
        session: &Session,
        filter: RefundFilter,
    ) -> Result<CsvExport, Error> {
        let refunds = self.refund_desk(session).await?.filtered(&filter);

        Ok(export::refunds_csv(&refunds, Utc::now()))
    }

    #[tracing::instrument(skip(self, notes))]
    async fn approve_refund(
        &self,
        session: &Session,
        id: String,
        notes: String,
    ) -> Result<RefundRequest, Error> {
        let mut desk = self.refund_desk(session).await?;
        let refund = desk.find_mut(&id)?;
        refund.approve(&notes, Utc::now())?;

        tracing::info!(refund_id = %id, admin_id = %session.user.id, "refund approved");

        Ok(refund.clone())
    }

    #[tracing::instrument(skip(self, notes))]
    async fn reject_refund(
        &self,
        session: &Session,
        id: String,
        notes: String,
    ) -> Result<RefundRequest, Error> {
        let mut desk = self.refund_desk(session).await?;
        let refund = desk.find_mut(&id)?;
        refund.reject(&notes, Utc::now())?;

        tracing::info!(refund_id = %id, admin_id = %session.user.id, "refund rejected");

        Ok(refund.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn process_refund(&self, session: &Session, id: String) -> Result<RefundRequest, Error> {
        let mut desk = self.refund_desk(session).await?;
        let refund = desk.find_mut(&id)?;
        refund.process(Utc::now())?;

        tracing::info!(refund_id = %id, "refund processed");

        Ok(refund.clone())
    }
}
