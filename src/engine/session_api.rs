use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use super::{remote_failure, Engine, Snapshot};
use crate::{api::SessionAPI, auth::Session, error::Error};

#[async_trait]
impl SessionAPI for Engine {
    #[tracing::instrument(skip_all)]
    async fn open_session(&self, access_token: &str) -> Result<Session, Error> {
        if access_token.trim().is_empty() {
            return Err(Error::unauthenticated_error());
        }

        let resolved = self.resolve_session(access_token).await;

        let mut sessions = self.sessions.write().await;
        let max_age = self.config.session_max_age;
        sessions.retain(|_, session| session.is_fresh(max_age));

        match &resolved {
            Ok(session) => {
                sessions.insert(access_token.to_string(), Snapshot::new(session.clone()));
            }
            Err(_) => {
                sessions.remove(access_token);
            }
        }

        let live: HashSet<Uuid> = sessions.values().map(|s| s.value.user.id).collect();
        self.caches
            .write()
            .await
            .retain(|user_id, _| live.contains(user_id));

        resolved
    }

    #[tracing::instrument(skip_all)]
    async fn find_session(&self, access_token: &str) -> Result<Session, Error> {
        if let Some(session) = self.sessions.read().await.get(access_token) {
            if session.is_fresh(self.config.session_max_age) {
                return Ok(session.value.clone());
            }
        }

        self.open_session(access_token).await
    }

    #[tracing::instrument(skip_all)]
    async fn close_session(&self, access_token: &str) -> Result<(), Error> {
        let mut sessions = self.sessions.write().await;

        let session = sessions
            .remove(access_token)
            .ok_or_else(Error::unauthenticated_error)?
            .value;

        // another device may still be signed in as the same user
        if !sessions.values().any(|s| s.value.user.id == session.user.id) {
            self.caches.write().await.remove(&session.user.id);
        }

        tracing::info!(user_id = %session.user.id, "session closed");

        Ok(())
    }
}

impl Engine {
    async fn resolve_session(&self, access_token: &str) -> Result<Session, Error> {
        let user = self
            .backend
            .current_user(access_token)
            .await
            .map_err(remote_failure("current_user"))?;
        let session = Session::open(&self.authorizor, user)?;

        tracing::info!(
            user_id = %session.user.id,
            role = session.role().name(),
            "session opened"
        );

        Ok(session)
    }
}
