//! Lazy, idempotent session handling for the advisory API

use super::AdvisorApi;
use anyhow::Result;

/// Something that can open a session to the advisory API
#[allow(async_fn_in_trait)]
pub trait Connect {
    type Session: AdvisorApi;

    /// Open a new session. Called at most once per [`Connector`].
    async fn establish(&self) -> Result<Self::Session>;
}

/// Owns the session and opens it on first use
pub struct Connector<C: Connect> {
    factory: C,
    session: Option<C::Session>,
}

impl<C: Connect> Connector<C> {
    pub fn new(factory: C) -> Self {
        Self {
            factory,
            session: None,
        }
    }

    /// Establish the session if there is none yet, then return it.
    /// Connection errors are returned as-is; nothing is retried.
    pub async fn connect(&mut self) -> Result<&C::Session> {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                tracing::debug!("Connecting to Support API (Trusted Advisor)");
                let session = self.factory.establish().await?;
                tracing::info!(region = session.region(), "Connected to Support API");
                session
            }
        };
        let session: &C::Session = self.session.insert(session);
        Ok(session)
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&C::Session> {
        self.session.as_ref()
    }
}
