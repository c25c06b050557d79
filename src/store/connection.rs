//! Session lifecycle: the one owner of the live coordination handle.
//!
//! A `Disconnected` session may resolve back to `Connected` within the
//! session timeout, so operations block on [`ConnectionManager::live_handle`]
//! instead of failing immediately. The previous handle is parked while
//! waiting for the client to report reconnection; an `Expired` session is
//! unrecoverable and triggers a full reconnect.

use crate::config::StoreConfig;
use crate::core::{Result, StoreError};
use crate::zk::{SessionEvent, ZkConnector, ZkHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{error, info, warn};

enum SessionState {
    Disconnected,
    Connected(Arc<dyn ZkHandle>),
    /// Handle parked after a `Disconnected` event, adopted again if the
    /// client reports `Connected` before the session expires.
    AwaitingReconnect(Arc<dyn ZkHandle>),
}

pub(crate) struct ConnectionManager {
    connector: Arc<dyn ZkConnector>,
    address: String,
    session_timeout: Duration,
    num_retries: u32,
    state: Mutex<SessionState>,
    /// Notified whenever a handle becomes live.
    live: Notify,
}

impl ConnectionManager {
    pub(crate) fn new(connector: Arc<dyn ZkConnector>, config: &StoreConfig) -> Self {
        Self {
            connector,
            address: config.address.clone(),
            session_timeout: config.session_timeout,
            num_retries: config.num_retries,
            state: Mutex::new(SessionState::Disconnected),
            live: Notify::new(),
        }
    }

    /// Discard any existing handle and open a fresh session, retrying the
    /// open up to the configured bound. Exhaustion is fatal.
    pub(crate) async fn connect(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if let SessionState::Connected(handle) | SessionState::AwaitingReconnect(handle) =
            std::mem::replace(&mut *state, SessionState::Disconnected)
        {
            handle.close().await;
        }

        for attempt in 1..=self.num_retries {
            match self
                .connector
                .connect(&self.address, self.session_timeout)
                .await
            {
                Ok(handle) => {
                    *state = SessionState::Connected(handle);
                    self.live.notify_waiters();
                    info!(address = %self.address, "established coordination service session");
                    return Ok(());
                }
                Err(err) => {
                    warn!(error = %err, attempt, "failed to connect to the coordination service");
                }
            }
        }

        error!(address = %self.address, "unable to connect to the coordination service");
        Err(StoreError::Unavailable(self.address.clone()))
    }

    /// Apply a session event reported by the client.
    pub(crate) async fn process_session_event(&self, event: SessionEvent) -> Result<()> {
        info!(?event, "session event");
        match event {
            SessionEvent::Connected => {
                let mut state = self.state.lock().await;
                let current = std::mem::replace(&mut *state, SessionState::Disconnected);
                *state = match current {
                    SessionState::AwaitingReconnect(handle) => {
                        self.live.notify_waiters();
                        info!("session restored");
                        SessionState::Connected(handle)
                    }
                    // A fresh connect() already installed the live handle.
                    other => other,
                };
                Ok(())
            }
            SessionEvent::Disconnected => {
                let mut state = self.state.lock().await;
                let current = std::mem::replace(&mut *state, SessionState::Disconnected);
                *state = match current {
                    SessionState::Connected(handle) => SessionState::AwaitingReconnect(handle),
                    other => other,
                };
                Ok(())
            }
            SessionEvent::Expired => self.connect().await,
        }
    }

    /// Wait for a live handle, bounded by the session timeout. A timeout here
    /// is fatal for the calling operation, never retried.
    pub(crate) async fn live_handle(&self) -> Result<Arc<dyn ZkHandle>> {
        let deadline = Instant::now() + self.session_timeout;
        loop {
            let notified = self.live.notified();
            tokio::pin!(notified);
            // Register before checking state so a wake-up between the check
            // and the await is not lost.
            notified.as_mut().enable();

            {
                let state = self.state.lock().await;
                if let SessionState::Connected(handle) = &*state {
                    return Ok(handle.clone());
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(StoreError::SessionWaitTimeout(self.session_timeout));
            }
            let _ = tokio::time::timeout(deadline - now, notified).await;
        }
    }

    pub(crate) async fn close(&self) {
        let mut state = self.state.lock().await;
        if let SessionState::Connected(handle) | SessionState::AwaitingReconnect(handle) =
            std::mem::replace(&mut *state, SessionState::Disconnected)
        {
            handle.close().await;
        }
    }
}
