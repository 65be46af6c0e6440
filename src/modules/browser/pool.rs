/// Pool of automation sessions
///
/// Sessions are created lazily up to `capacity`, leased to one task at a time,
/// and replaced when they lose their connection. All mutation goes through the
/// pool's own lock, so concurrent `acquire` calls are safe.
use crate::modules::browser::session::{BrowserSession, SessionLauncher};
use crate::shared::errors::AppResult;
use crate::{log_debug, log_info, log_warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Default)]
struct PoolState {
    idle: Vec<Arc<dyn BrowserSession>>,
    all: Vec<Arc<dyn BrowserSession>>,
    /// Launched plus launching
    reserved: usize,
}

impl PoolState {
    fn forget(&mut self, session: &Arc<dyn BrowserSession>) {
        let before = self.all.len();
        self.all.retain(|candidate| !Arc::ptr_eq(candidate, session));
        if self.all.len() < before {
            self.reserved = self.reserved.saturating_sub(1);
        }
    }
}

pub struct SessionPool {
    launcher: Arc<dyn SessionLauncher>,
    capacity: usize,
    poll_interval: Duration,
    state: Mutex<PoolState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub total: usize,
    pub idle: usize,
    pub capacity: usize,
}

impl SessionPool {
    pub fn new(launcher: Arc<dyn SessionLauncher>, capacity: usize, poll_interval: Duration) -> Self {
        Self {
            launcher,
            capacity: capacity.max(1),
            poll_interval,
            state: Mutex::new(PoolState::default()),
        }
    }

    /// Lease a connected session, waiting for one to be released at capacity
    pub async fn acquire(&self) -> AppResult<Arc<dyn BrowserSession>> {
        loop {
            let mut state = self.state.lock().await;

            while let Some(session) = state.idle.pop() {
                if session.is_connected() {
                    return Ok(session);
                }
                log_warn!("Discarding disconnected browser session");
                state.forget(&session);
                Self::close_quietly(session).await;
            }

            if state.reserved < self.capacity {
                state.reserved += 1;
                drop(state);

                return match self.launcher.launch().await {
                    Ok(session) => {
                        let mut state = self.state.lock().await;
                        state.all.push(session.clone());
                        log_info!(
                            "Launched browser session ({}/{})",
                            state.all.len(),
                            self.capacity
                        );
                        Ok(session)
                    }
                    Err(e) => {
                        let mut state = self.state.lock().await;
                        state.reserved = state.reserved.saturating_sub(1);
                        Err(e)
                    }
                };
            }

            drop(state);
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Return a leased session; a disconnected one frees its slot instead
    pub async fn release(&self, session: Arc<dyn BrowserSession>) {
        let mut state = self.state.lock().await;
        if session.is_connected() {
            state.idle.push(session);
        } else {
            log_debug!("Released session is disconnected, dropping it from the pool");
            state.forget(&session);
            drop(state);
            Self::close_quietly(session).await;
        }
    }

    /// Close every session, leased or idle. Close failures are logged and skipped.
    pub async fn close_all(&self) -> usize {
        let sessions = {
            let mut state = self.state.lock().await;
            state.idle.clear();
            state.reserved = state.reserved.saturating_sub(state.all.len());
            std::mem::take(&mut state.all)
        };

        let mut closed = 0;
        for session in sessions {
            match session.close().await {
                Ok(()) => closed += 1,
                Err(e) => log_warn!("Failed to close browser session: {}", e),
            }
        }
        if closed > 0 {
            log_info!("Closed {} browser session(s)", closed);
        }
        closed
    }

    pub async fn stats(&self) -> PoolStats {
        let state = self.state.lock().await;
        PoolStats {
            total: state.all.len(),
            idle: state.idle.len(),
            capacity: self.capacity,
        }
    }

    async fn close_quietly(session: Arc<dyn BrowserSession>) {
        if let Err(e) = session.close().await {
            log_debug!("Ignoring close error on stale session: {}", e);
        }
    }
}
