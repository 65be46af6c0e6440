/// Headless Chromium sessions over the DevTools protocol
///
/// Each session owns one browser process. The CDP handler stream is driven on
/// its own task; once that task ends the connection is gone and the pool
/// replaces the session on its next lease.
use crate::modules::browser::session::{BrowserSession, SessionLauncher};
use crate::shared::errors::{AppError, AppResult};
use crate::{log_debug, log_warn};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    pub no_sandbox: bool,
    pub navigation_timeout: Duration,
}

impl Default for ChromiumLauncher {
    fn default() -> Self {
        Self {
            no_sandbox: true,
            navigation_timeout: Duration::from_secs(30),
        }
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> AppResult<Arc<dyn BrowserSession>> {
        let mut builder = BrowserConfig::builder().request_timeout(self.navigation_timeout);
        if self.no_sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder
            .build()
            .map_err(|e| AppError::BrowserError(format!("Invalid browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch Chromium: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log_debug!("Chromium handler stopped: {}", e);
                    break;
                }
            }
        });

        Ok(Arc::new(ChromiumSession {
            browser: Mutex::new(browser),
            handler_task,
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct ChromiumSession {
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
    closed: AtomicBool,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.handler_task.is_finished()
    }

    async fn load_page(&self, url: &str) -> AppResult<String> {
        if !self.is_connected() {
            return Err(AppError::BrowserError("Session is disconnected".to_string()));
        }

        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page(url)
                .await
                .map_err(|e| AppError::BrowserError(format!("Failed to open {}: {}", url, e)))?
        };

        let content = match page.wait_for_navigation().await {
            Ok(page) => page.content().await,
            Err(e) => Err(e),
        };

        if let Err(e) = page.close().await {
            log_warn!("Failed to close page for {}: {}", url, e);
        }

        content.map_err(|e| AppError::BrowserError(format!("Failed to read {}: {}", url, e)))
    }

    async fn close(&self) -> AppResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let result = {
            let mut browser = self.browser.lock().await;
            browser.close().await.map(|_| ())
        };
        self.handler_task.abort();

        match result {
            Ok(()) => Ok(()),
            // Already gone counts as closed
            Err(e) if self.handler_task.is_finished() => {
                log_debug!("Chromium close after disconnect: {}", e);
                Ok(())
            }
            Err(e) => Err(AppError::BrowserError(format!("Failed to close Chromium: {}", e))),
        }
    }
}
