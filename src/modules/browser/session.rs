/// Automation sessions handed out by the pool
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use std::sync::Arc;

/// One long-lived automation resource (a headless browser instance)
#[async_trait]
pub trait BrowserSession: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Navigate to `url` and return the rendered page content
    async fn load_page(&self, url: &str) -> AppResult<String>;

    /// Must tolerate a session that is already gone
    async fn close(&self) -> AppResult<()>;
}

/// Creates new sessions when the pool has spare capacity
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> AppResult<Arc<dyn BrowserSession>>;
}
