use crate::utils::error::{Result, SessionError};
use async_trait::async_trait;
use std::time::Duration;

pub type SessionResult<T> = std::result::Result<T, SessionError>;

pub trait ConfigProvider: Send + Sync {
    fn target_url(&self) -> &str;
    fn output_path(&self) -> &str;
    fn page_count(&self) -> usize;
}

/// The capabilities a scrape needs from a live browser page.
///
/// Element handles are opaque and may go stale at any time: every call that
/// touches one can fail with [`SessionError::Stale`].
#[async_trait]
pub trait BrowsingSession: Send + Sync {
    type Element: Clone + Send + Sync;

    async fn goto(&self, url: &str) -> SessionResult<()>;

    async fn find_all(&self, selector: &str) -> SessionResult<Vec<Self::Element>>;

    async fn find_within(
        &self,
        parent: &Self::Element,
        selector: &str,
    ) -> SessionResult<Self::Element>;

    async fn find_all_within(
        &self,
        parent: &Self::Element,
        selector: &str,
    ) -> SessionResult<Vec<Self::Element>>;

    /// Waits until an element matching `selector` is displayed and enabled.
    async fn wait_clickable(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> SessionResult<Self::Element>;

    async fn click(&self, element: &Self::Element) -> SessionResult<()>;

    /// Clicks through script, for controls covered by overlays.
    async fn force_click(&self, element: &Self::Element) -> SessionResult<()>;

    /// Text content of the element with surrounding whitespace removed.
    async fn text(&self, element: &Self::Element) -> SessionResult<String>;

    /// Ends the session and releases the browser.
    async fn close(self) -> SessionResult<()>;
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: BrowsingSession;

    async fn open(&self) -> SessionResult<Self::Session>;
}

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Location of `path` as shown to the user.
    fn describe(&self, path: &str) -> String;
}
