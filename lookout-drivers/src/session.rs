use async_trait::async_trait;
use lookout_common::LookoutError;
use url::Url;

/// Failures surfaced by a browser session.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("webdriver command failed: {0}")]
    Command(String),

    #[error("could not start browser session: {0}")]
    Connect(String),

    #[error("session already closed")]
    Closed,
}

impl From<DriverError> for LookoutError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Navigation { .. } => LookoutError::Navigation(err.to_string()),
            other => LookoutError::Driver(other.to_string()),
        }
    }
}

/// One live browser instance.
///
/// Implementations hold no business logic. Calls are sequential: a job drives
/// its session from a single task.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Load `url` and return the rendered markup.
    async fn navigate(&mut self, url: &Url) -> Result<String, DriverError>;

    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError>;

    /// Current document scroll height in pixels.
    async fn scroll_height(&mut self) -> Result<u64, DriverError>;

    /// Markup of the page as currently rendered.
    async fn page_markup(&mut self) -> Result<String, DriverError>;

    /// Release the browser. Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), DriverError>;
}

#[async_trait]
impl<T: BrowserSession + ?Sized> BrowserSession for Box<T> {
    async fn navigate(&mut self, url: &Url) -> Result<String, DriverError> {
        (**self).navigate(url).await
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError> {
        (**self).scroll_to_bottom().await
    }

    async fn scroll_height(&mut self) -> Result<u64, DriverError> {
        (**self).scroll_height().await
    }

    async fn page_markup(&mut self) -> Result<String, DriverError> {
        (**self).page_markup().await
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        (**self).close().await
    }
}

/// Opens browser sessions. Each job asks for exactly one.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, DriverError>;
}
