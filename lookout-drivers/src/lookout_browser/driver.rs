use crate::lookout_browser::{
    fingerprint::{UserAgentManager, UserAgentProfile},
    stealth::{build_stealth_arguments, evasion_scripts},
};
use crate::session::{BrowserSession, DriverError, SessionFactory};
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder};
use lookout_common::BrowserSettings;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;
use webdriver::capabilities::Capabilities;

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight);";
const READ_SCROLL_HEIGHT: &str = "return document.body.scrollHeight;";

/// [`BrowserSession`] backed by a `fantoccini` WebDriver client.
pub struct FantocciniSession {
    client: Option<Client>,
    settings: BrowserSettings,
    profile: UserAgentProfile,
}

impl FantocciniSession {
    /// Start a browser through the WebDriver endpoint in `settings`.
    pub async fn connect(settings: &BrowserSettings) -> Result<Self, DriverError> {
        let profile = UserAgentManager::new().pick();
        let args = build_stealth_arguments(settings.stealth, &profile, settings.headless);

        let mut caps = Capabilities::new();
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&settings.webdriver_url)
            .await
            .map_err(|e| DriverError::Connect(e.to_string()))?;

        debug!(
            target: "browser.session",
            webdriver = %settings.webdriver_url,
            headless = settings.headless,
            "browser session opened"
        );

        Ok(Self {
            client: Some(client),
            settings: settings.clone(),
            profile,
        })
    }

    fn client(&self) -> Result<&Client, DriverError> {
        self.client.as_ref().ok_or(DriverError::Closed)
    }

    async fn apply_evasions(&self) -> Result<(), DriverError> {
        let client = self.client()?;
        for script in evasion_scripts(self.settings.stealth, &self.profile) {
            client
                .execute(&script, vec![])
                .await
                .map_err(|e| DriverError::Command(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for FantocciniSession {
    async fn navigate(&mut self, url: &Url) -> Result<String, DriverError> {
        let client = self.client()?;
        let timeout = self.settings.page_load_timeout();
        let nav_err = |reason: String| DriverError::Navigation {
            url: url.to_string(),
            reason,
        };

        match tokio::time::timeout(timeout, client.goto(url.as_str())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(nav_err(e.to_string())),
            Err(_) => return Err(nav_err(format!("timed out after {}s", timeout.as_secs()))),
        }

        // A page that loaded but rejected the scripts is still usable.
        if let Err(e) = self.apply_evasions().await {
            warn!(target: "browser.stealth", error = %e, "evasion scripts failed");
        }

        self.page_markup().await
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError> {
        self.client()?
            .execute(SCROLL_TO_BOTTOM, vec![])
            .await
            .map(|_| ())
            .map_err(|e| DriverError::Command(e.to_string()))
    }

    async fn scroll_height(&mut self) -> Result<u64, DriverError> {
        let value = self
            .client()?
            .execute(READ_SCROLL_HEIGHT, vec![])
            .await
            .map_err(|e| DriverError::Command(e.to_string()))?;
        value
            .as_u64()
            .or_else(|| value.as_f64().map(|h| h.max(0.0) as u64))
            .ok_or_else(|| DriverError::Command(format!("unexpected scroll height: {value}")))
    }

    async fn page_markup(&mut self) -> Result<String, DriverError> {
        self.client()?
            .source()
            .await
            .map_err(|e| DriverError::Command(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        match self.client.take() {
            Some(client) => {
                client
                    .close()
                    .await
                    .map_err(|e| DriverError::Command(e.to_string()))?;
                debug!(target: "browser.session", "browser session closed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Opens a fresh [`FantocciniSession`] per call.
#[derive(Debug, Clone)]
pub struct FantocciniFactory {
    settings: BrowserSettings,
}

impl FantocciniFactory {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }
}

#[async_trait]
impl SessionFactory for FantocciniFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, DriverError> {
        let session = FantocciniSession::connect(&self.settings).await?;
        Ok(Box::new(session))
    }
}
