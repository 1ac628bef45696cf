use crate::config::settings::BrowserSettings;
use crate::domain::ports::{BrowsingSession, SessionFactory, SessionResult};
use crate::utils::error::SessionError;
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::{CmdError, ErrorStatus};
use fantoccini::{Client, ClientBuilder, Locator};
use std::time::Duration;
use tokio::time::Instant;

const CLICKABLE_POLL: Duration = Duration::from_millis(200);

/// Switches passed to Chrome on every run.
const BASE_CHROME_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--log-level=3",
    "--start-maximized",
];

fn session_error(error: CmdError, selector: &str) -> SessionError {
    if error.is_no_such_element() {
        return SessionError::not_found(selector);
    }
    match &error {
        CmdError::Standard(e) if e.error == ErrorStatus::StaleElementReference => {
            SessionError::Stale
        }
        CmdError::Standard(e)
            if matches!(
                e.error,
                ErrorStatus::ElementNotInteractable | ErrorStatus::ElementClickIntercepted
            ) =>
        {
            SessionError::Timeout {
                selector: selector.to_string(),
            }
        }
        CmdError::WaitTimeout => SessionError::Timeout {
            selector: selector.to_string(),
        },
        _ => SessionError::transport(error.to_string()),
    }
}

/// A live Chrome page driven over the WebDriver protocol.
pub struct WebDriverSession {
    client: Client,
}

impl WebDriverSession {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn is_clickable(&self, element: &Element, selector: &str) -> SessionResult<bool> {
        let displayed = element
            .is_displayed()
            .await
            .map_err(|e| session_error(e, selector))?;
        if !displayed {
            return Ok(false);
        }
        element
            .is_enabled()
            .await
            .map_err(|e| session_error(e, selector))
    }
}

#[async_trait]
impl BrowsingSession for WebDriverSession {
    type Element = Element;

    async fn goto(&self, url: &str) -> SessionResult<()> {
        tracing::debug!("navigating to {}", url);
        self.client
            .goto(url)
            .await
            .map_err(|e| SessionError::transport(format!("navigation to {} failed: {}", url, e)))
    }

    async fn find_all(&self, selector: &str) -> SessionResult<Vec<Element>> {
        match self.client.find_all(Locator::Css(selector)).await {
            Ok(elements) => Ok(elements),
            Err(e) if e.is_no_such_element() => Ok(Vec::new()),
            Err(e) => Err(session_error(e, selector)),
        }
    }

    async fn find_within(&self, parent: &Element, selector: &str) -> SessionResult<Element> {
        parent
            .find(Locator::Css(selector))
            .await
            .map_err(|e| session_error(e, selector))
    }

    async fn find_all_within(&self, parent: &Element, selector: &str) -> SessionResult<Vec<Element>> {
        match parent.find_all(Locator::Css(selector)).await {
            Ok(elements) => Ok(elements),
            Err(e) if e.is_no_such_element() => Ok(Vec::new()),
            Err(e) => Err(session_error(e, selector)),
        }
    }

    async fn wait_clickable(&self, selector: &str, timeout: Duration) -> SessionResult<Element> {
        let deadline = Instant::now() + timeout;
        let element = self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
            .map_err(|e| session_error(e, selector))?;

        loop {
            if self.is_clickable(&element, selector).await? {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(SessionError::Timeout {
                    selector: selector.to_string(),
                });
            }
            tokio::time::sleep(CLICKABLE_POLL).await;
        }
    }

    async fn click(&self, element: &Element) -> SessionResult<()> {
        element
            .click()
            .await
            .map_err(|e| session_error(e, "clicked element"))
    }

    async fn force_click(&self, element: &Element) -> SessionResult<()> {
        let target = serde_json::to_value(element)
            .map_err(|e| SessionError::transport(format!("cannot reference element: {}", e)))?;
        self.client
            .execute("arguments[0].click();", vec![target])
            .await
            .map(|_| ())
            .map_err(|e| session_error(e, "clicked element"))
    }

    async fn text(&self, element: &Element) -> SessionResult<String> {
        element
            .text()
            .await
            .map(|text| text.trim().to_string())
            .map_err(|e| session_error(e, "element text"))
    }

    async fn close(self) -> SessionResult<()> {
        self.client
            .close()
            .await
            .map_err(|e| SessionError::transport(e.to_string()))
    }
}

/// Connects to a running chromedriver and opens a Chrome session.
pub struct WebDriverFactory {
    browser: BrowserSettings,
}

impl WebDriverFactory {
    pub fn new(browser: BrowserSettings) -> Self {
        Self { browser }
    }

    pub fn capabilities(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut args: Vec<String> = BASE_CHROME_ARGS.iter().map(|a| a.to_string()).collect();
        if self.browser.headless {
            args.insert(0, "--headless".to_string());
        }
        args.extend(self.browser.args.iter().cloned());

        let mut capabilities = serde_json::Map::new();
        capabilities.insert(
            "goog:chromeOptions".to_string(),
            serde_json::json!({
                "args": args,
                "excludeSwitches": ["enable-logging"],
            }),
        );
        capabilities
    }
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    type Session = WebDriverSession;

    async fn open(&self) -> SessionResult<WebDriverSession> {
        tracing::info!("🌐 Connecting to WebDriver at {}", self.browser.webdriver_url);
        let client = ClientBuilder::native()
            .capabilities(self.capabilities())
            .connect(&self.browser.webdriver_url)
            .await
            .map_err(|e| {
                SessionError::transport(format!(
                    "cannot open a session on {}: {}",
                    self.browser.webdriver_url, e
                ))
            })?;
        Ok(WebDriverSession::new(client))
    }
}
