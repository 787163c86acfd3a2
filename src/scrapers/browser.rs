//! Headless Chromium sessions for JS-rendered listings.
//!
//! Launching tries an ordered list of provisioning strategies with the same
//! configuration, stopping at the first that yields a running browser:
//!
//! 1. the configured binary path (default `/usr/bin/chromium`), if it exists
//! 2. the first known browser name found on `PATH`
//! 3. chromiumoxide's own executable detection

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::FetchError;

/// Browser names searched on `PATH` by the second provisioning strategy.
pub const PATH_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

/// Interval between readiness checks while waiting for a control.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launch and navigation settings shared by every provisioning attempt.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Preferred browser binary.
    pub binary_path: Option<PathBuf>,
    /// Window size in pixels.
    pub window: (u32, u32),
    pub user_agent: String,
    /// Per-command timeout for navigation.
    pub request_timeout: Duration,
    /// How long to wait for a control to appear before giving up.
    pub click_timeout: Duration,
    /// Pause after a click so the page can re-render.
    pub settle_delay: Duration,
    /// Pause between sequential page visits.
    pub request_delay: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            binary_path: Some(PathBuf::from("/usr/bin/chromium")),
            window: (1920, 1080),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36".to_string(),
            request_timeout: Duration::from_secs(30),
            click_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_millis(1500),
            request_delay: Duration::from_millis(500),
        }
    }
}

/// How the browser binary is located for one launch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioning {
    /// Explicitly configured binary.
    Configured(PathBuf),
    /// Binary found by searching `PATH`.
    SearchPath(PathBuf),
    /// Let chromiumoxide find an installed browser.
    AutoDetect,
}

impl Provisioning {
    pub fn executable(&self) -> Option<&PathBuf> {
        match self {
            Provisioning::Configured(path) | Provisioning::SearchPath(path) => Some(path),
            Provisioning::AutoDetect => None,
        }
    }
}

impl fmt::Display for Provisioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provisioning::Configured(path) => write!(f, "configured binary {}", path.display()),
            Provisioning::SearchPath(path) => write!(f, "PATH binary {}", path.display()),
            Provisioning::AutoDetect => f.write_str("auto-detection"),
        }
    }
}

/// Ordered launch attempts for these options. Always ends with auto-detection.
pub fn provisioning_plan(options: &BrowserOptions) -> Vec<Provisioning> {
    let mut plan = Vec::new();

    if let Some(path) = &options.binary_path {
        if path.exists() {
            plan.push(Provisioning::Configured(path.clone()));
        } else {
            debug!("Configured browser {} does not exist", path.display());
        }
    }

    let on_path = PATH_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok());
    if let Some(found) = on_path {
        if options.binary_path.as_ref() != Some(&found) {
            plan.push(Provisioning::SearchPath(found));
        }
    }

    plan.push(Provisioning::AutoDetect);
    plan
}

/// Launches browser sessions.
#[derive(Debug, Clone)]
pub struct BrowserFetcher {
    options: BrowserOptions,
}

impl BrowserFetcher {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    /// Start a browser, trying each provisioning strategy in turn.
    pub async fn launch(&self) -> Result<BrowserSession, FetchError> {
        let mut last_error = None;

        for strategy in provisioning_plan(&self.options) {
            match BrowserSession::start(&self.options, &strategy).await {
                Ok(session) => {
                    info!("Browser started via {}", strategy);
                    return Ok(session);
                }
                Err(e) => {
                    warn!("Browser launch via {} failed: {}", strategy, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(FetchError::BrowserUnavailable))
    }
}

#[cfg(feature = "browser")]
pub use session::BrowserSession;

#[cfg(feature = "browser")]
mod session {
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use chromiumoxide::Page;
    use futures::StreamExt;
    use tokio::task::JoinHandle;
    use tracing::debug;

    use super::{BrowserOptions, Provisioning, POLL_INTERVAL};
    use crate::scrapers::FetchError;

    fn cdp_error(e: impl std::fmt::Display) -> FetchError {
        FetchError::Browser(e.to_string())
    }

    /// A running headless browser with one open tab.
    pub struct BrowserSession {
        browser: Browser,
        handler: JoinHandle<()>,
        page: Page,
        options: BrowserOptions,
    }

    impl BrowserSession {
        pub(super) async fn start(
            options: &BrowserOptions,
            strategy: &Provisioning,
        ) -> Result<Self, FetchError> {
            let (width, height) = options.window;
            let mut builder = BrowserConfig::builder()
                .window_size(width, height)
                .request_timeout(options.request_timeout)
                .no_sandbox()
                .arg("--disable-dev-shm-usage")
                .arg("--disable-gpu")
                .arg("--disable-extensions")
                .arg(format!("--user-agent={}", options.user_agent));
            if let Some(path) = strategy.executable() {
                builder = builder.chrome_executable(path);
            }
            let config = builder.build().map_err(FetchError::Browser)?;

            let (browser, mut events) = Browser::launch(config).await.map_err(cdp_error)?;
            let handler = tokio::spawn(async move { while events.next().await.is_some() {} });

            let page = match browser.new_page("about:blank").await {
                Ok(page) => page,
                Err(e) => {
                    handler.abort();
                    return Err(cdp_error(e));
                }
            };

            Ok(Self {
                browser,
                handler,
                page,
                options: options.clone(),
            })
        }

        /// Navigate and return the rendered HTML.
        pub async fn open(&self, url: &str) -> Result<String, FetchError> {
            debug!("Rendering {}", url);
            self.page.goto(url).await.map_err(cdp_error)?;
            self.page.content().await.map_err(cdp_error)
        }

        /// Wait for `selector` to appear, bounded by the click timeout, then click it.
        pub async fn click_when_ready(&self, selector: &str) -> Result<(), FetchError> {
            let waited = self.options.click_timeout;
            let element = tokio::time::timeout(waited, async {
                loop {
                    if let Ok(element) = self.page.find_element(selector).await {
                        return element;
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            })
            .await
            .map_err(|_| FetchError::Timeout {
                selector: selector.to_string(),
                waited,
            })?;

            element.click().await.map_err(cdp_error)?;
            tokio::time::sleep(self.options.settle_delay).await;
            Ok(())
        }

        /// Current rendered HTML of the open tab.
        pub async fn content(&self) -> Result<String, FetchError> {
            self.page.content().await.map_err(cdp_error)
        }

        /// Navigate and return the visible text of the element matching `selector`.
        pub async fn inner_text(&self, url: &str, selector: &str) -> Result<String, FetchError> {
            self.page.goto(url).await.map_err(cdp_error)?;
            let element = self.page.find_element(selector).await.map_err(cdp_error)?;
            let text = element.inner_text().await.map_err(cdp_error)?;
            Ok(text.unwrap_or_default())
        }

        pub fn options(&self) -> &BrowserOptions {
            &self.options
        }

        /// Shut the browser down. Errors are logged, never returned.
        pub async fn close(mut self) {
            if let Err(e) = self.browser.close().await {
                debug!("Browser close failed: {}", e);
            }
            self.handler.abort();
        }
    }
}

#[cfg(not(feature = "browser"))]
pub use disabled::BrowserSession;

#[cfg(not(feature = "browser"))]
mod disabled {
    use std::convert::Infallible;

    use super::{BrowserOptions, Provisioning};
    use crate::scrapers::FetchError;

    /// Stand-in when the crate is built without the `browser` feature. Cannot
    /// be constructed; every launch attempt reports the browser as unavailable.
    pub struct BrowserSession {
        never: Infallible,
    }

    impl BrowserSession {
        pub(super) async fn start(
            _options: &BrowserOptions,
            _strategy: &Provisioning,
        ) -> Result<Self, FetchError> {
            Err(FetchError::BrowserUnavailable)
        }

        pub async fn open(&self, _url: &str) -> Result<String, FetchError> {
            match self.never {}
        }

        pub async fn click_when_ready(&self, _selector: &str) -> Result<(), FetchError> {
            match self.never {}
        }

        pub async fn content(&self) -> Result<String, FetchError> {
            match self.never {}
        }

        pub async fn inner_text(&self, _url: &str, _selector: &str) -> Result<String, FetchError> {
            match self.never {}
        }

        pub fn options(&self) -> &BrowserOptions {
            match self.never {}
        }

        pub async fn close(self) {
            match self.never {}
        }
    }
}
