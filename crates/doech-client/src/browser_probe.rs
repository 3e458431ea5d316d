use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Page};
use doech_core::error::AppError;
use doech_core::probe::filter_main_frame;
use doech_core::traits::Probe;
use futures::StreamExt;

/// Asks the measurement extension for its export and resolves with the reply.
const EXPORT_SCRIPT: &str = r#"
new Promise((resolve) => {
    const handleExport = (event) => {
        if (event?.data?.from === "doech" && event?.data?.to === "selenium" && event?.data?.action === "export") {
            window.removeEventListener("message", handleExport);
            resolve(event.data.data ?? null);
        }
    };
    window.addEventListener("message", handleExport);
    window.postMessage({ from: "selenium", to: "doech", action: "export" }, "*");
})
"#;

/// Settings for [`BrowserProbe`].
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Bound on one whole probe: navigation, settle time and export.
    pub timeout: Duration,
    /// Time the page is left alone after navigation so the extension can
    /// observe the load.
    pub settle_time: Duration,
    /// Unpacked extension to load into the browser.
    pub extension_dir: Option<PathBuf>,
    pub headless: bool,
    /// Keep only export entries for the top-level page load.
    pub main_frame_only: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            settle_time: Duration::from_secs(5),
            extension_dir: None,
            headless: true,
            main_frame_only: false,
        }
    }
}

/// Probe that loads each domain in Chromium and collects the extension's
/// export.
///
/// A single browser process is shared across all clones; every probe runs
/// in its own tab.
#[derive(Clone)]
pub struct BrowserProbe {
    browser: Arc<Browser>,
    options: ProbeOptions,
}

impl BrowserProbe {
    pub async fn launch(options: ProbeOptions) -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder().no_sandbox().disable_default_args();
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(bin) = locate_chrome() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        if options.headless {
            builder = builder.arg("--headless=new");
        }
        builder = builder
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-popup-blocking")
            .arg("--no-first-run");

        match &options.extension_dir {
            Some(dir) => {
                if !dir.is_dir() {
                    return Err(AppError::ConfigError(format!(
                        "Extension directory {} does not exist",
                        dir.display()
                    )));
                }
                builder = builder
                    .arg(format!("--disable-extensions-except={}", dir.display()))
                    .arg(format!("--load-extension={}", dir.display()));
            }
            None => {
                builder = builder.arg("--disable-extensions");
            }
        }

        let config = builder
            .build()
            .map_err(|e| AppError::ConfigError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::ProbeError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled for the connection to make progress.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
            options,
        })
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }

    async fn export(&self, page: &Page, url: &str) -> Result<serde_json::Value, AppError> {
        page.goto(url)
            .await
            .map_err(|e| AppError::ProbeError(format!("Failed to navigate to {url}: {e}")))?;

        tokio::time::sleep(self.options.settle_time).await;

        page.evaluate(EXPORT_SCRIPT)
            .await
            .map_err(|e| AppError::ProbeError(format!("Export script failed on {url}: {e}")))?
            .into_value::<serde_json::Value>()
            .map_err(|e| AppError::ProbeError(format!("Unreadable export from {url}: {e}")))
    }
}

impl Probe for BrowserProbe {
    async fn probe(&self, url: &str) -> Result<serde_json::Value, AppError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::ProbeError(format!("Failed to open tab: {e}")))?;

        let timeout = self.options.timeout;
        let result = tokio::time::timeout(timeout, self.export(&page, url)).await;

        if let Err(e) = page.close().await {
            tracing::debug!(%url, error = %e, "Failed to close tab");
        }

        let payload = match result {
            Ok(inner) => inner?,
            Err(_) => {
                return Err(AppError::ProbeError(format!(
                    "Probe of {url} timed out after {}s",
                    timeout.as_secs()
                )));
            }
        };

        if self.options.main_frame_only {
            Ok(filter_main_frame(payload))
        } else {
            Ok(payload)
        }
    }
}

/// Finds a Chrome/Chromium binary, preferring `CHROME_BIN`.
///
/// The snap wrapper at `/snap/bin/chromium` drops unknown flags, so the
/// real binary inside the snap is tried first. `None` leaves the lookup to
/// `chromiumoxide`.
fn locate_chrome() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    [
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}
