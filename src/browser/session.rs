use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;

use super::launcher;

/// One Chrome instance with a single page the tour runs in.
pub struct BrowserSession {
    browser: Browser,
    _handler_task: tokio::task::JoinHandle<()>,
    page: Page,
    headless: bool,
    // Removed on drop, after Chrome is gone.
    _profile: tempfile::TempDir,
}

impl BrowserSession {
    /// Launch Chrome with a throwaway profile and open a blank page.
    pub async fn launch(headless: bool) -> Result<Self> {
        let profile = tempfile::tempdir().context("Failed to create Chrome profile dir")?;
        let chrome = launcher::find_chrome_binary()?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome)
            .user_data_dir(profile.path())
            .window_size(launcher::WINDOW_WIDTH, launcher::WINDOW_HEIGHT);
        if !headless {
            builder = builder.with_head();
        }
        for arg in launcher::default_chrome_args(headless) {
            builder = builder.arg(arg);
        }
        let config = builder.build().map_err(|e| anyhow::anyhow!("{}", e))?;

        let (browser, mut handler) =
            Browser::launch(config).await.context("Failed to launch Chrome")?;

        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to create initial page")?;

        tracing::info!("Browser session started (headless: {})", headless);

        Ok(Self {
            browser,
            _handler_task: handler_task,
            page,
            headless,
            _profile: profile,
        })
    }

    pub fn page(&self) -> Page {
        self.page.clone()
    }

    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await.context("Failed to close Chrome")?;
        let _ = self.browser.wait().await;
        Ok(())
    }

    pub fn is_headless(&self) -> bool {
        self.headless
    }
}
