use rmcp::model::*;
use rmcp::tool;
use rmcp::{Error as McpError, ServerHandler};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::browser::{capture, BrowserSession};
use crate::config::TourkitConfig;
use crate::dom::DomTree;
use crate::error::TourError;
use crate::model::{now_ms, ThemeSettings, TooltipStyle};
use crate::player::{Advance, StartOutcome};
use crate::selectors::r#ref::RefTable;
use crate::store::{FileKv, KeyValueStore, MemoryKv, TourStore};
use crate::tools::{authoring, page, playback};
use crate::widget::{MountOptions, Widget};

const DEFAULT_SETTLE_MS: u64 = 100;

/// Everything tied to the page currently open in the browser.
#[derive(Default)]
struct ServerState {
    page: Option<DomTree>,
    /// Refs handed out by the last `discover_steps`.
    refs: RefTable,
    widget: Option<Widget>,
}

/// The MCP server that drives tour authoring and playback against a live page.
#[derive(Clone)]
pub struct TourkitServer {
    session: Arc<Mutex<Option<BrowserSession>>>,
    state: Arc<Mutex<ServerState>>,
    store: Arc<dyn TourStore>,
    project_id: Option<String>,
    kv_path: Option<PathBuf>,
    config: Arc<TourkitConfig>,
    headless: bool,
}

impl TourkitServer {
    /// `project_id` names the project the widget mounts on the first page
    /// load; without one only the stateless tools work.
    pub fn new(
        headless: bool,
        store: Arc<dyn TourStore>,
        project_id: Option<String>,
        kv_path: Option<PathBuf>,
        config: TourkitConfig,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(None)),
            state: Arc::new(Mutex::new(ServerState::default())),
            store,
            project_id,
            kv_path,
            config: Arc::new(config),
            headless,
        }
    }

    /// Close Chrome if it was launched.
    pub async fn shutdown(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            if let Err(e) = session.close().await {
                tracing::warn!("Failed to close browser: {}", e);
            }
        }
    }

    async fn ensure_browser(&self) -> Result<(), McpError> {
        let mut session = self.session.lock().await;
        if session.is_none() {
            tracing::info!("Launching browser (headless: {})", self.headless);
            let s = BrowserSession::launch(self.headless).await.map_err(|e| {
                McpError::internal_error(format!("Failed to launch browser: {}", e), None)
            })?;
            *session = Some(s);
        }
        Ok(())
    }

    async fn with_page<F, Fut, T>(&self, f: F) -> Result<T, McpError>
    where
        F: FnOnce(chromiumoxide::page::Page) -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        self.ensure_browser().await?;
        let page = {
            let session = self.session.lock().await;
            session
                .as_ref()
                .map(BrowserSession::page)
                .ok_or_else(|| McpError::internal_error("Browser is not running", None))?
        };
        f(page).await.map_err(|e| McpError::internal_error(format!("{:#}", e), None))
    }

    /// Mirror a scroll the player applied to the page model onto the live page.
    async fn sync_scroll(&self, before: (f64, f64), tree: &DomTree) -> Result<(), McpError> {
        let after = tree.scroll_offset();
        if before == (after.x, after.y) {
            return Ok(());
        }
        self.with_page(|page| async move {
            page.evaluate(format!("window.scrollTo({}, {})", after.x, after.y))
                .await
                .map(|_| ())
                .map_err(anyhow::Error::from)
        })
        .await
    }

    async fn mount_widget(&self, state: &mut ServerState) -> Result<(), McpError> {
        let Some(project_id) = self.project_id.clone() else {
            return Ok(());
        };
        if state.widget.is_some() {
            return Ok(());
        }
        let kv: Box<dyn KeyValueStore + Send + Sync> = match &self.kv_path {
            Some(path) => Box::new(FileKv::open(path).map_err(|e| {
                McpError::internal_error(format!("Failed to open {}: {}", path.display(), e), None)
            })?),
            None => Box::new(MemoryKv::new()),
        };
        let options = MountOptions {
            project_id,
            auto_start: None,
            show_admin_panel: None,
        };
        let widget = Widget::mount(self.store.clone(), kv, options, (*self.config).clone(), now_ms())
            .await
            .map_err(tour_error)?;
        state.widget = Some(widget);
        Ok(())
    }

    /// Load a continuation url and start the tour there.
    async fn follow(
        &self,
        widget: &mut Widget,
        url: &str,
        tour_id: Option<&str>,
    ) -> Result<(DomTree, Option<StartOutcome>), McpError> {
        tracing::info!("Continuing tour at {}", url);
        let path = url.to_string();
        let mut tree = self
            .with_page(|page| async move { capture::navigate_path(&page, &path).await })
            .await?;
        let outcome = match tour_id {
            Some(id) => Some(widget.start_tour(&mut tree, id, now_ms()).map_err(tour_error)?),
            None => widget.on_page_load(&mut tree, now_ms()).map_err(tour_error)?,
        };
        Ok((tree, outcome))
    }

    fn text_result(msg: impl Into<String>) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(msg)]))
    }

    fn json_result(value: impl serde::Serialize) -> Result<CallToolResult, McpError> {
        let text = serde_json::to_string_pretty(&value)
            .map_err(|e| McpError::internal_error(format!("JSON error: {}", e), None))?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

fn tour_error(e: TourError) -> McpError {
    match e {
        TourError::Store(_) => McpError::internal_error(e.to_string(), None),
        _ => McpError::invalid_params(e.to_string(), None),
    }
}

fn invalid(e: anyhow::Error) -> McpError {
    McpError::invalid_params(format!("{:#}", e), None)
}

fn no_page() -> McpError {
    McpError::invalid_params("No page open; call open_page first", None)
}

fn no_project() -> McpError {
    McpError::invalid_params("No project loaded; start the server with --catalog", None)
}

/// Borrow the page model and the widget together.
fn page_and_widget(state: &mut ServerState) -> Result<(&mut DomTree, &mut Widget), McpError> {
    let ServerState { page, widget, .. } = state;
    let widget = widget.as_mut().ok_or_else(no_project)?;
    let page = page.as_mut().ok_or_else(no_page)?;
    Ok((page, widget))
}

fn scroll_of(tree: &DomTree) -> (f64, f64) {
    let p = tree.scroll_offset();
    (p.x, p.y)
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct OpenPageReport {
    page: page::PageSummary,
    auto_play: Option<StartOutcome>,
    current: Option<crate::player::StepView>,
}

#[tool(tool_box)]
impl ServerHandler for TourkitServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "tourkit: author and play product tours on a live page. \
                 Start with `open_page`, then `discover_steps` or `capture_selector` to author, \
                 and `start_tour` / `next_step` to play."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tool(tool_box)]
impl TourkitServer {
    // ── Page ────────────────────────────────────────────────────────────

    #[tool(description = "Open a URL, capture its layout, and auto-play any due tour for that page.")]
    async fn open_page(
        &self,
        #[tool(aggr)] params: page::OpenPageParams,
    ) -> Result<CallToolResult, McpError> {
        let settle = Duration::from_millis(params.settle_ms.unwrap_or(DEFAULT_SETTLE_MS));
        let url = params.url;
        let mut tree = self
            .with_page(|page| async move { capture::open(&page, &url, settle).await })
            .await?;

        let mut state = self.state.lock().await;
        self.mount_widget(&mut state).await?;
        let mut auto_play = None;
        if let Some(widget) = state.widget.as_mut() {
            let before = scroll_of(&tree);
            auto_play = widget.on_page_load(&mut tree, now_ms()).map_err(tour_error)?;
            if let Some(StartOutcome::Navigate { url }) = &auto_play {
                let (moved, outcome) = self.follow(widget, url, None).await?;
                tree = moved;
                auto_play = outcome;
            } else {
                self.sync_scroll(before, &tree).await?;
            }
        }
        let current = state.widget.as_ref().and_then(|w| w.player().current());
        let report = OpenPageReport {
            page: page::summarize(&tree),
            auto_play,
            current,
        };
        state.refs = RefTable::default();
        state.page = Some(tree);
        Self::json_result(report)
    }

    #[tool(description = "Re-read scroll and layout from the live page (optionally scrolling first) and re-place the active tooltip.")]
    async fn sync_viewport(
        &self,
        #[tool(aggr)] params: page::SyncViewportParams,
    ) -> Result<CallToolResult, McpError> {
        let mut state = self.state.lock().await;
        let previous = state.page.as_ref().map(scroll_of).ok_or_else(no_page)?;
        let (x, y) = (
            params.scroll_x.unwrap_or(previous.0),
            params.scroll_y.unwrap_or(previous.1),
        );
        let mut tree = self
            .with_page(|page| async move { capture::scroll_to(&page, x, y).await })
            .await?;
        let before = scroll_of(&tree);
        if let Some(widget) = state.widget.as_mut() {
            widget.on_viewport_change(&mut tree);
        }
        self.sync_scroll(before, &tree).await?;
        let current = state.widget.as_ref().and_then(|w| w.player().current());
        let summary = page::summarize(&tree);
        state.page = Some(tree);
        match current {
            Some(view) => Self::json_result(view),
            None => Self::json_result(summary),
        }
    }

    // ── Authoring ───────────────────────────────────────────────────────

    #[tool(description = "Compute a stable CSS selector for an element given by ref (e1, e2, ...) or CSS selector.")]
    async fn capture_selector(
        &self,
        #[tool(aggr)] params: authoring::CaptureSelectorParams,
    ) -> Result<CallToolResult, McpError> {
        let state = self.state.lock().await;
        let tree = state.page.as_ref().ok_or_else(no_page)?;
        let result = authoring::capture_selector(tree, &state.refs, &params, self.config.capture_options())
            .map_err(invalid)?;
        Self::json_result(result)
    }

    #[tool(description = "Detect the page's brand color, font and corner radius, and the tooltip theme they produce.")]
    async fn detect_branding(&self) -> Result<CallToolResult, McpError> {
        let state = self.state.lock().await;
        let tree = state.page.as_ref().ok_or_else(no_page)?;
        let settings = match &state.widget {
            Some(widget) => widget.state().project.theme_settings.clone(),
            None => ThemeSettings {
                tooltip_style: TooltipStyle::Auto,
                ..Default::default()
            },
        };
        Self::json_result(page::branding_report(tree, &settings))
    }

    #[tool(description = "Propose tour steps from the page's interactive elements in reading order. Returns refs usable as targets.")]
    async fn discover_steps(
        &self,
        #[tool(aggr)] params: authoring::DiscoverStepsParams,
    ) -> Result<CallToolResult, McpError> {
        let mut state = self.state.lock().await;
        let tree = state.page.as_ref().ok_or_else(no_page)?;
        let (steps, refs) = authoring::discover(tree, params.limit, &self.config);
        state.refs = refs;
        Self::json_result(steps)
    }

    #[tool(description = "Compute tooltip placement for a target element or an explicit rectangle.")]
    async fn place_tooltip(
        &self,
        #[tool(aggr)] params: playback::PlaceTooltipParams,
    ) -> Result<CallToolResult, McpError> {
        let state = self.state.lock().await;
        let result = playback::place_tooltip(state.page.as_ref(), &state.refs, &params, &self.config.placement)
            .map_err(invalid)?;
        Self::json_result(result)
    }

    // ── Playback ────────────────────────────────────────────────────────

    #[tool(description = "Start a tour by id. Navigates first when the tour belongs to another page.")]
    async fn start_tour(
        &self,
        #[tool(aggr)] params: playback::StartTourParams,
    ) -> Result<CallToolResult, McpError> {
        let mut state = self.state.lock().await;
        let (tree, widget) = page_and_widget(&mut *state)?;
        let before = scroll_of(tree);
        let outcome = widget.start_tour(tree, &params.tour_id, now_ms()).map_err(tour_error)?;

        let outcome = match outcome {
            StartOutcome::Navigate { url } => {
                let (moved, outcome) = self.follow(widget, &url, Some(&params.tour_id)).await?;
                *tree = moved;
                outcome.unwrap_or(StartOutcome::Aborted)
            }
            other => {
                self.sync_scroll(before, tree).await?;
                other
            }
        };
        match (outcome, widget.player().current()) {
            (StartOutcome::Started, Some(view)) => Self::json_result(view),
            (outcome, _) => Self::json_result(outcome),
        }
    }

    #[tool(description = "Advance the active tour. Finishing the last step closes it and records the play.")]
    async fn next_step(&self) -> Result<CallToolResult, McpError> {
        let mut state = self.state.lock().await;
        let (tree, widget) = page_and_widget(&mut *state)?;
        let before = scroll_of(tree);
        let advance = widget.next_step(tree, now_ms()).map_err(tour_error)?;
        self.sync_scroll(before, tree).await?;
        match (advance, widget.player().current()) {
            (Advance::Moved, Some(view)) => Self::json_result(view),
            _ => Self::text_result("Tour finished"),
        }
    }

    #[tool(description = "Go back one step in the active tour.")]
    async fn previous_step(&self) -> Result<CallToolResult, McpError> {
        let mut state = self.state.lock().await;
        let (tree, widget) = page_and_widget(&mut *state)?;
        let before = scroll_of(tree);
        widget.previous_step(tree).map_err(tour_error)?;
        self.sync_scroll(before, tree).await?;
        Self::json_result(widget.player().current())
    }

    #[tool(description = "Close the active tour and record the play.")]
    async fn dismiss_tour(&self) -> Result<CallToolResult, McpError> {
        let mut state = self.state.lock().await;
        let widget = state.widget.as_mut().ok_or_else(no_project)?;
        if widget.dismiss(now_ms()) {
            Self::text_result("Tour dismissed")
        } else {
            Self::text_result("No tour is playing")
        }
    }

    #[tool(description = "Current mode, active step, resolved theme, install status and the project's tours.")]
    async fn tour_status(&self) -> Result<CallToolResult, McpError> {
        let mut state = self.state.lock().await;
        self.mount_widget(&mut state).await?;
        let widget = state.widget.as_ref().ok_or_else(no_project)?;
        Self::json_result(playback::status(widget, now_ms()))
    }
}
