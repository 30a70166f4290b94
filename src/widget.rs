//! The embeddable widget: mount options, the application state it owns, and
//! the persisted subset that survives a reload.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::branding::theme::{resolve_theme, ResolvedTheme};
use crate::branding::{detect_branding, DetectedBranding};
use crate::config::TourkitConfig;
use crate::dom::{Document, NodeId};
use crate::error::TourError;
use crate::model::{enforce_single_active, InstallStatus, PlayBehavior, Project, ThemeSettings, Tour};
use crate::player::{Advance, Mode, PlaybackController, StartOutcome};
use crate::recorder::{ClickOutcome, RecordingController, RecordingDraft, RecordingMode};
use crate::store::{KeyValueStore, TourStore, User};

/// Key the [`PersistedSession`] is stored under.
pub const SESSION_KEY: &str = "tourkit-session";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MountOptions {
    pub project_id: String,
    #[serde(default)]
    pub auto_start: Option<bool>,
    #[serde(default)]
    pub show_admin_panel: Option<bool>,
}

/// The part of [`AppState`] written to the key-value store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<RecordingDraft>,
}

impl PersistedSession {
    pub fn load<K: KeyValueStore + ?Sized>(kv: &K) -> Self {
        let Some(raw) = kv.get(SESSION_KEY) else {
            return Self::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!("Discarding unreadable session: {}", e);
            Self::default()
        })
    }

    pub fn save<K: KeyValueStore + ?Sized>(&self, kv: &mut K) -> Result<(), TourError> {
        let raw = serde_json::to_string(self).map_err(crate::error::StoreError::from)?;
        kv.set(SESSION_KEY, raw)?;
        Ok(())
    }
}

/// Everything the widget knows, owned in one place.
#[derive(Debug)]
pub struct AppState {
    pub project: Project,
    pub tours: Vec<Tour>,
    pub user: Option<User>,
    pub player: PlaybackController,
    pub recorder: Option<RecordingController>,
    /// Taken on the first page load; detection is not repeated after that.
    pub branding: Option<DetectedBranding>,
    pub branding_checked: bool,
    pub auto_start: bool,
    pub show_admin_panel: bool,
}

pub struct Widget {
    store: Arc<dyn TourStore>,
    kv: Box<dyn KeyValueStore + Send + Sync>,
    config: TourkitConfig,
    state: AppState,
}

impl Widget {
    /// Load the project and its tours, send a heartbeat, and restore any
    /// recording in progress.
    pub async fn mount(
        store: Arc<dyn TourStore>,
        kv: Box<dyn KeyValueStore + Send + Sync>,
        options: MountOptions,
        config: TourkitConfig,
        now_ms: u64,
    ) -> Result<Self, TourError> {
        let mut project = store.load_project(&options.project_id).await?;
        let tours = store.load_tours(&project.id).await?;

        match store.record_heartbeat(&project.id, now_ms).await {
            Ok(()) => project.last_seen_at = Some(now_ms),
            Err(e) => tracing::warn!("Heartbeat failed for project {}: {}", project.id, e),
        }
        let user = store.current_user().await.unwrap_or_else(|e| {
            tracing::warn!("Could not read current user: {}", e);
            None
        });

        let show_admin_panel = options.show_admin_panel.unwrap_or(false) && user.is_some();
        let auto_start = options.auto_start.unwrap_or(config.auto_start);

        let mut player = PlaybackController::new(config.placement);
        let session = PersistedSession::load(&*kv);
        let recorder = match (session.mode, session.draft) {
            (Mode::Recording, Some(draft)) if user.is_some() => {
                player.begin_recording()?;
                tracing::info!("Resuming recording with {} step(s)", draft.tour.steps.len());
                Some(RecordingController::resume(draft).with_capture_options(config.capture_options()))
            }
            _ => None,
        };

        tracing::info!(
            "Mounted project {} ({} tours, admin panel: {})",
            project.id,
            tours.len(),
            show_admin_panel
        );

        Ok(Self {
            store,
            kv,
            config,
            state: AppState {
                project,
                tours,
                user,
                player,
                recorder,
                branding: None,
                branding_checked: false,
                auto_start,
                show_admin_panel,
            },
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &TourkitConfig {
        &self.config
    }

    pub fn install_status(&self, now_ms: u64) -> InstallStatus {
        self.state.project.install_status(now_ms)
    }

    /// Run on every page load: snapshot branding once, end a tour left
    /// behind on the previous page, then auto-play.
    pub fn on_page_load<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        now_ms: u64,
    ) -> Result<Option<StartOutcome>, TourError> {
        if !self.state.branding_checked {
            self.state.branding = detect_branding(doc);
            self.state.branding_checked = true;
        }
        self.state.player.on_navigate(doc);
        if !self.state.auto_start {
            return Ok(None);
        }
        let state = &mut self.state;
        state.player.auto_play(doc, &state.tours, &*self.kv, now_ms)
    }

    /// Theme for the tooltip, using this session's branding snapshot.
    pub fn theme(&self) -> ResolvedTheme {
        resolve_theme(&self.state.project.theme_settings, self.state.branding.as_ref())
    }

    // ── Playback ────────────────────────────────────────────────────────

    /// Start a tour on request. A tour already playing is closed first and
    /// counts as dismissed.
    pub fn start_tour<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        tour_id: &str,
        now_ms: u64,
    ) -> Result<StartOutcome, TourError> {
        let tour = self.find_tour(tour_id)?.clone();
        if self.state.player.dismiss(&mut *self.kv, now_ms) {
            tracing::info!("Replacing the playing tour with {}", tour.id);
        }
        self.state.player.start(doc, tour)
    }

    pub fn next_step<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        now_ms: u64,
    ) -> Result<Advance, TourError> {
        self.state.player.next(doc, &mut *self.kv, now_ms)
    }

    pub fn previous_step<D: Document + ?Sized>(&mut self, doc: &mut D) -> Result<(), TourError> {
        self.state.player.previous(doc)
    }

    pub fn dismiss(&mut self, now_ms: u64) -> bool {
        self.state.player.dismiss(&mut *self.kv, now_ms)
    }

    pub fn on_viewport_change<D: Document + ?Sized>(&mut self, doc: &mut D) {
        self.state.player.on_viewport_change(doc);
    }

    pub fn player(&self) -> &PlaybackController {
        &self.state.player
    }

    // ── Authoring ───────────────────────────────────────────────────────

    pub fn begin_recording(&mut self, page_url: &str, mode: RecordingMode) -> Result<(), TourError> {
        self.require_user()?;
        self.state.player.begin_recording()?;
        let recorder = RecordingController::new(&self.state.project.id, page_url, mode)
            .with_capture_options(self.config.capture_options());
        self.state.recorder = Some(recorder);
        self.persist_session()
    }

    /// Load an existing tour into the recorder for edit-and-resave.
    pub fn edit_tour(&mut self, tour_id: &str) -> Result<(), TourError> {
        self.require_user()?;
        let tour = self.find_tour(tour_id)?.clone();
        self.state.player.begin_recording()?;
        self.state.recorder =
            Some(RecordingController::edit(tour).with_capture_options(self.config.capture_options()));
        self.persist_session()
    }

    pub fn recorder(&self) -> Option<&RecordingController> {
        self.state.recorder.as_ref()
    }

    pub fn recorder_mut(&mut self) -> Option<&mut RecordingController> {
        self.state.recorder.as_mut()
    }

    /// Capture-phase click. Passes through untouched when not recording.
    pub fn handle_click<D: Document + ?Sized>(
        &mut self,
        doc: &D,
        target: NodeId,
    ) -> Result<ClickOutcome, TourError> {
        let Some(recorder) = self.state.recorder.as_mut() else {
            return Ok(ClickOutcome {
                recorded: None,
                suppress_default: false,
            });
        };
        let outcome = recorder.handle_click(doc, target);
        if outcome.recorded.is_some() {
            self.persist_session()?;
        }
        Ok(outcome)
    }

    /// Append discovered steps to the draft. Returns how many were added.
    pub fn discover<D: Document + ?Sized>(&mut self, doc: &D) -> Result<usize, TourError> {
        let limit = self.config.discovery_limit;
        let recorder = self.recorder_or_err("discover steps")?;
        let added = recorder.discover(doc, limit);
        self.persist_session()?;
        Ok(added)
    }

    /// Validate the draft, save it, and leave recording mode.
    pub async fn save_recording(
        &mut self,
        title: &str,
        page_url: &str,
        behavior: PlayBehavior,
    ) -> Result<Tour, TourError> {
        let tour = self
            .recorder_or_err("save a recording")?
            .finish(title, page_url, behavior)?;
        self.store.save_tour(tour.clone()).await?;

        let tours = &mut self.state.tours;
        match tours.iter().position(|t| t.id == tour.id) {
            Some(pos) => tours[pos] = tour.clone(),
            None => tours.push(tour.clone()),
        }
        enforce_single_active(tours, &tour.id);

        self.state.recorder = None;
        self.state.player.end_recording()?;
        self.persist_session()?;
        Ok(tour)
    }

    pub fn cancel_recording(&mut self) -> Result<(), TourError> {
        if self.state.recorder.take().is_some() {
            self.state.player.end_recording()?;
        }
        self.persist_session()
    }

    pub async fn delete_tour(&mut self, tour_id: &str) -> Result<(), TourError> {
        self.require_user()?;
        self.find_tour(tour_id)?;
        self.store.delete_tour(tour_id).await?;
        self.state.tours.retain(|t| t.id != tour_id);
        Ok(())
    }

    /// Optimistically flip `isActive`; the local list is restored if the
    /// store rejects the change.
    pub async fn toggle_tour_active(&mut self, tour_id: &str, active: bool) -> Result<(), TourError> {
        self.require_user()?;
        let snapshot = self.state.tours.clone();
        let tour = self
            .state
            .tours
            .iter_mut()
            .find(|t| t.id == tour_id)
            .ok_or_else(|| TourError::TourNotFound(tour_id.to_string()))?;
        tour.is_active = active;
        enforce_single_active(&mut self.state.tours, tour_id);

        if let Err(e) = self.store.set_tour_active(tour_id, active).await {
            tracing::warn!("Could not update tour {}: {}; rolling back", tour_id, e);
            self.state.tours = snapshot;
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn save_theme(&mut self, theme: ThemeSettings) -> Result<(), TourError> {
        self.require_user()?;
        self.store
            .save_project_theme(&self.state.project.id, theme.clone())
            .await?;
        self.state.project.theme_settings = theme;
        Ok(())
    }

    /// Write the session's detected branding into the project theme.
    pub async fn adopt_branding(&mut self) -> Result<bool, TourError> {
        let Some(branding) = self.state.branding.clone() else {
            return Ok(false);
        };
        let mut theme = self.state.project.theme_settings.clone();
        theme.apply_branding(&branding);
        self.save_theme(theme).await?;
        Ok(true)
    }

    fn persist_session(&mut self) -> Result<(), TourError> {
        let session = PersistedSession {
            mode: self.state.player.mode(),
            draft: self.state.recorder.as_ref().map(|r| r.draft().clone()),
        };
        session.save(&mut *self.kv)
    }

    fn find_tour(&self, tour_id: &str) -> Result<&Tour, TourError> {
        self.state
            .tours
            .iter()
            .find(|t| t.id == tour_id)
            .ok_or_else(|| TourError::TourNotFound(tour_id.to_string()))
    }

    fn require_user(&self) -> Result<(), TourError> {
        match self.state.user {
            Some(_) => Ok(()),
            None => Err(TourError::SignedOut),
        }
    }

    fn recorder_or_err(&mut self, action: &'static str) -> Result<&mut RecordingController, TourError> {
        let mode = self.state.player.mode().as_str();
        self.state
            .recorder
            .as_mut()
            .ok_or(TourError::InvalidTransition { action, mode })
    }
}
