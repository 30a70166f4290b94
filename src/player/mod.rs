//! Tour playback: the idle / recording / playing state machine, step
//! progression, and keeping the tooltip glued to its target.

pub mod frequency;

use serde::{Deserialize, Serialize};

use crate::dom::{query_param, Document, NodeId};
use crate::error::TourError;
use crate::geometry::Rect;
use crate::model::{normalize_page_url, Step, Tour};
use crate::placement::{PlacementEngine, TooltipPlacement};
use crate::selectors;
use crate::store::KeyValueStore;

/// Query parameter carrying a tour id across a full page navigation.
pub const CONTINUATION_PARAM: &str = "tour_id";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Idle,
    Recording,
    Playing,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Playing => "playing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    /// The tour lives on another page; load `url` and auto-play picks it up.
    Navigate { url: String },
    /// Nothing to play.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Advance {
    Moved,
    Finished,
}

/// What the tooltip should show right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub tour_id: String,
    pub tour_title: String,
    pub step: Step,
    pub index: usize,
    pub total: usize,
    pub target_found: bool,
    pub target_rect: Rect,
    pub placement: TooltipPlacement,
    pub caret_rotation: i32,
}

/// `/page?tour_id=<id>` for a tour that must start after navigation.
pub fn continuation_url(tour: &Tour) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(CONTINUATION_PARAM, &tour.id)
        .finish();
    format!("{}?{}", tour.page_path(), query)
}

#[derive(Debug, Default)]
pub struct PlaybackController {
    engine: PlacementEngine,
    mode: Mode,
    tour: Option<Tour>,
    index: usize,
    target: Option<NodeId>,
    rect: Rect,
    placement: Option<TooltipPlacement>,
    auto_played_path: Option<String>,
}

impl PlaybackController {
    pub fn new(engine: PlacementEngine) -> Self {
        Self {
            engine,
            ..Default::default()
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn tour(&self) -> Option<&Tour> {
        self.tour.as_ref()
    }

    pub fn step_index(&self) -> usize {
        self.index
    }

    pub fn engine(&self) -> &PlacementEngine {
        &self.engine
    }

    pub fn begin_recording(&mut self) -> Result<(), TourError> {
        match self.mode {
            Mode::Playing => Err(self.invalid("start recording")),
            _ => {
                self.mode = Mode::Recording;
                Ok(())
            }
        }
    }

    pub fn end_recording(&mut self) -> Result<(), TourError> {
        match self.mode {
            Mode::Recording => {
                self.mode = Mode::Idle;
                Ok(())
            }
            _ => Err(self.invalid("stop recording")),
        }
    }

    /// Begin playing `tour` from its first step.
    pub fn start<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        mut tour: Tour,
    ) -> Result<StartOutcome, TourError> {
        if self.mode != Mode::Idle {
            return Err(self.invalid("play a tour"));
        }
        if tour.steps.is_empty() {
            tracing::warn!("Tour {} has no steps; not starting", tour.id);
            self.teardown();
            return Ok(StartOutcome::Aborted);
        }

        let here = normalize_page_url(doc.location());
        if here != tour.page_path() {
            let url = continuation_url(&tour);
            tracing::info!("Tour {} belongs on {}; navigating", tour.id, url);
            return Ok(StartOutcome::Navigate { url });
        }

        tour.renumber();
        tracing::info!("Starting tour {} ({} steps)", tour.id, tour.steps.len());
        self.tour = Some(tour);
        self.mode = Mode::Playing;
        self.index = 0;
        self.acquire(doc);
        Ok(StartOutcome::Started)
    }

    pub fn next<D: Document + ?Sized, K: KeyValueStore + ?Sized>(
        &mut self,
        doc: &mut D,
        kv: &mut K,
        now_ms: u64,
    ) -> Result<Advance, TourError> {
        let total = self.playing_total("advance")?;
        if self.index + 1 < total {
            self.index += 1;
            self.acquire(doc);
            Ok(Advance::Moved)
        } else {
            tracing::info!("Tour finished");
            self.close(kv, now_ms);
            Ok(Advance::Finished)
        }
    }

    /// Step back; stays on the first step.
    pub fn previous<D: Document + ?Sized>(&mut self, doc: &mut D) -> Result<(), TourError> {
        self.playing_total("go back")?;
        if self.index > 0 {
            self.index -= 1;
            self.acquire(doc);
        }
        Ok(())
    }

    /// Close the tour early. Returns whether a tour was playing.
    pub fn dismiss<K: KeyValueStore + ?Sized>(&mut self, kv: &mut K, now_ms: u64) -> bool {
        if self.mode != Mode::Playing {
            return false;
        }
        tracing::info!("Tour dismissed at step {}", self.index + 1);
        self.close(kv, now_ms);
        true
    }

    /// Page load while playing. A tour anchored to another path is abandoned
    /// without recording a play; on its own path the target is re-acquired
    /// in the new document. Returns whether a tour was abandoned.
    pub fn on_navigate<D: Document + ?Sized>(&mut self, doc: &mut D) -> bool {
        let Some(tour) = self.tour.as_ref().filter(|_| self.mode == Mode::Playing) else {
            return false;
        };
        let here = normalize_page_url(doc.location());
        if tour.page_path() == here {
            self.acquire(doc);
            return false;
        }
        tracing::info!("Left {} for {}; ending tour {}", tour.page_path(), here, tour.id);
        self.teardown();
        true
    }

    /// Scroll and resize handler: re-query the target and re-place the tooltip.
    pub fn on_viewport_change<D: Document + ?Sized>(&mut self, doc: &mut D) {
        if self.mode != Mode::Playing {
            return;
        }
        let found = self.lookup(doc);
        match (found, self.target) {
            (Some(node), previous) if previous != Some(node) => doc.scroll_into_view(node),
            (None, Some(_)) => tracing::debug!("Target disappeared; using placeholder"),
            _ => {}
        }
        self.target = found;
        self.refresh(doc);
    }

    /// Start whichever tour should play on this page, at most once per path.
    ///
    /// A `tour_id` continuation parameter wins; otherwise the first active,
    /// uncapped tour anchored to the current path.
    pub fn auto_play<D: Document + ?Sized, K: KeyValueStore + ?Sized>(
        &mut self,
        doc: &mut D,
        tours: &[Tour],
        kv: &K,
        now_ms: u64,
    ) -> Result<Option<StartOutcome>, TourError> {
        if self.mode != Mode::Idle {
            return Ok(None);
        }
        let location = doc.location().to_string();
        let path = normalize_page_url(&location);
        if self.auto_played_path.as_deref() == Some(path.as_str()) {
            return Ok(None);
        }
        self.auto_played_path = Some(path.clone());

        if let Some(id) = query_param(&location, CONTINUATION_PARAM) {
            match tours.iter().find(|t| t.id == id.as_str()) {
                Some(tour) => return self.start(doc, tour.clone()).map(Some),
                None => tracing::warn!("Continuation for unknown tour {}", id),
            }
        }

        let eligible = tours.iter().find(|t| {
            t.is_active
                && t.page_path() == path
                && !frequency::is_capped(
                    t.play_behavior,
                    frequency::load_stats(kv, &t.id).as_ref(),
                    now_ms,
                )
        });
        match eligible {
            Some(tour) => self.start(doc, tour.clone()).map(Some),
            None => {
                tracing::debug!("No tour to auto-play on {}", path);
                Ok(None)
            }
        }
    }

    pub fn current(&self) -> Option<StepView> {
        let tour = self.tour.as_ref().filter(|_| self.mode == Mode::Playing)?;
        let step = tour.steps.get(self.index)?;
        let placement = self.placement?;
        Some(StepView {
            tour_id: tour.id.clone(),
            tour_title: tour.title.clone(),
            step: step.clone(),
            index: self.index,
            total: tour.steps.len(),
            target_found: self.target.is_some(),
            target_rect: self.rect,
            placement,
            caret_rotation: placement.position.caret_rotation(),
        })
    }

    fn acquire<D: Document + ?Sized>(&mut self, doc: &mut D) {
        self.target = self.lookup(doc);
        match self.target {
            Some(node) => doc.scroll_into_view(node),
            None => tracing::debug!("Step {} target not found; using placeholder", self.index + 1),
        }
        self.refresh(doc);
    }

    fn lookup<D: Document + ?Sized>(&self, doc: &D) -> Option<NodeId> {
        let step = self.tour.as_ref()?.steps.get(self.index)?;
        match selectors::resolve(doc, &step.target) {
            Ok(node) => node,
            Err(e) => {
                tracing::warn!("Bad selector {:?} on step {}: {}", step.target, self.index + 1, e);
                None
            }
        }
    }

    fn refresh<D: Document + ?Sized>(&mut self, doc: &D) {
        let viewport = doc.viewport();
        self.rect = self
            .target
            .map(|node| doc.rect(node))
            .unwrap_or_else(|| Rect::placeholder(viewport));
        self.placement = Some(self.engine.place(self.rect, viewport));
    }

    fn close<K: KeyValueStore + ?Sized>(&mut self, kv: &mut K, now_ms: u64) {
        if let Some(tour) = &self.tour {
            if let Err(e) = frequency::record_play(kv, &tour.id, tour.play_behavior, now_ms) {
                tracing::warn!("Could not record play of tour {}: {}", tour.id, e);
            }
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        self.mode = Mode::Idle;
        self.tour = None;
        self.index = 0;
        self.target = None;
        self.placement = None;
    }

    fn playing_total(&self, action: &'static str) -> Result<usize, TourError> {
        match (&self.tour, self.mode) {
            (Some(tour), Mode::Playing) => Ok(tour.steps.len()),
            _ => Err(self.invalid(action)),
        }
    }

    fn invalid(&self, action: &'static str) -> TourError {
        TourError::InvalidTransition {
            action,
            mode: self.mode.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomTree, Element};
    use crate::geometry::Size;
    use crate::model::{PlayBehavior, StepAction, DAY_MS};
    use crate::placement::Side;
    use crate::store::MemoryKv;

    fn page(location: &str) -> DomTree {
        let mut tree = DomTree::new(Size::new(1024.0, 768.0));
        tree.set_location(location);
        let body = tree.body_id();
        tree.append(body, Element::new("button").id("first").rect(100.0, 100.0, 80.0, 30.0));
        tree.append(body, Element::new("button").id("far").rect(100.0, 2000.0, 80.0, 30.0));
        tree.append(body, Element::new("footer").rect(0.0, 2900.0, 1024.0, 100.0));
        tree
    }

    fn tour(page_url: &str, targets: &[&str]) -> Tour {
        let mut tour = Tour::new("p1", "Welcome tour", page_url);
        tour.is_active = true;
        for t in targets {
            tour.push_step(Step::new(*t, "hello", StepAction::Click));
        }
        tour
    }

    #[test]
    fn test_start_next_finish_records_play() {
        let mut doc = page("/app");
        let mut kv = MemoryKv::new();
        let mut player = PlaybackController::default();
        let t = tour("/app", &["#first", "#far"]);
        let id = t.id.clone();

        assert_eq!(player.start(&mut doc, t).unwrap(), StartOutcome::Started);
        let view = player.current().unwrap();
        assert_eq!((view.index, view.total), (0, 2));
        assert!(view.target_found);

        assert_eq!(player.next(&mut doc, &mut kv, 1000).unwrap(), Advance::Moved);
        // the far target was scrolled into the middle of the viewport
        let view = player.current().unwrap();
        assert!((view.target_rect.center_y() - 384.0).abs() < 1e-9);

        assert_eq!(player.next(&mut doc, &mut kv, 2000).unwrap(), Advance::Finished);
        assert_eq!(player.mode(), Mode::Idle);
        assert!(player.current().is_none());
        let stats = frequency::load_stats(&kv, &id).unwrap();
        assert_eq!((stats.last_played_at, stats.play_count), (2000, 1));
    }

    #[test]
    fn test_missing_target_uses_placeholder() {
        let mut doc = page("/");
        let mut player = PlaybackController::default();
        player.start(&mut doc, tour("/", &["#gone", "div >"])).unwrap();
        let view = player.current().unwrap();
        assert!(!view.target_found);
        assert_eq!(view.target_rect, Rect::placeholder(doc.viewport()));
        assert_eq!(view.placement.position, Side::Bottom);

        // malformed selector behaves as a miss too
        let mut kv = MemoryKv::new();
        assert_eq!(player.next(&mut doc, &mut kv, 0).unwrap(), Advance::Moved);
        assert!(!player.current().unwrap().target_found);
    }

    #[test]
    fn test_viewport_change_tracks_target() {
        let mut doc = page("/");
        let mut player = PlaybackController::default();
        player.start(&mut doc, tour("/", &["#first"])).unwrap();
        assert_eq!(player.current().unwrap().target_rect.top, 100.0);

        doc.set_viewport(Size::new(1024.0, 400.0));
        doc.scroll_to(0.0, 50.0);
        player.on_viewport_change(&mut doc);
        let view = player.current().unwrap();
        assert_eq!(view.target_rect.top, 50.0);
        assert_eq!(view.placement, PlacementEngine::default().place(view.target_rect, doc.viewport()));

        let first = doc.query_selector("#first").unwrap().unwrap();
        doc.remove(first);
        player.on_viewport_change(&mut doc);
        let view = player.current().unwrap();
        assert!(!view.target_found);
        assert_eq!(view.target_rect, Rect::placeholder(doc.viewport()));
    }

    #[test]
    fn test_viewport_change_when_idle_is_noop() {
        let mut doc = page("/");
        let mut player = PlaybackController::default();
        player.on_viewport_change(&mut doc);
        assert!(player.current().is_none());
    }

    #[test]
    fn test_previous_and_dismiss() {
        let mut doc = page("/");
        let mut kv = MemoryKv::new();
        let mut player = PlaybackController::default();
        let t = tour("/", &["#first", "#far"]);
        let id = t.id.clone();
        player.start(&mut doc, t).unwrap();
        player.previous(&mut doc).unwrap();
        assert_eq!(player.step_index(), 0);
        player.next(&mut doc, &mut kv, 0).unwrap();
        player.previous(&mut doc).unwrap();
        assert_eq!(player.step_index(), 0);

        assert!(player.dismiss(&mut kv, 5));
        assert!(!player.dismiss(&mut kv, 6));
        assert_eq!(frequency::load_stats(&kv, &id).unwrap().play_count, 1);
        assert!(matches!(
            player.previous(&mut doc),
            Err(TourError::InvalidTransition { mode: "idle", .. })
        ));
    }

    #[test]
    fn test_empty_tour_aborts() {
        let mut doc = page("/");
        let mut player = PlaybackController::default();
        assert_eq!(player.start(&mut doc, tour("/", &[])).unwrap(), StartOutcome::Aborted);
        assert_eq!(player.mode(), Mode::Idle);
    }

    #[test]
    fn test_other_page_navigates_with_continuation() {
        let mut doc = page("/");
        let mut player = PlaybackController::default();
        let t = tour("/settings/", &["#first"]);
        let expected = format!("/settings?tour_id={}", t.id);
        assert_eq!(
            player.start(&mut doc, t).unwrap(),
            StartOutcome::Navigate { url: expected }
        );
        assert_eq!(player.mode(), Mode::Idle);
    }

    #[test]
    fn test_recording_and_playing_are_exclusive() {
        let mut doc = page("/");
        let mut player = PlaybackController::default();
        player.begin_recording().unwrap();
        assert!(player.start(&mut doc, tour("/", &["#first"])).is_err());
        player.end_recording().unwrap();
        assert!(player.end_recording().is_err());

        player.start(&mut doc, tour("/", &["#first"])).unwrap();
        assert!(matches!(
            player.begin_recording(),
            Err(TourError::InvalidTransition { mode: "playing", .. })
        ));
    }

    #[test]
    fn test_start_while_playing_is_rejected() {
        let mut doc = page("/");
        let mut player = PlaybackController::default();
        let first = tour("/", &["#first", "#far"]);
        let id = first.id.clone();
        player.start(&mut doc, first).unwrap();
        assert!(matches!(
            player.start(&mut doc, tour("/", &["#far"])),
            Err(TourError::InvalidTransition { mode: "playing", .. })
        ));
        assert_eq!(player.tour().unwrap().id, id);
        assert_eq!(player.step_index(), 0);
    }

    #[test]
    fn test_navigating_away_abandons_without_recording() {
        let mut doc = page("/app");
        let kv = MemoryKv::new();
        let mut player = PlaybackController::default();
        let t = tour("/app", &["#first"]);
        let id = t.id.clone();
        player.start(&mut doc, t).unwrap();

        assert!(!player.on_navigate(&mut page("/app?tab=2")));
        assert_eq!(player.mode(), Mode::Playing);

        assert!(player.on_navigate(&mut page("/billing")));
        assert_eq!(player.mode(), Mode::Idle);
        assert!(player.tour().is_none());
        assert_eq!(frequency::load_stats(&kv, &id), None);
        assert!(!player.on_navigate(&mut page("/app")));
    }

    #[test]
    fn test_auto_play_once_per_path_and_capped() {
        let mut doc = page("/app");
        let mut kv = MemoryKv::new();
        let mut player = PlaybackController::default();
        let mut inactive = tour("/app", &["#first"]);
        inactive.is_active = false;
        let active = tour("/app", &["#first"]);
        let tours = vec![inactive, active.clone()];

        let outcome = player.auto_play(&mut doc, &tours, &kv, 0).unwrap();
        assert_eq!(outcome, Some(StartOutcome::Started));
        assert_eq!(player.tour().unwrap().id, active.id);
        player.dismiss(&mut kv, 0);

        // same path: guarded
        assert_eq!(player.auto_play(&mut doc, &tours, &kv, 1).unwrap(), None);

        // new path and back: re-armed, but first_time is now capped
        doc.set_location("/other");
        assert_eq!(player.auto_play(&mut doc, &tours, &kv, 2).unwrap(), None);
        doc.set_location("/app/");
        assert_eq!(player.auto_play(&mut doc, &tours, &kv, 3).unwrap(), None);
    }

    #[test]
    fn test_auto_play_weekly_window() {
        let mut kv = MemoryKv::new();
        let mut t = tour("/app", &["#first"]);
        t.play_behavior = PlayBehavior::Weekly;
        let tours = vec![t];
        let mut played = 0;
        for day in [0, 1, 2, 9] {
            let mut doc = page("/app");
            let mut player = PlaybackController::default();
            if player.auto_play(&mut doc, &tours, &kv, day * DAY_MS).unwrap().is_some() {
                played += 1;
                player.dismiss(&mut kv, day * DAY_MS);
            }
        }
        // days 0 and 1 fill the window, day 2 is capped, day 9 opens a new one
        assert_eq!(played, 3);
    }

    #[test]
    fn test_continuation_param_starts_named_tour() {
        let kv = MemoryKv::new();
        let mut settled = tour("/app", &["#first"]);
        settled.is_active = false;
        let location = format!("/app?{}={}", CONTINUATION_PARAM, settled.id);
        let mut doc = page(&location);
        let mut player = PlaybackController::default();
        let outcome = player.auto_play(&mut doc, &[settled.clone()], &kv, 0).unwrap();
        assert_eq!(outcome, Some(StartOutcome::Started));
        assert_eq!(player.tour().unwrap().id, settled.id);
    }

    #[test]
    fn test_continuation_url_round_trips_encoded_ids() {
        let kv = MemoryKv::new();
        let mut settled = tour("/app/", &["#first"]);
        settled.id = "tour 7&x".into();
        let url = continuation_url(&settled);
        assert_eq!(url, "/app?tour_id=tour+7%26x");

        let mut doc = page(&url);
        let mut player = PlaybackController::default();
        let outcome = player.auto_play(&mut doc, &[settled], &kv, 0).unwrap();
        assert_eq!(outcome, Some(StartOutcome::Started));
        assert_eq!(player.tour().unwrap().id, "tour 7&x");
    }
}
