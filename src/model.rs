//! Projects, tours, and steps, with the invariants every mutation keeps:
//! step `order` is always dense `0..N`, and at most one tour is active per
//! (project, normalized page).

use serde::{Deserialize, Serialize};

use crate::branding::{DetectedBranding, DEFAULT_FONT_STACK};
use crate::dom::location_path;
use crate::error::TourError;

pub const MIN_TITLE_LEN: usize = 3;

pub const MINUTE_MS: u64 = 60 * 1000;
pub const DAY_MS: u64 = 24 * 60 * MINUTE_MS;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Wall-clock epoch milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Leading slash, no trailing slash, no scheme/host/query/fragment; empty is `/`.
pub fn normalize_page_url(raw: &str) -> String {
    let path = location_path(raw);
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum StepAction {
    #[default]
    Click,
    Hover,
    Type {
        #[serde(rename = "actionValue", default)]
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    pub order: usize,
    #[serde(flatten)]
    pub action: StepAction,
}

impl Step {
    pub fn new(target: impl Into<String>, content: impl Into<String>, action: StepAction) -> Self {
        Self {
            id: new_id(),
            target: target.into(),
            title: None,
            content: content.into(),
            order: 0,
            action,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// How often an active tour may auto-play for the same browser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayBehavior {
    #[default]
    FirstTime,
    Weekly,
    MonthlyThrice,
}

impl PlayBehavior {
    pub fn max_plays(self) -> u32 {
        match self {
            Self::FirstTime => 1,
            Self::Weekly => 2,
            Self::MonthlyThrice => 3,
        }
    }

    /// Rolling window length; `None` means the cap is for life.
    pub fn window_ms(self) -> Option<u64> {
        match self {
            Self::FirstTime => None,
            Self::Weekly => Some(7 * DAY_MS),
            Self::MonthlyThrice => Some(30 * DAY_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub page_url: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub play_behavior: PlayBehavior,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Tour {
    pub fn new(project_id: &str, title: &str, page_url: &str) -> Self {
        Self {
            id: new_id(),
            project_id: project_id.to_string(),
            title: title.to_string(),
            page_url: normalize_page_url(page_url),
            is_active: false,
            play_behavior: PlayBehavior::default(),
            steps: Vec::new(),
        }
    }

    pub fn page_path(&self) -> String {
        normalize_page_url(&self.page_url)
    }

    pub fn push_step(&mut self, mut step: Step) {
        step.order = self.steps.len();
        self.steps.push(step);
    }

    pub fn remove_step(&mut self, index: usize) -> Result<Step, TourError> {
        self.check_index(index)?;
        let step = self.steps.remove(index);
        self.reindex();
        Ok(step)
    }

    pub fn move_step(&mut self, from: usize, to: usize) -> Result<(), TourError> {
        self.check_index(from)?;
        self.check_index(to)?;
        let step = self.steps.remove(from);
        self.steps.insert(to, step);
        self.reindex();
        Ok(())
    }

    /// Edit-and-resave: the new list replaces the old one wholesale.
    pub fn replace_steps(&mut self, steps: Vec<Step>) {
        self.steps = steps;
        self.renumber();
    }

    /// Sort by stored order (stable), then make the orders dense again.
    pub fn renumber(&mut self) {
        self.steps.sort_by_key(|s| s.order);
        self.reindex();
    }

    // List position is the order after an in-place edit.
    fn reindex(&mut self) {
        for (i, step) in self.steps.iter_mut().enumerate() {
            step.order = i;
        }
    }

    pub fn validate(&self) -> Result<(), TourError> {
        if self.title.trim().chars().count() < MIN_TITLE_LEN {
            return Err(TourError::Validation(format!(
                "Tour title must be at least {} characters",
                MIN_TITLE_LEN
            )));
        }
        if self.steps.is_empty() {
            return Err(TourError::Validation(
                "Tour must have at least one step".to_string(),
            ));
        }
        if let Some(step) = self.steps.iter().find(|s| s.target.trim().is_empty()) {
            return Err(TourError::Validation(format!(
                "Step {} has no target",
                step.order + 1
            )));
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<(), TourError> {
        if index < self.steps.len() {
            Ok(())
        } else {
            Err(TourError::StepOutOfRange {
                index,
                len: self.steps.len(),
            })
        }
    }
}

/// Deactivate every other tour on the same (project, page) as `activated`.
///
/// Returns the ids that were switched off. Does nothing if `activated` is
/// missing or inactive.
pub fn enforce_single_active(tours: &mut [Tour], activated: &str) -> Vec<String> {
    let Some((project, page)) = tours
        .iter()
        .find(|t| t.id == activated && t.is_active)
        .map(|t| (t.project_id.clone(), t.page_path()))
    else {
        return Vec::new();
    };
    let mut switched = Vec::new();
    for tour in tours.iter_mut() {
        if tour.id != activated
            && tour.is_active
            && tour.project_id == project
            && tour.page_path() == page
        {
            tour.is_active = false;
            switched.push(tour.id.clone());
        }
    }
    switched
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TooltipStyle {
    #[default]
    Solid,
    Color,
    Glass,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThemeSettings {
    pub font_family: String,
    pub dark_mode: bool,
    pub primary_color: String,
    pub border_radius: f64,
    pub padding_v: f64,
    pub padding_h: f64,
    pub tooltip_style: TooltipStyle,
    pub tooltip_color: String,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            font_family: DEFAULT_FONT_STACK.to_string(),
            dark_mode: false,
            primary_color: "#2563eb".to_string(),
            border_radius: 8.0,
            padding_v: 16.0,
            padding_h: 20.0,
            tooltip_style: TooltipStyle::default(),
            tooltip_color: "#2563eb".to_string(),
        }
    }
}

impl ThemeSettings {
    /// Persist a detected branding as explicit settings.
    pub fn apply_branding(&mut self, branding: &DetectedBranding) {
        self.primary_color = branding.primary_color.clone();
        self.tooltip_color = branding.primary_color.clone();
        self.font_family = branding.font_family.clone();
        self.border_radius = branding.border_radius;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallStatus {
    /// Heartbeat within the last five minutes.
    Synced,
    /// Heartbeat within the last day.
    Installed,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub show_launcher: bool,
    #[serde(default = "default_launcher_text")]
    pub launcher_text: String,
    #[serde(default)]
    pub theme_settings: ThemeSettings,
    /// Epoch milliseconds of the last widget heartbeat.
    #[serde(default)]
    pub last_seen_at: Option<u64>,
}

fn default_launcher_text() -> String {
    "Take a tour".to_string()
}

impl Project {
    pub fn new(name: &str, domain: &str) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            domain: domain.to_string(),
            show_launcher: false,
            launcher_text: default_launcher_text(),
            theme_settings: ThemeSettings::default(),
            last_seen_at: None,
        }
    }

    pub fn install_status(&self, now_ms: u64) -> InstallStatus {
        match self.last_seen_at.map(|seen| now_ms.saturating_sub(seen)) {
            Some(age) if age <= 5 * MINUTE_MS => InstallStatus::Synced,
            Some(age) if age <= DAY_MS => InstallStatus::Installed,
            _ => InstallStatus::Offline,
        }
    }
}
