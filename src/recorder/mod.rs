//! Tour authoring: capture steps from clicks on the host page, or propose
//! them with [`discovery`], then edit the draft and save it as a tour.

pub mod copy;
pub mod discovery;

use serde::{Deserialize, Serialize};

use crate::dom::{Document, NodeId};
use crate::error::TourError;
use crate::model::{PlayBehavior, Step, StepAction, Tour};
use crate::selectors::{compute_selector_with, CaptureOptions};

/// Elements inside a node carrying this attribute belong to the authoring UI.
pub const IGNORE_ATTR: &str = "data-tour-ignore";
/// Id of the element the widget mounts into.
pub const WIDGET_ROOT_ID: &str = "tourkit-root";

const INTERACTIVE_TAGS: &[&str] = &[
    "button", "a", "input", "select", "textarea", "details", "summary",
];
const INTERACTIVE_ROLES: &[&str] = &[
    "button", "link", "menuitem", "tab", "checkbox", "radio", "switch",
];

pub fn is_interactive<D: Document + ?Sized>(doc: &D, node: NodeId) -> bool {
    INTERACTIVE_TAGS.contains(&doc.tag_name(node))
        || doc
            .attribute(node, "role")
            .is_some_and(|r| INTERACTIVE_ROLES.contains(&r.trim()))
        || doc.computed_style(node, "cursor") == Some("pointer")
}

/// Inside the authoring chrome or the widget's own subtree.
pub fn is_ignored<D: Document + ?Sized>(doc: &D, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        if doc.attribute(n, IGNORE_ATTR).is_some() || doc.attribute(n, "id") == Some(WIDGET_ROOT_ID) {
            return true;
        }
        current = doc.parent(n);
    }
    false
}

/// The click target itself or its nearest interactive ancestor.
pub fn interactive_ancestor<D: Document + ?Sized>(doc: &D, node: NodeId) -> Option<NodeId> {
    let mut current = Some(node);
    while let Some(n) = current {
        if is_interactive(doc, n) {
            return Some(n);
        }
        current = doc.parent(n);
    }
    None
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingMode {
    /// Clicks become steps and the page never sees them.
    #[default]
    Manual,
    /// Steps come from discovery; clicks pass through.
    Auto,
}

/// Work in progress, serializable so a reload does not lose it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingDraft {
    pub tour: Tour,
    /// `tour` already exists in the store and will be replaced on save.
    #[serde(default)]
    pub editing: bool,
    #[serde(default)]
    pub mode: RecordingMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickOutcome {
    /// Index of the step the click produced.
    pub recorded: Option<usize>,
    /// The host page must not act on this click.
    pub suppress_default: bool,
}

#[derive(Debug)]
pub struct RecordingController {
    draft: RecordingDraft,
    options: CaptureOptions,
}

impl RecordingController {
    pub fn new(project_id: &str, page_url: &str, mode: RecordingMode) -> Self {
        Self::resume(RecordingDraft {
            tour: Tour::new(project_id, "", page_url),
            editing: false,
            mode,
        })
    }

    /// Continue a persisted draft.
    pub fn resume(draft: RecordingDraft) -> Self {
        Self {
            draft,
            options: CaptureOptions::default(),
        }
    }

    /// Load an existing tour for edit-and-resave.
    pub fn edit(mut tour: Tour) -> Self {
        tour.renumber();
        Self::resume(RecordingDraft {
            tour,
            editing: true,
            mode: RecordingMode::Manual,
        })
    }

    pub fn with_capture_options(mut self, options: CaptureOptions) -> Self {
        self.options = options;
        self
    }

    pub fn draft(&self) -> &RecordingDraft {
        &self.draft
    }

    pub fn steps(&self) -> &[Step] {
        &self.draft.tour.steps
    }

    pub fn mode(&self) -> RecordingMode {
        self.draft.mode
    }

    pub fn set_mode(&mut self, mode: RecordingMode) {
        self.draft.mode = mode;
    }

    /// Capture-phase click handler.
    pub fn handle_click<D: Document + ?Sized>(&mut self, doc: &D, target: NodeId) -> ClickOutcome {
        if is_ignored(doc, target) || self.draft.mode != RecordingMode::Manual {
            return ClickOutcome {
                recorded: None,
                suppress_default: false,
            };
        }
        let recorded = interactive_ancestor(doc, target).map(|node| {
            let selector = compute_selector_with(doc, node, self.options);
            let copy = copy::copy_for(doc, node);
            tracing::debug!("Recorded click on {}", selector);
            self.draft
                .tour
                .push_step(Step::new(selector, copy.content, StepAction::Click).with_title(copy.title));
            self.draft.tour.steps.len() - 1
        });
        ClickOutcome {
            recorded,
            suppress_default: true,
        }
    }

    /// Append discovered steps whose targets are not in the draft yet.
    /// Returns how many were added.
    pub fn discover<D: Document + ?Sized>(&mut self, doc: &D, limit: usize) -> usize {
        let found = discovery::discover_steps_with(doc, limit, self.options);
        let mut added = 0;
        for step in found {
            if self.draft.tour.steps.iter().all(|s| s.target != step.target) {
                self.draft.tour.push_step(step);
                added += 1;
            }
        }
        added
    }

    pub fn remove_step(&mut self, index: usize) -> Result<Step, TourError> {
        self.draft.tour.remove_step(index)
    }

    pub fn move_step(&mut self, from: usize, to: usize) -> Result<(), TourError> {
        self.draft.tour.move_step(from, to)
    }

    pub fn update_content(
        &mut self,
        index: usize,
        title: Option<String>,
        content: &str,
    ) -> Result<(), TourError> {
        let step = self.step_mut(index)?;
        step.title = title;
        step.content = content.to_string();
        Ok(())
    }

    pub fn set_action(&mut self, index: usize, action: StepAction) -> Result<(), TourError> {
        self.step_mut(index)?.action = action;
        Ok(())
    }

    /// Validate and produce the tour to save. The draft survives a failed
    /// validation so the author can fix it.
    pub fn finish(
        &mut self,
        title: &str,
        page_url: &str,
        behavior: PlayBehavior,
    ) -> Result<Tour, TourError> {
        let mut tour = self.draft.tour.clone();
        tour.title = title.trim().to_string();
        tour.page_url = crate::model::normalize_page_url(page_url);
        tour.play_behavior = behavior;
        tour.renumber();
        tour.validate()?;
        tracing::info!(
            "Recorded tour {} with {} step(s){}",
            tour.id,
            tour.steps.len(),
            if self.draft.editing { " (edited)" } else { "" }
        );
        Ok(tour)
    }

    fn step_mut(&mut self, index: usize) -> Result<&mut Step, TourError> {
        let len = self.draft.tour.steps.len();
        self.draft
            .tour
            .steps
            .get_mut(index)
            .ok_or(TourError::StepOutOfRange { index, len })
    }
}
