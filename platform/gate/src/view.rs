use platform_authz::{Denial, DenialReason, Grade};
use serde::Serialize;

use crate::navigation::Navigator;

/// Recovery actions offered on the denial screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(into = "ActionDescriptor")]
pub enum DenialAction {
    GoBack,
    GoToGrade(Grade),
}

impl DenialAction {
    pub fn label(&self) -> String {
        match self {
            DenialAction::GoBack => "Go Back".to_string(),
            DenialAction::GoToGrade(grade) => grade.content_label(),
        }
    }

    pub fn perform(&self, navigator: &dyn Navigator) {
        match self {
            DenialAction::GoBack => navigator.go_back(),
            DenialAction::GoToGrade(grade) => navigator.navigate(&grade.root_path()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionDescriptor {
    pub kind: &'static str,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl From<DenialAction> for ActionDescriptor {
    fn from(action: DenialAction) -> Self {
        let label = action.label();
        match action {
            DenialAction::GoBack => Self {
                kind: "back",
                label,
                href: None,
            },
            DenialAction::GoToGrade(grade) => Self {
                kind: "navigate",
                label,
                href: Some(grade.root_path()),
            },
        }
    }
}

/// What a viewer sees instead of content they may not open.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DenialView {
    pub reason: DenialReason,
    pub required_grade: Grade,
    pub viewer_grade: Option<Grade>,
    pub required_label: String,
    pub viewer_label: Option<String>,
    pub actions: Vec<DenialAction>,
}

impl DenialView {
    pub fn new(required_grade: Grade, denial: Denial) -> Self {
        let mut actions = vec![DenialAction::GoBack];
        if let Some(own) = denial.viewer_grade {
            actions.push(DenialAction::GoToGrade(own));
        }
        Self {
            reason: denial.reason,
            required_grade,
            viewer_grade: denial.viewer_grade,
            required_label: required_grade.to_string(),
            viewer_label: denial.viewer_grade.map(|grade| grade.to_string()),
            actions,
        }
    }

    pub fn action(&self, label: &str) -> Option<DenialAction> {
        self.actions
            .iter()
            .copied()
            .find(|action| action.label() == label)
    }

    /// Run an action picked by the viewer. Actions not on this view are ignored.
    pub fn trigger(&self, action: DenialAction, navigator: &dyn Navigator) -> bool {
        if !self.actions.contains(&action) {
            return false;
        }
        action.perform(navigator);
        true
    }
}
