#[derive(Debug, Clone)]
pub struct SplitEvent {
    pub stage: Stage,
    pub progress: StageProgress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    DiscoveringModules,
    MergingCombos,
    VerifyingReferences,
    ReportingViolations,
    BuildingModule(String),
    BuildingLibrary,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::DiscoveringModules => "Discovering Modules",
            Stage::MergingCombos => "Merging Combo Modules",
            Stage::VerifyingReferences => "Verifying References",
            Stage::ReportingViolations => "Reporting Violations",
            Stage::BuildingModule(_) => "Building Module Archive",
            Stage::BuildingLibrary => "Building Library Archive",
            Stage::Done => "Done",
        }
    }

    pub fn label(&self) -> String {
        match self {
            Stage::BuildingModule(name) => format!("{} ({})", self.as_str(), name),
            _ => self.as_str().to_string(),
        }
    }
}

impl From<Stage> for SplitEvent {
    fn from(value: Stage) -> Self {
        SplitEvent {
            stage: value,
            progress: StageProgress::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageProgress {
    Unknown,
    Percentage(f32),
    Done,
}
