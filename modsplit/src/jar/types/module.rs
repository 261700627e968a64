use std::collections::BTreeSet;

use serde::Deserialize;

/// Release readiness of a module, ordered from most to least stable.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    strum_macros::EnumString,
    strum_macros::Display,
    strum_macros::EnumIter,
    strum_macros::IntoStaticStr,
)]
#[serde(try_from = "TierRepr")]
pub enum StabilityTier {
    #[strum(serialize = "STABLE")]
    Stable,
    #[strum(serialize = "TESTING")]
    Testing,
    #[strum(serialize = "EXPERIMENTAL")]
    Experimental,
    #[strum(serialize = "INDEV")]
    InDevelopment,
}

impl StabilityTier {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(StabilityTier::Stable),
            1 => Some(StabilityTier::Testing),
            2 => Some(StabilityTier::Experimental),
            3 => Some(StabilityTier::InDevelopment),
            _ => None,
        }
    }

    /// Stable, testing and experimental modules get their own archive.
    pub fn is_releasable(self) -> bool {
        self <= StabilityTier::Experimental
    }

    pub fn release_type(self) -> &'static str {
        match self {
            StabilityTier::Stable => "release",
            StabilityTier::Testing => "beta",
            StabilityTier::Experimental | StabilityTier::InDevelopment => "alpha",
        }
    }
}

// Settings written by hand use the numeric levels, newer ones the names.
#[derive(Deserialize)]
#[serde(untagged)]
enum TierRepr {
    Level(u8),
    Name(String),
}

impl TryFrom<TierRepr> for StabilityTier {
    type Error = String;

    fn try_from(value: TierRepr) -> Result<Self, Self::Error> {
        match value {
            TierRepr::Level(level) => StabilityTier::from_level(level)
                .ok_or_else(|| format!("unknown stability level {level}")),
            TierRepr::Name(name) => name
                .parse()
                .map_err(|_| format!("unknown stability tier {name:?}")),
        }
    }
}

/// Values read off a module declaration annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleAnnotation {
    pub name: String,
    pub tier: Option<StabilityTier>,
    pub dependencies: Vec<String>,
    pub conflicts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOrigin {
    /// Declared by an annotated compiled unit at this archive path.
    Declared { unit: String },
    /// Assembled from other modules by configuration.
    Combo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDeclaration {
    pub name: String,
    /// `None` when the declaration carries no recognised tier.
    pub tier: Option<StabilityTier>,
    pub members: BTreeSet<String>,
    pub dependencies: Vec<String>,
    pub conflicts: Vec<String>,
    pub origin: ModuleOrigin,
}

impl ModuleDeclaration {
    pub fn declared(unit: impl Into<String>, annotation: ModuleAnnotation) -> Self {
        ModuleDeclaration {
            members: BTreeSet::from([annotation.name.clone()]),
            name: annotation.name,
            tier: annotation.tier,
            dependencies: annotation.dependencies,
            conflicts: annotation.conflicts,
            origin: ModuleOrigin::Declared { unit: unit.into() },
        }
    }

    pub fn combo(
        name: impl Into<String>,
        members: impl IntoIterator<Item = String>,
        dependencies: Vec<String>,
        tier: Option<StabilityTier>,
    ) -> Self {
        ModuleDeclaration {
            name: name.into(),
            tier,
            members: members.into_iter().collect(),
            dependencies,
            conflicts: Vec::new(),
            origin: ModuleOrigin::Combo,
        }
    }

    pub fn declaring_unit(&self) -> Option<&str> {
        match &self.origin {
            ModuleOrigin::Declared { unit } => Some(unit),
            ModuleOrigin::Combo => None,
        }
    }

    pub fn is_combo(&self) -> bool {
        matches!(self.origin, ModuleOrigin::Combo)
    }

    pub fn is_releasable(&self) -> bool {
        self.tier.is_some_and(StabilityTier::is_releasable)
    }
}

/// `storage.barrels` -> `["Storage", "Barrels"]`
pub fn title_case_segments(name: &str) -> Vec<String> {
    name.split('.')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect()
}
