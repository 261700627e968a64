//! Settings document and namespace layout.
//!
//! Everything lives in `<defs>/settings.json`:
//!
//! ```json
//! {
//!   "gameVersions": [6756],
//!   "apiToken": "...",
//!   "projects": { "storage.barrels": 284121 },
//!   "comboModules": { "storage": { "contains": ["storage.barrels"], "depends": [], "stability": 0 } },
//!   "suppressed": ["tablet"],
//!   "layout": { "product": "Charset", "annotations": ["Lcom/example/Module;"], "roots": [...] }
//! }
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use serde::Deserialize;
use thiserror::Error;

use crate::jar::{
    types::module::{title_case_segments, StabilityTier},
    utils::paths::{has_path_prefix, parent_dir},
};

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_API_BASE: &str = "https://minecraft.curseforge.com/api";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("settings are missing {0}")]
    Missing(&'static str),
    #[error("invalid layout: {0}")]
    Layout(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub game_versions: Vec<u32>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Module name to external project id; only these modules are published.
    #[serde(default)]
    pub projects: BTreeMap<String, u64>,
    #[serde(default)]
    pub combo_modules: BTreeMap<String, ComboModule>,
    /// Modules that are built but never published.
    #[serde(default)]
    pub suppressed: BTreeSet<String>,
    pub layout: Layout,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComboModule {
    #[serde(default)]
    pub contains: Vec<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    pub stability: StabilityTier,
}

impl Settings {
    pub fn load(defs_dir: &Path) -> Result<Self, ConfigError> {
        let path = defs_dir.join(SETTINGS_FILE);
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let settings: Settings = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        settings.layout.validate()?;
        Ok(settings)
    }

    /// Publishing for real needs a token; simulated runs do not.
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.api_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::Missing("apiToken"))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceRoot {
    /// Archive path prefix, ending in `/`.
    pub prefix: String,
    /// First dot-segment of the module names that live under this root.
    #[serde(default)]
    pub name_prefix: Option<String>,
    /// Replaces `<product>-<NamePrefix>` in artifact and display names.
    #[serde(default)]
    pub artifact_name: Option<String>,
    #[serde(default = "default_true")]
    pub governed: bool,
}

impl NamespaceRoot {
    pub fn new(prefix: impl Into<String>, governed: bool) -> Self {
        NamespaceRoot {
            prefix: prefix.into(),
            name_prefix: None,
            artifact_name: None,
            governed,
        }
    }

    pub fn with_name_prefix(mut self, name_prefix: impl Into<String>, artifact_name: Option<String>) -> Self {
        self.name_prefix = Some(name_prefix.into());
        self.artifact_name = artifact_name;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnnotationElements {
    pub name: String,
    pub profile: String,
    pub dependencies: String,
    pub conflicts: String,
}

impl Default for AnnotationElements {
    fn default() -> Self {
        AnnotationElements {
            name: "name".into(),
            profile: "profile".into(),
            dependencies: "dependencies".into(),
            conflicts: "antidependencies".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub product: String,
    /// Type descriptors of the module declaration annotation.
    pub annotations: BTreeSet<String>,
    pub roots: Vec<NamespaceRoot>,
    #[serde(default = "default_base_module")]
    pub base_module: String,
    #[serde(default)]
    pub always_include: BTreeSet<String>,
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,
    #[serde(default = "default_metadata_suffix")]
    pub metadata_suffix: String,
    /// Top-level prefixes whose content belongs to modules; anything else
    /// is shared with the library archive as well.
    #[serde(default)]
    pub content_prefixes: Vec<String>,
    #[serde(default = "default_library_excluded_suffixes")]
    pub library_excluded_suffixes: Vec<String>,
    #[serde(default = "default_exempt_tier")]
    pub exempt_tier: String,
    #[serde(default = "default_forced_tier")]
    pub forced_tier: String,
    #[serde(default)]
    pub elements: AnnotationElements,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.into()
}

fn default_true() -> bool {
    true
}

fn default_base_module() -> String {
    "lib".into()
}

fn default_metadata_prefix() -> String {
    "META-INF/fml".into()
}

fn default_metadata_suffix() -> String {
    ".json".into()
}

fn default_library_excluded_suffixes() -> Vec<String> {
    vec![".sh".into()]
}

fn default_exempt_tier() -> String {
    "COMPAT".into()
}

fn default_forced_tier() -> String {
    "FORCED".into()
}

impl Layout {
    pub fn new(
        product: impl Into<String>,
        annotations: impl IntoIterator<Item = String>,
        roots: Vec<NamespaceRoot>,
    ) -> Self {
        Layout {
            product: product.into(),
            annotations: annotations.into_iter().collect(),
            roots,
            base_module: default_base_module(),
            always_include: BTreeSet::new(),
            metadata_prefix: default_metadata_prefix(),
            metadata_suffix: default_metadata_suffix(),
            content_prefixes: Vec::new(),
            library_excluded_suffixes: default_library_excluded_suffixes(),
            exempt_tier: default_exempt_tier(),
            forced_tier: default_forced_tier(),
            elements: AnnotationElements::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.product.is_empty() {
            return Err(ConfigError::Missing("layout.product"));
        }
        if self.annotations.is_empty() {
            return Err(ConfigError::Missing("layout.annotations"));
        }
        if self.roots.is_empty() {
            return Err(ConfigError::Missing("layout.roots"));
        }
        for root in &self.roots {
            if !root.prefix.ends_with('/') {
                return Err(ConfigError::Layout(format!(
                    "root prefix {:?} must end with '/'",
                    root.prefix
                )));
            }
        }
        Ok(())
    }

    /// Root with the longest prefix containing `path`.
    pub fn root_of(&self, path: &str) -> Option<&NamespaceRoot> {
        self.roots
            .iter()
            .filter(|root| path.starts_with(&root.prefix))
            .max_by_key(|root| root.prefix.len())
    }

    /// `path` with its root prefix removed.
    pub fn relative_path<'p>(&self, path: &'p str) -> Option<&'p str> {
        self.root_of(path).map(|root| &path[root.prefix.len()..])
    }

    /// Directory of a declaring unit relative to its root; this is the
    /// prefix the unit's module claims in the ownership index.
    pub fn stripped_prefix<'p>(&self, unit_path: &'p str) -> Option<&'p str> {
        self.relative_path(unit_path)
            .and_then(parent_dir)
            .filter(|prefix| !prefix.is_empty())
    }

    pub fn is_governed(&self, path: &str) -> bool {
        self.roots
            .iter()
            .any(|root| root.governed && path.starts_with(&root.prefix))
    }

    pub fn is_metadata(&self, name: &str) -> bool {
        name.starts_with(&self.metadata_prefix) && name.ends_with(&self.metadata_suffix)
    }

    pub fn is_shared_content(&self, name: &str) -> bool {
        !self
            .content_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }

    pub fn is_library_excluded(&self, name: &str) -> bool {
        self.library_excluded_suffixes
            .iter()
            .any(|suffix| name.ends_with(suffix.as_str()))
    }

    pub fn is_base_module(&self, module_name: &str) -> bool {
        module_name == self.base_module
            || module_name
                .strip_prefix(self.base_module.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    }

    /// Root that holds the module called `module_name`.
    pub fn module_root(&self, module_name: &str) -> Option<&NamespaceRoot> {
        let first = module_name.split('.').next().unwrap_or(module_name);
        self.roots
            .iter()
            .find(|root| root.name_prefix.as_deref() == Some(first))
            .or_else(|| {
                self.roots
                    .iter()
                    .find(|root| root.governed && root.name_prefix.is_none())
            })
    }

    /// Where a module's units live by convention: the root prefix followed by
    /// the module name with dots turned into slashes.
    pub fn conventional_prefix(&self, module_name: &str) -> Option<String> {
        let root = self.module_root(module_name)?;
        let relative = match &root.name_prefix {
            Some(name_prefix) => module_name
                .strip_prefix(name_prefix.as_str())
                .map(|rest| rest.trim_start_matches('.'))
                .unwrap_or(module_name),
            None => module_name,
        };
        let prefix = format!("{}{}", root.prefix, relative.replace('.', "/"));
        Some(prefix.trim_end_matches('/').to_string())
    }

    /// Packaging prefix for one module: the conventional prefix when the
    /// declaring unit lives under it, the declaring unit's directory otherwise.
    pub fn packaging_prefix(&self, module_name: &str, declaring_unit: &str) -> String {
        match self.conventional_prefix(module_name) {
            Some(prefix) if has_path_prefix(declaring_unit, &prefix) => prefix,
            _ => parent_dir(declaring_unit)
                .unwrap_or(declaring_unit)
                .to_string(),
        }
    }

    fn rename_for_root(&self, name: String, module_name: &str, separator: &str) -> String {
        let Some(root) = self.module_root(module_name) else {
            return name;
        };
        let (Some(name_prefix), Some(artifact_name)) = (&root.name_prefix, &root.artifact_name) else {
            return name;
        };
        let from = format!(
            "{}{}{}",
            self.product,
            separator,
            title_case_segments(name_prefix).concat()
        );
        let to = if separator == "-" {
            format!("{artifact_name}-")
        } else {
            artifact_name.clone()
        };
        name.replacen(&from, &to, 1)
    }

    /// `Product-1.0.jar` -> `Product-StorageBarrels-1.0.jar` for `storage.barrels`.
    ///
    /// Fails when the source file name does not carry the product token, as
    /// every artifact would otherwise share the source's name.
    pub fn artifact_file_name(&self, source_file_name: &str, module_name: &str) -> Result<String, ConfigError> {
        if !source_file_name.contains(self.product.as_str()) {
            return Err(ConfigError::Layout(format!(
                "{source_file_name} does not contain the product name {}",
                self.product
            )));
        }
        let label = title_case_segments(module_name).concat();
        let renamed = source_file_name.replacen(
            &self.product,
            &format!("{}-{}", self.product, label),
            1,
        );
        Ok(self.rename_for_root(renamed, module_name, "-"))
    }

    /// `Product Storage Barrels 1.0` for `storage.barrels`.
    pub fn display_name(&self, module_name: &str, version: &str) -> String {
        let mut name = self.product.clone();
        for segment in title_case_segments(module_name) {
            name.push(' ');
            name.push_str(&segment);
        }
        name.push(' ');
        name.push_str(version);
        self.rename_for_root(name, module_name, " ")
    }
}
