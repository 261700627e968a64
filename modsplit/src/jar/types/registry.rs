//! Module registry and the path-prefix ownership index.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    config::Layout,
    jar::{
        types::module::{ModuleAnnotation, ModuleDeclaration, StabilityTier},
        utils::paths::strip_inner_class,
    },
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("module {name} is declared by both {first} and {second}")]
    DuplicateModule {
        name: String,
        first: String,
        second: String,
    },
    #[error("combo module {combo} contains unknown module {member}")]
    UnknownComboMember { combo: String, member: String },
    #[error("combo module {0} clashes with an existing module")]
    ComboNameTaken(String),
    #[error("combo module {0} has no members")]
    EmptyCombo(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Claim {
    Owner(String),
    /// Claimed by two modules; resolves to nobody.
    Colliding,
}

#[derive(Debug, Default)]
struct PrefixNode {
    children: BTreeMap<String, PrefixNode>,
    claim: Option<Claim>,
}

/// Trie over `/`-separated path segments answering longest-prefix queries.
#[derive(Debug, Default)]
pub struct PrefixIndex {
    root: PrefixNode,
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

impl PrefixIndex {
    /// Claims `prefix` for `module`. Returns false when the prefix is (now)
    /// colliding.
    pub fn claim(&mut self, prefix: &str, module: &str) -> bool {
        let mut node = &mut self.root;
        for segment in segments(prefix) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        match &node.claim {
            None => {
                node.claim = Some(Claim::Owner(module.to_string()));
                true
            }
            Some(Claim::Owner(owner)) if owner == module => true,
            Some(Claim::Owner(_)) => {
                node.claim = Some(Claim::Colliding);
                false
            }
            Some(Claim::Colliding) => false,
        }
    }

    /// Owner of the longest claimed prefix of `path`. A colliding prefix
    /// shadows any shorter claim above it.
    pub fn longest_match(&self, path: &str) -> Option<&str> {
        let mut node = &self.root;
        let mut best = None;
        for segment in segments(path) {
            let Some(child) = node.children.get(segment) else {
                break;
            };
            node = child;
            match &node.claim {
                Some(Claim::Owner(owner)) => best = Some(owner.as_str()),
                Some(Claim::Colliding) => best = None,
                None => {}
            }
        }
        best
    }

    pub fn is_colliding(&self, prefix: &str) -> bool {
        let mut node = &self.root;
        for segment in segments(prefix) {
            match node.children.get(segment) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.claim == Some(Claim::Colliding)
    }
}

#[derive(Debug)]
pub struct ModuleRegistry {
    layout: Layout,
    modules: BTreeMap<String, ModuleDeclaration>,
    /// Declaring unit path -> module name.
    declarers: BTreeMap<String, String>,
    /// One index per namespace root, keyed by root prefix.
    prefixes: BTreeMap<String, PrefixIndex>,
}

impl ModuleRegistry {
    pub fn new(layout: Layout) -> Self {
        ModuleRegistry {
            layout,
            modules: BTreeMap::new(),
            declarers: BTreeMap::new(),
            prefixes: BTreeMap::new(),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn declare_module(
        &mut self,
        unit: &str,
        annotation: ModuleAnnotation,
    ) -> Result<&ModuleDeclaration, RegistryError> {
        if let Some(existing) = self.modules.get(&annotation.name) {
            return Err(RegistryError::DuplicateModule {
                name: annotation.name,
                first: existing.declaring_unit().unwrap_or("<combo>").to_string(),
                second: unit.to_string(),
            });
        }

        let name = annotation.name.clone();
        let root = self.layout.root_of(unit).map(|root| root.prefix.clone());
        match (root, self.layout.stripped_prefix(unit)) {
            (Some(root), Some(prefix)) => {
                if self.prefixes.entry(root.clone()).or_default().claim(prefix, &name) {
                    debug!("{} owns {}{}", name, root, prefix);
                } else {
                    warn!(
                        "Prefix {}{} is claimed by more than one module, leaving it unowned",
                        root, prefix
                    );
                }
            }
            _ => debug!("{} is declared outside the namespace roots by {}", name, unit),
        }

        self.declarers.insert(unit.to_string(), name.clone());
        let module: &ModuleDeclaration = self
            .modules
            .entry(name)
            .or_insert(ModuleDeclaration::declared(unit, annotation));
        Ok(module)
    }

    pub fn merge_combo(
        &mut self,
        name: &str,
        members: &[String],
        dependencies: &[String],
        tier: StabilityTier,
    ) -> Result<&ModuleDeclaration, RegistryError> {
        if self.modules.contains_key(name) {
            return Err(RegistryError::ComboNameTaken(name.to_string()));
        }
        if members.is_empty() {
            return Err(RegistryError::EmptyCombo(name.to_string()));
        }
        if let Some(member) = members.iter().find(|member| !self.modules.contains_key(*member)) {
            return Err(RegistryError::UnknownComboMember {
                combo: name.to_string(),
                member: member.clone(),
            });
        }

        let combo = ModuleDeclaration::combo(
            name,
            members.iter().cloned(),
            dependencies.to_vec(),
            Some(tier),
        );
        let module: &ModuleDeclaration = self.modules.entry(name.to_string()).or_insert(combo);
        Ok(module)
    }

    /// Resolves a unit path or internal class name to its owning module.
    ///
    /// With `prefer_declared` set, a unit that declares a module (or one of
    /// its nested units) belongs to that module regardless of where it lives.
    pub fn owner_of(&self, path: &str, prefer_declared: bool) -> Option<&ModuleDeclaration> {
        let path = strip_inner_class(path);

        if prefer_declared {
            if let Some(module) = self.declarers.get(path.as_ref()) {
                return self.modules.get(module);
            }
        }

        let root = self.layout.root_of(&path)?;
        let relative = &path[root.prefix.len()..];
        let module = self.prefixes.get(&root.prefix)?.longest_match(relative)?;
        self.modules.get(module)
    }

    pub fn get(&self, name: &str) -> Option<&ModuleDeclaration> {
        self.modules.get(name)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleDeclaration> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn is_declaring_unit(&self, path: &str) -> bool {
        self.declarers.contains_key(path)
    }

    /// Whether the directory `dir` was claimed by more than one module.
    pub fn is_colliding(&self, dir: &str) -> bool {
        let Some(root) = self.layout.root_of(dir) else {
            return false;
        };
        self.prefixes
            .get(&root.prefix)
            .is_some_and(|index| index.is_colliding(&dir[root.prefix.len()..]))
    }

    /// Archive path prefixes whose entries belong to `module`, one per
    /// declared module it subsumes. Combo members are expanded recursively.
    pub fn packaging_prefixes(&self, module: &ModuleDeclaration) -> Vec<String> {
        let mut prefixes = Vec::new();
        let mut visited = BTreeSet::new();
        let mut pending = module.members.iter().map(String::as_str).collect::<Vec<_>>();

        while let Some(name) = pending.pop() {
            if !visited.insert(name) {
                continue;
            }
            let Some(member) = self.modules.get(name) else {
                continue;
            };
            match member.declaring_unit() {
                Some(unit) => prefixes.push(self.layout.packaging_prefix(name, unit)),
                None => pending.extend(member.members.iter().map(String::as_str)),
            }
        }

        prefixes.sort();
        prefixes.dedup();
        prefixes
    }
}
