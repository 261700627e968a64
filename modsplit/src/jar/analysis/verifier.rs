//! Cross-module reference checks.

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt,
};

use colored::Colorize;
use tracing::debug;

use crate::jar::{analysis::extractor::ClassReferences, types::registry::ModuleRegistry};

/// A unit referencing a module its owner does not depend on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub unit: String,
    pub owner: String,
    pub target: String,
    pub symbols: BTreeSet<String>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cross-module dependency found: {} depends on {}:\n< {}",
            self.owner, self.target, self.unit
        )?;
        for symbol in &self.symbols {
            write!(f, "\n> {symbol}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct VerificationReport {
    /// Owner module -> violations attributed to it.
    violations: BTreeMap<String, Vec<Violation>>,
    /// Governed units no module owns.
    unowned: BTreeSet<String>,
}

impl VerificationReport {
    pub fn record(&mut self, violation: Violation) {
        self.violations
            .entry(violation.owner.clone())
            .or_default()
            .push(violation);
    }

    pub fn record_unowned(&mut self, unit: &str) {
        self.unowned.insert(unit.to_string());
    }

    pub fn violations_of(&self, module: &str) -> &[Violation] {
        self.violations.get(module).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn violations(&self) -> impl Iterator<Item = &Violation> {
        self.violations.values().flatten()
    }

    pub fn unowned(&self) -> &BTreeSet<String> {
        &self.unowned
    }

    pub fn len(&self) -> usize {
        self.violations.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Terminal rendering of every violation, grouped by owner.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (owner, violations) in &self.violations {
            out.push_str(&format!(
                "{} {}\n",
                owner.bold().red(),
                format!("({} violations)", violations.len()).dimmed()
            ));
            for violation in violations {
                out.push_str(&format!(
                    "  {} depends on {}\n  {} {}\n",
                    violation.owner.yellow(),
                    violation.target.yellow(),
                    "<".red(),
                    violation.unit
                ));
                for symbol in &violation.symbols {
                    out.push_str(&format!("  {} {}\n", ">".green(), symbol));
                }
            }
        }
        out
    }
}

/// Breadth-first walk of `from`'s dependency edges looking for `target`.
pub fn dependency_reaches(registry: &ModuleRegistry, from: &str, target: &str) -> bool {
    let mut visited = BTreeSet::from([from]);
    let mut queue = VecDeque::from([from]);

    while let Some(name) = queue.pop_front() {
        if name == target {
            return true;
        }
        let Some(module) = registry.get(name) else {
            continue;
        };
        for dependency in &module.dependencies {
            if visited.insert(dependency.as_str()) {
                queue.push_back(dependency.as_str());
            }
        }
    }
    false
}

/// Checks every reference of one governed unit, recording violations in
/// `report`. Returns the number recorded.
pub fn verify_unit(
    registry: &ModuleRegistry,
    unit: &str,
    references: &ClassReferences,
    report: &mut VerificationReport,
) -> usize {
    let declared_owner = registry.owner_of(unit, true).map(|m| m.name.as_str());
    let path_owner = registry.owner_of(unit, false).map(|m| m.name.as_str());
    let Some(owner) = path_owner.or(declared_owner) else {
        debug!("{} has no owning module", unit);
        report.record_unowned(unit);
        return 0;
    };

    let mut by_target: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    for symbol in &references.symbols {
        if let Some(target) = registry.owner_of(symbol, false) {
            by_target
                .entry(target.name.as_str())
                .or_default()
                .insert(symbol.clone());
        }
    }

    let base = registry.layout().base_module.as_str();
    let mut recorded = 0;
    for (target, symbols) in by_target {
        if target == base || Some(target) == declared_owner || Some(target) == path_owner {
            continue;
        }
        let reachable = [declared_owner, path_owner]
            .into_iter()
            .flatten()
            .any(|from| dependency_reaches(registry, from, target));
        if reachable {
            continue;
        }
        report.record(Violation {
            unit: unit.to_string(),
            owner: owner.to_string(),
            target: target.to_string(),
            symbols,
        });
        recorded += 1;
    }
    recorded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{annotation, test_layout};

    fn registry(modules: &[(&str, &[&str])]) -> ModuleRegistry {
        let mut registry = ModuleRegistry::new(test_layout());
        for (name, deps) in modules {
            let unit = format!("com/example/module/{name}/Module.class");
            registry.declare_module(&unit, annotation(name, deps)).unwrap();
        }
        registry
    }

    fn references(unit: &str, symbols: &[&str]) -> ClassReferences {
        ClassReferences {
            name: unit.trim_end_matches(".class").to_string(),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn unrelated_module_reference_is_one_violation() {
        let registry = registry(&[("a", &["b"]), ("b", &[]), ("c", &[])]);
        let mut report = VerificationReport::default();

        let units = [
            ("com/example/module/a/Alpha.class", vec!["com/example/module/b/Beta"]),
            ("com/example/module/b/Beta.class", vec!["java/lang/String"]),
            ("com/example/module/c/Gamma.class", vec!["com/example/module/a/Alpha"]),
        ];
        for (unit, symbols) in &units {
            verify_unit(&registry, unit, &references(unit, symbols), &mut report);
        }

        assert_eq!(report.len(), 1);
        assert!(report.violations_of("a").is_empty());
        assert!(report.violations_of("b").is_empty());
        let violation = &report.violations_of("c")[0];
        assert_eq!(violation.target, "a");
        assert_eq!(violation.unit, "com/example/module/c/Gamma.class");
        assert!(violation.symbols.contains("com/example/module/a/Alpha"));
    }

    #[test]
    fn reachability_is_transitive_and_directed() {
        let registry = registry(&[("a", &["b"]), ("b", &["c"]), ("c", &[])]);
        assert!(dependency_reaches(&registry, "a", "c"));
        assert!(!dependency_reaches(&registry, "c", "a"));

        let mut report = VerificationReport::default();
        let unit = "com/example/module/a/Alpha.class";
        assert_eq!(verify_unit(&registry, unit, &references(unit, &["com/example/module/c/X"]), &mut report), 0);
        let unit = "com/example/module/c/Gamma.class";
        assert_eq!(verify_unit(&registry, unit, &references(unit, &["com/example/module/a/X"]), &mut report), 1);
    }

    #[test]
    fn reachability_survives_cycles() {
        let registry = registry(&[("a", &["b"]), ("b", &["a"]), ("c", &[])]);
        assert!(dependency_reaches(&registry, "b", "a"));
        assert!(!dependency_reaches(&registry, "a", "c"));
        assert!(!dependency_reaches(&registry, "a", "missing"));
    }

    #[test]
    fn base_module_and_self_are_always_allowed() {
        let mut registry = registry(&[("a", &[])]);
        registry
            .declare_module("com/example/module/lib/Lib.class", annotation("lib", &[]))
            .unwrap();

        let mut report = VerificationReport::default();
        let unit = "com/example/module/a/Alpha$Inner.class";
        let refs = references(
            unit,
            &["com/example/module/lib/Util", "com/example/module/a/Other", "org/outside/Thing"],
        );
        assert_eq!(verify_unit(&registry, unit, &refs, &mut report), 0);
        assert!(report.is_empty());
    }

    #[test]
    fn symbols_are_grouped_per_target() {
        let registry = registry(&[("a", &[]), ("b", &[])]);
        let mut report = VerificationReport::default();
        let unit = "com/example/module/a/Alpha.class";
        let refs = references(unit, &["com/example/module/b/One", "com/example/module/b/Two"]);

        assert_eq!(verify_unit(&registry, unit, &refs, &mut report), 1);
        let violation = &report.violations_of("a")[0];
        assert_eq!(violation.symbols.len(), 2);
        assert_eq!(
            violation.to_string(),
            "Cross-module dependency found: a depends on b:\n< com/example/module/a/Alpha.class\n> com/example/module/b/One\n> com/example/module/b/Two"
        );
    }

    #[test]
    fn unowned_units_are_tracked() {
        let registry = registry(&[("a", &[])]);
        let mut report = VerificationReport::default();
        let unit = "com/example/module/z/Loose.class";
        verify_unit(&registry, unit, &references(unit, &["com/example/module/a/A"]), &mut report);
        assert!(report.unowned().contains(unit));
        assert!(report.is_empty());
    }
}
