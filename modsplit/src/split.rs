//! Splits one archive into per-module archives plus a library archive.
//!
//! The run is a fixed sequence of phases over an owned [`RunContext`]:
//! discovery, combo merging, verification, violation reporting, module
//! archives and finally the library archive. Any error aborts the run;
//! archives written before it stay on disk.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::{
    config::{ComboModule, Layout, Settings},
    jar::{
        analysis::{
            extractor::extract_references,
            scanner::scan_for_module_declaration,
            verifier::{verify_unit, VerificationReport},
        },
        core::classfile::{parse, UnitError},
        io::{
            reader::{ArchiveEntry, SourceArchive},
            writer::{write_archive, MANIFEST_NAME},
        },
        modification::{
            forcer::force_module_profile,
            optimizer::ImageOptimizer,
            pruner::{parse_metadata, prune_metadata, render_metadata},
        },
        types::{module::ModuleDeclaration, registry::ModuleRegistry},
        utils::paths::{class_name_of, has_path_prefix, strip_inner_class},
    },
    types::{SplitEvent, Stage, StageProgress},
};

const PROGRESS_INTERVAL: usize = 300;

#[derive(Debug, Clone, Default)]
pub struct SplitOptions {
    pub out_dir: PathBuf,
    /// Runs over every image during verification when set.
    pub optimizer: Option<ImageOptimizer>,
}

/// An archive written by the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub module: String,
    pub path: PathBuf,
    pub entries: BTreeSet<String>,
}

impl Artifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Everything a run accumulates, threaded through each phase.
#[derive(Debug)]
pub struct RunContext {
    pub registry: ModuleRegistry,
    pub report: VerificationReport,
    /// Parsed metadata documents by entry name.
    pub metadata: BTreeMap<String, Map<String, Value>>,
    /// Entry bytes replacing the originals in every output.
    pub replacements: BTreeMap<String, Vec<u8>>,
    /// Entries no output has taken yet.
    pub unclaimed: BTreeSet<String>,
    /// Entry -> first standalone module archive that took it.
    claims: BTreeMap<String, String>,
    pub artifacts: Vec<Artifact>,
    pub library: Option<Artifact>,
    pub strays: Vec<String>,
}

impl RunContext {
    pub fn new(layout: Layout, entry_names: &[String]) -> Self {
        RunContext {
            registry: ModuleRegistry::new(layout),
            report: VerificationReport::default(),
            metadata: BTreeMap::new(),
            replacements: BTreeMap::new(),
            unclaimed: entry_names
                .iter()
                .filter(|name| *name != MANIFEST_NAME)
                .cloned()
                .collect(),
            claims: BTreeMap::new(),
            artifacts: Vec::new(),
            library: None,
            strays: Vec::new(),
        }
    }

    pub fn artifact_of(&self, module: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|artifact| artifact.module == module)
    }
}

/// Whether `module` gets an archive of its own.
pub fn is_eligible(layout: &Layout, module: &ModuleDeclaration) -> bool {
    module.is_releasable() && !layout.is_base_module(&module.name)
}

pub fn split(
    source_path: &Path,
    settings: &Settings,
    options: &SplitOptions,
    mut report_progress: impl FnMut(SplitEvent),
) -> anyhow::Result<RunContext> {
    let source = SourceArchive::open(source_path)?;
    fs::create_dir_all(&options.out_dir)
        .with_context(|| format!("failed to create {}", options.out_dir.display()))?;
    artifact_path(&source, &settings.layout, &options.out_dir, &settings.layout.base_module)?;

    let mut ctx = discover(&source, &settings.layout, &mut report_progress)?;

    report_progress(Stage::MergingCombos.into());
    merge_combos(&mut ctx, &settings.combo_modules)?;

    verify(&source, &mut ctx, options.optimizer.as_ref(), &mut report_progress)?;

    report_progress(Stage::ReportingViolations.into());
    report_violations(&ctx);

    build_module_archives(&source, &mut ctx, &options.out_dir, &mut report_progress)?;

    report_progress(Stage::BuildingLibrary.into());
    build_library_archive(&source, &mut ctx, &options.out_dir)?;

    report_progress(SplitEvent {
        stage: Stage::Done,
        progress: StageProgress::Done,
    });
    Ok(ctx)
}

fn report_pass_progress(
    report_progress: &mut impl FnMut(SplitEvent),
    stage: Stage,
    index: usize,
    total: usize,
) {
    if index % PROGRESS_INTERVAL == 0 {
        report_progress(SplitEvent {
            stage,
            progress: StageProgress::Percentage((index + 1) as f32 / total.max(1) as f32),
        });
    }
}

/// Where the archive of `module` goes. Never the source archive itself.
fn artifact_path(
    source: &SourceArchive,
    layout: &Layout,
    out_dir: &Path,
    module: &str,
) -> anyhow::Result<PathBuf> {
    let file_name = layout.artifact_file_name(&source.file_name(), module)?;
    let out_path = out_dir.join(file_name);
    ensure_not_source(source.path(), &out_path)?;
    Ok(out_path)
}

fn ensure_not_source(source_path: &Path, out_path: &Path) -> anyhow::Result<()> {
    let source = fs::canonicalize(source_path)
        .with_context(|| format!("failed to resolve {}", source_path.display()))?;
    let target = match (out_path.parent(), out_path.file_name()) {
        (Some(dir), Some(name)) => fs::canonicalize(dir)
            .map(|dir| dir.join(name))
            .unwrap_or_else(|_| out_path.to_path_buf()),
        _ => out_path.to_path_buf(),
    };
    if source == target {
        bail!("{} would overwrite the source archive", out_path.display());
    }
    Ok(())
}

/// First pass: registers every module declaration in the archive.
pub fn discover(
    source: &SourceArchive,
    layout: &Layout,
    report_progress: &mut impl FnMut(SplitEvent),
) -> anyhow::Result<RunContext> {
    info!("Discovering modules in {}", source.path().display());
    let mut ctx = RunContext::new(layout.clone(), source.entry_names());
    let total = source.entry_names().len();
    let mut index = 0;

    source.for_each_entry(|entry| {
        report_pass_progress(report_progress, Stage::DiscoveringModules, index, total);
        index += 1;

        if entry.is_dir || class_name_of(&entry.name).is_none() {
            return Ok(());
        }
        let class = parse(&entry.data).map_err(|e| UnitError::new(&entry.name, e))?;
        let Some(annotation) = scan_for_module_declaration(&class, ctx.registry.layout())
            .map_err(|e| UnitError::new(&entry.name, e))?
        else {
            return Ok(());
        };

        let module = ctx.registry.declare_module(&entry.name, annotation)?;
        debug!("Found module {} in {}", module.name, entry.name);
        Ok(())
    })?;

    info!("Found {} modules", ctx.registry.len());
    Ok(ctx)
}

pub fn merge_combos(
    ctx: &mut RunContext,
    combos: &BTreeMap<String, ComboModule>,
) -> anyhow::Result<()> {
    for (name, combo) in combos {
        ctx.registry
            .merge_combo(name, &combo.contains, &combo.depends, combo.stability)?;
        debug!("Merged combo module {} from {:?}", name, combo.contains);
    }
    Ok(())
}

/// Second pass: loads metadata documents, optimizes images and checks the
/// references of every governed unit.
pub fn verify(
    source: &SourceArchive,
    ctx: &mut RunContext,
    optimizer: Option<&ImageOptimizer>,
    report_progress: &mut impl FnMut(SplitEvent),
) -> anyhow::Result<()> {
    info!("Verifying cross-module references");
    let total = source.entry_names().len();
    let mut index = 0;

    source.for_each_entry(|entry| {
        report_pass_progress(report_progress, Stage::VerifyingReferences, index, total);
        index += 1;
        if entry.is_dir {
            return Ok(());
        }

        let layout = ctx.registry.layout();
        if layout.is_metadata(&entry.name) {
            match parse_metadata(&entry.name, &entry.data) {
                Ok(metadata) => {
                    ctx.metadata.insert(entry.name.clone(), metadata);
                }
                Err(e) => warn!("Not pruning {}: {:#}", entry.name, e),
            }
        } else if let Some(optimizer) = optimizer.filter(|_| ImageOptimizer::is_candidate(&entry.name)) {
            if let Some(optimized) = optimizer.optimize(&entry.name, &entry.data) {
                ctx.replacements.insert(entry.name.clone(), optimized);
            }
        } else if class_name_of(&entry.name).is_some() && layout.is_governed(&entry.name) {
            let references = extract_references(&entry.data, &entry.name)?;
            verify_unit(&ctx.registry, &entry.name, &references, &mut ctx.report);
        }
        Ok(())
    })?;

    Ok(())
}

pub fn report_violations(ctx: &RunContext) {
    for unit in ctx.report.unowned() {
        warn!("No module owns {}", unit);
    }
    if ctx.report.is_empty() {
        info!("No cross-module violations found");
    } else {
        warn!("Found {} cross-module violations", ctx.report.len());
    }
}

fn is_packaged(
    layout: &Layout,
    metadata: &BTreeMap<String, Map<String, Value>>,
    prefixes: &[String],
    name: &str,
) -> bool {
    if layout.always_include.contains(name) || metadata.contains_key(name) {
        return true;
    }
    let stripped = strip_inner_class(name);
    prefixes.iter().any(|prefix| has_path_prefix(&stripped, prefix))
}

pub fn build_module_archives(
    source: &SourceArchive,
    ctx: &mut RunContext,
    out_dir: &Path,
    report_progress: &mut impl FnMut(SplitEvent),
) -> anyhow::Result<()> {
    let RunContext {
        registry,
        metadata,
        replacements,
        unclaimed,
        claims,
        artifacts,
        ..
    } = ctx;
    let layout = registry.layout();

    for module in registry.modules() {
        if !is_eligible(layout, module) {
            debug!("Skipping {} ({:?})", module.name, module.tier);
            continue;
        }
        report_progress(Stage::BuildingModule(module.name.clone()).into());

        let prefixes = registry.packaging_prefixes(module);
        let out_path = artifact_path(source, layout, out_dir, &module.name)?;
        if let Some(other) = artifacts.iter().find(|artifact| artifact.path == out_path) {
            bail!(
                "{} and {} would both be written to {}",
                other.module,
                module.name,
                out_path.display()
            );
        }
        info!("Building {}", out_path.display());
        debug!("{} packages {:?}", module.name, prefixes);

        let include = |name: &str| is_packaged(layout, metadata, &prefixes, name);
        let patch = |entry: &ArchiveEntry| -> anyhow::Result<Option<Vec<u8>>> {
            if let Some(replacement) = replacements.get(&entry.name) {
                return Ok(Some(replacement.clone()));
            }
            if let Some(document) = metadata.get(&entry.name) {
                let pruned = prune_metadata(document, |unit| include(unit));
                return render_metadata(&pruned).map(Some);
            }
            if registry.is_declaring_unit(&entry.name) {
                return force_module_profile(&entry.data, layout)
                    .map_err(|e| UnitError::new(&entry.name, e).into());
            }
            Ok(None)
        };
        let summary = write_archive(source, &out_path, unclaimed, &include, patch)?;

        if !module.is_combo() {
            for name in &summary.entries {
                if name.ends_with('/')
                    || layout.always_include.contains(name)
                    || metadata.contains_key(name)
                {
                    continue;
                }
                if let Some(first) = claims.get(name) {
                    warn!("{} is packaged by both {} and {}", name, first, module.name);
                } else {
                    claims.insert(name.clone(), module.name.clone());
                }
            }
        }

        artifacts.push(Artifact {
            module: module.name.clone(),
            path: summary.path,
            entries: summary.entries,
        });
    }
    Ok(())
}

pub fn build_library_archive(
    source: &SourceArchive,
    ctx: &mut RunContext,
    out_dir: &Path,
) -> anyhow::Result<()> {
    let layout = ctx.registry.layout();

    for name in source.entry_names() {
        if name != MANIFEST_NAME && layout.is_shared_content(name) {
            ctx.unclaimed.insert(name.clone());
        }
    }

    let base = layout.base_module.clone();
    let out_path = artifact_path(source, layout, out_dir, &base)?;
    if let Some(other) = ctx.artifacts.iter().find(|artifact| artifact.path == out_path) {
        bail!("the library and {} would both be written to {}", other.module, out_path.display());
    }
    info!("Building {}", out_path.display());

    let candidates = ctx.unclaimed.clone();
    let replacements = &ctx.replacements;
    let summary = write_archive(
        source,
        &out_path,
        &mut ctx.unclaimed,
        |name| {
            candidates.contains(name) && !layout.is_governed(name) && !layout.is_library_excluded(name)
        },
        |entry| Ok(replacements.get(&entry.name).cloned()),
    )?;

    for name in &ctx.unclaimed {
        if !name.ends_with('/') {
            warn!("Found stray file without home: {}", name);
            ctx.strays.push(name.clone());
        }
    }

    ctx.library = Some(Artifact {
        module: base,
        path: summary.path,
        entries: summary.entries,
    });
    Ok(())
}
