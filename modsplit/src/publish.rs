//! Uploads built artifacts to the hosting service.

use std::path::Path;

use anyhow::{bail, Context};
use reqwest::{
    blocking::{multipart::Form, Client},
    StatusCode,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    config::Settings,
    ledger::{fingerprint_archive, PublishLedger},
    split::{Artifact, RunContext},
};

const API_TOKEN_HEADER: &str = "X-Api-Token";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishMetadata {
    pub changelog: String,
    pub display_name: String,
    pub game_versions: Vec<u32>,
    pub release_type: String,
}

/// `Example-A-1.2.3.jar` -> `1.2.3`; a trailing `full` segment is skipped.
pub fn artifact_version(file_name: &str) -> String {
    let segments = file_name.split('-').collect::<Vec<_>>();
    let version = match segments.as_slice() {
        [.., version, last] if last.starts_with("full") => *version,
        [.., last] => *last,
        [] => file_name,
    };
    version.replacen(".jar", "", 1)
}

pub trait Uploader {
    fn upload(&self, project_id: u64, artifact: &Path, metadata: &PublishMetadata) -> anyhow::Result<()>;
}

pub struct Publisher {
    client: Client,
    api_base: String,
    token: String,
}

impl Publisher {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Publisher {
            client: Client::new(),
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            token: settings.require_token()?.to_string(),
        })
    }
}

impl Uploader for Publisher {
    fn upload(&self, project_id: u64, artifact: &Path, metadata: &PublishMetadata) -> anyhow::Result<()> {
        let url = format!("{}/projects/{}/upload-file", self.api_base, project_id);
        let form = Form::new()
            .file("file", artifact)
            .with_context(|| format!("failed to attach {}", artifact.display()))?
            .text("metadata", serde_json::to_string(metadata)?);

        let response = self
            .client
            .post(&url)
            .header(API_TOKEN_HEADER, &self.token)
            .multipart(form)
            .send()
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        let body = response.text().unwrap_or_default();
        if status != StatusCode::OK {
            bail!("{url} answered {status}: {body}");
        }
        debug!("{}", body);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub published: Vec<String>,
    pub simulated: Vec<String>,
    pub unchanged: Vec<String>,
    pub failed: Vec<String>,
}

pub fn publish_metadata(ctx: &RunContext, settings: &Settings, artifact: &Artifact) -> PublishMetadata {
    let version = artifact_version(&artifact.file_name());
    let release_type = ctx
        .registry
        .get(&artifact.module)
        .and_then(|module| module.tier)
        .map_or("alpha", |tier| tier.release_type());
    PublishMetadata {
        changelog: String::new(),
        display_name: settings.layout.display_name(&artifact.module, &version),
        game_versions: settings.game_versions.clone(),
        release_type: release_type.to_string(),
    }
}

fn log_violations(ctx: &RunContext, artifact: &Artifact) {
    let members = match ctx.registry.get(&artifact.module) {
        Some(module) => module.members.iter().cloned().collect::<Vec<_>>(),
        None => vec![artifact.module.clone()],
    };
    for member in members {
        let violations = ctx.report.violations_of(&member);
        if violations.is_empty() {
            continue;
        }
        error!("Module {} has {} unresolved violations:", member, violations.len());
        for violation in violations {
            error!("{}", violation);
        }
    }
}

/// Publishes every built artifact with a project id. Without an uploader
/// the run is simulated: metadata is printed and the ledger is untouched.
pub fn publish_all(
    ctx: &RunContext,
    settings: &Settings,
    defs_dir: &Path,
    uploader: Option<&dyn Uploader>,
) -> anyhow::Result<PublishSummary> {
    let mut ledger = PublishLedger::load(defs_dir)?;
    let mut summary = PublishSummary::default();

    for artifact in ctx.artifacts.iter().chain(&ctx.library) {
        let name = artifact.file_name();
        log_violations(ctx, artifact);

        let Some(project_id) = settings.projects.get(&artifact.module) else {
            debug!("{} has no project, not publishing", artifact.module);
            continue;
        };
        if settings.suppressed.contains(&artifact.module) {
            info!("Not publishing suppressed module {}", artifact.module);
            continue;
        }

        let fingerprint = match fingerprint_archive(&artifact.path) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                warn!("Could not fingerprint {}: {:#}", name, e);
                summary.failed.push(name);
                continue;
            }
        };
        if ledger.is_published(&fingerprint) {
            info!("Skipping {} - no changes", name);
            summary.unchanged.push(name);
            continue;
        }

        let metadata = publish_metadata(ctx, settings, artifact);
        info!("Uploading {} (version {})", name, artifact_version(&name));

        let Some(uploader) = uploader else {
            println!("{}", serde_json::to_string_pretty(&metadata)?);
            summary.simulated.push(name);
            continue;
        };
        match uploader.upload(*project_id, &artifact.path, &metadata) {
            Ok(()) => {
                ledger.record(fingerprint, name.clone());
                ledger.save(defs_dir)?;
                info!("Published {}", name);
                summary.published.push(name);
            }
            Err(e) => {
                warn!("Failed to publish {}: {:#}", name, e);
                summary.failed.push(name);
            }
        }
    }
    Ok(summary)
}
