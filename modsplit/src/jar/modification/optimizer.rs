//! External lossless image optimizer.

use std::{
    fs,
    io::Write,
    path::PathBuf,
    process::{Command, Stdio},
};

use anyhow::{bail, Context};
use tracing::{debug, warn};

pub const DEFAULT_OPTIMIZER: &str = "optipng";
const DEFAULT_ARGS: [&str; 3] = ["-o7", "--strip=all", "--fix"];

#[derive(Debug, Clone)]
pub struct ImageOptimizer {
    program: PathBuf,
    args: Vec<String>,
}

impl Default for ImageOptimizer {
    fn default() -> Self {
        ImageOptimizer::new(DEFAULT_OPTIMIZER)
    }
}

impl ImageOptimizer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ImageOptimizer {
            program: program.into(),
            args: DEFAULT_ARGS.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_candidate(name: &str) -> bool {
        name.ends_with(".png")
    }

    /// Optimized bytes for `name`, if the optimizer produced a strictly
    /// smaller file. Failures are logged and yield `None`.
    pub fn optimize(&self, name: &str, data: &[u8]) -> Option<Vec<u8>> {
        match self.try_optimize(data) {
            Ok(optimized) if optimized.len() < data.len() => {
                debug!("{}: {} -> {} bytes", name, data.len(), optimized.len());
                Some(optimized)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Could not optimize {}: {:#}", name, e);
                None
            }
        }
    }

    /// Runs the optimizer in place on a temporary copy of `data`.
    pub fn try_optimize(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut file = tempfile::Builder::new()
            .prefix("modsplit")
            .suffix(".png")
            .tempfile()
            .context("failed to create a temporary image")?;
        file.write_all(data)?;
        file.flush()?;

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("failed to run {}", self.program.display()))?;
        if !status.success() {
            bail!("{} exited with {}", self.program.display(), status);
        }

        Ok(fs::read(file.path())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGE: &[u8] = b"\x89PNG\r\n\x1a\nnot really an image";

    #[test]
    fn only_png_entries_are_candidates() {
        assert!(ImageOptimizer::is_candidate("assets/example/textures/block.png"));
        assert!(!ImageOptimizer::is_candidate("assets/example/lang/en_us.lang"));
    }

    #[test]
    fn missing_binary_keeps_original() {
        let optimizer = ImageOptimizer::new("/nonexistent/optimizer-binary");
        assert!(optimizer.try_optimize(IMAGE).is_err());
        assert_eq!(optimizer.optimize("block.png", IMAGE), None);
    }

    #[test]
    fn failing_optimizer_keeps_original() {
        let optimizer = ImageOptimizer::new("false").with_args(Vec::<String>::new());
        assert_eq!(optimizer.optimize("block.png", IMAGE), None);
    }

    #[test]
    fn unchanged_output_is_not_a_replacement() {
        let optimizer = ImageOptimizer::new("true").with_args(Vec::<String>::new());
        assert_eq!(optimizer.try_optimize(IMAGE).unwrap(), IMAGE);
        assert_eq!(optimizer.optimize("block.png", IMAGE), None);
    }

    #[test]
    fn smaller_output_replaces() {
        let optimizer = ImageOptimizer::new("truncate").with_args(["-s", "4"]);
        assert_eq!(optimizer.optimize("block.png", IMAGE).as_deref(), Some(&IMAGE[..4]));
    }
}
