use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use tracing::info;

use crate::cli::{FlowKind, GitArgs, PublishArgs};
use crate::commands::convert::FlowConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    NothingToPublish,
    Published,
}

/// Narrow seam to whatever ships the output directory.
pub trait Publisher {
    fn has_pending_changes(&self) -> Result<bool>;
    fn publish(&self, message: &str) -> Result<PublishOutcome>;
}

#[derive(Debug, Clone)]
pub struct GitPublisher {
    repo_path: PathBuf,
    paths: Vec<PathBuf>,
    remote: String,
    branch: String,
}

impl GitPublisher {
    pub fn new(git: &GitArgs, paths: Vec<PathBuf>) -> Self {
        Self {
            repo_path: git.repo_path.clone(),
            paths,
            remote: git.remote.clone(),
            branch: git.branch.clone(),
        }
    }

    fn pathspec_args(&self, leading: &[&str]) -> Vec<String> {
        let mut args = leading
            .iter()
            .map(|arg| (*arg).to_string())
            .collect::<Vec<String>>();
        args.push("--".to_string());
        args.extend(self.paths.iter().map(|path| path.display().to_string()));
        args
    }

    fn git(&self, args: &[String]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| {
                format!("failed to execute git {} in {}", args.join(" "), self.repo_path.display())
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            bail!("git {} returned non-zero exit status: {}", args.join(" "), detail);
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Publisher for GitPublisher {
    fn has_pending_changes(&self) -> Result<bool> {
        let status = self.git(&self.pathspec_args(&["status", "--porcelain"]))?;
        Ok(!status.is_empty())
    }

    fn publish(&self, message: &str) -> Result<PublishOutcome> {
        if !self.has_pending_changes()? {
            return Ok(PublishOutcome::NothingToPublish);
        }

        self.git(&self.pathspec_args(&["add"]))?;
        let staged = self.git(&self.pathspec_args(&["diff", "--cached", "--name-only"]))?;
        if staged.is_empty() {
            return Ok(PublishOutcome::NothingToPublish);
        }

        info!(files = staged.lines().count(), "committing output changes");
        self.git(&["commit".to_string(), "-m".to_string(), message.to_string()])?;
        self.git(&["push".to_string(), self.remote.clone(), self.branch.clone()])?;

        Ok(PublishOutcome::Published)
    }
}

pub fn default_commit_message(flows: &[FlowKind], now: DateTime<Local>) -> String {
    let names = flows
        .iter()
        .map(|flow| FlowConfig::for_kind(*flow).output_subdir)
        .collect::<Vec<&str>>()
        .join(", ");
    format!("Update {names} data {}", now.format("%Y-%m-%d %H:%M"))
}

pub fn flow_output_dirs(output_root: &Path, flows: &[FlowKind]) -> Vec<PathBuf> {
    flows
        .iter()
        .map(|flow| FlowConfig::for_kind(*flow).output_dir(output_root))
        .collect()
}

pub fn publish_with(publisher: &dyn Publisher, message: &str) -> Result<PublishOutcome> {
    let outcome = publisher.publish(message)?;
    match outcome {
        PublishOutcome::NothingToPublish => info!("no output changes to publish"),
        PublishOutcome::Published => info!(message = %message, "published output changes"),
    }
    Ok(outcome)
}

pub fn run(args: PublishArgs) -> Result<()> {
    let paths = flow_output_dirs(&args.output_root, &args.flows);
    for path in &paths {
        if !path.is_dir() {
            bail!("output directory does not exist: {}", path.display());
        }
    }

    let message = args
        .message
        .clone()
        .unwrap_or_else(|| default_commit_message(&args.flows, Local::now()));
    let publisher = GitPublisher::new(&args.git, paths);
    publish_with(&publisher, &message)?;

    Ok(())
}
