use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::{FlowKind, StatusArgs};
use crate::commands::convert::{FlowConfig, SUMMARY_FILE_NAME, SummaryIndex};
use crate::model::ConvertRunSnapshot;

const FLOWS: [FlowKind; 3] = [FlowKind::Imports, FlowKind::Exports, FlowKind::EndUse];

pub fn run(args: StatusArgs) -> Result<()> {
    info!(output_root = %args.output_root.display(), "status requested");

    match latest_run_manifest(&args.manifest_dir)? {
        Some(path) => {
            let raw =
                fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
            let snapshot: ConvertRunSnapshot = serde_json::from_slice(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?;

            info!(
                run_id = %snapshot.run_id.unwrap_or_default(),
                updated_at = %snapshot.updated_at.unwrap_or_default(),
                success = snapshot.success.unwrap_or(false),
                published = ?snapshot.published,
                "loaded latest convert run manifest"
            );
            for flow in snapshot.flows {
                info!(
                    flow = %flow.flow.unwrap_or_default(),
                    success = flow.success.unwrap_or(false),
                    processed = flow.processed_count.unwrap_or_default(),
                    candidates = flow.candidate_count.unwrap_or_default(),
                    configuration_error = %flow.configuration_error.unwrap_or_default(),
                    summary_error = %flow.summary_error.unwrap_or_default(),
                    "flow result"
                );
            }
        }
        None => warn!(dir = %args.manifest_dir.display(), "no convert run manifest found"),
    }

    for kind in FLOWS {
        let flow = FlowConfig::for_kind(kind);
        let summary_path = flow.output_dir(&args.output_root).join(SUMMARY_FILE_NAME);
        if !summary_path.exists() {
            warn!(flow = flow.name(), path = %summary_path.display(), "summary index missing");
            continue;
        }

        let index = SummaryIndex::load(&summary_path)?;
        info!(
            flow = flow.name(),
            years = index.entries().len(),
            "loaded summary index"
        );
        for entry in index.entries() {
            info!(
                flow = flow.name(),
                year = %entry.year,
                total = entry.total,
                records = entry.record_count.unwrap_or_default(),
                file = %entry.file,
                "summary entry"
            );
        }
    }

    Ok(())
}

/// Run manifests carry a compact UTC stamp in their name, so the
/// lexicographically last one is the newest.
fn latest_run_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    if !manifest_dir.is_dir() {
        return Ok(None);
    }

    let entries = fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?;

    let mut latest: Option<PathBuf> = None;
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to read entry in {}", manifest_dir.display()))?;
        let path = entry.path();
        let is_run_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("convert_run_") && name.ends_with(".json"))
            .unwrap_or(false);
        if is_run_manifest && latest.as_ref().is_none_or(|current| path > *current) {
            latest = Some(path);
        }
    }

    Ok(latest)
}
