use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::InventoryArgs;
use crate::commands::convert::{FileFilter, FlowConfig};
use crate::model::{SourceFileEntry, SourceInventoryManifest};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let flow = FlowConfig::for_kind(args.flow);
    let manifest = build_manifest(&args.source_dir, &args.extension, &flow)?;

    if args.dry_run {
        for entry in &manifest.files {
            info!(file = %entry.filename, bytes = entry.bytes, sha256 = %entry.sha256, "candidate");
        }
        info!(
            flow = %manifest.flow,
            file_count = manifest.file_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args.manifest_path.unwrap_or_else(|| {
        args.manifest_dir
            .join(format!("source_inventory_{}.json", flow.output_subdir))
    });

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(file_count = manifest.file_count, "inventory completed");

    Ok(())
}

pub fn build_manifest(
    source_dir: &Path,
    extension: &str,
    flow: &FlowConfig,
) -> Result<SourceInventoryManifest> {
    let paths = discover_candidates(source_dir, extension, flow.filter)?;

    if paths.is_empty() {
        bail!(
            "no .{extension} files for flow '{}' found in {}",
            flow.name(),
            source_dir.display()
        );
    }

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let filename = file_name(&path)?;
        let bytes = fs::metadata(&path)
            .with_context(|| format!("failed to inspect {}", path.display()))?
            .len();
        let sha256 = sha256_file(&path)?;

        files.push(SourceFileEntry {
            filename,
            bytes,
            sha256,
        });
    }

    Ok(SourceInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        flow: flow.name().to_string(),
        source_directory: source_dir.display().to_string(),
        file_count: files.len(),
        files,
    })
}

/// Spreadsheets in `source_dir` with the given extension, minus editor lock
/// files and files rejected by the flow's name filter, sorted by name.
pub fn discover_candidates(
    source_dir: &Path,
    extension: &str,
    filter: FileFilter,
) -> Result<Vec<PathBuf>> {
    if !source_dir.is_dir() {
        bail!("source directory does not exist: {}", source_dir.display());
    }

    let mut candidates = Vec::new();

    let entries = fs::read_dir(source_dir)
        .with_context(|| format!("failed to read {}", source_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", source_dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let matches_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if !matches_extension {
            continue;
        }

        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if is_lock_file(name) || !filter.accepts(name) {
            continue;
        }

        candidates.push(path);
    }

    candidates.sort();
    Ok(candidates)
}

pub fn is_lock_file(name: &str) -> bool {
    name.starts_with("~$") || name.starts_with(".~lock.")
}

pub fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))
}
