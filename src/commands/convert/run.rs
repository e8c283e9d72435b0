use anyhow::{Result, bail};
use chrono::{Local, Utc};
use tracing::{error, info, warn};

use crate::cli::{ConvertArgs, FlowKind};
use crate::commands::publish::{GitPublisher, default_commit_message, publish_with};
use crate::model::{ConvertRunManifest, RunReport};
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};

use super::flow::FlowConfig;
use super::pipeline::{LogProgress, PipelineConfig, PipelineOrchestrator};
use super::workbook::{CalamineSheetReader, SheetReader};

pub fn run(args: ConvertArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("convert-{}", utc_compact_string(started_ts));

    let config = PipelineConfig {
        source_dir: args.source_dir.clone(),
        output_root: args.output_root.clone(),
        header_scan_rows: args.header_scan_rows,
        extension: args.extension.clone(),
    };

    info!(run_id = %run_id, source = %config.source_dir.display(), "starting convert");

    let mut flows = Vec::<FlowKind>::new();
    for flow in &args.flows {
        if !flows.contains(flow) {
            flows.push(*flow);
        }
    }

    let orchestrator = PipelineOrchestrator::new(config, CalamineSheetReader)?;
    let reports = run_flows(&orchestrator, &flows);

    let succeeded = reports
        .iter()
        .filter(|report| report.success)
        .map(|report| report.flow.clone())
        .collect::<Vec<String>>();
    let success = !succeeded.is_empty();

    let published = if args.publish && success {
        let published_flows = flows
            .iter()
            .copied()
            .filter(|flow| succeeded.iter().any(|name| name == flow.as_str()))
            .collect::<Vec<FlowKind>>();
        let paths = published_flows
            .iter()
            .map(|flow| FlowConfig::for_kind(*flow).output_dir(&orchestrator.config().output_root))
            .collect();
        let message = args
            .commit_message
            .clone()
            .unwrap_or_else(|| default_commit_message(&published_flows, Local::now()));
        let publisher = GitPublisher::new(&args.git, paths);
        match publish_with(&publisher, &message) {
            Ok(_) => Some(true),
            Err(err) => {
                error!(error = %format!("{err:#}"), "publish failed");
                Some(false)
            }
        }
    } else {
        if args.publish {
            warn!("nothing converted; skipping publish");
        }
        None
    };

    let manifest = ConvertRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        started_at,
        updated_at: now_utc_string(),
        source_directory: args.source_dir.display().to_string(),
        output_root: args.output_root.display().to_string(),
        success,
        published,
        flows: reports,
    };

    let manifest_path = args
        .manifest_dir
        .join(format!("convert_run_{}.json", utc_compact_string(started_ts)));
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote convert run manifest");

    if !success {
        bail!("no files converted in run {run_id}");
    }
    if published == Some(false) {
        bail!("conversion succeeded but publishing failed in run {run_id}");
    }

    Ok(())
}

/// Runs each flow in turn; a configuration failure in one flow is reported
/// and the next flow still runs.
pub fn run_flows<R: SheetReader>(
    orchestrator: &PipelineOrchestrator<R>,
    flows: &[FlowKind],
) -> Vec<RunReport> {
    let mut observer = LogProgress;
    flows
        .iter()
        .map(|kind| {
            let flow = FlowConfig::for_kind(*kind);
            match orchestrator.run(&flow, &mut observer) {
                Ok(report) => report,
                Err(err) => {
                    let detail = format!("{err:#}");
                    error!(flow = flow.name(), error = %detail, "flow could not start");
                    RunReport::configuration_failure(
                        flow.name(),
                        flow.output_dir(&orchestrator.config().output_root)
                            .display()
                            .to_string(),
                        detail,
                    )
                }
            }
        })
        .collect()
}
