//! Single pipeline run: `zkguard run`.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use super::super::{Cli, RunArgs};

pub async fn cmd_run(cli: &Cli, project_dir: &Path, args: &RunArgs) -> Result<()> {
    use console::style;
    use zkguard::config::{CliOverrides, ZkGuardConfig};
    use zkguard::history::RunRecorder;
    use zkguard::pipeline::{OrchestratorBuilder, RunOutcome};
    use zkguard::ui::{PipelineUI, UiMode};
    use zkguard_common::RawInputs;

    let overrides = CliOverrides {
        pacing_ms: args.pacing_ms,
        network: args.network.clone(),
        inference_endpoint: args.inference_url.clone(),
    };
    let config = ZkGuardConfig::load(project_dir, &overrides)?;
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    let defaults = RawInputs::default();
    let inputs = RawInputs {
        btc_vol: args.btc_vol.clone().unwrap_or(defaults.btc_vol),
        eth_gas: args.eth_gas.clone().unwrap_or(defaults.eth_gas),
        volume: args.volume.clone().unwrap_or(defaults.volume),
    };

    let orchestrator = Arc::new(OrchestratorBuilder::from_config(&config).inputs(inputs).build());
    let ui = PipelineUI::new(UiMode::parse(&args.ui), cli.verbose);
    let mut events = orchestrator.subscribe();

    if args.warm_up {
        orchestrator.warm_up().await;
    }

    let mut runner = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run().await })
    };

    let mut closed = false;
    let outcome = loop {
        tokio::select! {
            event = events.recv(), if !closed => match event {
                Ok(event) => ui.handle_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "UI fell behind, some pipeline events were skipped");
                }
                Err(RecvError::Closed) => closed = true,
            },
            joined = &mut runner => break joined.context("Pipeline task failed")?,
        }
    };

    // Events published just before the task finished are still buffered.
    loop {
        match events.try_recv() {
            Ok(event) => ui.handle_event(&event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }

    let report = match outcome {
        RunOutcome::Completed(report) => report,
        RunOutcome::Rejected => anyhow::bail!("A pipeline run is already in progress"),
    };

    if args.no_record {
        return Ok(());
    }

    let recorder = RunRecorder::new(&config.runs_dir());
    match recorder.record(&report) {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "Run report saved");
            if ui.mode() != UiMode::Json {
                println!("Run saved to {}", style(path.display()).dim());
            }
        }
        Err(e) => {
            eprintln!(
                "{} Failed to save run report: {:#}",
                style("warning:").yellow().bold(),
                e
            );
        }
    }

    Ok(())
}
