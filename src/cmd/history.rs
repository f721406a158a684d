//! Recorded run listing: `zkguard history`.

use anyhow::Result;
use std::path::Path;

use super::super::HistoryCommands;

pub fn cmd_history(project_dir: &Path, limit: usize, command: Option<HistoryCommands>) -> Result<()> {
    use console::style;
    use zkguard::history::RunRecorder;
    use zkguard_common::StepStatus;

    let recorder = RunRecorder::new(&project_dir.join(".zkguard").join("runs"));

    match command {
        None => {
            let runs = recorder.list_runs()?;
            if runs.is_empty() {
                println!("No recorded runs. Run 'zkguard run' first.");
                return Ok(());
            }

            for path in runs.iter().take(limit) {
                match recorder.load_run(path) {
                    Ok(report) => {
                        let prediction = report
                            .prediction
                            .as_ref()
                            .map(|p| format!("${} ({})", p.formatted(), p.provenance))
                            .unwrap_or_else(|| "-".to_string());
                        let tx = report
                            .verification
                            .as_ref()
                            .map(|v| v.provenance.to_string())
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "{}  {}  {}  tx: {}",
                            style(&report.run_id.to_string()[..8]).cyan(),
                            report.started_at.format("%Y-%m-%d %H:%M:%S"),
                            prediction,
                            tx
                        );
                    }
                    Err(e) => {
                        println!("{}  {}", style("unreadable").red(), path.display());
                        tracing::debug!(error = %e, path = %path.display(), "Skipping run report");
                    }
                }
            }

            if runs.len() > limit {
                println!("... {} more (use --limit)", runs.len() - limit);
            }
        }
        Some(HistoryCommands::Show { run_id }) => {
            let runs = recorder.list_runs()?;
            let report = runs
                .iter()
                .filter_map(|p| recorder.load_run(p).ok())
                .find(|r| r.run_id.to_string().starts_with(&run_id));

            let Some(report) = report else {
                anyhow::bail!("No recorded run matches '{}'", run_id);
            };

            println!();
            println!("Run {}", report.run_id);
            println!("Started:  {}", report.started_at.to_rfc3339());
            println!("Inputs:   {}", report.inputs);
            println!();
            for step in &report.steps {
                let mark = match step.status {
                    StepStatus::Completed => style("✓").green(),
                    StepStatus::Error => style("✗").red(),
                    _ => style("·").dim(),
                };
                println!("  {} {} ({})", mark, step.title, step.status);
            }
            println!();
            for entry in &report.logs {
                println!("  {}", entry.display_line());
            }
            println!();
            if let Some(p) = &report.prediction {
                println!("Prediction: ${} ({})", p.formatted(), p.provenance);
            }
            if let Some(proof) = &report.proof {
                println!("Proof:      {} ({})", proof.display(), proof.provenance);
            }
            if let Some(v) = &report.verification {
                println!(
                    "Tx:         {} ({})",
                    v.tx_hash.as_deref().unwrap_or("-"),
                    v.provenance
                );
            }
            println!();
        }
    }

    Ok(())
}
