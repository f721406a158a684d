//! Pipeline run progress UI.
//!
//! Renders `PipelineEvent`s in one of three output modes:
//! - `full`: progress bars for the five stages plus the live log
//! - `minimal`: one line per finished stage, warnings, and a summary
//! - `json`: one JSON object per event for machine consumption

use crate::pipeline::PipelineEvent;
use crate::ui::icons::{CHAIN, CHECK, CLOCK, CROSS, MODEL, PROOF, RUNNING, SPARKLE, WARN};
use console::{Term, style};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use zkguard_common::{LogEntry, RunReport, STEP_COUNT, Step, StepStatus};

/// Output mode for the pipeline UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiMode {
    /// Progress bars and the live log
    #[default]
    Full,
    /// Single-line status updates
    Minimal,
    /// JSON-formatted events
    Json,
}

impl std::str::FromStr for UiMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "minimal" => Self::Minimal,
            _ => Self::Full,
        })
    }
}

impl UiMode {
    /// Parse UI mode from string (convenience method).
    pub fn parse(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// Terminal UI for a single pipeline run.
///
/// Events are expected from one task in publication order; the spinner slot
/// only ever holds the bar of the stage currently processing.
pub struct PipelineUI {
    mode: UiMode,
    multi: MultiProgress,
    /// Overall progress across the five stages
    header_bar: ProgressBar,
    /// Spinner for the stage that is processing
    stage_bar: Mutex<Option<ProgressBar>>,
    verbose: bool,
    term: Term,
}

impl PipelineUI {
    pub fn new(mode: UiMode, verbose: bool) -> Self {
        let multi = match mode {
            UiMode::Full => MultiProgress::new(),
            UiMode::Minimal | UiMode::Json => {
                MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
            }
        };

        let header_style = ProgressStyle::default_bar()
            .template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let header_bar = multi.add(ProgressBar::new(STEP_COUNT as u64));
        header_bar.set_style(header_style);
        header_bar.set_prefix("Pipeline");
        header_bar.set_message("Waiting...");

        Self {
            mode,
            multi,
            header_bar,
            stage_bar: Mutex::new(None),
            verbose,
            term: Term::stdout(),
        }
    }

    pub fn mode(&self) -> UiMode {
        self.mode
    }

    /// Handle a PipelineEvent and update the UI accordingly.
    pub fn handle_event(&self, event: &PipelineEvent) {
        match self.mode {
            UiMode::Json => self.handle_json(event),
            UiMode::Minimal => self.handle_minimal(event),
            UiMode::Full => self.handle_full(event),
        }
    }

    fn handle_json(&self, event: &PipelineEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(&self.term, "{}", json);
        }
    }

    fn handle_minimal(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::StepChanged { step, .. } => match step.status {
                StepStatus::Completed => {
                    let _ = writeln!(&self.term, "✓ {}", step_label(step));
                }
                StepStatus::Error => {
                    let _ = writeln!(&self.term, "✗ {}", step_label(step));
                }
                _ => {}
            },
            PipelineEvent::Log { entry, .. } if entry.is_warning() || self.verbose => {
                let _ = writeln!(&self.term, "{}", entry.message);
            }
            PipelineEvent::RunFinished { report } => {
                for line in summary_lines(report) {
                    let _ = writeln!(&self.term, "{}", line);
                }
                let simulated = simulated_stages(report);
                if !simulated.is_empty() {
                    let _ = writeln!(&self.term, "Simulated: {}", simulated.join(", "));
                }
                let done = report
                    .steps
                    .iter()
                    .filter(|s| s.status == StepStatus::Completed)
                    .count();
                let _ = writeln!(
                    &self.term,
                    "Done: {}/{} {}",
                    done,
                    report.steps.len(),
                    if report.all_completed() { "✓" } else { "✗" }
                );
            }
            _ => {}
        }
    }

    fn handle_full(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RunStarted { run_id, .. } => self.on_run_started(&run_id.to_string()),
            PipelineEvent::StepChanged { step, .. } => self.on_step_changed(step),
            PipelineEvent::Log { entry, .. } => self.on_log(entry),
            PipelineEvent::InputsNormalized { inputs, .. } => {
                if self.verbose {
                    self.print_line(format!("  Inputs: {}", style(inputs).cyan()));
                }
            }
            PipelineEvent::PredictionReady { prediction, .. } => {
                self.header_bar
                    .set_message(format!("prediction ${}", prediction.formatted()));
            }
            PipelineEvent::ProofReady { proof, .. } => {
                self.header_bar
                    .set_message(format!("proof {} bytes", proof.size_bytes));
            }
            PipelineEvent::VerificationReady { .. } => {}
            PipelineEvent::RunFinished { report } => self.on_run_finished(report),
        }
    }

    fn on_run_started(&self, run_id: &str) {
        self.header_bar.reset();
        self.header_bar.set_message("Running...");
        self.print_line(format!(
            "{} Pipeline run {}",
            RUNNING,
            style(&run_id[..8.min(run_id.len())]).dim()
        ));
    }

    fn on_step_changed(&self, step: &Step) {
        let mut slot = self
            .stage_bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match step.status {
            StepStatus::Processing => {
                let spinner_style = ProgressStyle::default_spinner()
                    .template("  {prefix:.bold} {spinner} {msg}")
                    .expect("progress bar template is a valid static string");
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(spinner_style);
                bar.set_prefix(step_label(step));
                bar.set_message(style(&step.description).dim().to_string());
                bar.enable_steady_tick(Duration::from_millis(100));
                if let Some(previous) = slot.replace(bar) {
                    previous.finish_and_clear();
                }
            }
            StepStatus::Completed | StepStatus::Error => {
                if let Some(bar) = slot.take() {
                    bar.finish_and_clear();
                }
                self.header_bar.inc(1);
                let (emoji, status) = if step.status == StepStatus::Completed {
                    (CHECK, style("complete").green())
                } else {
                    (CROSS, style("failed").red())
                };
                self.print_line(format!(
                    "  {} {} {}",
                    emoji,
                    style(step_label(step)).bold(),
                    status
                ));
            }
            StepStatus::Pending => {}
        }
    }

    fn on_log(&self, entry: &LogEntry) {
        if entry.is_warning() {
            self.print_line(format!("    {}", style(entry.display_line()).yellow()));
        } else {
            self.print_line(format!("    {}", style(entry.display_line()).dim()));
        }
    }

    fn on_run_finished(&self, report: &RunReport) {
        if let Some(bar) = self
            .stage_bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            bar.finish_and_clear();
        }
        self.header_bar.finish_and_clear();

        self.print_line(String::new());
        self.print_line(format!("{}", style("═".repeat(60)).cyan()));
        if report.all_completed() {
            self.print_line(format!(
                "{} Pipeline {} {}",
                SPARKLE,
                style("COMPLETE").green().bold(),
                SPARKLE
            ));
        } else {
            self.print_line(format!(
                "{} Pipeline {}",
                CROSS,
                style("INCOMPLETE").red().bold()
            ));
        }
        self.print_line(format!("{}", style("═".repeat(60)).cyan()));

        if let Some(prediction) = &report.prediction {
            self.print_line(format!(
                "{}Prediction: {} ({})",
                MODEL,
                style(format!("${}", prediction.formatted())).green().bold(),
                prediction.provenance
            ));
        }
        if let Some(proof) = &report.proof {
            self.print_line(format!(
                "{}Proof: {} ({})",
                PROOF,
                style(proof.display()).dim(),
                proof.provenance
            ));
        }
        if let Some(verification) = &report.verification {
            let tx = verification.tx_hash.as_deref().unwrap_or("-");
            self.print_line(format!(
                "{}Tx: {} ({})",
                CHAIN,
                style(tx).cyan(),
                verification.provenance
            ));
            if let Some(reason) = &verification.error {
                self.print_line(format!("{}{}", WARN, style(reason).yellow()));
            }
        }
        let simulated = simulated_stages(report);
        if !simulated.is_empty() {
            self.print_line(format!(
                "{}Simulated: {}",
                WARN,
                style(simulated.join(", ")).yellow()
            ));
        }
        self.print_line(format!(
            "{}Duration: {}",
            CLOCK,
            style(format_duration(
                report.duration().to_std().unwrap_or_default()
            ))
            .cyan()
        ));
        self.print_line(String::new());
    }

    /// Print above the bars; when they are hidden (no TTY) write to stdout directly.
    fn print_line(&self, line: String) {
        if self.multi.is_hidden() {
            let _ = writeln!(&self.term, "{}", line);
        } else if self.multi.println(&line).is_err() {
            eprintln!("{}", line);
        }
    }
}

/// `[2/5] Model Inference`
fn step_label(step: &Step) -> String {
    format!("[{}/{}] {}", step.id, STEP_COUNT, step.title)
}

/// Plain-text result lines shared by the minimal renderer.
fn summary_lines(report: &RunReport) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(prediction) = &report.prediction {
        lines.push(format!(
            "Prediction: ${} ({})",
            prediction.formatted(),
            prediction.provenance
        ));
    }
    if let Some(proof) = &report.proof {
        lines.push(format!("Proof: {} ({})", proof.display(), proof.provenance));
    }
    if let Some(verification) = &report.verification {
        lines.push(format!(
            "Tx: {} ({})",
            verification.tx_hash.as_deref().unwrap_or("-"),
            verification.provenance
        ));
    }
    lines
}

/// Result kinds that came from a fallback rather than a live backend.
fn simulated_stages(report: &RunReport) -> Vec<&'static str> {
    let mut stages = Vec::new();
    if report.prediction.as_ref().is_some_and(|p| p.provenance.is_mock()) {
        stages.push("prediction");
    }
    if report.proof.as_ref().is_some_and(|p| p.provenance.is_mock()) {
        stages.push("proof");
    }
    if report
        .verification
        .as_ref()
        .is_some_and(|v| v.provenance.is_mock())
    {
        stages.push("transaction");
    }
    stages
}

/// Format a duration for display.
pub(crate) fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", d.as_millis())
    }
}
