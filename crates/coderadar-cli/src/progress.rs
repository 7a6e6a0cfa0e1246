//! Progress feedback for CLI commands, wiring `coderadar_engine::ProgressSink`
//! to `indicatif` spinners/bars. All progress output is suppressed when
//! `--quiet` is set.

use std::sync::Mutex;
use std::time::Duration;

use coderadar_engine::{Phase, ProgressSink, StoringProgress};
use indicatif::{ProgressBar, ProgressStyle};

pub fn spinner(message: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .expect("invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

pub fn progress_bar(total: u64, message: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
            .expect("invalid progress bar template")
            .progress_chars("█▓░"),
    );
    pb.set_message(message.to_string());
    Some(pb)
}

pub fn finish_spinner(pb: Option<ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.set_style(ProgressStyle::default_spinner().template("{prefix:.green} {msg}").expect("invalid finish template"));
        pb.set_prefix("\u{2713}");
        pb.finish_with_message(message.to_string());
    }
}

pub fn finish_spinner_warn(pb: Option<ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.set_style(ProgressStyle::default_spinner().template("{prefix:.yellow} {msg}").expect("invalid warn template"));
        pb.set_prefix("!");
        pb.finish_with_message(message.to_string());
    }
}

/// One `ProgressSink` per `index`/`update` call, driving a single spinner
/// that's replaced at each phase transition and upgraded to a bar once the
/// storing phase knows its total.
pub struct CliProgress {
    quiet: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgress {
    pub fn new(quiet: bool) -> Self {
        Self { quiet, bar: Mutex::new(None) }
    }
}

impl ProgressSink for CliProgress {
    fn phase(&self, phase: Phase) {
        let mut guard = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = match phase {
            Phase::Scanning => spinner("scanning repository...", self.quiet),
            Phase::Embedding => spinner("embedding components...", self.quiet),
            Phase::Storing => None,
            Phase::Complete => None,
        };
    }

    fn storing(&self, progress: StoringProgress) {
        let mut guard = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            *guard = progress_bar(progress.total_documents as u64, "storing documents...", self.quiet);
        }
        if let Some(pb) = guard.as_ref() {
            pb.set_position(progress.documents_indexed as u64);
        }
    }
}
