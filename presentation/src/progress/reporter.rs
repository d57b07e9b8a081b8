//! Progress reporting for turn execution

use aion_application::ports::turn_progress::TurnProgressNotifier;
use aion_domain::{ToolCallRequest, ToolCallResult, TurnResult};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Spinner on stderr while the model thinks, one bar per dispatch round.
pub struct TurnProgressReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl TurnProgressReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn round_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    /// Finish the current bar (if any) and install `next`.
    fn replace(&self, next: Option<ProgressBar>) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(previous) = slot.take() {
                previous.finish_and_clear();
            }
            *slot = next;
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(slot) = self.bar.lock()
            && let Some(bar) = slot.as_ref()
        {
            f(bar);
        }
    }
}

impl Default for TurnProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnProgressNotifier for TurnProgressReporter {
    fn on_model_request(&self, round: usize, tools_offered: usize) {
        let bar = ProgressBar::new_spinner();
        bar.set_style(Self::spinner_style());
        bar.set_prefix(format!("Round {}", round + 1));
        bar.set_message(format!("Waiting for model ({} tools offered)", tools_offered));
        bar.enable_steady_tick(Duration::from_millis(100));
        self.replace(Some(bar));
    }

    fn on_round_start(&self, round: usize, calls: usize) {
        let bar = ProgressBar::new(calls as u64);
        bar.set_style(Self::round_style());
        bar.set_prefix(format!("Round {}", round + 1));
        bar.set_message("Running tools...");
        bar.enable_steady_tick(Duration::from_millis(100));
        self.replace(Some(bar));
    }

    fn on_tool_result(&self, result: &ToolCallResult) {
        self.with_bar(|bar| {
            let status = if result.is_success() {
                format!("{} {}", "v".green(), result.tool_name)
            } else {
                format!("{} {}", "x".red(), result.tool_name)
            };
            bar.set_message(status);
            bar.inc(1);
        });
    }

    fn on_turn_complete(&self, _result: &TurnResult) {
        self.replace(None);
    }
}

/// Plain line-per-event progress on stderr (no terminal control codes)
pub struct SimpleTurnProgress;

impl TurnProgressNotifier for SimpleTurnProgress {
    fn on_round_start(&self, round: usize, calls: usize) {
        eprintln!(
            "{} {} ({} tool calls)",
            "->".cyan(),
            format!("Round {}", round + 1).bold(),
            calls
        );
    }

    fn on_tool_call(&self, call: &ToolCallRequest) {
        eprintln!("   {} {}", "call".dimmed(), call.tool_name);
    }

    fn on_tool_result(&self, result: &ToolCallResult) {
        if result.is_success() {
            eprintln!("  {} {} ({}ms)", "v".green(), result.tool_name, result.latency_ms);
        } else {
            eprintln!("  {} {} ({}ms, failed)", "x".red(), result.tool_name, result.latency_ms);
        }
    }
}
