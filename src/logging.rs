use std::fs::OpenOptions;

use log::{LevelFilter, info, warn};
use simplelog::WriteLogger;

use crate::config::LoggingConfig;
use crate::error::Result;
use crate::plan::ExecPlan;

/// Longest command text written to one log record.
const MAX_LOGGED_CHARS: usize = 200;

/// Install a file logger as configured.
/// Best-effort: failures are silently ignored (logging must never block parsing).
pub fn init(config: &LoggingConfig) {
    let level = config.level_filter();
    if level == LevelFilter::Off {
        return;
    }
    let Some(path) = config.log_path() else {
        return;
    };
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    let _ = WriteLogger::init(level, simplelog::Config::default(), file);
}

/// Log one parsed line and the outcome of planning it.
pub fn record_plan(line: &str, result: &Result<ExecPlan>) {
    let line = one_line(line);
    match result {
        Ok(plan) => info!(
            "{line}\t{} program(s)\t{}",
            plan.command_count(),
            if plan.wait_for_completion {
                "wait"
            } else {
                "background"
            }
        ),
        Err(e) => warn!("{line}\t{e}"),
    }
}

/// Truncated single-line form of a command for the log.
fn one_line(line: &str) -> String {
    line.chars()
        .take(MAX_LOGGED_CHARS)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_lines_are_truncated() {
        let line = "x".repeat(500);
        assert_eq!(one_line(&line).chars().count(), MAX_LOGGED_CHARS);
    }

    #[test]
    fn newlines_are_flattened() {
        assert_eq!(one_line("a\nb"), "a b");
    }
}
