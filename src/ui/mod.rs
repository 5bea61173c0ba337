//! Progress reporting for the setup pipeline.
//!
//! [`Setup`](crate::Setup) only talks to the [`Ui`] trait. `setup --tui` gets
//! the ratatui [`UiApp`], every other command the line-oriented
//! [`ConsoleUi`], and tests [`SilentUi`].

mod components;
mod console;

use anyhow::Result;
use crossterm::event::{self, Event};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::time::Duration;

use components::Dashboard;

pub use console::ConsoleUi;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Checking,
    Downloading,
    Verifying,
    Extracting,
    Locating,
    Complete,
}

impl Phase {
    /// Steps of a fresh install, in order. `Complete` is the end state.
    pub const PIPELINE: &'static [Phase] = &[
        Phase::Checking,
        Phase::Downloading,
        Phase::Verifying,
        Phase::Extracting,
        Phase::Locating,
    ];
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::Checking => "Checking installation",
            Phase::Downloading => "Downloading runtime",
            Phase::Verifying => "Verifying checksum",
            Phase::Extracting => "Extracting archive",
            Phase::Locating => "Locating executable",
            Phase::Complete => "Complete",
        })
    }
}

/// Progress information for the current operation
#[derive(Debug, Clone, Default)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
    pub label: String,
}

impl Progress {
    pub fn new(current: u64, total: u64, label: impl Into<String>) -> Self {
        Self {
            current,
            total,
            label: label.into(),
        }
    }

    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f64 / self.total as f64
        }
    }
}

pub trait Ui {
    fn set_phase(&mut self, phase: Phase);
    fn set_info(&mut self, info: impl Into<String>);
    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>);
    fn clear_progress(&mut self);
    fn log(&mut self, message: impl Into<String>);
}

/// Full-screen dashboard used by `setup --tui`.
/// The terminal is restored on drop, including on error paths.
pub struct UiApp {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    dashboard: Dashboard,
}

impl UiApp {
    pub fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        Ok(Self {
            terminal,
            dashboard: Dashboard::new(),
        })
    }

    fn redraw(&mut self) {
        let dashboard = &self.dashboard;
        if let Err(e) = self.terminal.draw(|frame| dashboard.render(frame)) {
            tracing::debug!("dashboard redraw failed: {e}");
        }
    }

    /// Show the final state and wait for a key before leaving the alternate screen.
    pub fn finish(mut self, summary: &str) -> Result<()> {
        self.dashboard.set_phase(Phase::Complete);
        self.dashboard.set_progress(None);
        self.dashboard.push_log(summary);
        self.dashboard.push_log("Press any key to exit...");
        self.redraw();

        loop {
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(_) = event::read()? {
                    return Ok(());
                }
            }
        }
    }
}

impl Ui for UiApp {
    fn set_phase(&mut self, phase: Phase) {
        self.dashboard.set_phase(phase);
        self.redraw();
    }

    fn set_info(&mut self, info: impl Into<String>) {
        self.dashboard.set_target(info);
        self.redraw();
    }

    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>) {
        self.dashboard
            .set_progress(Some(Progress::new(current, total, label)));
        self.redraw();
    }

    fn clear_progress(&mut self) {
        self.dashboard.set_progress(None);
        self.redraw();
    }

    fn log(&mut self, message: impl Into<String>) {
        self.dashboard.push_log(message);
        self.redraw();
    }
}

impl Drop for UiApp {
    fn drop(&mut self) {
        terminal::disable_raw_mode().ok();
        self.terminal
            .backend_mut()
            .execute(LeaveAlternateScreen)
            .ok();
        self.terminal.show_cursor().ok();
    }
}

#[derive(Default)]
pub struct SilentUi;

impl SilentUi {
    pub fn new() -> Self {
        Self
    }
}

impl Ui for SilentUi {
    fn set_phase(&mut self, _phase: Phase) {}
    fn set_info(&mut self, _info: impl Into<String>) {}
    fn set_progress(&mut self, _current: u64, _total: u64, _label: impl Into<String>) {}
    fn clear_progress(&mut self) {}
    fn log(&mut self, _message: impl Into<String>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_ratio_handles_unknown_total() {
        assert_eq!(Progress::new(10, 0, "x").ratio(), 0.0);
        assert!((Progress::new(1, 4, "x").ratio() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn pipeline_excludes_end_state() {
        assert_eq!(Phase::PIPELINE.first(), Some(&Phase::Checking));
        assert!(!Phase::PIPELINE.contains(&Phase::Complete));
    }

    #[test]
    fn phases_have_labels() {
        assert_eq!(Phase::Verifying.to_string(), "Verifying checksum");
        assert_eq!(Phase::Complete.to_string(), "Complete");
    }
}
