//! Setup dashboard: the pipeline as a checklist, a byte gauge for the
//! current download or extraction, and the tail of the activity log.

use std::collections::VecDeque;

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use ratatui::Frame;

use super::{Phase, Progress};

const MAX_LOG_ENTRIES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum StepState {
    Done,
    Active,
    Pending,
}

/// Where each pipeline step stands while `current` is running.
pub(crate) fn step_states(current: Phase) -> impl Iterator<Item = (Phase, StepState)> {
    let reached = Phase::PIPELINE.iter().position(|p| *p == current);
    Phase::PIPELINE.iter().enumerate().map(move |(i, phase)| {
        let state = match reached {
            // Complete is not a step; everything before it is done
            None => StepState::Done,
            Some(r) if i < r => StepState::Done,
            Some(r) if i == r => StepState::Active,
            Some(_) => StepState::Pending,
        };
        (*phase, state)
    })
}

pub struct Dashboard {
    phase: Phase,
    target: String,
    progress: Option<Progress>,
    log: VecDeque<String>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            phase: Phase::Checking,
            target: String::new(),
            progress: None,
            log: VecDeque::new(),
        }
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn set_target(&mut self, target: impl Into<String>) {
        self.target = target.into();
    }

    pub fn set_progress(&mut self, progress: Option<Progress>) {
        self.progress = progress;
    }

    pub fn push_log(&mut self, message: impl Into<String>) {
        if self.log.len() == MAX_LOG_ENTRIES {
            self.log.pop_front();
        }
        self.log.push_back(message.into());
    }

    pub fn render(&self, frame: &mut Frame) {
        let [steps, gauge, log] = Layout::vertical([
            Constraint::Length(Phase::PIPELINE.len() as u16 + 3),
            Constraint::Length(3),
            Constraint::Min(3),
        ])
        .areas(frame.area());

        self.render_steps(frame, steps);
        self.render_gauge(frame, gauge);
        self.render_log(frame, log);
    }

    fn render_steps(&self, frame: &mut Frame, area: Rect) {
        let mut lines: Vec<Line> = step_states(self.phase)
            .map(|(phase, state)| {
                let (mark, style) = match state {
                    StepState::Done => ("✓", Style::default().fg(Color::Green)),
                    StepState::Active => (
                        "›",
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ),
                    StepState::Pending => ("·", Style::default().fg(Color::DarkGray)),
                };
                Line::from(Span::styled(format!(" {mark} {phase}"), style))
            })
            .collect();
        if self.phase == Phase::Complete {
            lines.push(Line::styled(
                " Bun is ready",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ));
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", self.target))
            .border_style(Style::default().fg(Color::Blue));
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_gauge(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL);
        let Some(progress) = &self.progress else {
            frame.render_widget(block, area);
            return;
        };

        let label = if progress.total > 0 {
            format!("{} ({:.0}%)", progress.label, progress.ratio() * 100.0)
        } else {
            progress.label.clone()
        };
        let gauge = Gauge::default()
            .block(block)
            .gauge_style(Style::default().fg(Color::Cyan).bg(Color::DarkGray))
            .ratio(progress.ratio().min(1.0))
            .label(label);
        frame.render_widget(gauge, area);
    }

    fn render_log(&self, frame: &mut Frame, area: Rect) {
        let visible = area.height.saturating_sub(2) as usize;
        let skip = self.log.len().saturating_sub(visible);
        let lines: Vec<Line> = self
            .log
            .iter()
            .skip(skip)
            .map(|entry| Line::raw(format!(" {entry}")))
            .collect();

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Activity ")
            .border_style(Style::default().fg(Color::Blue));
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn screen(dashboard: &Dashboard) -> String {
        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
        terminal.draw(|frame| dashboard.render(frame)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn steps_before_current_phase_are_done() {
        let states: Vec<_> = step_states(Phase::Verifying).map(|(_, s)| s).collect();
        assert_eq!(
            states,
            [
                StepState::Done,
                StepState::Done,
                StepState::Active,
                StepState::Pending,
                StepState::Pending,
            ]
        );
        assert!(step_states(Phase::Complete).all(|(_, s)| s == StepState::Done));
    }

    #[test]
    fn log_keeps_most_recent_entries() {
        let mut dashboard = Dashboard::new();
        for i in 0..(MAX_LOG_ENTRIES + 25) {
            dashboard.push_log(format!("line {i}"));
        }
        assert_eq!(dashboard.log.len(), MAX_LOG_ENTRIES);
        assert_eq!(dashboard.log.front().map(String::as_str), Some("line 25"));
    }

    #[test]
    fn renders_target_progress_and_latest_log_line() {
        let mut dashboard = Dashboard::new();
        dashboard.set_target("bun 1.1.0 (linux-x64)");
        dashboard.set_phase(Phase::Downloading);
        dashboard.set_progress(Some(Progress::new(50, 100, "bun-linux-x64.zip")));
        dashboard.push_log("Downloading bun-linux-x64.zip");

        let text = screen(&dashboard);
        assert!(text.contains("bun 1.1.0 (linux-x64)"));
        assert!(text.contains("Downloading runtime"));
        assert!(text.contains("(50%)"));
        assert!(text.contains("Downloading bun-linux-x64.zip"));
        assert!(!text.contains("Bun is ready"));
    }
}
