use indicatif::{ProgressBar, ProgressStyle};

use super::{Phase, Ui};

/// Line-oriented reporter: phases and log lines go through `tracing`,
/// byte/entry progress is drawn with an indicatif bar on stderr.
#[derive(Default)]
pub struct ConsoleUi {
    bar: Option<ProgressBar>,
}

impl ConsoleUi {
    pub fn new() -> Self {
        Self::default()
    }

    fn bar(&mut self, total: u64) -> &ProgressBar {
        self.bar.get_or_insert_with(|| {
            let pb = if total > 0 {
                ProgressBar::new(total)
            } else {
                ProgressBar::new_spinner()
            };
            let template = "{msg} [{bar:40.cyan/blue}] {percent}% ({eta})";
            if let Ok(style) = ProgressStyle::default_bar().template(template) {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb
        })
    }
}

impl Ui for ConsoleUi {
    fn set_phase(&mut self, phase: Phase) {
        tracing::info!("{phase}");
    }

    fn set_info(&mut self, info: impl Into<String>) {
        tracing::info!("{}", info.into());
    }

    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>) {
        let pb = self.bar(total);
        if total > 0 && pb.length() != Some(total) {
            pb.set_length(total);
        }
        pb.set_position(current);
        pb.set_message(label.into());
    }

    fn clear_progress(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }

    fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        match &self.bar {
            Some(pb) => pb.suspend(|| tracing::info!("{message}")),
            None => tracing::info!("{message}"),
        }
    }
}
