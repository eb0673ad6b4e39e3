//! Upload/download progress reporting.

use std::io::{self, Write};

pub trait ProgressSink {
    /// Called with the fraction of the transfer completed so far (0..=1).
    fn on_progress(&mut self, fraction: f64);
    fn on_complete(&mut self);
}

/// ASCII progress bar redrawn in place on stdout.
pub struct ConsoleProgressBar {
    label: String,
    width: usize,
    last_percent: i64,
}

impl ConsoleProgressBar {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            width: 40,
            last_percent: -1,
        }
    }

    fn draw(&self, percent: i64) {
        let filled = (percent as usize * self.width) / 100;
        print!(
            "\r{} [{}{}] {percent:3}%",
            self.label,
            "=".repeat(filled),
            " ".repeat(self.width - filled),
        );
        let _ = io::stdout().flush();
    }
}

impl ProgressSink for ConsoleProgressBar {
    fn on_progress(&mut self, fraction: f64) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).round() as i64;
        if percent == self.last_percent {
            return;
        }
        self.last_percent = percent;
        self.draw(percent);
    }

    fn on_complete(&mut self) {
        self.draw(100);
        println!();
    }
}

/// Sink that swallows progress updates. Used where a bar would be noise.
#[derive(Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_progress(&mut self, _fraction: f64) {}
    fn on_complete(&mut self) {}
}
