//! Terminal adapter for the core's progress events.

use indicatif::{ProgressBar, ProgressStyle};

use crate::progress::{ProgressEvent, ProgressSink};

/// Renders [`ProgressEvent`]s on an `indicatif` bar.
pub struct TermProgress {
    bar: ProgressBar,
}

impl TermProgress {
    /// Creates a bar with no known length; the first `Entry` event sizes
    /// it.
    #[must_use]
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) =
            ProgressStyle::with_template("{msg:<30} [{bar:30}] {pos}/{len}")
        {
            bar.set_style(style);
        }
        Self { bar }
    }

    /// Clears the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for TermProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TermProgress {
    fn report(&self, event: &ProgressEvent<'_>) {
        match event {
            ProgressEvent::Phase { name } => {
                self.bar.set_message((*name).to_owned());
            }
            ProgressEvent::Entry { name, index, total } => {
                self.bar.set_length(*total);
                self.bar.set_position(index + 1);
                self.bar.set_message((*name).to_owned());
            }
        }
    }
}
