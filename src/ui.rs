//! Terminal presentation: the progress line and the interactive chooser.

use dialoguer::Select;
use indicatif::{ProgressBar, ProgressStyle};
use shelf_library::Candidate;
use shelf_library::identify::Chooser;
use shelf_tools::{ConvertProgress, ProgressFn, Tags};
use std::sync::Arc;
use std::time::Duration;

/// Counter of processed items with a spinner. Hidden automatically when
/// stderr isn't a terminal.
pub fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_msg}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Prints a line to stdout without tearing the progress bar.
pub fn say(bar: &ProgressBar, line: impl AsRef<str>) {
    bar.suspend(|| println!("{}", line.as_ref()));
}

/// Feeds conversion progress into the bar's message.
pub fn conversion_progress(bar: &ProgressBar) -> Arc<ProgressFn> {
    let bar = bar.clone();
    Arc::new(move |progress: ConvertProgress| {
        if progress.finished {
            bar.set_message("finishing conversion");
        } else {
            bar.set_message(format!("converting, {} written", clock(progress.out_time)));
        }
    })
}

fn clock(duration: Duration) -> String {
    let seconds = duration.as_secs();
    format!("{}:{:02}:{:02}", seconds / 3600, seconds / 60 % 60, seconds % 60)
}

/// Asks on the terminal which catalog entry a file belongs to. Anything but
/// an explicit choice (including no terminal at all) skips the file.
pub struct Prompt {
    bar: ProgressBar,
}
impl Prompt {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}
impl Chooser for Prompt {
    fn choose(&mut self, file: &str, tags: &Tags, candidates: &[Candidate<'_>]) -> Option<usize> {
        let mut items: Vec<String> = candidates
            .iter()
            .map(|c| {
                let authors = c.entry.authors_display();
                format!("{} by {} [{}] ({:.0}%)", c.entry.title, authors, c.entry.id, c.score * 100.0)
            })
            .collect();
        items.push("Skip this file".to_string());
        let skip = items.len() - 1;

        let prompt = format!(
            "{file} (title: {}, artist: {})",
            tags.title().unwrap_or("unknown"),
            tags.artist().unwrap_or("unknown"),
        );
        let answer = self.bar.suspend(|| Select::new().with_prompt(prompt).items(&items).default(skip).interact_opt());
        match answer {
            Ok(Some(choice)) if choice < skip => Some(choice),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(file, error = %e, "Could not prompt; skipping file");
                None
            },
        }
    }
}
