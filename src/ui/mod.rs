//! Terminal output helpers for the command-line front end.
//!
//! Colored status lines, search spinners and a download progress bar that
//! plugs into the engine as a [`ProgressSink`].

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::time::Duration;

use crate::download::ProgressSink;
use crate::models::SourceType;

/// Source icons for the supported sources.
pub fn source_icon(source: SourceType) -> &'static str {
    match source {
        SourceType::Arxiv => "📝",
        SourceType::SciHub => "🔓",
        SourceType::GoogleScholar => "🔎",
        SourceType::IeeeXplore => "⚡",
        SourceType::PubMed => "🏥",
        SourceType::SemanticScholar => "🧠",
        SourceType::Google => "🌐",
    }
}

/// Status types for colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
    Download,
    Search,
}

/// Status icons for different operations.
pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
        Status::Download => "↓",
        Status::Search => "🔍",
    }
}

/// Print a styled status message.
pub fn print_status(status: Status, msg: &str) {
    let icon = status_icon(status);
    match status {
        Status::Success => println!("{} {}", icon.green().bold(), msg),
        Status::Error => eprintln!("{} {}", icon.red().bold(), msg),
        Status::Warning => println!("{} {}", icon.yellow().bold(), msg),
        Status::Info => println!("{} {}", icon.cyan().bold(), msg),
        Status::Download => println!("{} {}", icon.magenta(), msg),
        Status::Search => println!("{} {}", icon.yellow(), msg),
    }
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", format!("━━━ {} ━━━", title).bold().cyan());
}

/// Print search results header.
pub fn print_search_header(query: &str, source: SourceType, count: usize, duration: Duration) {
    println!();
    println!(
        "{} {} results for: \"{}\"",
        source_icon(source),
        source.name().bold(),
        query.cyan().bold()
    );
    println!(
        "{} {} papers in {:.2}s",
        "─".repeat(30).dimmed(),
        count.to_string().green().bold(),
        duration.as_secs_f64()
    );
}

/// Truncate text to at most `max_chars` characters, ending in "..."
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return "...".to_string();
    }
    let kept: String = text.chars().take(max_chars - 3).collect();
    format!("{}...", kept)
}

/// Get a human-readable file size.
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Spinner shown while one or more searches run
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(msg: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(style("{spinner:.cyan} {msg}").tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    /// A spinner that draws nothing, for quiet or non-interactive output
    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    pub fn finish_and_clear(&self) {
        self.pb.finish_and_clear();
    }
}

/// Download progress bar fed by the download engine
pub struct DownloadBar {
    pb: ProgressBar,
}

impl DownloadBar {
    pub fn new(title: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_message(truncate_with_ellipsis(title, 40));
        Self { pb }
    }

    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    pub fn finish_and_clear(&self) {
        self.pb.finish_and_clear();
    }
}

impl ProgressSink for DownloadBar {
    fn on_progress(&self, downloaded: u64, total: Option<u64>) {
        match total {
            Some(total) if self.pb.length() != Some(total) => {
                self.pb.set_length(total);
                self.pb.set_style(
                    style("{msg}: {bar:40.cyan/blue} {bytes}/{total_bytes} ({percent}%)")
                        .progress_chars("█▓▒░ "),
                );
            }
            None if self.pb.length().is_some() => {
                self.pb.unset_length();
                self.pb.set_style(style("{spinner:.cyan} {msg}: {bytes}"));
            }
            _ => {}
        }
        self.pb.set_position(downloaded);
    }

    fn on_attempt(&self, url: &str) {
        self.pb.set_position(0);
        self.pb.println(format!(
            "{} trying {}",
            status_icon(Status::Download).magenta(),
            url.dimmed()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_icon() {
        assert_eq!(status_icon(Status::Success), "✓");
        assert_eq!(status_icon(Status::Error), "✗");
        assert_eq!(status_icon(Status::Search), "🔍");
    }

    #[test]
    fn test_source_icons_are_set() {
        for source in SourceType::ALL {
            assert!(!source_icon(source).is_empty());
        }
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("short", 10), "short");
        assert_eq!(truncate_with_ellipsis("a longer title here", 10), "a longe...");
        assert_eq!(truncate_with_ellipsis("深度学习的研究进展", 5), "深度...");
        assert_eq!(truncate_with_ellipsis("abcdef", 2), "...");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(2048), "2.00 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_hidden_bar_accepts_progress() {
        let bar = DownloadBar::hidden();
        bar.on_attempt("https://example.org/a.pdf");
        bar.on_progress(10, Some(100));
        bar.on_progress(20, None);
        bar.finish_and_clear();
    }
}
