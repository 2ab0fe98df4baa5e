//! Terminal rendering sink.

use crate::cli::OutputFormat;
use crate::render::markdown::{
    generate_batch_section, generate_history_section, generate_prediction_section,
    generate_summary_section,
};
use crate::render::{Download, NotificationCenter, NotificationKind, RenderInstruction, RenderSink};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Prints render instructions to a writer.
///
/// Markdown mode prints cards and tables; JSON mode prints one JSON object
/// per instruction. Downloads are written into the export directory in
/// both modes.
pub struct TerminalRenderer<W: Write> {
    out: W,
    format: OutputFormat,
    export_dir: PathBuf,
    show_spinner: bool,
    spinner: Option<ProgressBar>,
    notifications: NotificationCenter,
    saved_files: Vec<PathBuf>,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(
        out: W,
        format: OutputFormat,
        export_dir: PathBuf,
        notification_ttl_seconds: u64,
    ) -> Self {
        Self {
            out,
            format,
            export_dir,
            show_spinner: format == OutputFormat::Markdown,
            spinner: None,
            notifications: NotificationCenter::new(notification_ttl_seconds),
            saved_files: Vec::new(),
        }
    }

    /// Disable the loading spinner (quiet mode, non-interactive output).
    pub fn without_spinner(mut self) -> Self {
        self.show_spinner = false;
        self
    }

    /// Files written by download instructions so far.
    pub fn saved_files(&self) -> &[PathBuf] {
        &self.saved_files
    }

    /// Print the notifications that have not expired yet.
    pub fn print_notifications(&mut self) {
        let now = Utc::now();
        let lines: Vec<String> = self
            .notifications
            .active(now)
            .iter()
            .map(|n| format!("[{}] {} {}", n.id, n.kind.emoji(), n.message))
            .collect();

        if lines.is_empty() {
            self.write_line("No active notifications.");
        } else {
            for line in lines {
                self.write_line(&line);
            }
        }
    }

    /// Dismiss a notification by id.
    pub fn dismiss_notification(&mut self, id: u64) -> bool {
        self.notifications.dismiss(id)
    }

    fn write_line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text) {
            warn!("Failed to write output: {}", e);
        }
    }

    fn start_spinner(&mut self, label: &str) {
        if !self.show_spinner {
            return;
        }

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(label.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn notify(&mut self, kind: NotificationKind, message: &str) {
        let now = Utc::now();
        self.notifications.expire(now);
        let id = self.notifications.push(kind, message, now);
        debug!("Notification {} ({}): {}", id, kind, message);

        if self.format == OutputFormat::Markdown {
            self.write_line(&format!("{} {}", kind.emoji(), message));
        }
    }

    fn render_markdown(&mut self, instruction: &RenderInstruction) {
        let text = match instruction {
            RenderInstruction::ShowSummary(view) => generate_summary_section(view),
            RenderInstruction::ShowHistory(view) => generate_history_section(view),
            RenderInstruction::ShowSinglePrediction(view) => generate_prediction_section(view),
            RenderInstruction::ShowBatchPrediction(view) => generate_batch_section(view),
            RenderInstruction::ShowJobTypes { job_types } => {
                let mut list = format!("## Job Types ({})\n\n", job_types.len());
                for job in job_types {
                    list.push_str(&format!("- {}\n", job));
                }
                list
            }
            RenderInstruction::ShowInitial => "Form cleared. Ready for a new prediction.\n".to_string(),
            _ => return,
        };

        if let Err(e) = write!(self.out, "{}", text) {
            warn!("Failed to write output: {}", e);
        }
    }

    fn render_json(&mut self, instruction: &RenderInstruction) {
        match serde_json::to_string(instruction) {
            Ok(line) => self.write_line(&line),
            Err(e) => warn!("Failed to serialize render instruction: {}", e),
        }
    }
}

impl<W: Write> RenderSink for TerminalRenderer<W> {
    fn render(&mut self, instruction: RenderInstruction) {
        if let RenderInstruction::Download(download) = instruction {
            let filename = download.filename.clone();
            if let Err(e) = self.deliver(download) {
                warn!("Failed to save {}: {}", filename, e);
            }
            return;
        }

        if self.format == OutputFormat::Json {
            self.render_json(&instruction);
        }

        match &instruction {
            RenderInstruction::ShowLoading { label } => self.start_spinner(label),
            RenderInstruction::HideLoading => self.stop_spinner(),
            RenderInstruction::Notify { kind, message } => self.notify(*kind, message),
            other => {
                if self.format == OutputFormat::Markdown {
                    self.render_markdown(other);
                }
            }
        }
    }

    /// Write the document into the export directory.
    fn deliver(&mut self, download: Download) -> std::io::Result<PathBuf> {
        let path = write_download(&self.export_dir, &download)?;

        match self.format {
            OutputFormat::Markdown => self.write_line(&format!("📄 Saved {}", path.display())),
            OutputFormat::Json => self.render_json(&RenderInstruction::Download(download)),
        }
        self.saved_files.push(path.clone());
        Ok(path)
    }
}

/// Write a downloaded document into `dir`, creating it when missing.
pub fn write_download(dir: &Path, download: &Download) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    // Never let a server-supplied name escape the export directory
    let name = Path::new(&download.filename)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "predictions.xlsx".into());
    let path = dir.join(name);

    std::fs::write(&path, &download.bytes)?;
    Ok(path)
}
