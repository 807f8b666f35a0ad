//! Terminal implementation of the workflow [`Operator`].

use std::io;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use forksync_core::workflow::{MenuChoice, Operator, Prompt, Question, Report};

use crate::style;

/// Reads answers with `dialoguer` and renders reports to stdout.
pub struct TerminalOperator {
    workdir: PathBuf,
    editor: String,
    spinner: Option<ProgressBar>,
}

impl TerminalOperator {
    pub fn new(workdir: impl Into<PathBuf>, editor: impl Into<String>) -> Self {
        Self {
            workdir: workdir.into(),
            editor: editor.into(),
            spinner: None,
        }
    }

    fn start_spinner(&mut self, msg: String) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
            spinner.set_style(
                template.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.set_message(msg);
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

fn file_table(headers: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(headers);
    table
}

impl Operator for TerminalOperator {
    fn report(&mut self, report: Report<'_>) {
        self.stop_spinner();
        match report {
            Report::Banner { remote, reference } => {
                println!();
                println!("{}", style::header("forksync"));
                println!("{}", style::dim(&format!("Syncing from {} ({})", reference, remote)));
                println!();
            }
            Report::RemoteMissing { remote } => {
                println!("{}", style::warn(&format!("Remote '{}' is not configured", remote)));
            }
            Report::RemoteAdded { remote, url } => {
                println!("{}", style::success(&format!("Added remote '{}' -> {}", remote, url)));
            }
            Report::RemoteDeclined { remote } => {
                println!(
                    "{}",
                    style::warn(&format!(
                        "Add it manually: git remote add {} <url>",
                        remote
                    ))
                );
            }
            Report::FetchStarted { remote } => {
                self.start_spinner(format!("Fetching {}...", remote));
            }
            Report::FetchSucceeded { latest_commit } => {
                println!("{}", style::success("Fetch complete"));
                if let Some(commit) = latest_commit {
                    println!("  Latest upstream commit: {}", commit);
                }
            }
            Report::FetchFailed { error } => {
                println!("{}", style::error(&format!("Fetch failed: {}", error)));
                println!("  Check your network connection and remote permissions.");
            }
            Report::UpToDate { rules } => {
                println!();
                println!("{}", style::success("Already up to date"));
                println!("  Protected paths:");
                for rule in rules.rules() {
                    println!("    {}", style::dim(&rule.to_string()));
                }
            }
            Report::Summary { changes } => {
                println!();
                println!(
                    "{}",
                    style::header(&format!("{} file(s) can be synchronized", changes.len()))
                );
                let mut table = file_table(vec!["Extension", "Files"]);
                for (ext, count) in changes.extension_summary() {
                    table.add_row(vec![Cell::new(ext), Cell::new(count)]);
                }
                println!("{}", table);
            }
            Report::Menu => {
                println!();
                for choice in MenuChoice::ALL {
                    println!(
                        "  {}  {}",
                        style::key(&choice.key().to_string()),
                        choice.description()
                    );
                }
            }
            Report::InvalidChoice { input } => {
                println!("{}", style::error(&format!("'{}' is not a menu option", input)));
            }
            Report::NothingToApply => {
                println!("{}", style::success("Nothing to apply; already up to date"));
            }
            Report::FileGroups { changes } => {
                println!();
                for (group, files) in changes.groups() {
                    println!("{} {}", style::header(&group), style::dim(&format!("({})", files.len())));
                    for file in files {
                        println!("    {}", file);
                    }
                }
            }
            Report::FileDiff {
                index,
                total,
                path,
                patch,
                stats,
            } => {
                println!();
                println!(
                    "{} {}  {}",
                    style::key(&format!("[{}/{}]", index, total)),
                    style::header(path),
                    style::diff_stats(stats.added, stats.removed)
                );
                if patch.trim().is_empty() {
                    println!("{}", style::dim("  (binary or no textual change)"));
                } else {
                    for line in patch.lines() {
                        println!("{}", style::diff_line(line));
                    }
                }
            }
            Report::ApplyPlan { changes } => {
                println!();
                println!(
                    "{}",
                    style::header(&format!("The merge will update {} file(s):", changes.len()))
                );
                for file in changes.files() {
                    println!("    {}", file);
                }
            }
            Report::Cancelled => {
                println!("{}", style::warn("Cancelled; nothing was changed."));
            }
            Report::ProtectionUnavailable { error } => {
                println!(
                    "{}",
                    style::error(&format!("Merge protection could not be installed: {}", error))
                );
                println!("  Nothing was applied.");
            }
            Report::ProtectionIncomplete { uncovered } => {
                println!(
                    "{}",
                    style::warn("The attributes file does not protect these paths during merges:")
                );
                for pattern in uncovered {
                    println!("    {}", pattern);
                }
            }
            Report::MergeStarted { reference } => {
                self.start_spinner(format!("Merging {}...", reference));
            }
            Report::MergeFailed { error } => {
                println!("{}", style::error(&format!("Merge stopped: {}", error)));
                println!("  Checking for conflicts...");
            }
            Report::MergeStaged { reference } => {
                println!(
                    "{}",
                    style::success(&format!("Merged {} (staged, not committed)", reference))
                );
            }
            Report::RestoreFailed { pathspec, error } => {
                println!(
                    "{}",
                    style::warn(&format!("Could not restore protected path {}: {}", pathspec, error))
                );
            }
            Report::SelectionList { changes } => {
                println!();
                let mut table = file_table(vec!["#", "File"]);
                for (i, file) in changes.files().iter().enumerate() {
                    table.add_row(vec![Cell::new(i + 1), Cell::new(file)]);
                }
                println!("{}", table);
            }
            Report::InvalidSelection { error } => {
                println!("{}", style::error(&error.to_string()));
            }
            Report::FileUpdated { path } => {
                println!("{}", style::success(path));
            }
            Report::FileUpdateFailed { path, error } => {
                println!("{}", style::error(&format!("{}: {}", path, error)));
            }
            Report::SelectionApplied { applied, selected } => {
                println!();
                println!(
                    "{}",
                    style::header(&format!("Updated {} of {} selected file(s)", applied, selected))
                );
            }
            Report::ConflictsFound { paths, steps } => {
                println!();
                println!(
                    "{}",
                    style::warn(&format!("{} file(s) have unresolved conflicts", paths.len()))
                );
                let mut table = file_table(vec!["File"]);
                for path in paths {
                    table.add_row(vec![Cell::new(path)]);
                }
                println!("{}", table);
                println!("{}", style::header("To resolve:"));
                for (i, step) in steps.iter().enumerate() {
                    println!("  {}. {}", i + 1, step);
                }
            }
            Report::NoConflicts { ready_to_commit } => {
                println!("{}", style::success("No conflicts"));
                if ready_to_commit {
                    println!("  All conflicts are fixed. Commit the merge: git commit");
                }
            }
            Report::EditorFailed { error } => {
                println!(
                    "{}",
                    style::error(&format!("Could not launch '{}': {}", self.editor, error))
                );
            }
            Report::Status { text } => {
                println!();
                println!("{}", text.trim_end());
            }
            Report::NextSteps => {
                println!();
                println!("{}", style::header("Next steps:"));
                println!("  1. Resolve any conflicts (menu option 4)");
                println!("  2. Review and commit: git commit");
                println!("  3. Push to your fork: git push");
            }
            Report::Farewell => {
                println!("{}", style::dim("Bye."));
            }
        }
    }

    fn ask(&mut self, prompt: Prompt) -> io::Result<String> {
        self.stop_spinner();
        let text = match prompt {
            Prompt::MenuChoice => "Choose an option".to_string(),
            Prompt::FileSelection { count } => {
                format!("Files to apply (1-{}, comma-separated; 'a' all, 'q' cancel)", count)
            }
            Prompt::NextFile => "Enter for next file, 'q' to stop".to_string(),
            Prompt::ReturnToMenu => "Enter to return to the menu, '0' to exit".to_string(),
        };
        Input::<String>::new()
            .with_prompt(text)
            .allow_empty(true)
            .interact_text()
            .map_err(|dialoguer::Error::IO(e)| e)
    }

    fn confirm(&mut self, question: Question<'_>) -> io::Result<bool> {
        self.stop_spinner();
        let text = match question {
            Question::AddRemote { remote, url } => format!("Add remote '{}' ({})?", remote, url),
            Question::ViewDiffs => "View per-file diffs?".to_string(),
            Question::ApplyAll { count } => format!("Merge all {} file(s) now?", count),
            Question::OpenEditor => format!("Open conflicted files in '{}'?", self.editor),
        };
        Confirm::new()
            .with_prompt(text)
            .default(question.default_answer())
            .interact()
            .map_err(|dialoguer::Error::IO(e)| e)
    }

    fn open_in_editor(&mut self, paths: &[String]) -> io::Result<()> {
        let existing: Vec<&String> = paths
            .iter()
            .filter(|p| self.workdir.join(p.as_str()).exists())
            .collect();
        if existing.is_empty() {
            println!("{}", style::warn("None of the conflicted files exist on disk."));
            return Ok(());
        }

        let mut parts = self.editor.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "editor command is empty"))?;
        debug!(program, files = existing.len(), "launching editor");
        let status = Command::new(program)
            .args(parts)
            .args(existing.iter().map(|p| p.as_str()))
            .current_dir(&self.workdir)
            .status()?;
        if !status.success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} exited with {}", self.editor, status),
            ));
        }
        println!(
            "{}",
            style::success(&format!("Opened {} file(s) in {}", existing.len(), self.editor))
        );
        Ok(())
    }
}
