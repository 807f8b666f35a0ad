//! forksync command-line tool.
//!
//! Runs the interactive sync workflow against the working copy: fetch the
//! upstream remote, review what changed, and bring upstream changes into
//! the fork without touching the paths the fork owns.

mod style;
mod terminal;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use forksync_core::config::{SyncConfig, REPO_CONFIG_FILE};
use forksync_core::{GitClient, MergeProtector, Outcome, SyncWorkflow};

use terminal::TerminalOperator;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Keep a fork in step with its upstream without overwriting fork-owned paths.
#[derive(Parser, Debug)]
#[command(name = "forksync", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Working copy to synchronize.
    #[arg(short = 'C', long, default_value = ".")]
    repo: PathBuf,

    /// Print a commented configuration template and exit.
    #[arg(long)]
    print_config: bool,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    // Logs go to stderr so they never interleave with the menu on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    if cli.print_config {
        print!("{}", SyncConfig::default_template());
        return Ok(ExitCode::SUCCESS);
    }

    let version = GitClient::preflight().context("git is required but could not be run")?;
    debug!(%version, "using git");

    let client = GitClient::discover(&cli.repo).with_context(|| {
        format!("{} is not inside a git working copy", cli.repo.display())
    })?;
    let workdir = client.workdir().to_path_buf();

    let config_path = locate_config(cli.config.as_deref(), &workdir);
    let config = SyncConfig::load_and_resolve(config_path.as_deref())
        .context("failed to load configuration")?;
    let rules = config.rule_set().context("invalid exclusion rules")?;

    let protector = MergeProtector::new(
        &rules,
        workdir.join(&config.protection.attributes_file),
        config.protection.merge_driver.as_str(),
    );
    match protector.ensure_protection(&client) {
        Ok(report) => {
            if report.created_attributes {
                println!(
                    "{}",
                    style::success(&format!(
                        "Created {} with {} protected path(s)",
                        config.protection.attributes_file.display(),
                        rules.len()
                    ))
                );
            }
            if report.registered_driver {
                println!(
                    "{}",
                    style::success(&format!(
                        "Registered the '{}' merge driver",
                        config.protection.merge_driver
                    ))
                );
            }
        }
        // Retried when an apply action starts.
        Err(e) => warn!(error = %e, "could not install merge protection at startup"),
    }

    let mut operator = TerminalOperator::new(&workdir, config.editor.command.as_str());
    let outcome = SyncWorkflow::new(&client, &mut operator, &config, protector)
        .run()
        .context("sync workflow failed")?;
    info!(?outcome, "session finished");

    Ok(exit_code(&outcome))
}

/// Every way the workflow ends is a normal session end. Only errors
/// propagated out of `run` fail the process.
fn exit_code(outcome: &Outcome) -> ExitCode {
    match outcome {
        Outcome::Exited | Outcome::Aborted(_) => ExitCode::SUCCESS,
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

/// An explicit path wins, then the working-copy file, then the user config
/// directory. `None` means built-in defaults.
fn locate_config(explicit: Option<&Path>, workdir: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let candidates = [
        Some(workdir.join(REPO_CONFIG_FILE)),
        dirs::config_dir().map(|dir| dir.join("forksync").join("config.toml")),
    ];
    candidates.into_iter().flatten().find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["forksync"]);
        assert_eq!(cli.repo, PathBuf::from("."));
        assert!(cli.config.is_none());
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from(["forksync", "-C", "/tmp/fork", "-c", "sync.toml"]);
        assert_eq!(cli.repo, PathBuf::from("/tmp/fork"));
        assert_eq!(cli.config, Some(PathBuf::from("sync.toml")));
    }

    #[test]
    fn test_every_outcome_exits_cleanly() {
        use forksync_core::workflow::AbortReason;

        for outcome in [
            Outcome::Exited,
            Outcome::Aborted(AbortReason::RemoteDeclined),
            Outcome::Aborted(AbortReason::FetchFailed),
        ] {
            assert_eq!(exit_code(&outcome), ExitCode::SUCCESS, "{:?}", outcome);
        }
    }

    #[test]
    fn test_explicit_config_wins() {
        let dir = std::env::temp_dir();
        assert_eq!(
            locate_config(Some(Path::new("custom.toml")), &dir),
            Some(PathBuf::from("custom.toml"))
        );
    }

    #[test]
    fn test_repo_config_is_found() {
        let dir = std::env::temp_dir().join(format!("forksync-cli-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(REPO_CONFIG_FILE), "").unwrap();
        assert_eq!(locate_config(None, &dir), Some(dir.join(REPO_CONFIG_FILE)));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
