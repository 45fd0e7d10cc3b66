//! # Strata CLI
//!
//! Command-line front end for the strata library.
//!
//! ## Usage
//! ```bash
//! strata init
//! strata add src README.md
//! strata status
//! strata commit -m "Initial state"
//! strata log --limit 5
//! strata revert 3f2a9c1b
//! ```
//!
//! Path arguments are relative to the current directory. The process exit
//! code is `0` on success and the error's stable code otherwise.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use strata::{FileStatus, Repository, RepositoryBuilder, Result, StatusReport};
use tracing_subscriber::EnvFilter;

/// Strata - a small local version-control tool
#[derive(Parser)]
#[command(name = "strata")]
#[command(version)]
#[command(about = "Snapshot files, stage changes and walk a linear commit history")]
#[command(long_about = None)]
struct Cli {
    /// Repository directory (defaults to the current directory)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a repository
    Init {
        /// Ignore patterns (gitignore syntax)
        #[arg(short, long)]
        ignore: Vec<String>,

        /// Largest file that may be staged, in bytes
        #[arg(long)]
        max_file_size: Option<u64>,
    },

    /// Stage files, directories or globs
    Add {
        /// Paths to stage
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Stage the removal of tracked paths
    Rm {
        /// Paths to remove from the next commit
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Show the status of the working tree
    #[command(alias = "st")]
    Status,

    /// Record staged changes
    #[command(alias = "ci")]
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,
    },

    /// Remove paths from the staging index
    Unstage {
        /// Paths to unstage
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Overwrite working files from the stage or the last commit
    Restore {
        /// Paths to restore
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List commits, newest first
    Log {
        /// Limit results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one commit and the paths it changed
    Show {
        /// Commit hash or unique prefix
        commit: String,
    },

    /// Record a new commit that replays an earlier tree
    Revert {
        /// Commit hash or unique prefix
        commit: String,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e.user_message());
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    let path = cli.path.unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        Commands::Init { ignore, max_file_size } => cmd_init(&path, ignore, max_file_size),
        Commands::Add { paths } => cmd_add(&path, paths),
        Commands::Rm { paths } => cmd_rm(&path, paths),
        Commands::Status => cmd_status(&path),
        Commands::Commit { message } => cmd_commit(&path, &message),
        Commands::Unstage { paths } => cmd_unstage(&path, paths),
        Commands::Restore { paths } => cmd_restore(&path, paths),
        Commands::Log { limit } => cmd_log(&path, limit),
        Commands::Show { commit } => cmd_show(&path, &commit),
        Commands::Revert { commit } => cmd_revert(&path, &commit),
    }
}

fn cmd_init(path: &Path, ignore: Vec<String>, max_file_size: Option<u64>) -> Result<()> {
    let repo = RepositoryBuilder::new()
        .ignore_patterns(ignore)
        .max_file_size(max_file_size.unwrap_or(0))
        .init(path)?;

    println!("{} Initialized empty repository", "✓".green().bold());
    println!("  Root: {}", repo.root().display().to_string().cyan());
    println!("\nNext steps:");
    println!("  - Stage files: {}", "strata add <paths>".yellow());
    println!("  - Record them: {}", "strata commit -m \"Initial state\"".yellow());
    Ok(())
}

fn cmd_add(path: &Path, paths: Vec<PathBuf>) -> Result<()> {
    let repo = Repository::discover(path)?;
    let staged = repo.add(&relative_args(&repo, paths))?;

    if staged.is_empty() {
        println!("{}", "Nothing new to stage.".yellow());
    }
    for path in staged {
        println!("  {} {}", "staged".green(), path);
    }
    Ok(())
}

fn cmd_rm(path: &Path, paths: Vec<PathBuf>) -> Result<()> {
    let repo = Repository::discover(path)?;
    for path in repo.remove(&relative_args(&repo, paths))? {
        println!("  {} {}", "removed".red(), path);
    }
    Ok(())
}

fn cmd_unstage(path: &Path, paths: Vec<PathBuf>) -> Result<()> {
    let repo = Repository::discover(path)?;
    for path in repo.unstage(&relative_args(&repo, paths))? {
        println!("  {} {}", "unstaged".yellow(), path);
    }
    Ok(())
}

fn cmd_status(path: &Path) -> Result<()> {
    let repo = Repository::discover(path)?;
    let report = repo.status()?;

    match &report.head {
        Some(head) => println!("On commit {}", head[..8].yellow()),
        None => println!("No commits yet"),
    }

    if report.is_clean() {
        println!("{}", "Nothing to commit, working tree clean".green());
        return Ok(());
    }

    print_section(&report, "Changes to be committed:", FileStatus::is_staged, Color::Green);
    print_section(
        &report,
        "Changes not staged for commit:",
        |status| {
            matches!(
                status,
                FileStatus::ModifiedSinceStage | FileStatus::ModifiedSinceCommit | FileStatus::Deleted
            )
        },
        Color::Red,
    );
    print_section(
        &report,
        "Untracked files:",
        |status| *status == FileStatus::Untracked,
        Color::Red,
    );
    Ok(())
}

fn print_section(
    report: &StatusReport,
    title: &str,
    selected: impl Fn(&FileStatus) -> bool,
    color: Color,
) {
    let entries: Vec<_> = report
        .entries
        .iter()
        .filter(|entry| selected(&entry.status))
        .collect();
    if entries.is_empty() {
        return;
    }

    println!("\n{}", title.bold());
    for entry in entries {
        if entry.status == FileStatus::Untracked {
            println!("    {}", entry.path.color(color));
        } else {
            let label = format!("{}:", entry.status.label());
            println!("    {:<22}{}", label.color(color), entry.path.color(color));
        }
    }
}

fn cmd_commit(path: &Path, message: &str) -> Result<()> {
    let repo = Repository::discover(path)?;
    let commit = repo.commit(message)?;
    let changes = repo.changes(&commit)?;

    println!("[{}] {}", commit.short_hash().yellow().bold(), commit.message);
    println!(
        "  {} added, {} modified, {} removed",
        changes.added.len(),
        changes.modified.len(),
        changes.removed.len()
    );
    Ok(())
}

fn cmd_restore(path: &Path, paths: Vec<PathBuf>) -> Result<()> {
    let repo = Repository::discover(path)?;
    let result = repo.restore(&relative_args(&repo, paths))?;

    for path in &result.from_stage {
        println!("  {} {} {}", "restored".green(), path, "(from stage)".dimmed());
    }
    for path in &result.from_head {
        println!("  {} {} {}", "restored".green(), path, "(from last commit)".dimmed());
    }
    Ok(())
}

fn cmd_log(path: &Path, limit: Option<usize>) -> Result<()> {
    let repo = Repository::discover(path)?;
    let mut shown = 0;

    for (i, commit) in repo.log().take(limit.unwrap_or(usize::MAX)).enumerate() {
        let commit = commit?;
        let marker = if i == 0 { " (HEAD)".cyan().bold() } else { "".normal() };
        println!("commit {}{}", commit.hash.yellow(), marker);
        println!("Date:   {}", commit.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("\n    {}\n", commit.message);
        shown += 1;
    }

    if shown == 0 {
        println!("{}", "No commits yet.".yellow());
    }
    Ok(())
}

fn cmd_show(path: &Path, rev: &str) -> Result<()> {
    let repo = Repository::discover(path)?;
    let commit = repo.get_commit(rev)?;
    let changes = repo.changes(&commit)?;

    println!("commit {}", commit.hash.yellow());
    if let Some(parent) = &commit.parent {
        println!("Parent: {}", parent.dimmed());
    }
    println!("Date:   {}", commit.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("\n    {}\n", commit.message);

    for path in &changes.added {
        println!("  {} {}", "A".green().bold(), path);
    }
    for path in &changes.modified {
        println!("  {} {}", "M".yellow().bold(), path);
    }
    for path in &changes.removed {
        println!("  {} {}", "D".red().bold(), path);
    }
    println!("\n{} files in tree", commit.tree.len());
    Ok(())
}

fn cmd_revert(path: &Path, rev: &str) -> Result<()> {
    let repo = Repository::discover(path)?;
    let result = repo.revert(rev)?;

    println!(
        "{} Reverted to {} as {}",
        "✓".green().bold(),
        result.target[..8].yellow(),
        result.commit[..8].yellow().bold()
    );
    println!("  {} files written", result.files_written);
    if !result.left_in_place.is_empty() {
        println!("\n{}", "Not part of the reverted tree, left in place:".bold());
        for path in &result.left_in_place {
            println!("    {}", path);
        }
    }
    Ok(())
}

/// Re-express arguments given relative to the current directory as paths
/// relative to the repository root
fn relative_args(repo: &Repository, args: Vec<PathBuf>) -> Vec<PathBuf> {
    let prefix = std::env::current_dir()
        .and_then(|cwd| cwd.canonicalize())
        .ok()
        .and_then(|cwd| cwd.strip_prefix(repo.root()).ok().map(Path::to_path_buf))
        .unwrap_or_default();

    if prefix.as_os_str().is_empty() {
        return args;
    }
    args.into_iter()
        .map(|arg| if arg.is_absolute() { arg } else { prefix.join(arg) })
        .collect()
}
