//! # Review Harness CLI (`rvw`)
//!
//! Opens a plain-text document, runs the (simulated) analysis, and renders,
//! navigates or chats about it.
//!
//! ## Usage
//!
//! ```bash
//! rvw [--config ./rvw.toml] [--verbose] [--fast] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rvw analyze <file>` | Score, strengths, suggestions and issues by section |
//! | `rvw render <file>` | Every section with highlights as text, HTML or JSON |
//! | `rvw resolve <file> <ref>` | Where `page:N`, `section:ID` or `issue:ID` lands |
//! | `rvw chat <file>` | Line-oriented chat over stdin (`/open`, `/list`, `/retry`) |
//!
//! ## Examples
//!
//! ```bash
//! # Save the analysis and render against it later
//! rvw analyze essay.md --json > analysis.json
//! rvw render essay.md --analysis analysis.json --select 2 --format html
//!
//! # Jump targets
//! rvw resolve essay.md page:3
//! rvw resolve essay.md issue:2
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, Level};

use review_harness::config::{self, Config, SimulationConfig};
use review_harness::export;
use review_harness::ingest;
use review_harness::library::{Added, Library};
use review_harness::simulated::{self, SimulatedAnalyzer};
use review_harness::workspace::{AnalysisState, Workspace};
use review_harness_core::annotations::{
    issue_counts, issues_at_least, issues_for_section, most_severe, sorted_by_position,
};
use review_harness_core::document::attach_analysis;
use review_harness_core::models::{Analysis, Document, Message, Reference, Role, Severity};
use review_harness_core::resolver::{mentioned_pages, resolve, view_for_page, ScrollAnchor};
use review_harness_core::services::AnalysisService;

/// Review Harness CLI: issue highlights and a navigating chat for a
/// plain-text document.
#[derive(Parser)]
#[command(
    name = "rvw",
    about = "Review Harness: issue highlights and a navigating chat for a plain-text document",
    version
)]
struct Cli {
    /// Path to a configuration file (TOML). Defaults apply without one.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level regardless of `logging.level`.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Skip the simulated analysis and reply latency.
    #[arg(long, global = true)]
    fast: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a document and print the findings.
    Analyze {
        file: PathBuf,

        /// Print the analysis as JSON instead of a report.
        #[arg(long)]
        json: bool,
    },

    /// Render every section with its highlights.
    Render {
        file: PathBuf,

        /// Analysis JSON to render against instead of the simulated one.
        #[arg(long)]
        analysis: Option<PathBuf>,

        /// Issue id to mark as selected.
        #[arg(long)]
        select: Option<String>,

        /// Output format: `text`, `html` or `json`. Defaults to `render.format`.
        #[arg(long)]
        format: Option<String>,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Resolve a reference to a page, section and scroll anchor.
    Resolve {
        file: PathBuf,

        /// `page:N` (1-based), `section:ID` or `issue:ID`.
        reference: String,

        /// Analysis JSON to resolve issues against instead of the simulated one.
        #[arg(long)]
        analysis: Option<PathBuf>,
    },

    /// Chat about a document, one message per stdin line.
    ///
    /// `/open <file>` switches to another document, `/list` shows the
    /// documents opened so far, `/retry` re-sends turns whose reply failed
    /// and `/quit` exits.
    Chat { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };
    if cli.fast {
        cfg.simulation = SimulationConfig::instant();
    }

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        cfg.logging.max_level()
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Analyze { file, json } => run_analyze(&cfg, &file, json).await,
        Commands::Render {
            file,
            analysis,
            select,
            format,
            output,
        } => {
            let doc = analyzed_document(&file, analysis.as_deref())?;
            let format = format.unwrap_or_else(|| cfg.render.format.clone());
            let rendered = export::render_as(&doc, &format, select.as_deref())?;
            export::write_output(&rendered, output.as_deref())
        }
        Commands::Resolve {
            file,
            reference,
            analysis,
        } => {
            let doc = analyzed_document(&file, analysis.as_deref())?;
            run_resolve(&doc, &reference)
        }
        Commands::Chat { file } => run_chat(&cfg, &file).await,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════════════════

fn load_document(file: &Path) -> Result<Document> {
    let ingested = ingest::ingest_file(file)?;
    ingest::into_document(ingested)
}

fn load_analysis(path: &Path) -> Result<Analysis> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read analysis: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse analysis: {}", path.display()))
}

/// The document with either the given analysis or the simulated one.
fn analyzed_document(file: &Path, analysis: Option<&Path>) -> Result<Document> {
    let doc = load_document(file)?;
    let analysis = match analysis {
        Some(path) => load_analysis(path)?,
        None => simulated::canned_analysis(&doc),
    };
    attach_analysis(&doc, analysis).context("Analysis does not match the document")
}

// ═══════════════════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════════════════

async fn run_analyze(cfg: &Config, file: &Path, json: bool) -> Result<()> {
    let doc = load_document(file)?;
    info!(title = %doc.title, chars = doc.len(), "Analyzing");

    let analysis = SimulatedAnalyzer::new(&cfg.simulation)
        .analyze(&doc)
        .await
        .context("Analysis failed")?;
    let doc = attach_analysis(&doc, analysis).context("Analysis does not match the document")?;
    let Some(analysis) = doc.analysis.as_deref() else {
        anyhow::bail!("Analysis missing after attach");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(analysis)?);
        return Ok(());
    }

    println!("{}", doc.title);
    println!(
        "  sections: {}  pages: {}  characters: {}",
        doc.sections.len(),
        doc.page_count(),
        doc.len()
    );
    println!("\nScore: {:.1} / 10", analysis.overall_score);

    if !analysis.strengths.is_empty() {
        println!("\nStrengths:");
        for s in &analysis.strengths {
            println!("  + {}", s);
        }
    }
    if !analysis.suggestions.is_empty() {
        println!("\nSuggestions:");
        for s in &analysis.suggestions {
            println!("  - {}", s);
        }
    }

    println!(
        "\nIssues ({}, {} critical):",
        analysis.issues.len(),
        issues_at_least(analysis, Severity::Critical).len()
    );
    let counts = issue_counts(analysis);
    for section in doc.sections.iter() {
        let Some(count) = counts.get(section.id.as_str()) else {
            continue;
        };
        println!("\n  [{}] {} ({})", section.id, section.title, count);
        for issue in sorted_by_position(&issues_for_section(analysis, &section.id)) {
            println!(
                "    #{} {:<8} {:<11} {}  ({}..{})",
                issue.id,
                issue.severity.to_string(),
                issue.kind.to_string(),
                issue.title,
                issue.range.start(),
                issue.range.end()
            );
            println!("       {}", issue.suggestion);
        }
    }

    if let Some(issue) = most_severe(analysis) {
        println!("\nStart with #{}: {}", issue.id, issue.title);
    }
    Ok(())
}

fn run_resolve(doc: &Document, reference: &str) -> Result<()> {
    let reference: Reference = reference
        .parse()
        .map_err(|e: String| anyhow::anyhow!("Invalid reference: {}", e))?;
    let location = resolve(doc, &reference)?;
    let view = view_for_page(doc, location.page_index as i64);

    println!("reference: {}", reference);
    println!("page: {} / {}", location.page_index + 1, doc.page_count());
    if let Some(id) = &location.section_id {
        let title = doc.section(id).map(|s| s.title.as_str()).unwrap_or("");
        println!("section: {} ({})", id, title);
    }
    match &location.anchor {
        ScrollAnchor::Page => println!("anchor: top of page"),
        ScrollAnchor::Section { section_id } => println!("anchor: heading of {}", section_id),
        ScrollAnchor::Issue { issue_id, range } => println!(
            "anchor: issue {} at {}..{}",
            issue_id,
            range.start(),
            range.end()
        ),
    }
    println!("visible sections: {}", view.section_ids.join(", "));
    println!("visible issues: {}", view.issue_ids.join(", "));
    Ok(())
}

async fn run_chat(cfg: &Config, file: &Path) -> Result<()> {
    let mut library = Library::new();
    let mut workspace = Workspace::simulated(cfg);

    let added = library.add(load_document(file)?);
    let mut printed = open_in_workspace(&mut workspace, &mut library, added.document()).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" => break,
            "/list" => {
                print_library(&library, &workspace);
                continue;
            }
            "/retry" => {
                let n = workspace.retry_generation()?;
                println!("(retrying {} turn(s))", n);
            }
            _ if line.starts_with("/open ") => {
                let path = Path::new(line["/open ".len()..].trim());
                let document = match load_document(path) {
                    Ok(document) => document,
                    Err(e) => {
                        eprintln!("Could not open {}: {:#}", path.display(), e);
                        continue;
                    }
                };
                let added = library.add(document);
                if let Added::Existing(existing) = &added {
                    println!("(already uploaded as \"{}\")", existing.title);
                }
                printed = open_in_workspace(&mut workspace, &mut library, added.document()).await;
                continue;
            }
            text => {
                workspace.send(text)?;
            }
        }
        let snapshot = workspace.wait_idle().await;
        for failed in &snapshot.generation.failed {
            eprintln!("No reply to {}: {} (type /retry)", failed.message_id, failed.error);
        }
        printed = print_new_messages(&workspace, printed);
    }
    Ok(())
}

/// Make `document` current, wait for its analysis and store the analyzed
/// snapshot back in the library. Returns the number of messages printed.
async fn open_in_workspace(
    workspace: &mut Workspace,
    library: &mut Library,
    document: &Arc<Document>,
) -> usize {
    workspace.open(document.as_ref().clone());
    println!("\n== {} ({} page(s))", document.title, document.page_count());
    let printed = print_new_messages(workspace, 0);

    match workspace.wait_for_analysis().await {
        AnalysisState::Ready => {
            if let Some(analyzed) = workspace.snapshot().document {
                library.update(analyzed);
            }
        }
        AnalysisState::Failed(e) => eprintln!("Analysis failed: {}", e),
        _ => {}
    }
    print_new_messages(workspace, printed)
}

fn print_library(library: &Library, workspace: &Workspace) {
    let current = workspace.snapshot().document.map(|d| d.id.clone());
    for (index, document) in library.list().iter().enumerate() {
        let marker = if current.as_deref() == Some(document.id.as_str()) {
            "*"
        } else {
            " "
        };
        let issues = document
            .analysis
            .as_deref()
            .map(|a| format!("{} issue(s)", a.issues.len()))
            .unwrap_or_else(|| "not analyzed".to_string());
        println!(
            "{} {}. {} ({} page(s), {})",
            marker,
            index + 1,
            document.title,
            document.page_count(),
            issues
        );
    }
}

/// Print assistant messages after the first `printed` entries and their
/// resolved references. Returns the new count.
fn print_new_messages(workspace: &Workspace, printed: usize) -> usize {
    let snapshot = workspace.snapshot();
    let messages = snapshot.conversation.messages();
    for message in messages.iter().skip(printed) {
        if message.role == Role::Assistant {
            print_assistant(snapshot.document.as_deref(), message);
        }
    }
    messages.len()
}

fn print_assistant(doc: Option<&Document>, message: &Message) {
    println!("\nassistant> {}", message.text);
    let Some(doc) = doc else {
        return;
    };

    let mut references = message.references.clone();
    for r in mentioned_pages(&message.text) {
        if !references.contains(&r) {
            references.push(r);
        }
    }
    for reference in &references {
        match resolve(doc, reference) {
            Ok(location) => println!(
                "  -> {} (page {}{})",
                reference,
                location.page_index + 1,
                location
                    .section_id
                    .as_deref()
                    .map(|id| format!(", {}", id))
                    .unwrap_or_default()
            ),
            Err(e) => println!("  -> {} ({})", reference, e),
        }
    }
}
