use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use treemorph::config::{discover, load_from_path};
use treemorph::{
    DocumentId, EditError, MorphError, NodeId, Oracle, Project, Settings, TreeSitterOracle,
};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "treemorph")]
#[command(about = "Structural source editing with tree-sitter", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (defaults to the nearest treemorph.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log every edit and handle synchronization
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone, Copy)]
struct Output {
    /// Dry run - show what would be changed without modifying files
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Show unified diff of changes
    #[arg(short, long)]
    diff: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Rename the symbol at an offset everywhere it is referenced
    Rename {
        file: PathBuf,

        /// Byte offset inside the name to rename
        #[arg(long)]
        offset: usize,

        /// New name
        #[arg(long)]
        to: String,

        /// Also load every supported file under this directory
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Print the rename report as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        output: Output,
    },

    /// Replace a byte range with new text
    Replace {
        file: PathBuf,

        #[arg(long)]
        start: usize,

        #[arg(long)]
        end: usize,

        #[arg(long)]
        text: String,

        #[command(flatten)]
        output: Output,
    },

    /// Remove the construct at an offset
    Remove {
        file: PathBuf,

        /// Byte offset inside the construct
        #[arg(long)]
        offset: usize,

        /// Remove the nearest enclosing node of this kind instead of the
        /// innermost named node
        #[arg(long)]
        kind: Option<String>,

        #[command(flatten)]
        output: Output,
    },

    /// Print the named nodes of a file, or the matches of a pattern
    Nodes {
        file: PathBuf,

        /// ast-grep pattern, e.g. 'foo($A)'
        #[arg(short, long)]
        pattern: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Rename {
            file,
            offset,
            to,
            dir,
            json,
            output,
        } => cmd_rename(cli.config, file, offset, &to, dir, json, output),

        Commands::Replace {
            file,
            start,
            end,
            text,
            output,
        } => cmd_replace(cli.config, file, start, end, &text, output),

        Commands::Remove {
            file,
            offset,
            kind,
            output,
        } => cmd_remove(cli.config, file, offset, kind.as_deref(), output),

        Commands::Nodes { file, pattern } => cmd_nodes(cli.config, file, pattern.as_deref()),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "treemorph=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

/// Settings from `--config`, else the nearest treemorph.toml above `file`,
/// else the current directory, else defaults.
fn load_settings(config: Option<PathBuf>, file: &Path) -> Result<Settings> {
    if let Some(path) = config {
        return Ok(load_from_path(&path)?);
    }

    let file_dir = file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let start = file_dir.canonicalize().unwrap_or(file_dir);
    if let Some((path, settings)) = discover(&start)? {
        eprintln!("{}", format!("Using settings from {}", path.display()).dimmed());
        return Ok(settings);
    }
    if let Ok(cwd) = env::current_dir() {
        if let Some((_, settings)) = discover(cwd)? {
            return Ok(settings);
        }
    }
    Ok(Settings::default())
}

fn open_project(config: Option<PathBuf>, file: &Path) -> Result<(Project, DocumentId)> {
    let settings = load_settings(config, file)?;
    let mut project = Project::from_settings(settings)?;
    let doc = project
        .add_document_from_path(file)
        .with_context(|| format!("failed to load {}", file.display()))?;
    Ok((project, doc))
}

/// Supported source files under `dir`, skipping VCS and build directories.
fn discover_sources(dir: &Path, settings: &Settings) -> Result<Vec<PathBuf>> {
    let oracle = TreeSitterOracle::from_settings(settings);
    let mut files = Vec::new();
    let walker = WalkDir::new(dir).into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        !(entry.file_type().is_dir()
            && entry.depth() > 0
            && (name.starts_with('.') || name == "node_modules" || name == "target"))
    });
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && oracle.grammar_for(entry.path()).is_some() {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!("\n{}", format!("--- {} (original)", file.display()).dimmed());
    println!("{}", format!("+++ {} (modified)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

/// Snapshot every document's text, keyed by path.
fn snapshot(project: &Project) -> BTreeMap<PathBuf, String> {
    project
        .documents()
        .map(|doc| (doc.path().to_path_buf(), doc.text().to_string()))
        .collect()
}

/// Diff, then save whatever changed unless this is a dry run.
fn finish(project: &Project, before: &BTreeMap<PathBuf, String>, output: Output) -> Result<usize> {
    let mut changed = 0;
    for doc in project.documents() {
        let Some(original) = before.get(doc.path()) else {
            continue;
        };
        if original == doc.text() {
            continue;
        }
        changed += 1;
        if output.diff {
            display_diff(doc.path(), original, doc.text());
        }
        if !output.dry_run {
            project.save(doc.id())?;
        }
    }

    if output.dry_run {
        println!("{}", "[DRY RUN - no files were written]".cyan());
    }
    Ok(changed)
}

fn cmd_rename(
    config: Option<PathBuf>,
    file: PathBuf,
    offset: usize,
    new_name: &str,
    dir: Option<PathBuf>,
    json: bool,
    output: Output,
) -> Result<()> {
    let (mut project, doc) = open_project(config, &file)?;
    if let Some(dir) = dir {
        for path in discover_sources(&dir, project.settings())? {
            // The target file may be reachable under a different spelling.
            let same = path.canonicalize().ok() == file.canonicalize().ok();
            if !same {
                project.add_document_from_path(&path)?;
            }
        }
    }

    let before = snapshot(&project);
    let node = project.deepest_node_at(doc, offset)?;
    let report = project.rename(node, new_name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.is_noop() {
        println!("{}", "Nothing to rename".yellow());
    } else {
        println!(
            "{} {} {} {} ({} occurrences in {} files)",
            "Renamed".green().bold(),
            report.old_name,
            "->".dimmed(),
            report.new_name,
            report.span_count(),
            report.files.len()
        );
        for renamed in &report.files {
            println!("  {} ({})", renamed.path.display(), renamed.spans.len());
        }
    }

    finish(&project, &before, output)?;
    Ok(())
}

fn cmd_replace(
    config: Option<PathBuf>,
    file: PathBuf,
    start: usize,
    end: usize,
    text: &str,
    output: Output,
) -> Result<()> {
    let (mut project, doc) = open_project(config, &file)?;
    let before = snapshot(&project);

    let outcome = project.replace_range(doc, start..end, text)?;
    if outcome.unchanged {
        println!("{}", "Text already matches, nothing to do".yellow());
    } else {
        println!(
            "{} {}..{} in {} (delta {:+})",
            "Replaced".green().bold(),
            start,
            end,
            file.display(),
            outcome.descriptor.delta
        );
    }

    finish(&project, &before, output)?;
    Ok(())
}

fn cmd_remove(
    config: Option<PathBuf>,
    file: PathBuf,
    offset: usize,
    kind: Option<&str>,
    output: Output,
) -> Result<()> {
    let (mut project, doc) = open_project(config, &file)?;
    let before = snapshot(&project);

    let target = removal_target(&mut project, doc, offset, kind)?;
    let description = format!(
        "`{}` at {:?}",
        project.kind(target)?,
        project.range(target)?
    );

    if project.specifier_kind(target).is_ok() {
        project.remove_specifier(target)?;
    } else {
        match project.remove_list_element(target) {
            Ok(_) => {}
            Err(MorphError::Edit(EditError::SoleListElement { .. })) => {
                project.remove_node(target)?;
            }
            Err(err) => return Err(err.into()),
        }
    }
    println!("{} {}", "Removed".green().bold(), description);

    finish(&project, &before, output)?;
    Ok(())
}

fn removal_target(
    project: &mut Project,
    doc: DocumentId,
    offset: usize,
    kind: Option<&str>,
) -> Result<NodeId> {
    let mut node = project.deepest_node_at(doc, offset)?;
    if let Some(kind) = kind {
        if project.kind(node)? == kind {
            return Ok(node);
        }
        return project
            .first_ancestor_by_kind(node, kind)?
            .with_context(|| format!("no `{kind}` encloses offset {offset}"));
    }

    while !project.is_named(node)? {
        node = project
            .parent(node)?
            .with_context(|| format!("no named node at offset {offset}"))?;
    }
    Ok(node)
}

fn cmd_nodes(config: Option<PathBuf>, file: PathBuf, pattern: Option<&str>) -> Result<()> {
    let (mut project, doc) = open_project(config, &file)?;

    if let Some(pattern) = pattern {
        let matches = project.find_by_pattern(doc, pattern)?;
        if matches.is_empty() {
            println!("{}", format!("No matches for {pattern}").yellow());
        }
        for node in matches {
            print_node(&project, node, 0)?;
        }
        return Ok(());
    }

    let root = project.root(doc)?;
    let mut stack = vec![(root, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        print_node(&project, node, depth)?;
        let children = project.named_children(node)?;
        stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
    }
    Ok(())
}

fn print_node(project: &Project, node: NodeId, depth: usize) -> Result<()> {
    let range = project.range(node)?;
    let text = project.text(node)?;
    let first_line = text.lines().next().unwrap_or("");
    let preview: String = first_line.chars().take(60).collect();
    let field = project
        .field_name(node)?
        .map(|field| format!("{field}: "))
        .unwrap_or_default();

    println!(
        "{}{}{} {} {}",
        "  ".repeat(depth),
        field.dimmed(),
        project.kind(node)?.bold(),
        format!("{}..{}", range.start, range.end).cyan(),
        preview.dimmed()
    );
    Ok(())
}
