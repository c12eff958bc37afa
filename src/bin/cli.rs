//! Cogmap CLI - mind map building, layout and export from the terminal
//!
//! Usage: cogmap-cli [OPTIONS] <COMMAND>
//!
//! File commands (build, flatten, csv, layout, export) work offline on a
//! node list or map document. The rest go through the local store and the
//! configured text generator; `config` reads and edits the settings file.
//! Supports JSON output for scripting.

use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use cogmap_lib::ai_client::{self, generator_from_settings, GenerateOptions, GenerateRequest, InputType};
use cogmap_lib::db::{Database, DetailLevel, MindMap};
use cogmap_lib::export::{export_map, rows_to_csv, ExportFormat};
use cogmap_lib::hierarchy::{build_hierarchy_with_report, MAX_DEPTH};
use cogmap_lib::layout::Orientation;
use cogmap_lib::settings::{default_config_path, Settings, CONFIG_KEYS};
use cogmap_lib::utils::setup_logging;
use cogmap_lib::{flatten, layout, CogmapError, MindMapService, TreeNode};
use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "cogmap-cli")]
#[command(version, about = "Cogmap mind map CLI", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Database path (default: settings, then COGMAP_DB, then app data dir)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Settings file (default: app data dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// User whose maps are read and written
    #[arg(long, short, global = true)]
    user: Option<String>,

    /// Output as JSON for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Suppress progress output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Detailed logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the tree from a node list and print it
    Build {
        /// JSON node list or map document ("-" for stdin)
        file: String,
    },
    /// Print the pre-order rows of the tree
    Flatten {
        file: String,
    },
    /// Write the flattened tree as CSV
    Csv {
        file: String,
        /// Output file (default: stdout)
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Compute node coordinates and links
    Layout {
        file: String,
        /// Grow the tree downwards instead of to the right
        #[arg(long)]
        vertical: bool,
    },
    /// Encode a map document as json, csv or svg
    Export {
        file: String,
        #[arg(long, short, default_value = "json")]
        format: String,
        /// Output file (default: stdout)
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Generate and save a map with the configured AI backend
    Generate {
        /// Text to map
        #[arg(long, conflicts_with_all = ["file", "pdf", "transcript"])]
        text: Option<String>,
        /// Plain-text file to map
        #[arg(long, conflicts_with_all = ["pdf", "transcript"])]
        file: Option<PathBuf>,
        /// PDF to extract and map
        #[arg(long, conflicts_with = "transcript")]
        pdf: Option<PathBuf>,
        /// Voice transcript file to map
        #[arg(long)]
        transcript: Option<PathBuf>,
        /// detailed | simplest
        #[arg(long, default_value = "detailed")]
        detail: String,
    },
    /// Explain one node of a saved map
    Summarize {
        map_id: String,
        node_id: String,
        /// detailed | simplest
        #[arg(long, default_value = "detailed")]
        detail: String,
    },
    /// Show a node's note, or replace it when CONTENT is given
    Note {
        map_id: String,
        node_id: String,
        content: Option<String>,
    },
    /// Ask a question answered from the map's source text
    Chat {
        map_id: String,
        question: String,
    },
    /// List saved maps
    List,
    /// Print a saved map as a tree
    Show {
        map_id: String,
    },
    /// Delete a saved map with its notes and summaries
    Delete {
        map_id: String,
    },
    /// Copy the database to DEST while it stays usable
    Backup {
        dest: PathBuf,
    },
    /// Show or change settings
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show all settings
    List,
    /// Show one setting
    Get {
        /// anthropic-api-key, llm-backend, anthropic-model, ollama-url,
        /// ollama-model, db-path, bind-addr or default-user
        key: String,
    },
    /// Change a setting in the settings file
    Set {
        key: String,
        value: String,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    setup_logging(filter);

    if let Err(e) = run_cli(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_cli(cli: Cli) -> Result<(), String> {
    let mut settings = Settings::resolve(cli.config.as_deref());
    if let Some(db) = &cli.db {
        settings.db_path = Some(db.clone());
    }
    let user = cli.user.clone().unwrap_or_else(|| settings.default_user.clone());
    let json = cli.json;
    let quiet = cli.quiet;

    match cli.command {
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "cogmap-cli", &mut std::io::stdout());
            Ok(())
        }
        Commands::Config { cmd } => handle_config(cmd, cli.config.as_deref(), &settings, json),
        Commands::Build { file } => handle_build(&file, json),
        Commands::Flatten { file } => handle_flatten(&file, json),
        Commands::Csv { file, out } => handle_csv(&file, out.as_deref(), quiet),
        Commands::Layout { file, vertical } => handle_layout(&file, vertical, &settings, json),
        Commands::Export { file, format, out } => {
            handle_export(&file, &format, out.as_deref(), &settings, quiet)
        }
        Commands::Backup { dest } => handle_backup(&settings, &dest, json),
        Commands::Generate { text, file, pdf, transcript, detail } => {
            let detail_level = parse_detail(&detail)?;
            let service = open_service(&settings, cli.verbose)?;
            handle_generate(&service, &user, text, file, pdf, transcript, detail_level, json, quiet).await
        }
        Commands::Summarize { map_id, node_id, detail } => {
            let detail_level = parse_detail(&detail)?;
            let service = open_service(&settings, cli.verbose)?;
            let summary = service
                .summarize(&user, &map_id, &node_id, detail_level)
                .await
                .map_err(err_string)?;
            if json {
                return print_json(&summary);
            }
            println!("TL;DR: {}\n", summary.tl_dr);
            println!("{}\n", summary.detailed);
            println!("Analogy: {}", summary.analogy);
            if let Some(url) = summary.image_url() {
                println!("Image: {}", url);
            }
            if let Some(excerpt) = summary.context_excerpt() {
                println!("\nSource: {}", excerpt);
            }
            if !quiet {
                eprintln!("summary schema v{}", summary.schema_version());
            }
            Ok(())
        }
        Commands::Note { map_id, node_id, content } => {
            let service = open_service(&settings, cli.verbose)?;
            let note = match content {
                Some(content) => service.save_note(&user, &map_id, &node_id, &content),
                None => service.note(&user, &map_id, &node_id),
            }
            .map_err(err_string)?;
            if json {
                return print_json(&note);
            }
            println!("{}", note.content);
            if !quiet {
                eprintln!("updated {}", note.updated_at);
            }
            Ok(())
        }
        Commands::Chat { map_id, question } => {
            let service = open_service(&settings, cli.verbose)?;
            let answer = service.chat(&user, &map_id, &question).await.map_err(err_string)?;
            if json {
                print_json(&serde_json::json!({ "answer": answer }))
            } else {
                println!("{}", answer);
                Ok(())
            }
        }
        Commands::List => {
            let maps = open_service(&settings, cli.verbose)?.list(&user).map_err(err_string)?;
            if json {
                return print_json(&maps);
            }
            for map in &maps {
                println!("{}  {}  ({} nodes, {})", map.map_id, map.title, map.node_count, map.created_at);
            }
            if !quiet {
                eprintln!("{} maps", maps.len());
            }
            Ok(())
        }
        Commands::Show { map_id } => {
            let loaded = open_service(&settings, cli.verbose)?.load(&user, &map_id).map_err(err_string)?;
            if json {
                return print_json(&loaded);
            }
            println!("# {}", loaded.map.title);
            print!("{}", render_tree(&loaded.root));
            Ok(())
        }
        Commands::Delete { map_id } => {
            open_service(&settings, cli.verbose)?.delete(&user, &map_id).map_err(err_string)?;
            if json {
                print_json(&serde_json::json!({ "deleted": map_id }))
            } else {
                println!("Deleted {}", map_id);
                Ok(())
            }
        }
    }
}

fn open_service(settings: &Settings, verbose: bool) -> Result<MindMapService, String> {
    let db_path = settings.db_path();
    if verbose {
        eprintln!("[verbose] Using database: {:?}", db_path);
    }
    let db = Arc::new(Database::new(&db_path).map_err(|e| format!("Failed to open database: {}", e))?);
    Ok(MindMapService::new(db, generator_from_settings(settings), settings.layout))
}

// ============================================================================
// Config Commands
// ============================================================================

/// `list` and `get` show the effective settings (file plus environment);
/// `set` edits the settings file only.
fn handle_config(cmd: ConfigCommands, config: Option<&Path>, settings: &Settings, json: bool) -> Result<(), String> {
    match cmd {
        ConfigCommands::List => {
            let values = CONFIG_KEYS
                .iter()
                .map(|key| settings.get_value(key).map(|value| (*key, value)))
                .collect::<Result<Vec<_>, String>>()?;
            if json {
                let object: serde_json::Map<String, serde_json::Value> =
                    values.into_iter().map(|(key, value)| (key.to_string(), value.into())).collect();
                return print_json(&object);
            }
            for (key, value) in &values {
                println!("{:<19}{}", format!("{}:", key), value);
            }
        }
        ConfigCommands::Get { key } => {
            let value = settings.get_value(&key)?;
            if json {
                return print_json(&serde_json::json!({ key: value }));
            }
            println!("{}", value);
        }
        ConfigCommands::Set { key, value } => {
            let path = config.map(Path::to_path_buf).unwrap_or_else(default_config_path);
            let mut stored = Settings::load(&path);
            stored.set_value(&key, &value)?;
            stored.save(&path)?;
            let shown = stored.get_value(&key)?;
            if json {
                return print_json(&serde_json::json!({ key: shown }));
            }
            println!("Set {} = {}", key, shown);
        }
    }
    Ok(())
}

// ============================================================================
// File commands
// ============================================================================

/// Read a node list or map document from `path` ("-" is stdin). Fenced or
/// chatty model output is accepted too.
fn load_map_file(path: &str) -> Result<MindMap, String> {
    let text = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("Failed to read stdin: {}", e))?;
        buf
    } else {
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path, e))?
    };
    ai_client::parse_generated_map(&text, Utc::now()).map_err(|e| format!("{}: {}", path, e))
}

fn build_tree(map: &MindMap) -> Result<TreeNode, String> {
    let build = build_hierarchy_with_report(&map.nodes);
    for issue in &build.report.issues {
        tracing::warn!(node = %issue.id, reason = ?issue.reason, "Node dropped or repaired");
    }
    build.root.ok_or_else(|| CogmapError::Unbuildable.to_string())
}

fn handle_build(file: &str, json: bool) -> Result<(), String> {
    let map = load_map_file(file)?;
    let build = build_hierarchy_with_report(&map.nodes);
    let root = build.root.ok_or_else(|| CogmapError::Unbuildable.to_string())?;

    if json {
        // The nested JSON is written recursively
        let depth = root.depth();
        if depth > MAX_DEPTH {
            return Err(CogmapError::TooDeep { depth, limit: MAX_DEPTH }.to_string());
        }
        return print_json(&serde_json::json!({ "root": root, "report": build.report }));
    }
    print!("{}", render_tree(&root));
    let report = &build.report;
    eprintln!("{} of {} accepted nodes reachable", report.reachable, report.accepted);
    for issue in &report.issues {
        eprintln!("  {:?}: {}", issue.reason, issue.id);
    }
    Ok(())
}

fn handle_flatten(file: &str, json: bool) -> Result<(), String> {
    let root = build_tree(&load_map_file(file)?)?;
    let rows = flatten(&root);
    if json {
        return print_json(&rows);
    }
    for row in &rows {
        println!(
            "{}\t{}\t{}\t{}",
            row.level,
            row.id,
            row.label,
            row.parent_id.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn handle_csv(file: &str, out: Option<&Path>, quiet: bool) -> Result<(), String> {
    let root = build_tree(&load_map_file(file)?)?;
    write_output(&rows_to_csv(&flatten(&root)), out, quiet)
}

fn handle_layout(file: &str, vertical: bool, settings: &Settings, json: bool) -> Result<(), String> {
    let root = build_tree(&load_map_file(file)?)?;
    let mut config = settings.layout;
    if vertical {
        config.orientation = Orientation::Vertical;
    }
    let tree = layout(&root, &config);
    if json {
        return print_json(&tree);
    }
    for node in &tree.nodes {
        println!("{:>9.1} {:>9.1}  {}{}", node.x, node.y, "  ".repeat(node.depth), node.label);
    }
    eprintln!("{:.0} x {:.0}", tree.width, tree.height);
    Ok(())
}

fn handle_export(
    file: &str,
    format: &str,
    out: Option<&Path>,
    settings: &Settings,
    quiet: bool,
) -> Result<(), String> {
    let format = ExportFormat::from_str(format)
        .ok_or_else(|| format!("Unknown export format '{}' (json, csv, svg)", format))?;
    let map = load_map_file(file)?;
    let exported = export_map(&map, format, &settings.layout).map_err(err_string)?;
    write_output(&exported.body, out, quiet)
}

fn handle_backup(settings: &Settings, dest: &Path, json: bool) -> Result<(), String> {
    let db = Database::new(settings.db_path()).map_err(|e| format!("Failed to open database: {}", e))?;
    db.backup_to(&dest.to_string_lossy()).map_err(err_string)?;
    if json {
        print_json(&serde_json::json!({ "source": db.get_path(), "backup": dest }))
    } else {
        println!("Backed up {} to {}", db.get_path(), dest.display());
        Ok(())
    }
}

// ============================================================================
// Generation
// ============================================================================

#[allow(clippy::too_many_arguments)]
async fn handle_generate(
    service: &MindMapService,
    user: &str,
    text: Option<String>,
    file: Option<PathBuf>,
    pdf: Option<PathBuf>,
    transcript: Option<PathBuf>,
    detail_level: DetailLevel,
    json: bool,
    quiet: bool,
) -> Result<(), String> {
    if !quiet {
        eprintln!("Generating with {}...", service.generator_name());
    }

    let loaded = if let Some(path) = pdf {
        let bytes = std::fs::read(&path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        service.generate_from_pdf(user, &bytes, detail_level).await
    } else {
        let (input_type, payload) = match (text, file, transcript) {
            (Some(text), _, _) => (InputType::Text, text),
            (None, Some(path), _) => (InputType::File, read_text(&path)?),
            (None, None, Some(path)) => (InputType::Audio, read_text(&path)?),
            (None, None, None) => return Err("Nothing to map: pass --text, --file, --pdf or --transcript".to_string()),
        };
        let request = GenerateRequest {
            input_type,
            payload,
            options: GenerateOptions { detail_level },
        };
        service.generate(user, request).await
    }
    .map_err(err_string)?;

    if json {
        return print_json(&loaded);
    }
    println!("# {} ({})", loaded.map.title, loaded.map.map_id);
    print!("{}", render_tree(&loaded.root));
    if !quiet && !loaded.report.is_clean() {
        eprintln!("{} nodes were dropped or re-parented", loaded.report.issues.len());
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Indented outline, two spaces per level
fn render_tree(root: &TreeNode) -> String {
    let mut out = String::new();
    for row in flatten(root) {
        out.push_str(&"  ".repeat(row.level));
        out.push_str(&row.label);
        out.push_str(&format!(" [{}]\n", row.id));
    }
    out
}

fn parse_detail(raw: &str) -> Result<DetailLevel, String> {
    DetailLevel::from_str(raw).ok_or_else(|| format!("Unknown detail level '{}' (detailed, simplest)", raw))
}

fn read_text(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

fn write_output(body: &str, out: Option<&Path>, quiet: bool) -> Result<(), String> {
    match out {
        Some(path) => {
            std::fs::write(path, body).map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
            if !quiet {
                eprintln!("Wrote {}", path.display());
            }
        }
        None => print!("{}", body),
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| format!("Failed to encode JSON: {}", e))?;
    println!("{}", text);
    Ok(())
}

fn err_string(e: CogmapError) -> String {
    e.to_string()
}
