use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use regex::RegexBuilder;
use std::path::PathBuf;
use tracing::info;

mod activity;
mod cleanup;
mod error;
mod id_gen;
mod node;
mod ops;
mod profile;
mod render;
mod session;
mod settings;
mod store;
mod tree;
mod undo;
mod validator;

use node::Node;
use ops::{DropPosition, NodeEdit};
use session::Session;
use store::JsonFileStore;

#[derive(Parser)]
#[command(name = "bookmark-manager-pro")]
#[command(about = "Hierarchical bookmark manager with profiles and undo", long_about = None)]
#[command(version)]
struct Cli {
    /// Store file (default: $HOME/.bookmark-manager-pro.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the folder tree
    Tree {
        /// Folder to start from (default: start folder)
        #[arg(short, long)]
        folder: Option<String>,

        /// Maximum depth below the start folder
        #[arg(short, long)]
        depth: Option<usize>,
    },

    /// Create a folder
    AddFolder {
        title: String,

        /// Parent folder id (default: start folder)
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Create a bookmark
    AddBookmark {
        title: String,
        url: String,

        /// Parent folder id (default: start folder)
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Change a node's title, url or colors
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        url: Option<String>,

        /// Text color, e.g. "#ff0000"
        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        background: Option<String>,
    },

    /// Move a node (with its subtree) to the end of a folder
    Mv { id: String, target: String },

    /// Copy a node (with its subtree) into a folder under new ids
    Cp { id: String, target: String },

    /// Drop a node before or after a sibling, or into a folder
    Reorder {
        id: String,

        /// before, after or into
        #[arg(short, long)]
        position: String,

        /// Drop target
        target: String,
    },

    /// Delete a node and its subtree
    Rm { id: String },

    /// Undo a log entry (default: newest undoable)
    Undo { entry: Option<String> },

    /// Redo a log entry (default: newest redoable)
    Redo { entry: Option<String> },

    /// Show the undo log
    History,

    /// Show recent activity
    Activity {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Search titles and urls with a regular expression
    Search {
        pattern: String,

        /// Case-sensitive match
        #[arg(long)]
        case_sensitive: bool,
    },

    /// Check tree integrity
    Validate {
        /// Show every violation
        #[arg(short, long)]
        detailed: bool,
    },

    /// Report duplicate urls and empty folders
    Analyze,

    /// Import a JSON export (a list of nodes) under fresh ids
    Import {
        file: PathBuf,

        /// Target folder (default: start folder)
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Manage profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Show or change profile settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    List,
    Create { name: String },
    Switch { name: String },
    Rename { name: String, new_name: String },
    Remove { name: String },
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    /// Set one value by its camelCase key, e.g. maxUndoEntries
    Set { key: String, value: String },
}

fn parse_position(position: &str) -> Result<DropPosition> {
    match position.to_lowercase().as_str() {
        "before" => Ok(DropPosition::Before),
        "after" => Ok(DropPosition::After),
        "into" => Ok(DropPosition::Into),
        _ => bail!("❌ Invalid position: {}. Use 'before', 'after' or 'into'", position),
    }
}

fn describe(forest: &[Node], id: &str) -> String {
    tree::path_of(forest, id).unwrap_or_else(|| id.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let path = match cli.store {
        Some(path) => path,
        None => JsonFileStore::default_path()?,
    };
    let store = JsonFileStore::new(path);
    info!("📂 Using store {:?}", store.path());
    let mut session = Session::open(store).await?;

    match cli.command {
        Commands::Tree { folder, depth } => {
            if let Some(folder) = folder {
                session.open_folder(&folder)?;
            }
            let node = tree::require_folder(session.forest(), session.current_folder_id())?;
            print!("{}", render::render_tree(node, depth));
        }

        Commands::AddFolder { title, parent } => {
            let id = session.create_folder(parent.as_deref(), &title).await?;
            println!("✅ Created folder '{}' (id: {})", title, id);
        }

        Commands::AddBookmark { title, url, parent } => {
            let id = session.create_bookmark(parent.as_deref(), &title, &url).await?;
            println!("✅ Created bookmark '{}' (id: {})", title, id);
        }

        Commands::Edit { id, title, url, color, background } => {
            let mut edit = NodeEdit { title, url, style: None };
            if color.is_some() || background.is_some() {
                let node = tree::find_node(session.forest(), &id)
                    .with_context(|| format!("❌ Node '{}' not found", id))?;
                let mut style = node.style.clone();
                if let Some(color) = color {
                    style.set_color(&color);
                }
                if let Some(background) = background {
                    style.set_background_color(&background);
                }
                edit.style = Some(style);
            }
            session.edit(&id, edit).await?;
            println!("✅ Updated {}", describe(session.forest(), &id));
        }

        Commands::Mv { id, target } => {
            session.cut_to_clipboard(&id)?;
            session.paste(Some(&target)).await?;
            println!("✅ Moved to {}", describe(session.forest(), &id));
        }

        Commands::Cp { id, target } => {
            session.copy_to_clipboard(&id)?;
            let new_id = session.paste(Some(&target)).await?;
            println!("✅ Copied to {} (id: {})", describe(session.forest(), &new_id), new_id);
        }

        Commands::Reorder { id, position, target } => {
            let position = parse_position(&position)?;
            let (parent, _) = ops::locate(session.forest(), &target)
                .with_context(|| format!("❌ Drop target '{}' not found", target))?;
            let moved = session.move_item(&parent, position, &id, &target).await?;
            println!(
                "✅ {} is now at index {} of {}",
                id,
                moved.new_index,
                describe(session.forest(), &moved.new_parent_id)
            );
        }

        Commands::Rm { id } => {
            let entry = session.delete(&id).await?;
            println!("🗑️  Deleted {} (undo: {})", id, entry);
        }

        Commands::Undo { entry } => {
            let entry = session.undo(entry.as_deref()).await?;
            println!("↩️  Undid {} of '{}' ({})", entry.kind.name(), entry.item.title, entry.id);
        }

        Commands::Redo { entry } => {
            let entry = session.redo(entry.as_deref()).await?;
            println!("↪️  Redid {} of '{}' ({})", entry.kind.name(), entry.item.title, entry.id);
        }

        Commands::History => {
            let log = &session.profile().user_undo_log;
            if log.is_empty() {
                println!("📭 Nothing to undo");
            }
            for entry in log.entries.iter().rev() {
                let state = match (entry.can_undo(), entry.can_redo()) {
                    (true, _) => "undoable",
                    (false, true) => "redoable",
                    (false, false) => "spent",
                };
                println!(
                    "{} {:<10} {:<9} '{}' [{}]",
                    entry.id,
                    entry.kind.name(),
                    state,
                    entry.item.title,
                    entry.item.id
                );
            }
        }

        Commands::Activity { limit } => {
            for activity in session.profile().user_activity_log.recent(limit) {
                let when = chrono::DateTime::from_timestamp_millis(activity.timestamp)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!("{} {:<9} {}", when, activity.action, activity.payload);
            }
        }

        Commands::Search { pattern, case_sensitive } => {
            let regex = RegexBuilder::new(&pattern)
                .case_insensitive(!case_sensitive)
                .build()
                .with_context(|| format!("❌ Invalid pattern: {}", pattern))?;
            let hits = tree::search(session.forest(), &regex);
            info!("🔍 {} match(es) for /{}/", hits.len(), pattern);
            for node in hits {
                match &node.url {
                    Some(url) => println!("🔖 {} [{}] {}", describe(session.forest(), &node.id), node.id, url),
                    None => println!("📁 {} [{}]", describe(session.forest(), &node.id), node.id),
                }
            }
        }

        Commands::Validate { detailed } => {
            info!("🔍 Validating bookmarks...");
            let report = validator::check_forest(session.forest());
            println!("{}", report.format(detailed));
            if !report.is_ok() {
                bail!("❌ {} integrity violation(s) found", report.violations.len());
            }
        }

        Commands::Analyze => {
            let report = cleanup::detect_anomalies(session.forest());
            println!("{}", report.format());
        }

        Commands::Import { file, target } => {
            info!("📥 Importing bookmarks from: {:?}", file);
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {:?}", file))?;
            let nodes: Vec<Node> =
                serde_json::from_str(&content).with_context(|| format!("{:?} is not a bookmark export", file))?;
            let ids = session.import(nodes, target.as_deref()).await?;
            println!("✅ Imported {} top-level node(s): {}", ids.len(), ids.join(", "));
        }

        Commands::Profile { action } => match action {
            ProfileAction::List => {
                let active = session.profile().user_id.clone();
                for summary in session.profiles().list().await? {
                    let marker = if summary.user_id == active { "*" } else { " " };
                    println!("{} {} ({})", marker, summary.name, summary.user_id);
                }
            }
            ProfileAction::Create { name } => {
                let profile = session.profiles().create(&name).await?;
                println!("✅ Created profile '{}' (id: {})", profile.name, profile.user_id);
            }
            ProfileAction::Switch { name } => {
                session.switch_profile(&name).await?;
                println!("🔀 Active profile: {}", session.profile().name);
            }
            ProfileAction::Rename { name, new_name } => {
                session.profiles().rename(&name, &new_name).await?;
                println!("✅ Renamed profile '{}' to '{}'", name, new_name);
            }
            ProfileAction::Remove { name } => {
                session.profiles().remove(&name).await?;
                println!("🗑️  Removed profile '{}'", name);
            }
        },

        Commands::Settings { action } => match action {
            SettingsAction::Show => {
                println!("{}", session.profile().main_user_settings.description());
            }
            SettingsAction::Set { key, value } => {
                session.update_setting(&key, &value).await?;
                println!("✅ {} = {}", key, value);
            }
        },
    }

    Ok(())
}
