use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "briq")]
#[command(about = "Photo documentation for construction sites, offline first")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding the local entry store
    #[arg(long, global = true, env = "BRIQ_DATA_DIR", value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Local storage backend
    #[arg(long, global = true, value_enum, default_value_t = StoreKind::File)]
    pub store: StoreKind,

    /// CLI profile name for remote sync configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Document a new finding
    #[command(alias = "new")]
    Add(AddArgs),
    /// List entries, newest first
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Only show entries waiting for sync
        #[arg(long)]
        unsynced: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit the text of an entry
    Edit {
        /// Entry ID or unique ID prefix
        id: String,
        /// Replacement text (opens $EDITOR when omitted)
        #[arg(long)]
        text: Option<String>,
    },
    /// Delete an entry
    Delete {
        /// Entry ID or unique ID prefix
        id: String,
        /// Also delete entries that were never synchronized
        #[arg(long)]
        force: bool,
    },
    /// Push local changes and pull remote changes
    Sync,
    /// Export entries
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Rewrite a note professionally through the configured language model
    Rephrase {
        /// Note text (read from stdin when omitted)
        text: Vec<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Configure CLI sync profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct AddArgs {
    /// Note text
    pub text: Vec<String>,
    /// Photo file to embed
    #[arg(long, value_name = "PATH", conflicts_with = "photo_url")]
    pub photo: Option<PathBuf>,
    /// Already uploaded photo (URL or data URI)
    #[arg(long, value_name = "URL")]
    pub photo_url: Option<String>,
    /// Position as "<latitude>,<longitude>"
    #[arg(long, value_name = "LAT,LON", allow_hyphen_values = true)]
    pub coords: Option<String>,
    /// Site label such as building, floor or room
    #[arg(long, value_name = "LABEL")]
    pub location: Option<String>,
    /// When the finding was made (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_name = "WHEN")]
    pub timestamp: Option<String>,
    /// Tag the entry (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
    /// Reformulate the note before saving
    #[arg(long)]
    pub rephrase: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StoreKind {
    /// One JSON file per slot
    File,
    /// Single SQLite database
    Sqlite,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
    Kml,
}

impl From<ExportFormat> for briq_core::export::ExportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Self::Json,
            ExportFormat::Csv => Self::Csv,
            ExportFormat::Kml => Self::Kml,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// User access token sent instead of the anon key
        #[arg(long, value_name = "TOKEN")]
        access_token: Option<String>,
        /// Remote table name
        #[arg(long, value_name = "NAME")]
        table: Option<String>,
        /// Do not make this profile the active one
        #[arg(long)]
        no_activate: bool,
    },
    /// Show the resolved profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
