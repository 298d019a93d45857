use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "sumdex",
    about = "sumdex: catalog files by content digest and find them across hosts",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (default: <config dir>/sumdex/sumdex.toml, then ./sumdex.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log at info level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log at debug level
    #[arg(long, global = true)]
    pub debug: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Local catalog database
    #[arg(long, global = true, env = "SUMDEX_CATALOG", value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Central store database
    #[arg(long = "central-db", global = true, env = "SUMDEX_CENTRAL", value_name = "PATH")]
    pub central_db: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan directory trees into the local catalog
    Scan(ScanArgs),
    /// Look up records by digest prefix
    Digest(LookupArgs),
    /// Look up records by path prefix
    Path(LookupArgs),
    /// Look up records with the same content as the given files
    Find(FindArgs),
    /// Register, sync and list namespaces in the central store
    Namespace(NamespaceArgs),
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Key files by absolute path instead of path relative to the root
    #[arg(short = 'A', long)]
    pub abs_mode: bool,
    #[arg(required = true, value_name = "ROOT")]
    pub roots: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LookupArgs {
    /// Query the central store instead of the local catalog
    #[arg(short = 'C', long)]
    pub central: bool,
    #[arg(required = true, value_name = "PREFIX")]
    pub prefixes: Vec<String>,
}

#[derive(Args, Debug)]
pub struct FindArgs {
    /// Query the central store instead of the local catalog
    #[arg(short = 'C', long)]
    pub central: bool,
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct NamespaceArgs {
    #[command(subcommand)]
    pub action: NamespaceAction,
}

#[derive(Subcommand, Debug)]
pub enum NamespaceAction {
    /// Fetch a remote catalog, register it under NAME and merge it
    Register { name: String, locator: String },
    /// Fetch and merge registered namespaces
    Sync {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// List registered namespaces
    List,
}
