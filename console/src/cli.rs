use camino::Utf8PathBuf as PathBuf;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(version, about = "Browse and edit the asset hierarchy", long_about = None)]
pub struct Cli {
    #[arg(short, long, default_value = "arbor.toml")]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

/// Asset paths are labels joined with `/`, e.g. `Plant/Line A/Pump`.
/// An empty path or `/` is the top level.
#[derive(Debug, Subcommand)]
pub enum Command {
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    Register {
        name: String,
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        role: String,
    },
    Logout,
    Whoami,
    /// Print the tree, expanding `depth` levels lazily or everything at once
    /// with `--full`.
    Tree {
        #[arg(long, default_value_t = 1)]
        depth: usize,
        #[arg(long)]
        full: bool,
    },
    Add {
        parent: String,
        name: String,
    },
    Rename {
        path: String,
        name: String,
    },
    Mv {
        path: String,
        new_parent: String,
    },
    /// Move by asset id, without looking the asset up in the tree.
    MoveId {
        id: i64,
        /// Omit for the top level.
        new_parent: Option<i64>,
    },
    Rm {
        path: String,
        #[arg(short, long)]
        yes: bool,
    },
    Deleted,
    Restore {
        id: i64,
    },
    Combinations,
    Average {
        column: String,
    },
    /// Follow live updates until interrupted.
    Watch {
        /// Columns whose averages are shown.
        #[arg(long = "column")]
        columns: Vec<String>,
    },
}
