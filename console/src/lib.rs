pub mod cli;
pub mod commands;
pub mod terminal;

pub use cli::{Cli, Command};
pub use commands::App;
