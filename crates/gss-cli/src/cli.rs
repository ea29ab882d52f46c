use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gss")]
#[command(about = "GSS stylesheet compiler", version)]
pub struct Cli {
    /// Log every pass (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile stylesheets to CSS or to a host expression
    Build {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// JSON compile configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report runtime-conditional misuse as warnings
        #[arg(long)]
        lenient: bool,

        /// Always print a host expression, even for plain CSS
        #[arg(long)]
        expression: bool,
    },

    /// List the permutation axes and boolean conditions the stylesheets use
    Conditions {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}
