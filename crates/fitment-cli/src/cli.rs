use clap::{Parser, Subcommand};
use fitment_engine::config::DEFAULT_CONFIG_FILE;

#[derive(Parser)]
#[command(
    name = "fitment",
    about = "Fitment: validate part selections against a catalog of needers and providers",
    version
)]
pub struct Cli {
    /// Engine config file (TOML); the default file may be absent
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Log search decisions to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Queue selections on a new session, validate once, and print the results
    Validate {
        /// Catalog name (a directory under the configured model path)
        #[arg(long)]
        catalog: Option<String>,

        /// Selection as OBJECT=QTY (QTY defaults to 1); repeatable
        #[arg(long = "select", value_name = "OBJECT=QTY")]
        selections: Vec<String>,

        /// Saved session to restore selections from (relative to the save path)
        #[arg(long)]
        input: Option<String>,

        /// Save the queued selections before validating (relative to the save path)
        #[arg(long)]
        save: Option<String>,

        /// Omit the per-provider listing
        #[arg(long)]
        skip_providers: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize a catalog: selectable objects, their children, and rules
    Inspect {
        /// Catalog name (a directory under the configured model path)
        #[arg(long)]
        catalog: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
