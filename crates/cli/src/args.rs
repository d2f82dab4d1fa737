//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Turn free-text notes into work-item drafts with Azure OpenAI.
///
/// Results are printed to stdout as JSON; logs go to stderr.
#[derive(Debug, Parser)]
#[command(name = "workdraft", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Judge whether notes are actionable enough to draft from.
    Gate(NotesInput),

    /// Generate a work-item draft from notes.
    Draft(DraftArgs),

    /// Send a one-line prompt to check connectivity and credentials.
    Ping {
        /// Prompt to send.
        #[arg(long, default_value = "Say hello in one sentence.")]
        prompt: String,
    },
}

#[derive(Debug, Args)]
pub struct NotesInput {
    /// File holding the notes; `-` reads stdin.
    #[arg(default_value = "-")]
    pub notes: PathBuf,
}

#[derive(Debug, Args)]
pub struct DraftArgs {
    #[command(flatten)]
    pub input: NotesInput,

    /// Work item type to draft (e.g. PBI, Bug, Task).
    #[arg(long = "type", default_value = "PBI")]
    pub work_item_type: String,

    /// Delivery process (e.g. Scrum, Agile).
    #[arg(long, default_value = "Scrum")]
    pub process: String,

    /// Extra context passed to the model alongside the notes.
    #[arg(long, conflicts_with = "context_file")]
    pub context: Option<String>,

    /// File holding extra context.
    #[arg(long)]
    pub context_file: Option<PathBuf>,

    /// Run the gate first and stop if the notes are not actionable.
    #[arg(long)]
    pub gated: bool,
}
