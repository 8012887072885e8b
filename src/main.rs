use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use furrow::cli::{annotate, daily, fewshot, history, review, separate, show, split, stats};
use furrow::config::{Config, Credentials};
use furrow::dataset::review::ReviewFilter;
use furrow::enrich::PassKind;
use furrow::store::RunLedger;

#[derive(Parser)]
#[command(name = "furrow")]
#[command(about = "Resumable enrichment of farmer chat-log exports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "furrow.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one enrichment pass over conversation files
    Annotate {
        /// Pass to run
        #[arg(value_enum)]
        pass: PassKind,

        /// Conversation file (repeatable)
        #[arg(short, long)]
        file: Vec<PathBuf>,

        /// Daily export to process (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Glob relative to the data root, e.g. "*_Nov_2025/conversations.json"
        #[arg(short, long)]
        glob: Option<String>,

        /// Clear this pass's fields and recompute
        #[arg(long)]
        redo: bool,

        /// Recompute only messages with an error marker
        #[arg(long, conflicts_with = "redo")]
        retry_errors: bool,

        /// Pause between backend calls, overriding config
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Include assistant turns
        #[arg(long)]
        all_roles: bool,
    },

    /// Run the configured daily passes over one day's export
    Daily {
        /// Day to process (default: yesterday, UTC)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Few-shot example management
    FewShot {
        #[command(subcommand)]
        command: FewShotCommands,
    },

    /// Review classifications and standalone questions
    Review {
        #[command(subcommand)]
        command: ReviewCommands,
    },

    /// Print a file's conversations, or one conversation with its enrichments
    Show {
        /// Conversation file
        file: PathBuf,

        /// Conversation index or key prefix
        conversation: Option<String>,

        /// Hide conversations whose user messages are all common
        #[arg(long)]
        hide_common: bool,
    },

    /// Split one export into per-day files
    Split {
        /// Export to split
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "conversations_by_date")]
        out: PathBuf,
    },

    /// Copy conversations with empty retrieval into a separate folder
    Separate {
        /// Glob relative to the data root
        #[arg(short, long, default_value = "**/conversations.json")]
        glob: String,

        /// Output directory
        #[arg(short, long, default_value = "non_retrieval")]
        out: PathBuf,
    },

    /// Show enrichment coverage per file
    Stats {
        /// Directory to scan (default: data root)
        root: Option<PathBuf>,
    },

    /// Show past annotation runs
    History {
        /// Run ID (prefix) to show in detail
        run: Option<String>,

        /// Filter by pass
        #[arg(short, long, value_enum)]
        pass: Option<PassKind>,
    },
}

#[derive(Subcommand)]
enum FewShotCommands {
    /// Rebuild the classifier examples from classified daily files
    Build {
        /// First day to include (default: from config)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day to include (default: two days ago)
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Output file (default: from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Append a corrected message to the standalone rephrasing examples
    AppendStandalone {
        /// Conversation file
        file: PathBuf,
        /// Conversation index or key prefix
        conversation: String,
        /// Message index within the conversation
        message: usize,
        /// Examples file (default: from config)
        #[arg(long)]
        examples: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ReviewCommands {
    /// List user messages by classification
    List {
        /// Conversation file
        file: PathBuf,
        #[arg(short, long, value_enum, default_value = "uncommon")]
        filter: ReviewFilter,
    },
    /// Set a human label on a user message
    Tag {
        file: PathBuf,
        /// Conversation index or key prefix
        conversation: String,
        message: usize,
        /// Label as uncommon instead of common
        #[arg(long)]
        uncommon: bool,
    },
    /// Store a corrected standalone question for a user message
    Correct {
        file: PathBuf,
        /// Conversation index or key prefix
        conversation: String,
        message: usize,
        text: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load config
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Annotate {
            pass,
            file,
            date,
            glob,
            redo,
            retry_errors,
            delay_ms,
            all_roles,
        } => {
            let ledger = RunLedger::open(&config.ledger_path())?;
            let credentials = Credentials::from_env(&config);
            let target = annotate::Target { files: file, date, glob };
            let flags = annotate::Flags {
                redo,
                retry_errors,
                delay_ms,
                all_roles,
            };
            annotate::run(&config, &credentials, &ledger, pass, &target, &flags)?;
        }
        Commands::Daily { date } => {
            let ledger = RunLedger::open(&config.ledger_path())?;
            let credentials = Credentials::from_env(&config);
            daily::run(&config, &credentials, &ledger, date)?;
        }
        Commands::FewShot { command } => match command {
            FewShotCommands::Build { start, end, output } => {
                fewshot::build(&config, start, end, output)?;
            }
            FewShotCommands::AppendStandalone {
                file,
                conversation,
                message,
                examples,
            } => {
                let ledger = RunLedger::open(&config.ledger_path())?;
                fewshot::append_standalone(
                    &config,
                    &ledger,
                    &file,
                    &conversation,
                    message,
                    examples,
                )?;
            }
        },
        Commands::Review { command } => match command {
            ReviewCommands::List { file, filter } => {
                review::list(&file, filter)?;
            }
            ReviewCommands::Tag {
                file,
                conversation,
                message,
                uncommon,
            } => {
                let ledger = RunLedger::open(&config.ledger_path())?;
                review::tag(&ledger, &file, &conversation, message, !uncommon)?;
            }
            ReviewCommands::Correct {
                file,
                conversation,
                message,
                text,
            } => {
                let ledger = RunLedger::open(&config.ledger_path())?;
                review::correct(&ledger, &file, &conversation, message, &text)?;
            }
        },
        Commands::Show {
            file,
            conversation,
            hide_common,
        } => {
            show::run(&file, conversation.as_deref(), hide_common)?;
        }
        Commands::Split { input, out } => {
            split::run(&input, &out)?;
        }
        Commands::Separate { glob, out } => {
            separate::run(&config, &glob, &out)?;
        }
        Commands::Stats { root } => {
            stats::run(&config, root)?;
        }
        Commands::History { run, pass } => {
            let ledger = RunLedger::open(&config.ledger_path())?;
            history::run(&ledger, pass, run.as_deref())?;
        }
    }

    Ok(())
}
