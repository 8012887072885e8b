pub mod annotate;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod enrich;
pub mod error;
pub mod model;
pub mod store;

pub use annotate::{AnnotateOptions, Annotator, RunSummary};
pub use config::{Config, Credentials};
pub use enrich::{build_enricher, Enricher, Outcome, PassKind};
pub use model::{Conversation, Message};
pub use store::RunLedger;
