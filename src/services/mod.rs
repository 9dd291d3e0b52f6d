pub mod ingest;
pub use ingest::{Classification, CycleOutcome, IngestError, IngestService};

pub mod scheduler;
pub use scheduler::Scheduler;
