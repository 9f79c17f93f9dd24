// Write-side use cases

pub mod analysis_commands;
pub mod case_commands;
pub mod ingest_commands;
pub mod training_commands;

pub use analysis_commands::*;
pub use case_commands::*;
pub use ingest_commands::*;
pub use training_commands::*;
