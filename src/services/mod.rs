pub mod analysis;
pub mod excel;
pub mod heuristics;
pub mod orchestrator;
pub mod prompt_builder;
pub mod structurer;
pub mod summarizer;

pub use analysis::SheetAnalyzer;
pub use orchestrator::ProviderChain;
