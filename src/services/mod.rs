pub mod analyzer;
pub mod prompts;
pub mod report_writer;
pub mod response_parser;
pub mod summarizer;

pub use analyzer::{NoSecondaryAnalyzer, SecondaryAnalyzer, TermOverlapAnalyzer};
pub use report_writer::{Report, ReportWriter, SearchMetadata, StageStats};
pub use response_parser::Keyed;
pub use summarizer::{LeadSentenceSummarizer, NoopSummarizer, Summarizer};
