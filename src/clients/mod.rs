pub mod llm_client;
pub mod patent_page_client;
pub mod secondary;

pub use llm_client::LlmClient;
pub use patent_page_client::PatentPageClient;
pub use secondary::{NoSecondarySource, PageFields, SecondarySource};
