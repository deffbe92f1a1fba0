pub mod loaders;
pub mod outcome;
pub mod patent;
pub mod state;

pub use loaders::{load_search_input, prepare_references};
pub use outcome::{CallResult, EnrichedItem, FailureReason, ItemStatus, Strategy};
pub use patent::{
    normalize_patent_number, Classification, Invention, PatentDetails, RelevanceAnalysis,
    SearchInput, WorkItem,
};
pub use state::ItemState;
