pub mod item_flow;
pub mod stage_task;

pub use item_flow::ItemFlow;
pub use stage_task::{AnalysisTask, DetailsTask, StageInput, StageTask};
