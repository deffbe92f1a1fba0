//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责分批调度、回退和阶段编排，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用
//! - 管理应用生命周期（初始化、运行）
//! - 加载输入，按阶段列表执行
//! - 输出报告和全局统计信息
//!
//! ### `pipeline` - 阶段列表
//! - 运行前根据开关一次性确定阶段
//!
//! ### `coordinator` - 回退协调器
//! - 每个阶段选择批量或逐条
//! - 批次失败 → 逐条 → 备用通道 → 失败条目
//! - 阶段超时
//!
//! ### `batch_dispatcher` - 批量分发器
//! - 分组、每组一次调用、原子失败
//!
//! ### `retry_policy` - 回退策略
//! - 每个阶段的有序策略列表
//!
//! ## 层次关系
//!
//! ```text
//! app (处理整次运行)
//!     ↓
//! coordinator (处理 Vec<WorkItem>)
//!     ↓                      ↓
//! batch_dispatcher      workflow::ItemFlow (处理单条)
//!     ↓                      ↓
//! services (能力层：prompts / parser / analyzer / summarizer / report)
//!     ↓
//! infrastructure (基础设施：CallGate / RateLimiter)
//! ```

pub mod app;
pub mod batch_dispatcher;
pub mod coordinator;
pub mod pipeline;
pub mod retry_policy;

// 重新导出主要类型
pub use app::App;
pub use batch_dispatcher::BatchDispatcher;
pub use coordinator::FallbackCoordinator;
pub use pipeline::{Pipeline, PipelineStage};
pub use retry_policy::RetryPolicy;
