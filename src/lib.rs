//! # Patent Enrich
//!
//! 对上游检索到的专利引用进行补全（详情）和相关性分析的 Rust 应用程序。
//! 外部调用昂贵且受限流，核心是限流、分批和回退编排。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（限流窗口），只暴露能力
//! - `RateLimiter` - 唯一的 RateWindow owner，提供 acquire() 能力
//! - `CallGate` - 所有 LLM 调用的唯一入口（限流 → 超时 → 计数）
//!
//! ### ② 业务能力层（Services / Clients）
//! - `clients/` - `LlmClient`（OpenAI 兼容）、`PatentPageClient`（备用通道）
//! - `services/` - 提示词、响应解析、摘要压缩、本地分析、报告写入
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一条专利"在一个阶段内的处理流程
//! - `StageTask` - 阶段差异（details / analysis）
//! - `ItemFlow` - 逐条回退（单条 → 备用通道 → 失败条目）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/coordinator` - 回退协调器，选择批量或逐条
//! - `orchestrator/batch_dispatcher` - 分组、每组一次调用
//! - `orchestrator/app` - 应用生命周期和阶段列表
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, StageConfig};
pub use error::{AppError, AppResult, CallError, ConfigError, ParseError};
pub use infrastructure::{CallGate, ExternalCall, RateLimitSettings, RateLimiter};
pub use models::{CallResult, EnrichedItem, FailureReason, ItemStatus, Strategy, WorkItem};
pub use orchestrator::{App, BatchDispatcher, FallbackCoordinator, Pipeline, PipelineStage};
pub use workflow::{ItemFlow, StageInput, StageTask};
