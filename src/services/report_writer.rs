//! 报告写入服务 - 业务能力层
//!
//! 只负责把结果写成 JSON 报告，不关心流程

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{EnrichedItem, Invention, ItemStatus, WorkItem};

/// 单个阶段的统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageStats {
    pub stage: String,
    pub items: usize,
    pub complete: usize,
    pub partial: usize,
    pub failed: usize,
    pub external_calls: u64,
}

impl StageStats {
    /// 只统计本阶段实际处理过的条目
    pub fn from_items<'a>(
        stage: impl Into<String>,
        items: impl IntoIterator<Item = &'a EnrichedItem>,
        external_calls: u64,
    ) -> Self {
        let mut stats = Self {
            stage: stage.into(),
            items: 0,
            complete: 0,
            partial: 0,
            failed: 0,
            external_calls,
        };
        for item in items.into_iter().filter(|item| item.was_attempted()) {
            stats.items += 1;
            match item.status {
                ItemStatus::Complete => stats.complete += 1,
                ItemStatus::PartialFetchOnly => stats.partial += 1,
                ItemStatus::Failed => stats.failed += 1,
                ItemStatus::NotAttempted => {}
            }
        }
        stats
    }
}

/// 运行参数摘要
#[derive(Debug, Clone, Serialize)]
pub struct SearchMetadata {
    pub references_found: usize,
    pub details_fetched: usize,
    pub analyzed: usize,
    pub batching_enabled: bool,
    pub summarization_enabled: bool,
    pub detailed_analysis_enabled: bool,
    pub rate_limit_rpm: u32,
    pub external_calls: u64,
}

/// 完整报告
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: String,
    pub invention: Invention,
    pub metadata: SearchMetadata,
    pub references: Vec<WorkItem>,
    pub results: Vec<EnrichedItem>,
    pub stages: Vec<StageStats>,
}

/// 报告写入服务
///
/// 职责：
/// - 生成时间戳
/// - 创建输出目录
/// - 写入格式化的 JSON
pub struct ReportWriter {
    output_path: PathBuf,
}

impl ReportWriter {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// 当前本地时间，报告使用的时间格式
    pub fn timestamp() -> String {
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub async fn write(&self, report: &Report) -> AppResult<()> {
        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(report)?;
        tokio::fs::write(&self.output_path, json).await.map_err(|e| {
            AppError::other(format!("无法写入报告 {}: {}", self.output_path.display(), e))
        })?;

        info!("💾 报告已保存: {}", self.output_path.display());
        Ok(())
    }
}
