use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::patent::{PatentDetails, RelevanceAnalysis, WorkItem};

/// 单次外部调用失败的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    Timeout,
    MalformedResponse,
    TransportError,
    RateLimitDenied,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::Timeout => "超时",
            FailureReason::MalformedResponse => "响应格式错误",
            FailureReason::TransportError => "传输失败",
            FailureReason::RateLimitDenied => "被限流",
        };
        f.write_str(text)
    }
}

/// 一次外部调用尝试的结果
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult<T> {
    Success(T),
    Failure(FailureReason),
}

impl<T> CallResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, CallResult::Success(_))
    }
}

/// 条目最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    /// 本阶段负载已获取
    Complete,
    /// 只拿到了详情，分析失败
    PartialFetchOnly,
    /// 所有回退均失败
    Failed,
    /// 超出阶段条目上限，未发起任何尝试
    NotAttempted,
}

/// 获取负载的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// 多条合并为一次调用
    Batch,
    /// 单条调用主通道（LLM）
    Single,
    /// 单条调用备用通道（非 API 方式）
    Secondary,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Strategy::Batch => "批量",
            Strategy::Single => "单条",
            Strategy::Secondary => "备用通道",
        };
        f.write_str(text)
    }
}

/// 阶段输出：引用 + 已获取的负载 + 最终状态
///
/// 在该条目的所有尝试结束后创建，之后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedItem {
    pub item: WorkItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<PatentDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<RelevanceAnalysis>,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<Strategy>,
}

impl EnrichedItem {
    /// 成功获取详情
    pub fn with_details(item: WorkItem, details: PatentDetails, resolved_by: Strategy) -> Self {
        Self {
            item,
            details: Some(details),
            analysis: None,
            status: ItemStatus::Complete,
            failure: None,
            resolved_by: Some(resolved_by),
        }
    }

    /// 成功获取分析（详情原样带上）
    pub fn with_analysis(
        item: WorkItem,
        details: Option<PatentDetails>,
        analysis: RelevanceAnalysis,
        resolved_by: Strategy,
    ) -> Self {
        Self {
            item,
            details,
            analysis: Some(analysis),
            status: ItemStatus::Complete,
            failure: None,
            resolved_by: Some(resolved_by),
        }
    }

    /// 回退耗尽：保留已有数据，有详情时标记为 `PartialFetchOnly`
    pub fn exhausted(item: WorkItem, details: Option<PatentDetails>, reason: FailureReason) -> Self {
        let status = if details.is_some() {
            ItemStatus::PartialFetchOnly
        } else {
            ItemStatus::Failed
        };
        Self {
            item,
            details,
            analysis: None,
            status,
            failure: Some(reason),
            resolved_by: None,
        }
    }

    /// 超出上限的引用原样带出，不计入任何阶段
    pub fn not_attempted(item: WorkItem) -> Self {
        Self {
            item,
            details: None,
            analysis: None,
            status: ItemStatus::NotAttempted,
            failure: None,
            resolved_by: None,
        }
    }

    pub fn was_attempted(&self) -> bool {
        self.status != ItemStatus::NotAttempted
    }

    pub fn is_complete(&self) -> bool {
        self.status == ItemStatus::Complete
    }
}
