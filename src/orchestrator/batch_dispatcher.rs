//! 批量分发器 - 编排层
//!
//! ## 职责
//!
//! 把一串条目切成连续的分组，每组只发一次外部调用，再把结构化响应拆回每个条目。
//!
//! ## 保证
//!
//! - N 个条目、批大小 B：恰好 `ceil(N/B)` 次调用，不多不少，不丢条目
//! - 输出与输入一一对应，顺序一致（包括并发在途的情况）
//! - 分组原子失败：解析失败、数量不符、传输失败时，组内每个条目都标记失败，
//!   绝不会只返回其中一部分成功

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{CallError, ConfigError, ParseError};
use crate::infrastructure::CallGate;
use crate::models::{CallResult, FailureReason};

/// 批量分发器
pub struct BatchDispatcher {
    gate: Arc<CallGate>,
    max_in_flight: usize,
    deadline: Option<Instant>,
}

impl BatchDispatcher {
    /// # 参数
    /// - `gate`: 调用闸门（所有调用都经过同一个限流器）
    /// - `max_in_flight`: 同时在途的分组数，1 表示顺序执行
    pub fn new(gate: Arc<CallGate>, max_in_flight: usize) -> Self {
        Self {
            gate,
            max_in_flight: max_in_flight.max(1),
            deadline: None,
        }
    }

    /// 设置阶段截止时间：之后开始的分组直接以 `Timeout` 失败，在途分组被取消
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// 分发
    ///
    /// # 参数
    /// - `items`: 条目
    /// - `batch_size`: 每组最多条目数
    /// - `encode`: 把一组条目编码成一次调用的提示词
    /// - `parse`: 把响应解析成组内每个条目的负载
    ///
    /// # 返回
    /// 每个条目一个 `CallResult`，顺序与 `items` 一致
    pub async fn dispatch<T, P, E, F>(
        &self,
        items: &[T],
        batch_size: usize,
        encode: E,
        parse: F,
    ) -> Result<Vec<CallResult<P>>, ConfigError>
    where
        E: Fn(&[T]) -> String,
        F: Fn(&str, &[T]) -> Result<Vec<P>, ParseError>,
    {
        if batch_size == 0 {
            return Err(ConfigError::invalid_batch_size("dispatch"));
        }

        let total_groups = items.len().div_ceil(batch_size);
        debug!(
            "分发 {} 个条目，批大小 {}，共 {} 组，最多 {} 组并发",
            items.len(),
            batch_size,
            total_groups,
            self.max_in_flight
        );

        let (encode, parse) = (&encode, &parse);
        let results: Vec<Vec<CallResult<P>>> = stream::iter(items.chunks(batch_size).enumerate())
            .map(move |(index, group)| {
                self.dispatch_group(index + 1, total_groups, group, encode, parse)
            })
            .buffered(self.max_in_flight)
            .collect()
            .await;

        Ok(results.into_iter().flatten().collect())
    }

    async fn dispatch_group<T, P, E, F>(
        &self,
        group_num: usize,
        total_groups: usize,
        group: &[T],
        encode: &E,
        parse: &F,
    ) -> Vec<CallResult<P>>
    where
        E: Fn(&[T]) -> String,
        F: Fn(&str, &[T]) -> Result<Vec<P>, ParseError>,
    {
        let fail_all = |reason: FailureReason| -> Vec<CallResult<P>> {
            group.iter().map(|_| CallResult::Failure(reason)).collect()
        };

        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            warn!("⏰ 第 {}/{} 组未开始，阶段已超时", group_num, total_groups);
            return fail_all(FailureReason::Timeout);
        }

        let prompt = encode(group);
        let call = self.gate.call(&prompt);
        let response = match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, call)
                .await
                .unwrap_or(Err(CallError::Timeout { secs: 0.0 })),
            None => call.await,
        };

        let raw = match response {
            Ok(raw) => raw,
            Err(e) => {
                warn!("⚠️ 第 {}/{} 组调用失败: {}", group_num, total_groups, e);
                return fail_all(e.reason());
            }
        };

        match parse(&raw, group) {
            Ok(payloads) if payloads.len() == group.len() => {
                info!(
                    "✓ 第 {}/{} 组完成 ({} 条)",
                    group_num,
                    total_groups,
                    group.len()
                );
                payloads.into_iter().map(CallResult::Success).collect()
            }
            Ok(payloads) => {
                warn!(
                    "⚠️ 第 {}/{} 组响应数量不符: 期望 {}，实际 {}",
                    group_num,
                    total_groups,
                    group.len(),
                    payloads.len()
                );
                fail_all(FailureReason::MalformedResponse)
            }
            Err(e) => {
                warn!("⚠️ 第 {}/{} 组响应无法解析: {}", group_num, total_groups, e);
                fail_all(FailureReason::MalformedResponse)
            }
        }
    }
}
