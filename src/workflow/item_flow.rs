//! 单条流程 - 流程层
//!
//! 核心职责：定义"一条专利"在一个阶段内的逐条回退流程
//!
//! 流程顺序：
//! 1. 单条主通道（LLM）
//! 2. 备用通道（页面抓取 / 本地分析），只尝试一次
//! 3. 兜底：生成带失败原因的条目，绝不丢弃

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::CallError;
use crate::infrastructure::CallGate;
use crate::models::{EnrichedItem, FailureReason, ItemState, Strategy};
use crate::workflow::stage_task::{StageInput, StageTask};

/// 单条流程
///
/// - 按给定的策略列表依次尝试，成功即停止
/// - 记录每一次状态迁移
/// - 每次尝试前检查阶段截止时间，进行中的尝试在截止时间被取消
/// - 不持有任何资源，只借用闸门和阶段任务
pub struct ItemFlow<'a, T: StageTask> {
    gate: &'a CallGate,
    task: &'a T,
    deadline: Option<Instant>,
}

impl<'a, T: StageTask> ItemFlow<'a, T> {
    pub fn new(gate: &'a CallGate, task: &'a T, deadline: Option<Instant>) -> Self {
        Self {
            gate,
            task,
            deadline,
        }
    }

    /// 运行逐条回退
    ///
    /// # 参数
    /// - `input`: 条目
    /// - `steps`: 逐条策略（Single / Secondary），按顺序尝试
    /// - `batch_failure`: 如果条目来自失败的批次，传入批次的失败原因
    pub async fn run(
        &self,
        input: StageInput,
        steps: &[Strategy],
        batch_failure: Option<FailureReason>,
    ) -> EnrichedItem {
        let number = input.item.patent_number.clone();
        let mut state = match batch_failure {
            Some(_) => ItemState::Dispatched(Strategy::Batch),
            None => ItemState::Pending,
        };
        let mut failure = batch_failure;

        for &strategy in steps {
            if self.deadline_passed() {
                return self.give_up(input, &mut state, FailureReason::Timeout);
            }

            if state != ItemState::Pending {
                transition(&number, &mut state, ItemState::retrying(Some(strategy)));
            }
            transition(&number, &mut state, ItemState::Dispatched(strategy));

            match self.attempt(strategy, &input).await {
                Ok(payload) => {
                    transition(&number, &mut state, ItemState::Succeeded);
                    if strategy != Strategy::Single || batch_failure.is_some() {
                        info!("[{}] ✓ {} 通过{}获取成功", self.task.name(), number, strategy);
                    }
                    return self.task.finish(input, Ok((payload, strategy)));
                }
                Err(CallError::Unavailable(message)) => {
                    // 能力缺失不覆盖之前真实的失败原因
                    debug!("[{}] {} {}", self.task.name(), number, message);
                    failure.get_or_insert(FailureReason::TransportError);
                }
                Err(CallError::Timeout { .. }) if self.deadline_passed() => {
                    return self.give_up(input, &mut state, FailureReason::Timeout);
                }
                Err(e) => {
                    warn!(
                        "[{}] ⚠️ {} {}尝试失败: {}",
                        self.task.name(),
                        number,
                        strategy,
                        e
                    );
                    failure = Some(e.reason());
                }
            }
        }

        let reason = failure.unwrap_or(FailureReason::TransportError);
        self.give_up(input, &mut state, reason)
    }

    /// 一次尝试；有截止时间时，超过截止时间的尝试被取消
    async fn attempt(&self, strategy: Strategy, input: &StageInput) -> Result<T::Payload, CallError> {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, self.invoke(strategy, input))
                .await
                .unwrap_or(Err(CallError::Timeout { secs: 0.0 })),
            None => self.invoke(strategy, input).await,
        }
    }

    async fn invoke(&self, strategy: Strategy, input: &StageInput) -> Result<T::Payload, CallError> {
        match strategy {
            Strategy::Single => {
                let raw = self.gate.call(&self.task.single_prompt(input)).await?;
                Ok(self.task.parse_single(&raw)?)
            }
            Strategy::Secondary => self.task.secondary(input).await,
            Strategy::Batch => Err(CallError::Unavailable(
                "批量策略不能用于单条流程".to_string(),
            )),
        }
    }

    fn give_up(&self, input: StageInput, state: &mut ItemState, reason: FailureReason) -> EnrichedItem {
        transition(&input.item.patent_number, state, ItemState::Failed);
        warn!(
            "[{}] ❌ {} 所有策略均失败: {}",
            self.task.name(),
            input.item.patent_number,
            reason
        );
        self.task.finish(input, Err(reason))
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// 状态迁移（非法迁移只记录，不中断流程）
pub fn transition(number: &str, state: &mut ItemState, next: ItemState) {
    if state.can_transition_to(next) {
        debug!("{}: {} → {}", number, state, next);
    } else {
        warn!("{}: 非预期的状态迁移 {} → {}", number, state, next);
    }
    *state = next;
}
