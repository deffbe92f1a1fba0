//! 回退协调器 - 编排层
//!
//! ## 职责
//!
//! 对一个阶段（details / analysis）：
//! 1. 阶段开始时校验并读取配置（阶段内不再读取）
//! 2. 按配置选择批量或逐条
//! 3. 批次失败 → 组内逐条重试 → 备用通道 → 带失败原因的条目
//! 4. 阶段超时后，未完成的条目以 `Timeout` 失败
//!
//! ## 保证
//!
//! - 每个输入条目恰好产出一个 `EnrichedItem`，顺序与输入一致
//! - 条目级失败不会变成 `Err`；只有配置错误会在任何调用之前返回

use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::clients::SecondarySource;
use crate::config::{Config, StageConfig};
use crate::error::ConfigError;
use crate::infrastructure::CallGate;
use crate::models::{CallResult, EnrichedItem, ItemState, Strategy, WorkItem};
use crate::orchestrator::batch_dispatcher::BatchDispatcher;
use crate::orchestrator::retry_policy::RetryPolicy;
use crate::services::SecondaryAnalyzer;
use crate::utils::logging;
use crate::workflow::item_flow::{transition, ItemFlow};
use crate::workflow::{AnalysisTask, DetailsTask, StageInput, StageTask};

/// 回退协调器
///
/// 备用能力在构造时注入；能力缺失时注入空实现（`NoSecondarySource` / `NoSecondaryAnalyzer`）。
pub struct FallbackCoordinator {
    gate: Arc<CallGate>,
    config: Config,
    secondary_source: Arc<dyn SecondarySource>,
    secondary_analyzer: Arc<dyn SecondaryAnalyzer>,
}

impl FallbackCoordinator {
    pub fn new(
        gate: Arc<CallGate>,
        config: Config,
        secondary_source: Arc<dyn SecondarySource>,
        secondary_analyzer: Arc<dyn SecondaryAnalyzer>,
    ) -> Self {
        Self {
            gate,
            config,
            secondary_source,
            secondary_analyzer,
        }
    }

    pub fn gate(&self) -> &Arc<CallGate> {
        &self.gate
    }

    /// 获取专利详情
    pub async fn fetch_details(&self, refs: &[WorkItem]) -> Result<Vec<EnrichedItem>, ConfigError> {
        let stage = self.stage_config("details", self.config.details_stage())?;
        let task = DetailsTask::new(self.secondary_source.clone());
        let inputs = refs.iter().cloned().map(StageInput::new).collect();
        self.run_stage(&task, &stage, inputs).await
    }

    /// 相关性分析
    ///
    /// # 参数
    /// - `context`: 发明描述
    /// - `refs`: 已带详情（或详情获取失败）的条目
    pub async fn analyze(
        &self,
        context: &str,
        refs: &[EnrichedItem],
    ) -> Result<Vec<EnrichedItem>, ConfigError> {
        let stage = self.stage_config("analysis", self.config.analysis_stage())?;
        let task = AnalysisTask::new(context, self.secondary_analyzer.clone());
        let inputs = refs.iter().map(StageInput::from_enriched).collect();
        self.run_stage(&task, &stage, inputs).await
    }

    fn stage_config(&self, name: &str, stage: StageConfig) -> Result<StageConfig, ConfigError> {
        self.config.validate()?;
        stage.validate(name)?;
        Ok(stage)
    }

    async fn run_stage<T: StageTask>(
        &self,
        task: &T,
        stage: &StageConfig,
        inputs: Vec<StageInput>,
    ) -> Result<Vec<EnrichedItem>, ConfigError> {
        let policy = RetryPolicy::for_stage(stage);
        let deadline = self.config.stage_timeout().map(|timeout| Instant::now() + timeout);
        let calls_before = self.gate.calls_made();
        let total = inputs.len();

        logging::log_stage_start(task.name(), total, policy.steps());

        let flow = ItemFlow::new(&self.gate, task, deadline);
        let mut outputs = Vec::with_capacity(total);

        if policy.starts_with_batch() {
            let dispatcher = BatchDispatcher::new(self.gate.clone(), self.config.max_concurrent_batches)
                .with_deadline(deadline);
            let results = dispatcher
                .dispatch(
                    &inputs,
                    policy.batch_size(),
                    |group| task.batch_prompt(group),
                    |raw, group| task.parse_batch(raw, group),
                )
                .await?;

            let fallback = policy.next_after(Strategy::Batch);
            for (input, result) in inputs.into_iter().zip(results) {
                let mut state = ItemState::Pending;
                transition(&input.item.patent_number, &mut state, ItemState::Dispatched(Strategy::Batch));

                match result {
                    CallResult::Success(payload) => {
                        transition(&input.item.patent_number, &mut state, ItemState::Succeeded);
                        outputs.push(task.finish(input, Ok((payload, Strategy::Batch))));
                    }
                    CallResult::Failure(reason) => {
                        debug!(
                            "[{}] {} 批次失败 ({})，回退到 {:?}",
                            task.name(),
                            input.item.patent_number,
                            reason,
                            fallback
                        );
                        outputs.push(flow.run(input, policy.per_item_steps(), Some(reason)).await);
                    }
                }
            }
        } else {
            for input in inputs {
                outputs.push(flow.run(input, policy.steps(), None).await);
            }
        }

        let calls = self.gate.calls_made() - calls_before;
        logging::log_stage_complete(task.name(), &outputs, calls);
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            info!("⏰ [{}] 阶段已到达截止时间", task.name());
        }

        Ok(outputs)
    }
}
