//! 回退策略
//!
//! 每个阶段一个有序的策略列表，失败后进入下一个策略：
//!
//! ```text
//! 批量开启:  Batch → Single → Secondary
//! 批量关闭:  Single → Secondary
//! ```
//!
//! 每个条目最多两次回退，最坏情况下的调用量有上界。

use crate::config::StageConfig;
use crate::models::Strategy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    steps: Vec<Strategy>,
    batch_size: usize,
}

impl RetryPolicy {
    /// 根据阶段配置生成策略列表（阶段开始时调用一次）
    pub fn for_stage(stage: &StageConfig) -> Self {
        let mut steps = Vec::with_capacity(3);
        if stage.batching_enabled {
            steps.push(Strategy::Batch);
        }
        steps.push(Strategy::Single);
        steps.push(Strategy::Secondary);

        Self {
            steps,
            batch_size: stage.batch_size,
        }
    }

    pub fn steps(&self) -> &[Strategy] {
        &self.steps
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 第一步是否为批量
    pub fn starts_with_batch(&self) -> bool {
        self.steps.first() == Some(&Strategy::Batch)
    }

    /// 批量之后的逐条策略
    pub fn per_item_steps(&self) -> &[Strategy] {
        if self.starts_with_batch() {
            &self.steps[1..]
        } else {
            &self.steps
        }
    }

    /// `current` 失败之后的下一个策略
    pub fn next_after(&self, current: Strategy) -> Option<Strategy> {
        let index = self.steps.iter().position(|s| *s == current)?;
        self.steps.get(index + 1).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batching_policy() {
        let policy = RetryPolicy::for_stage(&StageConfig {
            batching_enabled: true,
            batch_size: 5,
            max_items: 10,
        });

        assert_eq!(
            policy.steps(),
            &[Strategy::Batch, Strategy::Single, Strategy::Secondary]
        );
        assert_eq!(policy.per_item_steps(), &[Strategy::Single, Strategy::Secondary]);
        assert_eq!(policy.next_after(Strategy::Batch), Some(Strategy::Single));
        assert_eq!(policy.next_after(Strategy::Secondary), None);
        assert_eq!(policy.batch_size(), 5);
    }

    #[test]
    fn test_single_policy() {
        let policy = RetryPolicy::for_stage(&StageConfig::default());
        assert!(!policy.starts_with_batch());
        assert_eq!(policy.per_item_steps(), &[Strategy::Single, Strategy::Secondary]);
    }
}
