//! 单个条目在一个阶段内的状态机
//!
//! ```text
//! Pending → Dispatched(batch|single)
//! Dispatched(batch)     → Succeeded | RetryingSingle
//! RetryingSingle        → Dispatched(single)
//! Dispatched(single)    → Succeeded | RetryingSecondary
//! RetryingSecondary     → Dispatched(secondary)
//! Dispatched(secondary) → Succeeded | Failed
//! ```
//!
//! 任何非终态都可以因阶段超时直接进入 `Failed`。

use std::fmt;

use crate::models::outcome::Strategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Dispatched(Strategy),
    RetryingSingle,
    RetryingSecondary,
    Succeeded,
    Failed,
}

impl ItemState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemState::Succeeded | ItemState::Failed)
    }

    /// 失败后的下一个状态：进入下一个策略的重试，或者终止
    pub fn retrying(next: Option<Strategy>) -> ItemState {
        match next {
            Some(Strategy::Single) => ItemState::RetryingSingle,
            Some(Strategy::Secondary) => ItemState::RetryingSecondary,
            Some(Strategy::Batch) | None => ItemState::Failed,
        }
    }

    pub fn can_transition_to(&self, next: ItemState) -> bool {
        use ItemState::*;

        if self.is_terminal() {
            return false;
        }

        match (*self, next) {
            (_, Failed) => true,
            (Pending, Dispatched(Strategy::Batch | Strategy::Single)) => true,
            (Dispatched(_), Succeeded) => true,
            (Dispatched(Strategy::Batch), RetryingSingle) => true,
            (Dispatched(Strategy::Single), RetryingSecondary) => true,
            (RetryingSingle, Dispatched(Strategy::Single)) => true,
            (RetryingSecondary, Dispatched(Strategy::Secondary)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemState::Pending => write!(f, "Pending"),
            ItemState::Dispatched(strategy) => write!(f, "Dispatched({})", strategy),
            ItemState::RetryingSingle => write!(f, "RetryingSingle"),
            ItemState::RetryingSecondary => write!(f, "RetryingSecondary"),
            ItemState::Succeeded => write!(f, "Succeeded"),
            ItemState::Failed => write!(f, "Failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_path_transitions() {
        let path = [
            ItemState::Pending,
            ItemState::Dispatched(Strategy::Batch),
            ItemState::RetryingSingle,
            ItemState::Dispatched(Strategy::Single),
            ItemState::RetryingSecondary,
            ItemState::Dispatched(Strategy::Secondary),
            ItemState::Failed,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} 应该合法",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!ItemState::Pending.can_transition_to(ItemState::Dispatched(Strategy::Secondary)));
        assert!(!ItemState::Dispatched(Strategy::Single).can_transition_to(ItemState::RetryingSingle));
        assert!(!ItemState::Dispatched(Strategy::Batch).can_transition_to(ItemState::RetryingSecondary));
        assert!(!ItemState::Succeeded.can_transition_to(ItemState::Failed));
        assert!(!ItemState::Failed.can_transition_to(ItemState::Dispatched(Strategy::Single)));
    }

    #[test]
    fn test_retrying_after_failure() {
        assert_eq!(
            ItemState::retrying(Some(Strategy::Single)),
            ItemState::RetryingSingle
        );
        assert_eq!(
            ItemState::retrying(Some(Strategy::Secondary)),
            ItemState::RetryingSecondary
        );
        assert_eq!(ItemState::retrying(None), ItemState::Failed);
    }
}
