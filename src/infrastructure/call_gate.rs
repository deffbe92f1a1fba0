//! 调用闸门 - 基础设施层
//!
//! 持有限流器和外部调用客户端，只暴露 `call()` 能力。
//! 所有 LLM 调用都必须经过这里：先 `acquire()`，再在超时限制内 `invoke()`。

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::CallError;
use crate::infrastructure::rate_limiter::RateLimiter;

/// 外部调用接口：发送提示词（或批量编码），返回文本响应
#[async_trait]
pub trait ExternalCall: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String, CallError>;
}

/// 调用闸门
///
/// 职责：
/// - 每次调用前获取限流许可
/// - 给每次调用加超时
/// - 统计实际发出的调用次数
/// - 不认识专利，也不解析响应
pub struct CallGate {
    limiter: Arc<RateLimiter>,
    caller: Arc<dyn ExternalCall>,
    call_timeout: Duration,
    calls: AtomicU64,
}

impl CallGate {
    pub fn new(limiter: Arc<RateLimiter>, caller: Arc<dyn ExternalCall>, call_timeout: Duration) -> Self {
        Self {
            limiter,
            caller,
            call_timeout,
            calls: AtomicU64::new(0),
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// 已发出的外部调用次数
    pub fn calls_made(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// 发起一次受限流、有超时的外部调用
    pub async fn call(&self, prompt: &str) -> Result<String, CallError> {
        self.limiter.acquire().await;
        let seq = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("外部调用 #{}，提示词长度: {} 字符", seq, prompt.len());

        match tokio::time::timeout(self.call_timeout, self.caller.invoke(prompt)).await {
            Ok(result) => {
                if let Err(e) = &result {
                    warn!("外部调用 #{} 失败: {}", seq, e);
                }
                result
            }
            Err(_) => {
                warn!(
                    "外部调用 #{} 超时 ({:.1} 秒)",
                    seq,
                    self.call_timeout.as_secs_f64()
                );
                Err(CallError::Timeout {
                    secs: self.call_timeout.as_secs_f64(),
                })
            }
        }
    }
}
