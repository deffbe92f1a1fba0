//! 限流器 - 基础设施层
//!
//! 唯一持有 RateWindow（最近一次调用时间 + 60 秒滑动窗口内的调用记录），
//! 只暴露 `acquire()` 能力：阻塞到可以安全发起下一次外部调用，然后登记这次调用。
//!
//! 并发调用 `acquire()` 时，窗口的读-改-写在 `tokio::sync::Mutex` 内完成，
//! 锁一直持有到等待结束并登记完毕，所以准入严格按调用顺序（FIFO）串行。

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::config::Config;

/// 滑动窗口长度
pub const WINDOW: Duration = Duration::from_secs(60);

/// 限流参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitSettings {
    /// 是否启用（关闭时只登记，不等待）
    pub enabled: bool,
    /// 每 60 秒最多调用次数
    pub requests_per_minute: u32,
    /// 相邻两次调用的最小间隔
    pub min_interval: Duration,
    /// 是否以 info 级别记录等待
    pub log_waits: bool,
}

impl RateLimitSettings {
    pub fn new(requests_per_minute: u32, min_interval: Duration) -> Self {
        Self {
            enabled: true,
            requests_per_minute,
            min_interval,
            log_waits: true,
        }
    }

    /// LLM 调用使用的限流参数
    pub fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.rate_limiting_enabled,
            requests_per_minute: config.rate_limit_rpm,
            min_interval: config.min_request_interval(),
            log_waits: config.log_rate_limit_waits,
        }
    }
}

/// 限流器统计
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterStats {
    pub requests_per_minute_limit: u32,
    pub min_interval: Duration,
    pub requests_in_last_minute: usize,
    pub total_requests: u64,
    pub time_since_last_request: Option<Duration>,
    pub wait_for_next_request: Duration,
}

impl RateLimiterStats {
    pub fn can_proceed_immediately(&self) -> bool {
        self.wait_for_next_request.is_zero()
    }
}

#[derive(Debug, Default)]
struct RateWindow {
    last_call: Option<Instant>,
    recent: VecDeque<Instant>,
    total: u64,
}

impl RateWindow {
    fn evict(&mut self, now: Instant) {
        while let Some(oldest) = self.recent.front() {
            if now.saturating_duration_since(*oldest) >= WINDOW {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }

    fn wait_time(&mut self, now: Instant, settings: &RateLimitSettings) -> Duration {
        self.evict(now);

        let wait_interval = self
            .last_call
            .map(|last| {
                settings
                    .min_interval
                    .saturating_sub(now.saturating_duration_since(last))
            })
            .unwrap_or(Duration::ZERO);

        let wait_rpm = if self.recent.len() >= settings.requests_per_minute as usize {
            self.recent
                .front()
                .map(|oldest| WINDOW.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(Duration::ZERO)
        } else {
            Duration::ZERO
        };

        wait_interval.max(wait_rpm)
    }

    fn record(&mut self, now: Instant) {
        self.evict(now);
        self.recent.push_back(now);
        self.last_call = Some(now);
        self.total += 1;
    }
}

/// 限流器
///
/// 职责：
/// - 保证相邻两次调用间隔不小于 `min_interval`
/// - 保证任意 60 秒窗口内调用次数不超过上限
/// - 只会延迟，不会拒绝
pub struct RateLimiter {
    settings: RateLimitSettings,
    window: Mutex<RateWindow>,
}

impl RateLimiter {
    /// 创建新的限流器
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            settings,
            window: Mutex::new(RateWindow::default()),
        }
    }

    /// 不做任何限制，只统计调用次数
    pub fn unlimited() -> Self {
        Self::new(RateLimitSettings {
            enabled: false,
            requests_per_minute: u32::MAX,
            min_interval: Duration::ZERO,
            log_waits: false,
        })
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    /// 获取调用许可
    ///
    /// 必要时等待，然后登记本次调用。返回实际等待的时长。
    pub async fn acquire(&self) -> Duration {
        let mut window = self.window.lock().await;
        let mut waited = Duration::ZERO;

        if self.settings.enabled {
            loop {
                let wait = window.wait_time(Instant::now(), &self.settings);
                if wait.is_zero() {
                    break;
                }
                if self.settings.log_waits {
                    info!("⏳ 触发限流，等待 {:.2} 秒...", wait.as_secs_f64());
                } else {
                    debug!("触发限流，等待 {:.2} 秒", wait.as_secs_f64());
                }
                sleep(wait).await;
                waited += wait;
            }
        }

        window.record(Instant::now());
        waited
    }

    /// 当前统计信息
    pub async fn stats(&self) -> RateLimiterStats {
        let mut window = self.window.lock().await;
        let now = Instant::now();
        let wait = if self.settings.enabled {
            window.wait_time(now, &self.settings)
        } else {
            Duration::ZERO
        };

        RateLimiterStats {
            requests_per_minute_limit: self.settings.requests_per_minute,
            min_interval: self.settings.min_interval,
            requests_in_last_minute: window.recent.len(),
            total_requests: window.total,
            time_since_last_request: window
                .last_call
                .map(|last| now.saturating_duration_since(last)),
            wait_for_next_request: wait,
        }
    }

    /// 清空窗口
    pub async fn reset(&self) {
        let mut window = self.window.lock().await;
        *window = RateWindow::default();
        debug!("🔄 限流器已重置");
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rpm", &self.settings.requests_per_minute)
            .field("min_interval", &self.settings.min_interval)
            .field("enabled", &self.settings.enabled)
            .finish()
    }
}
