/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fmt::Display;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::infrastructure::RateLimiterStats;
use crate::models::{EnrichedItem, ItemStatus, Strategy};
use crate::services::Report;

/// 初始化日志
///
/// `RUST_LOG` 优先；否则 verbose 时为 debug，默认 info。重复调用不会报错。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `config`: 配置
/// - `pipeline`: 已解析的阶段列表
pub fn log_startup(config: &Config, pipeline: &impl Display) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 专利补全与相关性分析");
    if let Some(preset) = &config.preset {
        info!("🎛️ 预设: {}", preset);
    }
    info!("📋 阶段: {}", pipeline);
    if config.rate_limiting_enabled {
        info!(
            "⏱️ 限流: 每分钟 {} 次，最小间隔 {:.1} 秒",
            config.rate_limit_rpm, config.min_request_interval_secs
        );
    } else {
        info!("⏱️ 限流: 关闭");
    }
    info!(
        "📦 批量: details {} / analysis {}",
        on_off(config.details_stage().batching_enabled),
        on_off(config.analysis_stage().batching_enabled)
    );
    info!("{}", "=".repeat(60));
}

/// 记录输入加载信息
pub fn log_references_loaded(total: usize, invention_name: &str) {
    info!("💡 发明: {}", invention_name);
    info!("✓ 找到 {} 个待处理的专利引用\n", total);
}

/// 记录阶段开始信息
///
/// # 参数
/// - `stage`: 阶段名
/// - `total`: 条目数
/// - `steps`: 本阶段的策略列表
pub fn log_stage_start(stage: &str, total: usize, steps: &[Strategy]) {
    let chain = steps
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" → ");
    info!("\n{}", "=".repeat(60));
    info!("📦 开始阶段 [{}]: {} 个条目", stage, total);
    info!("🔁 回退链: {}", chain);
    info!("{}", "=".repeat(60));
}

/// 记录阶段完成信息
pub fn log_stage_complete(stage: &str, items: &[EnrichedItem], calls: u64) {
    let count = |status: ItemStatus| items.iter().filter(|i| i.status == status).count();
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 阶段 [{}] 完成: 成功 {}/{}，部分 {}，失败 {}，外部调用 {} 次",
        stage,
        count(ItemStatus::Complete),
        items.len(),
        count(ItemStatus::PartialFetchOnly),
        count(ItemStatus::Failed),
        calls
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `report`: 已写入的报告
/// - `limiter`: 限流器统计
/// - `output_path`: 报告路径
pub fn print_final_stats(report: &Report, limiter: &RateLimiterStats, output_path: &Path) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("📄 专利引用: {}", report.metadata.references_found);
    info!("📑 获取详情: {}", report.metadata.details_fetched);
    info!("🔬 完成分析: {}", report.metadata.analyzed);
    for stage in &report.stages {
        info!(
            "  [{}] 成功 {} / 部分 {} / 失败 {} (调用 {} 次)",
            stage.stage, stage.complete, stage.partial, stage.failed, stage.external_calls
        );
    }
    info!(
        "📡 外部调用: {} 次（最近一分钟 {} 次，上限 {}）",
        limiter.total_requests, limiter.requests_in_last_minute, limiter.requests_per_minute_limit
    );
    info!("{}", "=".repeat(60));
    info!("\n报告已保存至: {}", output_path.display());
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "开"
    } else {
        "关"
    }
}
