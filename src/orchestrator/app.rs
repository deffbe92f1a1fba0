//! 应用 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：校验配置、创建限流器、调用闸门、备用能力
//! 2. **加载输入**：发明描述 + 上游检索到的专利引用（去重、截断）
//! 3. **按阶段列表执行**：details → summarize → analysis
//! 4. **输出报告**：写入 JSON 报告并打印统计
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一创建限流器和外部客户端的模块
//! - **向下委托**：阶段内的调度和回退交给 `FallbackCoordinator`

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::clients::{LlmClient, NoSecondarySource, PatentPageClient, SecondarySource};
use crate::config::Config;
use crate::infrastructure::{CallGate, RateLimitSettings, RateLimiter};
use crate::models::{load_search_input, prepare_references, EnrichedItem, Invention, WorkItem};
use crate::orchestrator::coordinator::FallbackCoordinator;
use crate::orchestrator::pipeline::{Pipeline, PipelineStage};
use crate::services::{
    LeadSentenceSummarizer, NoSecondaryAnalyzer, NoopSummarizer, Report, ReportWriter,
    SearchMetadata, SecondaryAnalyzer, StageStats, Summarizer, TermOverlapAnalyzer,
};
use crate::utils::logging;

/// 应用主结构
pub struct App {
    config: Config,
    pipeline: Pipeline,
    coordinator: FallbackCoordinator,
    summarizer: Arc<dyn Summarizer>,
    writer: ReportWriter,
}

impl App {
    /// 初始化应用（真实的 LLM 客户端和页面客户端）
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate().context("配置无效")?;

        let limiter = Arc::new(RateLimiter::new(RateLimitSettings::from_config(&config)));
        let llm = LlmClient::new(&config);
        info!("🤖 LLM 模型: {}", llm.model_name());
        let gate = Arc::new(CallGate::new(limiter, Arc::new(llm), config.call_timeout()));

        let source: Arc<dyn SecondarySource> = if config.secondary_fetch_enabled {
            Arc::new(PatentPageClient::new(&config)?)
        } else {
            Arc::new(NoSecondarySource)
        };

        Self::with_components(config, gate, source)
    }

    /// 使用外部提供的调用闸门和备用通道创建应用
    pub fn with_components(
        config: Config,
        gate: Arc<CallGate>,
        source: Arc<dyn SecondarySource>,
    ) -> Result<Self> {
        config.validate().context("配置无效")?;

        let analyzer: Arc<dyn SecondaryAnalyzer> = if config.secondary_analysis_enabled {
            Arc::new(TermOverlapAnalyzer)
        } else {
            Arc::new(NoSecondaryAnalyzer)
        };
        let summarizer: Arc<dyn Summarizer> = if config.summarization_enabled {
            Arc::new(LeadSentenceSummarizer::new(
                config.max_abstract_sentences,
                config.max_claim_sentences,
            ))
        } else {
            Arc::new(NoopSummarizer)
        };

        let pipeline = Pipeline::resolve(&config);
        let writer = ReportWriter::new(&config.output_file);
        let coordinator = FallbackCoordinator::new(gate, config.clone(), source, analyzer);

        logging::log_startup(&config, &pipeline);

        Ok(Self {
            config,
            pipeline,
            coordinator,
            summarizer,
            writer,
        })
    }

    /// 运行应用主逻辑，返回写入的报告
    pub async fn run(&self) -> Result<Report> {
        let input = load_search_input(Path::new(&self.config.input_file))
            .await
            .context("加载输入失败")?;

        let references = prepare_references(
            input.patents,
            self.config.max_patents_to_fetch,
            &self.config.patents_base_url,
        );
        logging::log_references_loaded(references.len(), &input.invention.invention_name);

        let (results, stages) = self.run_pipeline(&input.invention, &references).await?;
        let report = self.build_report(input.invention, references, results, stages);

        self.writer.write(&report).await.context("写入报告失败")?;

        let limiter_stats = self.coordinator.gate().limiter().stats().await;
        logging::print_final_stats(&report, &limiter_stats, self.writer.output_path());

        Ok(report)
    }

    /// 按阶段列表执行
    async fn run_pipeline(
        &self,
        invention: &Invention,
        references: &[WorkItem],
    ) -> Result<(Vec<EnrichedItem>, Vec<StageStats>)> {
        let mut results: Vec<EnrichedItem> = Vec::new();
        let mut stages = Vec::new();

        if self.pipeline.is_empty() {
            info!("💡 详细分析未开启，只输出引用列表");
        }

        for stage in self.pipeline.stages() {
            let calls_before = self.coordinator.gate().calls_made();

            let processed = match stage {
                PipelineStage::FetchDetails => {
                    // 超出上限的引用原样带出，保证每条引用都有输出
                    let cap = self.config.details_stage().max_items.min(references.len());
                    results = self.coordinator.fetch_details(&references[..cap]).await?;
                    let processed = results.len();
                    results.extend(
                        references[cap..]
                            .iter()
                            .cloned()
                            .map(EnrichedItem::not_attempted),
                    );
                    results[..processed].to_vec()
                }
                PipelineStage::Summarize => {
                    results = self.summarize(results);
                    results
                        .iter()
                        .filter(|r| r.details.is_some())
                        .cloned()
                        .collect()
                }
                PipelineStage::Analyze => {
                    // 不足上限时分析现有条目，不补齐；未获取详情的尾部不参与分析
                    let attempted = results.iter().take_while(|r| r.was_attempted()).count();
                    let cap = self.config.analysis_stage().max_items.min(attempted);
                    let rest = results.split_off(cap);
                    let analyzed = self
                        .coordinator
                        .analyze(&invention.description(), &results)
                        .await?;
                    results = analyzed.clone();
                    results.extend(rest);
                    analyzed
                }
            };

            let calls = self.coordinator.gate().calls_made() - calls_before;
            stages.push(StageStats::from_items(stage.to_string(), &processed, calls));
        }

        Ok((results, stages))
    }

    /// 生成压缩后的新条目
    fn summarize(&self, items: Vec<EnrichedItem>) -> Vec<EnrichedItem> {
        items
            .into_iter()
            .map(|enriched| EnrichedItem {
                details: enriched
                    .details
                    .as_ref()
                    .map(|details| self.summarizer.summarize(details)),
                ..enriched
            })
            .collect()
    }

    fn build_report(
        &self,
        invention: Invention,
        references: Vec<WorkItem>,
        results: Vec<EnrichedItem>,
        stages: Vec<StageStats>,
    ) -> Report {
        let metadata = SearchMetadata {
            references_found: references.len(),
            details_fetched: results.iter().filter(|r| r.details.is_some()).count(),
            analyzed: results.iter().filter(|r| r.analysis.is_some()).count(),
            batching_enabled: self.config.details_stage().batching_enabled
                || self.config.analysis_stage().batching_enabled,
            summarization_enabled: self.config.summarization_enabled,
            detailed_analysis_enabled: self.config.detailed_analysis_enabled,
            rate_limit_rpm: self.config.rate_limit_rpm,
            external_calls: self.coordinator.gate().calls_made(),
        };

        Report {
            generated_at: ReportWriter::timestamp(),
            invention,
            metadata,
            references,
            results,
            stages,
        }
    }
}
