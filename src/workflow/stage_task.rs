//! 阶段任务 - 流程层
//!
//! 一个阶段（details / analysis）对协调器暴露的全部差异：
//! 怎么编码提示词、怎么解析响应、备用通道怎么走、结果怎么落成 `EnrichedItem`。
//! 协调器和单条流程只依赖这个 trait，不认识具体阶段。

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::clients::{PageFields, SecondarySource};
use crate::error::{CallError, ParseError};
use crate::models::{EnrichedItem, FailureReason, PatentDetails, RelevanceAnalysis, Strategy, WorkItem};
use crate::services::{prompts, response_parser, Keyed, SecondaryAnalyzer};

/// 阶段输入：引用 + 上一阶段带进来的详情
#[derive(Debug, Clone, PartialEq)]
pub struct StageInput {
    pub item: WorkItem,
    pub details: Option<PatentDetails>,
}

impl StageInput {
    pub fn new(item: WorkItem) -> Self {
        Self {
            item,
            details: None,
        }
    }

    pub fn from_enriched(enriched: &EnrichedItem) -> Self {
        Self {
            item: enriched.item.clone(),
            details: enriched.details.clone(),
        }
    }
}

/// 阶段任务
#[async_trait]
pub trait StageTask: Send + Sync {
    type Payload: DeserializeOwned + Keyed + Send;

    /// 日志中使用的阶段名
    fn name(&self) -> &'static str;

    fn single_prompt(&self, input: &StageInput) -> String;

    fn batch_prompt(&self, inputs: &[StageInput]) -> String;

    fn parse_single(&self, raw: &str) -> Result<Self::Payload, ParseError> {
        response_parser::parse_single(raw)
    }

    fn parse_batch(&self, raw: &str, inputs: &[StageInput]) -> Result<Vec<Self::Payload>, ParseError> {
        let sent: Vec<WorkItem> = inputs.iter().map(|input| input.item.clone()).collect();
        response_parser::parse_batch(raw, &sent)
    }

    /// 备用通道（非 LLM 方式）获取负载
    async fn secondary(&self, input: &StageInput) -> Result<Self::Payload, CallError>;

    /// 所有尝试结束后生成最终条目
    fn finish(
        &self,
        input: StageInput,
        outcome: Result<(Self::Payload, Strategy), FailureReason>,
    ) -> EnrichedItem;
}

// ========== details 阶段 ==========

/// 获取专利详情
pub struct DetailsTask {
    source: Arc<dyn SecondarySource>,
}

impl DetailsTask {
    pub fn new(source: Arc<dyn SecondarySource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl StageTask for DetailsTask {
    type Payload = PatentDetails;

    fn name(&self) -> &'static str {
        "details"
    }

    fn single_prompt(&self, input: &StageInput) -> String {
        prompts::details_single(&input.item)
    }

    fn batch_prompt(&self, inputs: &[StageInput]) -> String {
        let items: Vec<WorkItem> = inputs.iter().map(|input| input.item.clone()).collect();
        prompts::details_batch(&items)
    }

    async fn secondary(&self, input: &StageInput) -> Result<PatentDetails, CallError> {
        if input.item.url.trim().is_empty() {
            return Err(CallError::Unavailable(format!(
                "{} 没有页面 URL",
                input.item.patent_number
            )));
        }
        let fields = self.source.fetch(&input.item.url).await?;
        Ok(details_from_page(&input.item, fields))
    }

    fn finish(
        &self,
        input: StageInput,
        outcome: Result<(PatentDetails, Strategy), FailureReason>,
    ) -> EnrichedItem {
        match outcome {
            Ok((mut details, strategy)) => {
                if details.patent_number.trim().is_empty() {
                    details.patent_number = input.item.patent_number.clone();
                }
                if details.title.trim().is_empty() {
                    details.title = input.item.title.clone().unwrap_or_default();
                }
                if details.url.is_none() && !input.item.url.is_empty() {
                    details.url = Some(input.item.url.clone());
                }
                EnrichedItem::with_details(input.item, details, strategy)
            }
            Err(reason) => EnrichedItem::exhausted(input.item, input.details, reason),
        }
    }
}

fn details_from_page(item: &WorkItem, fields: PageFields) -> PatentDetails {
    PatentDetails {
        patent_number: item.patent_number.clone(),
        title: fields
            .title
            .or_else(|| item.title.clone())
            .unwrap_or_default(),
        abstract_text: fields.abstract_text.unwrap_or_default(),
        publication_date: fields.publication_date,
        filing_date: fields.filing_date,
        inventors: fields.inventors,
        assignee: fields.assignee,
        claim_1: fields.first_claim,
        url: Some(item.url.clone()),
    }
}

// ========== analysis 阶段 ==========

/// 相关性分析
pub struct AnalysisTask {
    invention_description: String,
    analyzer: Arc<dyn SecondaryAnalyzer>,
}

impl AnalysisTask {
    pub fn new(invention_description: impl Into<String>, analyzer: Arc<dyn SecondaryAnalyzer>) -> Self {
        Self {
            invention_description: invention_description.into(),
            analyzer,
        }
    }
}

#[async_trait]
impl StageTask for AnalysisTask {
    type Payload = RelevanceAnalysis;

    fn name(&self) -> &'static str {
        "analysis"
    }

    fn single_prompt(&self, input: &StageInput) -> String {
        prompts::analysis_single(&self.invention_description, &input.item, input.details.as_ref())
    }

    fn batch_prompt(&self, inputs: &[StageInput]) -> String {
        let patents: Vec<(&WorkItem, Option<&PatentDetails>)> = inputs
            .iter()
            .map(|input| (&input.item, input.details.as_ref()))
            .collect();
        prompts::analysis_batch(&self.invention_description, &patents)
    }

    async fn secondary(&self, input: &StageInput) -> Result<RelevanceAnalysis, CallError> {
        self.analyzer
            .analyze(&self.invention_description, &input.item, input.details.as_ref())
    }

    fn finish(
        &self,
        input: StageInput,
        outcome: Result<(RelevanceAnalysis, Strategy), FailureReason>,
    ) -> EnrichedItem {
        match outcome {
            Ok((mut analysis, strategy)) => {
                if analysis.patent_number.trim().is_empty() {
                    analysis.patent_number = input.item.patent_number.clone();
                }
                EnrichedItem::with_analysis(input.item, input.details, analysis, strategy)
            }
            Err(reason) => EnrichedItem::exhausted(input.item, input.details, reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::NoSecondarySource;
    use crate::models::ItemStatus;
    use crate::services::TermOverlapAnalyzer;

    struct FixedPage;

    #[async_trait]
    impl SecondarySource for FixedPage {
        async fn fetch(&self, url: &str) -> Result<PageFields, CallError> {
            Ok(PageFields {
                abstract_text: Some(format!("Fetched from {}", url)),
                ..Default::default()
            })
        }
    }

    fn input() -> StageInput {
        StageInput::new(WorkItem::new("US1B2", "https://example.com/US1B2").with_title("Widget"))
    }

    #[tokio::test]
    async fn test_details_secondary_maps_page_fields() {
        let task = DetailsTask::new(Arc::new(FixedPage));
        let details = task.secondary(&input()).await.unwrap();

        assert_eq!(details.patent_number, "US1B2");
        assert_eq!(details.title, "Widget");
        assert_eq!(details.abstract_text, "Fetched from https://example.com/US1B2");
    }

    #[tokio::test]
    async fn test_details_secondary_unavailable() {
        let task = DetailsTask::new(Arc::new(NoSecondarySource));
        assert!(matches!(
            task.secondary(&input()).await,
            Err(CallError::Unavailable(_))
        ));
    }

    #[test]
    fn test_details_finish_fills_missing_identity() {
        let task = DetailsTask::new(Arc::new(NoSecondarySource));
        let enriched = task.finish(input(), Ok((PatentDetails::default(), Strategy::Batch)));

        let details = enriched.details.unwrap();
        assert_eq!(details.patent_number, "US1B2");
        assert_eq!(details.title, "Widget");
        assert_eq!(details.url.as_deref(), Some("https://example.com/US1B2"));
        assert_eq!(enriched.resolved_by, Some(Strategy::Batch));
    }

    #[test]
    fn test_analysis_finish_without_details_is_failed() {
        let task = AnalysisTask::new("Invention: widget", Arc::new(TermOverlapAnalyzer));
        let enriched = task.finish(input(), Err(FailureReason::MalformedResponse));
        assert_eq!(enriched.status, ItemStatus::Failed);

        let mut with_details = input();
        with_details.details = Some(PatentDetails::default());
        let enriched = task.finish(with_details, Err(FailureReason::MalformedResponse));
        assert_eq!(enriched.status, ItemStatus::PartialFetchOnly);
    }
}
