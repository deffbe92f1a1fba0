//! 备用分析能力
//!
//! analysis 阶段主通道失败后的本地估算，不发任何外部调用。
//! 未启用时注入 `NoSecondaryAnalyzer`。

use std::collections::BTreeSet;

use crate::error::CallError;
use crate::models::{Classification, PatentDetails, RelevanceAnalysis, WorkItem};

/// 分类阈值
const BLOCKING_THRESHOLD: f64 = 0.6;
const RELEVANT_THRESHOLD: f64 = 0.3;
/// 相同点 / 不同点各最多列出的词数
const MAX_LISTED_TERMS: usize = 10;

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "also", "among", "and", "based", "being", "between", "comprising",
    "each", "from", "have", "having", "into", "method", "more", "only", "other", "over", "said",
    "such", "system", "than", "that", "their", "them", "then", "there", "these", "this", "through",
    "using", "wherein", "which", "while", "with", "within",
];

pub trait SecondaryAnalyzer: Send + Sync {
    fn analyze(
        &self,
        invention_description: &str,
        item: &WorkItem,
        details: Option<&PatentDetails>,
    ) -> Result<RelevanceAnalysis, CallError>;
}

/// 基于词项重合度的相关性估算
#[derive(Debug, Default, Clone, Copy)]
pub struct TermOverlapAnalyzer;

impl SecondaryAnalyzer for TermOverlapAnalyzer {
    fn analyze(
        &self,
        invention_description: &str,
        item: &WorkItem,
        details: Option<&PatentDetails>,
    ) -> Result<RelevanceAnalysis, CallError> {
        let mut patent_text = String::new();
        if let Some(title) = item.title.as_deref() {
            patent_text.push_str(title);
        }
        if let Some(details) = details {
            for part in [
                details.title.as_str(),
                details.abstract_text.as_str(),
                details.claim_1.as_deref().unwrap_or_default(),
            ] {
                patent_text.push(' ');
                patent_text.push_str(part);
            }
        }

        let invention_terms = terms(invention_description);
        let patent_terms = terms(&patent_text);
        if invention_terms.is_empty() || patent_terms.is_empty() {
            return Err(CallError::Malformed(format!(
                "{} 没有可用于本地分析的文本",
                item.patent_number
            )));
        }

        let shared: Vec<String> = invention_terms.intersection(&patent_terms).cloned().collect();
        let score = shared.len() as f64 / invention_terms.len() as f64;
        let classification = classify(score);

        Ok(RelevanceAnalysis {
            patent_number: item.patent_number.clone(),
            relevance_score: (score * 100.0).round() / 100.0,
            classification,
            similarities: shared.iter().take(MAX_LISTED_TERMS).cloned().collect(),
            differences: patent_terms
                .difference(&invention_terms)
                .take(MAX_LISTED_TERMS)
                .cloned()
                .collect(),
            analysis: format!(
                "Local term-overlap estimate: {} of {} invention terms appear in the patent text.",
                shared.len(),
                invention_terms.len()
            ),
        })
    }
}

/// 空实现：备用分析不可用
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSecondaryAnalyzer;

impl SecondaryAnalyzer for NoSecondaryAnalyzer {
    fn analyze(
        &self,
        _invention_description: &str,
        _item: &WorkItem,
        _details: Option<&PatentDetails>,
    ) -> Result<RelevanceAnalysis, CallError> {
        Err(CallError::Unavailable("未配置备用分析".to_string()))
    }
}

fn classify(score: f64) -> Classification {
    if score >= BLOCKING_THRESHOLD {
        Classification::Blocking
    } else if score >= RELEVANT_THRESHOLD {
        Classification::Relevant
    } else {
        Classification::Related
    }
}

fn terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= 4)
        .map(str::to_lowercase)
        .filter(|word| !STOPWORDS.contains(&word.as_str()))
        .collect()
}
