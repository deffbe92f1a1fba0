//! 摘要压缩能力
//!
//! 在 details 和 analysis 之间压缩摘要和权利要求，减少分析提示词的长度。
//! 未启用时注入 `NoopSummarizer`。

use crate::models::PatentDetails;

pub trait Summarizer: Send + Sync {
    fn summarize(&self, details: &PatentDetails) -> PatentDetails;
}

/// 保留摘要和第一条权利要求的前 N 句
#[derive(Debug, Clone, Copy)]
pub struct LeadSentenceSummarizer {
    pub max_abstract_sentences: usize,
    pub max_claim_sentences: usize,
}

impl LeadSentenceSummarizer {
    pub fn new(max_abstract_sentences: usize, max_claim_sentences: usize) -> Self {
        Self {
            max_abstract_sentences,
            max_claim_sentences,
        }
    }
}

impl Summarizer for LeadSentenceSummarizer {
    fn summarize(&self, details: &PatentDetails) -> PatentDetails {
        PatentDetails {
            abstract_text: lead_sentences(&details.abstract_text, self.max_abstract_sentences),
            claim_1: details
                .claim_1
                .as_deref()
                .map(|claim| lead_sentences(claim, self.max_claim_sentences)),
            ..details.clone()
        }
    }
}

/// 原样返回
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSummarizer;

impl Summarizer for NoopSummarizer {
    fn summarize(&self, details: &PatentDetails) -> PatentDetails {
        details.clone()
    }
}

/// 取前 `max` 句（以 . ! ? 加空白作为句子边界）
fn lead_sentences(text: &str, max: usize) -> String {
    let text = text.trim();
    if max == 0 {
        return String::new();
    }

    let mut count = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_boundary {
                count += 1;
                if count == max {
                    return text[..idx + c.len_utf8()].to_string();
                }
            }
        }
    }

    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_sentences() {
        let text = "First sentence. Second one! Third? Fourth.";
        assert_eq!(lead_sentences(text, 2), "First sentence. Second one!");
        assert_eq!(lead_sentences(text, 10), text);
        assert_eq!(lead_sentences("Version 1.5 is out. Next.", 1), "Version 1.5 is out.");
    }

    #[test]
    fn test_lead_sentence_summarizer_keeps_other_fields() {
        let details = PatentDetails {
            patent_number: "US1B2".to_string(),
            title: "Widget".to_string(),
            abstract_text: "A. B. C. D.".to_string(),
            claim_1: Some("1. A widget. Having parts.".to_string()),
            ..Default::default()
        };

        let summarized = LeadSentenceSummarizer::new(2, 1).summarize(&details);
        assert_eq!(summarized.abstract_text, "A. B.");
        assert_eq!(summarized.claim_1.as_deref(), Some("1."));
        assert_eq!(summarized.title, "Widget");
    }

    #[test]
    fn test_noop_summarizer() {
        let details = PatentDetails {
            abstract_text: "Unchanged. Text.".to_string(),
            ..Default::default()
        };
        assert_eq!(NoopSummarizer.summarize(&details), details);
    }
}
