//! 提示词模板 - 业务能力层
//!
//! 只负责把一条或一批专利编码成提示词，不发请求、不解析。
//! 所有模板都要求只返回 JSON，批量模板要求按发送顺序每条专利一个对象。

use crate::models::{PatentDetails, WorkItem};
use crate::utils::logging::truncate_text;

/// 批量分析时摘要和权利要求的截断长度
const BATCH_EXCERPT_CHARS: usize = 300;

/// 单条专利详情提示词
pub fn details_single(item: &WorkItem) -> String {
    let number = &item.patent_number;
    format!(
        r#"Find detailed information for patent: {number}

Search Google Patents and extract:
- patent_number: {number}
- title: Full patent title
- abstract: Complete abstract text
- publication_date: YYYY-MM-DD format
- filing_date: YYYY-MM-DD format
- inventors: Array of inventor names
- assignee: Company/organization
- claim_1: First independent claim (complete text)
- url: {url}

IMPORTANT: Return ONLY a JSON object with no other text.

Format:
```json
{{
  "patent_number": "{number}",
  "title": "...",
  "abstract": "...",
  "publication_date": "YYYY-MM-DD",
  "filing_date": "YYYY-MM-DD",
  "inventors": ["Name 1", "Name 2"],
  "assignee": "...",
  "claim_1": "...",
  "url": "{url}"
}}
```"#,
        number = number,
        url = item.url
    )
}

/// 批量专利详情提示词
pub fn details_batch(items: &[WorkItem]) -> String {
    let numbers = items
        .iter()
        .map(|item| item.patent_number.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"Find detailed information for these {count} patents: {numbers}

Search Google Patents and for EACH patent, extract:
- patent_number
- title
- abstract
- publication_date (YYYY-MM-DD)
- filing_date (YYYY-MM-DD)
- inventors (array)
- assignee
- claim_1 (first independent claim)
- url

IMPORTANT: Return ONLY a JSON array with no other text. Exactly {count} objects, one per patent, in the order listed above.

Format:
```json
[
  {{
    "patent_number": "...",
    "title": "...",
    "abstract": "...",
    "publication_date": "YYYY-MM-DD",
    "filing_date": "YYYY-MM-DD",
    "inventors": ["..."],
    "assignee": "...",
    "claim_1": "...",
    "url": "..."
  }}
]
```"#,
        count = items.len(),
        numbers = numbers
    )
}

/// 单条相关性分析提示词
pub fn analysis_single(
    invention_description: &str,
    item: &WorkItem,
    details: Option<&PatentDetails>,
) -> String {
    let view = PatentView::new(item, details);
    format!(
        r#"Analyze this patent's relevance to the invention.

INVENTION:
{invention}

PATENT: {number}
Title: {title}

Abstract:
{abstract_text}

First Claim:
{claim}

Analyze:
1. Relevance score (0.0 to 1.0)
2. Classification: "blocking", "relevant", or "related"
3. Key similarities
4. Key differences
5. Brief analysis (2-3 sentences)

IMPORTANT: Return ONLY a JSON object with no other text.

Format:
```json
{{
  "patent_number": "{number}",
  "relevance_score": 0.85,
  "classification": "relevant",
  "similarities": ["similarity 1", "similarity 2"],
  "differences": ["difference 1", "difference 2"],
  "analysis": "Brief analysis text..."
}}
```"#,
        invention = invention_description,
        number = view.number,
        title = view.title,
        abstract_text = view.abstract_text,
        claim = view.claim
    )
}

/// 批量相关性分析提示词（摘要和权利要求截断）
pub fn analysis_batch(
    invention_description: &str,
    patents: &[(&WorkItem, Option<&PatentDetails>)],
) -> String {
    let summaries = patents
        .iter()
        .enumerate()
        .map(|(i, (item, details))| {
            let view = PatentView::new(item, *details);
            format!(
                "Patent {}: {}\nTitle: {}\nAbstract: {}\nFirst Claim: {}\n",
                i + 1,
                view.number,
                view.title,
                truncate_text(view.abstract_text, BATCH_EXCERPT_CHARS),
                truncate_text(view.claim, BATCH_EXCERPT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Analyze these {count} patents' relevance to the invention.

INVENTION:
{invention}

PATENTS TO ANALYZE:
{summaries}
For EACH patent, provide:
1. Relevance score (0.0 to 1.0)
2. Classification: "blocking", "relevant", or "related"
3. Key similarities
4. Key differences
5. Brief analysis (2-3 sentences)

IMPORTANT: Return ONLY a JSON array with no other text. Exactly {count} objects, one per patent, in the same order, each carrying its patent_number.

Format:
```json
[
  {{
    "patent_number": "...",
    "relevance_score": 0.85,
    "classification": "relevant",
    "similarities": ["similarity 1", "similarity 2"],
    "differences": ["difference 1", "difference 2"],
    "analysis": "Brief analysis..."
  }}
]
```"#,
        count = patents.len(),
        invention = invention_description,
        summaries = summaries
    )
}

/// 提示词里使用的专利字段（详情缺失时退回到引用数据）
struct PatentView<'a> {
    number: &'a str,
    title: &'a str,
    abstract_text: &'a str,
    claim: &'a str,
}

impl<'a> PatentView<'a> {
    fn new(item: &'a WorkItem, details: Option<&'a PatentDetails>) -> Self {
        let detail_title = details.map(|d| d.title.as_str()).filter(|t| !t.is_empty());
        Self {
            number: &item.patent_number,
            title: detail_title
                .or(item.title.as_deref())
                .unwrap_or("N/A"),
            abstract_text: details
                .map(|d| d.abstract_text.as_str())
                .filter(|a| !a.is_empty())
                .unwrap_or("N/A"),
            claim: details
                .and_then(|d| d.claim_1.as_deref())
                .unwrap_or("N/A"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(number: &str) -> WorkItem {
        WorkItem::new(number, format!("https://patents.google.com/patent/{}/en", number))
    }

    #[test]
    fn test_details_batch_lists_every_number_in_order() {
        let prompt = details_batch(&[item("US1B2"), item("US2B2"), item("US3B2")]);
        assert!(prompt.contains("these 3 patents: US1B2, US2B2, US3B2"));
        assert!(prompt.contains("Exactly 3 objects"));
    }

    #[test]
    fn test_analysis_single_falls_back_to_reference_title() {
        let reference = item("US1B2").with_title("Widget");
        let prompt = analysis_single("Invention: X", &reference, None);
        assert!(prompt.contains("PATENT: US1B2\nTitle: Widget"));
        assert!(prompt.contains("Abstract:\nN/A"));
    }

    #[test]
    fn test_analysis_batch_truncates_long_abstracts() {
        let reference = item("US1B2");
        let details = PatentDetails {
            abstract_text: "a".repeat(1000),
            ..Default::default()
        };
        let prompt = analysis_batch("Invention: X", &[(&reference, Some(&details))]);

        assert!(prompt.contains("Patent 1: US1B2"));
        assert!(prompt.contains(&format!("Abstract: {}...", "a".repeat(300))));
        assert!(!prompt.contains(&"a".repeat(301)));
    }
}
