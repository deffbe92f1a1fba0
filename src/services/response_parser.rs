//! 响应解析 - 业务能力层
//!
//! 把 LLM 的文本响应解析成负载：
//! - 依次尝试：代码块（信息串不区分大小写）、`[...]` / `{...}` 片段（按出现位置）、整段文本
//! - 第一个能解码为 JSON 的候选生效
//! - 条目数量必须与发送数量完全一致
//! - 每个条目都带专利号时，按专利号重新对齐到发送顺序
//!
//! 解析失败一律返回 `ParseError`，上层映射为 `MalformedResponse`，
//! 不会把数据猜测性地归属到某个条目。

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::ParseError;
use crate::models::{normalize_patent_number, PatentDetails, RelevanceAnalysis, WorkItem};

/// 能报告自己属于哪条专利的负载
pub trait Keyed {
    fn patent_number(&self) -> &str;
}

impl Keyed for PatentDetails {
    fn patent_number(&self) -> &str {
        &self.patent_number
    }
}

impl Keyed for RelevanceAnalysis {
    fn patent_number(&self) -> &str {
        &self.patent_number
    }
}

/// 从响应中截取第一个候选 JSON 片段
pub fn extract_json(raw: &str) -> Option<&str> {
    json_candidates(raw).into_iter().next()
}

/// 按优先级列出候选片段
fn json_candidates(raw: &str) -> Vec<&str> {
    let raw = raw.trim();
    let mut candidates = Vec::new();
    if raw.is_empty() {
        return candidates;
    }

    candidates.extend(fenced_block(raw));

    let mut spans: Vec<(usize, char)> = [('[', ']'), ('{', '}')]
        .into_iter()
        .filter_map(|(open, close)| raw.find(open).map(|start| (start, close)))
        .collect();
    spans.sort_by_key(|(start, _)| *start);
    for (start, close) in spans {
        if let Some(end) = raw.rfind(close).filter(|end| *end > start) {
            candidates.push(&raw[start..=end]);
        }
    }

    candidates.push(raw);
    candidates
}

fn fenced_block(raw: &str) -> Option<&str> {
    let start = raw.find("```")? + 3;
    let rest = &raw[start..];
    let end = rest.find("```")?;
    let block = &rest[..end];
    // 跳过信息串：json / JSON / jsonc ...
    let body = match block.split_once('\n') {
        Some((info, body)) if !info.contains(['[', '{']) => body,
        _ => block.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    let body = body.trim();
    (!body.is_empty()).then_some(body)
}

/// 解析单条响应（允许返回一个对象或只含一个元素的数组）
pub fn parse_single<T: DeserializeOwned>(raw: &str) -> Result<T, ParseError> {
    let mut entries = decode_entries::<T>(raw, 1)?;
    match entries.len() {
        1 => Ok(entries.remove(0)),
        actual => Err(ParseError::Cardinality {
            expected: 1,
            actual,
        }),
    }
}

/// 解析批量响应，返回与 `sent` 一一对应、顺序一致的负载
pub fn parse_batch<T>(raw: &str, sent: &[WorkItem]) -> Result<Vec<T>, ParseError>
where
    T: DeserializeOwned + Keyed,
{
    let entries = decode_entries::<T>(raw, sent.len())?;
    if entries.len() != sent.len() {
        return Err(ParseError::Cardinality {
            expected: sent.len(),
            actual: entries.len(),
        });
    }

    let all_keyed = entries
        .iter()
        .all(|entry| !normalize_patent_number(entry.patent_number()).is_empty());
    if !all_keyed {
        debug!("响应条目缺少专利号，按位置对应");
        return Ok(entries);
    }

    realign(entries, sent)
}

fn decode_entries<T: DeserializeOwned>(raw: &str, expected: usize) -> Result<Vec<T>, ParseError> {
    let mut value = Err(ParseError::NoJson);
    for candidate in json_candidates(raw) {
        value = serde_json::from_str::<Value>(candidate)
            .map_err(|e| ParseError::Decode(e.to_string()));
        if value.is_ok() {
            break;
        }
    }
    let value = value?;

    let values = match value {
        Value::Array(values) => values,
        Value::Object(_) if expected == 1 => vec![value],
        Value::Object(_) => {
            return Err(ParseError::Cardinality {
                expected,
                actual: 1,
            })
        }
        other => {
            return Err(ParseError::Decode(format!(
                "期望 JSON 数组或对象，实际为 {}",
                other
            )))
        }
    };

    values
        .into_iter()
        .map(|value| serde_json::from_value(value).map_err(|e| ParseError::Decode(e.to_string())))
        .collect()
}

/// 按专利号把条目放回发送顺序；未知编号或重复编号都视为解析失败
fn realign<T: Keyed>(entries: Vec<T>, sent: &[WorkItem]) -> Result<Vec<T>, ParseError> {
    let sent_keys: Vec<String> = sent
        .iter()
        .map(|item| normalize_patent_number(&item.patent_number))
        .collect();
    let mut slots: Vec<Option<T>> = sent.iter().map(|_| None).collect();

    for entry in entries {
        let key = normalize_patent_number(entry.patent_number());
        let slot = sent_keys
            .iter()
            .zip(slots.iter())
            .position(|(sent_key, slot)| *sent_key == key && slot.is_none())
            .ok_or_else(|| ParseError::UnknownIdentifier {
                found: entry.patent_number().to_string(),
            })?;
        slots[slot] = Some(entry);
    }

    // 数量相同且每个条目都找到了空位，所以每个位置都已填满
    slots
        .into_iter()
        .map(|slot| {
            slot.ok_or(ParseError::Cardinality {
                expected: sent.len(),
                actual: 0,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sent(numbers: &[&str]) -> Vec<WorkItem> {
        numbers
            .iter()
            .map(|n| WorkItem::new(*n, format!("https://example.com/{}", n)))
            .collect()
    }

    #[test]
    fn test_extract_json_from_fence() {
        let raw = "Here you go:\n```json\n[{\"a\": 1}]\n```\nThanks";
        assert_eq!(extract_json(raw), Some("[{\"a\": 1}]"));
    }

    #[test]
    fn test_extract_json_from_surrounding_text() {
        let raw = "Result: {\"a\": [1, 2]} done";
        assert_eq!(extract_json(raw), Some("{\"a\": [1, 2]}"));
        assert_eq!(extract_json("   "), None);
    }

    #[test]
    fn test_fence_tag_is_case_insensitive() {
        let raw = "```JSON\n[{\"patent_number\": \"US1B2\", \"title\": \"Widget\"}]\n```";
        let parsed = parse_batch::<PatentDetails>(raw, &sent(&["US1B2"])).unwrap();
        assert_eq!(parsed[0].title, "Widget");

        assert_eq!(extract_json("```Json [1]```"), Some("[1]"));
    }

    #[test]
    fn test_braces_in_prose_before_the_array() {
        let raw = "Results for {US1B2, US2B2}:\n[
            {\"patent_number\": \"US1B2\", \"title\": \"First\"},
            {\"patent_number\": \"US2B2\", \"title\": \"Second\"}
        ]";
        let parsed = parse_batch::<PatentDetails>(raw, &sent(&["US1B2", "US2B2"])).unwrap();
        assert_eq!(parsed[0].title, "First");
        assert_eq!(parsed[1].title, "Second");
    }

    #[test]
    fn test_parse_single_accepts_object_and_one_element_array() {
        let details: PatentDetails =
            parse_single(r#"{"patent_number": "US1B2", "title": "Widget"}"#).unwrap();
        assert_eq!(details.title, "Widget");

        let details: PatentDetails =
            parse_single(r#"[{"patent_number": "US1B2", "title": "Gadget"}]"#).unwrap();
        assert_eq!(details.title, "Gadget");
    }

    #[test]
    fn test_parse_batch_rejects_wrong_count() {
        let raw = r#"[{"patent_number": "US1B2"}, {"patent_number": "US2B2"}]"#;
        let result = parse_batch::<PatentDetails>(raw, &sent(&["US1B2", "US2B2", "US3B2"]));
        assert_eq!(
            result,
            Err(ParseError::Cardinality {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_parse_batch_realigns_by_patent_number() {
        let raw = r#"[
            {"patent_number": "us-2-b2", "title": "Second"},
            {"patent_number": "US1B2", "title": "First"}
        ]"#;
        let parsed = parse_batch::<PatentDetails>(raw, &sent(&["US1B2", "US2B2"])).unwrap();
        assert_eq!(parsed[0].title, "First");
        assert_eq!(parsed[1].title, "Second");
    }

    #[test]
    fn test_parse_batch_rejects_unknown_and_duplicate_numbers() {
        let unknown = r#"[{"patent_number": "US1B2"}, {"patent_number": "US9B2"}]"#;
        assert!(matches!(
            parse_batch::<PatentDetails>(unknown, &sent(&["US1B2", "US2B2"])),
            Err(ParseError::UnknownIdentifier { .. })
        ));

        let duplicate = r#"[{"patent_number": "US1B2"}, {"patent_number": "US1B2"}]"#;
        assert!(matches!(
            parse_batch::<PatentDetails>(duplicate, &sent(&["US1B2", "US2B2"])),
            Err(ParseError::UnknownIdentifier { .. })
        ));
    }

    #[test]
    fn test_parse_batch_without_numbers_keeps_positions() {
        let raw = r#"[
            {"relevance_score": 0.9, "classification": "blocking"},
            {"relevance_score": 0.1, "classification": "related"}
        ]"#;
        let parsed = parse_batch::<RelevanceAnalysis>(raw, &sent(&["US1B2", "US2B2"])).unwrap();
        assert_eq!(parsed[0].relevance_score, 0.9);
        assert_eq!(parsed[1].relevance_score, 0.1);
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(parse_batch::<PatentDetails>("no json here", &sent(&["US1B2"])).is_err());
        assert!(matches!(
            parse_single::<RelevanceAnalysis>(r#"{"classification": "related"}"#),
            Err(ParseError::Decode(_))
        ));
    }
}
