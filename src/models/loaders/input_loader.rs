use crate::error::InputError;
use crate::models::patent::{normalize_patent_number, SearchInput, WorkItem};
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;

/// 从 JSON / TOML 文件加载发明和上游检索到的专利引用
pub async fn load_search_input(path: &Path) -> Result<SearchInput, InputError> {
    let display = path.display().to_string();

    if !path.exists() {
        return Err(InputError::NotFound { path: display });
    }

    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| InputError::ParseFailed {
            path: display.clone(),
            message: e.to_string(),
        })?;

    let input: SearchInput = match extension.as_deref() {
        Some("json") => serde_json::from_str(&content).map_err(|e| InputError::ParseFailed {
            path: display.clone(),
            message: e.to_string(),
        })?,
        Some("toml") => toml::from_str(&content).map_err(|e| InputError::ParseFailed {
            path: display.clone(),
            message: e.to_string(),
        })?,
        _ => return Err(InputError::UnsupportedType { path: display }),
    };

    if input.invention.invention_name.trim().is_empty() {
        return Err(InputError::EmptyInventionName);
    }

    tracing::info!(
        "成功加载发明「{}」，上游检索结果 {} 条",
        input.invention.invention_name,
        input.patents.len()
    );

    Ok(input)
}

/// 整理上游引用：按专利号去重（保留首次出现）、丢弃空编号、补全 URL、截断到上限
pub fn prepare_references(
    patents: Vec<WorkItem>,
    max_items: usize,
    patents_base_url: &str,
) -> Vec<WorkItem> {
    let mut seen = HashSet::new();
    let base = patents_base_url.trim_end_matches('/');

    patents
        .into_iter()
        .filter(|patent| {
            let key = normalize_patent_number(&patent.patent_number);
            !key.is_empty() && seen.insert(key)
        })
        .map(|mut patent| {
            patent.patent_number = patent.patent_number.trim().to_string();
            if patent.url.trim().is_empty() {
                patent.url = format!("{}/patent/{}/en", base, patent.patent_number);
            }
            patent
        })
        .take(max_items)
        .collect()
}
