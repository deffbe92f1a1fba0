use serde::{Deserialize, Deserializer, Serialize};

/// 待补全的专利引用（上游检索阶段的输出）
///
/// 创建后不再修改，协调器只读取。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// 专利号，例如 US10123456B2
    pub patent_number: String,
    /// 专利页面 URL
    #[serde(default)]
    pub url: String,
    /// 标题（检索阶段可能已经拿到）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl WorkItem {
    pub fn new(patent_number: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            patent_number: patent_number.into(),
            url: url.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// 专利详情（details 阶段的负载）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatentDetails {
    #[serde(default, deserialize_with = "null_as_default")]
    pub patent_number: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "abstract", default, deserialize_with = "null_as_default")]
    pub abstract_text: String,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub filing_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inventors: Vec<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub claim_1: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// 相关性分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Blocking,
    Relevant,
    Related,
    #[serde(other)]
    Unclassified,
}

/// 相关性分析结果（analysis 阶段的负载）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceAnalysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub patent_number: String,
    pub relevance_score: f64,
    pub classification: Classification,
    #[serde(default, deserialize_with = "null_as_default")]
    pub similarities: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub differences: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub analysis: String,
}

/// 待检索的发明
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Invention {
    pub invention_name: String,
    #[serde(default)]
    pub technical_description: String,
    #[serde(default)]
    pub problem_statement: String,
    #[serde(default)]
    pub solution_approach: String,
    #[serde(default)]
    pub key_technical_features: Vec<String>,
    #[serde(default)]
    pub domain_classification: Option<String>,
    #[serde(default)]
    pub inventor_keywords: Vec<String>,
}

impl Invention {
    /// 生成用于分析提示词的发明描述
    pub fn description(&self) -> String {
        let features = self
            .key_technical_features
            .iter()
            .map(|feature| format!("- {}", feature))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Invention: {}\nDomain: {}\n\nProblem: {}\n\nSolution: {}\n\nKey Features:\n{}",
            self.invention_name,
            self.domain_classification.as_deref().unwrap_or("N/A"),
            or_na(&self.problem_statement),
            or_na(&self.solution_approach),
            features
        )
        .trim()
        .to_string()
    }
}

/// 输入文件内容：发明 + 上游检索到的专利引用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchInput {
    pub invention: Invention,
    #[serde(default)]
    pub patents: Vec<WorkItem>,
}

/// 专利号归一化（去掉分隔符、统一大写），用于比对 LLM 返回的编号
pub fn normalize_patent_number(number: &str) -> String {
    number
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn or_na(text: &str) -> &str {
    if text.trim().is_empty() {
        "N/A"
    } else {
        text
    }
}

// LLM 经常把缺失字段写成 null
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
