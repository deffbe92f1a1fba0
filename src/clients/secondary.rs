//! 备用通道接口
//!
//! 主通道（LLM）失败后，按 URL 直接抓取专利页面。
//! 未配置时使用 `NoSecondarySource`，调用方不需要做类型判断。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CallError;

/// 从页面中提取出的字段
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageFields {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub publication_date: Option<String>,
    pub filing_date: Option<String>,
    pub inventors: Vec<String>,
    pub assignee: Option<String>,
    pub first_claim: Option<String>,
}

impl PageFields {
    /// 至少拿到标题或摘要才算有效
    pub fn has_content(&self) -> bool {
        self.title.is_some() || self.abstract_text.is_some()
    }
}

#[async_trait]
pub trait SecondarySource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageFields, CallError>;
}

/// 空实现：备用通道不可用
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSecondarySource;

#[async_trait]
impl SecondarySource for NoSecondarySource {
    async fn fetch(&self, _url: &str) -> Result<PageFields, CallError> {
        Err(CallError::Unavailable("未配置备用抓取通道".to_string()))
    }
}
