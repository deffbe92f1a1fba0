/// 专利页面客户端（备用通道）
///
/// 直接抓取公开的专利页面并从 HTML 中提取字段，不依赖 LLM。
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clients::secondary::{PageFields, SecondarySource};
use crate::config::Config;
use crate::error::CallError;
use crate::infrastructure::{RateLimitSettings, RateLimiter};

/// 专利页面客户端
pub struct PatentPageClient {
    http: reqwest::Client,
    limiter: Arc<RateLimiter>,
    extractor: PageExtractor,
    timeout: Duration,
}

impl PatentPageClient {
    /// 创建新的页面客户端（自带一个礼貌性限流器）
    pub fn new(config: &Config) -> Result<Self> {
        let limiter = RateLimiter::new(RateLimitSettings {
            enabled: true,
            requests_per_minute: u32::MAX,
            min_interval: config.secondary_min_interval(),
            log_waits: false,
        });
        Self::with_limiter(config.call_timeout(), Arc::new(limiter))
    }

    pub fn with_limiter(timeout: Duration, limiter: Arc<RateLimiter>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (compatible; patent-enrich/0.1)")
            .build()
            .context("无法创建 HTTP 客户端")?;

        Ok(Self {
            http,
            limiter,
            extractor: PageExtractor::new()?,
            timeout,
        })
    }

    fn map_reqwest_error(&self, err: reqwest::Error) -> CallError {
        if err.is_timeout() {
            CallError::Timeout {
                secs: self.timeout.as_secs_f64(),
            }
        } else {
            CallError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl SecondarySource for PatentPageClient {
    async fn fetch(&self, url: &str) -> Result<PageFields, CallError> {
        self.limiter.acquire().await;
        debug!("抓取专利页面: {}", url);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CallError::RateLimited(format!("{} 返回 429", url)));
        }
        if !status.is_success() {
            warn!("专利页面返回错误状态 {}: {}", status, url);
            return Err(CallError::Transport(format!("{} 返回 {}", url, status)));
        }

        let html = response
            .text()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let fields = self.extractor.extract(&html);
        if !fields.has_content() {
            return Err(CallError::Malformed(format!(
                "页面中没有找到标题或摘要: {}",
                url
            )));
        }

        Ok(fields)
    }
}

/// HTML 字段提取
struct PageExtractor {
    meta_tag: Regex,
    attribute: Regex,
    title_tag: Regex,
    abstract_div: Regex,
    claim_div: Regex,
    tag: Regex,
    whitespace: Regex,
}

impl PageExtractor {
    fn new() -> Result<Self> {
        Ok(Self {
            meta_tag: Regex::new(r"(?i)<meta\s[^>]*>")?,
            attribute: Regex::new(r#"([A-Za-z_][\w.:-]*)\s*=\s*"([^"]*)""#)?,
            title_tag: Regex::new(r"(?is)<title[^>]*>(.*?)</title>")?,
            abstract_div: Regex::new(r#"(?is)<div[^>]*class="abstract"[^>]*>(.*?)</div>"#)?,
            claim_div: Regex::new(r#"(?is)<div[^>]*class="claim-text"[^>]*>(.*?)</div>"#)?,
            tag: Regex::new(r"<[^>]+>")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    fn extract(&self, html: &str) -> PageFields {
        let mut fields = PageFields::default();

        for meta in self.meta_tag.find_iter(html) {
            let mut name = None;
            let mut content = None;
            let mut scheme = None;
            for cap in self.attribute.captures_iter(meta.as_str()) {
                let value = cap[2].to_string();
                match cap[1].to_ascii_lowercase().as_str() {
                    "name" => name = Some(value),
                    "content" => content = Some(value),
                    "scheme" => scheme = Some(value),
                    _ => {}
                }
            }

            let (Some(name), Some(content)) = (name, content) else {
                continue;
            };
            let content = self.clean(&content);
            if content.is_empty() {
                continue;
            }

            match (name.as_str(), scheme.as_deref()) {
                ("DC.title", _) => {
                    fields.title.get_or_insert(content);
                }
                ("DC.description", _) => {
                    fields.abstract_text.get_or_insert(content);
                }
                ("DC.contributor", Some("assignee")) => {
                    fields.assignee.get_or_insert(content);
                }
                ("DC.contributor", _) => fields.inventors.push(content),
                ("DC.date", Some("dateSubmitted")) => {
                    fields.filing_date.get_or_insert(content);
                }
                ("DC.date", Some("issue")) | ("DC.date", Some("publication")) => {
                    fields.publication_date.get_or_insert(content);
                }
                _ => {}
            }
        }

        if fields.title.is_none() {
            fields.title = self
                .title_tag
                .captures(html)
                .map(|cap| self.clean(&cap[1]))
                .map(|title| title.trim_end_matches("- Google Patents").trim().to_string())
                .filter(|title| !title.is_empty());
        }

        if fields.abstract_text.is_none() {
            fields.abstract_text = self
                .abstract_div
                .captures(html)
                .map(|cap| self.clean(&cap[1]))
                .filter(|text| !text.is_empty());
        }

        fields.first_claim = self
            .claim_div
            .captures(html)
            .map(|cap| self.clean(&cap[1]))
            .filter(|text| !text.is_empty());

        fields
    }

    /// 去标签、解码常见实体、合并空白
    fn clean(&self, raw: &str) -> String {
        let text = self.tag.replace_all(raw, " ");
        let text = text
            .replace("&nbsp;", " ")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&");
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }
}
