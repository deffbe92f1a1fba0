//! 集成测试共用的假实现
#![allow(dead_code)]

use async_trait::async_trait;
use regex::Regex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use patent_enrich::clients::{PageFields, SecondarySource};
use patent_enrich::{CallError, CallGate, Config, ExternalCall, RateLimiter, StageConfig, WorkItem};

/// 假 LLM 的行为
#[derive(Debug, Clone)]
pub enum Mode {
    /// 按提示词里的专利号回显合法 JSON
    Echo,
    /// 批量提示词返回无法解析的文本，单条正常
    MalformedBatches,
    /// 所有调用都失败
    Failing,
    /// 提示词包含这些专利号时传输失败
    FailNumbers(Vec<String>),
    /// 每次调用先等待，再正常回显
    Slow(Duration),
}

/// 记录所有提示词的假 LLM
pub struct MockLlm {
    mode: Mode,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    number: Regex,
}

impl MockLlm {
    pub fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            number: Regex::new(r"US\d+B\d").unwrap(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// 只包含这一条专利的单条提示词次数
    pub fn single_prompts_for(&self, number: &str) -> usize {
        self.prompts()
            .iter()
            .filter(|p| !is_batch(p) && self.numbers(p) == vec![number.to_string()])
            .count()
    }

    /// 提示词中出现的专利号（去重，保持顺序）
    pub fn numbers(&self, prompt: &str) -> Vec<String> {
        let mut numbers: Vec<String> = Vec::new();
        for m in self.number.find_iter(prompt) {
            if !numbers.iter().any(|n| n == m.as_str()) {
                numbers.push(m.as_str().to_string());
            }
        }
        numbers
    }

    fn respond(&self, prompt: &str) -> String {
        let entries: Vec<String> = self
            .numbers(prompt)
            .iter()
            .map(|n| {
                if prompt.starts_with("Find detailed") {
                    format!(
                        r#"{{"patent_number": "{n}", "title": "Title of {n}", "abstract": "Abstract of {n}. Second sentence. Third sentence. Fourth sentence.", "claim_1": "A claim for {n}."}}"#
                    )
                } else {
                    format!(
                        r#"{{"patent_number": "{n}", "relevance_score": 0.5, "classification": "relevant", "similarities": ["x"], "differences": ["y"], "analysis": "Analysis of {n}."}}"#
                    )
                }
            })
            .collect();
        format!("```json\n[{}]\n```", entries.join(",\n"))
    }
}

#[async_trait]
impl ExternalCall for MockLlm {
    async fn invoke(&self, prompt: &str) -> Result<String, CallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        match &self.mode {
            Mode::Echo => Ok(self.respond(prompt)),
            Mode::MalformedBatches if is_batch(prompt) => {
                Ok("Sorry, I could not find those patents.".to_string())
            }
            Mode::MalformedBatches => Ok(self.respond(prompt)),
            Mode::Failing => Err(CallError::Transport("connection reset".to_string())),
            Mode::FailNumbers(failing) => {
                if self.numbers(prompt).iter().any(|n| failing.contains(n)) {
                    Err(CallError::Transport("connection reset".to_string()))
                } else {
                    Ok(self.respond(prompt))
                }
            }
            Mode::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(self.respond(prompt))
            }
        }
    }
}

pub fn is_batch(prompt: &str) -> bool {
    prompt.starts_with("Find detailed information for these") || prompt.starts_with("Analyze these")
}

/// 假的页面抓取
pub struct MockPages {
    succeed: bool,
    calls: AtomicUsize,
}

impl MockPages {
    pub fn working() -> Arc<Self> {
        Arc::new(Self {
            succeed: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            succeed: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecondarySource for MockPages {
    async fn fetch(&self, url: &str) -> Result<PageFields, CallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.succeed {
            Ok(PageFields {
                title: Some(format!("Page title for {}", url)),
                abstract_text: Some("Scraped abstract.".to_string()),
                ..Default::default()
            })
        } else {
            Err(CallError::Transport(format!("{} 返回 503", url)))
        }
    }
}

/// 不限流的调用闸门
pub fn gate(llm: Arc<MockLlm>) -> Arc<CallGate> {
    Arc::new(CallGate::new(
        Arc::new(RateLimiter::unlimited()),
        llm,
        Duration::from_secs(300),
    ))
}

pub fn items(n: usize) -> Vec<WorkItem> {
    (0..n)
        .map(|i| {
            let number = format!("US{}B2", 1000 + i);
            WorkItem::new(&number, format!("https://patents.example.com/patent/{}/en", number))
        })
        .collect()
}

pub fn numbers(items: &[WorkItem]) -> Vec<String> {
    items.iter().map(|i| i.patent_number.clone()).collect()
}

/// 两个阶段使用相同调度参数的配置
pub fn config(batching_enabled: bool, batch_size: usize) -> Config {
    let stage = StageConfig {
        batching_enabled,
        batch_size,
        max_items: 100,
    };
    Config {
        details: stage,
        analysis: stage,
        ..Config::default()
    }
}
