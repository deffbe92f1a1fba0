//! 阶段列表
//!
//! 运行前根据配置一次性确定要执行哪些阶段，编排层只按列表顺序执行，
//! 不在流程中到处判断开关。

use std::fmt;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// 获取专利详情
    FetchDetails,
    /// 压缩摘要和权利要求
    Summarize,
    /// 相关性分析
    Analyze,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PipelineStage::FetchDetails => "details",
            PipelineStage::Summarize => "summarize",
            PipelineStage::Analyze => "analysis",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<PipelineStage>,
}

impl Pipeline {
    /// 关闭详细分析时为空列表：报告只列出引用
    pub fn resolve(config: &Config) -> Self {
        let mut stages = Vec::new();
        if config.detailed_analysis_enabled {
            stages.push(PipelineStage::FetchDetails);
            if config.summarization_enabled {
                stages.push(PipelineStage::Summarize);
            }
            stages.push(PipelineStage::Analyze);
        }
        Self { stages }
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn contains(&self, stage: PipelineStage) -> bool {
        self.stages.contains(&stage)
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stages.is_empty() {
            return f.write_str("(仅列出引用)");
        }
        let names: Vec<String> = self.stages.iter().map(ToString::to_string).collect();
        f.write_str(&names.join(" → "))
    }
}
