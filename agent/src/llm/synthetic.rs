//! Offline provider: fills one of two fixed analysis templates.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::time::Duration;

use super::{CompletionProvider, CompletionRequest, ProviderMode, Purpose};
use crate::error::CompletionError;

fn structured_template(model: &str, question: &str) -> String {
    format!(
        r#"使用{model}分析您的问题："{question}"

## 分析过程

根据{model}的核心原理，我们可以从以下几个维度来分析这个问题：

### 1. 问题识别
首先明确问题的核心所在，找出其中最关键的要素。

### 2. 分析框架
运用{model}的分析框架，可以将问题分解为：
- **维度一**：从这个角度看，需要考虑的前提条件
- **维度二**：另一个重要方面是相关各方的利益
- **维度三**：同时还要权衡投入与回报

### 3. 深入洞察
- 潜在机会：可能存在的积极因素
- 潜在风险：需要关注的风险点
- 关键制约：主要的限制条件

## 具体建议

1. **短期措施**：立即可以实施的步骤
2. **中期策略**：需要一定时间准备的方案
3. **长期规划**：战略性的考虑

## 实施要点

执行时请特别注意优先级排序与效果评估。"#
    )
}

fn guided_template(model: &str, question: &str) -> String {
    format!(
        r#"通过{model}深度分析："{question}"

## 核心要点

{model}提供了一个结构化的思考框架。

### 问题本质
深入挖掘问题背后的真正原因，而不是仅仅关注表面现象。

### 多角度审视
- **内部因素**：您自身可控的要素
- **外部环境**：不可控但需要适应的条件
- **时间维度**：短期与长期的权衡

## 行动指南

### 第一步：信息收集
收集相关数据，明确约束条件和可用资源。

### 第二步：方案设计
设计多个可行方案，评估每个方案的利弊。

### 第三步：实施监控
制定实施计划，设置关键里程碑并建立反馈机制。

通过{model}的系统性分析，您可以更有信心地做出决策。"#
    )
}

type Template = fn(&str, &str) -> String;

const TEMPLATES: [Template; 2] = [structured_template, guided_template];

#[derive(Default)]
pub struct SyntheticProvider {
    latency: Duration,
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before answering, to mimic a remote call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// A filled template for `model_name`, chosen at random.
    pub fn render(model_name: &str, question: &str) -> String {
        let template = TEMPLATES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(structured_template);
        template(model_name, question)
    }
}

#[async_trait]
impl CompletionProvider for SyntheticProvider {
    fn mode(&self) -> ProviderMode {
        ProviderMode::Synthetic
    }

    fn name(&self) -> &str {
        "synthetic"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match &request.purpose {
            Purpose::Analysis { model_name, question } => Ok(Self::render(model_name, question)),
            Purpose::Recommendation => Err(CompletionError::Other(
                "synthetic provider does not produce recommendations".into(),
            )),
        }
    }

    async fn health_check(&self) -> Result<(), CompletionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_analysis_mentions_model_and_question() {
        let provider = SyntheticProvider::new();
        let req = CompletionRequest::analysis("ignored", "第一性原理", "要不要创业？");
        let out = provider.complete(&req).await.unwrap();
        assert!(out.contains("第一性原理"));
        assert!(out.contains("要不要创业？"));
    }

    #[tokio::test]
    async fn test_recommendation_is_refused() {
        let provider = SyntheticProvider::new();
        let err = provider
            .complete(&CompletionRequest::recommendation("pick"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Other(_)));
    }

    #[test]
    fn test_both_templates_are_non_trivial() {
        for t in TEMPLATES {
            let text = t("模型", "问题");
            assert!(text.chars().count() > 200);
            assert!(text.starts_with("使用模型") || text.starts_with("通过模型"));
        }
    }
}
