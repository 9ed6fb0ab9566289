//! 菜谱搜索工具
//!
//! 搜索能力本身由外部服务提供，Agent 只依赖 [`SearchProvider`] 接口。
//! 默认实现 [`ExaSearch`] 调用 Exa `/search` 接口。

use crate::error::{InvocationError, Result, ToolError};
use crate::tools::{Tool, ToolParameters, ToolResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

/// 单条搜索结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    /// 正文摘录（可能为空）
    #[serde(default)]
    pub text: String,
}

/// 外部搜索能力
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>>;
}

/// Exa 搜索客户端
pub struct ExaSearch {
    client: Arc<Client>,
    url: String,
    api_key: String,
    /// 每条结果正文截取的最大字符数
    max_characters: usize,
}

impl ExaSearch {
    pub fn new(client: Arc<Client>, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            max_characters: 1500,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Debug, Deserialize)]
struct ExaResult {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl SearchProvider for ExaSearch {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>> {
        let body = json!({
            "query": query,
            "numResults": num_results,
            "contents": { "text": { "maxCharacters": self.max_characters } }
        });
        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(InvocationError::from)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(InvocationError::from_status(status, &text).into());
        }

        let parsed: ExaResponse = response.json().await.map_err(InvocationError::from)?;
        debug!(query = %query, hits = parsed.results.len(), "🔍 Exa 搜索完成");
        Ok(parsed
            .results
            .into_iter()
            .map(|r| SearchResult {
                title: r.title.unwrap_or_else(|| r.url.clone()),
                url: r.url,
                text: r.text.unwrap_or_default(),
            })
            .collect())
    }
}

/// 暴露给模型的 `search_recipes` 工具
pub struct SearchRecipesTool {
    provider: Arc<dyn SearchProvider>,
    num_results: usize,
}

impl SearchRecipesTool {
    pub fn new(provider: Arc<dyn SearchProvider>, num_results: usize) -> Self {
        Self {
            provider,
            num_results: num_results.max(1),
        }
    }
}

#[async_trait]
impl Tool for SearchRecipesTool {
    fn name(&self) -> &str {
        "search_recipes"
    }

    fn description(&self) -> &str {
        "Search the web for recipes, cooking techniques and ingredient information. \
         Returns titles, links and short excerpts."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for, e.g. \"quick chicken rice broccoli recipe\""
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, parameters: ToolParameters) -> Result<ToolResult> {
        let query = parameters
            .get("query")
            .and_then(|v| v.as_str())
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::MissingParameter("query".to_string()))?;

        match self.provider.search(query, self.num_results).await {
            Ok(results) if results.is_empty() => {
                Ok(ToolResult::success(format!("No results found for \"{query}\".")))
            }
            Ok(results) => Ok(ToolResult::success(format_results(&results))),
            Err(e) => {
                warn!(query = %query, error = %e, "搜索失败，将错误回传给模型");
                Ok(ToolResult::error(format!("search failed: {e}")))
            }
        }
    }
}

fn format_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            if r.text.is_empty() {
                format!("{}. {} ({})", i + 1, r.title, r.url)
            } else {
                format!("{}. {} ({})\n{}", i + 1, r.title, r.url, r.text.trim())
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChefError;
    use crate::testing::MockSearch;

    fn params(query: &str) -> ToolParameters {
        let mut p = ToolParameters::new();
        p.insert("query".to_string(), json!(query));
        p
    }

    #[tokio::test]
    async fn test_formats_results() {
        let search = Arc::new(MockSearch::new().with_results(vec![SearchResult {
            title: "Chicken Fried Rice".to_string(),
            url: "https://example.com/fried-rice".to_string(),
            text: "Day-old rice works best.".to_string(),
        }]));
        let tool = SearchRecipesTool::new(search.clone(), 3);
        let result = tool.execute(params("fried rice")).await.unwrap();
        assert!(result.success);
        assert!(result.output.starts_with("1. Chicken Fried Rice"));
        assert!(result.output.contains("Day-old rice"));
        assert_eq!(search.queries(), vec!["fried rice".to_string()]);
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_tool_error() {
        let search = Arc::new(MockSearch::new().with_failure("quota exceeded"));
        let tool = SearchRecipesTool::new(search, 3);
        let result = tool.execute(params("pasta")).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_missing_query() {
        let tool = SearchRecipesTool::new(Arc::new(MockSearch::new()), 3);
        let err = tool.execute(ToolParameters::new()).await.unwrap_err();
        assert!(matches!(err, ChefError::Tool(ToolError::MissingParameter(_))));
    }
}
