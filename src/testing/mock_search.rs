//! Mock 搜索服务，替代 [`ExaSearch`](crate::tools::search::ExaSearch)

use crate::error::{ChefError, Result};
use crate::tools::search::{SearchProvider, SearchResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

enum MockSearchResponse {
    Results(Vec<SearchResult>),
    Failure(String),
}

/// 按顺序返回预设结果；队列耗尽后返回空结果
pub struct MockSearch {
    responses: Arc<Mutex<VecDeque<MockSearchResponse>>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl Default for MockSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSearch {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_results(self, results: Vec<SearchResult>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockSearchResponse::Results(results));
        self
    }

    pub fn with_failure(self, msg: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockSearchResponse::Failure(msg.into()));
        self
    }

    /// 收到的全部查询（按时序）
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>> {
        self.queries.lock().unwrap().push(query.to_string());
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(MockSearchResponse::Results(mut r)) => {
                r.truncate(num_results);
                Ok(r)
            }
            Some(MockSearchResponse::Failure(msg)) => Err(ChefError::Other(msg)),
            None => Ok(Vec::new()),
        }
    }
}
