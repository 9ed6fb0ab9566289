use crate::error::InvocationError;
use crate::llm::types::{ChatCompletionRequest, ChatCompletionResponse};
use reqwest::Client;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use tracing::debug;

pub async fn post(
    client: Arc<Client>,
    request_body: &ChatCompletionRequest,
    header_map: HeaderMap,
    url: &str,
) -> Result<ChatCompletionResponse, InvocationError> {
    let response = client
        .post(url)
        .headers(header_map)
        .json(request_body)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(InvocationError::from_status(status, &error_text));
    }

    let completion_response = response
        .json::<ChatCompletionResponse>()
        .await
        .map_err(|e| InvocationError::Remote(format!("Invalid response: {e}")))?;

    debug!("Post completion response: {:?}", completion_response);

    Ok(completion_response)
}
