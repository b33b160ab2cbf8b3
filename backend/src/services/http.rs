use crate::workflows::{ActionError, HttpClient, HttpRequest, HttpResponse};
use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;

/// Outbound HTTP for webhook actions.
#[derive(Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, ActionError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| ActionError::invalid_config(format!("unsupported method '{}'", request.method)))?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ActionError::Timeout(request.timeout)
            } else {
                ActionError::collaborator("webhook", e)
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ActionError::collaborator("webhook", e))?;

        debug!("{} {} -> {}", request.method, request.url, status);
        Ok(HttpResponse { status, body })
    }
}
