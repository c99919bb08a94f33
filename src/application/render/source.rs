use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("template request failed")]
    Transport(#[from] reqwest::Error),
    #[error("template server answered with status {0}")]
    Status(u16),
}

/// Where caller-supplied templates come from.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// Plain HTTP GET of the template body.
#[derive(Debug, Clone)]
pub struct HttpTemplateSource {
    client: Client,
}

impl HttpTemplateSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TemplateSource for HttpTemplateSource {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}
