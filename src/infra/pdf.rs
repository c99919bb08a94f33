//! HTTP clients for the external HTML to PDF services.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::{
    application::convert::{PdfProvider, ProviderError, ProviderKind},
    config::{DocRaptorSettings, HeadlessSettings, PdfMargin},
};

use super::error::InfraError;

/// Longest provider error body kept for diagnostics.
const ERROR_BODY_LIMIT: usize = 512;

/// Shared client for every provider, with the configured request timeout.
pub fn provider_client(timeout: Duration) -> Result<Client, InfraError> {
    Client::builder()
        .user_agent(concat!("signoff/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|err| InfraError::configuration(format!("failed to build http client: {err}")))
}

#[derive(Debug, Serialize)]
struct HeadlessRequest<'a> {
    url: &'a str,
    screen: bool,
    format: &'static str,
    margin: &'a PdfMargin,
    #[serde(skip_serializing_if = "Option::is_none")]
    header: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<&'a str>,
}

/// Headless-browser print service authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct HeadlessProvider {
    client: Client,
    settings: HeadlessSettings,
}

impl HeadlessProvider {
    pub fn new(client: Client, settings: HeadlessSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl PdfProvider for HeadlessProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Headless
    }

    async fn convert(&self, html_url: &Url) -> Result<Bytes, ProviderError> {
        let payload = HeadlessRequest {
            url: html_url.as_str(),
            screen: false,
            format: "A4",
            margin: &self.settings.margin,
            header: self.settings.header_html.as_deref(),
            footer: self.settings.footer_html.as_deref(),
        };

        let response = self
            .client
            .post(self.settings.endpoint.clone())
            .bearer_auth(&self.settings.token)
            .json(&payload)
            .send()
            .await?;
        read_document(ProviderKind::Headless, response).await
    }
}

#[derive(Debug, Serialize)]
struct DocRaptorRequest<'a> {
    document_url: &'a str,
    user_credentials: &'a str,
    test: bool,
}

/// Hosted conversion service that takes its credentials in the request body.
#[derive(Debug, Clone)]
pub struct DocRaptorProvider {
    client: Client,
    settings: DocRaptorSettings,
}

impl DocRaptorProvider {
    pub fn new(client: Client, settings: DocRaptorSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl PdfProvider for DocRaptorProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::DocRaptor
    }

    async fn convert(&self, html_url: &Url) -> Result<Bytes, ProviderError> {
        let payload = DocRaptorRequest {
            document_url: html_url.as_str(),
            user_credentials: &self.settings.api_key,
            test: self.settings.test,
        };

        let response = self
            .client
            .post(self.settings.endpoint.clone())
            .json(&payload)
            .send()
            .await?;
        read_document(ProviderKind::DocRaptor, response).await
    }
}

async fn read_document(kind: ProviderKind, response: Response) -> Result<Bytes, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > ERROR_BODY_LIMIT {
            let mut end = ERROR_BODY_LIMIT;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let document = response.bytes().await?;
    if document.is_empty() {
        return Err(ProviderError::EmptyBody);
    }
    debug!(
        target = "signoff::convert",
        provider = %kind,
        size_bytes = document.len(),
        "provider returned document"
    );
    Ok(document)
}
