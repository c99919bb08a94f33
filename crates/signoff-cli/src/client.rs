#![deny(clippy::all, clippy::pedantic)]

use std::path::Path;

use reqwest::{Client, Response, Url};
use serde::Deserialize;
use signoff_api_types::{InspectionReport, PublishedPdf, PublishedReport};
use thiserror::Error;

use crate::args::{Cli, ProviderArg};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("site URL is required (use --site or SIGNOFF_SITE_URL)")]
    MissingSite,
    #[error("failed to read input file {path}: {source}")]
    InputFile {
        path: String,
        source: std::io::Error,
    },
    #[error("{path} is not a valid report: {source}")]
    InvalidReport {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server error: {0}")]
    Server(String),
}

#[derive(Clone, Debug)]
pub struct Ctx {
    pub client: Client,
    pub base: Url,
}

impl Ctx {
    pub fn new(site: &str) -> Result<Self, CliError> {
        let base = Url::parse(site)?.join("/")?;
        let client = Client::builder().user_agent(Self::user_agent()).build()?;
        Ok(Self { client, base })
    }

    pub fn user_agent() -> &'static str {
        concat!("signoff-cli/", env!("CARGO_PKG_VERSION"))
    }

    pub fn url(&self, path: &str) -> Result<Url, CliError> {
        self.base.join(path).map_err(CliError::Url)
    }

    pub async fn publish(&self, report: &InspectionReport) -> Result<PublishedReport, CliError> {
        let resp = self
            .client
            .post(self.url("/jsonhtmlgen")?)
            .json(report)
            .send()
            .await?;
        Self::handle(resp).await
    }

    pub async fn pdf(
        &self,
        html_url: &str,
        provider: ProviderArg,
    ) -> Result<PublishedPdf, CliError> {
        let mut url = self.url("/pdfgen")?;
        url.query_pairs_mut()
            .append_pair("url", html_url)
            .append_pair("provider", provider.as_str());

        let resp = self.client.get(url).send().await?;
        Self::handle(resp).await
    }

    async fn handle<T: for<'de> Deserialize<'de>>(resp: Response) -> Result<T, CliError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            return Err(CliError::Server(format!("status {status} body {text}")));
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| CliError::Server(format!("failed to parse body: {e}")))
    }
}

pub fn build_ctx_from_cli(cli: &Cli) -> Result<Ctx, CliError> {
    let site = cli
        .site
        .as_deref()
        .filter(|site| !site.trim().is_empty())
        .ok_or(CliError::MissingSite)?;
    Ctx::new(site)
}

/// Read and strictly decode a report so typos fail before anything is sent.
pub async fn read_report(path: &Path) -> Result<InspectionReport, CliError> {
    let display = path.display().to_string();
    let raw = tokio::fs::read(path)
        .await
        .map_err(|source| CliError::InputFile {
            path: display.clone(),
            source,
        })?;
    serde_json::from_slice(&raw).map_err(|source| CliError::InvalidReport {
        path: display,
        source,
    })
}
