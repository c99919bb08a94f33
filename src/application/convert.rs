//! PDF conversion of published HTML artifacts.
//!
//! Only URLs that point back into the artifact store are accepted.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
    application::publish::{ArtifactPublisher, PublishError, PublishedArtifact},
    domain::naming::{ArtifactKey, ArtifactKind},
};

const METRIC_PDF_CONVERSION_TOTAL: &str = "signoff_pdf_conversion_total";

/// The closed set of PDF back ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    #[default]
    Headless,
    DocRaptor,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Headless, ProviderKind::DocRaptor];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Headless => "headless",
            ProviderKind::DocRaptor => "docraptor",
        }
    }

    /// Prefix put in front of the PDF file name.
    pub fn file_prefix(self) -> &'static str {
        match self {
            ProviderKind::Headless => "",
            ProviderKind::DocRaptor => "docraptor-",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown pdf provider `{0}`")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnknownProvider(value.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to provider failed")]
    Transport(#[from] reqwest::Error),
    #[error("provider answered with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider returned an empty document")]
    EmptyBody,
}

/// One external HTML to PDF service.
#[async_trait]
pub trait PdfProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn convert(&self, html_url: &Url) -> Result<Bytes, ProviderError>;
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error(transparent)]
    UnknownProvider(#[from] UnknownProvider),
    #[error("`{url}` is not a valid url: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("`{url}` is not an html artifact of this service: {reason}")]
    ForeignArtifact { url: String, reason: &'static str },
    #[error("pdf provider `{0}` is not configured")]
    ProviderUnavailable(ProviderKind),
    #[error("pdf provider `{provider}` failed")]
    Provider {
        provider: ProviderKind,
        #[source]
        source: ProviderError,
    },
    #[error("converted pdf could not be published")]
    Publish(#[from] PublishError),
}

pub struct PdfConverter {
    publisher: Arc<ArtifactPublisher>,
    providers: HashMap<ProviderKind, Arc<dyn PdfProvider>>,
}

impl PdfConverter {
    pub fn new(publisher: Arc<ArtifactPublisher>) -> Self {
        Self {
            publisher,
            providers: HashMap::new(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn PdfProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn has_provider(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// Map a public URL back to the HTML artifact key it was published under.
    pub fn resolve_artifact(&self, raw: &str) -> Result<(Url, ArtifactKey), ConversionError> {
        let raw = raw.trim();
        let url = Url::parse(raw).map_err(|err| ConversionError::InvalidUrl {
            url: raw.to_string(),
            reason: err.to_string(),
        })?;
        let foreign = |reason| ConversionError::ForeignArtifact {
            url: raw.to_string(),
            reason,
        };

        let base = self.publisher.public_base_url();
        if !matches!(url.scheme(), "http" | "https") {
            return Err(foreign("unsupported scheme"));
        }
        if url.host_str() != base.host_str() || url.port() != base.port() {
            return Err(foreign("host does not match the artifact store"));
        }
        let relative = url
            .path()
            .strip_prefix(base.path())
            .ok_or_else(|| foreign("path is outside the artifact store"))?;
        let relative = urlencoding::decode(relative)
            .map_err(|_| foreign("path is not valid utf-8"))?;

        let key = ArtifactKey::parse(&relative)
            .map_err(|_| foreign("path does not name a published artifact"))?;
        if key.kind() != ArtifactKind::Html {
            return Err(foreign("only html artifacts can be converted"));
        }

        Ok((url, key))
    }

    /// Convert the HTML artifact at `html_url` and publish the PDF next to it.
    pub async fn convert(
        &self,
        html_url: &str,
        provider: &str,
    ) -> Result<PublishedArtifact, ConversionError> {
        let kind: ProviderKind = provider.parse()?;
        let (url, html_key) = self.resolve_artifact(html_url)?;
        let provider = self
            .providers
            .get(&kind)
            .ok_or(ConversionError::ProviderUnavailable(kind))?;

        let body = match provider.convert(&url).await {
            Ok(body) if body.is_empty() => Err(ProviderError::EmptyBody),
            other => other,
        };
        let body = body.map_err(|source| {
            counter!(
                METRIC_PDF_CONVERSION_TOTAL,
                "provider" => kind.as_str(),
                "outcome" => "provider_error"
            )
            .increment(1);
            warn!(
                target = "signoff::convert",
                provider = %kind,
                url = %url,
                error = %source,
                "pdf provider failed"
            );
            ConversionError::Provider {
                provider: kind,
                source,
            }
        })?;

        let stem = format!("{}{}", kind.file_prefix(), html_key.stem());
        let pdf_key = html_key.sibling(stem, ArtifactKind::Pdf);
        let published = self
            .publisher
            .publish_artifact(pdf_key, body)
            .await
            .inspect_err(|_| {
                counter!(
                    METRIC_PDF_CONVERSION_TOTAL,
                    "provider" => kind.as_str(),
                    "outcome" => "publish_error"
                )
                .increment(1);
            })?;

        counter!(
            METRIC_PDF_CONVERSION_TOTAL,
            "provider" => kind.as_str(),
            "outcome" => "success"
        )
        .increment(1);
        info!(
            target = "signoff::convert",
            provider = %kind,
            html = %url,
            pdf = %published.url,
            "pdf published"
        );

        Ok(published)
    }
}
