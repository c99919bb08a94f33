//! Canonical rewriting of CDN image URLs.
//!
//! CDN delivery URLs look like
//! `https://<host>/<cloud_name>/<resource_type>/<delivery_type>/[<transform|version>/]<dir>/<file>`.
//! Rewriting keeps the cloud name, inserts the requested transform directive
//! and keeps only the final directory and file segments, so a URL that was
//! already rewritten comes out unchanged.

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CdnError {
    #[error("invalid image url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("image host `{host}` is not served by the CDN")]
    UnsupportedHost { host: String },
    #[error("invalid transform directive `{directive}`")]
    InvalidTransform { directive: String },
}

impl CdnError {
    fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Rewrites image URLs hosted on one CDN host.
#[derive(Debug, Clone)]
pub struct CdnRewriter {
    host: String,
}

impl CdnRewriter {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Rewrite `raw` so it carries exactly `directive` as its transform segment.
    pub fn rewrite(&self, raw: &str, directive: &str) -> Result<String, CdnError> {
        validate_directive(directive)?;

        let mut url =
            Url::parse(raw.trim()).map_err(|err| CdnError::invalid_url(raw, err.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CdnError::invalid_url(
                raw,
                format!("unsupported scheme `{}`", url.scheme()),
            ));
        }

        let host = url
            .host_str()
            .ok_or_else(|| CdnError::invalid_url(raw, "missing host"))?;
        if !host.eq_ignore_ascii_case(&self.host) {
            return Err(CdnError::UnsupportedHost {
                host: host.to_string(),
            });
        }

        let segments: Vec<String> = url
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        // cloud name plus the directory and file that survive the rewrite
        if segments.len() < 3 {
            return Err(CdnError::invalid_url(
                raw,
                "path is too short for a CDN delivery url",
            ));
        }

        let tail = &segments[segments.len() - 2..];
        let path = format!("/{}/{}/{}", segments[0], directive, tail.join("/"));

        url.set_path(&path);
        url.set_scheme("https")
            .map_err(|_| CdnError::invalid_url(raw, "scheme cannot be upgraded to https"))?;

        Ok(url.to_string())
    }
}

fn validate_directive(directive: &str) -> Result<(), CdnError> {
    let trimmed = directive.trim();
    if trimmed.is_empty() || trimmed != directive || directive.contains(['/', '?', '#']) {
        return Err(CdnError::InvalidTransform {
            directive: directive.to_string(),
        });
    }
    Ok(())
}

/// Image rewriting bound to the fixed directive applied during report preparation.
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    rewriter: CdnRewriter,
    directive: String,
}

impl ImageNormalizer {
    pub fn new(rewriter: CdnRewriter, directive: impl Into<String>) -> Result<Self, CdnError> {
        let directive = directive.into();
        validate_directive(&directive)?;
        Ok(Self {
            rewriter,
            directive,
        })
    }

    pub fn rewriter(&self) -> &CdnRewriter {
        &self.rewriter
    }

    pub fn directive(&self) -> &str {
        &self.directive
    }

    pub fn normalize(&self, raw: &str) -> Result<String, CdnError> {
        self.rewriter.rewrite(raw, &self.directive)
    }
}
