//! HTML rendering of prepared reports.
//!
//! The default template ships with the service (or is read from a trusted
//! local path at startup). A report may name its own template by URL; that
//! template is fetched for the one request and compiled against the same
//! registry, which only knows the report helpers and never loads partials or
//! templates from disk.

mod helpers;
mod source;

use std::{path::Path, sync::Arc, time::Instant};

use handlebars::Handlebars;
use metrics::histogram;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::domain::{cdn::ImageNormalizer, report::InspectionReport};

pub use helpers::DomainDirectory;
pub use source::{FetchError, HttpTemplateSource, TemplateSource};

pub const DEFAULT_TEMPLATE: &str = include_str!("../../../templates/report.html.hbs");

const DEFAULT_TEMPLATE_NAME: &str = "report";
const METRIC_RENDER_MS: &str = "signoff_render_ms";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template url `{url}` is not usable: {reason}")]
    TemplateUrl { url: String, reason: String },
    #[error("failed to fetch template from `{url}`")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("template failed to render")]
    Template(#[from] handlebars::RenderError),
    #[error("report could not be serialized for rendering")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TemplateLoadError {
    #[error("failed to read template `{path}`")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("default template does not compile")]
    Compile(#[from] Box<handlebars::TemplateError>),
}

pub struct TemplateRenderer {
    registry: Handlebars<'static>,
    source: Arc<dyn TemplateSource>,
}

impl TemplateRenderer {
    /// Build a renderer around the given default template markup.
    pub fn new(
        default_template: &str,
        normalizer: ImageNormalizer,
        domains: DomainDirectory,
        source: Arc<dyn TemplateSource>,
    ) -> Result<Self, TemplateLoadError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        helpers::register(&mut registry, normalizer, domains);
        registry
            .register_template_string(DEFAULT_TEMPLATE_NAME, default_template)
            .map_err(Box::new)?;

        Ok(Self { registry, source })
    }

    /// Read the default template from `path`, or use the built-in one.
    pub fn load_default_template(path: Option<&Path>) -> Result<String, TemplateLoadError> {
        match path {
            Some(path) => {
                std::fs::read_to_string(path).map_err(|source| TemplateLoadError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
            None => Ok(DEFAULT_TEMPLATE.to_string()),
        }
    }

    pub async fn render(&self, document: &InspectionReport) -> Result<String, RenderError> {
        let started_at = Instant::now();
        let data = serde_json::to_value(document)?;

        let html = match external_template(document)? {
            Some(url) => {
                let markup =
                    self.source
                        .fetch(&url)
                        .await
                        .map_err(|source| RenderError::Fetch {
                            url: url.to_string(),
                            source,
                        })?;
                info!(
                    target = "signoff::render",
                    report = %document.id,
                    template = %url,
                    bytes = markup.len(),
                    "rendering with external template"
                );
                self.registry.render_template(&markup, &data)?
            }
            None => self.registry.render(DEFAULT_TEMPLATE_NAME, &data)?,
        };

        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_RENDER_MS).record(elapsed_ms);
        debug!(
            target = "signoff::render",
            report = %document.id,
            bytes = html.len(),
            elapsed_ms,
            "report rendered"
        );

        Ok(html)
    }
}

fn external_template(document: &InspectionReport) -> Result<Option<Url>, RenderError> {
    let Some(raw) = document
        .template
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
    else {
        return Ok(None);
    };

    let url = Url::parse(raw).map_err(|err| RenderError::TemplateUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(RenderError::TemplateUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme `{}`", url.scheme()),
        });
    }
    Ok(Some(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use time::macros::datetime;

    use crate::domain::cdn::CdnRewriter;
    use crate::domain::report::{Case, Room, Signature};

    #[derive(Default)]
    struct StaticSource {
        templates: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TemplateSource for StaticSource {
        async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
            self.requests
                .lock()
                .expect("lock")
                .push(url.to_string());
            self.templates
                .get(url.as_str())
                .cloned()
                .ok_or(FetchError::Status(404))
        }
    }

    fn renderer_with(default_template: &str, source: Arc<StaticSource>) -> TemplateRenderer {
        let normalizer =
            ImageNormalizer::new(CdnRewriter::new("res.cloudinary.com"), "c_fill,w_500")
                .expect("normalizer");
        TemplateRenderer::new(
            default_template,
            normalizer,
            DomainDirectory::new("example.com", BTreeMap::new()),
            source,
        )
        .expect("renderer")
    }

    fn sample() -> InspectionReport {
        InspectionReport {
            id: "unit-1-00ff".into(),
            logo: Some("https://media.example.com/logo.svg".into()),
            date: Some(datetime!(2018-06-14 09:00 UTC)),
            signatures: vec![Signature {
                name: "Ada".into(),
                role: "Inspector".into(),
                email: "ada@example.com".into(),
                data_uri: "data:image/png;base64,AAAA".into(),
            }],
            report: crate::domain::report::Report {
                name: "Flat 3".into(),
                images: vec!["https://res.cloudinary.com/acct/image/upload/d/a.jpg".into()],
                rooms: vec![Room {
                    name: "Kitchen".into(),
                    cases: vec![Case {
                        title: "Leaking tap".into(),
                        ..Case::default()
                    }],
                    ..Room::default()
                }],
                ..Default::default()
            },
            ..InspectionReport::default()
        }
    }

    #[tokio::test]
    async fn default_template_renders_report() {
        let renderer = renderer_with(DEFAULT_TEMPLATE, Arc::new(StaticSource::default()));
        let html = renderer.render(&sample()).await.expect("render");

        assert!(html.contains("<title>Flat 3</title>"));
        assert!(html.contains("14 Jun 2018"));
        assert!(html.contains("Kitchen"));
        assert!(html.contains("1. Leaking tap"));
        assert!(html.contains("https://res.cloudinary.com/acct/c_fill,w_500/d/a.jpg"));
        assert!(html.contains("Report unit-1-00ff"));
        assert!(html.contains("case.example.com"));
    }

    #[tokio::test]
    async fn external_template_is_fetched_and_used() {
        let url = "https://templates.example.com/short.hbs";
        let mut source = StaticSource::default();
        source
            .templates
            .insert(url.into(), "{{id}} on {{ymdDate date}}".into());
        let source = Arc::new(source);
        let renderer = renderer_with(DEFAULT_TEMPLATE, source.clone());

        let mut report = sample();
        report.template = Some(url.into());
        let html = renderer.render(&report).await.expect("render");

        assert_eq!(html, "unit-1-00ff on 2018-06-14");
        assert_eq!(*source.requests.lock().expect("lock"), vec![url.to_string()]);
    }

    #[tokio::test]
    async fn fetch_failure_is_a_render_error() {
        let renderer = renderer_with(DEFAULT_TEMPLATE, Arc::new(StaticSource::default()));
        let mut report = sample();
        report.template = Some("https://templates.example.com/missing.hbs".into());

        let err = renderer.render(&report).await.expect_err("missing template");
        assert!(matches!(
            err,
            RenderError::Fetch {
                source: FetchError::Status(404),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn template_urls_must_be_http() {
        let source = Arc::new(StaticSource::default());
        let renderer = renderer_with(DEFAULT_TEMPLATE, source.clone());
        let mut report = sample();
        report.template = Some("file:///etc/passwd".into());

        let err = renderer.render(&report).await.expect_err("file url");
        assert!(matches!(err, RenderError::TemplateUrl { .. }));
        assert!(source.requests.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn unknown_fields_fail_in_strict_mode() {
        let url = "https://templates.example.com/typo.hbs";
        let mut source = StaticSource::default();
        source.templates.insert(url.into(), "{{reprot.name}}".into());
        let renderer = renderer_with(DEFAULT_TEMPLATE, Arc::new(source));

        let mut report = sample();
        report.template = Some(url.into());
        let err = renderer.render(&report).await.expect_err("strict mode");
        assert!(matches!(err, RenderError::Template(_)));
    }

    #[tokio::test]
    async fn broken_external_template_does_not_compile() {
        let url = "https://templates.example.com/broken.hbs";
        let mut source = StaticSource::default();
        source.templates.insert(url.into(), "{{#each rooms}}".into());
        let renderer = renderer_with(DEFAULT_TEMPLATE, Arc::new(source));

        let mut report = sample();
        report.template = Some(url.into());
        assert!(matches!(
            renderer.render(&report).await,
            Err(RenderError::Template(_))
        ));
    }

    #[test]
    fn broken_default_template_is_rejected_at_startup() {
        let normalizer =
            ImageNormalizer::new(CdnRewriter::new("res.cloudinary.com"), "c_fill,w_500")
                .expect("normalizer");
        let result = TemplateRenderer::new(
            "{{#if}}",
            normalizer,
            DomainDirectory::default(),
            Arc::new(StaticSource::default()),
        );
        assert!(matches!(result, Err(TemplateLoadError::Compile(_))));
    }

    #[test]
    fn missing_template_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.hbs");
        assert!(matches!(
            TemplateRenderer::load_default_template(Some(&path)),
            Err(TemplateLoadError::Read { .. })
        ));
        assert_eq!(
            TemplateRenderer::load_default_template(None).expect("builtin"),
            DEFAULT_TEMPLATE
        );
    }
}
