#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Response, StatusCode},
};
use signoff::{
    application::{
        convert::{PdfConverter, PdfProvider},
        pipeline::ReportPipeline,
        prepare::DocumentPreparer,
        publish::ArtifactPublisher,
        render::{DEFAULT_TEMPLATE, DomainDirectory, HttpTemplateSource, TemplateRenderer},
        store::ObjectStore,
    },
    domain::{
        cdn::{CdnRewriter, ImageNormalizer},
        naming::OsEntropy,
    },
    infra::http::{HttpState, build_router},
};
use url::Url;

pub const PUBLIC_BASE: &str = "https://reports.example.com/artifacts/";
pub const BODY_LIMIT: usize = 1024 * 1024;

pub fn normalizer() -> ImageNormalizer {
    ImageNormalizer::new(
        CdnRewriter::new("res.cloudinary.com"),
        "c_fill,g_auto,h_500,w_500",
    )
    .expect("valid directive")
}

pub fn publisher(store: Arc<dyn ObjectStore>) -> Arc<ArtifactPublisher> {
    Arc::new(ArtifactPublisher::new(
        store,
        Url::parse(PUBLIC_BASE).expect("base url"),
    ))
}

pub fn state(
    store: Arc<dyn ObjectStore>,
    providers: Vec<Arc<dyn PdfProvider>>,
    production: bool,
) -> HttpState {
    let publisher = publisher(store);
    let renderer = TemplateRenderer::new(
        DEFAULT_TEMPLATE,
        normalizer(),
        DomainDirectory::new("example.com", Default::default()),
        Arc::new(HttpTemplateSource::new(reqwest::Client::new())),
    )
    .expect("default template compiles");
    let preparer = DocumentPreparer::new(
        normalizer(),
        "https://media.example.com/logo.svg",
        4,
        Arc::new(OsEntropy),
    );

    let converter = providers
        .into_iter()
        .fold(PdfConverter::new(publisher.clone()), |converter, provider| {
            converter.with_provider(provider)
        });

    HttpState {
        pipeline: Arc::new(ReportPipeline::new(preparer, renderer, publisher)),
        converter: Arc::new(converter),
        production,
    }
}

pub fn router(store: Arc<dyn ObjectStore>, providers: Vec<Arc<dyn PdfProvider>>) -> Router {
    build_router(state(store, providers, false), BODY_LIMIT)
}

pub async fn json_body(response: Response<Body>) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let value = serde_json::from_slice(&bytes).expect("json body");
    (status, value)
}

/// Storage key of a URL under [`PUBLIC_BASE`].
pub fn key_of(url: &str) -> String {
    url.strip_prefix(PUBLIC_BASE)
        .unwrap_or_else(|| panic!("{url} is outside the artifact store"))
        .to_string()
}
