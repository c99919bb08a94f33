//! Persisting rendered artifacts and handing back their public URLs.

use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
    application::{
        prepare::PreparedReport,
        store::{ObjectStore, StoreError, StoredObject},
    },
    domain::{
        naming::{ArtifactKey, ArtifactKind},
        report::InspectionReport,
    },
};

const METRIC_PUBLISH_TOTAL: &str = "signoff_publish_total";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("report could not be serialized")]
    Serialize(#[from] serde_json::Error),
    #[error("public url for `{key}` could not be built")]
    Url {
        key: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to write {kind} artifact `{key}`")]
    Store {
        kind: ArtifactKind,
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("{published} artifact landed at {url} but the {failed} artifact failed")]
    Partial {
        published: ArtifactKind,
        url: String,
        failed: ArtifactKind,
        #[source]
        source: StoreError,
    },
    #[error("neither html nor json artifact could be written")]
    Failed {
        html: StoreError,
        #[source]
        json: StoreError,
    },
}

/// One artifact after it was written.
#[derive(Debug, Clone)]
pub struct PublishedArtifact {
    pub key: ArtifactKey,
    pub url: Url,
    pub stored: StoredObject,
}

/// The HTML and JSON artifacts of one report publish.
#[derive(Debug, Clone)]
pub struct PublishedArtifacts {
    pub html: PublishedArtifact,
    pub json: PublishedArtifact,
}

pub struct ArtifactPublisher {
    store: Arc<dyn ObjectStore>,
    public_base_url: Url,
}

impl ArtifactPublisher {
    pub fn new(store: Arc<dyn ObjectStore>, mut public_base_url: Url) -> Self {
        if !public_base_url.path().ends_with('/') {
            let path = format!("{}/", public_base_url.path());
            public_base_url.set_path(&path);
        }
        Self {
            store,
            public_base_url,
        }
    }

    /// Base URL every published key is resolved against; always ends in `/`.
    pub fn public_base_url(&self) -> &Url {
        &self.public_base_url
    }

    /// Public URL of `key`. The file name is percent-encoded so stems holding
    /// URL syntax such as `#` or `?` still address the stored object.
    pub fn public_url(&self, key: &ArtifactKey) -> Result<Url, PublishError> {
        let key = key.to_string();
        let relative = match key.split_once('/') {
            Some((partition, file)) => format!("{partition}/{}", urlencoding::encode(file)),
            None => urlencoding::encode(&key).into_owned(),
        };
        self.public_base_url
            .join(&relative)
            .map_err(|source| PublishError::Url { key, source })
    }

    /// Write the rendered HTML and the JSON dump of the document it came from.
    ///
    /// The writes run concurrently and are not transactional.
    pub async fn publish_report(
        &self,
        prepared: &PreparedReport,
        html: String,
    ) -> Result<PublishedArtifacts, PublishError> {
        let document = &prepared.document;
        let partition = ArtifactKey::partition_for(document.force, document.date);
        let html_key = ArtifactKey::new(partition, prepared.base_name.clone(), ArtifactKind::Html);
        let json_key = html_key.sibling(prepared.base_name.clone(), ArtifactKind::Json);

        let json = json_dump(document)?;
        let html_url = self.public_url(&html_key)?;
        let json_url = self.public_url(&json_key)?;

        let (html_result, json_result) = tokio::join!(
            self.write(&html_key, Bytes::from(html)),
            self.write(&json_key, Bytes::from(json)),
        );

        match (html_result, json_result) {
            (Ok(html_stored), Ok(json_stored)) => {
                counter!(METRIC_PUBLISH_TOTAL, "outcome" => "success").increment(1);
                info!(
                    target = "signoff::publish",
                    report = %prepared.base_name,
                    html = %html_url,
                    json = %json_url,
                    "report published"
                );
                Ok(PublishedArtifacts {
                    html: PublishedArtifact {
                        key: html_key,
                        url: html_url,
                        stored: html_stored,
                    },
                    json: PublishedArtifact {
                        key: json_key,
                        url: json_url,
                        stored: json_stored,
                    },
                })
            }
            (Ok(_), Err(source)) => {
                Err(self.partial(ArtifactKind::Html, &html_url, ArtifactKind::Json, source))
            }
            (Err(source), Ok(_)) => {
                Err(self.partial(ArtifactKind::Json, &json_url, ArtifactKind::Html, source))
            }
            (Err(html), Err(json)) => {
                counter!(METRIC_PUBLISH_TOTAL, "outcome" => "failed").increment(1);
                Err(PublishError::Failed { html, json })
            }
        }
    }

    /// Write a single artifact, used for converted PDFs.
    pub async fn publish_artifact(
        &self,
        key: ArtifactKey,
        body: Bytes,
    ) -> Result<PublishedArtifact, PublishError> {
        let url = self.public_url(&key)?;
        let stored = self
            .write(&key, body)
            .await
            .map_err(|source| PublishError::Store {
                kind: key.kind(),
                key: key.to_string(),
                source,
            })?;

        info!(
            target = "signoff::publish",
            key = %key,
            size_bytes = stored.size_bytes,
            "artifact published"
        );
        Ok(PublishedArtifact { key, url, stored })
    }

    async fn write(&self, key: &ArtifactKey, body: Bytes) -> Result<StoredObject, StoreError> {
        self.store
            .put(&key.to_string(), body, key.kind().content_type())
            .await
    }

    fn partial(
        &self,
        published: ArtifactKind,
        url: &Url,
        failed: ArtifactKind,
        source: StoreError,
    ) -> PublishError {
        counter!(METRIC_PUBLISH_TOTAL, "outcome" => "partial").increment(1);
        warn!(
            target = "signoff::publish",
            published = %published,
            url = %url,
            failed = %failed,
            error = %source,
            "report only partially published"
        );
        PublishError::Partial {
            published,
            url: url.to_string(),
            failed,
            source,
        }
    }
}

/// Pretty-printed JSON with four-space indentation.
pub fn json_dump(document: &InspectionReport) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    document.serialize(&mut serializer)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use time::macros::{date, datetime};
    use time::OffsetDateTime;

    use crate::infra::storage::MemoryStore;

    /// Fails every write whose key ends with the configured extension.
    struct FailingStore {
        inner: MemoryStore,
        failing: Vec<&'static str>,
    }

    #[async_trait]
    impl ObjectStore for FailingStore {
        async fn put(
            &self,
            key: &str,
            body: Bytes,
            content_type: &str,
        ) -> Result<StoredObject, StoreError> {
            if self.failing.iter().any(|ext| key.ends_with(ext)) {
                return Err(StoreError::rejected("bucket unavailable"));
            }
            self.inner.put(key, body, content_type).await
        }
    }

    fn prepared(force: bool) -> PreparedReport {
        PreparedReport {
            document: InspectionReport {
                id: "unit-1".into(),
                force,
                date: Some(datetime!(2018-06-14 10:00 UTC)),
                ..InspectionReport::default()
            },
            base_name: "unit-1".into(),
        }
    }

    fn base() -> Url {
        Url::parse("https://reports.example.com/artifacts").expect("url")
    }

    #[tokio::test]
    async fn publishes_html_and_json_side_by_side() {
        let store = Arc::new(MemoryStore::new());
        let publisher = ArtifactPublisher::new(store.clone(), base());

        let published = publisher
            .publish_report(&prepared(false), "<p>hi</p>".into())
            .await
            .expect("publish");

        let today = OffsetDateTime::now_utc().date();
        assert_eq!(published.html.key.partition(), today);
        assert_eq!(published.json.key.partition(), today);
        assert!(published.html.url.as_str().ends_with("/unit-1.html"));
        assert!(
            published
                .json
                .url
                .as_str()
                .starts_with("https://reports.example.com/artifacts/")
        );

        let html = store.get(&published.html.key.to_string()).expect("html");
        assert_eq!(html.content_type, "text/html; charset=UTF-8");
        let json = store.get(&published.json.key.to_string()).expect("json");
        assert_eq!(json.content_type, "application/json; charset=UTF-8");
        assert!(String::from_utf8_lossy(&json.body).contains("\n    \"id\": \"unit-1\""));
    }

    #[tokio::test]
    async fn forced_reports_use_document_date() {
        let store = Arc::new(MemoryStore::new());
        let publisher = ArtifactPublisher::new(store.clone(), base());

        let published = publisher
            .publish_report(&prepared(true), String::new())
            .await
            .expect("publish");

        assert_eq!(published.html.key.partition(), date!(2018 - 06 - 14));
        assert_eq!(
            store.keys(),
            vec![
                "2018-06-14/unit-1.html".to_string(),
                "2018-06-14/unit-1.json".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn one_failed_write_is_partial() {
        let store = Arc::new(FailingStore {
            inner: MemoryStore::new(),
            failing: vec![".json"],
        });
        let publisher = ArtifactPublisher::new(store, base());

        let err = publisher
            .publish_report(&prepared(true), String::new())
            .await
            .expect_err("partial");

        match err {
            PublishError::Partial {
                published,
                url,
                failed,
                ..
            } => {
                assert_eq!(published, ArtifactKind::Html);
                assert_eq!(failed, ArtifactKind::Json);
                assert_eq!(url, "https://reports.example.com/artifacts/2018-06-14/unit-1.html");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn both_failed_writes_are_total_failure() {
        let store = Arc::new(FailingStore {
            inner: MemoryStore::new(),
            failing: vec![".json", ".html"],
        });
        let publisher = ArtifactPublisher::new(store, base());

        let err = publisher
            .publish_report(&prepared(false), String::new())
            .await
            .expect_err("failure");
        assert!(matches!(err, PublishError::Failed { .. }));
    }

    #[tokio::test]
    async fn single_artifacts_get_their_own_content_type() {
        let store = Arc::new(MemoryStore::new());
        let publisher = ArtifactPublisher::new(store.clone(), base());
        let key = ArtifactKey::new(date!(2020 - 01 - 02), "docraptor-unit", ArtifactKind::Pdf);

        let published = publisher
            .publish_artifact(key, Bytes::from_static(b"%PDF-1.4"))
            .await
            .expect("publish");

        assert_eq!(
            published.url.as_str(),
            "https://reports.example.com/artifacts/2020-01-02/docraptor-unit.pdf"
        );
        let object = store.get("2020-01-02/docraptor-unit.pdf").expect("pdf");
        assert_eq!(object.content_type, "application/pdf");
    }

    #[test]
    fn dump_uses_four_space_indent() {
        let dump = json_dump(&InspectionReport::default()).expect("dump");
        let text = String::from_utf8(dump).expect("utf8");
        assert!(text.starts_with("{\n    \"id\": \"\""));
    }
}
