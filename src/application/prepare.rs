//! Report preparation: defaults, artifact identity and image normalization.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::domain::{
    cdn::ImageNormalizer,
    naming::{EntropySource, NamingError, derive_base_name},
    report::InspectionReport,
};

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("invalid report: {0}")]
    InvalidInput(#[source] NamingError),
    #[error("could not generate artifact suffix")]
    RandomSource(#[source] NamingError),
}

impl From<NamingError> for PrepareError {
    fn from(err: NamingError) -> Self {
        match err {
            NamingError::RandomSource(_) => Self::RandomSource(err),
            other => Self::InvalidInput(other),
        }
    }
}

/// A report ready for rendering together with its artifact base name.
#[derive(Debug, Clone)]
pub struct PreparedReport {
    pub document: InspectionReport,
    pub base_name: String,
}

pub struct DocumentPreparer {
    normalizer: ImageNormalizer,
    default_logo: String,
    suffix_bytes: usize,
    entropy: Arc<dyn EntropySource>,
}

impl DocumentPreparer {
    pub fn new(
        normalizer: ImageNormalizer,
        default_logo: impl Into<String>,
        suffix_bytes: usize,
        entropy: Arc<dyn EntropySource>,
    ) -> Self {
        Self {
            normalizer,
            default_logo: default_logo.into(),
            suffix_bytes,
            entropy,
        }
    }

    pub fn normalizer(&self) -> &ImageNormalizer {
        &self.normalizer
    }

    pub fn prepare(&self, mut document: InspectionReport) -> Result<PreparedReport, PrepareError> {
        if document.logo.as_deref().is_none_or(|logo| logo.trim().is_empty()) {
            debug!(
                target = "signoff::prepare",
                logo = %self.default_logo,
                "report has no logo, using default"
            );
            document.logo = Some(self.default_logo.clone());
        }

        let base_name = derive_base_name(
            &document.id,
            document.force,
            self.entropy.as_ref(),
            self.suffix_bytes,
        )?;
        document.id = base_name.clone();

        if document.date.is_none() {
            document.date = Some(OffsetDateTime::now_utc());
        }

        let mut skipped = 0usize;
        for url in document.images_mut() {
            match self.normalizer.normalize(url) {
                Ok(normalized) => *url = normalized,
                Err(err) => {
                    skipped += 1;
                    warn!(
                        target = "signoff::prepare",
                        report = %base_name,
                        url = %url,
                        error = %err,
                        "image url left unchanged"
                    );
                }
            }
        }

        debug!(
            target = "signoff::prepare",
            report = %base_name,
            images = document.image_count(),
            skipped,
            "report prepared"
        );

        Ok(PreparedReport {
            document,
            base_name,
        })
    }
}
