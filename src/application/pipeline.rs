//! Report publishing: prepare, render, publish.

use std::sync::Arc;

use tracing::instrument;

use crate::{
    application::{
        error::AppError,
        prepare::DocumentPreparer,
        publish::{ArtifactPublisher, PublishedArtifacts},
        render::TemplateRenderer,
    },
    domain::report::InspectionReport,
};

pub struct ReportPipeline {
    preparer: DocumentPreparer,
    renderer: TemplateRenderer,
    publisher: Arc<ArtifactPublisher>,
}

impl ReportPipeline {
    pub fn new(
        preparer: DocumentPreparer,
        renderer: TemplateRenderer,
        publisher: Arc<ArtifactPublisher>,
    ) -> Self {
        Self {
            preparer,
            renderer,
            publisher,
        }
    }

    pub fn publisher(&self) -> &Arc<ArtifactPublisher> {
        &self.publisher
    }

    /// Publish one report. Nothing is written if preparation or rendering fails.
    #[instrument(skip_all, fields(report = %document.id, force = document.force))]
    pub async fn publish(
        &self,
        document: InspectionReport,
    ) -> Result<PublishedArtifacts, AppError> {
        let prepared = self.preparer.prepare(document)?;
        let html = self.renderer.render(&prepared.document).await?;
        Ok(self.publisher.publish_report(&prepared, html).await?)
    }

    /// Prepare and render one report without writing anything.
    pub async fn render(&self, document: InspectionReport) -> Result<String, AppError> {
        let prepared = self.preparer.prepare(document)?;
        Ok(self.renderer.render(&prepared.document).await?)
    }
}
