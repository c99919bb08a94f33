use std::sync::Arc;

use crate::application::{convert::PdfConverter, pipeline::ReportPipeline};

#[derive(Clone)]
pub struct HttpState {
    pub pipeline: Arc<ReportPipeline>,
    pub converter: Arc<PdfConverter>,
    /// Production deployments let crawlers index the submission page.
    pub production: bool,
}
