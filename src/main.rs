use std::{future::IntoFuture, io::Write, process, sync::Arc, time::Duration};

use signoff::{
    application::{
        convert::PdfConverter,
        error::AppError,
        pipeline::ReportPipeline,
        prepare::DocumentPreparer,
        publish::ArtifactPublisher,
        render::{DomainDirectory, HttpTemplateSource, TemplateRenderer},
        store::ObjectStore,
    },
    config::{self, Settings, StorageBackend},
    domain::{
        cdn::{CdnRewriter, ImageNormalizer},
        naming::OsEntropy,
        report::InspectionReport,
    },
    infra::{
        error::InfraError,
        http::{self, HttpState},
        pdf::{DocRaptorProvider, HeadlessProvider, provider_client},
        storage::{FilesystemStore, MemoryStore},
        telemetry,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
    }
}

struct ApplicationContext {
    pipeline: Arc<ReportPipeline>,
    converter: Arc<PdfConverter>,
}

fn build_application_context(settings: &Settings) -> Result<ApplicationContext, AppError> {
    let store: Arc<dyn ObjectStore> = match settings.storage.backend {
        StorageBackend::Filesystem => Arc::new(
            FilesystemStore::new(settings.storage.directory.clone()).map_err(InfraError::from)?,
        ),
        StorageBackend::Memory => {
            warn!(
                target = "signoff::startup",
                "memory storage selected; artifacts are lost on restart"
            );
            Arc::new(MemoryStore::new())
        }
    };
    let publisher = Arc::new(ArtifactPublisher::new(
        store,
        settings.storage.public_base_url.clone(),
    ));

    let normalizer = ImageNormalizer::new(
        CdnRewriter::new(settings.cdn.host.clone()),
        settings.cdn.transform.clone(),
    )
    .map_err(|err| AppError::unexpected(format!("invalid cdn transform: {err}")))?;

    let client = provider_client(settings.pdf.timeout)?;

    let default_template =
        TemplateRenderer::load_default_template(settings.report.template_path.as_deref())
            .map_err(|err| AppError::unexpected(format!("failed to load template: {err}")))?;
    let renderer = TemplateRenderer::new(
        &default_template,
        normalizer.clone(),
        DomainDirectory::new(
            settings.domains.base.clone(),
            settings.domains.overrides.clone(),
        ),
        Arc::new(HttpTemplateSource::new(client.clone())),
    )
    .map_err(|err| AppError::unexpected(format!("failed to compile template: {err}")))?;

    let preparer = DocumentPreparer::new(
        normalizer,
        settings.report.default_logo.clone(),
        settings.report.suffix_bytes,
        Arc::new(OsEntropy),
    );

    let mut converter = PdfConverter::new(publisher.clone());
    if let Some(headless) = settings.pdf.headless.clone() {
        converter = converter.with_provider(Arc::new(HeadlessProvider::new(
            client.clone(),
            headless,
        )));
    }
    if let Some(docraptor) = settings.pdf.docraptor.clone() {
        converter = converter.with_provider(Arc::new(DocRaptorProvider::new(client, docraptor)));
    }

    Ok(ApplicationContext {
        pipeline: Arc::new(ReportPipeline::new(preparer, renderer, publisher)),
        converter: Arc::new(converter),
    })
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings)?;
    let state = HttpState {
        pipeline: app.pipeline,
        converter: app.converter,
        production: settings.server.is_production(),
    };

    serve_http(&settings, state).await
}

async fn run_render(settings: Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let raw = tokio::fs::read(&args.file)
        .await
        .map_err(InfraError::from)?;
    let document: InspectionReport = serde_json::from_slice(&raw).map_err(|err| {
        AppError::validation(format!("{} is not a report: {err}", args.file.display()))
    })?;

    let app = build_application_context(&settings)?;
    let html = app.pipeline.render(document).await?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(html.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(InfraError::from)?;
    Ok(())
}

async fn serve_http(settings: &Settings, state: HttpState) -> Result<(), AppError> {
    let body_limit = usize::try_from(settings.server.max_request_bytes.get())
        .map_err(|_| AppError::unexpected("max_request_bytes exceeds usize"))?;
    let router = http::build_router(state, body_limit);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "signoff::startup",
        addr = %settings.server.addr,
        stage = %settings.server.stage,
        "listening"
    );

    let shutdown = Arc::new(Notify::new());
    let trigger = shutdown.clone();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            trigger.notify_one();
        })
        .into_future();

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = drain_deadline(&shutdown, settings.server.graceful_shutdown) => {
            warn!(
                target = "signoff::shutdown",
                grace_seconds = settings.server.graceful_shutdown.as_secs(),
                "in-flight requests did not finish in time; exiting"
            );
        }
    }

    info!(target = "signoff::shutdown", "server stopped");
    Ok(())
}

async fn drain_deadline(shutdown: &Notify, grace: Duration) {
    shutdown.notified().await;
    tokio::time::sleep(grace).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "signoff::shutdown", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "signoff::shutdown", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!(target = "signoff::shutdown", "shutdown signal received");
}
