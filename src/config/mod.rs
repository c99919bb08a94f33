//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    collections::BTreeMap,
    net::SocketAddr,
    num::NonZeroU64,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::naming::{MAX_SUFFIX_BYTES, MIN_SUFFIX_BYTES};

pub use cli::{CliArgs, Command, RenderArgs, ReportOverrides, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "signoff";
const ENV_PREFIX: &str = "SIGNOFF";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_STAGE: &str = "dev";
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_MAX_REQUEST_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_STORAGE_DIR: &str = "artifacts";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://127.0.0.1:3000/artifacts/";
const DEFAULT_CDN_HOST: &str = "res.cloudinary.com";
const DEFAULT_CDN_TRANSFORM: &str = "c_fill,g_auto,h_500,w_500";
const DEFAULT_LOGO: &str = "https://media.unee-t.com/2018-06-14/logo.svg";
const DEFAULT_SUFFIX_BYTES: usize = 4;
const DEFAULT_PDF_TIMEOUT_SECS: u64 = 60;
const DEFAULT_PDF_MARGIN: &str = "10mm";
const DEFAULT_DOCRAPTOR_ENDPOINT: &str = "https://docraptor.com/docs";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
    pub cdn: CdnSettings,
    pub report: ReportSettings,
    pub domains: DomainSettings,
    pub pdf: PdfSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub stage: String,
    pub max_request_bytes: NonZeroU64,
    pub graceful_shutdown: Duration,
}

impl ServerSettings {
    pub fn is_production(&self) -> bool {
        self.stage == "production"
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Filesystem,
    Memory,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub directory: PathBuf,
    pub public_base_url: Url,
}

#[derive(Debug, Clone)]
pub struct CdnSettings {
    pub host: String,
    pub transform: String,
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub default_logo: String,
    pub suffix_bytes: usize,
    pub template_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct DomainSettings {
    pub base: String,
    pub overrides: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct PdfSettings {
    pub timeout: Duration,
    pub headless: Option<HeadlessSettings>,
    pub docraptor: Option<DocRaptorSettings>,
}

/// Page margins forwarded verbatim to the headless print service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfMargin {
    pub top: String,
    pub right: String,
    pub bottom: String,
    pub left: String,
}

impl Default for PdfMargin {
    fn default() -> Self {
        Self {
            top: DEFAULT_PDF_MARGIN.to_string(),
            right: DEFAULT_PDF_MARGIN.to_string(),
            bottom: DEFAULT_PDF_MARGIN.to_string(),
            left: DEFAULT_PDF_MARGIN.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeadlessSettings {
    pub endpoint: Url,
    pub token: String,
    pub margin: PdfMargin,
    pub header_html: Option<String>,
    pub footer_html: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocRaptorSettings {
    pub endpoint: Url,
    pub api_key: String,
    pub test: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => raw.apply_report_overrides(&args.report),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    storage: RawStorageSettings,
    cdn: RawCdnSettings,
    report: RawReportSettings,
    domains: RawDomainSettings,
    pdf: RawPdfSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(stage) = overrides.server_stage.as_ref() {
            self.server.stage = Some(stage.clone());
        }
        if let Some(limit) = overrides.server_max_request_bytes {
            self.server.max_request_bytes = Some(limit);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(backend) = overrides.storage_backend.as_ref() {
            self.storage.backend = Some(backend.clone());
        }
        if let Some(directory) = overrides.storage_directory.as_ref() {
            self.storage.directory = Some(directory.clone());
        }
        if let Some(url) = overrides.storage_public_base_url.as_ref() {
            self.storage.public_base_url = Some(url.clone());
        }
        if let Some(seconds) = overrides.pdf_timeout_seconds {
            self.pdf.timeout_seconds = Some(seconds);
        }

        self.apply_report_overrides(&overrides.report);
    }

    fn apply_report_overrides(&mut self, overrides: &ReportOverrides) {
        if let Some(path) = overrides.template_path.as_ref() {
            self.report.template_path = Some(path.clone());
        }
        if let Some(logo) = overrides.default_logo.as_ref() {
            self.report.default_logo = Some(logo.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            storage,
            cdn,
            report,
            domains,
            pdf,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            storage: build_storage_settings(storage)?,
            cdn: build_cdn_settings(cdn)?,
            report: build_report_settings(report)?,
            domains: build_domain_settings(domains),
            pdf: build_pdf_settings(pdf)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let stage = non_empty(server.stage).unwrap_or_else(|| DEFAULT_STAGE.to_string());

    let max_request_bytes_value = server
        .max_request_bytes
        .unwrap_or(DEFAULT_MAX_REQUEST_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("server.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "server.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        stage,
        max_request_bytes,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let backend = match non_empty(storage.backend).as_deref() {
        None | Some("filesystem") => StorageBackend::Filesystem,
        Some("memory") => StorageBackend::Memory,
        Some(other) => {
            return Err(LoadError::invalid(
                "storage.backend",
                format!("unknown backend `{other}` (expected filesystem or memory)"),
            ));
        }
    };

    let directory = storage
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.directory",
            "path must not be empty",
        ));
    }

    let raw_url = non_empty(storage.public_base_url)
        .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string());
    let public_base_url = parse_http_url(&raw_url, "storage.public_base_url")?;
    if public_base_url.query().is_some() || public_base_url.fragment().is_some() {
        return Err(LoadError::invalid(
            "storage.public_base_url",
            "must not carry a query or fragment",
        ));
    }

    Ok(StorageSettings {
        backend,
        directory,
        public_base_url,
    })
}

fn build_cdn_settings(cdn: RawCdnSettings) -> Result<CdnSettings, LoadError> {
    let host = non_empty(cdn.host).unwrap_or_else(|| DEFAULT_CDN_HOST.to_string());
    if host.contains(['/', ':']) {
        return Err(LoadError::invalid("cdn.host", "expected a bare host name"));
    }

    let transform = non_empty(cdn.transform).unwrap_or_else(|| DEFAULT_CDN_TRANSFORM.to_string());
    if transform.contains(['/', '?', '#', ' ']) {
        return Err(LoadError::invalid(
            "cdn.transform",
            "must be a single path segment",
        ));
    }

    Ok(CdnSettings { host, transform })
}

fn build_report_settings(report: RawReportSettings) -> Result<ReportSettings, LoadError> {
    let default_logo = non_empty(report.default_logo).unwrap_or_else(|| DEFAULT_LOGO.to_string());
    parse_http_url(&default_logo, "report.default_logo")?;

    let suffix_bytes = report.suffix_bytes.unwrap_or(DEFAULT_SUFFIX_BYTES);
    if !(MIN_SUFFIX_BYTES..=MAX_SUFFIX_BYTES).contains(&suffix_bytes) {
        return Err(LoadError::invalid(
            "report.suffix_bytes",
            format!("must be between {MIN_SUFFIX_BYTES} and {MAX_SUFFIX_BYTES}"),
        ));
    }

    let template_path = report
        .template_path
        .filter(|path| !path.as_os_str().is_empty());

    Ok(ReportSettings {
        default_logo,
        suffix_bytes,
        template_path,
    })
}

fn build_domain_settings(domains: RawDomainSettings) -> DomainSettings {
    DomainSettings {
        base: domains.base.unwrap_or_default().trim().to_string(),
        overrides: domains.overrides,
    }
}

fn build_pdf_settings(pdf: RawPdfSettings) -> Result<PdfSettings, LoadError> {
    let timeout_seconds = pdf.timeout_seconds.unwrap_or(DEFAULT_PDF_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "pdf.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let headless = match (non_empty(pdf.headless.endpoint), non_empty(pdf.headless.token)) {
        (None, None) => None,
        (Some(endpoint), Some(token)) => {
            let defaults = PdfMargin::default();
            let margin = pdf.headless.margin;
            Some(HeadlessSettings {
                endpoint: parse_http_url(&endpoint, "pdf.headless.endpoint")?,
                token,
                margin: PdfMargin {
                    top: non_empty(margin.top).unwrap_or(defaults.top),
                    right: non_empty(margin.right).unwrap_or(defaults.right),
                    bottom: non_empty(margin.bottom).unwrap_or(defaults.bottom),
                    left: non_empty(margin.left).unwrap_or(defaults.left),
                },
                header_html: non_empty(pdf.headless.header_html),
                footer_html: non_empty(pdf.headless.footer_html),
            })
        }
        (None, Some(_)) => {
            return Err(LoadError::invalid(
                "pdf.headless.endpoint",
                "required when a token is configured",
            ));
        }
        (Some(_), None) => {
            return Err(LoadError::invalid(
                "pdf.headless.token",
                "required when an endpoint is configured",
            ));
        }
    };

    let docraptor = match non_empty(pdf.docraptor.api_key) {
        None => None,
        Some(api_key) => {
            let endpoint = non_empty(pdf.docraptor.endpoint)
                .unwrap_or_else(|| DEFAULT_DOCRAPTOR_ENDPOINT.to_string());
            Some(DocRaptorSettings {
                endpoint: parse_http_url(&endpoint, "pdf.docraptor.endpoint")?,
                api_key,
                test: pdf.docraptor.test.unwrap_or(false),
            })
        }
    };

    Ok(PdfSettings {
        timeout: Duration::from_secs(timeout_seconds),
        headless,
        docraptor,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    stage: Option<String>,
    max_request_bytes: Option<u64>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    backend: Option<String>,
    directory: Option<PathBuf>,
    public_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCdnSettings {
    host: Option<String>,
    transform: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawReportSettings {
    default_logo: Option<String>,
    suffix_bytes: Option<usize>,
    template_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDomainSettings {
    base: Option<String>,
    overrides: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPdfSettings {
    timeout_seconds: Option<u64>,
    headless: RawHeadlessSettings,
    docraptor: RawDocRaptorSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHeadlessSettings {
    endpoint: Option<String>,
    token: Option<String>,
    margin: RawPdfMargin,
    header_html: Option<String>,
    footer_html: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPdfMargin {
    top: Option<String>,
    right: Option<String>,
    bottom: Option<String>,
    left: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDocRaptorSettings {
    endpoint: Option<String>,
    api_key: Option<String>,
    test: Option<bool>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_http_url(raw: &str, key: &'static str) -> Result<Url, LoadError> {
    let url = Url::parse(raw).map_err(|err| LoadError::invalid(key, err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(LoadError::invalid(key, "expected an absolute http(s) url"));
    }
    Ok(url)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
