//! Template helpers available to every report template.

use std::collections::BTreeMap;

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext,
    RenderErrorReason,
};
use time::{
    OffsetDateTime, format_description::BorrowedFormatItem, format_description::well_known::Rfc3339,
    macros::format_description,
};

use crate::domain::cdn::{CdnError, ImageNormalizer};

const PRETTY_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day padding:none] [month repr:short] [year]");
const YMD_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// Resolves logical service names to host names for the deployment environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainDirectory {
    base: String,
    overrides: BTreeMap<String, String>,
}

impl DomainDirectory {
    pub fn new(base: impl Into<String>, overrides: BTreeMap<String, String>) -> Self {
        Self {
            base: base.into(),
            overrides,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `service.<base>` unless an explicit override exists.
    pub fn resolve(&self, service: &str) -> String {
        if let Some(host) = self.overrides.get(service) {
            return host.clone();
        }
        if self.base.is_empty() {
            return service.to_string();
        }
        format!("{service}.{}", self.base)
    }
}

pub(super) fn register(
    registry: &mut Handlebars<'static>,
    normalizer: ImageNormalizer,
    domains: DomainDirectory,
) {
    registry.register_helper("prettyDate", Box::new(pretty_date_helper));
    registry.register_helper("ymdDate", Box::new(ymd_date_helper));
    registry.register_helper("increment", Box::new(increment_helper));
    registry.register_helper("domain", Box::new(DomainHelper { domains }));
    registry.register_helper("transform", Box::new(TransformHelper { normalizer }));
}

fn date_param(h: &Helper, helper: &'static str) -> Result<OffsetDateTime, RenderErrorReason> {
    let raw = h
        .param(0)
        .and_then(|value| value.value().as_str())
        .ok_or(RenderErrorReason::ParamNotFoundForIndex(helper, 0))?;
    OffsetDateTime::parse(raw, &Rfc3339)
        .map_err(|_| RenderErrorReason::InvalidParamType("RFC 3339 date"))
}

fn pretty_date_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let date = date_param(h, "prettyDate")?;
    let formatted = date
        .format(PRETTY_DATE_FORMAT)
        .map_err(|err| RenderErrorReason::Other(err.to_string()))?;
    out.write(&formatted)?;
    Ok(())
}

fn ymd_date_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let date = date_param(h, "ymdDate")?;
    let formatted = date
        .format(YMD_DATE_FORMAT)
        .map_err(|err| RenderErrorReason::Other(err.to_string()))?;
    out.write(&formatted)?;
    Ok(())
}

fn increment_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let index = h
        .param(0)
        .and_then(|value| value.value().as_u64())
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("increment", 0))?;
    out.write(&(index + 1).to_string())?;
    Ok(())
}

struct DomainHelper {
    domains: DomainDirectory,
}

impl HelperDef for DomainHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let service = h
            .param(0)
            .and_then(|value| value.value().as_str())
            .ok_or(RenderErrorReason::ParamNotFoundForIndex("domain", 0))?;
        out.write(&r.get_escape_fn()(&self.domains.resolve(service)))?;
        Ok(())
    }
}

struct TransformHelper {
    normalizer: ImageNormalizer,
}

impl HelperDef for TransformHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let raw = h
            .param(0)
            .and_then(|value| value.value().as_str())
            .ok_or(RenderErrorReason::ParamNotFoundForIndex("transform", 0))?;
        let directive = match h.param(1) {
            Some(value) => value
                .value()
                .as_str()
                .ok_or(RenderErrorReason::InvalidParamType("transform directive"))?,
            None => self.normalizer.directive(),
        };
        let url = match self.normalizer.rewriter().rewrite(raw, directive) {
            Ok(url) => url,
            Err(err @ CdnError::InvalidTransform { .. }) => {
                return Err(RenderErrorReason::Other(err.to_string()).into());
            }
            // Foreign or malformed URLs render as given.
            Err(_) => raw.to_string(),
        };
        out.write(&r.get_escape_fn()(&url))?;
        Ok(())
    }
}
