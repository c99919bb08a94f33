//! Decoding of manual form submissions onto the demo report.
//!
//! Keys are dotted paths into the report (`unit.information.city`,
//! `signatures.0.name`) and match case-insensitively. Keys that name nothing
//! are ignored, as are empty values, so a blank form input keeps the demo value.

use axum::extract::Multipart;
use thiserror::Error;
use time::{
    Date, OffsetDateTime, format_description::BorrowedFormatItem,
    format_description::well_known::Rfc3339, macros::format_description,
};

use crate::domain::report::{InspectionReport, Signature, demo_report};

/// Highest signature index a form may address.
pub const MAX_SIGNATURE_INDEX: usize = 31;

const DAY_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Error)]
pub enum FormError {
    #[error("malformed multipart body: {0}")]
    Multipart(String),
    #[error("field `{field}` is not valid: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl FormError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Read every text field of a multipart body, in order.
pub async fn read_fields(mut multipart: Multipart) -> Result<Vec<(String, String)>, FormError> {
    let mut fields = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| FormError::Multipart(err.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let value = field
            .text()
            .await
            .map_err(|err| FormError::Multipart(err.body_text()))?;
        fields.push((name, value));
    }
    Ok(fields)
}

/// Build a report from the demo report with `fields` layered on top.
pub fn report_from_fields(fields: &[(String, String)]) -> Result<InspectionReport, FormError> {
    let mut report = demo_report();
    let mut images_replaced = false;

    for (raw_key, value) in fields {
        if value.trim().is_empty() {
            continue;
        }
        let key = raw_key.trim().to_ascii_lowercase();
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["id"] => report.id = value.trim().to_string(),
            ["logo"] => report.logo = Some(value.trim().to_string()),
            ["template"] => report.template = Some(value.trim().to_string()),
            ["force"] => report.force = parse_bool(raw_key, value)?,
            ["date"] => report.date = Some(parse_date(raw_key, value)?),
            ["unit", "information", field] => {
                let info = &mut report.unit.information;
                let slot = match *field {
                    "name" => &mut info.name,
                    "type" => &mut info.kind,
                    "address" => &mut info.address,
                    "postcode" => &mut info.postcode,
                    "city" => &mut info.city,
                    "state" => &mut info.state,
                    "country" => &mut info.country,
                    "description" => &mut info.description,
                    _ => continue,
                };
                *slot = value.clone();
            }
            ["report", "name"] => report.report.name = value.clone(),
            ["report", "description"] => report.report.description = value.clone(),
            ["report", "comments"] => report.report.comments = value.clone(),
            ["report", "images"] => {
                if !images_replaced {
                    report.report.images.clear();
                    images_replaced = true;
                }
                report.report.images.push(value.trim().to_string());
            }
            ["signatures", index, field] => {
                if !matches!(*field, "name" | "role" | "email" | "data_uri" | "datauri") {
                    continue;
                }
                let index: usize = index
                    .parse()
                    .map_err(|_| FormError::invalid(raw_key, "signature index is not a number"))?;
                if index > MAX_SIGNATURE_INDEX {
                    return Err(FormError::invalid(
                        raw_key,
                        format!("signature index must not exceed {MAX_SIGNATURE_INDEX}"),
                    ));
                }
                if report.signatures.len() <= index {
                    report.signatures.resize_with(index + 1, Signature::default);
                }
                let signature = &mut report.signatures[index];
                let slot = match *field {
                    "name" => &mut signature.name,
                    "role" => &mut signature.role,
                    "email" => &mut signature.email,
                    _ => &mut signature.data_uri,
                };
                *slot = value.clone();
            }
            _ => {}
        }
    }

    Ok(report)
}

fn parse_bool(field: &str, value: &str) -> Result<bool, FormError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "on" | "yes" => Ok(true),
        "0" | "f" | "false" | "off" | "no" => Ok(false),
        other => Err(FormError::invalid(field, format!("`{other}` is not a boolean"))),
    }
}

fn parse_date(field: &str, value: &str) -> Result<OffsetDateTime, FormError> {
    let value = value.trim();
    if let Ok(date) = OffsetDateTime::parse(value, &Rfc3339) {
        return Ok(date);
    }
    Date::parse(value, DAY_FORMAT)
        .map(|date| date.midnight().assume_utc())
        .map_err(|_| FormError::invalid(field, "expected RFC 3339 or YYYY-MM-DD"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn no_fields_yields_the_demo_report() {
        let report = report_from_fields(&[]).expect("decode");
        assert_eq!(report.id, demo_report().id);
        assert!(!report.report.rooms.is_empty());
    }

    #[test]
    fn fields_overwrite_demo_values_case_insensitively() {
        let report = report_from_fields(&fields(&[
            ("ID", "unit-9"),
            ("Unit.Information.City", "Oslo"),
            ("unit.information.type", "House"),
            ("report.name", "Spring check"),
            ("force", "on"),
            ("date", "2018-06-14"),
            ("logo", "  "),
        ]))
        .expect("decode");

        assert_eq!(report.id, "unit-9");
        assert_eq!(report.unit.information.city, "Oslo");
        assert_eq!(report.unit.information.kind, "House");
        assert_eq!(report.report.name, "Spring check");
        assert!(report.force);
        assert_eq!(report.date, Some(datetime!(2018-06-14 0:00 UTC)));
        assert!(report.logo.is_none());
    }

    #[test]
    fn repeated_images_replace_the_list() {
        let report = report_from_fields(&fields(&[
            ("report.images", "https://res.cloudinary.com/a/image/upload/d/1.jpg"),
            ("report.images", "https://res.cloudinary.com/a/image/upload/d/2.jpg"),
        ]))
        .expect("decode");
        assert_eq!(report.report.images.len(), 2);
        assert!(report.report.images[1].ends_with("/2.jpg"));
    }

    #[test]
    fn signatures_grow_to_the_addressed_index() {
        let report = report_from_fields(&fields(&[
            ("signatures.1.name", "Grace"),
            ("signatures.1.data_uri", "data:image/png;base64,AAAA"),
            ("signatures.0.role", "Tenant"),
        ]))
        .expect("decode");

        assert_eq!(report.signatures.len(), 2);
        assert_eq!(report.signatures[0].role, "Tenant");
        assert_eq!(report.signatures[1].name, "Grace");
        assert_eq!(report.signatures[1].data_uri, "data:image/png;base64,AAAA");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let report = report_from_fields(&fields(&[
            ("csrf_token", "abc"),
            ("unit.information.colour", "blue"),
            ("signatures.3.phone", "123"),
            ("signatures.40.phone", "456"),
        ]))
        .expect("decode");
        assert_eq!(report.unit.information, demo_report().unit.information);
        assert!(report.signatures.is_empty());
    }

    #[test]
    fn malformed_values_are_rejected() {
        for pairs in [
            [("force", "maybe")],
            [("date", "14/06/2018")],
            [("signatures.x.name", "A")],
            [("signatures.32.name", "A")],
        ] {
            assert!(
                matches!(
                    report_from_fields(&fields(&pairs)),
                    Err(FormError::InvalidValue { .. })
                ),
                "accepted {pairs:?}"
            );
        }
    }
}
