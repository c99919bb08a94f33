//! Wire types for the signoff publishing API.
//!
//! The inspection report tree is decoded strictly: unknown fields are
//! rejected, while missing fields fall back to their empty defaults. Every
//! field is always serialized so templates may reference any of them.

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// Top-level document describing one inspection of a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InspectionReport {
    pub id: String,
    pub logo: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
    #[serde(deserialize_with = "null_as_empty")]
    pub signatures: Vec<Signature>,
    pub unit: Unit,
    pub report: Report,
    /// Optional URL of a Handlebars template used instead of the default one.
    pub template: Option<String>,
    /// Publish under `id` verbatim instead of a suffixed, collision-free name.
    pub force: bool,
}

/// A wet signature captured on the inspection form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Signature {
    pub name: String,
    pub role: String,
    /// Matched against the report creator for provenance; never enforced.
    pub email: String,
    pub data_uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Unit {
    pub information: Information,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Information {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
    pub postcode: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Report {
    pub name: String,
    pub description: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub images: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub cases: Vec<Case>,
    #[serde(deserialize_with = "null_as_empty")]
    pub inventory: Vec<Item>,
    #[serde(deserialize_with = "null_as_empty")]
    pub rooms: Vec<Room>,
    pub comments: String,
}

/// A room of the unit. Rooms do not nest further.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Room {
    pub name: String,
    pub description: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub images: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub cases: Vec<Case>,
    #[serde(deserialize_with = "null_as_empty")]
    pub inventory: Vec<Item>,
}

/// An issue raised during the inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Case {
    pub title: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub images: Vec<String>,
    pub category: String,
    /// Free-form status tag such as `Confirmed` or `Reopened`.
    pub status: String,
    pub details: String,
}

/// An inventory entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Item {
    pub name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub images: Vec<String>,
    pub description: String,
}

impl InspectionReport {
    /// Every image URL reachable in the document, in document order.
    pub fn images_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.report.images_mut()
    }

    /// Count of image URLs reachable in the document.
    pub fn image_count(&self) -> usize {
        let report = &self.report;
        report.images.len()
            + case_image_count(&report.cases)
            + item_image_count(&report.inventory)
            + report
                .rooms
                .iter()
                .map(|room| {
                    room.images.len()
                        + case_image_count(&room.cases)
                        + item_image_count(&room.inventory)
                })
                .sum::<usize>()
    }
}

impl Report {
    fn images_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.images
            .iter_mut()
            .chain(case_images_mut(&mut self.cases))
            .chain(item_images_mut(&mut self.inventory))
            .chain(self.rooms.iter_mut().flat_map(|room| room.images_mut()))
    }
}

impl Room {
    fn images_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.images
            .iter_mut()
            .chain(case_images_mut(&mut self.cases))
            .chain(item_images_mut(&mut self.inventory))
    }
}

/// Accepts `null` where a list is expected, as clients that serialize
/// absent slices as `null` send.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn case_images_mut(cases: &mut [Case]) -> impl Iterator<Item = &mut String> {
    cases.iter_mut().flat_map(|case| case.images.iter_mut())
}

fn item_images_mut(items: &mut [Item]) -> impl Iterator<Item = &mut String> {
    items.iter_mut().flat_map(|item| item.images.iter_mut())
}

fn case_image_count(cases: &[Case]) -> usize {
    cases.iter().map(|case| case.images.len()).sum()
}

fn item_image_count(items: &[Item]) -> usize {
    items.iter().map(|item| item.images.len()).sum()
}

/// URLs of the artifacts produced by one report publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedReport {
    #[serde(rename = "HTML")]
    pub html: String,
    #[serde(rename = "JSON")]
    pub json: String,
}

/// URL of a PDF artifact produced from a published HTML report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPdf {
    #[serde(rename = "PDF")]
    pub pdf: String,
}
