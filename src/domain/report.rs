//! Inspection report document and the sample used for manual form submissions.

pub use signoff_api_types::{
    Case, InspectionReport, Information, Item, Report, Room, Signature, Unit,
};

use time::OffsetDateTime;

const DEMO_IMAGE_ROOT: &str = "https://res.cloudinary.com/demo/image/upload";

fn demo_image(file: &str) -> String {
    format!("{DEMO_IMAGE_ROOT}/c_fill,g_auto,h_500,w_500/inspection-samples/{file}")
}

/// Fully populated report that form fields are layered onto.
///
/// Lets someone try the renderer from a browser form that only fills in a
/// handful of fields.
pub fn demo_report() -> InspectionReport {
    InspectionReport {
        id: "12345678".to_string(),
        logo: None,
        date: Some(OffsetDateTime::now_utc()),
        signatures: Vec::new(),
        unit: Unit {
            information: Information {
                name: "Unit 01-02".to_string(),
                kind: "Apartment/Flat".to_string(),
                address: "20 Maple Avenue".to_string(),
                postcode: "90731".to_string(),
                city: "San Pedro".to_string(),
                state: "California".to_string(),
                country: "USA".to_string(),
                description: "Blue house with a front porch. Parking is not allowed in the driveway"
                    .to_string(),
            },
        },
        report: Report {
            name: "20 Maple Avenue, Unit 01-02".to_string(),
            description: String::new(),
            images: vec![demo_image("table_succulent.jpg"), demo_image("entrance.jpg")],
            cases: vec![Case {
                title: "Cracks on Ceiling".to_string(),
                images: vec![demo_image("ceiling.jpg")],
                category: "Reference".to_string(),
                status: "Confirmed".to_string(),
                details: "Worse over time and rain is sometimes seen to be leaking when it rains."
                    .to_string(),
            }],
            inventory: vec![Item {
                name: "Ivar Shelf".to_string(),
                images: vec![demo_image("shelf.jpg")],
                description: "1 in acceptable condition".to_string(),
            }],
            rooms: vec![
                Room {
                    name: "Big Meeting Room".to_string(),
                    description: "300 sqft with built-in cabinets, air-con and WiFi".to_string(),
                    images: Vec::new(),
                    cases: vec![Case {
                        title: "Light is not working".to_string(),
                        images: vec![demo_image("light.jpg")],
                        category: "Repair".to_string(),
                        status: "Confirmed".to_string(),
                        details: "Lights are unable to turn on after changing the light bulb"
                            .to_string(),
                    }],
                    inventory: Vec::new(),
                },
                Room {
                    name: "Pantry".to_string(),
                    description: "800 sqft, high with built-in cabinets, air-con and WiFi"
                        .to_string(),
                    images: vec![demo_image("pantry.jpg")],
                    cases: Vec::new(),
                    inventory: vec![
                        Item {
                            name: "Fridge".to_string(),
                            images: vec![demo_image("pantry_fridge.jpg")],
                            description: "1 in acceptable working condition".to_string(),
                        },
                        Item {
                            name: "Solid wood long table".to_string(),
                            images: vec![demo_image("pantry_table.jpg")],
                            description: "1 in very bad condition. Edges are wearing out."
                                .to_string(),
                        },
                    ],
                },
            ],
            comments: "A comment pertaining to the report itself.".to_string(),
        },
        template: None,
        force: false,
    }
}
