use serde::{Deserialize, Serialize};

/// A "meine Tonies" household, the top-level grouping in the Tonie cloud
#[derive(Debug, Clone, Deserialize)]
pub struct Household {
    pub id: String,
    pub name: String,
}

/// A Creative Tonie as reported by the cloud API.
///
/// The device owns its chapter list and remaining capacity; this is a snapshot
/// that goes stale whenever chapters are changed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeTonie {
    pub id: String,
    pub household_id: String,
    pub name: String,
    pub seconds_remaining: f64,
    pub seconds_present: f64,
    pub chapters_remaining: u32,
    pub chapters_present: u32,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

/// One chapter on a Creative Tonie, position given by its index in the list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub file: String,
    pub seconds: f64,
    #[serde(default)]
    pub transcoding: bool,
}
