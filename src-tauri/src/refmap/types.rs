// Shared point shape every reference-map parser emits, independent of the
// source file format.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub name: Option<String>,
    pub description: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub state: Option<String>,
    pub category: Option<String>,
    pub raw_metadata: Option<String>,
}

impl Point {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            name: None,
            description: None,
            lat,
            lng,
            state: None,
            category: None,
            raw_metadata: None,
        }
    }
}
