use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub pincode: String,
    pub state: String,
    pub district: String,
    pub place: String,
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
}

/// A region a vehicle owner is willing to operate in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperatingArea {
    pub state: String,
    pub district: String,
    #[serde(default)]
    pub place: Option<String>,
}

impl OperatingArea {
    pub fn covers_state(&self, location: &Location) -> bool {
        self.state.trim().eq_ignore_ascii_case(location.state.trim())
    }

    pub fn covers_district(&self, location: &Location) -> bool {
        self.covers_state(location)
            && self
                .district
                .trim()
                .eq_ignore_ascii_case(location.district.trim())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

/// Reference to a stored photo. The blob itself lives in external storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Photo {
    pub url: String,
}
