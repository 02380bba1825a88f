use serde::Deserialize;

/// The `status` field every Google Maps web service response carries.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiStatus {
    Ok,
    ZeroResults,
    NotFound,
    RequestDenied,
    OverQueryLimit,
    OverDailyLimit,
    InvalidRequest,
    MaxRouteLengthExceeded,
    MaxWaypointsExceeded,
    UnknownError,
    #[serde(other)]
    Unrecognized,
}

#[derive(Deserialize, Debug)]
pub struct NearbySearchResponse {
    pub status: ApiStatus,
    #[serde(default)]
    pub results: Vec<PlaceResult>,
    pub error_message: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct PlaceDetailsResponse {
    pub status: ApiStatus,
    pub result: Option<PlaceResult>,
    pub error_message: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PlaceResult {
    pub place_id: Option<String>,
    pub name: Option<String>,
    // nearby search fills `vicinity`, details fills `formatted_address`
    pub vicinity: Option<String>,
    pub formatted_address: Option<String>,
    pub formatted_phone_number: Option<String>,
    pub international_phone_number: Option<String>,
    pub website: Option<String>,
    pub geometry: Option<Geometry>,
    pub rating: Option<f64>,
}

#[derive(Deserialize, Debug)]
pub struct Geometry {
    pub location: LatLng,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Deserialize, Debug)]
pub struct AutocompleteResponse {
    pub status: ApiStatus,
    #[serde(default)]
    pub predictions: Vec<Prediction>,
    pub error_message: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct Prediction {
    pub place_id: String,
    pub description: String,
}

#[derive(Deserialize, Debug)]
pub struct DirectionsResponse {
    pub status: ApiStatus,
    #[serde(default)]
    pub routes: Vec<DirectionsRoute>,
    pub error_message: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct DirectionsRoute {
    #[serde(default)]
    pub legs: Vec<Leg>,
    pub overview_polyline: Option<EncodedPolyline>,
}

#[derive(Deserialize, Debug)]
pub struct Leg {
    pub distance: Option<TextValue>,
    pub duration: Option<TextValue>,
    pub start_address: Option<String>,
    pub end_address: Option<String>,
    #[serde(default)]
    pub steps: Vec<LegStep>,
}

#[derive(Deserialize, Debug)]
pub struct LegStep {
    pub html_instructions: Option<String>,
    pub distance: Option<TextValue>,
    pub duration: Option<TextValue>,
    pub start_location: Option<LatLng>,
}

/// Human readable distance or duration (`"5.2 mi"`, `"18 mins"`).
#[derive(Deserialize, Debug)]
pub struct TextValue {
    pub text: String,
}

#[derive(Deserialize, Debug)]
pub struct EncodedPolyline {
    pub points: String,
}
