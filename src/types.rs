use crate::advice::AdviceClient;
use crate::config::Config;
use crate::error::AppError;
use crate::maps::MapsClient;
use crate::sms::SmsClient;
use crate::users::UserStore;

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Validated constructor: latitude in [-90, 90], longitude in [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, AppError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(AppError::bad_request("Latitude must be between -90 and 90"));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::bad_request(
                "Longitude must be between -180 and 180",
            ));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Renders as `lat,lng`, the form Google expects in query parameters.
impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

impl FromStr for Coordinate {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| AppError::bad_request(format!("Expected 'lat,lng', got '{s}'")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| AppError::bad_request(format!("Expected 'lat,lng', got '{s}'")))
        };
        Coordinate::new(parse(lat)?, parse(lng)?)
    }
}

/// Nearby-search result item.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(serialize_with = "rating_or_na")]
    pub rating: Option<f64>,
    pub phone_number: String,
    pub international_phone_number: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlaceDetails {
    pub place_id: String,
    pub name: String,
    pub address: String,
    pub phone_number: String,
    pub international_phone_number: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(serialize_with = "rating_or_na")]
    pub rating: Option<f64>,
    pub website: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Suggestion {
    pub place_id: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteSummary {
    pub duration: String,
    pub distance: String,
    pub start_address: String,
    pub end_address: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Step {
    pub instruction: String,
    pub distance: String,
    pub duration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinate>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Directions {
    pub summary: RouteSummary,
    pub route: Vec<Coordinate>,
    pub steps: Vec<Step>,
}

fn rating_or_na<S: Serializer>(rating: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match rating {
        Some(r) => serializer.serialize_f64(*r),
        None => serializer.serialize_str("N/A"),
    }
}

/// Handles shared by every request, constructed once in `main`.
pub struct AppState {
    pub maps: MapsClient,
    pub advice: AdviceClient,
    pub sms: Option<SmsClient>,
    pub users: UserStore,
}

impl AppState {
    pub fn new(config: &Config, http_client: reqwest::Client, users: UserStore) -> Self {
        Self {
            maps: MapsClient::new(
                http_client.clone(),
                &config.maps_api_key,
                &config.maps_api_base,
            ),
            advice: AdviceClient::new(
                http_client.clone(),
                &config.gemini_api_key,
                &config.gemini_api_base,
                &config.gemini_model,
            ),
            sms: config
                .twilio
                .as_ref()
                .map(|twilio| SmsClient::new(http_client, twilio)),
            users,
        }
    }
}

pub fn http_client(config: &Config) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))
}
