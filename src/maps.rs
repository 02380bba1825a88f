use crate::error::AppError;
use crate::google_maps_types::{
    ApiStatus, AutocompleteResponse, DirectionsResponse, DirectionsRoute, LegStep,
    NearbySearchResponse, PlaceDetailsResponse, PlaceResult, TextValue,
};
use crate::polyline;
use crate::types::{Coordinate, Directions, Place, PlaceDetails, RouteSummary, Step, Suggestion};

use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

pub const MAX_NEARBY_RESULTS: usize = 20;
pub const MAX_RADIUS_METERS: i64 = 50_000;
pub const DEFAULT_RADIUS_METERS: i64 = 10_000;
pub const DEFAULT_PLACE_TYPE: &str = "hospital";
pub const TRAVEL_MODE: &str = "driving";

const AUTOCOMPLETE_BIAS_RADIUS_METERS: u32 = 1_000;
const DETAILS_FIELDS: &str = "place_id,name,formatted_address,formatted_phone_number,\
                              international_phone_number,geometry,rating,website";

const NEARBY_PATH: &str = "/maps/api/place/nearbysearch/json";
const DETAILS_PATH: &str = "/maps/api/place/details/json";
const AUTOCOMPLETE_PATH: &str = "/maps/api/place/autocomplete/json";
const DIRECTIONS_PATH: &str = "/maps/api/directions/json";

const UNKNOWN: &str = "Unknown";
const NOT_PROVIDED: &str = "Not Provided";

/// A nearby search that has passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    pub center: Coordinate,
    pub radius: u32,
    pub place_type: String,
    /// Look up phone numbers for every result.
    pub with_contact: bool,
}

impl NearbyQuery {
    pub fn new(
        latitude: f64,
        longitude: f64,
        radius: Option<i64>,
        place_type: Option<&str>,
    ) -> Result<Self, AppError> {
        let center = Coordinate::new(latitude, longitude)?;
        let radius = radius.unwrap_or(DEFAULT_RADIUS_METERS);
        if radius <= 0 || radius > MAX_RADIUS_METERS {
            return Err(AppError::bad_request(format!(
                "Radius must be between 1 and {MAX_RADIUS_METERS} meters"
            )));
        }
        let place_type = match place_type {
            None => DEFAULT_PLACE_TYPE.to_string(),
            Some(t) if t.trim().is_empty() => {
                return Err(AppError::bad_request("Place type must not be empty"))
            }
            Some(t) => t.trim().to_lowercase(),
        };
        Ok(Self {
            center,
            radius: radius as u32,
            place_type,
            with_contact: true,
        })
    }
}

enum Outcome {
    Found,
    Empty,
}

/// Translate a Google status into the internal taxonomy. The vendor's `error_message` is logged
/// and dropped.
fn classify(status: ApiStatus, vendor_message: Option<&str>) -> Result<Outcome, AppError> {
    let err = match status {
        ApiStatus::Ok => return Ok(Outcome::Found),
        ApiStatus::ZeroResults => return Ok(Outcome::Empty),
        ApiStatus::NotFound => AppError::NotFound("No matching place or route".to_string()),
        ApiStatus::RequestDenied => AppError::PermissionDenied,
        ApiStatus::OverQueryLimit | ApiStatus::OverDailyLimit => AppError::RateLimited,
        ApiStatus::InvalidRequest
        | ApiStatus::MaxRouteLengthExceeded
        | ApiStatus::MaxWaypointsExceeded => {
            AppError::bad_request("The maps provider rejected the request parameters")
        }
        ApiStatus::UnknownError => AppError::UpstreamUnavailable,
        ApiStatus::Unrecognized => AppError::UpstreamDataInvalid,
    };
    warn!(
        status = ?status,
        vendor_message = vendor_message.unwrap_or(""),
        "Google Maps reported a failure"
    );
    Err(err)
}

#[derive(Clone)]
pub struct MapsClient {
    http_client: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl MapsClient {
    pub fn new(http_client: reqwest::Client, api_key: &str, api_base: &str) -> Self {
        Self {
            http_client,
            api_key: api_key.to_string(),
            api_base: api_base.to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, AppError> {
        let url = format!("{}{}", self.api_base, path);
        let resp = self
            .http_client
            .get(url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                // the url carries the api key
                let e = e.without_url();
                error!(error = %e, path, "failed to send request to Google Maps");
                AppError::from(e)
            })?;
        if let Some(err) = AppError::from_upstream_status(resp.status()) {
            warn!(status = %resp.status(), path, "Google Maps answered with an error status");
            return Err(err);
        }
        resp.json::<T>().await.map_err(|e| {
            error!(error = %e.without_url(), path, "failed to deserialize Google Maps response");
            AppError::UpstreamDataInvalid
        })
    }

    pub async fn nearby(&self, query: &NearbyQuery) -> Result<Vec<Place>, AppError> {
        let resp: NearbySearchResponse = self
            .get_json(
                NEARBY_PATH,
                &[
                    ("location", query.center.to_string()),
                    ("radius", query.radius.to_string()),
                    ("type", query.place_type.clone()),
                ],
            )
            .await?;
        let mut places = nearby_places(resp)?;
        if query.with_contact {
            self.add_contact_numbers(&mut places).await;
        }
        Ok(places)
    }

    /// Nearby search results carry no phone numbers, so each place gets its own details
    /// lookup, all in flight at once. A failed lookup leaves the placeholders in place.
    async fn add_contact_numbers(&self, places: &mut [Place]) {
        let lookups = places.iter().map(|place| self.details(&place.id));
        let found = join_all(lookups).await;
        for (place, details) in places.iter_mut().zip(found) {
            match details {
                Ok(details) => {
                    place.phone_number = details.phone_number;
                    place.international_phone_number = details.international_phone_number;
                }
                Err(e) => {
                    warn!(place_id = %place.id, error = %e, "no contact details for nearby place")
                }
            }
        }
    }

    pub async fn details(&self, place_id: &str) -> Result<PlaceDetails, AppError> {
        let place_id = place_id.trim();
        if place_id.is_empty() {
            return Err(AppError::bad_request("place_id is required"));
        }
        let resp: PlaceDetailsResponse = self
            .get_json(
                DETAILS_PATH,
                &[
                    ("place_id", place_id.to_string()),
                    ("fields", DETAILS_FIELDS.to_string()),
                ],
            )
            .await?;
        place_details(place_id, resp)
    }

    pub async fn autocomplete(
        &self,
        input: &str,
        bias: Option<Coordinate>,
    ) -> Result<Vec<Suggestion>, AppError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AppError::bad_request("input_text is required"));
        }
        let mut params = vec![("input", input.to_string())];
        if let Some(center) = bias {
            params.push(("location", center.to_string()));
            params.push(("radius", AUTOCOMPLETE_BIAS_RADIUS_METERS.to_string()));
        }
        let resp: AutocompleteResponse = self.get_json(AUTOCOMPLETE_PATH, &params).await?;
        match classify(resp.status, resp.error_message.as_deref())? {
            Outcome::Empty => Ok(vec![]),
            Outcome::Found => Ok(resp
                .predictions
                .into_iter()
                .map(|p| Suggestion {
                    place_id: p.place_id,
                    description: p.description,
                })
                .collect()),
        }
    }

    /// Best route between two points, or `None` when the provider finds no route.
    pub async fn directions(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<Option<Directions>, AppError> {
        let resp: DirectionsResponse = self
            .get_json(
                DIRECTIONS_PATH,
                &[
                    ("origin", origin.to_string()),
                    ("destination", destination.to_string()),
                    ("mode", TRAVEL_MODE.to_string()),
                ],
            )
            .await?;
        directions(resp)
    }

    pub async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<Option<RouteSummary>, AppError> {
        Ok(self
            .directions(origin, destination)
            .await?
            .map(|d| d.summary))
    }
}

fn nearby_places(resp: NearbySearchResponse) -> Result<Vec<Place>, AppError> {
    if let Outcome::Empty = classify(resp.status, resp.error_message.as_deref())? {
        return Ok(vec![]);
    }
    Ok(resp
        .results
        .into_iter()
        .filter_map(|result| {
            let place = place(result);
            if place.is_none() {
                debug!("skipping nearby result without id or location");
            }
            place
        })
        .take(MAX_NEARBY_RESULTS)
        .collect())
}

fn place(result: PlaceResult) -> Option<Place> {
    let id = result.place_id?;
    let location = result.geometry?.location;
    Some(Place {
        id,
        name: result.name.unwrap_or_else(|| UNKNOWN.to_string()),
        address: result
            .formatted_address
            .or(result.vicinity)
            .unwrap_or_else(|| UNKNOWN.to_string()),
        latitude: location.lat,
        longitude: location.lng,
        rating: result.rating,
        phone_number: NOT_PROVIDED.to_string(),
        international_phone_number: NOT_PROVIDED.to_string(),
    })
}

fn place_details(place_id: &str, resp: PlaceDetailsResponse) -> Result<PlaceDetails, AppError> {
    let not_found = || AppError::NotFound(format!("No place found with id '{place_id}'"));
    let result = match classify(resp.status, resp.error_message.as_deref()) {
        Ok(Outcome::Found) => resp.result.ok_or_else(not_found)?,
        Ok(Outcome::Empty) | Err(AppError::NotFound(_)) => return Err(not_found()),
        Err(e) => return Err(e),
    };
    let location = result.geometry.map(|g| g.location);
    Ok(PlaceDetails {
        place_id: result.place_id.unwrap_or_else(|| place_id.to_string()),
        name: result.name.unwrap_or_else(|| UNKNOWN.to_string()),
        address: result
            .formatted_address
            .or(result.vicinity)
            .unwrap_or_else(|| UNKNOWN.to_string()),
        phone_number: result
            .formatted_phone_number
            .unwrap_or_else(|| NOT_PROVIDED.to_string()),
        international_phone_number: result
            .international_phone_number
            .unwrap_or_else(|| NOT_PROVIDED.to_string()),
        latitude: location.map(|l| l.lat),
        longitude: location.map(|l| l.lng),
        rating: result.rating,
        website: result.website.unwrap_or_else(|| NOT_PROVIDED.to_string()),
    })
}

fn directions(resp: DirectionsResponse) -> Result<Option<Directions>, AppError> {
    if let Outcome::Empty = classify(resp.status, resp.error_message.as_deref())? {
        return Ok(None);
    }
    match resp.routes.into_iter().next() {
        Some(route) => best_route(route).map(Some),
        None => Ok(None),
    }
}

fn best_route(route: DirectionsRoute) -> Result<Directions, AppError> {
    let leg = route.legs.into_iter().next().ok_or_else(|| {
        error!("Google Maps route has no legs");
        AppError::UpstreamDataInvalid
    })?;
    let path = match route.overview_polyline {
        Some(encoded) => polyline::decode(&encoded.points).map_err(|e| {
            error!(error = %e, "failed to decode route polyline");
            AppError::UpstreamDataInvalid
        })?,
        None => vec![],
    };
    Ok(Directions {
        summary: RouteSummary {
            duration: text_or_unknown(leg.duration),
            distance: text_or_unknown(leg.distance),
            start_address: leg.start_address.unwrap_or_else(|| UNKNOWN.to_string()),
            end_address: leg.end_address.unwrap_or_else(|| UNKNOWN.to_string()),
        },
        route: path,
        steps: leg.steps.into_iter().map(step).collect(),
    })
}

fn step(step: LegStep) -> Step {
    Step {
        instruction: step
            .html_instructions
            .map(|html| strip_html_tags(&html))
            .unwrap_or_default(),
        distance: text_or_unknown(step.distance),
        duration: text_or_unknown(step.duration),
        location: step.start_location.map(|l| Coordinate {
            latitude: l.lat,
            longitude: l.lng,
        }),
    }
}

fn text_or_unknown(value: Option<TextValue>) -> String {
    value
        .map(|v| v.text)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

const BLOCK_TAGS: [&str; 6] = ["div", "br", "p", "li", "ul", "ol"];

/// Step instructions arrive as HTML fragments (`Turn <b>left</b>`, a trailing
/// `<div>Destination will be on the right</div>`); keep readable text only.
pub fn strip_html_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut tag: Option<String> = None;
    for c in html.chars() {
        if let Some(name) = tag.as_mut() {
            if c == '>' {
                if BLOCK_TAGS.contains(&tag_name(name).as_str()) {
                    text.push(' ');
                }
                tag = None;
            } else {
                name.push(c);
            }
        } else if c == '<' {
            tag = Some(String::new());
        } else {
            text.push(c);
        }
    }
    decode_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let code = name.strip_prefix('#')?;
            let code = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
