use crate::advice::AdviceRequest;
use crate::db_types::UserView;
use crate::error::AppError;
use crate::maps::NearbyQuery;
use crate::types::{AppState, Coordinate, Place, PlaceDetails, RouteSummary, Step, Suggestion};
use crate::users;

use axum::{
    extract::{FromRequest, FromRequestParts, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

/// `Json` that rejects malformed bodies with the usual `bad_request` envelope.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// `Query` counterpart of [`JsonBody`].
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/users", post(create_user))
        .route("/login", post(login))
        .route("/api/places/nearby", get(nearby_places))
        .route("/api/places/details", get(place_details))
        .route("/api/places/autocomplete", get(autocomplete))
        .route("/api/places/routes", get(route_estimate))
        .route("/api/places/directions", get(full_directions))
        // the mobile map screen asks for directions with `lat,lng` pairs
        .route("/directions", get(directions_by_pair))
        .route("/medicalpost", post(medical_post))
        .route("/api/sms", post(send_sms))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub async fn ping() -> impl IntoResponse {
    Json(json!({ "message": "pong" }))
}

#[derive(Deserialize)]
pub struct CreateUserPayload {
    pub phone_number: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Serialize)]
pub struct CreateUserResponse {
    pub message: &'static str,
    pub data: UserView,
}

pub async fn create_user(
    State(app_state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<CreateUserPayload>,
) -> Result<impl IntoResponse, AppError> {
    let user = users::create_user(
        &app_state.users,
        &payload.phone_number,
        &payload.password,
        &payload.full_name,
    )
    .await?;
    info!(user_id = %user.user_id, "user created");
    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            message: "User created successfully",
            data: user.into(),
        }),
    ))
}

#[derive(Deserialize)]
pub struct LoginPayload {
    pub phone_number: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user_id: Uuid,
    pub full_name: String,
    pub phone_number: String,
}

pub async fn login(
    State(app_state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<LoginPayload>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = users::login(&app_state.users, &payload.phone_number, &payload.password).await?;
    Ok(Json(LoginResponse {
        message: "Login successful",
        user_id: user.user_id,
        full_name: user.full_name,
        phone_number: user.phone_number,
    }))
}

#[derive(Deserialize)]
pub struct NearbyParams {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: Option<i64>,
    pub place_type: Option<String>,
    pub with_contact: Option<bool>,
}

#[derive(Serialize)]
pub struct NearbyResponse {
    pub count: usize,
    pub places: Vec<Place>,
}

pub async fn nearby_places(
    State(app_state): State<Arc<AppState>>,
    QueryParams(params): QueryParams<NearbyParams>,
) -> Result<Json<NearbyResponse>, AppError> {
    let mut query = NearbyQuery::new(
        params.latitude,
        params.longitude,
        params.radius,
        params.place_type.as_deref(),
    )?;
    query.with_contact = params.with_contact.unwrap_or(true);
    info!(
        center = %query.center,
        radius = query.radius,
        place_type = %query.place_type,
        "searching nearby places"
    );
    let places = app_state.maps.nearby(&query).await?;
    info!(found = places.len(), "nearby search complete");
    Ok(Json(NearbyResponse {
        count: places.len(),
        places,
    }))
}

#[derive(Deserialize)]
pub struct DetailsParams {
    pub place_id: String,
}

#[derive(Serialize)]
pub struct DetailsResponse {
    pub result: PlaceDetails,
    pub status: &'static str,
}

pub async fn place_details(
    State(app_state): State<Arc<AppState>>,
    QueryParams(params): QueryParams<DetailsParams>,
) -> Result<Json<DetailsResponse>, AppError> {
    info!(place_id = %params.place_id, "fetching place details");
    let result = app_state.maps.details(&params.place_id).await?;
    Ok(Json(DetailsResponse {
        result,
        status: "OK",
    }))
}

#[derive(Deserialize)]
pub struct AutocompleteParams {
    pub input_text: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Serialize)]
pub struct AutocompleteResponse {
    pub predictions: Vec<Suggestion>,
}

pub async fn autocomplete(
    State(app_state): State<Arc<AppState>>,
    QueryParams(params): QueryParams<AutocompleteParams>,
) -> Result<Json<AutocompleteResponse>, AppError> {
    let bias = match (params.latitude, params.longitude) {
        (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)?),
        (None, None) => None,
        _ => {
            return Err(AppError::bad_request(
                "latitude and longitude must be given together",
            ))
        }
    };
    let predictions = app_state.maps.autocomplete(&params.input_text, bias).await?;
    Ok(Json(AutocompleteResponse { predictions }))
}

#[derive(Deserialize)]
pub struct RouteParams {
    #[serde(alias = "origin_latitude")]
    pub origin_lat: f64,
    #[serde(alias = "origin_longitude")]
    pub origin_lng: f64,
    #[serde(alias = "destination_latitude")]
    pub destination_lat: f64,
    #[serde(alias = "destination_longitude")]
    pub destination_lng: f64,
}

impl RouteParams {
    fn endpoints(&self) -> Result<(Coordinate, Coordinate), AppError> {
        Ok((
            Coordinate::new(self.origin_lat, self.origin_lng)?,
            Coordinate::new(self.destination_lat, self.destination_lng)?,
        ))
    }
}

pub async fn route_estimate(
    State(app_state): State<Arc<AppState>>,
    QueryParams(params): QueryParams<RouteParams>,
) -> Result<Json<RouteSummary>, AppError> {
    let (origin, destination) = params.endpoints()?;
    info!(%origin, %destination, "estimating route");
    app_state
        .maps
        .route(origin, destination)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No route found between origin and destination".into()))
}

#[derive(Serialize, Debug)]
pub struct DirectionsResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub summary: Option<RouteSummary>,
    pub route: Vec<Coordinate>,
    pub steps: Vec<Step>,
}

async fn directions(
    app_state: &AppState,
    origin: Coordinate,
    destination: Coordinate,
) -> Result<Json<DirectionsResponse>, AppError> {
    info!(%origin, %destination, "fetching directions");
    let response = match app_state.maps.directions(origin, destination).await? {
        Some(directions) => DirectionsResponse {
            status: "OK",
            summary: Some(directions.summary),
            route: directions.route,
            steps: directions.steps,
        },
        None => DirectionsResponse {
            status: "ZERO_RESULTS",
            summary: None,
            route: vec![],
            steps: vec![],
        },
    };
    info!(steps = response.steps.len(), status = response.status, "directions ready");
    Ok(Json(response))
}

pub async fn full_directions(
    State(app_state): State<Arc<AppState>>,
    QueryParams(params): QueryParams<RouteParams>,
) -> Result<Json<DirectionsResponse>, AppError> {
    let (origin, destination) = params.endpoints()?;
    directions(&app_state, origin, destination).await
}

#[derive(Deserialize)]
pub struct PairParams {
    pub origin: String,
    pub destination: String,
}

pub async fn directions_by_pair(
    State(app_state): State<Arc<AppState>>,
    QueryParams(params): QueryParams<PairParams>,
) -> Result<Json<DirectionsResponse>, AppError> {
    let origin: Coordinate = params.origin.parse()?;
    let destination: Coordinate = params.destination.parse()?;
    directions(&app_state, origin, destination).await
}

#[derive(Deserialize)]
pub struct MedicalFormPayload {
    pub location: String,
    pub language: String,
    pub medical_issue: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn medical_post(
    State(app_state): State<Arc<AppState>>,
    JsonBody(form): JsonBody<MedicalFormPayload>,
) -> Result<Json<MessageResponse>, AppError> {
    let request = AdviceRequest::new(&form.location, &form.medical_issue, &form.language)?;
    info!(language = %request.language, "medical advice requested");
    let message = app_state.advice.advise(&request).await;
    Ok(Json(MessageResponse { message }))
}

#[derive(Deserialize)]
pub struct SmsPayload {
    pub to: String,
    pub body: String,
}

#[derive(Serialize)]
pub struct SmsResponse {
    pub message_id: String,
}

pub async fn send_sms(
    State(app_state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<SmsPayload>,
) -> Result<Json<SmsResponse>, AppError> {
    let sms = app_state
        .sms
        .as_ref()
        .ok_or(AppError::FeatureDisabled("SMS"))?;
    let message_id = sms.send(&payload.to, &payload.body).await?;
    Ok(Json(SmsResponse { message_id }))
}
