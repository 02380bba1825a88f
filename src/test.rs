use crate::config::Config;
use crate::types::AppState;
use crate::users::UserStore;

use axum::Router;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

/// Serve `router` on an ephemeral local port and return its base url. Used to stand in for
/// Google, Gemini and Twilio.
pub async fn stub_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(router.into_make_service());
    tokio::spawn(server);
    format!("http://{addr}")
}

/// Config with test keys, every vendor pointed at `vendor_base`.
pub fn mock_config(vendor_base: &str) -> Config {
    Config {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        maps_api_key: "maps-key".to_string(),
        maps_api_base: vendor_base.to_string(),
        gemini_api_key: "gemini-key".to_string(),
        gemini_api_base: vendor_base.to_string(),
        gemini_model: "test-model".to_string(),
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        http_timeout: Duration::from_secs(5),
        twilio: None,
    }
}

pub fn mock_state(config: &Config) -> Arc<AppState> {
    let http_client = crate::types::http_client(config).unwrap();
    Arc::new(AppState::new(config, http_client, UserStore::memory()))
}
