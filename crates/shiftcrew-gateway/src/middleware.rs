use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

/// Cross-origin configuration for the gateway.
#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    /// Origins allowed to call the API. Empty or `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    /// Allow the given origins.
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    /// Allow any origin, without credentials.
    pub fn permissive() -> Self {
        Self::new(vec![])
    }

    /// Returns true if every origin is accepted.
    pub fn allows_any(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == "*")
    }

    /// The layer enforcing this policy.
    ///
    /// Origins that are not valid header values are skipped.
    pub fn layer(&self) -> CorsLayer {
        if self.allows_any() {
            return CorsLayer::permissive();
        }
        let origins: Vec<HeaderValue> = self
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    }
}
