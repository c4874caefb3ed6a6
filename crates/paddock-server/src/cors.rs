use http::header::{CONTENT_TYPE, HeaderName};
use http::{HeaderValue, Method};
use paddock_config::{AnyOrList, CorsConfig};
use paddock_core::SESSION_ID_HEADER;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Build a Tower CORS layer from configuration
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let mut layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([HeaderName::from_static(SESSION_ID_HEADER)]);

    // Origins
    layer = match &config.origins {
        AnyOrList::Any => layer.allow_origin(AllowOrigin::any()),
        AnyOrList::List(origins) => {
            let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            layer.allow_origin(origins)
        }
    };

    // Max age
    if let Some(duration) = config.max_age {
        layer = layer.max_age(duration);
    }

    layer
}
