use actix_cors::Cors;

/// Build the CORS middleware. With no configured origins, any
/// `http://localhost[:port]` origin is allowed so a local dev frontend works.
pub fn build_cors(origins: &[String]) -> Cors {
    if origins.is_empty() {
        Cors::default()
            .allowed_origin_fn(|origin, _| {
                origin
                    .to_str()
                    .map(is_localhost_origin)
                    .unwrap_or(false)
            })
            .allow_any_method()
            .allow_any_header()
            .max_age(3600)
    } else {
        let mut cors = Cors::default();
        for origin in origins {
            cors = cors.allowed_origin(origin);
        }
        cors.allow_any_method().allow_any_header().max_age(3600)
    }
}

/// Match `http://localhost` or `http://localhost:PORT` exactly.
fn is_localhost_origin(origin: &str) -> bool {
    origin == "http://localhost"
        || origin
            .strip_prefix("http://localhost:")
            .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false)
}
