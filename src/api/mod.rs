pub mod routes;

use crate::config::Config;
use crate::store::Store;
use anyhow::{Context, Result};
use axum::Router;
use http::HeaderValue;
use http::request::Parts;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub async fn run_server(config: Arc<Config>, store: Arc<dyn Store>) -> Result<()> {
    let ip = config
        .api_host
        .parse::<IpAddr>()
        .with_context(|| format!("Invalid api_host: {}", config.api_host))?;
    let addr = SocketAddr::new(ip, config.api_port);
    let backend = store.backend_name();

    let state = routes::ApiState {
        config: Arc::clone(&config),
        store,
    };
    let app: Router = routes::router(state)
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server: {addr}"))?;

    info!(address = %addr, backend, "Momentum API server started");

    axum::serve(listener, app)
        .await
        .context("API server failed")?;

    Ok(())
}

pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let patterns = origins.to_vec();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _request: &Parts| {
                origin
                    .to_str()
                    .map(|origin| {
                        patterns
                            .iter()
                            .any(|pattern| origin_matches(pattern, origin))
                    })
                    .unwrap_or(false)
            },
        ))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn origin_matches(pattern: &str, origin: &str) -> bool {
    let pattern = pattern.trim().trim_end_matches('/');

    match pattern.split_once("://*.") {
        Some((scheme, domain)) => origin
            .strip_prefix(scheme)
            .and_then(|rest| rest.strip_prefix("://"))
            .and_then(|host| host.strip_suffix(domain))
            .and_then(|rest| rest.strip_suffix('.'))
            .is_some_and(|label| !label.is_empty() && !label.contains(['/', ':'])),
        None => pattern == origin,
    }
}

#[cfg(test)]
mod tests {
    use super::origin_matches;

    #[test]
    fn exact_origins_match_literally() {
        assert!(origin_matches("http://localhost:5173", "http://localhost:5173"));
        assert!(origin_matches("http://localhost:5173/", "http://localhost:5173"));
        assert!(!origin_matches("http://localhost:5173", "http://localhost:3000"));
    }

    #[test]
    fn wildcard_origin_matches_subdomains_only() {
        let pattern = "https://*.vercel.app";

        assert!(origin_matches(pattern, "https://momentum.vercel.app"));
        assert!(origin_matches(pattern, "https://preview.momentum.vercel.app"));
        assert!(!origin_matches(pattern, "https://vercel.app"));
        assert!(!origin_matches(pattern, "http://momentum.vercel.app"));
        assert!(!origin_matches(pattern, "https://evil.com/x.vercel.app"));
        assert!(!origin_matches(pattern, "https://momentumvercel.app"));
    }
}
