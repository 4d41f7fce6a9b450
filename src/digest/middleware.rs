//! Request/response integrity stamping.
//!
//! Legacy clients stamp every game request with a digest over their side of
//! the exchange and expect the server to sign the response body with the
//! same secret and echo the request digest back untouched. The scheme is a
//! signal, not a gate: a request that matches no key is still served, signed
//! with the fallback key, so this layer never rejects anything.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

use super::compute::calculate_digest;
use super::detect::detect_client_profile;
use super::select::select_key;

/// Carries the claimed digest inbound and the response digest outbound.
pub const DIGEST_HEADER: HeaderName = HeaderName::from_static("x-digest-a");
/// Echoes the claimed digest back verbatim so a client can detect request
/// corruption by comparing against what it sent.
pub const DIGEST_ECHO_HEADER: HeaderName = HeaderName::from_static("x-digest-b");

/// Path prefix of the game protocol space. Management routes never receive
/// digest headers.
pub const GAME_PATH_PREFIX: &str = "/lbp";

/// Stamp game-protocol responses with integrity headers.
///
/// Layered over the whole router; activates only on [`GAME_PATH_PREFIX`]
/// paths and leaves everything else untouched.
pub async fn stamp_digest(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    if !path.starts_with(GAME_PATH_PREFIX) {
        return next.run(request).await;
    }

    // An absent or non-UTF-8 claimed digest is an empty string, never an error.
    let claimed = request
        .headers()
        .get(&DIGEST_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    let profile = detect_client_profile(request.headers(), request.uri().query());
    let salt = state.config.digest_salt.clone();

    // Forced candidate families first, then the detected one; first exact
    // match fixes both the signing key and the family.
    let mut resolved = None;
    for family in &profile.candidates {
        let keys = state.digest_keys.snapshot(*family);
        if let Some(key) = select_key(&keys, &claimed, &path, &salt, profile.version, *family) {
            resolved = Some((key, *family));
            break;
        }
    }

    let matched = resolved.is_some();
    let (key, family) = resolved.unwrap_or_else(|| {
        (
            state.digest_keys.fallback_key(profile.family),
            profile.family,
        )
    });

    if !matched && !claimed.is_empty() {
        tracing::debug!(
            path = path.as_str(),
            family = %family,
            "Claimed digest matched no configured key, signing with fallback"
        );
    }

    let response = next.run(request).await;
    let (mut parts, body) = response.into_parts();

    let body_bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!(
                path = path.as_str(),
                error = %error,
                "Failed to buffer response body for digest stamping"
            );
            return Response::from_parts(parts, Body::empty());
        }
    };

    // Response digests never carry the version context; the version pair
    // participates only in request-side matching.
    let response_digest =
        calculate_digest(&key, &path, &body_bytes, &salt, None, false, family);

    if let Ok(value) = HeaderValue::from_str(&response_digest) {
        parts.headers.insert(DIGEST_HEADER, value);
    }
    // Verbatim echo, including the empty string.
    if let Ok(value) = HeaderValue::from_str(&claimed) {
        parts.headers.insert(DIGEST_ECHO_HEADER, value);
    }

    Response::from_parts(parts, Body::from(body_bytes))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header::USER_AGENT, HeaderMap, Request, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::GameConfig;
    use crate::digest::compute::{calculate_digest, AlgorithmFamily, VersionContext};
    use crate::state::AppState;

    use super::*;

    fn test_state() -> AppState {
        let config = GameConfig {
            sha1_digest_keys: vec!["sha1_digest1".into(), "sha1_digest2".into()],
            hmac_digest_keys: vec!["hmac_digest1".into(), "hmac_digest2".into()],
            ..GameConfig::default()
        };
        AppState::new(config).unwrap()
    }

    /// Router with a game endpoint that returns a fixed body, plus a
    /// management endpoint outside the game path space.
    fn test_router(state: AppState) -> Router {
        Router::new()
            .route("/lbp/test", get(|| async { "test" }))
            .route("/api/v3/instance", get(|| async { "{}" }))
            .layer(from_fn_with_state(state.clone(), stamp_digest))
            .with_state(state)
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body.to_vec())
    }

    fn header(headers: &HeaderMap, name: &str) -> Option<String> {
        headers
            .get(name)
            .map(|value| value.to_str().unwrap().to_owned())
    }

    #[tokio::test]
    async fn test_management_routes_are_never_stamped() {
        let router = test_router(test_state());
        let request = Request::builder()
            .uri("/api/v3/instance")
            .header("X-Digest-A", "anything")
            .body(Body::empty())
            .unwrap();

        let (status, headers, _) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(header(&headers, "X-Digest-A"), None);
        assert_eq!(header(&headers, "X-Digest-B"), None);
    }

    #[tokio::test]
    async fn test_game_routes_are_stamped_even_without_a_claimed_digest() {
        let state = test_state();
        let router = test_router(state);
        let request = Request::builder()
            .uri("/lbp/test")
            .body(Body::empty())
            .unwrap();

        let (status, headers, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"test");

        // No claimed digest: signed with the plain fallback key, empty echo.
        let expected = calculate_digest(
            "sha1_digest1",
            "/lbp/test",
            b"test",
            "",
            None,
            false,
            AlgorithmFamily::Plain,
        );
        assert_eq!(header(&headers, "X-Digest-A").as_deref(), Some(expected.as_str()));
        assert_eq!(header(&headers, "X-Digest-B").as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_plain_digest_round_trip() {
        let router = test_router(test_state());

        let claimed = calculate_digest(
            "sha1_digest1",
            "/lbp/test",
            b"",
            "",
            None,
            false,
            AlgorithmFamily::Plain,
        );
        let request = Request::builder()
            .uri("/lbp/test")
            .header("X-Digest-A", &claimed)
            .body(Body::empty())
            .unwrap();

        let (status, headers, _) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);

        let expected = calculate_digest(
            "sha1_digest1",
            "/lbp/test",
            b"test",
            "",
            None,
            false,
            AlgorithmFamily::Plain,
        );
        assert_eq!(header(&headers, "X-Digest-A").as_deref(), Some(expected.as_str()));
        assert_eq!(header(&headers, "X-Digest-B").as_deref(), Some(claimed.as_str()));
    }

    #[tokio::test]
    async fn test_keyed_digest_round_trip() {
        let router = test_router(test_state());

        let claimed = calculate_digest(
            "hmac_digest1",
            "/lbp/test",
            b"",
            "",
            None,
            false,
            AlgorithmFamily::Keyed,
        );
        let request = Request::builder()
            .uri("/lbp/test")
            .header(USER_AGENT, "MM CHTTPClient LBP3 01.26")
            .header("X-Digest-A", &claimed)
            .body(Body::empty())
            .unwrap();

        let (status, headers, _) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);

        let expected = calculate_digest(
            "hmac_digest1",
            "/lbp/test",
            b"test",
            "",
            None,
            false,
            AlgorithmFamily::Keyed,
        );
        assert_eq!(header(&headers, "X-Digest-A").as_deref(), Some(expected.as_str()));
        assert_eq!(header(&headers, "X-Digest-B").as_deref(), Some(claimed.as_str()));
    }

    #[tokio::test]
    async fn test_secondary_key_is_resolved_exactly() {
        let router = test_router(test_state());

        // Client signed with the second key; the response must come back
        // signed with that key, not the fallback.
        let claimed = calculate_digest(
            "sha1_digest2",
            "/lbp/test",
            b"",
            "",
            None,
            false,
            AlgorithmFamily::Plain,
        );
        let request = Request::builder()
            .uri("/lbp/test")
            .header("X-Digest-A", &claimed)
            .body(Body::empty())
            .unwrap();

        let (_, headers, _) = send(router, request).await;

        let expected = calculate_digest(
            "sha1_digest2",
            "/lbp/test",
            b"test",
            "",
            None,
            false,
            AlgorithmFamily::Plain,
        );
        assert_eq!(header(&headers, "X-Digest-A").as_deref(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_secondary_keyed_key_is_resolved_exactly() {
        let router = test_router(test_state());

        let claimed = calculate_digest(
            "hmac_digest2",
            "/lbp/test",
            b"",
            "",
            None,
            false,
            AlgorithmFamily::Keyed,
        );
        let request = Request::builder()
            .uri("/lbp/test")
            .header(USER_AGENT, "MM CHTTPClient LBP3 01.26")
            .header("X-Digest-A", &claimed)
            .body(Body::empty())
            .unwrap();

        let (_, headers, _) = send(router, request).await;

        let expected = calculate_digest(
            "hmac_digest2",
            "/lbp/test",
            b"test",
            "",
            None,
            false,
            AlgorithmFamily::Keyed,
        );
        assert_eq!(header(&headers, "X-Digest-A").as_deref(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_unmatched_digest_falls_back_to_first_key() {
        let router = test_router(test_state());
        let request = Request::builder()
            .uri("/lbp/test")
            .header("X-Digest-A", "nonsense digest")
            .body(Body::empty())
            .unwrap();

        let (status, headers, _) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);

        let expected = calculate_digest(
            "sha1_digest1",
            "/lbp/test",
            b"test",
            "",
            None,
            false,
            AlgorithmFamily::Plain,
        );
        assert_eq!(header(&headers, "X-Digest-A").as_deref(), Some(expected.as_str()));
        // The echo is the claimed digest verbatim, not the server's own.
        assert_eq!(
            header(&headers, "X-Digest-B").as_deref(),
            Some("nonsense digest")
        );
    }

    #[tokio::test]
    async fn test_unmatched_keyed_client_falls_back_to_first_keyed_key() {
        let router = test_router(test_state());
        let request = Request::builder()
            .uri("/lbp/test")
            .header(USER_AGENT, "MM CHTTPClient LBP3 01.26")
            .header("X-Digest-A", "nonsense digest")
            .body(Body::empty())
            .unwrap();

        let (_, headers, _) = send(router, request).await;

        let expected = calculate_digest(
            "hmac_digest1",
            "/lbp/test",
            b"test",
            "",
            None,
            false,
            AlgorithmFamily::Keyed,
        );
        assert_eq!(header(&headers, "X-Digest-A").as_deref(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_version_context_matches_request_side_only() {
        let router = test_router(test_state());

        let version = VersionContext {
            exe_version: 205,
            data_version: 5,
        };
        // Signed with the second key so a fallback would be visible.
        let claimed = calculate_digest(
            "sha1_digest2",
            "/lbp/test",
            b"",
            "",
            Some(version),
            false,
            AlgorithmFamily::Plain,
        );
        let request = Request::builder()
            .uri("/lbp/test")
            .header("X-exe-v", "205")
            .header("X-data-v", "5")
            .header("X-Digest-A", &claimed)
            .body(Body::empty())
            .unwrap();

        let (status, headers, _) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);

        // The response digest is computed without the version pair.
        let expected = calculate_digest(
            "sha1_digest2",
            "/lbp/test",
            b"test",
            "",
            None,
            false,
            AlgorithmFamily::Plain,
        );
        assert_eq!(header(&headers, "X-Digest-A").as_deref(), Some(expected.as_str()));
        assert_eq!(header(&headers, "X-Digest-B").as_deref(), Some(claimed.as_str()));
    }

    #[tokio::test]
    async fn test_force_flag_widens_families_tried() {
        let router = test_router(test_state());

        // A keyed-family digest without the keyed User-Agent: only the
        // forced evaluation can resolve it.
        let claimed = calculate_digest(
            "hmac_digest2",
            "/lbp/test",
            b"",
            "",
            None,
            false,
            AlgorithmFamily::Keyed,
        );
        let request = Request::builder()
            .uri("/lbp/test?force_ps4_digest=1")
            .header("X-Digest-A", &claimed)
            .body(Body::empty())
            .unwrap();

        let (_, headers, _) = send(router, request).await;

        let expected = calculate_digest(
            "hmac_digest2",
            "/lbp/test",
            b"test",
            "",
            None,
            false,
            AlgorithmFamily::Keyed,
        );
        assert_eq!(header(&headers, "X-Digest-A").as_deref(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_rotation_is_visible_to_later_requests() {
        let state = test_state();
        let router = test_router(state.clone());

        state
            .digest_keys
            .replace_keys(AlgorithmFamily::Plain, vec!["rotated".into()])
            .unwrap();

        let claimed = calculate_digest(
            "rotated",
            "/lbp/test",
            b"",
            "",
            None,
            false,
            AlgorithmFamily::Plain,
        );
        let request = Request::builder()
            .uri("/lbp/test")
            .header("X-Digest-A", &claimed)
            .body(Body::empty())
            .unwrap();

        let (_, headers, _) = send(router, request).await;

        let expected = calculate_digest(
            "rotated",
            "/lbp/test",
            b"test",
            "",
            None,
            false,
            AlgorithmFamily::Plain,
        );
        assert_eq!(header(&headers, "X-Digest-A").as_deref(), Some(expected.as_str()));
    }
}
