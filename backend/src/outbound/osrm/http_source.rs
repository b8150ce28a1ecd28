//! Reqwest-backed OSRM route provider.
//!
//! This adapter owns transport details only: URL construction, timeout and
//! HTTP error mapping, and JSON decoding into a domain [`Route`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use super::dto::{OsrmResponseDto, RouteOutcome};
use crate::domain::ports::{RouteProvider, RouteProviderError};
use crate::domain::{Coordinate, Route};

/// Public OSRM demo server.
pub const DEFAULT_OSRM_BASE_URL: &str = "http://router.project-osrm.org";
const DEFAULT_USER_AGENT: &str = "dispatch-backend-osrm/0.1";

/// Route provider issuing `GET /route/v1/driving/...` requests.
pub struct OsrmRouteProvider {
    client: Client,
    base_url: Url,
}

impl OsrmRouteProvider {
    /// Build an adapter using a reqwest client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl RouteProvider for OsrmRouteProvider {
    async fn route(
        &self,
        pickup: Coordinate,
        destination: Coordinate,
    ) -> Result<Route, RouteProviderError> {
        let url = route_url(&self.base_url, pickup, destination)?;
        debug!(%url, "requesting route from OSRM");
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        // OSRM answers unreachable points with 400 and a `NoRoute` body.
        if !status.is_success() && status != StatusCode::BAD_REQUEST {
            return Err(map_status_error(status, body.as_ref()));
        }

        match parse_route(body.as_ref())? {
            RouteOutcome::Found(route) => Ok(route),
            RouteOutcome::NoRoute => Err(RouteProviderError::no_route()),
            RouteOutcome::Rejected(message) if status.is_success() => {
                Err(RouteProviderError::decode(message))
            }
            RouteOutcome::Rejected(message) => Err(RouteProviderError::status(
                status.as_u16(),
                message,
            )),
        }
    }
}

fn route_url(
    base_url: &Url,
    pickup: Coordinate,
    destination: Coordinate,
) -> Result<Url, RouteProviderError> {
    let raw = format!(
        "{base}/route/v1/driving/{},{};{},{}",
        pickup.longitude,
        pickup.latitude,
        destination.longitude,
        destination.latitude,
        base = base_url.as_str().trim_end_matches('/'),
    );
    let mut url = Url::parse(&raw)
        .map_err(|error| RouteProviderError::transport(format!("invalid OSRM URL: {error}")))?;
    url.query_pairs_mut()
        .append_pair("overview", "full")
        .append_pair("geometries", "geojson");
    Ok(url)
}

fn parse_route(body: &[u8]) -> Result<RouteOutcome, RouteProviderError> {
    let decoded: OsrmResponseDto = serde_json::from_slice(body).map_err(|error| {
        RouteProviderError::decode(format!("invalid OSRM JSON payload: {error}"))
    })?;
    Ok(decoded.into_outcome())
}

fn map_transport_error(error: reqwest::Error) -> RouteProviderError {
    if error.is_timeout() {
        RouteProviderError::timeout(error.to_string())
    } else {
        RouteProviderError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> RouteProviderError {
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            RouteProviderError::timeout(format!("status {}", status.as_u16()))
        }
        _ => RouteProviderError::status(status.as_u16(), body_preview(body)),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    //! Non-network coverage for OSRM URL building and decoding.

    use super::*;
    use rstest::rstest;

    fn point(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate {
            latitude,
            longitude,
        }
    }

    #[rstest]
    #[case("http://router.project-osrm.org")]
    #[case("http://router.project-osrm.org/")]
    fn builds_lon_lat_ordered_url(#[case] base: &str) {
        let base = Url::parse(base).expect("base URL parses");
        let url = route_url(&base, point(52.52, 13.405), point(52.5, 13.4)).expect("url builds");

        assert_eq!(
            url.as_str(),
            "http://router.project-osrm.org/route/v1/driving/13.405,52.52;13.4,52.5\
             ?overview=full&geometries=geojson"
        );
    }

    #[test]
    fn decodes_geojson_positions_as_lon_lat() {
        let body = r#"{
            "code": "Ok",
            "routes": [{
                "distance": 1234.5,
                "duration": 321.0,
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[13.405, 52.52], [13.4, 52.5]]
                }
            }]
        }"#;

        let outcome = parse_route(body.as_bytes()).expect("body decodes");
        let RouteOutcome::Found(route) = outcome else {
            panic!("expected a route, got {outcome:?}");
        };
        assert_eq!(route.distance, 1234.5);
        assert_eq!(route.duration, 321.0);
        assert_eq!(route.polyline, vec![point(52.52, 13.405), point(52.5, 13.4)]);
    }

    #[rstest]
    #[case(r#"{ "code": "Ok", "routes": [] }"#)]
    #[case(r#"{ "code": "NoRoute", "message": "Impossible route between points" }"#)]
    fn missing_routes_mean_no_route(#[case] body: &str) {
        let outcome = parse_route(body.as_bytes()).expect("body decodes");
        assert_eq!(outcome, RouteOutcome::NoRoute);
    }

    #[test]
    fn other_codes_are_rejections() {
        let body = r#"{ "code": "InvalidQuery", "message": "Query string malformed" }"#;
        let outcome = parse_route(body.as_bytes()).expect("body decodes");
        assert_eq!(
            outcome,
            RouteOutcome::Rejected("InvalidQuery: Query string malformed".to_owned())
        );
    }

    #[test]
    fn undecodable_bodies_are_decode_errors() {
        let error = parse_route(b"<html>busy</html>").expect_err("decode fails");
        assert!(matches!(error, RouteProviderError::Decode { .. }));
    }

    #[rstest]
    #[case(StatusCode::GATEWAY_TIMEOUT, true)]
    #[case(StatusCode::SERVICE_UNAVAILABLE, false)]
    fn maps_statuses(#[case] status: StatusCode, #[case] is_timeout: bool) {
        let error = map_status_error(status, b"  upstream   busy ");
        if is_timeout {
            assert!(matches!(error, RouteProviderError::Timeout { .. }));
        } else {
            assert_eq!(error, RouteProviderError::status(503_u16, "upstream busy"));
        }
    }
}
