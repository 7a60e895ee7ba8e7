//! Directions-API adapter.
//!
//! The Android host owns the HTTP stack; it hands the core a transport
//! and the core builds request URLs and reads the JSON payload into a
//! [`RouteResponse`].

use async_trait::async_trait;
use serde::Deserialize;

use crate::geo::GeoPoint;
use crate::provider::{
    Leg, ProviderError, RouteQuery, RouteResponse, RouteStatus, RoutingProvider, Step,
};

/// Raw HTTP response handed back by the host.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Host-side HTTP GET.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, ProviderError>;
}

/// Endpoint settings for a directions service.
#[derive(Debug, Clone)]
pub struct DirectionsConfig {
    pub base_url: String,
    pub api_key: String,
}

impl Default for DirectionsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://maps.googleapis.com/maps/api/directions/json".to_string(),
            api_key: String::new(),
        }
    }
}

/// Routing provider that talks to a directions endpoint through the host.
pub struct DirectionsClient<T> {
    config: DirectionsConfig,
    transport: T,
}

impl<T: HttpTransport> DirectionsClient<T> {
    pub fn new(config: DirectionsConfig, transport: T) -> Self {
        Self { config, transport }
    }

    /// Request URL for `query`.
    pub fn request_url(&self, query: &RouteQuery) -> String {
        let mut url = format!(
            "{}?origin={}&destination={}&mode={}",
            self.config.base_url,
            format_coord(&query.origin),
            format_coord(&query.destination),
            query.mode.as_str(),
        );

        if !query.waypoints.is_empty() {
            let mut parts = Vec::with_capacity(query.waypoints.len() + 1);
            if query.optimize {
                parts.push("optimize:true".to_string());
            }
            parts.extend(query.waypoints.iter().map(format_coord));
            url.push_str("&waypoints=");
            url.push_str(&parts.join("%7C"));
        }

        if !self.config.api_key.is_empty() {
            url.push_str("&key=");
            url.push_str(&encode_query_value(&self.config.api_key));
        }
        url
    }
}

#[async_trait]
impl<T: HttpTransport> RoutingProvider for DirectionsClient<T> {
    async fn route(&self, query: &RouteQuery) -> Result<RouteResponse, ProviderError> {
        let url = self.request_url(query);
        log::debug!("directions request with {} waypoints", query.waypoints.len());

        let response = self.transport.get(&url).await?;
        if !(200..300).contains(&response.status) {
            return Err(ProviderError::Http(response.status));
        }
        parse_response(&response.body)
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_query_value(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

fn format_coord(p: &GeoPoint) -> String {
    format!("{:.6},{:.6}", p.lat, p.lon)
}

#[derive(Debug, Deserialize)]
struct DirectionsPayload {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<RoutePayload>,
}

#[derive(Debug, Deserialize)]
struct RoutePayload {
    #[serde(default)]
    waypoint_order: Vec<usize>,
    #[serde(default)]
    legs: Vec<LegPayload>,
}

#[derive(Debug, Deserialize)]
struct LegPayload {
    #[serde(default)]
    distance: Option<Quantity>,
    #[serde(default)]
    duration: Option<Quantity>,
    #[serde(default)]
    steps: Vec<StepPayload>,
}

#[derive(Debug, Deserialize)]
struct StepPayload {
    #[serde(default)]
    polyline: Option<EncodedPolyline>,
    #[serde(default)]
    html_instructions: String,
    #[serde(default)]
    distance: Option<Quantity>,
    #[serde(default)]
    duration: Option<Quantity>,
    #[serde(default)]
    maneuver: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Quantity {
    value: f64,
}

#[derive(Debug, Deserialize)]
struct EncodedPolyline {
    points: String,
}

fn value_of(q: Option<Quantity>) -> f64 {
    q.map_or(0.0, |q| q.value)
}

/// Parse a directions JSON payload.
///
/// A non-`OK` status becomes [`RouteStatus::Rejected`]; only the first
/// route is read.
pub fn parse_response(json: &str) -> Result<RouteResponse, ProviderError> {
    let payload: DirectionsPayload =
        serde_json::from_str(json).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    if payload.status != "OK" {
        return Ok(RouteResponse {
            status: RouteStatus::Rejected {
                status: payload.status,
                message: payload.error_message,
            },
            legs: Vec::new(),
            waypoint_order: Vec::new(),
        });
    }

    let Some(route) = payload.routes.into_iter().next() else {
        return Ok(RouteResponse {
            status: RouteStatus::Ok,
            legs: Vec::new(),
            waypoint_order: Vec::new(),
        });
    };

    let legs = route
        .legs
        .into_iter()
        .map(|leg| Leg {
            distance_m: value_of(leg.distance),
            duration_s: value_of(leg.duration),
            steps: leg
                .steps
                .into_iter()
                .map(|step| Step {
                    polyline: step.polyline.map(|p| p.points).unwrap_or_default(),
                    html_instructions: step.html_instructions,
                    distance_m: value_of(step.distance),
                    duration_s: value_of(step.duration),
                    maneuver: step.maneuver,
                })
                .collect(),
        })
        .collect();

    Ok(RouteResponse {
        status: RouteStatus::Ok,
        legs,
        waypoint_order: route.waypoint_order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TravelMode;
    use std::sync::Mutex;

    const WALK: &str = r#"{
      "status": "OK",
      "routes": [{
        "waypoint_order": [1, 0],
        "legs": [
          {
            "distance": {"text": "0.4 km", "value": 420},
            "duration": {"text": "5 mins", "value": 300},
            "steps": [
              {
                "polyline": {"points": "_p~iF~ps|U"},
                "html_instructions": "Head <b>north</b>",
                "distance": {"value": 200},
                "duration": {"value": 140}
              },
              {
                "polyline": {"points": "_ulLnnqC"},
                "html_instructions": "Turn <b>left</b>",
                "distance": {"value": 220},
                "duration": {"value": 160},
                "maneuver": "turn-left"
              }
            ]
          },
          {
            "distance": {"value": 80},
            "duration": {"value": 60},
            "steps": []
          }
        ]
      }]
    }"#;

    #[test]
    fn parses_legs_steps_and_order() {
        let response = parse_response(WALK).unwrap();
        assert_eq!(response.status, RouteStatus::Ok);
        assert_eq!(response.waypoint_order, vec![1, 0]);
        assert_eq!(response.legs.len(), 2);
        assert_eq!(response.legs[0].distance_m, 420.0);
        assert_eq!(response.legs[0].steps.len(), 2);
        assert_eq!(response.legs[0].steps[1].maneuver.as_deref(), Some("turn-left"));
        assert_eq!(response.legs[0].steps[0].polyline, "_p~iF~ps|U");
        assert_eq!(response.legs[1].duration_s, 60.0);
    }

    #[test]
    fn non_ok_status_is_rejected() {
        let json = r#"{"status": "ZERO_RESULTS", "routes": []}"#;
        let response = parse_response(json).unwrap();
        assert_eq!(
            response.status,
            RouteStatus::Rejected {
                status: "ZERO_RESULTS".into(),
                message: None
            }
        );
    }

    #[test]
    fn ok_without_routes_has_no_legs() {
        let response = parse_response(r#"{"status": "OK"}"#).unwrap();
        assert_eq!(response.status, RouteStatus::Ok);
        assert!(response.legs.is_empty());
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_response("<html>"),
            Err(ProviderError::Malformed(_))
        ));
    }

    struct CannedTransport {
        response: HttpResponse,
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HttpTransport for CannedTransport {
        async fn get(&self, url: &str) -> Result<HttpResponse, ProviderError> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(self.response.clone())
        }
    }

    fn client(status: u16, body: &str) -> DirectionsClient<CannedTransport> {
        DirectionsClient::new(
            DirectionsConfig {
                base_url: "https://directions.test/json".into(),
                api_key: "k".into(),
            },
            CannedTransport {
                response: HttpResponse {
                    status,
                    body: body.to_string(),
                },
                urls: Mutex::new(Vec::new()),
            },
        )
    }

    fn query(waypoints: Vec<GeoPoint>) -> RouteQuery {
        RouteQuery {
            origin: GeoPoint::new(41.8902, 12.4922),
            destination: GeoPoint::new(41.8986, 12.4769),
            waypoints,
            mode: TravelMode::Walking,
            optimize: true,
        }
    }

    #[test]
    fn api_key_is_percent_encoded() {
        let mut c = client(200, "{}");
        c.config.api_key = "a+b/c=d é".into();
        let url = c.request_url(&query(Vec::new()));
        assert!(url.ends_with("&key=a%2Bb%2Fc%3Dd%20%C3%A9"), "{url}");
    }

    #[test]
    fn url_carries_optimized_waypoints() {
        let c = client(200, WALK);
        let url = c.request_url(&query(vec![GeoPoint::new(41.8925, 12.4853)]));
        assert_eq!(
            url,
            "https://directions.test/json?origin=41.890200,12.492200\
             &destination=41.898600,12.476900&mode=walking\
             &waypoints=optimize:true%7C41.892500,12.485300&key=k"
        );
    }

    #[test]
    fn url_without_waypoints_omits_parameter() {
        let url = client(200, WALK).request_url(&query(Vec::new()));
        assert!(!url.contains("waypoints"));
    }

    #[tokio::test]
    async fn client_parses_success() {
        let c = client(200, WALK);
        let response = c.route(&query(Vec::new())).await.unwrap();
        assert_eq!(response.legs.len(), 2);
        assert_eq!(c.transport.urls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn client_maps_http_failure() {
        let c = client(503, "");
        assert!(matches!(
            c.route(&query(Vec::new())).await,
            Err(ProviderError::Http(503))
        ));
    }
}
