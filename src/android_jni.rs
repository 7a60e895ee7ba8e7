//! JNI bindings for the Android app.
//!
//! Each public function here corresponds to an `external fun` declaration
//! in RustBridge.kt. The function names follow JNI naming conventions:
//! Java_<package>_<class>_<method> with dots replaced by underscores.
//!
//! Structured values cross the boundary as JSON strings. On failure the
//! error is logged and `null` is returned to the Kotlin side.

use jni::objects::{JClass, JString};
use jni::sys::jstring;
use jni::JNIEnv;
use serde::Deserialize;

use crate::corridor::{filter_along_corridor, DEFAULT_CORRIDOR_BUFFER_KM};
use crate::geo::GeoPoint;
use crate::route::Route;
use crate::site::HistoricalSite;

/// Route the `log` facade to logcat. Safe to call more than once.
pub fn init_logging() {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Debug)
            .with_tag("storywalk"),
    );
}

fn read_string(env: &mut JNIEnv, value: &JString) -> Option<String> {
    match env.get_string(value) {
        Ok(s) => Some(s.into()),
        Err(e) => {
            log::error!("failed to read Java string: {e}");
            None
        }
    }
}

fn to_jstring(env: &JNIEnv, value: &str) -> jstring {
    match env.new_string(value) {
        Ok(s) => s.into_raw(),
        Err(e) => {
            log::error!("failed to create Java string: {e}");
            std::ptr::null_mut()
        }
    }
}

fn respond(env: &JNIEnv, result: Result<String, String>) -> jstring {
    match result {
        Ok(json) => to_jstring(env, &json),
        Err(e) => {
            log::error!("{e}");
            std::ptr::null_mut()
        }
    }
}

/// Decode a polyline into a JSON array of `{lat, lon}` objects.
fn decode_polyline_json(encoded: &str) -> Result<String, String> {
    let points = crate::polyline::decode_polyline(encoded);
    serde_json::to_string(&points).map_err(|e| format!("JSON serialize error: {e}"))
}

#[derive(Deserialize)]
struct CorridorRequest {
    start: GeoPoint,
    end: GeoPoint,
    sites: Vec<HistoricalSite>,
    #[serde(default)]
    buffer_km: Option<f64>,
}

/// Run the corridor filter on a JSON request and return the kept sites.
fn filter_corridor_json(request: &str) -> Result<String, String> {
    let req: CorridorRequest =
        serde_json::from_str(request).map_err(|e| format!("corridor request error: {e}"))?;
    let kept = filter_along_corridor(
        &req.start,
        &req.end,
        req.sites,
        req.buffer_km.unwrap_or(DEFAULT_CORRIDOR_BUFFER_KM),
    );
    serde_json::to_string(&kept).map_err(|e| format!("JSON serialize error: {e}"))
}

/// Convert a route JSON document into GPX.
fn export_tour_gpx(route_json: &str, name: &str) -> Result<String, String> {
    let route: Route =
        serde_json::from_str(route_json).map_err(|e| format!("route JSON error: {e}"))?;
    crate::gpx::export_route_to_string(&route, name).map_err(|e| e.to_string())
}

/// Maps to: RustBridge.init()
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_storywalk_app_RustBridge_init(_env: JNIEnv, _class: JClass) {
    init_logging();
    log::info!("storywalk core {} loaded", crate::VERSION);
}

/// Returns the core library version.
/// Maps to: RustBridge.version() -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_storywalk_app_RustBridge_version(
    env: JNIEnv,
    _class: JClass,
) -> jstring {
    to_jstring(&env, crate::VERSION)
}

/// Maps to: RustBridge.decodePolyline(encoded: String) -> String?
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_storywalk_app_RustBridge_decodePolyline(
    mut env: JNIEnv,
    _class: JClass,
    encoded: JString,
) -> jstring {
    let Some(encoded) = read_string(&mut env, &encoded) else {
        return std::ptr::null_mut();
    };
    respond(&env, decode_polyline_json(&encoded))
}

/// Maps to: RustBridge.filterCorridor(requestJson: String) -> String?
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_storywalk_app_RustBridge_filterCorridor(
    mut env: JNIEnv,
    _class: JClass,
    request: JString,
) -> jstring {
    let Some(request) = read_string(&mut env, &request) else {
        return std::ptr::null_mut();
    };
    respond(&env, filter_corridor_json(&request))
}

/// Maps to: RustBridge.exportTourGpx(routeJson: String, name: String) -> String?
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_storywalk_app_RustBridge_exportTourGpx(
    mut env: JNIEnv,
    _class: JClass,
    route_json: JString,
    name: JString,
) -> jstring {
    let (Some(route_json), Some(name)) = (
        read_string(&mut env, &route_json),
        read_string(&mut env, &name),
    ) else {
        return std::ptr::null_mut();
    };
    respond(&env, export_tour_gpx(&route_json, &name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_polyline_json_emits_points() {
        let json = decode_polyline_json("_p~iF~ps|U").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 1);
        assert!((parsed[0]["lat"].as_f64().unwrap() - 38.5).abs() < 1e-9);
    }

    #[test]
    fn decode_polyline_json_handles_empty() {
        assert_eq!(decode_polyline_json("").unwrap(), "[]");
    }

    #[test]
    fn filter_corridor_json_uses_default_buffer() {
        let request = r#"{
            "start": {"lat": 0.0, "lon": 0.0},
            "end": {"lat": 0.0, "lon": 1.0},
            "sites": [
                {"id": "near", "title": "Near", "location": {"lat": 0.0, "lon": 0.01}},
                {"id": "far", "title": "Far", "location": {"lat": 5.0, "lon": 5.0}}
            ]
        }"#;
        let kept: Vec<HistoricalSite> =
            serde_json::from_str(&filter_corridor_json(request).unwrap()).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id.0, "near");
    }

    #[test]
    fn filter_corridor_json_rejects_bad_request() {
        assert!(filter_corridor_json("{}").is_err());
    }

    #[test]
    fn export_tour_gpx_rejects_bad_route() {
        assert!(export_tour_gpx("[]", "Tour").is_err());
    }

    #[test]
    fn export_tour_gpx_writes_document() {
        let route = r#"{
            "start": {"lat": 41.8902, "lon": 12.4922},
            "end": {"lat": 41.8986, "lon": 12.4769},
            "path": [{"lat": 41.8902, "lon": 12.4922}, {"lat": 41.8986, "lon": 12.4769}],
            "waypoints": [],
            "steps": [],
            "total_distance_m": 1500.0,
            "total_duration_s": 1200.0,
            "requested_categories": ["all"]
        }"#;
        let xml = export_tour_gpx(route, "Evening walk").unwrap();
        assert!(xml.contains("Evening walk"));
        assert!(xml.contains("<trkpt"));
    }
}
