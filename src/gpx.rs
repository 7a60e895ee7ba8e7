//! GPX 1.1 interop.
//!
//! Wraps the `gpx` crate in both directions: `<wpt>` entries load as
//! historical sites, and a planned tour exports as a `<rte>` of its
//! stops plus a `<trk>` of the dense walking path, so it opens in any
//! map app.

use std::io::{Read, Write};

use async_trait::async_trait;
use geo_types::Point;

use crate::geo::GeoPoint;
use crate::route::Route;
use crate::site::{HistoricalSite, PointRepository, RepositoryError, SiteId};

#[derive(Debug, thiserror::Error)]
pub enum GpxError {
    #[error("GPX parse error: {0}")]
    Parse(String),

    #[error("GPX write error: {0}")]
    Write(String),
}

/// Load every `<wpt>` as a site.
///
/// `<name>` becomes the title, `<desc>` the description, `<cmt>` the
/// narrative text and `<type>` a comma-separated category list. Sites
/// are numbered in document order.
pub fn load_sites<R: Read>(reader: R) -> Result<Vec<HistoricalSite>, GpxError> {
    let gpx = gpx::read(reader).map_err(|e| GpxError::Parse(e.to_string()))?;

    let sites = gpx
        .waypoints
        .iter()
        .enumerate()
        .map(|(i, wp)| HistoricalSite {
            id: SiteId(format!("gpx-{i}")),
            title: wp.name.clone().unwrap_or_else(|| format!("Site {}", i + 1)),
            description: wp.description.clone().unwrap_or_default(),
            location: GeoPoint {
                lat: wp.point().y(),
                lon: wp.point().x(),
            },
            categories: wp
                .type_
                .as_deref()
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
            narrative_text: wp.comment.clone(),
        })
        .collect();

    Ok(sites)
}

/// Site repository backed by a GPX document.
#[derive(Debug, Clone)]
pub struct GpxSiteRepository {
    sites: Vec<HistoricalSite>,
}

impl GpxSiteRepository {
    pub fn from_bytes(data: &[u8]) -> Result<Self, GpxError> {
        Ok(Self {
            sites: load_sites(data)?,
        })
    }
}

#[async_trait]
impl PointRepository for GpxSiteRepository {
    async fn list_all_sites(&self) -> Result<Vec<HistoricalSite>, RepositoryError> {
        Ok(self.sites.clone())
    }
}

fn waypoint_at(p: &GeoPoint) -> gpx::Waypoint {
    gpx::Waypoint::new(Point::new(p.lon, p.lat))
}

fn site_waypoint(site: &HistoricalSite) -> gpx::Waypoint {
    let mut wp = waypoint_at(&site.location);
    wp.name = Some(site.title.clone());
    if !site.description.is_empty() {
        wp.description = Some(site.description.clone());
    }
    wp.comment = site.narrative_text.clone();
    if !site.categories.is_empty() {
        wp.type_ = Some(site.categories.iter().cloned().collect::<Vec<_>>().join(","));
    }
    wp
}

/// Write a tour as GPX 1.1.
pub fn export_route<W: Write>(route: &Route, name: &str, writer: W) -> Result<(), GpxError> {
    let mut doc = gpx::Gpx {
        version: gpx::GpxVersion::Gpx11,
        creator: Some(format!("storywalk {}", crate::VERSION)),
        ..Default::default()
    };

    doc.waypoints = route.waypoints.iter().map(|w| site_waypoint(&w.site)).collect();

    let mut stops = Vec::with_capacity(route.waypoints.len() + 2);
    let mut start = waypoint_at(&route.start);
    start.name = Some("Start".to_string());
    stops.push(start);
    stops.extend(route.waypoints.iter().map(|w| site_waypoint(&w.site)));
    let mut end = waypoint_at(&route.end);
    end.name = Some("End".to_string());
    stops.push(end);

    doc.routes.push(gpx::Route {
        name: Some(name.to_string()),
        points: stops,
        ..Default::default()
    });

    if !route.path.is_empty() {
        let segment = gpx::TrackSegment {
            points: route.path.iter().map(waypoint_at).collect(),
        };
        doc.tracks.push(gpx::Track {
            name: Some(name.to_string()),
            segments: vec![segment],
            ..Default::default()
        });
    }

    gpx::write(&doc, writer).map_err(|e| GpxError::Write(e.to_string()))
}

/// Export a tour and return the GPX document as a string.
pub fn export_route_to_string(route: &Route, name: &str) -> Result<String, GpxError> {
    let mut buf = Vec::new();
    export_route(route, name, &mut buf)?;
    String::from_utf8(buf).map_err(|e| GpxError::Write(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::route::Waypoint;
    use crate::site::test_site;

    const SITES_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test"
     xmlns="http://www.topografix.com/GPX/1/1">
  <wpt lat="41.8902" lon="12.4922">
    <name>Colosseum</name>
    <cmt>Built under the Flavian emperors.</cmt>
    <desc>Amphitheatre in the centre of Rome</desc>
    <type>architecture, games</type>
  </wpt>
  <wpt lat="41.8986" lon="12.4769">
    <name>Pantheon</name>
  </wpt>
</gpx>"#;

    #[test]
    fn load_sites_maps_fields() {
        let sites = load_sites(SITES_GPX.as_bytes()).unwrap();
        assert_eq!(sites.len(), 2);

        let colosseum = &sites[0];
        assert_eq!(colosseum.id, SiteId::from("gpx-0"));
        assert_eq!(colosseum.title, "Colosseum");
        assert_eq!(colosseum.description, "Amphitheatre in the centre of Rome");
        assert_eq!(
            colosseum.narrative_text.as_deref(),
            Some("Built under the Flavian emperors.")
        );
        assert_eq!(
            colosseum.categories,
            BTreeSet::from(["architecture".to_string(), "games".to_string()])
        );
        assert!((colosseum.location.lat - 41.8902).abs() < 1e-6);
        assert!((colosseum.location.lon - 12.4922).abs() < 1e-6);
    }

    #[test]
    fn missing_type_means_no_categories() {
        let sites = load_sites(SITES_GPX.as_bytes()).unwrap();
        assert!(sites[1].categories.is_empty());
        assert_eq!(sites[1].narrative_text, None);
    }

    #[test]
    fn invalid_xml_is_an_error() {
        assert!(matches!(
            load_sites(&b"not xml at all"[..]),
            Err(GpxError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn repository_serves_loaded_sites() {
        let repo = GpxSiteRepository::from_bytes(SITES_GPX.as_bytes()).unwrap();
        assert_eq!(repo.list_all_sites().await.unwrap().len(), 2);
    }

    fn tour() -> Route {
        let mut site = test_site("forum", 41.8925, 12.4853, &["architecture"]);
        site.title = "Roman Forum".into();
        Route {
            start: GeoPoint::new(41.8902, 12.4922),
            end: GeoPoint::new(41.8986, 12.4769),
            path: vec![
                GeoPoint::new(41.8902, 12.4922),
                GeoPoint::new(41.8925, 12.4853),
                GeoPoint::new(41.8986, 12.4769),
            ],
            waypoints: vec![Waypoint {
                site,
                narration_audio: None,
                order: 0,
            }],
            steps: Vec::new(),
            total_distance_m: 1_900.0,
            total_duration_s: 1_500.0,
            requested_categories: BTreeSet::from(["architecture".to_string()]),
        }
    }

    #[test]
    fn export_writes_route_track_and_sites() {
        let xml = export_route_to_string(&tour(), "Ancient Rome").unwrap();

        let parsed = gpx::read(xml.as_bytes()).unwrap();
        assert_eq!(parsed.routes.len(), 1);
        assert_eq!(parsed.routes[0].name.as_deref(), Some("Ancient Rome"));
        assert_eq!(parsed.routes[0].points.len(), 3);
        assert_eq!(parsed.routes[0].points[1].name.as_deref(), Some("Roman Forum"));
        assert_eq!(parsed.tracks[0].segments[0].points.len(), 3);
    }

    #[test]
    fn exported_sites_load_back() {
        let xml = export_route_to_string(&tour(), "Ancient Rome").unwrap();
        let sites = load_sites(xml.as_bytes()).unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].title, "Roman Forum");
        assert!(sites[0].categories.contains("architecture"));
    }
}
