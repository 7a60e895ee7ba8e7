//! Planned tours with turn-by-turn instructions.
//!
//! A [`Route`] is built once by the planner and never mutated; the
//! navigation session keeps its own state alongside it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;
use crate::provider::AudioRef;
use crate::site::HistoricalSite;

/// Maneuver categories reported by the routing provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Maneuver {
    Straight,
    SlightLeft,
    Left,
    SharpLeft,
    SlightRight,
    Right,
    SharpRight,
    UTurn,
    KeepLeft,
    KeepRight,
    Roundabout,
    /// Anything the provider reports that has no dedicated variant.
    Other(String),
}

impl Maneuver {
    /// Parse a provider maneuver tag such as `turn-slight-left`.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "straight" => Maneuver::Straight,
            "turn-slight-left" => Maneuver::SlightLeft,
            "turn-left" => Maneuver::Left,
            "turn-sharp-left" => Maneuver::SharpLeft,
            "turn-slight-right" => Maneuver::SlightRight,
            "turn-right" => Maneuver::Right,
            "turn-sharp-right" => Maneuver::SharpRight,
            "uturn-left" | "uturn-right" => Maneuver::UTurn,
            "keep-left" | "fork-left" | "ramp-left" => Maneuver::KeepLeft,
            "keep-right" | "fork-right" | "ramp-right" => Maneuver::KeepRight,
            "roundabout-left" | "roundabout-right" => Maneuver::Roundabout,
            other => Maneuver::Other(other.to_string()),
        }
    }

    fn tag(&self) -> &str {
        match self {
            Maneuver::Straight => "straight",
            Maneuver::SlightLeft => "turn-slight-left",
            Maneuver::Left => "turn-left",
            Maneuver::SharpLeft => "turn-sharp-left",
            Maneuver::SlightRight => "turn-slight-right",
            Maneuver::Right => "turn-right",
            Maneuver::SharpRight => "turn-sharp-right",
            Maneuver::UTurn => "uturn-left",
            Maneuver::KeepLeft => "keep-left",
            Maneuver::KeepRight => "keep-right",
            Maneuver::Roundabout => "roundabout-right",
            Maneuver::Other(tag) => tag,
        }
    }

    /// Short spoken phrase for the maneuver.
    pub fn spoken(&self) -> &str {
        match self {
            Maneuver::Straight => "continue straight",
            Maneuver::SlightLeft => "keep slightly left",
            Maneuver::Left => "turn left",
            Maneuver::SharpLeft => "turn sharp left",
            Maneuver::SlightRight => "keep slightly right",
            Maneuver::Right => "turn right",
            Maneuver::SharpRight => "turn sharp right",
            Maneuver::UTurn => "make a U-turn",
            Maneuver::KeepLeft => "keep left",
            Maneuver::KeepRight => "keep right",
            Maneuver::Roundabout => "enter the roundabout",
            Maneuver::Other(_) => "continue",
        }
    }
}

impl From<String> for Maneuver {
    fn from(tag: String) -> Self {
        Maneuver::parse(&tag)
    }
}

impl From<Maneuver> for String {
    fn from(m: Maneuver) -> Self {
        m.tag().to_string()
    }
}

/// A single turn-by-turn instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Plain instruction text, markup removed.
    pub text: String,
    pub distance_m: f64,
    pub duration_s: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maneuver: Option<Maneuver>,
}

impl Instruction {
    /// Build from provider step fields.
    pub fn from_step(
        html_instructions: &str,
        distance_m: f64,
        duration_s: f64,
        maneuver: Option<&str>,
    ) -> Self {
        let maneuver = maneuver.filter(|m| !m.is_empty()).map(Maneuver::parse);
        let mut text = strip_html(html_instructions);
        if text.is_empty() {
            if let Some(m) = &maneuver {
                text = format!("In {}, {}", format_distance(distance_m), m.spoken());
            }
        }
        Self {
            text,
            distance_m,
            duration_s,
            maneuver,
        }
    }
}

/// A site selected for the tour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub site: HistoricalSite,
    /// Pre-synthesized announcement; `None` if narration failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration_audio: Option<AudioRef>,
    /// Position in the provider-optimized visiting order (0-based).
    pub order: usize,
}

/// A planned walking tour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub start: GeoPoint,
    pub end: GeoPoint,
    /// Dense path geometry decoded from every step.
    pub path: Vec<GeoPoint>,
    pub waypoints: Vec<Waypoint>,
    pub steps: Vec<Instruction>,
    pub total_distance_m: f64,
    pub total_duration_s: f64,
    pub requested_categories: BTreeSet<String>,
}

impl Route {
    /// Opening announcement: tour length and the first instruction.
    pub fn summary_announcement(&self) -> String {
        let mut text = format!(
            "Your tour is {} long with {} {}.",
            format_distance(self.total_distance_m),
            self.waypoints.len(),
            if self.waypoints.len() == 1 { "stop" } else { "stops" },
        );
        if let Some(first) = self.steps.first() {
            text.push(' ');
            text.push_str(&first.text);
        }
        text
    }
}

/// Announcement spoken when approaching a waypoint.
pub fn approach_announcement(site: &HistoricalSite) -> String {
    let narrative = site.narrative_text.as_deref().unwrap_or(&site.description);
    format!("You are now approaching {}. {}", site.title, narrative)
        .trim_end()
        .to_string()
}

/// Remove markup tags and collapse whitespace.
///
/// Block-level tags (`div`, `br`, `p`) become a space so adjacent
/// sentences do not run together.
pub fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let Some(close) = rest[open..].find('>') else {
            // Unterminated tag: drop the remainder.
            rest = "";
            break;
        };
        let tag = rest[open + 1..open + close].trim_start_matches('/');
        let name = tag
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if matches!(name.as_str(), "div" | "br" | "p") {
            out.push(' ');
        }
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);

    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Human-readable distance, rounded to 10 m below a kilometer.
pub fn format_distance(meters: f64) -> String {
    let rounded = (meters / 10.0).round() as i64 * 10;
    if rounded >= 1000 {
        format!("{:.1} km", meters / 1000.0)
    } else {
        format!("{rounded} m")
    }
}
