pub mod android_jni;
pub mod config;
pub mod corridor;
pub mod directions;
pub mod geo;
pub mod gpx;
pub mod location;
pub mod planner;
pub mod polyline;
pub mod provider;
pub mod route;
pub mod session;
pub mod site;

pub use config::{RetryPolicy, TourConfig};
pub use geo::GeoPoint;
pub use planner::{RouteRequest, RoutePlanner, RoutingError, RoutingErrorKind};
pub use route::{Instruction, Route, Waypoint};
pub use session::{NavigationError, NavigationEvent, NavigationSession, SessionState};
pub use site::{HistoricalSite, PointRepository, SiteId};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
