//! Normalization of loosely-shaped upstream reports into [`NormalizedEvent`].
//!
//! Upstream feeds disagree on field names, so each canonical field has an
//! ordered list of places to look; the first one that yields a usable value
//! wins. Numbers are accepted either as JSON numbers or numeric strings.
//!
//! A report that cannot be normalized is a [`NormalizeOutcome::Skip`], not
//! an error: one bad item never fails a batch.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use quakeguard_core::clock::Clock;
use quakeguard_core::types::{
    Certainty, GeoPoint, NormalizedEvent, Timestamp, DEPTH_RANGE_KM, MAGNITUDE_RANGE,
};
use serde_json::{Map, Value};

/// Depth assumed when a report omits it.
pub const NOMINAL_DEPTH_KM: f64 = 10.0;

/// Epoch values below this are taken to be seconds rather than milliseconds.
const EPOCH_SECONDS_THRESHOLD: f64 = 1e11;

/// A raw upstream record, as received.
#[derive(Clone, Debug, PartialEq)]
pub struct RawEventReport(pub Value);

impl From<Value> for RawEventReport {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Why a report was dropped.
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    NotAnObject,
    MissingId,
    MissingCoordinates,
    InvalidCoordinates { lat: f64, lon: f64 },
    MissingMagnitude,
    MagnitudeOutOfRange(f64),
    DepthOutOfRange(f64),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAnObject => write!(f, "report is not a JSON object"),
            SkipReason::MissingId => write!(f, "missing event id"),
            SkipReason::MissingCoordinates => write!(f, "missing coordinates"),
            SkipReason::InvalidCoordinates { lat, lon } => {
                write!(f, "invalid coordinates ({}, {})", lat, lon)
            }
            SkipReason::MissingMagnitude => write!(f, "missing magnitude"),
            SkipReason::MagnitudeOutOfRange(m) => write!(f, "magnitude {} out of range", m),
            SkipReason::DepthOutOfRange(d) => write!(f, "depth {} km out of range", d),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NormalizeOutcome {
    Normalized(NormalizedEvent),
    Skip(SkipReason),
}

impl NormalizeOutcome {
    pub fn into_event(self) -> Option<NormalizedEvent> {
        match self {
            NormalizeOutcome::Normalized(event) => Some(event),
            NormalizeOutcome::Skip(_) => None,
        }
    }
}

/// Where to look for a value inside a report.
#[derive(Clone, Copy, Debug)]
enum FieldPath {
    Key(&'static str),
    /// Index into `geojson.coordinates` (`[lon, lat]`).
    GeoJsonCoordinate(usize),
}

use FieldPath::{GeoJsonCoordinate, Key};

const ID_PATHS: &[FieldPath] = &[
    Key("id"),
    Key("eventId"),
    Key("eventID"),
    Key("event_id"),
    Key("earthquake_id"),
    Key("_id"),
];
const LAT_PATHS: &[FieldPath] = &[
    Key("lat"),
    Key("latitude"),
    Key("Latitude"),
    GeoJsonCoordinate(1),
];
const LON_PATHS: &[FieldPath] = &[
    Key("lon"),
    Key("lng"),
    Key("longitude"),
    Key("Longitude"),
    GeoJsonCoordinate(0),
];
const MAGNITUDE_PATHS: &[FieldPath] = &[
    Key("mag"),
    Key("magnitude"),
    Key("Magnitude"),
    Key("ml"),
    Key("mw"),
];
const DEPTH_PATHS: &[FieldPath] = &[Key("depth"), Key("depth_km"), Key("Depth")];
const REGION_PATHS: &[FieldPath] = &[
    Key("title"),
    Key("region"),
    Key("location"),
    Key("place"),
    Key("lokasyon"),
];
const SOURCE_PATHS: &[FieldPath] = &[Key("source"), Key("provider"), Key("agency")];
const STATION_PATHS: &[FieldPath] = &[Key("stations"), Key("station_count"), Key("nst")];

const EPOCH_KEYS: &[&str] = &["timestamp", "time_ms", "originTimeMs"];
const CREATED_KEYS: &[&str] = &["created_at", "createdAt"];

fn lookup<'a>(obj: &'a Map<String, Value>, path: FieldPath) -> Option<&'a Value> {
    match path {
        Key(key) => obj.get(key),
        GeoJsonCoordinate(index) => obj
            .get("geojson")?
            .get("coordinates")?
            .as_array()?
            .get(index),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn first_number(obj: &Map<String, Value>, paths: &[FieldPath]) -> Option<f64> {
    paths
        .iter()
        .find_map(|p| lookup(obj, *p).and_then(as_number))
}

fn first_text(obj: &Map<String, Value>, paths: &[FieldPath]) -> Option<String> {
    paths.iter().find_map(|p| lookup(obj, *p).and_then(as_text))
}

fn epoch_to_timestamp(value: f64) -> Option<Timestamp> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let millis = if value < EPOCH_SECONDS_THRESHOLD {
        value * 1000.0
    } else {
        value
    };
    Some(Timestamp(millis.round() as i64))
}

/// RFC 3339, or a naive `YYYY-MM-DD HH:MM:SS` (dots accepted as date
/// separators) interpreted as UTC.
fn parse_datetime(text: &str) -> Option<Timestamp> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(Timestamp(dt.timestamp_millis()));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y.%m.%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| Timestamp(naive.and_utc().timestamp_millis()))
}

fn parse_date_and_time(date: &str, time: &str) -> Option<Timestamp> {
    let date = ["%Y-%m-%d", "%Y.%m.%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date.trim(), fmt).ok())?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M:%S").ok()?;
    Some(Timestamp(
        NaiveDateTime::new(date, time).and_utc().timestamp_millis(),
    ))
}

/// Converts [`RawEventReport`]s into [`NormalizedEvent`]s.
///
/// Holds the clock used as the last-resort origin time and the source label
/// for reports that do not name their own.
pub struct EventNormalizer {
    clock: Arc<dyn Clock>,
    default_source: String,
}

impl EventNormalizer {
    pub fn new(clock: Arc<dyn Clock>, default_source: impl Into<String>) -> Self {
        Self {
            clock,
            default_source: default_source.into(),
        }
    }

    pub fn default_source(&self) -> &str {
        &self.default_source
    }

    pub fn normalize(&self, raw: &RawEventReport) -> NormalizeOutcome {
        let Some(obj) = raw.0.as_object() else {
            return NormalizeOutcome::Skip(SkipReason::NotAnObject);
        };

        let Some(id) = first_text(obj, ID_PATHS) else {
            return NormalizeOutcome::Skip(SkipReason::MissingId);
        };

        let (lat, lon) = match (first_number(obj, LAT_PATHS), first_number(obj, LON_PATHS)) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return NormalizeOutcome::Skip(SkipReason::MissingCoordinates),
        };
        let epicenter = GeoPoint::new(lat, lon);
        if !epicenter.is_valid() {
            return NormalizeOutcome::Skip(SkipReason::InvalidCoordinates { lat, lon });
        }

        let Some(magnitude) = first_number(obj, MAGNITUDE_PATHS) else {
            return NormalizeOutcome::Skip(SkipReason::MissingMagnitude);
        };
        let (min_mag, max_mag) = MAGNITUDE_RANGE;
        if !magnitude.is_finite() || !(min_mag..=max_mag).contains(&magnitude) {
            return NormalizeOutcome::Skip(SkipReason::MagnitudeOutOfRange(magnitude));
        }

        let depth_km = first_number(obj, DEPTH_PATHS).unwrap_or(NOMINAL_DEPTH_KM);
        let (min_depth, max_depth) = DEPTH_RANGE_KM;
        if !depth_km.is_finite() || !(min_depth..=max_depth).contains(&depth_km) {
            return NormalizeOutcome::Skip(SkipReason::DepthOutOfRange(depth_km));
        }

        let region = first_text(obj, REGION_PATHS).unwrap_or_else(|| "Unknown".to_string());
        let source =
            first_text(obj, SOURCE_PATHS).unwrap_or_else(|| self.default_source.clone());
        let station_count = first_number(obj, STATION_PATHS)
            .filter(|n| n.is_finite() && *n >= 0.0 && *n <= u32::MAX as f64)
            .map(|n| n.round() as u32);

        NormalizeOutcome::Normalized(NormalizedEvent {
            id,
            epicenter,
            magnitude,
            depth_km,
            region,
            source,
            origin_time: self.origin_time(obj),
            station_count,
        })
    }

    fn origin_time(&self, obj: &Map<String, Value>) -> Timestamp {
        let explicit_epoch = EPOCH_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(as_number))
            .or_else(|| obj.get("time").and_then(Value::as_f64))
            .and_then(epoch_to_timestamp);
        if let Some(ts) = explicit_epoch {
            return ts;
        }

        let composed = match (
            obj.get("date").and_then(Value::as_str),
            obj.get("time").and_then(Value::as_str),
        ) {
            (Some(date), Some(time)) => parse_date_and_time(date, time),
            _ => None,
        }
        .or_else(|| {
            obj.get("date_time")
                .and_then(Value::as_str)
                .and_then(parse_datetime)
        });
        if let Some(ts) = composed {
            return ts;
        }

        let created = CREATED_KEYS.iter().find_map(|k| match obj.get(*k)? {
            Value::String(s) => parse_datetime(s),
            other => as_number(other).and_then(epoch_to_timestamp),
        });
        created.unwrap_or_else(|| self.clock.now())
    }
}

/// Confidence that an event matters to an observer `distance_km` away.
///
/// `None` distance (observer unknown) is treated as far.
pub fn classify_certainty(magnitude: f64, distance_km: Option<f64>) -> Certainty {
    let distance = distance_km.unwrap_or(f64::INFINITY);
    if magnitude >= 5.0 {
        Certainty::High
    } else if magnitude >= 4.0 {
        if distance < 100.0 {
            Certainty::High
        } else {
            Certainty::Medium
        }
    } else if magnitude >= 3.0 {
        if distance < 50.0 {
            Certainty::Medium
        } else {
            Certainty::Low
        }
    } else {
        Certainty::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quakeguard_core::clock::FixedClock;
    use serde_json::json;

    const NOW: Timestamp = Timestamp(1_705_312_800_000); // 2024-01-15T10:00:00Z

    fn normalizer() -> EventNormalizer {
        EventNormalizer::new(Arc::new(FixedClock::new(NOW)), "kandilli")
    }

    fn normalize(value: Value) -> NormalizeOutcome {
        normalizer().normalize(&RawEventReport(value))
    }

    fn expect_event(value: Value) -> NormalizedEvent {
        match normalize(value) {
            NormalizeOutcome::Normalized(event) => event,
            NormalizeOutcome::Skip(reason) => panic!("unexpected skip: {}", reason),
        }
    }

    fn expect_skip(value: Value) -> SkipReason {
        match normalize(value) {
            NormalizeOutcome::Skip(reason) => reason,
            NormalizeOutcome::Normalized(e) => panic!("unexpected event: {:?}", e),
        }
    }

    // ---- upstream shapes ----

    #[test]
    fn test_kandilli_shape() {
        let event = expect_event(json!({
            "earthquake_id": "abc123",
            "provider": "kandilli",
            "title": "MARMARA DENIZI",
            "date_time": "2024-01-15 09:30:00",
            "mag": 4.1,
            "depth": 7.2,
            "geojson": { "type": "Point", "coordinates": [28.95, 40.85] }
        }));
        assert_eq!(event.id, "abc123");
        assert_eq!(event.epicenter, GeoPoint::new(40.85, 28.95));
        assert_eq!(event.magnitude, 4.1);
        assert_eq!(event.depth_km, 7.2);
        assert_eq!(event.region, "MARMARA DENIZI");
        assert_eq!(event.source, "kandilli");
        assert_eq!(event.origin_time, Timestamp(NOW.0 - 30 * 60 * 1000));
    }

    #[test]
    fn test_stream_shape() {
        let event = expect_event(json!({
            "eventId": "s-77",
            "latitude": "38.42",
            "longitude": "27.14",
            "magnitude": "5.3",
            "depth_km": "12",
            "region": "Izmir",
            "originTimeMs": 1_705_312_000_000i64,
            "stations": 9
        }));
        assert_eq!(event.id, "s-77");
        assert_eq!(event.epicenter, GeoPoint::new(38.42, 27.14));
        assert_eq!(event.magnitude, 5.3);
        assert_eq!(event.depth_km, 12.0);
        assert_eq!(event.source, "kandilli");
        assert_eq!(event.origin_time, Timestamp(1_705_312_000_000));
        assert_eq!(event.station_count, Some(9));
    }

    #[test]
    fn test_afad_shape_with_date_and_time() {
        let event = expect_event(json!({
            "eventID": 558231,
            "Latitude": 37.22,
            "Longitude": 37.02,
            "Magnitude": 3.4,
            "Depth": 9.8,
            "lokasyon": "Pazarcik (Kahramanmaras)",
            "date": "2024.01.15",
            "time": "09:00:00",
            "agency": "AFAD",
            "nst": "14"
        }));
        assert_eq!(event.id, "558231");
        assert_eq!(event.region, "Pazarcik (Kahramanmaras)");
        assert_eq!(event.source, "AFAD");
        assert_eq!(event.origin_time, Timestamp(NOW.0 - 60 * 60 * 1000));
        assert_eq!(event.station_count, Some(14));
    }

    #[test]
    fn test_usgs_like_shape() {
        let event = expect_event(json!({
            "id": "us7000abcd",
            "lat": 35.68,
            "lng": 139.69,
            "mw": 6.1,
            "place": "near Tokyo",
            "time": 1_705_311_000_000i64
        }));
        assert_eq!(event.magnitude, 6.1);
        assert_eq!(event.region, "near Tokyo");
        assert_eq!(event.origin_time, Timestamp(1_705_311_000_000));
        // Missing depth gets the nominal value.
        assert_eq!(event.depth_km, NOMINAL_DEPTH_KM);
    }

    // ---- field precedence ----

    #[test]
    fn test_first_extractor_wins() {
        let event = expect_event(json!({
            "id": "first",
            "_id": "last",
            "lat": 40.0, "latitude": 10.0,
            "lon": 30.0,
            "mag": 4.0, "ml": 2.0,
            "title": "T", "place": "P"
        }));
        assert_eq!(event.id, "first");
        assert_eq!(event.epicenter.lat, 40.0);
        assert_eq!(event.magnitude, 4.0);
        assert_eq!(event.region, "T");
    }

    #[test]
    fn test_unparseable_value_falls_through() {
        let event = expect_event(json!({
            "id": "x", "lat": "north", "latitude": 39.0, "lon": 32.0, "mag": 4.0
        }));
        assert_eq!(event.epicenter.lat, 39.0);
    }

    #[test]
    fn test_defaults_for_region_and_source() {
        let event = expect_event(json!({"id": "x", "lat": 39.0, "lon": 32.0, "mag": 4.0}));
        assert_eq!(event.region, "Unknown");
        assert_eq!(event.source, "kandilli");
        assert_eq!(event.station_count, None);
    }

    // ---- timestamps ----

    #[test]
    fn test_epoch_seconds_are_scaled() {
        let event = expect_event(json!({
            "id": "x", "lat": 39.0, "lon": 32.0, "mag": 4.0, "timestamp": 1_705_312_000
        }));
        assert_eq!(event.origin_time, Timestamp(1_705_312_000_000));
    }

    #[test]
    fn test_epoch_beats_date_fields() {
        let event = expect_event(json!({
            "id": "x", "lat": 39.0, "lon": 32.0, "mag": 4.0,
            "time_ms": 1_000_000_000_000i64,
            "date_time": "2024-01-15 09:30:00"
        }));
        assert_eq!(event.origin_time, Timestamp(1_000_000_000_000));
    }

    #[test]
    fn test_rfc3339_date_time() {
        let event = expect_event(json!({
            "id": "x", "lat": 39.0, "lon": 32.0, "mag": 4.0,
            "date_time": "2024-01-15T12:00:00+03:00"
        }));
        assert_eq!(event.origin_time, Timestamp(NOW.0 - 60 * 60 * 1000));
    }

    #[test]
    fn test_created_at_fallback() {
        let event = expect_event(json!({
            "id": "x", "lat": 39.0, "lon": 32.0, "mag": 4.0,
            "created_at": "2024-01-15T09:59:00Z"
        }));
        assert_eq!(event.origin_time, Timestamp(NOW.0 - 60_000));
    }

    #[test]
    fn test_clock_fallback() {
        let event = expect_event(json!({
            "id": "x", "lat": 39.0, "lon": 32.0, "mag": 4.0, "date_time": "yesterday"
        }));
        assert_eq!(event.origin_time, NOW);
    }

    // ---- rejections ----

    #[test]
    fn test_skip_reasons() {
        assert_eq!(expect_skip(json!([1, 2])), SkipReason::NotAnObject);
        assert_eq!(
            expect_skip(json!({"lat": 39.0, "lon": 32.0, "mag": 4.0})),
            SkipReason::MissingId
        );
        assert_eq!(
            expect_skip(json!({"id": "x", "lat": 39.0, "mag": 4.0})),
            SkipReason::MissingCoordinates
        );
        assert_eq!(
            expect_skip(json!({"id": "x", "lat": 95.0, "lon": 32.0, "mag": 4.0})),
            SkipReason::InvalidCoordinates { lat: 95.0, lon: 32.0 }
        );
        assert_eq!(
            expect_skip(json!({"id": "x", "lat": 39.0, "lon": 32.0})),
            SkipReason::MissingMagnitude
        );
        assert_eq!(
            expect_skip(json!({"id": "x", "lat": 39.0, "lon": 32.0, "mag": 11.0})),
            SkipReason::MagnitudeOutOfRange(11.0)
        );
        assert_eq!(
            expect_skip(json!({"id": "x", "lat": 39.0, "lon": 32.0, "mag": 4.0, "depth": 800})),
            SkipReason::DepthOutOfRange(800.0)
        );
    }

    #[test]
    fn test_nan_string_coordinates_rejected() {
        let reason = expect_skip(json!({"id": "x", "lat": "NaN", "lon": 32.0, "mag": 4.0}));
        assert!(matches!(reason, SkipReason::InvalidCoordinates { .. }));
    }

    #[test]
    fn test_empty_id_is_missing() {
        assert_eq!(
            expect_skip(json!({"id": "  ", "lat": 39.0, "lon": 32.0, "mag": 4.0})),
            SkipReason::MissingId
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = RawEventReport(json!({"id": "x", "lat": 39.0, "lon": 32.0, "mag": 4.0}));
        let n = normalizer();
        assert_eq!(n.normalize(&raw), n.normalize(&raw));
    }

    // ---- certainty ----

    #[test]
    fn test_classify_certainty() {
        assert_eq!(classify_certainty(5.0, None), Certainty::High);
        assert_eq!(classify_certainty(4.5, Some(80.0)), Certainty::High);
        assert_eq!(classify_certainty(4.5, Some(150.0)), Certainty::Medium);
        assert_eq!(classify_certainty(4.5, None), Certainty::Medium);
        assert_eq!(classify_certainty(3.5, Some(20.0)), Certainty::Medium);
        assert_eq!(classify_certainty(3.5, Some(60.0)), Certainty::Low);
        assert_eq!(classify_certainty(2.9, Some(1.0)), Certainty::Low);
    }
}
