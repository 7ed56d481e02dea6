mod gpx;
mod tcx;

pub use gpx::GpxParser;
pub use tcx::{normalize_cadence, skip_incomplete_point_policy, TcxParser, SINGLE_LEG_CADENCE_MAX};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ParseError;
use crate::pipeline::geo;
use crate::pipeline::stats::{self, TrackAccumulator};
use crate::types::activity::{Activity, ActivityStats, FileFormat, TrackPoint};

pub trait Parser {
    fn parse(&self, text: &str, file_name: &str) -> Result<Activity, ParseError>;
}

/// Detects the dialect of `text` and parses it.
pub fn parse(text: &str, file_name: &str) -> Result<Activity, ParseError> {
    let format = detect_format(text)?;
    let activity = match format {
        FileFormat::Gpx => GpxParser.parse(text, file_name),
        FileFormat::Tcx => TcxParser.parse(text, file_name),
    }?;

    tracing::debug!(
        "Parsed {} as {} ({} points, {:.2} km)",
        file_name,
        format.as_str(),
        activity.points.len(),
        activity.stats.total_distance_km
    );

    Ok(activity)
}

/// Checks that `text` is well-formed XML and picks the parser from its
/// root markers. A TCX database wins over a GPX element.
pub fn detect_format(text: &str) -> Result<FileFormat, ParseError> {
    let mut reader = Reader::from_reader(text.as_bytes());
    reader.trim_text(true);
    reader.check_end_names(true);

    let mut depth = 0usize;
    let mut saw_element = false;
    let mut has_tcx = false;
    let mut has_gpx = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if saw_element && depth == 0 {
                    return Err(trailing_content(&reader));
                }
                depth += 1;
                saw_element = true;
                match e.local_name().as_ref() {
                    b"TrainingCenterDatabase" => has_tcx = true,
                    b"gpx" => has_gpx = true,
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                if saw_element && depth == 0 {
                    return Err(trailing_content(&reader));
                }
                saw_element = true;
                match e.local_name().as_ref() {
                    b"TrainingCenterDatabase" => has_tcx = true,
                    b"gpx" => has_gpx = true,
                    _ => {}
                }
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Text(_)) | Ok(Event::CData(_)) if depth == 0 => {
                return Err(ParseError::MalformedXml(format!(
                    "text outside the root element at byte {}",
                    reader.buffer_position()
                )));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed(&reader, e)),
            _ => {}
        }
        buf.clear();
    }

    if !saw_element {
        return Err(ParseError::MalformedXml("no root element".to_string()));
    }
    if depth != 0 {
        return Err(ParseError::MalformedXml(
            "unexpected end of document, unclosed element".to_string(),
        ));
    }

    if has_tcx {
        Ok(FileFormat::Tcx)
    } else if has_gpx {
        Ok(FileFormat::Gpx)
    } else {
        Err(ParseError::UnsupportedFormat)
    }
}

fn trailing_content<R>(reader: &Reader<R>) -> ParseError {
    ParseError::MalformedXml(format!(
        "content after the root element at byte {}",
        reader.buffer_position()
    ))
}

pub(crate) fn malformed<R>(reader: &Reader<R>, err: quick_xml::Error) -> ParseError {
    ParseError::MalformedXml(format!("{} at byte {}", err, reader.buffer_position()))
}

/// Where a point's cumulative distance comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceSource {
    /// The file carries its own cumulative distance, in kilometers.
    Reported(f64),
    /// Computed from the great-circle step to the previous point.
    Derived,
}

/// A point as read from the document, before derived fields are filled in.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawPoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    pub time: Option<String>,
    pub heart_rate: Option<u16>,
    pub cadence: Option<u16>,
    pub distance: DistanceSource,
}

/// Resolves the cumulative distance and interval pace of a point that
/// follows `prev`.
pub fn resolve_interval(
    prev: Option<&TrackPoint>,
    lat: f64,
    lon: f64,
    time: DateTime<Utc>,
    source: DistanceSource,
) -> (f64, Option<f64>) {
    let Some(prev) = prev else {
        let start = match source {
            DistanceSource::Reported(km) => km,
            DistanceSource::Derived => 0.0,
        };
        return (start, None);
    };

    let (cumulative, interval_km) = match source {
        DistanceSource::Reported(km) => (km, km - prev.distance_km),
        DistanceSource::Derived => {
            let step = geo::distance_km(prev.lat, prev.lon, lat, lon);
            (prev.distance_km + step, step)
        }
    };

    let interval_s = (time - prev.time).num_milliseconds() as f64 / 1000.0;
    let pace = if interval_km > 0.0 && interval_s > 0.0 {
        Some(interval_s / interval_km).filter(|p| p.is_finite())
    } else {
        None
    };

    (cumulative, pace)
}

/// Turns raw points into track points, threading the running totals
/// through each step.
pub(crate) fn build_track(raw: Vec<RawPoint>, now: DateTime<Utc>) -> (Vec<TrackPoint>, TrackAccumulator) {
    raw.into_iter().fold(
        (Vec::new(), TrackAccumulator::default()),
        |(mut points, mut acc), raw| {
            let (time, time_text) = default_timestamp_policy(raw.time.as_deref(), now);
            let (distance_km, pace) =
                resolve_interval(points.last(), raw.lat, raw.lon, time, raw.distance);

            acc.distance_km = distance_km;
            if let Some(cadence) = raw.cadence {
                acc.cadence_sum += cadence as u64;
                acc.cadence_count += 1;
            }

            points.push(TrackPoint {
                lat: raw.lat,
                lon: raw.lon,
                elevation: raw.elevation,
                time,
                time_text,
                heart_rate: raw.heart_rate,
                cadence: raw.cadence,
                distance_km,
                pace,
            });
            (points, acc)
        },
    )
}

pub(crate) fn finish_track(raw: Vec<RawPoint>) -> Result<(Vec<TrackPoint>, ActivityStats), ParseError> {
    if raw.is_empty() {
        return Err(ParseError::NoTrackPoints);
    }
    let (points, acc) = build_track(raw, Utc::now());
    let stats = stats::summarize(&points, &acc);
    Ok((points, stats))
}

/// A missing or unreadable timestamp becomes `now`. A readable one keeps its
/// source text so merges can match on it verbatim.
pub fn default_timestamp_policy(text: Option<&str>, now: DateTime<Utc>) -> (DateTime<Utc>, String) {
    match text.map(str::trim).and_then(|t| parse_timestamp(t).map(|dt| (dt, t))) {
        Some((time, raw)) => (time, raw.to_string()),
        None => (now, format_timestamp(now)),
    }
}

pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    // Some exporters drop the zone designator; read those as UTC.
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Whole non-negative count such as bpm or rpm. Decimal text is truncated.
pub(crate) fn parse_count(text: &str) -> Option<u16> {
    let text = text.trim();
    if let Ok(value) = text.parse::<u16>() {
        return Some(value);
    }
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.min(u16::MAX as f64) as u16)
}

pub(crate) fn parse_decimal(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
