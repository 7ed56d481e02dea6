use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ParseError;
use crate::pipeline::parse::{
    finish_track, malformed, parse_count, parse_decimal, DistanceSource, Parser, RawPoint,
};
use crate::types::activity::{Activity, FileFormat};

/// Raw TCX cadence at or below this is read as single-leg revolutions per
/// minute and doubled to steps per minute.
pub const SINGLE_LEG_CADENCE_MAX: u16 = 100;

pub fn normalize_cadence(raw: u16) -> u16 {
    if raw > SINGLE_LEG_CADENCE_MAX {
        raw
    } else {
        raw.saturating_mul(2)
    }
}

pub struct TcxParser;

/// Fields of one Trackpoint as they are found. Position is optional here and
/// checked once the element closes.
#[derive(Debug, Default)]
struct PendingPoint {
    lat: Option<f64>,
    lon: Option<f64>,
    elevation: Option<f64>,
    time: Option<String>,
    heart_rate: Option<u16>,
    cadence: Option<u16>,
    distance_m: Option<f64>,
}

/// A Trackpoint without both coordinates is dropped without error.
pub fn skip_incomplete_point_policy(lat: Option<f64>, lon: Option<f64>) -> Option<(f64, f64)> {
    lat.zip(lon)
}

impl PendingPoint {
    fn into_raw(self) -> Option<RawPoint> {
        let (lat, lon) = skip_incomplete_point_policy(self.lat, self.lon)?;
        let distance = match self.distance_m {
            Some(meters) => DistanceSource::Reported(meters / 1000.0),
            None => DistanceSource::Derived,
        };

        Some(RawPoint {
            lat,
            lon,
            elevation: self.elevation,
            time: self.time,
            heart_rate: self.heart_rate,
            cadence: self.cadence.map(normalize_cadence),
            distance,
        })
    }
}

impl Parser for TcxParser {
    fn parse(&self, text: &str, file_name: &str) -> Result<Activity, ParseError> {
        let mut reader = Reader::from_reader(text.as_bytes());
        reader.trim_text(true);
        reader.check_end_names(true);

        let mut raw_points = Vec::new();
        let mut current_point: Option<PendingPoint> = None;
        let mut path: Vec<String> = Vec::new();
        let mut sport: Option<String> = None;
        let mut creator_name: Option<String> = None;
        let mut author_name: Option<String> = None;
        let mut skipped = 0usize;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let name = local_name(&e);
                    match name.as_str() {
                        "Activity" if sport.is_none() => sport = attribute(&e, b"Sport")?,
                        "Trackpoint" => current_point = Some(PendingPoint::default()),
                        _ => {}
                    }
                    path.push(name);
                }
                Ok(Event::Empty(e)) => {
                    if local_name(&e) == "Trackpoint" {
                        skipped += 1;
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(|err| malformed(&reader, err))?;
                    let names = NameSlots {
                        creator: &mut creator_name,
                        author: &mut author_name,
                    };
                    handle_text(&path, &text, current_point.as_mut(), names);
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    let names = NameSlots {
                        creator: &mut creator_name,
                        author: &mut author_name,
                    };
                    handle_text(&path, &text, current_point.as_mut(), names);
                }
                Ok(Event::End(_)) => {
                    if path.pop().as_deref() == Some("Trackpoint") {
                        match current_point.take().and_then(PendingPoint::into_raw) {
                            Some(raw) => raw_points.push(raw),
                            None => skipped += 1,
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(malformed(&reader, e)),
                _ => {}
            }
            buf.clear();
        }

        if skipped > 0 {
            tracing::debug!("Skipped {} trackpoints without a position in {}", skipped, file_name);
        }

        let (points, stats) = finish_track(raw_points)?;
        let name = sport
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| file_name.to_string());

        Ok(Activity {
            name,
            device_name: creator_name.or(author_name),
            format: FileFormat::Tcx,
            points,
            stats,
        })
    }
}

struct NameSlots<'a> {
    creator: &'a mut Option<String>,
    author: &'a mut Option<String>,
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart, key: &[u8]) -> Result<Option<String>, ParseError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ParseError::MalformedXml(err.to_string()))?;
        if attr.key.local_name().as_ref() == key {
            return Ok(attr.unescape_value().ok().map(|v| v.into_owned()));
        }
    }
    Ok(None)
}

fn handle_text(path: &[String], text: &str, point: Option<&mut PendingPoint>, names: NameSlots) {
    let current = path.last().map(String::as_str);
    let parent = path.len().checked_sub(2).map(|i| path[i].as_str());

    if let Some(point) = point {
        match (parent, current) {
            (_, Some("Time")) if point.time.is_none() => point.time = Some(text.to_string()),
            (Some("Position"), Some("LatitudeDegrees")) => point.lat = parse_decimal(text),
            (Some("Position"), Some("LongitudeDegrees")) => point.lon = parse_decimal(text),
            (_, Some("AltitudeMeters")) => point.elevation = parse_decimal(text),
            (Some("Trackpoint"), Some("DistanceMeters")) => point.distance_m = parse_decimal(text),
            (Some("HeartRateBpm"), Some("Value")) => point.heart_rate = parse_count(text),
            (Some("Trackpoint"), Some("Cadence")) => point.cadence = parse_count(text),
            // Running watches put cadence in the activity extension instead.
            (_, Some("RunCadence")) if point.cadence.is_none() => {
                point.cadence = parse_count(text)
            }
            _ => {}
        }
        return;
    }

    if current != Some("Name") || text.trim().is_empty() {
        return;
    }
    match parent {
        Some("Creator") if names.creator.is_none() => *names.creator = Some(text.to_string()),
        Some("Author") if names.author.is_none() => *names.author = Some(text.to_string()),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Activity, ParseError> {
        TcxParser.parse(text, "watch.tcx")
    }

    fn document(sport: &str, trackpoints: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2"
  xmlns:ns3="http://www.garmin.com/xmlschemas/ActivityExtension/v2">
  <Activities>
    <Activity Sport="{sport}">
      <Id>2024-03-01T12:00:00Z</Id>
      <Lap StartTime="2024-03-01T12:00:00Z"><DistanceMeters>9999</DistanceMeters><Cadence>80</Cadence>
        <Track>{trackpoints}</Track>
      </Lap>
      <Creator><Name>Forerunner 955</Name></Creator>
    </Activity>
  </Activities>
  <Author><Name>Connect Api</Name></Author>
</TrainingCenterDatabase>"#
        )
    }

    fn trackpoint(second: u32, lat: f64, lon: f64, extra: &str) -> String {
        format!(
            "<Trackpoint><Time>2024-03-01T12:00:{second:02}Z</Time>\
             <Position><LatitudeDegrees>{lat}</LatitudeDegrees><LongitudeDegrees>{lon}</LongitudeDegrees></Position>\
             {extra}</Trackpoint>"
        )
    }

    #[test]
    fn reads_sport_device_and_fields() {
        let points = [
            trackpoint(0, 0.0, 0.0, "<AltitudeMeters>5.5</AltitudeMeters><HeartRateBpm><Value>140</Value></HeartRateBpm><Cadence>85</Cadence>"),
            trackpoint(10, 0.0, 0.001, "<HeartRateBpm><Value>150</Value></HeartRateBpm><Cadence>180</Cadence>"),
        ]
        .concat();
        let activity = parse(&document("Running", &points)).unwrap();

        assert_eq!(activity.name, "Running");
        assert_eq!(activity.device_name.as_deref(), Some("Forerunner 955"));
        assert_eq!(activity.format, FileFormat::Tcx);
        assert_eq!(activity.points.len(), 2);
        assert_eq!(activity.points[0].elevation, Some(5.5));
        assert_eq!(activity.points[0].heart_rate, Some(140));
        assert_eq!(activity.stats.avg_heart_rate, Some(145.0));
        assert_eq!(activity.stats.duration_seconds, 10.0);
    }

    #[test]
    fn cadence_is_normalized_to_steps_per_minute() {
        assert_eq!(normalize_cadence(85), 170);
        assert_eq!(normalize_cadence(100), 200);
        assert_eq!(normalize_cadence(180), 180);

        let points = [
            trackpoint(0, 0.0, 0.0, "<Cadence>85</Cadence>"),
            trackpoint(1, 0.0, 0.0001, "<Cadence>180</Cadence>"),
        ]
        .concat();
        let activity = parse(&document("Running", &points)).unwrap();
        assert_eq!(activity.points[0].cadence, Some(170));
        assert_eq!(activity.points[1].cadence, Some(180));
        assert_eq!(activity.stats.avg_cadence, Some(175.0));
    }

    #[test]
    fn run_cadence_extension_is_read() {
        let points = trackpoint(
            0,
            1.0,
            1.0,
            "<Extensions><ns3:TPX><ns3:RunCadence>88</ns3:RunCadence></ns3:TPX></Extensions>",
        );
        let activity = parse(&document("Running", &points)).unwrap();
        assert_eq!(activity.points[0].cadence, Some(176));
    }

    #[test]
    fn points_without_position_are_skipped() {
        let points = [
            trackpoint(0, 0.0, 0.0, "<HeartRateBpm><Value>120</Value></HeartRateBpm>"),
            "<Trackpoint><Time>2024-03-01T12:00:01Z</Time><HeartRateBpm><Value>190</Value></HeartRateBpm></Trackpoint>".to_string(),
            trackpoint(2, 0.0, 0.001, "<HeartRateBpm><Value>130</Value></HeartRateBpm>"),
        ]
        .concat();
        let activity = parse(&document("Running", &points)).unwrap();

        assert_eq!(activity.points.len(), 2);
        assert_eq!(activity.stats.avg_heart_rate, Some(125.0));
        // Pace is measured against the previous kept point.
        let step = crate::pipeline::geo::distance_km(0.0, 0.0, 0.0, 0.001);
        let pace = activity.points[1].pace.unwrap();
        assert!((pace - 2.0 / step).abs() < 1e-6);
    }

    #[test]
    fn skip_policy_needs_both_coordinates() {
        assert_eq!(skip_incomplete_point_policy(Some(1.0), Some(2.0)), Some((1.0, 2.0)));
        assert_eq!(skip_incomplete_point_policy(Some(1.0), None), None);
        assert_eq!(skip_incomplete_point_policy(None, Some(2.0)), None);
    }

    #[test]
    fn reported_distance_is_preferred() {
        let points = [
            trackpoint(0, 0.0, 0.0, "<DistanceMeters>0</DistanceMeters>"),
            trackpoint(10, 0.0, 0.0, "<DistanceMeters>50</DistanceMeters>"),
            trackpoint(20, 0.0, 0.0, "<DistanceMeters>100</DistanceMeters>"),
        ]
        .concat();
        let activity = parse(&document("Running", &points)).unwrap();

        assert_eq!(activity.points[1].distance_km, 0.05);
        assert_eq!(activity.points[2].distance_km, 0.1);
        assert!((activity.points[1].pace.unwrap() - 200.0).abs() < 1e-9);
        assert!((activity.points[2].pace.unwrap() - 200.0).abs() < 1e-9);
        assert_eq!(activity.stats.total_distance_km, 0.1);
        assert!((activity.stats.avg_pace.unwrap() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn falls_back_to_geometry_without_reported_distance() {
        let points = [
            trackpoint(0, 0.0, 0.0, "<DistanceMeters>0</DistanceMeters>"),
            trackpoint(10, 0.0, 0.001, ""),
        ]
        .concat();
        let activity = parse(&document("Biking", &points)).unwrap();
        let step = crate::pipeline::geo::distance_km(0.0, 0.0, 0.0, 0.001);
        assert!((activity.points[1].distance_km - step).abs() < 1e-12);
        assert_eq!(activity.name, "Biking");
    }

    #[test]
    fn name_falls_back_to_file_and_author() {
        let text = r#"<TrainingCenterDatabase><Activities><Activity><Lap><Track>
            <Trackpoint><Time>2024-03-01T12:00:00Z</Time><Position><LatitudeDegrees>1</LatitudeDegrees><LongitudeDegrees>2</LongitudeDegrees></Position></Trackpoint>
        </Track></Lap></Activity></Activities><Author><Name>Exporter</Name></Author></TrainingCenterDatabase>"#;
        let activity = parse(text).unwrap();
        assert_eq!(activity.name, "watch.tcx");
        assert_eq!(activity.device_name.as_deref(), Some("Exporter"));
    }

    #[test]
    fn cdata_values_are_read() {
        let text = r#"<TrainingCenterDatabase><Activities><Activity Sport="Running"><Lap><Track>
            <Trackpoint><Time><![CDATA[2024-03-01T12:00:00Z]]></Time><Position><LatitudeDegrees>1</LatitudeDegrees><LongitudeDegrees>2</LongitudeDegrees></Position><HeartRateBpm><Value><![CDATA[151]]></Value></HeartRateBpm></Trackpoint>
        </Track></Lap><Creator><Name><![CDATA[Edge & Co]]></Name></Creator></Activity></Activities></TrainingCenterDatabase>"#;
        let activity = parse(text).unwrap();
        assert_eq!(activity.device_name.as_deref(), Some("Edge & Co"));
        assert_eq!(activity.points[0].heart_rate, Some(151));
        assert_eq!(activity.points[0].time_text, "2024-03-01T12:00:00Z");
    }

    #[test]
    fn all_points_skipped_is_no_track_points() {
        let points = "<Trackpoint><Time>2024-03-01T12:00:00Z</Time></Trackpoint>";
        assert_eq!(
            parse(&document("Running", points)).unwrap_err(),
            ParseError::NoTrackPoints
        );
        assert_eq!(
            parse(&document("Running", "")).unwrap_err(),
            ParseError::NoTrackPoints
        );
    }

    #[test]
    fn lap_fields_do_not_leak_into_points() {
        let points = trackpoint(0, 1.0, 1.0, "");
        let activity = parse(&document("Running", &points)).unwrap();
        assert_eq!(activity.points[0].cadence, None);
        assert_eq!(activity.points[0].distance_km, 0.0);
    }
}
