use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ParseError;
use crate::pipeline::parse::{
    finish_track, malformed, parse_count, parse_decimal, DistanceSource, Parser, RawPoint,
};
use crate::types::activity::{Activity, FileFormat};

pub struct GpxParser;

impl Parser for GpxParser {
    fn parse(&self, text: &str, file_name: &str) -> Result<Activity, ParseError> {
        let mut reader = Reader::from_reader(text.as_bytes());
        reader.trim_text(true);
        reader.check_end_names(true);

        let mut raw_points = Vec::new();
        let mut current_point: Option<RawPoint> = None;
        // Local names of the open elements, outermost first.
        let mut path: Vec<String> = Vec::new();
        let mut metadata_name: Option<String> = None;
        let mut track_name: Option<String> = None;
        let mut creator: Option<String> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let name = local_name(&e);
                    match name.as_str() {
                        "gpx" => creator = attribute(&e, b"creator")?,
                        "trkpt" => current_point = Some(start_point(&e)?),
                        _ => {}
                    }
                    path.push(name);
                }
                Ok(Event::Empty(e)) => {
                    // A self-closing trkpt still counts, it just carries no children.
                    if local_name(&e) == "trkpt" {
                        raw_points.push(start_point(&e)?);
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(|err| malformed(&reader, err))?;
                    handle_text(
                        &path,
                        &text,
                        current_point.as_mut(),
                        &mut metadata_name,
                        &mut track_name,
                    );
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    handle_text(
                        &path,
                        &text,
                        current_point.as_mut(),
                        &mut metadata_name,
                        &mut track_name,
                    );
                }
                Ok(Event::End(_)) => {
                    if path.pop().as_deref() == Some("trkpt") {
                        if let Some(point) = current_point.take() {
                            raw_points.push(point);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(malformed(&reader, e)),
                _ => {}
            }
            buf.clear();
        }

        let (points, stats) = finish_track(raw_points)?;
        let name = metadata_name
            .or(track_name)
            .unwrap_or_else(|| file_name.to_string());

        Ok(Activity {
            name,
            device_name: creator.filter(|c| !c.trim().is_empty()),
            format: FileFormat::Gpx,
            points,
            stats,
        })
    }
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

/// Coordinates default to 0 rather than failing the whole file.
fn start_point(e: &BytesStart) -> Result<RawPoint, ParseError> {
    let lat = attribute(e, b"lat")?.as_deref().and_then(parse_decimal);
    let lon = attribute(e, b"lon")?.as_deref().and_then(parse_decimal);

    Ok(RawPoint {
        lat: lat.unwrap_or(0.0),
        lon: lon.unwrap_or(0.0),
        elevation: None,
        time: None,
        heart_rate: None,
        cadence: None,
        distance: DistanceSource::Derived,
    })
}

fn handle_text(
    path: &[String],
    text: &str,
    point: Option<&mut RawPoint>,
    metadata_name: &mut Option<String>,
    track_name: &mut Option<String>,
) {
    let current = path.last().map(String::as_str);
    let parent = path.len().checked_sub(2).map(|i| path[i].as_str());

    if let Some(point) = point {
        // hr and cad match both the bare and the gpxtpx: prefixed tags.
        match current {
            Some("ele") if point.elevation.is_none() => point.elevation = parse_decimal(text),
            Some("time") if point.time.is_none() => point.time = Some(text.to_string()),
            Some("hr") if point.heart_rate.is_none() => point.heart_rate = parse_count(text),
            Some("cad") if point.cadence.is_none() => point.cadence = parse_count(text),
            _ => {}
        }
        return;
    }

    if current != Some("name") || text.trim().is_empty() {
        return;
    }
    match parent {
        Some("metadata") if metadata_name.is_none() => *metadata_name = Some(text.to_string()),
        Some("trk") if track_name.is_none() => *track_name = Some(text.to_string()),
        _ => {}
    }
}
