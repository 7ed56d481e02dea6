use chrono::{DateTime, Utc};
use quick_xml::escape::escape;

use crate::pipeline::parse::format_timestamp;
use crate::types::activity::{Activity, TrackPoint};

pub const GPX_MIME_TYPE: &str = "application/gpx+xml";
pub const MERGED_FILE_NAME: &str = "merged_activity.gpx";

const CREATOR: &str = "Track Merge";

pub fn to_gpx(activity: &Activity) -> String {
    to_gpx_at(activity, Utc::now())
}

/// Renders `activity` as a GPX 1.1 document stamped with `now`.
pub fn to_gpx_at(activity: &Activity, now: DateTime<Utc>) -> String {
    let name = escape(&activity.name);
    let mut out = String::with_capacity(512 + activity.points.len() * 200);

    out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    out.push('\n');
    out.push_str(&format!(
        concat!(
            r#"<gpx creator="{}" version="1.1""#, "\n",
            r#"  xmlns="http://www.topografix.com/GPX/1/1""#, "\n",
            r#"  xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#, "\n",
            r#"  xsi:schemaLocation="http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd http://www.garmin.com/xmlschemas/GpxExtensions/v3 http://www.garmin.com/xmlschemas/GpxExtensionsv3.xsd http://www.garmin.com/xmlschemas/TrackPointExtension/v1 http://www.garmin.com/xmlschemas/TrackPointExtensionv1.xsd""#, "\n",
            r#"  xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">"#, "\n",
        ),
        CREATOR
    ));
    out.push_str(&format!(
        "  <metadata>\n    <name>{}</name>\n    <time>{}</time>\n  </metadata>\n",
        name,
        format_timestamp(now)
    ));
    out.push_str(&format!("  <trk>\n    <name>{}</name>\n    <trkseg>\n", name));

    for point in &activity.points {
        push_trkpt(&mut out, point);
    }

    out.push_str("    </trkseg>\n  </trk>\n</gpx>\n");
    out
}

fn push_trkpt(out: &mut String, point: &TrackPoint) {
    out.push_str(&format!(
        "      <trkpt lat=\"{:.7}\" lon=\"{:.7}\">\n",
        point.lat, point.lon
    ));
    if let Some(ele) = point.elevation {
        out.push_str(&format!("        <ele>{:.2}</ele>\n", ele));
    }
    out.push_str(&format!("        <time>{}</time>\n", escape(&point.time_text)));

    if point.heart_rate.is_some() || point.cadence.is_some() {
        out.push_str("        <extensions>\n          <gpxtpx:TrackPointExtension>");
        if let Some(hr) = point.heart_rate {
            out.push_str(&format!("<gpxtpx:hr>{}</gpxtpx:hr>", hr));
        }
        if let Some(cad) = point.cadence {
            out.push_str(&format!("<gpxtpx:cad>{}</gpxtpx:cad>", cad));
        }
        out.push_str("</gpxtpx:TrackPointExtension>\n        </extensions>\n");
    }

    out.push_str("      </trkpt>\n");
}
