//! Entry export as JSON, CSV and KML.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use csv::{QuoteStyle, WriterBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Coordinates, PhotoEntry};
use crate::util::truncate_text;

/// Characters of entry text used as a placemark name
const PLACEMARK_NAME_CHARS: usize = 30;

const CSV_HEADER: [&str; 6] = ["ID", "Text", "Photo URL", "Latitude", "Longitude", "Timestamp"];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV export produced invalid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

impl ExportError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Json(_) => "SERIALIZATION_ERROR",
            Self::Csv(_) | Self::Encoding(_) => "EXPORT_ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Kml,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Kml => "kml",
        }
    }

    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv;charset=utf-8",
            Self::Kml => "application/vnd.google-earth.kml+xml",
        }
    }
}

/// Exported subset of an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub id: String,
    pub text: String,
    pub photo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<Coordinates>,
    pub timestamp: DateTime<Utc>,
}

impl From<&PhotoEntry> for ExportEntry {
    fn from(entry: &PhotoEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            text: entry.text.clone(),
            photo: entry.photo.clone(),
            coords: entry.coords,
            timestamp: entry.display_timestamp(),
        }
    }
}

/// Render entries as a pretty-printed JSON array.
pub fn render_json_export(entries: &[PhotoEntry]) -> serde_json::Result<String> {
    let items = entries.iter().map(ExportEntry::from).collect::<Vec<_>>();
    serde_json::to_string_pretty(&items)
}

/// Render entries as CSV with one row per entry. Every field is quoted.
pub fn render_csv_export(entries: &[PhotoEntry]) -> Result<String, ExportError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(vec![]);
    writer.write_record(CSV_HEADER)?;

    for entry in entries {
        let (latitude, longitude) = entry.coords.map_or_else(
            || (String::new(), String::new()),
            |coords| (coords.latitude.to_string(), coords.longitude.to_string()),
        );
        writer.write_record([
            entry.id.as_str(),
            entry.text.as_str(),
            entry.photo.as_str(),
            latitude.as_str(),
            longitude.as_str(),
            format_timestamp(entry.display_timestamp()).as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| csv::Error::from(error.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Render geotagged entries as KML placemarks. Entries without coordinates
/// are skipped.
#[must_use]
pub fn render_kml_export(entries: &[PhotoEntry]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(output, r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#);
    let _ = writeln!(output, "  <Document>");
    let _ = writeln!(output, "    <name>BriqWerk Export</name>");
    let _ = writeln!(output, "    <description>Exported photos and locations</description>");

    for entry in entries {
        let Some(coords) = entry.coords else {
            continue;
        };
        let name = truncate_text(entry.text.trim(), PLACEMARK_NAME_CHARS);
        let mut description = escape_xml(&entry.text);
        if !entry.photo.is_empty() {
            let _ = write!(
                description,
                r#"<br/><img src="{}" style="max-width:300px;"/>"#,
                escape_xml(&entry.photo)
            );
        }

        let _ = writeln!(output, "    <Placemark>");
        let _ = writeln!(output, "      <name>{}</name>", escape_xml(&name));
        let _ = writeln!(
            output,
            "      <TimeStamp><when>{}</when></TimeStamp>",
            format_timestamp(entry.display_timestamp())
        );
        let _ = writeln!(
            output,
            "      <description><![CDATA[<div>{description}</div>]]></description>"
        );
        let _ = writeln!(
            output,
            "      <Point><coordinates>{},{}</coordinates></Point>",
            coords.longitude, coords.latitude
        );
        let _ = writeln!(output, "    </Placemark>");
    }

    let _ = writeln!(output, "  </Document>");
    let _ = writeln!(output, "</kml>");
    output
}

/// Render entries based on selected export format.
pub fn render_entries_export(
    entries: &[PhotoEntry],
    format: ExportFormat,
) -> Result<String, ExportError> {
    match format {
        ExportFormat::Json => Ok(render_json_export(entries)?),
        ExportFormat::Csv => render_csv_export(entries),
        ExportFormat::Kml => Ok(render_kml_export(entries)),
    }
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, date: NaiveDate) -> String {
    format!(
        "briqwerk-export-{}.{}",
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
