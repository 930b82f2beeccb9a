//! # CSV Export
//!
//! Serializes the stored telemetry series to CSV, one row per record.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::SecondsFormat;
use tracing::info;

use super::store::{TelemetrySeries, TelemetryStore};
use crate::error::{GroundStationError, Result};
use crate::frame::Channel;

/// Header for columns that are not numeric channels
const LEADING_COLUMNS: [&str; 3] = ["received_at", "team_id", "mission_time"];
const TRAILING_COLUMNS: [&str; 1] = ["servo"];

/// Export header in column order
pub fn csv_header() -> Vec<&'static str> {
    LEADING_COLUMNS
        .iter()
        .copied()
        .chain(Channel::ALL.iter().map(|c| c.name()))
        .chain(TRAILING_COLUMNS.iter().copied())
        .collect()
}

/// Write a series as CSV to any writer
///
/// Rows are written oldest first. Numbers use Rust's shortest round-trip
/// formatting; text fields are quoted only when they need it.
pub fn write_csv<W: Write>(series: &TelemetrySeries, writer: W) -> std::io::Result<()> {
    let mut writer = BufWriter::new(writer);
    writeln!(writer, "{}", csv_header().join(","))?;

    for (received_at, record) in series.rows() {
        write!(
            writer,
            "{},{},{}",
            received_at.to_rfc3339_opts(SecondsFormat::Millis, false),
            escape_field(&record.team_id),
            escape_field(&record.mission_time),
        )?;
        for value in record.values {
            write!(writer, ",{}", value)?;
        }
        writeln!(writer, ",{}", escape_field(&record.servo))?;
    }

    writer.flush()
}

/// Export the store's current history to `path`
///
/// The file is written next to `path` first and renamed into place, so a
/// failed export never leaves a truncated file behind.
///
/// # Returns
///
/// * `Result<usize>` - Number of data rows written
///
/// # Errors
///
/// Returns `ExportIo` if the file cannot be created, written or renamed.
/// The store is not modified either way.
///
/// # Examples
///
/// ```no_run
/// use cansat_groundstation::telemetry::{export_csv, TelemetryStore};
///
/// let store = TelemetryStore::new();
/// let rows = export_csv(&store, "telemetry_data.csv")?;
/// println!("Exported {} rows", rows);
/// # Ok::<(), cansat_groundstation::error::GroundStationError>(())
/// ```
pub fn export_csv<P: AsRef<Path>>(store: &TelemetryStore, path: P) -> Result<usize> {
    let path = path.as_ref();
    let snapshot = store.snapshot();
    let rows = snapshot.series.len();

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    let write_result = File::create(&tmp)
        .and_then(|file| write_csv(&snapshot.series, file))
        .and_then(|_| fs::rename(&tmp, path));

    if let Err(source) = write_result {
        let _ = fs::remove_file(&tmp);
        return Err(GroundStationError::ExportIo {
            path: path.to_path_buf(),
            source,
        });
    }

    info!("Exported {} telemetry rows to {}", rows, path.display());
    Ok(rows)
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::parse;
    use chrono::{DateTime, Local, TimeZone};
    use tempfile::tempdir;

    const LINES: [&str; 3] = [
        "7,00:01:23,120.5,101.3,22.7,0.01,-0.02,9.81,0.1,-0.1,0.0,deployed",
        "7,00:01:24,121,101.29,22.6,0,-0.5,9.8,1e-3,-0.25,3,0",
        "7,00:01:25,-3.75,99,21,1,2,3,4,5,6,standby",
    ];

    fn at(seconds: i64) -> DateTime<Local> {
        Local.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn filled_store() -> TelemetryStore {
        let store = TelemetryStore::new();
        for (i, line) in LINES.iter().enumerate() {
            store.append(parse(line).unwrap(), at(i as i64));
        }
        store
    }

    #[test]
    fn test_header_order() {
        assert_eq!(
            csv_header().join(","),
            "received_at,team_id,mission_time,altitude,pressure,temperature,\
             accel_x,accel_y,accel_z,gyro_x,gyro_y,gyro_z,servo"
        );
    }

    #[test]
    fn test_write_csv_empty_series_has_header_only() {
        let mut out = Vec::new();
        write_csv(&TelemetrySeries::default(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("received_at,"));
    }

    #[test]
    fn test_export_round_trip() {
        let store = filled_store();
        let dir = tempdir().unwrap();
        let path = dir.path().join("telemetry.csv");

        let rows = export_csv(&store, &path).unwrap();
        assert_eq!(rows, LINES.len());

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), csv_header().join(","));

        let data: Vec<&str> = lines.collect();
        assert_eq!(data.len(), LINES.len());

        for (i, row) in data.iter().enumerate() {
            let original = parse(LINES[i]).unwrap();
            let cells: Vec<&str> = row.split(',').collect();
            assert_eq!(cells.len(), 13);

            let received_at = DateTime::parse_from_rfc3339(cells[0]).unwrap();
            assert_eq!(received_at, at(i as i64));

            // The exported row minus its timestamp is itself a valid wire line
            let reparsed = parse(&cells[1..].join(",")).unwrap();
            assert_eq!(reparsed, original);
        }
    }

    #[test]
    fn test_export_numeric_form() {
        let store = filled_store();
        let mut out = Vec::new();
        write_csv(&store.snapshot().series, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let second_row = text.lines().nth(2).unwrap();
        assert!(second_row.ends_with(",7,00:01:24,121,101.29,22.6,0,-0.5,9.8,0.001,-0.25,3,0"));
    }

    #[test]
    fn test_export_escapes_quotes_in_text_fields() {
        let store = TelemetryStore::new();
        store.append(parse("\"A\",t,1,2,3,4,5,6,7,8,9,0").unwrap(), at(0));

        let mut out = Vec::new();
        write_csv(&store.snapshot().series, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().nth(1).unwrap().contains(",\"\"\"A\"\"\",t,"));
    }

    #[test]
    fn test_export_to_unwritable_path_leaves_store_intact() {
        let store = filled_store();
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing_dir").join("out.csv");

        let err = export_csv(&store, &path).unwrap_err();
        match err {
            GroundStationError::ExportIo { path: failed, .. } => assert_eq!(failed, path),
            other => panic!("Expected ExportIo error, got: {:?}", other),
        }
        assert_eq!(store.len(), LINES.len());
    }

    #[test]
    fn test_export_overwrites_previous_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("telemetry.csv");
        std::fs::write(&path, "stale contents\n").unwrap();

        export_csv(&filled_store(), &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("stale"));
        assert!(!dir.path().join("telemetry.csv.tmp").exists());
    }
}
