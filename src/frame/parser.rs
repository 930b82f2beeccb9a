//! # Telemetry Line Parser
//!
//! Turns one raw serial line into a [`TelemetryRecord`].

use super::record::*;
use crate::error::ParseError;

/// Field delimiter on the wire
pub const FIELD_DELIMITER: char = ',';

/// Parse one telemetry line
///
/// # Arguments
///
/// * `line` - A single line with its line terminator already stripped
///
/// # Returns
///
/// * `Result<TelemetryRecord, ParseError>` - The full record, or the first problem found
///
/// # Errors
///
/// Returns error if:
/// - The line has fewer than 12 fields (`MalformedFrame`)
/// - Any of fields 2-10 is not a finite decimal number (`InvalidNumeric`)
///
/// Fields after the twelfth are ignored.
///
/// # Examples
///
/// ```
/// use cansat_groundstation::frame::{parse, ServoState};
///
/// let record = parse("7,00:01:23,120.5,101.3,22.7,0.01,-0.02,9.81,0.1,-0.1,0.0,deployed")?;
/// assert_eq!(record.altitude(), 120.5);
/// assert_eq!(record.servo_state(), ServoState::Deployed);
/// # Ok::<(), cansat_groundstation::error::ParseError>(())
/// ```
pub fn parse(line: &str) -> Result<TelemetryRecord, ParseError> {
    let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    if fields.len() < FRAME_FIELD_COUNT {
        return Err(ParseError::MalformedFrame { fields: fields.len() });
    }

    let mut values = [0.0; CHANNEL_COUNT];
    for channel in Channel::ALL {
        let index = channel.field_index();
        values[channel.index()] = parse_numeric(fields[index], index)?;
    }

    Ok(TelemetryRecord {
        team_id: fields[FIELD_TEAM_ID].to_string(),
        mission_time: fields[FIELD_MISSION_TIME].to_string(),
        values,
        servo: fields[FIELD_SERVO].to_string(),
    })
}

/// Decode raw line bytes and parse them
///
/// Only the trailing `\n` or `\r\n` is removed; text fields keep any
/// other whitespace.
pub fn parse_bytes(raw: &[u8]) -> Result<TelemetryRecord, ParseError> {
    let line = std::str::from_utf8(raw).map_err(|_| ParseError::InvalidEncoding)?;
    parse(strip_line_ending(line))
}

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

fn parse_numeric(field: &str, index: usize) -> Result<f64, ParseError> {
    match field.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ParseError::InvalidNumeric {
            index,
            value: field.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE_LINE: &str = "7,00:01:23,120.5,101.3,22.7,0.01,-0.02,9.81,0.1,-0.1,0.0,deployed";

    #[test]
    fn test_parse_sample_line() {
        let record = parse(SAMPLE_LINE).unwrap();

        assert_eq!(record.team_id, "7");
        assert_eq!(record.mission_time, "00:01:23");
        assert_eq!(record.altitude(), 120.5);
        assert_eq!(record.pressure(), 101.3);
        assert_eq!(record.temperature(), 22.7);
        assert_eq!(record.accel(), [0.01, -0.02, 9.81]);
        assert_eq!(record.gyro(), [0.1, -0.1, 0.0]);
        assert_eq!(record.servo, "deployed");
        assert_eq!(record.servo_state(), ServoState::Deployed);
    }

    #[test]
    fn test_parse_too_few_fields() {
        let result = parse("7,00:01:23,120.5,101.3");
        assert_eq!(result, Err(ParseError::MalformedFrame { fields: 4 }));
    }

    #[test]
    fn test_parse_empty_line() {
        let result = parse("");
        assert_eq!(result, Err(ParseError::MalformedFrame { fields: 1 }));
    }

    #[test]
    fn test_parse_eleven_fields() {
        let line = "7,00:01:23,120.5,101.3,22.7,0.01,-0.02,9.81,0.1,-0.1,0.0";
        assert!(matches!(parse(line), Err(ParseError::MalformedFrame { fields: 11 })));
    }

    #[test]
    fn test_parse_ignores_extra_trailing_fields() {
        let line = format!("{},extra,42", SAMPLE_LINE);
        let record = parse(&line).unwrap();
        assert_eq!(record.servo, "deployed");
        assert_eq!(record.altitude(), 120.5);
    }

    #[test]
    fn test_parse_invalid_numeric_reports_field() {
        let line = "7,00:01:23,120.5,101.3,hot,0.01,-0.02,9.81,0.1,-0.1,0.0,0";
        assert_eq!(
            parse(line),
            Err(ParseError::InvalidNumeric { index: 4, value: "hot".to_string() })
        );
    }

    #[test]
    fn test_parse_reports_first_invalid_field() {
        let line = "7,t,x,101.3,y,0.01,-0.02,9.81,0.1,-0.1,0.0,0";
        assert!(matches!(parse(line), Err(ParseError::InvalidNumeric { index: 2, .. })));
    }

    #[test]
    fn test_parse_empty_numeric_field() {
        let line = "7,t,1,2,3,4,5,6,7,8,,0";
        assert!(matches!(parse(line), Err(ParseError::InvalidNumeric { index: 10, .. })));
    }

    #[test]
    fn test_parse_rejects_non_finite_values() {
        for bad in ["NaN", "inf", "-infinity"] {
            let line = format!("7,t,{},2,3,4,5,6,7,8,9,0", bad);
            assert!(
                matches!(parse(&line), Err(ParseError::InvalidNumeric { index: 2, .. })),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_parse_tolerates_whitespace_around_numbers() {
        let record = parse("7,t, 1.5 ,2,3,4,5,6,7,8,9, 1").unwrap();
        assert_eq!(record.altitude(), 1.5);
        // Text fields stay verbatim
        assert_eq!(record.servo, " 1");
        assert_eq!(record.servo_state(), ServoState::Deployed);
    }

    #[test]
    fn test_parse_text_fields_are_opaque() {
        let record = parse(",,1,2,3,4,5,6,7,8,9,").unwrap();
        assert_eq!(record.team_id, "");
        assert_eq!(record.mission_time, "");
        assert_eq!(record.servo, "");
        assert_eq!(record.servo_state(), ServoState::NotDeployed);
    }

    #[test]
    fn test_parse_bytes_strips_crlf() {
        let raw = format!("{}\r\n", SAMPLE_LINE);
        let record = parse_bytes(raw.as_bytes()).unwrap();
        assert_eq!(record.servo, "deployed");
    }

    #[test]
    fn test_parse_bytes_keeps_text_field_whitespace() {
        let line = " 7,00:01:23,1,2,3,4,5,6,7,8,9, yes ";
        let from_bytes = parse_bytes(format!("{}\r\n", line).as_bytes()).unwrap();

        assert_eq!(from_bytes.team_id, " 7");
        assert_eq!(from_bytes.servo, " yes ");
        assert_eq!(from_bytes.servo_state(), ServoState::Deployed);
        assert_eq!(from_bytes, parse(line).unwrap());
    }

    #[test]
    fn test_parse_bytes_without_terminator() {
        assert_eq!(parse_bytes(SAMPLE_LINE.as_bytes()).unwrap(), parse(SAMPLE_LINE).unwrap());
    }

    #[test]
    fn test_parse_bytes_invalid_utf8() {
        let raw = [b'7', b',', 0xFF, 0xFE, b'\n'];
        assert_eq!(parse_bytes(&raw), Err(ParseError::InvalidEncoding));
    }

    fn text_token() -> impl Strategy<Value = String> {
        "[A-Za-z0-9:._ -]{0,12}"
    }

    proptest! {
        #[test]
        fn prop_valid_lines_round_trip_fields(
            team in text_token(),
            time in text_token(),
            servo in text_token(),
            values in proptest::array::uniform9(-1.0e6f64..1.0e6f64),
        ) {
            let numeric: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            let line = format!("{},{},{},{}", team, time, numeric.join(","), servo);

            let record = parse(&line).unwrap();
            prop_assert_eq!(&record.team_id, &team);
            prop_assert_eq!(&record.mission_time, &time);
            prop_assert_eq!(&record.servo, &servo);
            prop_assert_eq!(record.values, values);
        }

        #[test]
        fn prop_short_lines_are_malformed(fields in proptest::collection::vec("[0-9.]{1,6}", 1..12)) {
            let line = fields.join(",");
            prop_assert_eq!(parse(&line), Err(ParseError::MalformedFrame { fields: fields.len() }));
        }

        #[test]
        fn prop_non_numeric_field_is_identified(position in 2usize..=10, junk in "[a-zA-Z]{1,6}") {
            prop_assume!(junk.parse::<f64>().is_err());
            let mut fields: Vec<String> = vec!["7".into(), "t".into()];
            fields.extend((0..9).map(|i| i.to_string()));
            fields.push("0".into());
            fields[position] = junk.clone();

            let result = parse(&fields.join(","));
            prop_assert_eq!(result, Err(ParseError::InvalidNumeric { index: position, value: junk }));
        }
    }
}
