//! ffprobe output parsing.

use serde_json::Value;

use super::{MediaError, MediaResult};

/// Extract `format.duration` from `ffprobe -print_format json -show_format`
/// output.
///
/// ffprobe reports the duration as a decimal string; a plain number is
/// accepted too.
pub fn parse_ffprobe_duration(stdout: &[u8]) -> MediaResult<f64> {
    let json: Value = serde_json::from_slice(stdout)
        .map_err(|e| MediaError::parse("ffprobe output", e.to_string()))?;

    let raw = json
        .get("format")
        .and_then(|f| f.get("duration"))
        .ok_or_else(|| MediaError::parse("ffprobe output", "missing format.duration"))?;

    let duration = match raw {
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| MediaError::parse("ffprobe duration", format!("'{}': {}", s, e)))?,
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| MediaError::parse("ffprobe duration", n.to_string()))?,
        other => {
            return Err(MediaError::parse(
                "ffprobe duration",
                format!("unexpected value {}", other),
            ))
        }
    };

    if !duration.is_finite() || duration <= 0.0 {
        return Err(MediaError::parse(
            "ffprobe duration",
            format!("non-positive duration {}", duration),
        ));
    }

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_duration() {
        let json = br#"{"format": {"filename": "a.mp3", "duration": "4.240000", "bit_rate": "128000"}}"#;
        assert_eq!(parse_ffprobe_duration(json).unwrap(), 4.24);
    }

    #[test]
    fn parses_numeric_duration() {
        let json = br#"{"format": {"duration": 3.5}}"#;
        assert_eq!(parse_ffprobe_duration(json).unwrap(), 3.5);
    }

    #[test]
    fn missing_duration_is_error() {
        let err = parse_ffprobe_duration(br#"{"format": {}}"#).unwrap_err();
        assert!(err.to_string().contains("format.duration"));
    }

    #[test]
    fn rejects_zero_and_garbage() {
        assert!(parse_ffprobe_duration(br#"{"format": {"duration": "0.000000"}}"#).is_err());
        assert!(parse_ffprobe_duration(br#"{"format": {"duration": "N/A"}}"#).is_err());
        assert!(parse_ffprobe_duration(b"not json").is_err());
    }
}
