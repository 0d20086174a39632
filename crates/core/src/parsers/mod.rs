pub mod json;
pub mod raw;

use mosaic_protocol::Trace;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("json: {0}")]
    Json(#[from] json::JsonTraceParseError),
    #[error("raw: {0}")]
    Raw(#[from] raw::RawTraceParseError),
    #[error("unable to detect format")]
    UnknownFormat,
}

/// Auto-detect the trace format and parse it.
///
/// Detection strategy:
/// 1. Valid JSON is treated as a tracer document (errors are reported as-is).
/// 2. Otherwise, NUL-separated raw tracer lines.
pub fn parse_auto(data: &[u8]) -> Result<Trace, ParseError> {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        let trace = json::parse_json_value(&value)?;
        tracing::info!(steps = trace.len(), "loaded tracer JSON");
        return Ok(trace);
    }

    if data.contains(&0) {
        let trace = raw::parse_raw_trace(data)?;
        tracing::info!(steps = trace.len(), "loaded raw trace lines");
        return Ok(trace);
    }

    Err(ParseError::UnknownFormat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_protocol::SourceFormat;

    #[test]
    fn detects_json() {
        let trace = parse_auto(br#"{ "traces": [ { "type": "CALL", "subject": "main" } ] }"#)
            .expect("json trace");
        assert_eq!(trace.metadata.source_format, SourceFormat::TracerJson);
    }

    #[test]
    fn detects_raw_lines() {
        let trace = parse_auto(b"CALL\0main\x001").expect("raw trace");
        assert_eq!(trace.metadata.source_format, SourceFormat::RawLines);
        assert_eq!(trace.steps[0].name, "main");
    }

    #[test]
    fn unknown_format() {
        assert!(matches!(
            parse_auto(b"not a trace"),
            Err(ParseError::UnknownFormat)
        ));
    }
}
