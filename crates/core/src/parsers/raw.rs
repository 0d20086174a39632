use mosaic_protocol::{ExecutionStep, SourceFormat, StepKind, Trace, TraceMetadata};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RawTraceParseError {
    #[error("input is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("no NUL-separated trace records found")]
    NoRecords,
}

const FIELD_SEPARATOR: char = '\0';

/// Parse the instrumented program's raw output: one record per line, fields
/// separated by NUL, first field the record type.
///
/// `META\0key\0value` lines populate metadata. Unknown record types are kept
/// as `StepKind::Unknown` so step indices stay aligned with the program's
/// output.
pub fn parse_raw_trace(data: &[u8]) -> Result<Trace, RawTraceParseError> {
    let text = std::str::from_utf8(data)?;
    let mut metadata = TraceMetadata {
        source_format: SourceFormat::RawLines,
        ..TraceMetadata::default()
    };
    let mut steps = Vec::new();
    let mut records = 0usize;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if !line.contains(FIELD_SEPARATOR) {
            // Program stdout interleaved with the trace.
            if !line.trim().is_empty() {
                tracing::debug!(line, "skipping non-trace output line");
            }
            continue;
        }
        records += 1;
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        let tag = fields[0].trim();
        let args = &fields[1..];

        if tag == "META" {
            if let [key, value, ..] = args {
                metadata.entries.insert((*key).to_string(), (*value).to_string());
            }
            continue;
        }

        steps.push(step_from_fields(StepKind::from_tag(tag), args));
    }

    if records == 0 {
        return Err(RawTraceParseError::NoRecords);
    }

    metadata.name = metadata
        .entries
        .get("name")
        .or_else(|| metadata.entries.get("file"))
        .cloned();
    Ok(Trace::new(metadata, steps))
}

fn step_from_fields(kind: StepKind, f: &[&str]) -> ExecutionStep {
    let s = |i: usize| f.get(i).map(|v| (*v).to_string()).unwrap_or_default();
    let n = |i: usize| f.get(i).and_then(|v| v.trim().parse::<u32>().ok()).unwrap_or(0);
    let b = |i: usize| {
        f.get(i)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(|v| v != 0)
    };

    let mut step = ExecutionStep::new(kind, "");
    match kind {
        StepKind::Assign | StepKind::Decl => {
            step.name = s(0);
            step.value = s(1);
            step.address = s(2);
            step.line = n(3);
            step.depth = n(4);
        }
        StepKind::Branch => {
            step.subtype = s(0);
            step.condition = s(1);
            step.line = n(2);
            step.depth = n(3);
        }
        StepKind::Call => {
            step.name = s(0);
            step.depth = n(1);
            step.value = s(3);
        }
        StepKind::Condition => {
            step.name = s(0);
            step.condition = s(0);
            step.condition_result = b(1);
            step.line = n(2);
            step.depth = n(3);
        }
        StepKind::Loop => {
            step.subtype = s(0);
            step.condition = s(1);
            step.condition_result = b(2);
            step.line = n(3);
            step.depth = n(4);
        }
        StepKind::Read => {
            step.name = s(0);
            step.address = s(2);
            step.line = n(3);
            step.depth = n(4);
        }
        StepKind::Param => {
            step.name = s(0);
            step.value = s(1);
            step.line = n(2);
        }
        StepKind::Return => {
            step.subtype = s(0);
            step.value = s(1);
            let address = s(2);
            if address != "0" {
                step.address = address;
            }
            step.line = n(3);
            step.depth = n(4);
        }
        StepKind::Unknown => {
            step.name = s(0);
            tracing::warn!(fields = ?f, "unknown trace record type");
        }
    }
    step
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(records: &[&[&str]]) -> Vec<u8> {
        records
            .iter()
            .map(|r| r.join("\0"))
            .collect::<Vec<_>>()
            .join("\n")
            .into_bytes()
    }

    #[test]
    fn parses_records_and_metadata() {
        let data = lines(&[
            &["META", "language", "c"],
            &["CALL", "main", "1"],
            &["DECL", "i", "0", "0x7ff0", "4", "1"],
            &["LOOP", "for", "i < 3", "1", "5", "1"],
            &["RETURN", "int", "0", "0", "9", "1"],
        ]);
        let trace = parse_raw_trace(&data).expect("valid raw trace");
        assert_eq!(trace.metadata.entries["language"], "c");
        assert_eq!(trace.len(), 4);
        assert_eq!(trace.steps[0].kind, StepKind::Call);
        assert_eq!(trace.steps[1].address, "0x7ff0");
        assert_eq!(trace.steps[2].condition_result, Some(true));
        assert_eq!(trace.steps[2].line, 5);
        // A zero return address means "no address".
        assert_eq!(trace.steps[3].address, "");
    }

    #[test]
    fn tolerates_short_records_and_program_output() {
        let data = b"hello from the program\nASSIGN\0x\nFROB\0a\0b";
        let trace = parse_raw_trace(data).expect("valid raw trace");
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.steps[0].name, "x");
        assert_eq!(trace.steps[0].line, 0);
        assert_eq!(trace.steps[1].kind, StepKind::Unknown);
    }

    #[test]
    fn rejects_text_without_records() {
        assert!(matches!(
            parse_raw_trace(b"just some text"),
            Err(RawTraceParseError::NoRecords)
        ));
    }
}
