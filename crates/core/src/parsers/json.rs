use mosaic_protocol::{ExecutionStep, SourceFormat, StepKind, Trace, TraceMetadata};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JsonTraceParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document has no `traces` or `steps` array")]
    MissingSteps,
    #[error("tracer failed during {stage}: {message}")]
    TracerFailed { stage: String, message: String },
}

/// Parse a tracer JSON document into a `Trace`.
///
/// Accepted shapes:
/// - `{ "metadata": {...}, "traces": [...] }` (tracer output, optionally with
///   `"success": false` and an `"error"` object)
/// - `{ "steps": [...] }`
/// - a bare array of step objects
///
/// Step objects accept both the tracer's field names (`subject`,
/// `line_number`, `stack_depth`, `condition_result` as 0/1) and the
/// normalized ones (`name`, `line`, `depth`, `conditionResult`). Missing or
/// mistyped fields fall back to neutral defaults.
pub fn parse_json_trace(data: &[u8]) -> Result<Trace, JsonTraceParseError> {
    let value: Value = serde_json::from_slice(data)?;
    parse_json_value(&value)
}

pub(crate) fn parse_json_value(value: &Value) -> Result<Trace, JsonTraceParseError> {
    let (raw_steps, metadata) = match value {
        Value::Array(items) => (
            items,
            TraceMetadata {
                source_format: SourceFormat::TracerJson,
                ..TraceMetadata::default()
            },
        ),
        Value::Object(obj) => {
            let steps = obj
                .get("traces")
                .or_else(|| obj.get("steps"))
                .and_then(Value::as_array);
            let failed = obj.get("success").and_then(Value::as_bool) == Some(false);
            match steps {
                Some(steps) if !(failed && steps.is_empty()) => (steps, parse_metadata(obj)),
                _ if failed => return Err(tracer_failure(obj)),
                _ => return Err(JsonTraceParseError::MissingSteps),
            }
        }
        _ => return Err(JsonTraceParseError::MissingSteps),
    };

    let steps = raw_steps
        .iter()
        .map(|raw| match raw.as_object() {
            Some(obj) => step_from_object(obj),
            None => ExecutionStep::default(),
        })
        .collect();

    Ok(Trace::new(metadata, steps))
}

fn tracer_failure(obj: &Map<String, Value>) -> JsonTraceParseError {
    let error = obj.get("error").and_then(Value::as_object);
    let field = |name: &str| {
        error
            .and_then(|e| e.get(name))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string()
    };
    JsonTraceParseError::TracerFailed {
        stage: field("stage"),
        message: field("message"),
    }
}

fn parse_metadata(obj: &Map<String, Value>) -> TraceMetadata {
    let mut metadata = TraceMetadata {
        source_format: SourceFormat::TracerJson,
        ..TraceMetadata::default()
    };
    if let Some(meta) = obj.get("metadata").and_then(Value::as_object) {
        for (key, value) in meta {
            metadata.entries.insert(key.clone(), scalar_text(value));
        }
    }
    metadata.name = metadata
        .entries
        .get("name")
        .or_else(|| metadata.entries.get("file"))
        .cloned();
    metadata
}

fn step_from_object(obj: &Map<String, Value>) -> ExecutionStep {
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .map(StepKind::from_tag)
        .unwrap_or_default();

    let mut step = ExecutionStep {
        index: 0,
        kind,
        name: text(obj, &["subject", "name"]),
        value: text(obj, &["value"]),
        address: text(obj, &["address"]),
        line: int(obj, &["line_number", "line"]),
        depth: int(obj, &["stack_depth", "depth"]),
        subtype: text(obj, &["subtype"]),
        condition: text(obj, &["condition"]),
        condition_result: flag(obj, &["condition_result", "conditionResult"]),
    };

    match kind {
        // Calls carry their argument string where other steps carry a value.
        StepKind::Call if step.value.is_empty() => step.value = text(obj, &["args"]),
        StepKind::Condition if step.condition.is_empty() => step.condition = step.name.clone(),
        _ => {}
    }
    step
}

fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| obj.get(*name).filter(|v| !v.is_null()))
}

fn text(obj: &Map<String, Value>, names: &[&str]) -> String {
    field(obj, names).map(scalar_text).unwrap_or_default()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn int(obj: &Map<String, Value>, names: &[&str]) -> u32 {
    match field(obj, names) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX)),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn flag(obj: &Map<String, Value>, names: &[&str]) -> Option<bool> {
    match field(obj, names)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim() {
            "1" | "true" | "True" => Some(true),
            "0" | "false" | "False" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
