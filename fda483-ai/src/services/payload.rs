//! Structured payload extraction and schema coercion
//!
//! Model replies often wrap the JSON object in markdown fences or a sentence
//! of prose. [`extract_payload`] finds the JSON text; [`parse_response`]
//! turns it into a [`FieldMap`] for a schema.

use crate::error::ParseError;
use crate::models::schema::{FieldKind, FieldMap, FieldValue, Schema, SchemaField};
use serde_json::{Map, Value};

/// Locate the JSON payload inside a possibly-wrapped response
///
/// Order of attempts:
/// 1. Inside the first fenced block (```` ```json ```` or bare ```` ``` ````):
///    the first complete JSON object, else the whole block if it starts with
///    `{` or `[`
/// 2. A leading JSON array, then the first complete JSON object anywhere in
///    the text; text before and after it is ignored
/// 3. The whole trimmed text if it starts with `{` or `[`, else the span from
///    the first `{` to the last `}`, so malformed JSON reports a syntax error
pub fn extract_payload(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();

    if let Some(block) = fenced_block(trimmed) {
        if let Some(value) = first_json_value(block) {
            return Some(value);
        }
        if block.starts_with('{') || block.starts_with('[') {
            return Some(block);
        }
    }

    if let Some(value) = first_json_value(trimmed) {
        return Some(value);
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Some(trimmed);
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&trimmed[start..=end]),
        _ => None,
    }
}

/// Exact text of the first complete JSON value worth parsing
///
/// A leading array is taken as-is; otherwise every `{` is tried in order
/// until one opens a well-formed object. Trailing text is not consumed.
fn first_json_value(text: &str) -> Option<&str> {
    if text.starts_with('[') {
        if let Some(span) = value_span(text, 0, |_| true) {
            return Some(span);
        }
    }

    text.match_indices('{')
        .find_map(|(start, _)| value_span(text, start, Value::is_object))
}

fn value_span(text: &str, start: usize, accept: fn(&Value) -> bool) -> Option<&str> {
    let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) if accept(&value) => Some(&text[start..start + stream.byte_offset()]),
        _ => None,
    }
}

/// Inner text of the first ``` fence, language tag removed
///
/// An unterminated fence runs to the end of the text.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];

    // Skip an info string such as `json` up to the end of the line
    let body = match after_fence.find('\n') {
        Some(newline)
            if after_fence[..newline]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ' ') =>
        {
            &after_fence[newline + 1..]
        }
        _ => after_fence,
    };

    let inner = match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    };
    Some(inner.trim())
}

/// Interpret a raw service reply as `schema`'s fields
///
/// Missing or `null` fields take their defaults. The fields are read from the
/// schema's envelope object when the reply contains it, else from the top
/// level.
pub fn parse_response(schema: &Schema, raw: &str) -> Result<FieldMap, ParseError> {
    let payload = extract_payload(raw).ok_or(ParseError::NoPayload)?;
    let value: Value =
        serde_json::from_str(payload).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let Value::Object(object) = value else {
        return Err(ParseError::NotAnObject);
    };

    let fields = match &schema.envelope {
        Some(envelope) => match object.get(envelope) {
            Some(Value::Object(inner)) => inner,
            Some(_) => return Err(ParseError::EnvelopeNotAnObject(envelope.clone())),
            None => &object,
        },
        None => &object,
    };

    schema
        .fields
        .iter()
        .map(|field| coerce_field(field, fields).map(|value| (field.name.clone(), value)))
        .collect()
}

fn coerce_field(field: &SchemaField, object: &Map<String, Value>) -> Result<FieldValue, ParseError> {
    let value = match object.get(&field.name) {
        None | Some(Value::Null) => return Ok(field.default_value()),
        Some(value) => value,
    };

    match (&field.kind, value) {
        (FieldKind::Flag, Value::Bool(b)) => Ok(FieldValue::Flag(*b)),
        (FieldKind::Flag, Value::String(s)) if s.trim().eq_ignore_ascii_case("true") => {
            Ok(FieldValue::Flag(true))
        }
        (FieldKind::Flag, Value::String(s)) if s.trim().eq_ignore_ascii_case("false") => {
            Ok(FieldValue::Flag(false))
        }
        (FieldKind::Flag, _) => Err(ParseError::FieldType {
            field: field.name.clone(),
            expected: "boolean",
        }),
        (FieldKind::Text { .. }, Value::String(s)) => Ok(FieldValue::Text(s.clone())),
        (FieldKind::Text { .. }, _) => Err(ParseError::FieldType {
            field: field.name.clone(),
            expected: "string",
        }),
    }
}
