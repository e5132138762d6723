//! Parse model replies into structured answers
//!
//! Parsing yields either a value or a [`RepairableResponse`]. A repairable response
//! offers exactly one repair attempt: `repair` consumes it, so a second attempt cannot
//! be expressed.

use crate::error::EngineError;
use scorecard_domain::Answer;
use serde_json::{Map, Value};

/// Keys accepted for the answer field
const ANSWER_KEYS: &[&str] = &["answer", "value", "result"];

/// A parsed yes/no/na answer with its justification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredAnswer {
    /// The answer
    pub answer: Answer,
    /// Why the model answered so
    pub explanation: String,
    /// Supporting excerpt
    pub quote: String,
}

/// Outcome of a strict parse
#[derive(Debug)]
pub enum ParsedResponse {
    /// The reply parsed as expected
    Parsed(StructuredAnswer),
    /// The reply was malformed; one repair may be attempted
    Repairable(RepairableResponse),
}

/// A malformed reply awaiting its single repair attempt
#[derive(Debug)]
pub struct RepairableResponse {
    raw: String,
    reason: String,
}

/// Parse a reply strictly
pub fn parse_response(raw: &str) -> ParsedResponse {
    match parse_strict(&extract_json(raw)) {
        Ok(answer) => ParsedResponse::Parsed(answer),
        Err(reason) => ParsedResponse::Repairable(RepairableResponse {
            raw: raw.to_string(),
            reason,
        }),
    }
}

impl RepairableResponse {
    /// Why the strict parse failed
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Best-effort fix-up of the payload. Fatal for the call when it fails.
    pub fn repair(self) -> Result<StructuredAnswer, EngineError> {
        let candidate = fix_up_json(&self.raw);
        if let Ok(answer) = parse_strict(&candidate) {
            return Ok(answer);
        }

        leading_verdict(&self.raw).ok_or_else(|| {
            EngineError::MalformedResponse(format!(
                "{} (reply: {:?})",
                self.reason,
                truncate(&self.raw, 200)
            ))
        })
    }
}

/// Extract JSON from response, handling markdown code blocks
fn extract_json(response: &str) -> String {
    let trimmed = response.trim();

    if trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        // Skip the opening fence (```json or ```) and a closing fence if present
        let end = if lines.len() > 1 && lines[lines.len() - 1].trim_start().starts_with("```") {
            lines.len() - 1
        } else {
            lines.len()
        };
        lines.get(1..end).map(|body| body.join("\n")).unwrap_or_default()
    } else {
        trimmed.to_string()
    }
}

fn parse_strict(json_str: &str) -> Result<StructuredAnswer, String> {
    let json: Value =
        serde_json::from_str(json_str).map_err(|e| format!("JSON parse error: {}", e))?;
    let obj = json
        .as_object()
        .ok_or_else(|| "Expected a JSON object".to_string())?;

    let answer = answer_field(obj)?;
    let explanation = text_field(obj, "explanation").or_else(|| text_field(obj, "reasoning"));
    let quote = text_field(obj, "quote");

    Ok(StructuredAnswer {
        answer,
        explanation: explanation.unwrap_or_default(),
        quote: quote.unwrap_or_default(),
    })
}

fn answer_field(obj: &Map<String, Value>) -> Result<Answer, String> {
    let value = obj
        .iter()
        .find(|(key, _)| ANSWER_KEYS.iter().any(|wanted| key.eq_ignore_ascii_case(wanted)))
        .map(|(_, value)| value)
        .ok_or_else(|| "Missing 'answer'".to_string())?;

    match value {
        Value::String(token) => {
            Answer::parse(token).ok_or_else(|| format!("Unrecognized answer '{}'", token))
        }
        Value::Bool(true) => Ok(Answer::Yes),
        Value::Bool(false) => Ok(Answer::No),
        Value::Null => Ok(Answer::Na),
        other => Err(format!("Invalid 'answer' value: {}", other)),
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(text) => Some(text.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" ... "),
        ),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Narrow to the outermost object, normalize quotes, drop trailing commas
fn fix_up_json(raw: &str) -> String {
    let extracted = extract_json(raw);
    let body = match (extracted.find('{'), extracted.rfind('}')) {
        (Some(start), Some(end)) if start < end => extracted[start..=end].to_string(),
        (Some(start), _) => format!("{}}}", extracted[start..].trim_end().trim_end_matches(',')),
        _ => extracted,
    };

    let mut normalized: String = body
        .chars()
        .map(|c| match c {
            '\u{201c}' | '\u{201d}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect();

    if !normalized.contains('"') {
        normalized = normalized.replace('\'', "\"");
    }

    strip_trailing_commas(&normalized)
}

fn strip_trailing_commas(json: &str) -> String {
    let mut output = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;
    let chars: Vec<char> = json.chars().collect();

    for (index, &c) in chars.iter().enumerate() {
        if in_string {
            output.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[index + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']') | None) {
                continue;
            }
        }
        output.push(c);
    }

    output
}

/// Last resort: an `answer` key followed by a verdict, or a reply opening with one
fn leading_verdict(raw: &str) -> Option<StructuredAnswer> {
    let lowered = raw.to_ascii_lowercase();
    let after_key = ANSWER_KEYS
        .iter()
        .find_map(|key| lowered.find(key).map(|index| &raw[index + key.len()..]));

    let verdict = after_key
        .and_then(first_word)
        .and_then(Answer::parse)
        .or_else(|| first_word(raw).and_then(Answer::parse))?;

    Some(StructuredAnswer {
        answer: verdict,
        explanation: raw.trim().to_string(),
        quote: String::new(),
    })
}

fn first_word(text: &str) -> Option<&str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '/'))
        .find(|word| !word.is_empty())
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
