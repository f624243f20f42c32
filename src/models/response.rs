// Recovery of structured results from free-form hosted-model output.
//
// Hosted models are asked for a strict JSON array of {"ID": n,
// "tat_detox1": ...} records but routinely wrap it in Markdown fences,
// nest it under an object key, or drop items. Recovery never fails the
// batch: whatever cannot be parsed keeps its original text, so one
// malformed generation cannot abort a multi-item run.

use regex_lite::Regex;
use serde_json::Value;
use tracing::warn;

use crate::models::batch::BatchOutcome;

/// Field names accepted for the rewritten text of one record, tried in
/// order. "tat_detox1" is what the prompt asks for; the rest cover the
/// shapes models actually produce.
const TEXT_FIELD_ALIASES: [&str; 4] = ["tat_detox1", "detoxified", "text", "output"];

/// Recover per-item rewrites from a raw hosted-model response.
///
/// Slots whose ordinal the response mentions get the rewritten text; every
/// other slot keeps its original. A response that cannot be parsed at all
/// falls back to the originals wholesale, with the reason recorded in the
/// outcome tag.
pub fn recover_batch(raw: &str, originals: &[String]) -> BatchOutcome {
    let cleaned = strip_code_fences(raw);

    let parsed: Value = match serde_json::from_str(&cleaned) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                error = %e,
                response_preview = %preview(raw),
                "Hosted model response was not valid JSON; keeping original texts"
            );
            return BatchOutcome::FellBack {
                texts: originals.to_vec(),
                reason: format!("response is not valid JSON: {e}"),
            };
        }
    };

    let records = match record_array(parsed) {
        Some(records) => records,
        None => {
            warn!(
                response_preview = %preview(raw),
                "Hosted model response contained no record array; keeping original texts"
            );
            return BatchOutcome::FellBack {
                texts: originals.to_vec(),
                reason: "response JSON contains no array of records".to_string(),
            };
        }
    };

    let mut texts = originals.to_vec();
    for record in &records {
        apply_record(record, &mut texts);
    }
    BatchOutcome::Rewritten(texts)
}

/// Pull the record array out of the parsed response. Models sometimes wrap
/// the requested array in an outer object ({"result": [...]}); in that
/// case the first array-valued field wins.
fn record_array(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(records) => Some(records),
        Value::Object(map) => map.into_iter().find_map(|(_, v)| match v {
            Value::Array(records) => Some(records),
            _ => None,
        }),
        _ => None,
    }
}

/// Write one record's rewrite into the slot its ordinal names. Records
/// missing fields, with non-numeric IDs, or pointing outside the batch are
/// skipped — their slots keep the original text.
fn apply_record(record: &Value, texts: &mut [String]) {
    let Some(idx) = record_ordinal(record) else {
        warn!(record = %record, "Record has no usable ID; slot keeps original text");
        return;
    };
    if idx >= texts.len() {
        warn!(
            id = idx,
            batch_len = texts.len(),
            "Record ID is outside the batch; skipping"
        );
        return;
    }

    for alias in TEXT_FIELD_ALIASES {
        if let Some(text) = record.get(alias).and_then(Value::as_str) {
            texts[idx] = text.to_string();
            return;
        }
    }
    warn!(
        id = idx,
        record = %record,
        "Record has no rewritten-text field; slot keeps original text"
    );
}

/// Read a record's ordinal ID, accepting a number or a numeric string —
/// models echo the ID back in whichever type they feel like.
fn record_ordinal(record: &Value) -> Option<usize> {
    let id = record.get("ID")?;
    if let Some(n) = id.as_u64() {
        return usize::try_from(n).ok();
    }
    id.as_str()?.trim().parse().ok()
}

/// Strip Markdown code-fence markers, returning the fenced content when a
/// fence is present and the trimmed input otherwise.
fn strip_code_fences(text: &str) -> String {
    let fence = Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("static regex compiles");
    match fence.captures(text) {
        Some(captures) => captures[1].trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Truncate a response to at most `max` characters for log output,
/// respecting UTF-8 character boundaries.
fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 120;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(MAX_CHARS).collect();
        format!("{truncated}...")
    }
}
