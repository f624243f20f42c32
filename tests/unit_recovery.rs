// Unit tests for hosted-response recovery, using the messy shapes real
// models produce: fenced blocks inside prose, wrapped objects, duplicate
// and string-typed IDs, half-filled batches.

use mollify::models::batch::BatchOutcome;
use mollify::models::response::recover_batch;

fn originals(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn rewritten(outcome: BatchOutcome) -> Vec<String> {
    match outcome {
        BatchOutcome::Rewritten(texts) => texts,
        BatchOutcome::FellBack { reason, .. } => {
            panic!("expected a parsed batch, got fallback: {reason}")
        }
    }
}

#[test]
fn fenced_json_surrounded_by_prose_is_recovered() {
    let raw = "Sure! Here is the cleaned batch you asked for:\n\n\
               ```json\n\
               [{\"ID\": 0, \"tat_detox1\": \"полностью чистый\"}]\n\
               ```\n\n\
               Let me know if you need anything else.";
    let texts = rewritten(recover_batch(raw, &originals(&["грязный текст"])));
    assert_eq!(texts, originals(&["полностью чистый"]));
}

#[test]
fn wrapped_object_with_extra_fields_yields_the_array() {
    let raw = r#"{"status": "ok", "items": [{"ID": 0, "tat_detox1": "clean"}], "note": "done"}"#;
    let texts = rewritten(recover_batch(raw, &originals(&["toxic"])));
    assert_eq!(texts, originals(&["clean"]));
}

#[test]
fn later_duplicate_id_wins() {
    let raw = r#"[
        {"ID": 0, "tat_detox1": "first attempt"},
        {"ID": 0, "tat_detox1": "second attempt"}
    ]"#;
    let texts = rewritten(recover_batch(raw, &originals(&["toxic"])));
    assert_eq!(texts, originals(&["second attempt"]));
}

#[test]
fn mixed_id_types_fill_their_slots() {
    let raw = r#"[
        {"ID": "0", "tat_detox1": "via string id"},
        {"ID": 2, "tat_detox1": "via number id"}
    ]"#;
    let texts = rewritten(recover_batch(raw, &originals(&["a", "b", "c"])));
    assert_eq!(
        texts,
        originals(&["via string id", "b", "via number id"])
    );
}

#[test]
fn half_filled_batch_keeps_original_for_the_rest() {
    let raw = r#"[{"ID": 1, "text": "only this one"}]"#;
    let inputs = originals(&["keep me", "replace me", "keep me too"]);
    let texts = rewritten(recover_batch(raw, &inputs));
    assert_eq!(texts[0], "keep me");
    assert_eq!(texts[1], "only this one");
    assert_eq!(texts[2], "keep me too");
}

#[test]
fn refusal_text_falls_back_wholesale() {
    let inputs = originals(&["toxic a", "toxic b"]);
    let outcome = recover_batch(
        "I'm sorry, but I can't help with rewriting that content.",
        &inputs,
    );
    match outcome {
        BatchOutcome::FellBack { texts, .. } => assert_eq!(texts, inputs),
        BatchOutcome::Rewritten(_) => panic!("refusal should not parse as a batch"),
    }
}

#[test]
fn truncated_json_falls_back_wholesale() {
    let inputs = originals(&["toxic"]);
    let outcome = recover_batch(r#"[{"ID": 0, "tat_detox1": "cut of"#, &inputs);
    assert!(matches!(outcome, BatchOutcome::FellBack { .. }));
}

#[test]
fn top_level_scalar_falls_back() {
    let inputs = originals(&["toxic"]);
    let outcome = recover_batch(r#""just a string""#, &inputs);
    assert!(matches!(outcome, BatchOutcome::FellBack { .. }));
}

#[test]
fn empty_array_is_a_parse_success_with_no_fills() {
    let inputs = originals(&["toxic a", "toxic b"]);
    let texts = rewritten(recover_batch("[]", &inputs));
    assert_eq!(texts, inputs);
}
