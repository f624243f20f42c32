// Batch construction — language-homogeneous units of model work.
//
// A Batch is what one TextModel::forward call consumes: an ordered group
// of prompted items that all share one (source, target) language pair.
// Batches are built by the strategy layer, consumed immediately, and
// never retained.

use crate::lang::Language;
use crate::prompts::{self, Task};

/// One input item plus its prompt-wrapped form.
///
/// `original` is the caller's text and is what fail-safe substitution
/// returns; `prompted` is what per-item backends send to the model.
#[derive(Debug, Clone)]
pub struct PromptedUnit {
    pub original: String,
    pub prompted: String,
}

/// A language-homogeneous group of prompted units — the unit of work for
/// one `TextModel::forward` call.
#[derive(Debug, Clone)]
pub struct Batch {
    pub units: Vec<PromptedUnit>,
    /// Language of every unit in the batch (and of the prompt wording).
    pub language: Language,
    pub task: Task,
    /// Target language for translation batches. Drives the forced first
    /// output token on the local path and the prompt wording on hosted
    /// paths. `None` for detoxification.
    pub forced_target: Option<Language>,
}

impl Batch {
    /// Split a language group into batches of at most `batch_size` units,
    /// preserving input order across the returned batches.
    pub fn build(
        texts: &[String],
        language: Language,
        task: Task,
        forced_target: Option<Language>,
        batch_size: usize,
    ) -> Vec<Batch> {
        let batch_size = batch_size.max(1);
        texts
            .chunks(batch_size)
            .map(|chunk| Batch {
                units: chunk
                    .iter()
                    .map(|text| PromptedUnit {
                        original: text.clone(),
                        prompted: prompts::item_prompt(task, language, forced_target, text),
                    })
                    .collect(),
                language,
                task,
                forced_target,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The original (unprompted) texts, in unit order. This is what the
    /// fail-safe path substitutes when a hosted response cannot be parsed.
    pub fn originals(&self) -> Vec<String> {
        self.units.iter().map(|u| u.original.clone()).collect()
    }
}

/// What one forward call produced, distinguishing a real rewrite from the
/// fail-safe substitution of the input texts.
///
/// Transport and configuration failures are `Err` at the call site; this
/// type only describes calls that returned — the strategy layer inspects
/// the tag instead of catching anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The model produced one output per unit, in unit order.
    Rewritten(Vec<String>),
    /// The response could not be used; `texts` are the batch's original
    /// inputs, passed through unmodified.
    FellBack { texts: Vec<String>, reason: String },
}

impl BatchOutcome {
    /// The texts to use downstream regardless of tag.
    pub fn into_texts(self) -> Vec<String> {
        match self {
            BatchOutcome::Rewritten(texts) => texts,
            BatchOutcome::FellBack { texts, .. } => texts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn build_chunks_by_batch_size_preserving_order() {
        let input = texts(&["a", "b", "c", "d", "e"]);
        let batches = Batch::build(&input, Language::English, Task::Detoxification, None, 2);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1].len(), 2);
        assert_eq!(batches[2].len(), 1);

        let flattened: Vec<String> = batches.iter().flat_map(|b| b.originals()).collect();
        assert_eq!(flattened, input);
    }

    #[test]
    fn build_prompts_every_unit() {
        let input = texts(&["insult here"]);
        let batches = Batch::build(&input, Language::English, Task::Detoxification, None, 8);
        assert_eq!(batches.len(), 1);
        let unit = &batches[0].units[0];
        assert_eq!(unit.original, "insult here");
        assert!(unit.prompted.contains("insult here"));
        assert_ne!(unit.prompted, unit.original);
    }

    #[test]
    fn build_records_translation_target() {
        let input = texts(&["привет"]);
        let batches = Batch::build(
            &input,
            Language::Russian,
            Task::Translation,
            Some(Language::English),
            8,
        );
        assert_eq!(batches[0].forced_target, Some(Language::English));
        assert!(batches[0].units[0].prompted.contains("English"));
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let input = texts(&["a", "b"]);
        let batches = Batch::build(&input, Language::English, Task::Detoxification, None, 0);
        assert_eq!(batches.len(), 2);
    }

    #[test]
    fn outcome_into_texts_ignores_tag() {
        let rewritten = BatchOutcome::Rewritten(texts(&["x"]));
        assert_eq!(rewritten.into_texts(), texts(&["x"]));

        let fell_back = BatchOutcome::FellBack {
            texts: texts(&["y"]),
            reason: "invalid JSON".to_string(),
        };
        assert_eq!(fell_back.into_texts(), texts(&["y"]));
    }
}
