// Language grouping — partition, process, scatter.
//
// Models run far more efficiently on language-homogeneous batches (one
// source/target pair per call), so a mixed-language request is split into
// per-language groups and results are written back to each item's
// original slot. The contract: a strict one-to-one correspondence between
// input positions and output positions, whatever order groups run in.

use anyhow::{ensure, Result};

use crate::lang::Language;

/// Partition indices by language, preserving within-group input order.
/// Groups appear in order of each language's first occurrence.
pub fn group_by_language(languages: &[Language]) -> Vec<(Language, Vec<usize>)> {
    let mut groups: Vec<(Language, Vec<usize>)> = Vec::new();
    for (idx, &language) in languages.iter().enumerate() {
        match groups.iter_mut().find(|(lang, _)| *lang == language) {
            Some((_, indices)) => indices.push(idx),
            None => groups.push((language, vec![idx])),
        }
    }
    groups
}

/// Pick one group's texts out of the full input, in group order.
pub fn gather(texts: &[String], indices: &[usize]) -> Vec<String> {
    indices.iter().map(|&idx| texts[idx].clone()).collect()
}

/// Write one group's outputs back into the result slots at the recorded
/// original indices. A length mismatch means a grouping defect upstream,
/// not a runtime condition — it is surfaced as an error, never papered
/// over.
pub fn scatter(
    slots: &mut [Option<String>],
    indices: &[usize],
    outputs: Vec<String>,
) -> Result<()> {
    ensure!(
        indices.len() == outputs.len(),
        "Group produced {} outputs for {} inputs",
        outputs.len(),
        indices.len()
    );
    for (&idx, output) in indices.iter().zip(outputs) {
        ensure!(
            slots[idx].is_none(),
            "Result slot {idx} was filled twice"
        );
        slots[idx] = Some(output);
    }
    Ok(())
}

/// Collapse the slot array into the final result sequence. An unfilled
/// slot is a grouping bug by the same logic as a mismatched scatter.
pub fn finalize(slots: Vec<Option<String>>) -> Result<Vec<String>> {
    slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| {
            slot.ok_or_else(|| anyhow::anyhow!("Result slot {idx} was never filled"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::Language::{English, Russian};

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn groups_preserve_first_occurrence_order_and_member_order() {
        let groups = group_by_language(&[English, Russian, English, Russian, English]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], (English, vec![0, 2, 4]));
        assert_eq!(groups[1], (Russian, vec![1, 3]));
    }

    #[test]
    fn gather_picks_group_members_in_order() {
        let input = texts(&["a", "б", "c"]);
        assert_eq!(gather(&input, &[0, 2]), texts(&["a", "c"]));
        assert_eq!(gather(&input, &[1]), texts(&["б"]));
    }

    #[test]
    fn scatter_restores_original_positions() {
        let mut slots: Vec<Option<String>> = vec![None, None, None];
        scatter(&mut slots, &[0, 2], texts(&["A", "C"])).unwrap();
        scatter(&mut slots, &[1], texts(&["Б"])).unwrap();
        assert_eq!(finalize(slots).unwrap(), texts(&["A", "Б", "C"]));
    }

    #[test]
    fn scatter_rejects_length_mismatch() {
        let mut slots: Vec<Option<String>> = vec![None, None];
        let err = scatter(&mut slots, &[0, 1], texts(&["only one"])).unwrap_err();
        assert!(err.to_string().contains("1 outputs for 2 inputs"));
    }

    #[test]
    fn scatter_rejects_double_fill() {
        let mut slots: Vec<Option<String>> = vec![None];
        scatter(&mut slots, &[0], texts(&["first"])).unwrap();
        assert!(scatter(&mut slots, &[0], texts(&["second"])).is_err());
    }

    #[test]
    fn finalize_flags_unfilled_slots() {
        let slots = vec![Some("a".to_string()), None];
        let err = finalize(slots).unwrap_err();
        assert!(err.to_string().contains("slot 1"));
    }

    #[test]
    fn empty_input_produces_no_groups() {
        assert!(group_by_language(&[]).is_empty());
        assert_eq!(finalize(Vec::new()).unwrap(), Vec::<String>::new());
    }
}
