//! Per-headword merge rules.
//!
//! The bare merge is additive: senses and forms from a later source are
//! appended to the entry that owns the key. Deduplication (senses by gloss
//! tuple, examples by `(text, translation)` pair) happens once per entry in
//! the assembler's enrichment pass.

use crate::models::{Entry, Example, Sense};
use crate::{Map, Set};

/// Fold `incoming` into `target` (equal merge keys). Ordered append for
/// senses and forms; empty sides adopt the other wholesale.
pub fn merge_into(target: &mut Entry, incoming: Entry) {
    if target.senses.is_empty() {
        target.senses = incoming.senses;
    } else if !incoming.senses.is_empty() {
        target.senses.extend(incoming.senses);
    }

    if target.forms.is_empty() {
        target.forms = incoming.forms;
    } else if !incoming.forms.is_empty() {
        target.forms.extend(incoming.forms);
    }

    if target.source.is_none() {
        target.source = incoming.source;
    }
}

/// Append only examples whose `(text, translation)` pair is unseen in the
/// sense. Returns how many were actually added.
pub fn append_examples(sense: &mut Sense, examples: impl IntoIterator<Item = Example>) -> usize {
    let mut seen: Set<(String, String)> = sense.examples.iter().map(Example::pair).collect();
    let mut added = 0;
    for example in examples {
        if seen.insert(example.pair()) {
            sense.examples.push(example);
            added += 1;
        }
    }
    added
}

/// Collapse duplicate senses and examples inside one merged entry.
///
/// Senses are identified by their gloss tuple; a later duplicate is dropped
/// after its unseen examples are folded into the surviving sense. Contentless
/// senses are kept only while they still carry examples. Example pairs are
/// unique across the whole entry.
pub fn dedup_entry(entry: &mut Entry) {
    let mut kept: Vec<Sense> = Vec::with_capacity(entry.senses.len());
    let mut sense_index: Map<Vec<String>, usize> = Map::default();
    let mut seen_examples: Set<(String, String)> = Set::default();

    for mut sense in entry.senses.drain(..) {
        sense
            .examples
            .retain(|example| seen_examples.insert(example.pair()));

        let gloss_key = sense.gloss_key();
        if sense.is_content_bearing() {
            match sense_index.get(&gloss_key) {
                Some(&at) => {
                    let survivor = &mut kept[at];
                    survivor.examples.extend(sense.examples);
                }
                None => {
                    sense_index.insert(gloss_key, kept.len());
                    kept.push(sense);
                }
            }
        } else if !sense.examples.is_empty() {
            // example carrier
            kept.push(sense);
        }
    }

    entry.senses = kept;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sense(glosses: &[&str]) -> Sense {
        Sense {
            glosses: glosses.iter().map(|g| (*g).to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn merge_is_additive() {
        let mut target = Entry {
            word: "kuća".to_string(),
            senses: vec![sense(&["house"])],
            source: Some("kaikki".to_string()),
            ..Default::default()
        };
        let incoming = Entry {
            word: "kuća".to_string(),
            senses: vec![sense(&["home"])],
            source: Some("stardict".to_string()),
            ..Default::default()
        };
        merge_into(&mut target, incoming);
        assert_eq!(target.senses.len(), 2);
        assert_eq!(target.source.as_deref(), Some("kaikki"));
    }

    #[test]
    fn merge_adopts_into_empty_side() {
        let mut target = Entry::default();
        let incoming = Entry {
            senses: vec![sense(&["house"])],
            source: Some("stardict".to_string()),
            ..Default::default()
        };
        merge_into(&mut target, incoming);
        assert_eq!(target.senses.len(), 1);
        assert_eq!(target.source.as_deref(), Some("stardict"));
    }

    #[test]
    fn example_append_dedups_pairs() {
        let mut s = sense(&["house"]);
        let added = append_examples(
            &mut s,
            vec![
                Example::new("Kuća je velika.", "The house is big."),
                Example::new("Kuća je velika.", "The house is big."),
                Example::new("Kuća je velika.", "The house is large."),
            ],
        );
        assert_eq!(added, 2);
        assert_eq!(s.examples.len(), 2);

        // appending again is a no-op
        let again = append_examples(
            &mut s,
            vec![Example::new("Kuća je velika.", "The house is big.")],
        );
        assert_eq!(again, 0);
    }

    #[test]
    fn dedup_collapses_equal_gloss_tuples() {
        let mut a = sense(&["house"]);
        a.examples.push(Example::new("a", "b"));
        let mut b = sense(&["house"]);
        b.examples.push(Example::new("c", "d"));
        b.examples.push(Example::new("a", "b")); // already seen in `a`

        let mut entry = Entry {
            senses: vec![a, b, sense(&["home"])],
            ..Default::default()
        };
        dedup_entry(&mut entry);

        assert_eq!(entry.senses.len(), 2);
        assert_eq!(entry.senses[0].glosses, vec!["house"]);
        assert_eq!(
            entry.senses[0]
                .examples
                .iter()
                .map(|e| e.text.as_str())
                .collect::<Vec<_>>(),
            vec!["a", "c"]
        );
    }

    #[test]
    fn contentless_senses_survive_only_with_examples() {
        let mut carrier = Sense::default();
        carrier.examples.push(Example::new("Kuća.", "House."));

        let mut entry = Entry {
            senses: vec![Sense::default(), carrier],
            ..Default::default()
        };
        dedup_entry(&mut entry);
        assert_eq!(entry.senses.len(), 1);
        assert_eq!(entry.senses[0].examples.len(), 1);
    }
}
