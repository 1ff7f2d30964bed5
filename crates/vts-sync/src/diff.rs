//! Membership diffing
//!
//! Turns an initial and a current membership list into the reciprocal edits
//! peers need. Set semantics: order and duplicates in the inputs do not matter.

use indexmap::IndexSet;
use vts_common::{is_wildcard, EditIntent};

/// Compute ADD/REMOVE intents between the membership snapshot and the edited list.
///
/// Wildcard entries are dropped from both sides first. They are not expanded
/// into the concrete records they match, so a role covered only by a wildcard
/// gets no reciprocal edit.
pub fn diff_memberships<I, C>(initial: &[I], current: &[C]) -> Vec<EditIntent>
where
    I: AsRef<str>,
    C: AsRef<str>,
{
    let initial: IndexSet<&str> = concrete(initial).collect();
    let current: IndexSet<&str> = concrete(current).collect();

    current
        .iter()
        .chain(initial.iter())
        .copied()
        .collect::<IndexSet<&str>>()
        .into_iter()
        .filter_map(|member| {
            if !initial.contains(member) {
                Some(EditIntent::add(member))
            } else if !current.contains(member) {
                Some(EditIntent::remove(member))
            } else {
                None
            }
        })
        .collect()
}

/// Intents for a record with no snapshot: every concrete member is new.
pub fn all_added<C: AsRef<str>>(current: &[C]) -> Vec<EditIntent> {
    concrete(current)
        .collect::<IndexSet<&str>>()
        .into_iter()
        .map(EditIntent::add)
        .collect()
}

fn concrete<S: AsRef<str>>(entries: &[S]) -> impl Iterator<Item = &str> {
    entries.iter().map(|e| e.as_ref()).filter(|e| !is_wildcard(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use vts_common::EditAction;

    fn ids(intents: &[EditIntent], action: EditAction) -> HashSet<String> {
        intents
            .iter()
            .filter(|i| i.action == action)
            .map(|i| i.id.clone())
            .collect()
    }

    #[test]
    fn test_single_addition() {
        let intents = diff_memberships(&["t1"], &["t1", "t2"]);
        assert_eq!(intents, vec![EditIntent::add("t2")]);
    }

    #[test]
    fn test_clearing_removes_everything() {
        let empty: [&str; 0] = [];
        let intents = diff_memberships(&["t1", "t2"], &empty);
        assert_eq!(intents, vec![EditIntent::remove("t1"), EditIntent::remove("t2")]);
    }

    #[test]
    fn test_unchanged_lists_produce_nothing() {
        assert!(diff_memberships(&["a", "b"], &["b", "a"]).is_empty());
        let empty: [&str; 0] = [];
        assert!(diff_memberships(&empty, &empty).is_empty());
    }

    #[test]
    fn test_wildcards_are_ignored_on_both_sides() {
        let intents = diff_memberships(&["*", "app-*", "a"], &["b", "ops-*"]);
        assert_eq!(intents, vec![EditIntent::add("b"), EditIntent::remove("a")]);
    }

    #[test]
    fn test_duplicates_collapse() {
        let intents = diff_memberships(&["a", "a"], &["b", "b", "a"]);
        assert_eq!(intents, vec![EditIntent::add("b")]);
    }

    #[test]
    fn test_diff_partitions_the_union() {
        let cases: &[(&[&str], &[&str])] = &[
            (&["a", "b", "c"], &["b", "c", "d"]),
            (&[], &["x", "y"]),
            (&["x", "y"], &[]),
            (&["a", "*"], &["*", "b", "a"]),
            (&["p", "q", "r", "s"], &["s", "r", "t"]),
        ];

        for (initial, current) in cases {
            let intents = diff_memberships(initial, current);
            let i: HashSet<String> = initial.iter().filter(|e| !is_wildcard(e)).map(|s| s.to_string()).collect();
            let c: HashSet<String> = current.iter().filter(|e| !is_wildcard(e)).map(|s| s.to_string()).collect();

            let adds = ids(&intents, EditAction::Add);
            let removes = ids(&intents, EditAction::Remove);

            assert_eq!(adds, c.difference(&i).cloned().collect(), "{:?} -> {:?}", initial, current);
            assert_eq!(removes, i.difference(&c).cloned().collect(), "{:?} -> {:?}", initial, current);
            assert!(adds.is_disjoint(&removes));
            assert_eq!(intents.len(), adds.len() + removes.len());
        }
    }

    #[test]
    fn test_all_added_skips_wildcards() {
        assert_eq!(
            all_added(&["t1", "*", "t2", "t1"]),
            vec![EditIntent::add("t1"), EditIntent::add("t2")]
        );
    }
}
