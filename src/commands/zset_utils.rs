//! Shared sorted-set helpers.
//!
//! The payload is a member→score map; the rank order `(score, member-lex)`
//! is computed by sorting on read, which keeps single-member updates O(1).

use std::cmp::Ordering;

use crate::commands::CommandError;
use crate::key_value_store::{live_entry, DataType, KeyValueStore, SortedSet};

/// Members ordered by `(score, member-lex)`; rank is the index here.
pub fn sorted_members(set: &SortedSet) -> Vec<(String, f64)> {
    let mut members: Vec<(String, f64)> = set
        .iter()
        .map(|(member, score)| (member.clone(), *score))
        .collect();

    members.sort_by(|(member_a, score_a), (member_b, score_b)| {
        score_a
            .partial_cmp(score_b)
            .unwrap_or(Ordering::Equal)
            .then_with(|| member_a.cmp(member_b))
    });

    members
}

/// Scores print the way Redis prints them: integral values without a
/// decimal point, everything else in the shortest round-trip form.
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 && score.abs() < 1e17 {
        format!("{}", score as i64)
    } else {
        format!("{}", score)
    }
}

/// Looks the key up as a sorted set; a missing key is `None`, any other
/// kind is a type error.
pub fn live_sorted_set<'a>(
    store: &'a mut KeyValueStore,
    key: &str,
) -> Result<Option<&'a mut SortedSet>, CommandError> {
    match live_entry(store, key) {
        Some(value) => {
            let DataType::SortedSet(ref mut set) = value.data else {
                return Err(CommandError::WrongType);
            };

            Ok(Some(set))
        }
        None => Ok(None),
    }
}

pub fn parse_score(raw: &str) -> Result<f64, CommandError> {
    let score = raw.parse::<f64>().map_err(|_| CommandError::NotAFloat)?;

    if score.is_nan() {
        return Err(CommandError::NotAFloat);
    }

    Ok(score)
}
