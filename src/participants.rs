//! Keeps participant indices inside line items consistent while the
//! participant list and item assignments are edited.
//!
//! Participants have no identity beyond their position, so every insertion or
//! removal is followed by a reindex pass over the whole item collection.

use crate::schemas::{LineItem, ParticipantIndex, Split};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::mem;
use tracing::debug;

#[derive(Clone, Debug, PartialEq)]
pub struct Removal {
    pub participants: Vec<String>,
    pub items: Vec<LineItem>,
    /// Positions of items that lost their last payer and went back to `Shared`.
    pub orphaned: Vec<usize>,
}

// Rewrites every index of a split through `map`; indices mapped to `None` are
// dropped. A split left without members becomes `Shared`.
fn reindex(split: Split, map: impl Fn(ParticipantIndex) -> Option<ParticipantIndex>) -> Split {
    match split {
        Split::Shared => Split::Shared,
        Split::Even(assignees) => Split::even(assignees.into_iter().filter_map(&map)),
        Split::Custom(quantities) => Split::custom(
            quantities
                .into_iter()
                .filter_map(|(index, quantity)| Some((map(index)?, quantity)))
                .collect(),
        ),
    }
}

pub fn remove_participant(
    mut participants: Vec<String>,
    items: Vec<LineItem>,
    removed: ParticipantIndex,
) -> Removal {
    if removed >= participants.len() {
        return Removal {
            participants,
            items,
            orphaned: vec![],
        };
    }
    participants.remove(removed);

    let mut orphaned = Vec::new();
    let items = items
        .into_iter()
        .enumerate()
        .map(|(position, mut item)| {
            let was_assigned = !item.split.is_shared();
            item.split = reindex(mem::take(&mut item.split), |index| {
                match index.cmp(&removed) {
                    Ordering::Less => Some(index),
                    Ordering::Equal => None,
                    Ordering::Greater => Some(index - 1),
                }
            });
            if was_assigned && item.split.is_shared() {
                debug!(position, name = %item.name, "item lost its last payer, now shared");
                orphaned.push(position);
            }
            item
        })
        .collect();

    Removal {
        participants,
        items,
        orphaned,
    }
}

pub fn insert_participant(
    mut participants: Vec<String>,
    items: Vec<LineItem>,
    at: ParticipantIndex,
    name: String,
) -> (Vec<String>, Vec<LineItem>) {
    let at = at.min(participants.len());
    participants.insert(at, name);
    let items = items
        .into_iter()
        .map(|mut item| {
            item.split = reindex(mem::take(&mut item.split), |index| {
                if index >= at {
                    index.checked_add(1)
                } else {
                    Some(index)
                }
            });
            item
        })
        .collect();
    (participants, items)
}

/// Drops indices that do not name one of `participant_count` participants.
pub fn prune_stale_indices(items: Vec<LineItem>, participant_count: usize) -> Vec<LineItem> {
    items
        .into_iter()
        .map(|mut item| {
            item.split = reindex(mem::take(&mut item.split), |index| {
                (index < participant_count).then_some(index)
            });
            recompute_quantity(item)
        })
        .collect()
}

/// Divides `quantity` evenly over `assignees`. Whole units that do not divide
/// evenly go one each to the lowest indices, so integral quantities stay
/// integral.
pub fn split_evenly(
    quantity: f64,
    assignees: impl IntoIterator<Item = ParticipantIndex>,
) -> BTreeMap<ParticipantIndex, f64> {
    let assignees: BTreeSet<_> = assignees.into_iter().collect();
    if assignees.is_empty() {
        return BTreeMap::new();
    }
    let count = assignees.len() as f64;
    let base = (quantity / count).floor();
    let mut leftover = quantity - base * count;
    assignees
        .into_iter()
        .map(|index| {
            let extra = leftover.clamp(0.0, 1.0);
            leftover -= extra;
            (index, base + extra)
        })
        .collect()
}

pub fn recompute_quantity(mut item: LineItem) -> LineItem {
    if let Split::Custom(quantities) = &item.split {
        item.quantity = quantities.values().sum();
    }
    item
}

pub fn toggle_assignment(mut item: LineItem, participant: ParticipantIndex) -> LineItem {
    let split = match mem::take(&mut item.split) {
        Split::Shared => Split::Even(BTreeSet::from([participant])),
        Split::Even(mut assignees) => {
            if !assignees.remove(&participant) {
                assignees.insert(participant);
            }
            Split::even(assignees)
        }
        Split::Custom(mut quantities) => {
            if quantities.remove(&participant).is_some() {
                // Last holder gone: back to shared at the last quantity.
                Split::custom(quantities)
            } else {
                let assignees = quantities.into_keys().chain([participant]);
                Split::Custom(split_evenly(item.quantity, assignees))
            }
        }
    };
    item.split = split;
    recompute_quantity(item)
}

pub fn toggle_custom_mode(mut item: LineItem, participant_count: usize) -> LineItem {
    item.split = match mem::take(&mut item.split) {
        Split::Custom(quantities) => Split::even(quantities.into_keys()),
        Split::Even(assignees) => Split::custom(split_evenly(item.quantity, assignees)),
        Split::Shared => Split::custom(split_evenly(item.quantity, 0..participant_count)),
    };
    recompute_quantity(item)
}

/// Sets one participant's quantity in a custom split. Items that are not
/// custom-split, or do not include `participant`, are returned unchanged.
pub fn set_custom_quantity(
    mut item: LineItem,
    participant: ParticipantIndex,
    quantity: f64,
) -> LineItem {
    if let Split::Custom(quantities) = &mut item.split {
        if let Some(entry) = quantities.get_mut(&participant) {
            *entry = quantity;
        }
    }
    recompute_quantity(item)
}
