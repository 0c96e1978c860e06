use crate::schemas::{LineItem, ParticipantIndex, Split};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PersonalCharge {
    /// Position of the item in the bill.
    pub item: usize,
    pub amount: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonShare {
    pub name: String,
    pub shared: f64,
    pub personal: f64,
    pub total: f64,
    pub personal_items: Vec<PersonalCharge>,
}

pub fn bill_total(items: &[LineItem]) -> f64 {
    items.iter().map(LineItem::line_total).sum()
}

// The part of an item's cost that falls to the shared pool: all of it when
// nobody among the current participants is assigned, and for a custom split
// whatever the in-range quantities do not cover. Indices past the end of the
// list are ignored.
fn pooled_amount(item: &LineItem, participant_count: usize) -> f64 {
    match &item.split {
        Split::Shared => item.line_total(),
        Split::Even(assignees) => {
            if assignees.range(..participant_count).next().is_none() {
                item.line_total()
            } else {
                0.0
            }
        }
        Split::Custom(quantities) => {
            let covered: f64 = quantities.range(..participant_count).map(|(_, q)| q).sum();
            item.line_total() - item.unit_price * covered
        }
    }
}

fn charge(item: &LineItem, participant: ParticipantIndex, participant_count: usize) -> Option<f64> {
    match &item.split {
        Split::Shared => None,
        Split::Even(assignees) => {
            if !assignees.contains(&participant) {
                return None;
            }
            // The cost is split, not the units.
            let payers = assignees.range(..participant_count).count();
            Some(item.line_total() / payers as f64)
        }
        Split::Custom(quantities) => quantities
            .get(&participant)
            .map(|quantity| item.unit_price * quantity),
    }
}

/// Works out what each participant owes, in participant order.
pub fn allocate(participants: &[String], items: &[LineItem]) -> Vec<PersonShare> {
    let count = participants.len();
    let shared_total: f64 = items
        .iter()
        .map(|item| pooled_amount(item, count))
        .sum();
    let shared_per_person = if count == 0 {
        0.0
    } else {
        shared_total / count as f64
    };

    participants
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let personal_items: Vec<PersonalCharge> = items
                .iter()
                .enumerate()
                .filter_map(|(position, item)| {
                    charge(item, index, count).map(|amount| PersonalCharge {
                        item: position,
                        amount,
                    })
                })
                .collect();
            let personal = personal_items.iter().map(|charge| charge.amount).sum();
            PersonShare {
                name: name.clone(),
                shared: shared_per_person,
                personal,
                total: shared_per_person + personal,
                personal_items,
            }
        })
        .collect()
}

/// Rounds every total to `decimals` places so the rounded totals add up to
/// the rounded sum. Units left over after truncation go to the lowest indices
/// first. `decimals` is capped at the precision an `f64` carries.
pub fn round_shares(shares: &[PersonShare], decimals: u32) -> Vec<f64> {
    let scale = 10f64.powi(decimals.min(f64::DIGITS) as i32);
    // Absorbs representation error such as 0.29 * 100 = 28.999...
    let nudge = 1e-6;
    let target = (shares.iter().map(|share| share.total).sum::<f64>() * scale).round();
    let mut units: Vec<f64> = shares
        .iter()
        .map(|share| (share.total * scale + nudge).floor())
        .collect();
    let mut leftover = (target - units.iter().sum::<f64>()).round() as i64;
    for unit in units.iter_mut() {
        if leftover <= 0 {
            break;
        }
        *unit += 1.0;
        leftover -= 1;
    }
    for unit in units.iter_mut().rev() {
        if leftover >= 0 {
            break;
        }
        *unit -= 1.0;
        leftover += 1;
    }
    units.into_iter().map(|unit| unit / scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn shared_and_personal_items() {
        let items = vec![
            LineItem::new("X", 100.0, 1.0),
            LineItem::new("Y", 60.0, 1.0).with_split(Split::Even(BTreeSet::from([0]))),
        ];
        let result = allocate(&names(&["A", "B"]), &items);

        assert_eq!(result.len(), 2);
        assert_eq!((result[0].shared, result[0].personal, result[0].total), (50.0, 60.0, 110.0));
        assert_eq!((result[1].shared, result[1].personal, result[1].total), (50.0, 0.0, 50.0));
        assert_eq!(result[0].personal_items, vec![PersonalCharge { item: 1, amount: 60.0 }]);
        assert!(result[1].personal_items.is_empty());
        assert_eq!(bill_total(&items), 160.0);
    }

    #[test]
    fn even_split_divides_line_total() {
        let items = vec![LineItem::new("Pizza", 90.0, 2.0)
            .with_split(Split::Even(BTreeSet::from([0, 2])))];
        let result = allocate(&names(&["A", "B", "C"]), &items);
        let totals: Vec<f64> = result.iter().map(|share| share.total).collect();
        assert_eq!(totals, vec![90.0, 0.0, 90.0]);
    }

    #[test]
    fn custom_split_charges_per_quantity() {
        let items = vec![LineItem::new("Beer", 25.0, 4.0)
            .with_split(Split::Custom(BTreeMap::from([(0, 3.0), (1, 1.0)])))];
        let result = allocate(&names(&["A", "B"]), &items);
        assert_eq!(result[0].personal, 75.0);
        assert_eq!(result[1].personal, 25.0);
        assert_eq!(result[0].shared, 0.0);
    }

    #[test]
    fn no_participants_no_results() {
        let items = vec![LineItem::new("X", 10.0, 1.0)];
        assert!(allocate(&[], &items).is_empty());
        let result = allocate(&names(&["A"]), &[]);
        assert_eq!(result[0].total, 0.0);
    }

    #[test]
    fn stale_indices_are_ignored() {
        let items = vec![
            LineItem::new("Half stale", 40.0, 1.0).with_split(Split::Even(BTreeSet::from([1, 5]))),
            LineItem::new("All stale", 30.0, 1.0).with_split(Split::Even(BTreeSet::from([7]))),
        ];
        let result = allocate(&names(&["A", "B"]), &items);
        assert_eq!(result[1].personal, 40.0);
        assert_eq!(result[0].shared, 15.0);
        assert_eq!(result[0].total + result[1].total, 70.0);
    }

    #[test]
    fn stale_custom_entries_fall_to_the_shared_pool() {
        let items = vec![LineItem::new("Beer", 10.0, 2.0)
            .with_split(Split::Custom(BTreeMap::from([(0, 1.0), (5, 1.0)])))];
        let result = allocate(&names(&["A", "B"]), &items);
        assert_eq!(result[0].personal, 10.0);
        assert_eq!(result[0].shared, 5.0);
        assert_eq!(result[1].total, 5.0);
        assert_eq!(result[0].total + result[1].total, bill_total(&items));
    }

    #[test]
    fn repeated_calls_agree() {
        let items = vec![
            LineItem::new("X", 13.0, 3.0),
            LineItem::new("Y", 7.0, 1.0).with_split(Split::Even(BTreeSet::from([1, 2]))),
        ];
        let people = names(&["A", "B", "C"]);
        assert_eq!(allocate(&people, &items), allocate(&people, &items));
    }

    #[test]
    fn rounding_reconciles_to_the_cent() {
        let items = vec![LineItem::new("X", 100.0, 1.0)];
        let result = allocate(&names(&["A", "B", "C"]), &items);
        assert_eq!(round_shares(&result, 2), vec![33.34, 33.33, 33.33]);

        let result = allocate(&names(&["A", "B"]), &[LineItem::new("Y", 0.29, 1.0)]);
        assert_eq!(round_shares(&result, 2), vec![0.15, 0.14]);
    }

    #[test]
    fn huge_precision_is_capped() {
        let items = vec![
            LineItem::new("X", 100.0, 1.0),
            LineItem::new("Y", 60.0, 1.0).with_split(Split::Even(BTreeSet::from([0]))),
        ];
        let result = allocate(&names(&["A", "B"]), &items);
        assert_eq!(round_shares(&result, u32::MAX), vec![110.0, 50.0]);
    }

    // Indices reach a few past the participant list, as stale data would.
    fn arb_item(participants: usize) -> impl Strategy<Value = LineItem> {
        let most = 1.max(participants / 2);
        let indices = 0..participants + 3;
        let split = prop_oneof![
            Just(Split::Shared),
            prop::collection::btree_set(indices.clone(), 1..=most).prop_map(Split::Even),
            prop::collection::btree_map(indices, 0u32..6, 1..=most).prop_map(
                |quantities| Split::Custom(
                    quantities.into_iter().map(|(i, q)| (i, q as f64)).collect()
                )
            ),
        ];
        (1u32..100_000, 1u32..20, split).prop_map(|(price, quantity, split)| {
            let item = LineItem::new("item", price as f64 / 100.0, quantity as f64).with_split(split);
            crate::participants::recompute_quantity(item)
        })
    }

    fn arb_bill() -> impl Strategy<Value = (usize, Vec<LineItem>)> {
        (1usize..8).prop_flat_map(|participants| {
            (Just(participants), prop::collection::vec(arb_item(participants), 0..12))
        })
    }

    proptest! {
        #[test]
        fn totals_are_conserved((participants, items) in arb_bill()) {
            let people: Vec<String> = (0..participants).map(|i| i.to_string()).collect();
            let result = allocate(&people, &items);
            let allocated: f64 = result.iter().map(|share| share.total).sum();
            prop_assert!((allocated - bill_total(&items)).abs() < 1e-6);

            let rounded: f64 = round_shares(&result, 2).iter().sum();
            prop_assert!((rounded - (bill_total(&items) * 100.0).round() / 100.0).abs() < 1e-6);
        }

        #[test]
        fn shared_items_split_symmetrically(
            participants in 1usize..10,
            prices in prop::collection::vec(1u32..10_000, 1..8),
        ) {
            let people: Vec<String> = (0..participants).map(|_| "same".to_string()).collect();
            let items: Vec<LineItem> =
                prices.iter().map(|price| LineItem::new("x", *price as f64, 1.0)).collect();
            let expected = bill_total(&items) / participants as f64;
            for share in allocate(&people, &items) {
                prop_assert_eq!(share.shared, expected);
                prop_assert_eq!(share.total, expected);
            }
        }
    }
}
