use crate::allocation::bill_total;
use crate::participants::recompute_quantity;
use crate::schemas::LineItem;
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    #[serde(rename = "missing name")]
    MissingName,
    #[serde(rename = "non-positive price")]
    NonPositivePrice,
    #[serde(rename = "non-positive quantity")]
    NonPositiveQuantity,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RejectReason::MissingName => "missing name",
            RejectReason::NonPositivePrice => "non-positive price",
            RejectReason::NonPositiveQuantity => "non-positive quantity",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Rejected {
    /// Position of the item in the submitted list.
    pub position: usize,
    pub item: LineItem,
    pub reasons: Vec<RejectReason>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Validation {
    pub valid: Vec<LineItem>,
    pub rejected: Vec<Rejected>,
    /// Recomputed from `valid`; a caller-supplied total is never trusted.
    pub total: f64,
}

fn reasons(item: &LineItem) -> Vec<RejectReason> {
    let mut reasons = Vec::new();
    if item.name.is_empty() {
        reasons.push(RejectReason::MissingName);
    }
    // Written so that NaN fails as well.
    if !(item.unit_price > 0.0) {
        reasons.push(RejectReason::NonPositivePrice);
    }
    if !(item.quantity > 0.0) {
        reasons.push(RejectReason::NonPositiveQuantity);
    }
    reasons
}

/// Splits `items` into those fit to persist and those that are not, after
/// trimming names and re-deriving custom-split quantities.
pub fn validate_for_persistence(items: Vec<LineItem>) -> Validation {
    let mut validation = Validation::default();
    for (position, item) in items.into_iter().enumerate() {
        let mut item = recompute_quantity(item);
        item.name = item.name.trim().to_string();
        let reasons = reasons(&item);
        if reasons.is_empty() {
            validation.valid.push(item);
        } else {
            debug!(position, ?reasons, "dropping incomplete item");
            validation.rejected.push(Rejected {
                position,
                item,
                reasons,
            });
        }
    }
    validation.total = bill_total(&validation.valid);
    validation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::Split;
    use std::collections::BTreeMap;

    #[test]
    fn rejects_each_missing_field() {
        let validation = validate_for_persistence(vec![
            LineItem::new("", 10.0, 1.0),
            LineItem::new("Tea", 0.0, 1.0),
            LineItem::new("Rice", 5.0, -1.0),
            LineItem::new("Cake", 12.0, 2.0),
        ]);

        assert_eq!(validation.valid, vec![LineItem::new("Cake", 12.0, 2.0)]);
        assert_eq!(validation.total, 24.0);
        let reasons: Vec<_> = validation
            .rejected
            .iter()
            .map(|rejected| (rejected.position, rejected.reasons.clone()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                (0, vec![RejectReason::MissingName]),
                (1, vec![RejectReason::NonPositivePrice]),
                (2, vec![RejectReason::NonPositiveQuantity]),
            ]
        );
        assert_eq!(RejectReason::MissingName.to_string(), "missing name");
    }

    #[test]
    fn accumulates_reasons_and_rejects_nan() {
        let validation = validate_for_persistence(vec![LineItem::new("   ", f64::NAN, 0.0)]);
        assert!(validation.valid.is_empty());
        assert_eq!(validation.total, 0.0);
        assert_eq!(
            validation.rejected[0].reasons,
            vec![
                RejectReason::MissingName,
                RejectReason::NonPositivePrice,
                RejectReason::NonPositiveQuantity,
            ]
        );
    }

    #[test]
    fn trims_names_and_rederives_custom_quantity() {
        let item = LineItem {
            name: "  Beer ".into(),
            unit_price: 20.0,
            quantity: 99.0,
            split: Split::Custom(BTreeMap::from([(0, 2.0), (1, 1.0)])),
        };
        let validation = validate_for_persistence(vec![item]);
        assert_eq!(validation.valid[0].name, "Beer");
        assert_eq!(validation.valid[0].quantity, 3.0);
        assert_eq!(validation.total, 60.0);
    }

    #[test]
    fn custom_split_with_nothing_taken_is_rejected() {
        let item = LineItem::new("Beer", 20.0, 4.0)
            .with_split(Split::Custom(BTreeMap::from([(0, 0.0)])));
        let validation = validate_for_persistence(vec![item]);
        assert_eq!(
            validation.rejected[0].reasons,
            vec![RejectReason::NonPositiveQuantity]
        );
    }

    #[test]
    fn reasons_serialize_as_text() {
        assert_eq!(
            serde_json::to_value(RejectReason::NonPositivePrice).unwrap(),
            serde_json::json!("non-positive price")
        );
    }
}
