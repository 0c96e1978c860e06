use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Participants are referenced by their position in the bill's list of names.
pub type ParticipantIndex = usize;

/// Who pays for a line item.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Split {
    /// Divided evenly across every current participant.
    #[default]
    Shared,
    /// Divided evenly among these participants. Never empty.
    Even(BTreeSet<ParticipantIndex>),
    /// Each participant pays for the quantity they took. Never empty.
    Custom(BTreeMap<ParticipantIndex, f64>),
}

impl Split {
    /// Builds an even split, falling back to `Shared` when nobody is named.
    pub fn even(assignees: impl IntoIterator<Item = ParticipantIndex>) -> Split {
        let assignees: BTreeSet<_> = assignees.into_iter().collect();
        if assignees.is_empty() {
            Split::Shared
        } else {
            Split::Even(assignees)
        }
    }

    /// Builds a custom split, falling back to `Shared` when the map is empty.
    pub fn custom(quantities: BTreeMap<ParticipantIndex, f64>) -> Split {
        if quantities.is_empty() {
            Split::Shared
        } else {
            Split::Custom(quantities)
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, Split::Shared)
    }

    pub fn contains(&self, participant: ParticipantIndex) -> bool {
        match self {
            Split::Shared => false,
            Split::Even(assignees) => assignees.contains(&participant),
            Split::Custom(quantities) => quantities.contains_key(&participant),
        }
    }

    /// Explicitly assigned participants, in ascending order.
    pub fn assignees(&self) -> Vec<ParticipantIndex> {
        match self {
            Split::Shared => vec![],
            Split::Even(assignees) => assignees.iter().copied().collect(),
            Split::Custom(quantities) => quantities.keys().copied().collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(from = "ItemRecord", into = "ItemRecord")]
pub struct LineItem {
    pub name: String,
    pub unit_price: f64,
    /// Derived from the custom quantities when the split is `Custom`.
    pub quantity: f64,
    pub split: Split,
}

impl LineItem {
    pub fn new(name: impl Into<String>, unit_price: f64, quantity: f64) -> LineItem {
        LineItem {
            name: name.into(),
            unit_price,
            quantity,
            split: Split::Shared,
        }
    }

    /// The empty row a user fills in by hand.
    pub fn blank() -> LineItem {
        LineItem::new("", 0.0, 1.0)
    }

    pub fn with_split(mut self, split: Split) -> LineItem {
        self.split = split;
        self
    }

    pub fn line_total(&self) -> f64 {
        self.unit_price * self.quantity
    }
}

// Stored records come from several revisions of the bill editor: `assignedTo`
// used to be a single index or null, and JavaScript numbers land in MongoDB as
// doubles, so indices are accepted in either form.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum WireIndex {
    Int(u64),
    Float(f64),
}

impl WireIndex {
    fn index(self) -> Option<ParticipantIndex> {
        match self {
            WireIndex::Int(n) => usize::try_from(n).ok(),
            WireIndex::Float(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => {
                Some(f as usize)
            }
            WireIndex::Float(_) => None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum WireAssignment {
    One(WireIndex),
    Many(Vec<WireIndex>),
}

fn default_quantity() -> f64 {
    1.0
}

/// The persisted and wire shape of a [`LineItem`].
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemRecord {
    #[serde(default)]
    name: String,
    #[serde(default)]
    price: f64,
    #[serde(default = "default_quantity")]
    quantity: f64,
    #[serde(default)]
    assigned_to: Option<WireAssignment>,
    #[serde(default)]
    use_custom_quantities: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    custom_quantities: BTreeMap<String, f64>,
}

impl From<ItemRecord> for LineItem {
    fn from(record: ItemRecord) -> LineItem {
        let assigned: BTreeSet<ParticipantIndex> = match record.assigned_to {
            None => BTreeSet::new(),
            Some(WireAssignment::One(index)) => index.index().into_iter().collect(),
            Some(WireAssignment::Many(indices)) => {
                indices.into_iter().filter_map(WireIndex::index).collect()
            }
        };
        let split = if record.use_custom_quantities {
            let custom: BTreeMap<ParticipantIndex, f64> = record
                .custom_quantities
                .iter()
                .filter_map(|(key, quantity)| Some((key.trim().parse().ok()?, *quantity)))
                .collect();
            let assigned = if assigned.is_empty() {
                custom.keys().copied().collect()
            } else {
                assigned
            };
            Split::custom(
                assigned
                    .into_iter()
                    .map(|index| (index, custom.get(&index).copied().unwrap_or(0.0)))
                    .collect(),
            )
        } else {
            Split::even(assigned)
        };
        // A custom split's quantity is derived, whatever the record says.
        let quantity = match &split {
            Split::Custom(quantities) => quantities.values().sum(),
            _ => record.quantity,
        };
        LineItem {
            name: record.name,
            unit_price: record.price,
            quantity,
            split,
        }
    }
}

impl From<LineItem> for ItemRecord {
    fn from(item: LineItem) -> ItemRecord {
        let assigned = item
            .split
            .assignees()
            .into_iter()
            .map(|index| WireIndex::Int(index as u64))
            .collect();
        let custom_quantities = match &item.split {
            Split::Custom(quantities) => quantities
                .iter()
                .map(|(index, quantity)| (index.to_string(), *quantity))
                .collect(),
            _ => BTreeMap::new(),
        };
        ItemRecord {
            use_custom_quantities: matches!(item.split, Split::Custom(_)),
            name: item.name,
            price: item.unit_price,
            quantity: item.quantity,
            assigned_to: Some(WireAssignment::Many(assigned)),
            custom_quantities,
        }
    }
}

/// A row read off a receipt by the extraction service. Prices and quantities
/// arrive as numbers or as free text.
#[derive(Clone, Debug, Deserialize)]
pub struct ExtractedItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: Value,
    #[serde(default)]
    pub quantity: Value,
}

impl ExtractedItem {
    pub fn into_line_item(self) -> LineItem {
        let price = loose_number(&self.price).unwrap_or(0.0);
        let quantity = loose_number(&self.quantity).unwrap_or(1.0);
        LineItem::new(self.name.trim(), price, quantity)
    }
}

// Reads the leading decimal number out of a value, so "12.5 kg" is 12.5.
// Zero and unreadable values count as absent.
fn loose_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => {
            let text = text.trim_start();
            let mut end = 0;
            let mut seen_digit = false;
            let mut seen_dot = false;
            for (position, c) in text.char_indices() {
                match c {
                    '+' | '-' if position == 0 => {}
                    '0'..='9' => seen_digit = true,
                    '.' if !seen_dot => seen_dot = true,
                    _ => break,
                }
                end = position + c.len_utf8();
            }
            if !seen_digit {
                return None;
            }
            text[..end].trim_end_matches('.').parse().ok()?
        }
        _ => return None,
    };
    (number.is_finite() && number != 0.0).then_some(number)
}

/// A bill as stored in the `Bills` collection.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub people: Vec<String>,
    pub items: Vec<LineItem>,
    pub total: f64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// The JSON face of a [`BillDocument`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillView {
    pub id: Option<String>,
    pub name: String,
    pub people: Vec<String>,
    pub items: Vec<LineItem>,
    pub total: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BillDocument> for BillView {
    fn from(document: BillDocument) -> BillView {
        BillView {
            id: document.id.map(|id| id.to_hex()),
            name: document.name,
            people: document.people,
            items: document.items,
            total: document.total,
            created_at: document.created_at,
            updated_at: document.updated_at,
        }
    }
}
