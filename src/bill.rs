//! The bill being edited. Every change to participants or assignments goes
//! through [`crate::participants`] so item indices stay valid.

use crate::allocation::{allocate, bill_total, PersonShare};
use crate::participants::{self, Removal};
use crate::schemas::{ExtractedItem, LineItem, ParticipantIndex, Split};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum BillError {
    #[error("no participant at position {index} (bill has {count})")]
    UnknownParticipant { index: usize, count: usize },
    #[error("no item at position {index} (bill has {count})")]
    UnknownItem { index: usize, count: usize },
    #[error("a bill needs at least one participant")]
    LastParticipant,
    #[error("participant {participant} has no custom quantity on item {item}")]
    NotInCustomSplit { item: usize, participant: usize },
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Bill {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "people", default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl Default for Bill {
    fn default() -> Self {
        Bill::new()
    }
}

impl Bill {
    /// An unnamed bill with one blank participant and no items.
    pub fn new() -> Bill {
        Bill {
            name: String::new(),
            participants: vec![String::new()],
            items: vec![],
        }
    }

    pub fn total(&self) -> f64 {
        bill_total(&self.items)
    }

    pub fn split(&self) -> Vec<PersonShare> {
        allocate(&self.participants, &self.items)
    }

    /// The bill's name, or a dated default when it is blank.
    pub fn display_name(&self, today: NaiveDate) -> String {
        match self.name.trim() {
            "" => format!("Bill {}", today.format("%d/%m/%Y")),
            name => name.to_string(),
        }
    }

    fn check_participant(&self, index: ParticipantIndex) -> Result<(), BillError> {
        if index < self.participants.len() {
            Ok(())
        } else {
            Err(BillError::UnknownParticipant {
                index,
                count: self.participants.len(),
            })
        }
    }

    fn check_item(&self, index: usize) -> Result<(), BillError> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(BillError::UnknownItem {
                index,
                count: self.items.len(),
            })
        }
    }

    // Applies one of the item transforms to the item at `index`.
    fn edit_item(
        &mut self,
        index: usize,
        edit: impl FnOnce(LineItem) -> LineItem,
    ) -> Result<(), BillError> {
        self.check_item(index)?;
        let item = std::mem::replace(&mut self.items[index], LineItem::blank());
        self.items[index] = edit(item);
        Ok(())
    }

    /// Appends a participant. Blank names are ignored.
    pub fn add_participant(&mut self, name: &str) -> Option<ParticipantIndex> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        self.participants.push(name.to_string());
        Some(self.participants.len() - 1)
    }

    pub fn insert_participant(&mut self, at: ParticipantIndex, name: &str) -> Result<(), BillError> {
        if at > self.participants.len() {
            return Err(BillError::UnknownParticipant {
                index: at,
                count: self.participants.len(),
            });
        }
        let (names, items) = participants::insert_participant(
            std::mem::take(&mut self.participants),
            std::mem::take(&mut self.items),
            at,
            name.trim().to_string(),
        );
        self.participants = names;
        self.items = items;
        Ok(())
    }

    /// Removes a participant and reindexes every item. Returns the positions
    /// of items that had no other payer and are now shared.
    pub fn remove_participant(&mut self, index: ParticipantIndex) -> Result<Vec<usize>, BillError> {
        self.check_participant(index)?;
        if self.participants.len() == 1 {
            return Err(BillError::LastParticipant);
        }
        let Removal {
            participants: names,
            items,
            orphaned,
        } = participants::remove_participant(
            std::mem::take(&mut self.participants),
            std::mem::take(&mut self.items),
            index,
        );
        self.participants = names;
        self.items = items
            .into_iter()
            .map(participants::recompute_quantity)
            .collect();
        debug!(index, orphaned = orphaned.len(), "participant removed");
        Ok(orphaned)
    }

    pub fn add_item(&mut self) -> usize {
        self.push_item(LineItem::blank())
    }

    pub fn push_item(&mut self, item: LineItem) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }

    pub fn remove_item(&mut self, index: usize) -> Result<LineItem, BillError> {
        self.check_item(index)?;
        Ok(self.items.remove(index))
    }

    /// Appends receipt rows as shared items. Returns how many were added.
    pub fn import_items(&mut self, extracted: Vec<ExtractedItem>) -> usize {
        let added = extracted.len();
        self.items
            .extend(extracted.into_iter().map(ExtractedItem::into_line_item));
        added
    }

    pub fn rename_item(&mut self, index: usize, name: &str) -> Result<(), BillError> {
        self.edit_item(index, |mut item| {
            item.name = name.to_string();
            item
        })
    }

    pub fn set_unit_price(&mut self, index: usize, unit_price: f64) -> Result<(), BillError> {
        self.edit_item(index, |mut item| {
            item.unit_price = unit_price;
            item
        })
    }

    /// Sets an item's quantity. A custom split is reseeded evenly over the
    /// same participants.
    pub fn set_quantity(&mut self, index: usize, quantity: f64) -> Result<(), BillError> {
        self.edit_item(index, |mut item| {
            item.quantity = quantity;
            if let Split::Custom(quantities) = &item.split {
                let assignees: Vec<_> = quantities.keys().copied().collect();
                item.split = Split::Custom(participants::split_evenly(quantity, assignees));
            }
            participants::recompute_quantity(item)
        })
    }

    pub fn toggle_assignment(
        &mut self,
        item: usize,
        participant: ParticipantIndex,
    ) -> Result<(), BillError> {
        self.check_participant(participant)?;
        self.edit_item(item, |item| participants::toggle_assignment(item, participant))
    }

    pub fn toggle_custom_mode(&mut self, item: usize) -> Result<(), BillError> {
        let count = self.participants.len();
        self.edit_item(item, |item| participants::toggle_custom_mode(item, count))
    }

    pub fn set_custom_quantity(
        &mut self,
        item: usize,
        participant: ParticipantIndex,
        quantity: f64,
    ) -> Result<(), BillError> {
        self.check_item(item)?;
        if !matches!(&self.items[item].split, Split::Custom(q) if q.contains_key(&participant)) {
            return Err(BillError::NotInCustomSplit { item, participant });
        }
        self.edit_item(item, |line| {
            participants::set_custom_quantity(line, participant, quantity)
        })
    }
}
