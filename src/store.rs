use crate::config::Config;
use crate::schemas::BillDocument;
use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{error::Result, options::FindOptions, Client, Collection};
use tracing::debug;

/// Creation-time window; either end may be open.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CreatedRange {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl CreatedRange {
    fn filter(&self) -> Document {
        let mut created = Document::new();
        if let Some(from) = self.from {
            created.insert("$gte", bson::DateTime::from_chrono(from));
        }
        if let Some(until) = self.until {
            created.insert("$lte", bson::DateTime::from_chrono(until));
        }
        if created.is_empty() {
            doc! {}
        } else {
            doc! { "createdAt": created }
        }
    }
}

#[derive(Clone)]
pub struct BillStore {
    bills: Collection<BillDocument>,
}

impl BillStore {
    pub async fn connect(config: &Config) -> Result<BillStore> {
        let client = Client::with_uri_str(&config.mongodb_uri).await?;
        Ok(BillStore {
            bills: client.database(&config.database).collection("Bills"),
        })
    }

    pub async fn insert(&self, mut bill: BillDocument) -> Result<BillDocument> {
        let result = self.bills.insert_one(&bill, None).await?;
        bill.id = result.inserted_id.as_object_id();
        Ok(bill)
    }

    pub async fn get(&self, id: ObjectId) -> Result<Option<BillDocument>> {
        self.bills.find_one(doc! { "_id": id }, None).await
    }

    /// A page of bills, newest first, with the number of bills in the range.
    pub async fn list(
        &self,
        range: CreatedRange,
        limit: i64,
        skip: u64,
    ) -> Result<(Vec<BillDocument>, u64)> {
        let filter = range.filter();
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .limit(limit)
            .skip(skip)
            .build();
        let bills: Vec<BillDocument> = self
            .bills
            .find(filter.clone(), options)
            .await?
            .try_collect()
            .await?;
        let total = self.bills.count_documents(filter, None).await?;
        debug!(returned = bills.len(), total, "listed bills");
        Ok((bills, total))
    }

    pub async fn created_in(&self, range: CreatedRange) -> Result<Vec<BillDocument>> {
        self.bills
            .find(range.filter(), None)
            .await?
            .try_collect()
            .await
    }

    /// Returns false when no bill has this id.
    pub async fn replace(&self, id: ObjectId, bill: &BillDocument) -> Result<bool> {
        let result = self.bills.replace_one(doc! { "_id": id }, bill, None).await?;
        Ok(result.matched_count > 0)
    }

    /// Returns false when no bill has this id.
    pub async fn delete(&self, id: ObjectId) -> Result<bool> {
        let result = self.bills.delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn open_range_matches_everything() {
        assert_eq!(CreatedRange::default().filter(), doc! {});
    }

    #[test]
    fn bounded_range_filters_creation_time() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let range = CreatedRange {
            from: Some(from),
            until: None,
        };
        assert_eq!(
            range.filter(),
            doc! { "createdAt": { "$gte": bson::DateTime::from_chrono(from) } }
        );
    }
}
