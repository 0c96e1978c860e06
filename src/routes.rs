use crate::allocation::round_shares;
use crate::bill::Bill;
use crate::error::ApiError;
use crate::participants::prune_stale_indices;
use crate::schemas::{BillDocument, BillView, ExtractedItem};
use crate::stats::{month_bounds, monthly_stats};
use crate::store::{BillStore, CreatedRange};
use crate::validation::{validate_for_persistence, Rejected};
use actix_web::{delete, get, post, put, web, HttpResponse};
use bson::oid::ObjectId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

pub fn configure(cfg: &mut web::ServiceConfig) {
    // `/bills/stats` must be registered ahead of `/bills/{id}`.
    cfg.service(health)
        .service(split_bill)
        .service(create_bill)
        .service(list_bills)
        .service(get_stats)
        .service(get_bill)
        .service(update_bill)
        .service(delete_bill)
        .service(import_items);
}

fn parse_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::InvalidId(id.to_string()))
}

// Accepts either a full RFC 3339 timestamp or a plain `YYYY-MM-DD` date.
fn parse_date(value: &str, end_of_day: bool) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("invalid date: {value}")))?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|time| time.and_utc())
        .ok_or_else(|| ApiError::BadRequest(format!("invalid date: {value}")))
}

/// Runs the persistence gate over a submitted bill.
fn prepare(bill: Bill, now: DateTime<Utc>) -> Result<(BillDocument, Vec<Rejected>), ApiError> {
    if bill.participants.is_empty() {
        return Err(ApiError::BadRequest(
            "Missing required fields: people".to_string(),
        ));
    }
    let name = bill.display_name(now.date_naive());
    let items = prune_stale_indices(bill.items, bill.participants.len());
    let validation = validate_for_persistence(items);
    if validation.valid.is_empty() {
        return Err(ApiError::BadRequest(
            "A bill needs at least one complete item".to_string(),
        ));
    }
    let document = BillDocument {
        id: None,
        name,
        people: bill.participants,
        items: validation.valid,
        total: validation.total,
        created_at: now,
        updated_at: now,
    };
    Ok((document, validation.rejected))
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "OK",
        "message": "Bill splitter API is running"
    }))
}

#[post("/split")]
async fn split_bill(bill: web::Json<Bill>) -> HttpResponse {
    let mut bill = bill.into_inner();
    bill.items = prune_stale_indices(bill.items, bill.participants.len());
    let results = bill.split();
    let rounded = round_shares(&results, 2);
    HttpResponse::Ok().json(json!({
        "results": results,
        "total": bill.total(),
        "rounded": rounded,
    }))
}

#[post("/bills")]
async fn create_bill(
    store: web::Data<BillStore>,
    bill: web::Json<Bill>,
) -> Result<HttpResponse, ApiError> {
    let (document, rejected) = prepare(bill.into_inner(), Utc::now())?;
    let document = store.insert(document).await?;
    info!(id = ?document.id, total = document.total, rejected = rejected.len(), "bill created");
    Ok(HttpResponse::Created().json(json!({
        "message": "Bill created successfully",
        "bill": BillView::from(document),
        "rejected": rejected,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    limit: Option<i64>,
    skip: Option<u64>,
}

#[get("/bills")]
async fn list_bills(
    store: web::Data<BillStore>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let range = CreatedRange {
        from: query
            .start_date
            .as_deref()
            .map(|date| parse_date(date, false))
            .transpose()?,
        until: query
            .end_date
            .as_deref()
            .map(|date| parse_date(date, true))
            .transpose()?,
    };
    let limit = query.limit.unwrap_or(50).max(1);
    let skip = query.skip.unwrap_or(0);
    let (bills, total) = store.list(range, limit, skip).await?;
    let has_more = total > skip + bills.len() as u64;
    let bills: Vec<BillView> = bills.into_iter().map(BillView::from).collect();
    Ok(HttpResponse::Ok().json(json!({
        "bills": bills,
        "total": total,
        "hasMore": has_more,
    })))
}

#[derive(Deserialize)]
struct StatsQuery {
    year: Option<i32>,
    month: Option<u32>,
}

#[get("/bills/stats")]
async fn get_stats(
    store: web::Data<BillStore>,
    query: web::Query<StatsQuery>,
) -> Result<HttpResponse, ApiError> {
    let range = match (query.year, query.month) {
        (Some(year), Some(month)) => {
            let (from, until) = month_bounds(year, month)
                .ok_or_else(|| ApiError::BadRequest(format!("invalid month: {year}-{month}")))?;
            CreatedRange {
                from: Some(from),
                until: Some(until),
            }
        }
        _ => CreatedRange::default(),
    };
    let bills = store.created_in(range).await?;
    let stats = monthly_stats(bills.iter().map(|bill| (bill.created_at, bill.total)));
    Ok(HttpResponse::Ok().json(json!({ "stats": stats })))
}

#[get("/bills/{id}")]
async fn get_bill(
    store: web::Data<BillStore>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&id)?;
    match store.get(id).await? {
        Some(bill) => Ok(HttpResponse::Ok().json(json!({ "bill": BillView::from(bill) }))),
        None => Err(ApiError::NotFound),
    }
}

#[put("/bills/{id}")]
async fn update_bill(
    store: web::Data<BillStore>,
    id: web::Path<String>,
    bill: web::Json<Bill>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&id)?;
    let existing = store.get(id).await?.ok_or(ApiError::NotFound)?;
    let (mut document, rejected) = prepare(bill.into_inner(), Utc::now())?;
    document.id = Some(id);
    document.created_at = existing.created_at;
    if !store.replace(id, &document).await? {
        return Err(ApiError::NotFound);
    }
    info!(%id, total = document.total, "bill updated");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Bill updated successfully",
        "bill": BillView::from(document),
        "rejected": rejected,
    })))
}

#[delete("/bills/{id}")]
async fn delete_bill(
    store: web::Data<BillStore>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&id)?;
    if store.delete(id).await? {
        info!(%id, "bill deleted");
        Ok(HttpResponse::Ok().json(json!({ "message": "Bill deleted successfully" })))
    } else {
        Err(ApiError::NotFound)
    }
}

#[derive(Deserialize)]
struct ImportPayload {
    items: Vec<ExtractedItem>,
}

#[post("/bills/{id}/items/import")]
async fn import_items(
    store: web::Data<BillStore>,
    id: web::Path<String>,
    payload: web::Json<ImportPayload>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&id)?;
    let existing = store.get(id).await?.ok_or(ApiError::NotFound)?;
    let mut bill = Bill {
        name: existing.name,
        participants: existing.people,
        items: existing.items,
    };
    let added = bill.import_items(payload.into_inner().items);
    let (mut document, rejected) = prepare(bill, Utc::now())?;
    document.id = Some(id);
    document.created_at = existing.created_at;
    if !store.replace(id, &document).await? {
        return Err(ApiError::NotFound);
    }
    info!(%id, added, rejected = rejected.len(), "items imported");
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Added {added} items"),
        "bill": BillView::from(document),
        "rejected": rejected,
    })))
}
