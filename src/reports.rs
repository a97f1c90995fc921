//! Read-side aggregations over the sales log and the dashboard numbers
//! built on top of them.
//!
//! Nothing is cached: every call re-reads the stores. Calendar days follow
//! the server's local time zone, starting at local midnight.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::stores::{Product, ProductStore, Sale, SaleStore, UserStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    /// Local calendar date, `YYYY-MM-DD`.
    #[serde(rename = "fecha")]
    pub date: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    #[serde(rename = "cantidad")]
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopProduct {
    #[serde(rename = "productoId")]
    pub product_id: String,
    #[serde(rename = "productoNombre")]
    pub product_name: String,
    #[serde(rename = "cantidad")]
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_ventas: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub ventas_hoy: Decimal,
    pub productos_activos: usize,
    pub usuarios_activos: u64,
    pub productos_bajo_stock: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedSummary {
    #[serde(flatten)]
    pub stats: DashboardStats,
    pub ventas_hoy_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedStats {
    pub resumen: DetailedSummary,
    pub ventas_por_dia: Vec<DaySummary>,
    pub productos_top_ventas: Vec<TopProduct>,
    pub productos_bajo_stock: Vec<Product>,
}

pub const DETAILED_DAYS: i64 = 7;
pub const DETAILED_TOP: usize = 5;
pub const MAX_REPORT_DAYS: i64 = 366;

/// First instant of `date` in the local time zone, as UTC.
pub fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // Midnight skipped by a DST jump; fall back to the UTC reading.
        None => Utc.from_utc_datetime(&naive),
    }
}

/// Half-open `[midnight, next midnight)` range of a local calendar day.
pub fn day_range(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = date.succ_opt().unwrap_or(NaiveDate::MAX);
    (local_midnight(date), local_midnight(next))
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parses the `startDate`/`endDate` filter (`YYYY-MM-DD`). Both days are
/// included in the returned half-open range.
pub fn date_filter_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let (Some(start), Some(end)) = (
        start.filter(|s| !s.trim().is_empty()),
        end.filter(|s| !s.trim().is_empty()),
    ) else {
        return Err(Error::validation("Se requieren fechas de inicio y fin"));
    };

    let parse = |raw: &str| {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|_| Error::validation(format!("Fecha inválida: {raw}. Use AAAA-MM-DD")))
    };
    let (from, _) = day_range(parse(start)?);
    let (_, until) = day_range(parse(end)?);
    Ok((from, until))
}

pub async fn total_sales(sales: &dyn SaleStore) -> Result<Decimal> {
    sum_totals(&sales.find_all().await?)
}

fn sum_totals(sales: &[Sale]) -> Result<Decimal> {
    sales
        .iter()
        .try_fold(Decimal::ZERO, |acc, sale| acc.checked_add(sale.total))
        .ok_or_else(|| Error::internal("sales total out of range"))
}

pub async fn sales_today(sales: &dyn SaleStore) -> Result<Vec<Sale>> {
    let (start, end) = day_range(today());
    sales.find_by_date_range(start, end).await
}

pub async fn today_total(sales: &dyn SaleStore) -> Result<Decimal> {
    sum_totals(&sales_today(sales).await?)
}

pub async fn count_today(sales: &dyn SaleStore) -> Result<usize> {
    Ok(sales_today(sales).await?.len())
}

pub async fn sales_by_day(sales: &dyn SaleStore, days: i64) -> Result<Vec<DaySummary>> {
    sales_by_day_until(sales, today(), days).await
}

/// One summary per day for the `days` days ending at `last`, oldest first.
/// Issues one range query per day, so `days` is capped at [`MAX_REPORT_DAYS`].
pub async fn sales_by_day_until(
    sales: &dyn SaleStore,
    last: NaiveDate,
    days: i64,
) -> Result<Vec<DaySummary>> {
    let days = days.clamp(0, MAX_REPORT_DAYS);
    let mut report = Vec::with_capacity(days as usize);
    for offset in (0..days).rev() {
        let Some(date) = last.checked_sub_days(chrono::Days::new(offset as u64)) else {
            continue;
        };
        let (start, end) = day_range(date);
        let day = sales.find_by_date_range(start, end).await?;
        report.push(DaySummary {
            date: date.format("%Y-%m-%d").to_string(),
            total: sum_totals(&day)?,
            count: day.len(),
        });
    }
    Ok(report)
}

pub async fn top_products(sales: &dyn SaleStore, limit: usize) -> Result<Vec<TopProduct>> {
    let all = sales.find_all().await?;
    Ok(rank_products(&all, limit))
}

/// Accumulates quantity and revenue per product over every line of every
/// sale. Products with equal quantity keep the order in which they were
/// first seen.
pub fn rank_products(sales: &[Sale], limit: usize) -> Vec<TopProduct> {
    let mut ranked: Vec<TopProduct> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for item in sales.iter().flat_map(|s| &s.items) {
        match index.get(item.product_id.as_str()) {
            Some(&i) => {
                let entry = &mut ranked[i];
                entry.quantity = entry.quantity.saturating_add(item.quantity);
                entry.total = entry.total.saturating_add(item.subtotal);
            }
            None => {
                index.insert(&item.product_id, ranked.len());
                ranked.push(TopProduct {
                    product_id: item.product_id.clone(),
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    total: item.subtotal,
                });
            }
        }
    }

    ranked.sort_by(|a, b| b.quantity.cmp(&a.quantity));
    ranked.truncate(limit);
    ranked
}

/// Headline numbers for the dashboard. The reads are independent and run
/// concurrently.
pub async fn dashboard(
    products: &dyn ProductStore,
    users: &dyn UserStore,
    sales: &dyn SaleStore,
    low_stock_threshold: i64,
) -> Result<DashboardStats> {
    let (total_ventas, ventas_hoy, catalog, usuarios_activos, low_stock) = tokio::try_join!(
        total_sales(sales),
        today_total(sales),
        products.find_all(),
        users.count_active(),
        products.find_low_stock(low_stock_threshold),
    )?;

    Ok(DashboardStats {
        total_ventas,
        ventas_hoy,
        productos_activos: catalog.iter().filter(|p| p.active).count(),
        usuarios_activos,
        productos_bajo_stock: low_stock.len(),
    })
}

pub async fn detailed(
    products: &dyn ProductStore,
    users: &dyn UserStore,
    sales: &dyn SaleStore,
    low_stock_threshold: i64,
) -> Result<DetailedStats> {
    let (stats, by_day, top, today_count, low_stock) = tokio::try_join!(
        dashboard(products, users, sales, low_stock_threshold),
        sales_by_day(sales, DETAILED_DAYS),
        top_products(sales, DETAILED_TOP),
        count_today(sales),
        products.find_low_stock(low_stock_threshold),
    )?;

    Ok(DetailedStats {
        resumen: DetailedSummary {
            stats,
            ventas_hoy_count: today_count,
        },
        ventas_por_dia: by_day,
        productos_top_ventas: top,
        productos_bajo_stock: low_stock,
    })
}
