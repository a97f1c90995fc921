//! Append-only sales log.
//!
//! A [`Sale`] is written once and never updated or deleted. Seller and
//! product names and unit prices are snapshots taken when the sale was
//! made, so a sale keeps describing the catalog as it was at that moment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "efectivo")]
    Cash,
    #[serde(rename = "tarjeta")]
    Card,
    #[serde(rename = "transferencia")]
    Transfer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleItem {
    #[serde(rename = "productoId")]
    pub product_id: String,
    #[serde(rename = "productoNombre")]
    pub product_name: String,
    #[serde(rename = "cantidad")]
    pub quantity: i64,
    #[serde(rename = "precioUnitario", with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sale {
    pub id: String,
    #[serde(rename = "vendedorId")]
    pub seller_id: String,
    #[serde(rename = "vendedorNombre")]
    pub seller_name: String,
    pub items: Vec<SaleItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    #[serde(rename = "metodoPago")]
    pub payment_method: PaymentMethod,
    #[serde(rename = "fechaCreacion")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSale {
    pub seller_id: String,
    pub seller_name: String,
    pub items: Vec<SaleItem>,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
}

impl NewSale {
    /// Assigns the identifier and creation timestamp.
    pub fn into_sale(self) -> Sale {
        Sale {
            id: Uuid::new_v4().to_string(),
            seller_id: self.seller_id,
            seller_name: self.seller_name,
            items: self.items,
            total: self.total,
            payment_method: self.payment_method,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait SaleStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<()>;

    /// Newest first.
    async fn find_all(&self) -> Result<Vec<Sale>>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Sale>>;
    /// Newest first.
    async fn find_by_seller(&self, seller_id: &str) -> Result<Vec<Sale>>;
    /// Sales created in `[start, end)`, newest first.
    async fn find_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sale>>;

    async fn create(&self, sale: NewSale) -> Result<Sale>;

    async fn count(&self) -> Result<u64>;
}

/// Sales kept in insertion order for the lifetime of the process.
#[derive(Default)]
pub struct InMemorySaleStore {
    sales: RwLock<Vec<Sale>>,
}

impl InMemorySaleStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn select<F>(&self, filter: F) -> Vec<Sale>
    where
        F: Fn(&Sale) -> bool,
    {
        let mut sales: Vec<_> = self
            .sales
            .read()
            .await
            .iter()
            .filter(|s| filter(s))
            .cloned()
            .collect();
        // Stable sort keeps insertion order between equal timestamps.
        sales.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sales
    }
}

#[async_trait]
impl SaleStore for InMemorySaleStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Sale>> {
        Ok(self.select(|_| true).await)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Sale>> {
        Ok(self.sales.read().await.iter().find(|s| s.id == id).cloned())
    }

    async fn find_by_seller(&self, seller_id: &str) -> Result<Vec<Sale>> {
        Ok(self.select(|s| s.seller_id == seller_id).await)
    }

    async fn find_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sale>> {
        Ok(self
            .select(|s| s.created_at >= start && s.created_at < end)
            .await)
    }

    async fn create(&self, sale: NewSale) -> Result<Sale> {
        let sale = sale.into_sale();
        self.sales.write().await.push(sale.clone());
        Ok(sale)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.sales.read().await.len() as u64)
    }
}
