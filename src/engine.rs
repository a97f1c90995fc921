//! The sale workflow: validate a cart against the catalog, price it,
//! decrement stock and record the sale.
//!
//! The catalog and the sales log live in independent stores, so this is a
//! best-effort sequence of writes, not a transaction:
//! - Every line is validated before anything is written. A rejected cart
//!   leaves all stock untouched.
//! - Stock decrements are applied one line at a time, then the sale is
//!   written. A failure after the first decrement is reported as a server
//!   error and already-applied decrements stay applied.
//! - Validation reads and decrement writes are not serialized, so two
//!   concurrent sales can both pass the stock check for the last units.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::stores::{NewSale, PaymentMethod, ProductStore, Sale, SaleItem, SaleStore, UserProfile};

const AMOUNT_OUT_OF_RANGE: &str = "El importe de la venta excede el máximo permitido";

/// One requested line of a cart.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Clone)]
pub struct Engine {
    products: Arc<dyn ProductStore>,
    sales: Arc<dyn SaleStore>,
}

impl Engine {
    pub fn new(products: Arc<dyn ProductStore>, sales: Arc<dyn SaleStore>) -> Self {
        Self { products, sales }
    }

    /// Runs the whole workflow for `seller` and returns the persisted sale.
    pub async fn process_sale(
        &self,
        seller: &UserProfile,
        cart: &[CartLine],
        payment_method: PaymentMethod,
    ) -> Result<Sale> {
        let items = self.validate_and_price(cart).await?;
        let total = items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.subtotal))
            .ok_or_else(|| Error::validation(AMOUNT_OUT_OF_RANGE))?;

        self.decrement_stock(&items).await?;

        let sale = self
            .sales
            .create(NewSale {
                seller_id: seller.id.clone(),
                seller_name: seller.name.clone(),
                items,
                total,
                payment_method,
            })
            .await
            .inspect_err(|e| {
                error!(
                    seller_id = %seller.id,
                    %total,
                    error = %e,
                    "sale record failed after stock was decremented"
                );
            })?;

        info!(sale_id = %sale.id, seller_id = %sale.seller_id, total = %sale.total, "sale recorded");
        Ok(sale)
    }

    /// Checks every line in order and snapshots name and price of each
    /// product. Nothing is written.
    async fn validate_and_price(&self, cart: &[CartLine]) -> Result<Vec<SaleItem>> {
        if cart.is_empty() {
            return Err(Error::validation("Se requieren items para la venta"));
        }

        let mut items = Vec::with_capacity(cart.len());
        for line in cart {
            if line.quantity <= 0 {
                return Err(Error::validation(format!(
                    "Cantidad inválida para el producto {}",
                    line.product_id
                )));
            }

            let product = self
                .products
                .find_by_id(&line.product_id)
                .await?
                .ok_or_else(|| {
                    Error::validation(format!("Producto no encontrado: {}", line.product_id))
                })?;

            if !product.active {
                return Err(Error::validation(format!(
                    "Producto no disponible: {}",
                    product.name
                )));
            }
            if product.stock < line.quantity {
                return Err(Error::validation(format!(
                    "Stock insuficiente para {}. Disponible: {}",
                    product.name, product.stock
                )));
            }

            let subtotal = product
                .price
                .checked_mul(Decimal::from(line.quantity))
                .ok_or_else(|| Error::validation(AMOUNT_OUT_OF_RANGE))?;
            items.push(SaleItem {
                subtotal,
                product_id: product.id,
                product_name: product.name,
                quantity: line.quantity,
                unit_price: product.price,
            });
        }
        Ok(items)
    }

    async fn decrement_stock(&self, items: &[SaleItem]) -> Result<()> {
        for item in items {
            let touched = self
                .products
                .adjust_stock(&item.product_id, -item.quantity)
                .await?;
            if !touched {
                return Err(Error::internal(format!(
                    "stock update for product {} affected no rows",
                    item.product_id
                )));
            }
        }
        Ok(())
    }
}
