//! Product catalog storage: products plus the categories and units they
//! reference.
//!
//! Stored normalized (products hold category/unit ids) but always read
//! materialized: every [`Product`] carries its category name and unit
//! abbreviation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};

pub const DUPLICATE_BARCODE: &str = "El código de barras ya existe";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "categoriaId")]
    pub category_id: i64,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "precio", with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub stock: i64,
    #[serde(rename = "unidadId")]
    pub unit_id: i64,
    #[serde(rename = "unidad")]
    pub unit: String,
    #[serde(rename = "codigoBarras")]
    pub barcode: Option<String>,
    #[serde(rename = "activo")]
    pub active: bool,
    #[serde(rename = "fechaCreacion")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "fechaModificacion")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: Option<String>,
    #[serde(rename = "activo")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unit {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "abreviatura")]
    pub abbreviation: String,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub category_id: i64,
    pub price: Decimal,
    pub stock: i64,
    pub unit_id: i64,
    pub barcode: Option<String>,
}

/// Partial product update. `None` leaves a column untouched; for the
/// barcode, `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub price: Option<Decimal>,
    pub stock: Option<i64>,
    pub unit_id: Option<i64>,
    pub barcode: Option<Option<String>>,
    pub active: Option<bool>,
}

impl ProductChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category_id.is_none()
            && self.price.is_none()
            && self.stock.is_none()
            && self.unit_id.is_none()
            && self.barcode.is_none()
            && self.active.is_none()
    }
}

/// Relational side of the system: the store of record for the catalog.
#[async_trait]
pub trait ProductStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<()>;

    /// All products, ordered by name.
    async fn find_all(&self) -> Result<Vec<Product>>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Product>>;
    /// Looks up a product by barcode regardless of its active flag.
    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>>;
    async fn find_by_category(&self, category_id: i64) -> Result<Vec<Product>>;
    /// Active products with `stock < threshold`, lowest stock first.
    async fn find_low_stock(&self, threshold: i64) -> Result<Vec<Product>>;

    async fn create(&self, product: NewProduct) -> Result<Product>;
    /// Returns `None` when the product does not exist. Empty changes are a
    /// no-op that still returns the current product.
    async fn update(&self, id: &str, changes: ProductChanges) -> Result<Option<Product>>;
    /// Additive stock update (`stock = stock + delta`). Returns whether a
    /// product was touched.
    async fn adjust_stock(&self, id: &str, delta: i64) -> Result<bool>;
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn find_all_categories(&self) -> Result<Vec<Category>>;
    async fn find_category(&self, id: i64) -> Result<Option<Category>>;
    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>>;
    async fn create_category(&self, name: &str, description: Option<&str>) -> Result<Category>;

    async fn find_all_units(&self) -> Result<Vec<Unit>>;
    async fn find_unit(&self, id: i64) -> Result<Option<Unit>>;
    async fn find_unit_by_name(&self, name: &str) -> Result<Option<Unit>>;
    async fn create_unit(&self, name: &str, abbreviation: &str) -> Result<Unit>;
}

#[derive(Debug, Clone)]
struct StoredProduct {
    id: String,
    name: String,
    description: String,
    category_id: i64,
    price: Decimal,
    stock: i64,
    unit_id: i64,
    barcode: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct Catalog {
    categories: Vec<Category>,
    units: Vec<Unit>,
    products: HashMap<String, StoredProduct>,
}

impl Catalog {
    /// Resolves the category/unit references. Products whose references
    /// are missing are dropped, like an inner join would.
    fn materialize(&self, stored: &StoredProduct) -> Option<Product> {
        let category = self.categories.iter().find(|c| c.id == stored.category_id)?;
        let unit = self.units.iter().find(|u| u.id == stored.unit_id)?;
        Some(Product {
            id: stored.id.clone(),
            name: stored.name.clone(),
            description: stored.description.clone(),
            category_id: category.id,
            category: category.name.clone(),
            price: stored.price,
            stock: stored.stock,
            unit_id: unit.id,
            unit: unit.abbreviation.clone(),
            barcode: stored.barcode.clone(),
            active: stored.active,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    fn select<F>(&self, filter: F) -> Vec<Product>
    where
        F: Fn(&StoredProduct) -> bool,
    {
        let mut products: Vec<_> = self
            .products
            .values()
            .filter(|p| filter(p))
            .filter_map(|p| self.materialize(p))
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        products
    }

    fn check_references(&self, category_id: i64, unit_id: i64) -> Result<()> {
        if !self.categories.iter().any(|c| c.id == category_id) {
            return Err(Error::validation(format!("Categoría no encontrada: {category_id}")));
        }
        if !self.units.iter().any(|u| u.id == unit_id) {
            return Err(Error::validation(format!("Unidad no encontrada: {unit_id}")));
        }
        Ok(())
    }

    fn check_barcode(&self, barcode: Option<&str>, owner: Option<&str>) -> Result<()> {
        let Some(barcode) = barcode else {
            return Ok(());
        };
        let taken = self
            .products
            .values()
            .any(|p| p.barcode.as_deref() == Some(barcode) && Some(p.id.as_str()) != owner);
        if taken {
            return Err(Error::validation(DUPLICATE_BARCODE));
        }
        Ok(())
    }
}

/// Process-lifetime catalog used when no relational database is configured.
#[derive(Default)]
pub struct InMemoryProductStore {
    catalog: RwLock<Catalog>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Product>> {
        Ok(self.catalog.read().await.select(|_| true))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Product>> {
        let catalog = self.catalog.read().await;
        Ok(catalog.products.get(id).and_then(|p| catalog.materialize(p)))
    }

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>> {
        let catalog = self.catalog.read().await;
        Ok(catalog
            .products
            .values()
            .find(|p| p.barcode.as_deref() == Some(barcode))
            .and_then(|p| catalog.materialize(p)))
    }

    async fn find_by_category(&self, category_id: i64) -> Result<Vec<Product>> {
        Ok(self
            .catalog
            .read()
            .await
            .select(|p| p.category_id == category_id))
    }

    async fn find_low_stock(&self, threshold: i64) -> Result<Vec<Product>> {
        let mut products = self
            .catalog
            .read()
            .await
            .select(|p| p.active && p.stock < threshold);
        products.sort_by_key(|p| p.stock);
        Ok(products)
    }

    async fn create(&self, product: NewProduct) -> Result<Product> {
        let mut catalog = self.catalog.write().await;
        catalog.check_references(product.category_id, product.unit_id)?;
        catalog.check_barcode(product.barcode.as_deref(), None)?;

        let now = Utc::now();
        let stored = StoredProduct {
            id: Uuid::new_v4().to_string(),
            name: product.name,
            description: product.description,
            category_id: product.category_id,
            price: product.price,
            stock: product.stock,
            unit_id: product.unit_id,
            barcode: product.barcode,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let created = catalog
            .materialize(&stored)
            .ok_or_else(|| Error::internal("product references vanished during insert"))?;
        catalog.products.insert(stored.id.clone(), stored);
        Ok(created)
    }

    async fn update(&self, id: &str, changes: ProductChanges) -> Result<Option<Product>> {
        let mut catalog = self.catalog.write().await;
        let Some(current) = catalog.products.get(id).cloned() else {
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(catalog.materialize(&current));
        }

        catalog.check_references(
            changes.category_id.unwrap_or(current.category_id),
            changes.unit_id.unwrap_or(current.unit_id),
        )?;
        if let Some(barcode) = &changes.barcode {
            catalog.check_barcode(barcode.as_deref(), Some(id))?;
        }

        let mut updated = current;
        if let Some(name) = changes.name {
            updated.name = name;
        }
        if let Some(description) = changes.description {
            updated.description = description;
        }
        if let Some(category_id) = changes.category_id {
            updated.category_id = category_id;
        }
        if let Some(price) = changes.price {
            updated.price = price;
        }
        if let Some(stock) = changes.stock {
            updated.stock = stock;
        }
        if let Some(unit_id) = changes.unit_id {
            updated.unit_id = unit_id;
        }
        if let Some(barcode) = changes.barcode {
            updated.barcode = barcode;
        }
        if let Some(active) = changes.active {
            updated.active = active;
        }
        updated.updated_at = Utc::now();

        let product = catalog.materialize(&updated);
        catalog.products.insert(updated.id.clone(), updated);
        Ok(product)
    }

    async fn adjust_stock(&self, id: &str, delta: i64) -> Result<bool> {
        let mut catalog = self.catalog.write().await;
        match catalog.products.get_mut(id) {
            Some(product) => {
                product.stock += delta;
                product.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.catalog.write().await.products.remove(id).is_some())
    }

    async fn find_all_categories(&self) -> Result<Vec<Category>> {
        let mut categories = self.catalog.read().await.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn find_category(&self, id: i64) -> Result<Option<Category>> {
        let catalog = self.catalog.read().await;
        Ok(catalog.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let catalog = self.catalog.read().await;
        Ok(catalog.categories.iter().find(|c| c.name == name).cloned())
    }

    async fn create_category(&self, name: &str, description: Option<&str>) -> Result<Category> {
        let mut catalog = self.catalog.write().await;
        if catalog.categories.iter().any(|c| c.name == name) {
            return Err(Error::validation("La categoría ya existe"));
        }
        let category = Category {
            id: catalog.categories.len() as i64 + 1,
            name: name.to_string(),
            description: description.map(str::to_string),
            active: true,
        };
        catalog.categories.push(category.clone());
        Ok(category)
    }

    async fn find_all_units(&self) -> Result<Vec<Unit>> {
        let mut units = self.catalog.read().await.units.clone();
        units.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(units)
    }

    async fn find_unit(&self, id: i64) -> Result<Option<Unit>> {
        let catalog = self.catalog.read().await;
        Ok(catalog.units.iter().find(|u| u.id == id).cloned())
    }

    async fn find_unit_by_name(&self, name: &str) -> Result<Option<Unit>> {
        let catalog = self.catalog.read().await;
        Ok(catalog.units.iter().find(|u| u.name == name).cloned())
    }

    async fn create_unit(&self, name: &str, abbreviation: &str) -> Result<Unit> {
        let mut catalog = self.catalog.write().await;
        if catalog.units.iter().any(|u| u.name == name) {
            return Err(Error::validation("La unidad ya existe"));
        }
        let unit = Unit {
            id: catalog.units.len() as i64 + 1,
            name: name.to_string(),
            abbreviation: abbreviation.to_string(),
        };
        catalog.units.push(unit.clone());
        Ok(unit)
    }
}
