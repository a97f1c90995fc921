//! Startup seeding.
//!
//! Runs once at boot, before the server accepts requests:
//! - Reference data: the default categories and units, inserted when missing
//! - Catalog: products streamed from a CSV file, only into an empty store
//! - Default admin account, when no user has its email
//!
//! The catalog load mirrors a reader/processor pipeline: one task streams
//! and deserializes rows into a channel, the caller drains the channel into
//! the store.

use std::path::{Path, PathBuf};

use csv_async::{AsyncReaderBuilder, Error as CsvError, Trim};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::Deserializer;
use serde::Deserialize;
use tokio::fs::File;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::stores::{NewProduct, NewUser, ProductStore, Role, UserStore};

const BUFFER_SIZE: usize = 64;

pub const CATEGORIES: [(&str, &str); 8] = [
    ("Bebidas", "Refrescos, aguas, jugos y bebidas en general"),
    ("Botanas", "Papas, frituras, cacahuates y snacks"),
    ("Lácteos", "Leche, queso, yogurt y derivados"),
    ("Panadería", "Pan, tortillas y productos de panadería"),
    ("Limpieza", "Productos de limpieza para el hogar"),
    ("Abarrotes", "Productos básicos de despensa"),
    ("Dulces", "Golosinas, chocolates y dulces"),
    ("Higiene Personal", "Jabones, shampoo y productos de higiene"),
];

pub const UNITS: [(&str, &str); 8] = [
    ("Pieza", "pz"),
    ("Kilogramo", "kg"),
    ("Litro", "L"),
    ("Gramo", "g"),
    ("Mililitro", "ml"),
    ("Paquete", "paq"),
    ("Caja", "cja"),
    ("Docena", "doc"),
];

/// One catalog line. Category and unit are referenced by name.
#[derive(Debug, Deserialize, PartialEq)]
pub struct CatalogRow {
    pub nombre: String,
    #[serde(default)]
    pub descripcion: String,
    pub categoria: String,
    #[serde(deserialize_with = "deserialize_price")]
    pub precio: Decimal,
    pub stock: i64,
    pub unidad: String,
    #[serde(default)]
    pub codigo_barras: Option<String>,
}

fn deserialize_price<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    <Decimal as Deserialize>::deserialize(deserializer)
        .map(|dec| dec.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Seeds everything the configuration asks for.
pub async fn run(state: &AppState, config: &Config) -> Result<()> {
    seed_reference_data(state.products.as_ref()).await?;

    if tokio::fs::try_exists(&config.catalog_csv).await.unwrap_or(false) {
        load_catalog(&config.catalog_csv, state.products.as_ref()).await?;
    } else {
        warn!(path = %config.catalog_csv.display(), "catalog file not found, skipping product seed");
    }

    if config.seed_admin {
        if let Err(e) =
            seed_admin(state.users.as_ref(), &config.admin_email, &config.admin_password).await
        {
            warn!(error = %e, "default admin could not be created");
        }
    }
    Ok(())
}

pub async fn seed_reference_data(store: &dyn ProductStore) -> Result<()> {
    let mut inserted = 0;
    for (name, description) in CATEGORIES {
        if store.find_category_by_name(name).await?.is_none() {
            store.create_category(name, Some(description)).await?;
            inserted += 1;
        }
    }
    for (name, abbreviation) in UNITS {
        if store.find_unit_by_name(name).await?.is_none() {
            store.create_unit(name, abbreviation).await?;
            inserted += 1;
        }
    }
    if inserted > 0 {
        info!(inserted, "reference data seeded");
    }
    Ok(())
}

/// Loads the CSV catalog into an empty product store and returns how many
/// products were inserted. A non-empty store is left alone.
///
/// Malformed CSV aborts the load; rows the store rejects (unknown category,
/// duplicate barcode) are skipped with a warning.
pub async fn load_catalog(path: impl AsRef<Path>, store: &dyn ProductStore) -> Result<usize> {
    if !store.find_all().await?.is_empty() {
        info!("product store not empty, skipping catalog seed");
        return Ok(0);
    }

    let (tx, mut rx) = mpsc::channel(BUFFER_SIZE);
    let reader_handle = tokio::spawn(read_catalog(path.as_ref().to_owned(), tx));

    let mut inserted = 0;
    while let Some(row) = rx.recv().await {
        match insert_row(store, row).await {
            Ok(()) => inserted += 1,
            Err(e) => warn!(error = %e, "catalog row skipped"),
        }
    }

    reader_handle
        .await
        .map_err(|e| Error::internal(format!("catalog reader task failed: {e}")))??;

    info!(inserted, path = %path.as_ref().display(), "catalog seeded");
    Ok(inserted)
}

async fn read_catalog(path: PathBuf, tx: mpsc::Sender<CatalogRow>) -> Result<(), CsvError> {
    let file = File::open(path).await?;
    let mut csv_reader = AsyncReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .create_deserializer(file);

    let mut records = csv_reader.deserialize::<CatalogRow>();
    while let Some(result) = records.next().await {
        if tx.send(result?).await.is_err() {
            break;
        }
    }
    Ok(())
}

async fn insert_row(store: &dyn ProductStore, row: CatalogRow) -> Result<()> {
    let category = store
        .find_category_by_name(&row.categoria)
        .await?
        .ok_or_else(|| Error::validation(format!("Categoría no encontrada: {}", row.categoria)))?;
    let unit = store
        .find_unit_by_name(&row.unidad)
        .await?
        .ok_or_else(|| Error::validation(format!("Unidad no encontrada: {}", row.unidad)))?;

    store
        .create(NewProduct {
            name: row.nombre,
            description: row.descripcion,
            category_id: category.id,
            price: row.precio,
            stock: row.stock,
            unit_id: unit.id,
            barcode: row.codigo_barras.filter(|b| !b.is_empty()),
        })
        .await?;
    Ok(())
}

/// Creates the default admin unless a user already has `email`. Returns
/// whether an account was created.
pub async fn seed_admin(users: &dyn UserStore, email: &str, password: &str) -> Result<bool> {
    if users.find_by_email(email).await?.is_some() {
        return Ok(false);
    }
    let admin = users
        .create(NewUser {
            name: "Administrador".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: Role::Admin,
        })
        .await?;
    info!(email = %admin.email, "default admin created");
    Ok(true)
}
