//! MySQL-backed product catalog.
//!
//! Three normalized tables (`categorias`, `unidades`, `productos`) linked by
//! foreign keys. Every product read joins the category name and unit
//! abbreviation back in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    FromRow, MySql, QueryBuilder,
};
use tracing::info;
use uuid::Uuid;

use super::products::{
    Category, NewProduct, Product, ProductChanges, ProductStore, Unit, DUPLICATE_BARCODE,
};
use crate::error::{Error, Result};

const MAX_CONNECTIONS: u32 = 10;

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS categorias (
        id INT AUTO_INCREMENT PRIMARY KEY,
        nombre VARCHAR(100) NOT NULL UNIQUE,
        descripcion TEXT,
        activo BOOLEAN NOT NULL DEFAULT TRUE,
        fecha_creacion TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        fecha_modificacion TIMESTAMP DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci",
    "CREATE TABLE IF NOT EXISTS unidades (
        id INT AUTO_INCREMENT PRIMARY KEY,
        nombre VARCHAR(50) NOT NULL UNIQUE,
        abreviatura VARCHAR(10) NOT NULL,
        fecha_creacion TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci",
    "CREATE TABLE IF NOT EXISTS productos (
        id VARCHAR(36) PRIMARY KEY,
        nombre VARCHAR(200) NOT NULL,
        descripcion TEXT,
        categoria_id INT NOT NULL,
        precio DECIMAL(10, 2) NOT NULL,
        stock BIGINT NOT NULL DEFAULT 0,
        unidad_id INT NOT NULL,
        codigo_barras VARCHAR(50) UNIQUE,
        activo BOOLEAN NOT NULL DEFAULT TRUE,
        fecha_creacion TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        fecha_modificacion TIMESTAMP DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
        FOREIGN KEY (categoria_id) REFERENCES categorias(id) ON UPDATE CASCADE,
        FOREIGN KEY (unidad_id) REFERENCES unidades(id) ON UPDATE CASCADE,
        INDEX idx_nombre (nombre),
        INDEX idx_categoria (categoria_id),
        INDEX idx_activo (activo)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci",
];

const PRODUCT_SELECT: &str = "SELECT
        p.id, p.nombre, p.descripcion, p.precio, p.stock,
        p.codigo_barras, p.activo, p.fecha_creacion, p.fecha_modificacion,
        p.categoria_id, c.nombre AS categoria_nombre,
        p.unidad_id, u.abreviatura AS unidad_abreviatura
    FROM productos p
    INNER JOIN categorias c ON p.categoria_id = c.id
    INNER JOIN unidades u ON p.unidad_id = u.id";

#[derive(FromRow)]
struct ProductRow {
    id: String,
    nombre: String,
    descripcion: Option<String>,
    precio: Decimal,
    stock: i64,
    codigo_barras: Option<String>,
    activo: bool,
    fecha_creacion: DateTime<Utc>,
    fecha_modificacion: DateTime<Utc>,
    categoria_id: i32,
    categoria_nombre: String,
    unidad_id: i32,
    unidad_abreviatura: String,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.nombre,
            description: row.descripcion.unwrap_or_default(),
            category_id: row.categoria_id.into(),
            category: row.categoria_nombre,
            price: row.precio,
            stock: row.stock,
            unit_id: row.unidad_id.into(),
            unit: row.unidad_abreviatura,
            barcode: row.codigo_barras,
            active: row.activo,
            created_at: row.fecha_creacion,
            updated_at: row.fecha_modificacion,
        }
    }
}

#[derive(FromRow)]
struct CategoryRow {
    id: i32,
    nombre: String,
    descripcion: Option<String>,
    activo: bool,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id.into(),
            name: row.nombre,
            description: row.descripcion,
            active: row.activo,
        }
    }
}

#[derive(FromRow)]
struct UnitRow {
    id: i32,
    nombre: String,
    abreviatura: String,
}

impl From<UnitRow> for Unit {
    fn from(row: UnitRow) -> Self {
        Unit {
            id: row.id.into(),
            name: row.nombre,
            abbreviation: row.abreviatura,
        }
    }
}

/// Maps a unique-index violation to a validation error carrying `message`.
fn on_unique_violation(err: sqlx::Error, message: &str) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::validation(message),
        _ => Error::Database(err),
    }
}

pub struct MySqlProductStore {
    pool: MySqlPool,
}

impl MySqlProductStore {
    /// Connects and creates the schema if it does not exist yet.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(url)
            .await?;
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    async fn create_tables(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("MySQL schema ready");
        Ok(())
    }

    async fn select(&self, clause: &str, bind: Option<SelectBind<'_>>) -> Result<Vec<Product>> {
        let sql = format!("{PRODUCT_SELECT} {clause}");
        let query = sqlx::query_as::<_, ProductRow>(&sql);
        let query = match bind {
            Some(SelectBind::Text(value)) => query.bind(value),
            Some(SelectBind::Int(value)) => query.bind(value),
            None => query,
        };
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }
}

enum SelectBind<'a> {
    Text(&'a str),
    Int(i64),
}

#[async_trait]
impl ProductStore for MySqlProductStore {
    fn backend(&self) -> &'static str {
        "mysql"
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Product>> {
        self.select("ORDER BY p.nombre ASC", None).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Product>> {
        let products = self
            .select("WHERE p.id = ?", Some(SelectBind::Text(id)))
            .await?;
        Ok(products.into_iter().next())
    }

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>> {
        let products = self
            .select("WHERE p.codigo_barras = ?", Some(SelectBind::Text(barcode)))
            .await?;
        Ok(products.into_iter().next())
    }

    async fn find_by_category(&self, category_id: i64) -> Result<Vec<Product>> {
        self.select(
            "WHERE p.categoria_id = ? ORDER BY p.nombre ASC",
            Some(SelectBind::Int(category_id)),
        )
        .await
    }

    async fn find_low_stock(&self, threshold: i64) -> Result<Vec<Product>> {
        self.select(
            "WHERE p.stock < ? AND p.activo = TRUE ORDER BY p.stock ASC, p.nombre ASC",
            Some(SelectBind::Int(threshold)),
        )
        .await
    }

    async fn create(&self, product: NewProduct) -> Result<Product> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO productos
                (id, nombre, descripcion, categoria_id, precio, stock, unidad_id, codigo_barras)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.category_id)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.unit_id)
        .bind(&product.barcode)
        .execute(&self.pool)
        .await
        .map_err(|e| on_unique_violation(e, DUPLICATE_BARCODE))?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| Error::internal(format!("product {id} missing right after insert")))
    }

    async fn update(&self, id: &str, changes: ProductChanges) -> Result<Option<Product>> {
        if changes.is_empty() {
            return self.find_by_id(id).await;
        }

        let mut builder = QueryBuilder::<MySql>::new("UPDATE productos SET ");
        let mut set = builder.separated(", ");
        if let Some(name) = changes.name {
            set.push("nombre = ").push_bind_unseparated(name);
        }
        if let Some(description) = changes.description {
            set.push("descripcion = ").push_bind_unseparated(description);
        }
        if let Some(category_id) = changes.category_id {
            set.push("categoria_id = ").push_bind_unseparated(category_id);
        }
        if let Some(price) = changes.price {
            set.push("precio = ").push_bind_unseparated(price);
        }
        if let Some(stock) = changes.stock {
            set.push("stock = ").push_bind_unseparated(stock);
        }
        if let Some(unit_id) = changes.unit_id {
            set.push("unidad_id = ").push_bind_unseparated(unit_id);
        }
        if let Some(barcode) = changes.barcode {
            set.push("codigo_barras = ").push_bind_unseparated(barcode);
        }
        if let Some(active) = changes.active {
            set.push("activo = ").push_bind_unseparated(active);
        }
        builder.push(" WHERE id = ").push_bind(id);

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| on_unique_violation(e, DUPLICATE_BARCODE))?;

        self.find_by_id(id).await
    }

    async fn adjust_stock(&self, id: &str, delta: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE productos SET stock = stock + ? WHERE id = ?")
            .bind(delta)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM productos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_all_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, nombre, descripcion, activo FROM categorias ORDER BY nombre ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn find_category(&self, id: i64) -> Result<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, nombre, descripcion, activo FROM categorias WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Category::from))
    }

    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, nombre, descripcion, activo FROM categorias WHERE nombre = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Category::from))
    }

    async fn create_category(&self, name: &str, description: Option<&str>) -> Result<Category> {
        let result = sqlx::query("INSERT INTO categorias (nombre, descripcion) VALUES (?, ?)")
            .bind(name)
            .bind(description)
            .execute(&self.pool)
            .await
            .map_err(|e| on_unique_violation(e, "La categoría ya existe"))?;

        Ok(Category {
            id: result.last_insert_id() as i64,
            name: name.to_string(),
            description: description.map(str::to_string),
            active: true,
        })
    }

    async fn find_all_units(&self) -> Result<Vec<Unit>> {
        let rows = sqlx::query_as::<_, UnitRow>(
            "SELECT id, nombre, abreviatura FROM unidades ORDER BY nombre ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Unit::from).collect())
    }

    async fn find_unit(&self, id: i64) -> Result<Option<Unit>> {
        let row = sqlx::query_as::<_, UnitRow>(
            "SELECT id, nombre, abreviatura FROM unidades WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Unit::from))
    }

    async fn find_unit_by_name(&self, name: &str) -> Result<Option<Unit>> {
        let row = sqlx::query_as::<_, UnitRow>(
            "SELECT id, nombre, abreviatura FROM unidades WHERE nombre = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Unit::from))
    }

    async fn create_unit(&self, name: &str, abbreviation: &str) -> Result<Unit> {
        let result = sqlx::query("INSERT INTO unidades (nombre, abreviatura) VALUES (?, ?)")
            .bind(name)
            .bind(abbreviation)
            .execute(&self.pool)
            .await
            .map_err(|e| on_unique_violation(e, "La unidad ya existe"))?;

        Ok(Unit {
            id: result.last_insert_id() as i64,
            name: name.to_string(),
            abbreviation: abbreviation.to_string(),
        })
    }
}
