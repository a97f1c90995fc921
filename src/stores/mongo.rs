//! MongoDB-backed account and sales collections (`users`, `sales`).
//!
//! Documents are denormalized and queried by plain field filters. Money is
//! stored as decimal strings and timestamps as BSON dates so that range
//! queries compare chronologically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::{
    bson::{
        doc, serde_helpers::chrono_datetime_as_bson_datetime, DateTime as BsonDateTime, Document,
    },
    Client, Collection, Cursor, Database,
};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio_stream::StreamExt;
use tracing::info;

use super::sales::{NewSale, PaymentMethod, Sale, SaleItem, SaleStore};
use super::users::{
    apply_changes, normalize_email, sort_by_name, HashedChanges, NewUser, Role, User, UserChanges,
    UserStore, DUPLICATE_EMAIL,
};
use crate::error::{Error, Result};
use crate::password;

const USERS: &str = "users";
const SALES: &str = "sales";

pub async fn connect(uri: &str, database: &str) -> Result<Database> {
    let client = Client::with_uri_str(uri).await?;
    let database = client.database(database);
    database.run_command(doc! { "ping": 1 }).await?;
    info!(database = database.name(), "MongoDB connected");
    Ok(database)
}

async fn collect<T, U>(mut cursor: Cursor<T>) -> Result<Vec<U>>
where
    T: DeserializeOwned + Send + Sync + Unpin,
    U: From<T>,
{
    let mut items = Vec::new();
    while let Some(document) = cursor.next().await {
        items.push(U::from(document?));
    }
    Ok(items)
}

#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "nombre")]
    name: String,
    email: String,
    password: String,
    #[serde(rename = "rol")]
    role: Role,
    #[serde(rename = "activo")]
    active: bool,
    #[serde(rename = "fechaCreacion", with = "chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(rename = "fechaModificacion", with = "chrono_datetime_as_bson_datetime")]
    updated_at: DateTime<Utc>,
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        User {
            id: doc.id,
            name: doc.name,
            email: doc.email,
            password_hash: doc.password,
            role: doc.role,
            active: doc.active,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        UserDocument {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            password: user.password_hash.clone(),
            role: user.role,
            active: user.active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

pub struct MongoUserStore {
    database: Database,
    users: Collection<UserDocument>,
}

impl MongoUserStore {
    pub fn new(database: &Database) -> Self {
        Self {
            database: database.clone(),
            users: database.collection(USERS),
        }
    }

    async fn find_many(&self, filter: Document) -> Result<Vec<User>> {
        let cursor = self.users.find(filter).await?;
        let mut users: Vec<User> = collect(cursor).await?;
        sort_by_name(&mut users);
        Ok(users)
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> Result<()> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<User>> {
        self.find_many(doc! {}).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .find_one(doc! { "_id": id })
            .await?
            .map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .find_one(doc! { "email": normalize_email(email) })
            .await?
            .map(User::from))
    }

    async fn find_active(&self) -> Result<Vec<User>> {
        self.find_many(doc! { "activo": true }).await
    }

    async fn create(&self, user: NewUser) -> Result<User> {
        if self.find_by_email(&user.email).await?.is_some() {
            return Err(Error::validation(DUPLICATE_EMAIL));
        }

        let now = Utc::now();
        let created = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: user.name,
            email: normalize_email(&user.email),
            password_hash: password::hash_password(&user.password)?,
            role: user.role,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.users.insert_one(UserDocument::from(&created)).await?;
        Ok(created)
    }

    async fn update(&self, id: &str, changes: UserChanges) -> Result<Option<User>> {
        let Some(mut user) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        let changes = HashedChanges::new(changes)?;
        if let Some(email) = changes.email() {
            if let Some(owner) = self.find_by_email(&email).await? {
                if owner.id != id {
                    return Err(Error::validation(DUPLICATE_EMAIL));
                }
            }
        }
        apply_changes(&mut user, changes);

        self.users
            .replace_one(doc! { "_id": id }, UserDocument::from(&user))
            .await?;
        Ok(Some(user))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = self.users.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.users.count_documents(doc! {}).await?)
    }

    async fn count_active(&self) -> Result<u64> {
        Ok(self.users.count_documents(doc! { "activo": true }).await?)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SaleItemDocument {
    #[serde(rename = "productoId")]
    product_id: String,
    #[serde(rename = "productoNombre")]
    product_name: String,
    #[serde(rename = "cantidad")]
    quantity: i64,
    #[serde(rename = "precioUnitario")]
    unit_price: Decimal,
    subtotal: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
struct SaleDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "vendedorId")]
    seller_id: String,
    #[serde(rename = "vendedorNombre")]
    seller_name: String,
    items: Vec<SaleItemDocument>,
    total: Decimal,
    #[serde(rename = "metodoPago")]
    payment_method: PaymentMethod,
    #[serde(rename = "fechaCreacion", with = "chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

impl From<SaleDocument> for Sale {
    fn from(doc: SaleDocument) -> Self {
        Sale {
            id: doc.id,
            seller_id: doc.seller_id,
            seller_name: doc.seller_name,
            items: doc
                .items
                .into_iter()
                .map(|item| SaleItem {
                    product_id: item.product_id,
                    product_name: item.product_name,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    subtotal: item.subtotal,
                })
                .collect(),
            total: doc.total,
            payment_method: doc.payment_method,
            created_at: doc.created_at,
        }
    }
}

impl From<&Sale> for SaleDocument {
    fn from(sale: &Sale) -> Self {
        SaleDocument {
            id: sale.id.clone(),
            seller_id: sale.seller_id.clone(),
            seller_name: sale.seller_name.clone(),
            items: sale
                .items
                .iter()
                .map(|item| SaleItemDocument {
                    product_id: item.product_id.clone(),
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    subtotal: item.subtotal,
                })
                .collect(),
            total: sale.total,
            payment_method: sale.payment_method,
            created_at: sale.created_at,
        }
    }
}

pub struct MongoSaleStore {
    database: Database,
    sales: Collection<SaleDocument>,
}

impl MongoSaleStore {
    pub fn new(database: &Database) -> Self {
        Self {
            database: database.clone(),
            sales: database.collection(SALES),
        }
    }

    async fn find_newest_first(&self, filter: Document) -> Result<Vec<Sale>> {
        let cursor = self
            .sales
            .find(filter)
            .sort(doc! { "fechaCreacion": -1 })
            .await?;
        collect(cursor).await
    }
}

#[async_trait]
impl SaleStore for MongoSaleStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> Result<()> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Sale>> {
        self.find_newest_first(doc! {}).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Sale>> {
        Ok(self
            .sales
            .find_one(doc! { "_id": id })
            .await?
            .map(Sale::from))
    }

    async fn find_by_seller(&self, seller_id: &str) -> Result<Vec<Sale>> {
        self.find_newest_first(doc! { "vendedorId": seller_id }).await
    }

    async fn find_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sale>> {
        self.find_newest_first(doc! {
            "fechaCreacion": {
                "$gte": BsonDateTime::from_chrono(start),
                "$lt": BsonDateTime::from_chrono(end),
            }
        })
        .await
    }

    async fn create(&self, sale: NewSale) -> Result<Sale> {
        let sale = sale.into_sale();
        self.sales.insert_one(SaleDocument::from(&sale)).await?;
        Ok(sale)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.sales.count_documents(doc! {}).await?)
    }
}
