//! Storage layer for the point-of-sale system. Provides:
//! - The product catalog, the relational store of record ([`ProductStore`])
//! - User accounts, in the document store ([`UserStore`])
//! - The append-only sales log, in the document store ([`SaleStore`])
//!
//! Each store is a trait with an in-memory implementation and a database
//! one (MySQL for products, MongoDB for users and sales). Which one runs is
//! decided once at startup.

mod mongo;
mod mysql;
mod products;
mod sales;
mod users;

pub use mongo::{connect as connect_mongo, MongoSaleStore, MongoUserStore};
pub use mysql::MySqlProductStore;
pub use products::{
    Category, InMemoryProductStore, NewProduct, Product, ProductChanges, ProductStore, Unit,
    DUPLICATE_BARCODE,
};
pub use sales::{InMemorySaleStore, NewSale, PaymentMethod, Sale, SaleItem, SaleStore};
pub use users::{
    normalize_email, InMemoryUserStore, NewUser, Role, User, UserChanges, UserProfile, UserStore,
    DUPLICATE_EMAIL,
};
