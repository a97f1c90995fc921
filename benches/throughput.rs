use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use rust_decimal_macros::dec;
use tokio::runtime::Runtime;

use tiendita_pos::reports;
use tiendita_pos::seed;
use tiendita_pos::stores::{
    InMemoryProductStore, InMemorySaleStore, InMemoryUserStore, NewProduct, NewUser,
    PaymentMethod, ProductStore, Role, Sale, UserProfile, UserStore,
};
use tiendita_pos::{CartLine, Engine};

const CART_SIZE: usize = 10;
const REPORT_SALES: usize = 10_000;

struct Setup {
    engine: Engine,
    seller: UserProfile,
    cart: Vec<CartLine>,
}

async fn setup() -> Setup {
    let products = Arc::new(InMemoryProductStore::new());
    let sales = Arc::new(InMemorySaleStore::new());
    let users = InMemoryUserStore::new();
    seed::seed_reference_data(products.as_ref()).await.unwrap();

    let mut cart = Vec::with_capacity(CART_SIZE);
    for i in 0..CART_SIZE {
        let product = products
            .create(NewProduct {
                name: format!("Producto {i}"),
                description: String::new(),
                category_id: 1,
                price: dec!(12.50),
                stock: i64::MAX / 2,
                unit_id: 1,
                barcode: None,
            })
            .await
            .unwrap();
        cart.push(CartLine {
            product_id: product.id,
            quantity: 1,
        });
    }

    let seller = users
        .create(NewUser {
            name: "Bench".to_string(),
            email: "bench@tienda.com".to_string(),
            password: "bench".to_string(),
            role: Role::Seller,
        })
        .await
        .unwrap();

    Setup {
        engine: Engine::new(products, sales),
        seller: seller.into(),
        cart,
    }
}

fn process_sales(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let Setup {
        engine,
        seller,
        cart,
    } = rt.block_on(setup());

    let mut group = c.benchmark_group("sales");
    group.throughput(Throughput::Elements(CART_SIZE as u64));
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("process_sale_10_lines", |b| {
        b.to_async(&rt).iter(|| async {
            engine
                .process_sale(&seller, &cart, PaymentMethod::Cash)
                .await
                .unwrap()
        });
    });

    group.finish();
}

fn rank_products(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let Setup {
        engine,
        seller,
        cart,
    } = rt.block_on(setup());

    let history: Vec<Sale> = rt.block_on(async {
        let mut history = Vec::with_capacity(REPORT_SALES);
        for i in 0..REPORT_SALES {
            let line = &cart[i % CART_SIZE..i % CART_SIZE + 1];
            history.push(
                engine
                    .process_sale(&seller, line, PaymentMethod::Card)
                    .await
                    .unwrap(),
            );
        }
        history
    });

    let mut group = c.benchmark_group("reports");
    group.throughput(Throughput::Elements(REPORT_SALES as u64));

    group.bench_function("rank_products_10K_sales", |b| {
        b.iter(|| reports::rank_products(&history, 5));
    });

    group.finish();
}

criterion_group!(benches, process_sales, rank_products);
criterion_main!(benches);
