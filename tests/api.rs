use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use rstest::rstest;
use serde_json::{json, Value};
use tower::ServiceExt;

use tiendita_pos::{
    router, seed,
    stores::{NewUser, Role},
    AppState, Config,
};

const ADMIN: (&str, &str) = ("admin@admin.com", "admin123");
const SELLER: (&str, &str) = ("vendedor@abarrotes.com", "vendedor123");
const COKE_BARCODE: &str = "7501055300846";

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    async fn new() -> Self {
        let config = Config::default();
        let state = AppState::in_memory(&config);
        seed::seed_reference_data(state.products.as_ref()).await.unwrap();
        seed::load_catalog("data/catalog.csv", state.products.as_ref())
            .await
            .unwrap();
        seed::seed_admin(state.users.as_ref(), ADMIN.0, ADMIN.1)
            .await
            .unwrap();
        state
            .users
            .create(NewUser {
                name: "Juan Vendedor".to_string(),
                email: SELLER.0.to_string(),
                password: SELLER.1.to_string(),
                role: Role::Seller,
            })
            .await
            .unwrap();

        Self {
            router: router(state.clone(), &config.cors_origins),
            state,
        }
    }

    async fn raw(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let (status, bytes) = self.raw(request).await;
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    async fn login(&self, (email, password): (&str, &str)) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn product_by_barcode(&self, token: &str, barcode: &str) -> Value {
        let (status, product) = self
            .get(&format!("/api/products/barcode/{barcode}"), token)
            .await;
        assert_eq!(status, StatusCode::OK);
        product
    }
}

#[tokio::test]
async fn test_root_banner_and_health_need_no_token() {
    let app = TestApp::new().await;

    let (status, bytes) = app
        .raw(Request::get("/").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(bytes).unwrap().contains("/api/health"));

    let (status, health) = app.send(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["databases"]["products"]["backend"], "memory");
    assert_eq!(health["databases"]["accounts"]["status"], "connected");
}

#[tokio::test]
async fn test_login_returns_profile_without_password() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ADMIN@admin.com", "password": "admin123" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());
    assert_eq!(body["user"]["rol"], "admin");
    assert_eq!(body["user"]["email"], "admin@admin.com");
    assert!(body["user"].get("password").is_none());
}

#[rstest]
#[case(json!({ "email": "admin@admin.com", "password": "wrong" }), StatusCode::UNAUTHORIZED)]
#[case(json!({ "email": "nadie@x.com", "password": "admin123" }), StatusCode::UNAUTHORIZED)]
#[case(json!({ "email": "admin@admin.com" }), StatusCode::BAD_REQUEST)]
#[case(json!({ "email": "", "password": "" }), StatusCode::BAD_REQUEST)]
#[tokio::test]
async fn test_login_failures(#[case] body: Value, #[case] expected: StatusCode) {
    let app = TestApp::new().await;
    let (status, response) = app
        .send(Method::POST, "/api/auth/login", None, Some(body))
        .await;
    assert_eq!(status, expected);
    assert!(response["error"].is_string());
}

#[tokio::test]
async fn test_inactive_user_cannot_log_in() {
    let app = TestApp::new().await;
    let admin = app.login(ADMIN).await;
    let seller = app.state.users.find_by_email(SELLER.0).await.unwrap().unwrap();

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/users/{}", seller.id),
            Some(&admin),
            Some(json!({ "activo": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": SELLER.0, "password": SELLER.1 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Usuario desactivado");
}

#[tokio::test]
async fn test_missing_and_invalid_tokens_are_unauthorized() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/api/products", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token no proporcionado");

    let (status, body) = app.get("/api/products", "garbage").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token inválido");
}

#[tokio::test]
async fn test_verify_rereads_user() {
    let app = TestApp::new().await;
    let admin = app.login(ADMIN).await;
    let seller_token = app.login(SELLER).await;

    let (status, body) = app.get("/api/auth/verify", &seller_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["nombre"], "Juan Vendedor");

    let seller = app.state.users.find_by_email(SELLER.0).await.unwrap().unwrap();
    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/users/{}", seller.id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/auth/verify", &seller_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[rstest]
#[case(ADMIN, StatusCode::CREATED)]
#[case(SELLER, StatusCode::FORBIDDEN)]
#[tokio::test]
async fn test_product_creation_is_admin_only(
    #[case] credentials: (&str, &str),
    #[case] expected: StatusCode,
) {
    let app = TestApp::new().await;
    let token = app.login(credentials).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/products",
            Some(&token),
            Some(json!({
                "nombre": "Agua Ciel 1L",
                "categoriaId": 1,
                "precio": 12.5,
                "stock": 40,
                "unidadId": 1
            })),
        )
        .await;
    assert_eq!(status, expected);
    if expected == StatusCode::CREATED {
        assert_eq!(body["categoria"], "Bebidas");
        assert_eq!(body["unidad"], "pz");
        assert_eq!(body["precio"], 12.5);
        assert_eq!(body["activo"], true);
    }
}

#[tokio::test]
async fn test_product_validation() {
    let app = TestApp::new().await;
    let admin = app.login(ADMIN).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/products",
            Some(&admin),
            Some(json!({ "nombre": "Sin precio", "categoriaId": 1, "stock": 1, "unidadId": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Campos requeridos"));

    let (status, _) = app
        .send(
            Method::POST,
            "/api/products",
            Some(&admin),
            Some(json!({
                "nombre": "Otra Coca",
                "categoriaId": 1,
                "precio": 18,
                "stock": 1,
                "unidadId": 1,
                "codigoBarras": COKE_BARCODE
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/products",
            Some(&admin),
            Some(json!({ "nombre": "X", "categoriaId": 99, "precio": 1, "stock": 1, "unidadId": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = TestApp::new().await;
    let admin = app.login(ADMIN).await;

    let request = Request::post("/api/products")
        .header(header::AUTHORIZATION, format!("Bearer {admin}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, bytes) = app.raw(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_update_and_delete_product() {
    let app = TestApp::new().await;
    let admin = app.login(ADMIN).await;
    let coke = app.product_by_barcode(&admin, COKE_BARCODE).await;
    let uri = format!("/api/products/{}", coke["id"].as_str().unwrap());

    let (status, updated) = app
        .send(
            Method::PUT,
            &uri,
            Some(&admin),
            Some(json!({ "precio": 19.5, "codigoBarras": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["precio"], 19.5);
    assert_eq!(updated["codigoBarras"], Value::Null);
    assert_eq!(updated["nombre"], "Coca Cola 600ml");

    let (status, _) = app.send(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.get(&uri, &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Producto no encontrado");
}

#[tokio::test]
async fn test_low_stock_defaults_to_ten() {
    let app = TestApp::new().await;
    let token = app.login(SELLER).await;

    let (status, body) = app.get("/api/products/low-stock", &token).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["nombre"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Jabón Zote 400g"]);

    let (_, body) = app.get("/api/products/low-stock?threshold=13", &token).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = app.get("/api/products/low-stock?threshold=abc", &token).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_reference_data_endpoints() {
    let app = TestApp::new().await;
    let admin = app.login(ADMIN).await;
    let seller = app.login(SELLER).await;

    let (status, categories) = app.get("/api/products/meta/categories", &seller).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(categories.as_array().unwrap().len(), 8);

    let (status, units) = app.get("/api/products/meta/units", &seller).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(units.as_array().unwrap().len(), 8);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/products/meta/categories",
            Some(&seller),
            Some(json!({ "nombre": "Congelados" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app
        .send(
            Method::POST,
            "/api/products/meta/categories",
            Some(&admin),
            Some(json!({ "nombre": "Congelados" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["nombre"], "Congelados");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/products/meta/categories",
            Some(&admin),
            Some(json!({ "nombre": "Bebidas" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "La categoría ya existe");
}

#[tokio::test]
async fn test_sale_decrements_stock_and_records_seller() {
    let app = TestApp::new().await;
    let token = app.login(SELLER).await;
    let coke = app.product_by_barcode(&token, COKE_BARCODE).await;

    let (status, sale) = app
        .send(
            Method::POST,
            "/api/sales",
            Some(&token),
            Some(json!({
                "items": [{ "productoId": coke["id"], "cantidad": 2 }],
                "metodoPago": "efectivo",
                "vendedorId": "someone-else"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sale["total"], 36.0);
    assert_eq!(sale["items"][0]["subtotal"], 36.0);
    assert_eq!(sale["items"][0]["productoNombre"], "Coca Cola 600ml");
    assert_eq!(sale["vendedorNombre"], "Juan Vendedor");
    assert_ne!(sale["vendedorId"], "someone-else");
    assert_eq!(sale["metodoPago"], "efectivo");

    let coke = app.product_by_barcode(&token, COKE_BARCODE).await;
    assert_eq!(coke["stock"], 48);

    let (status, fetched) = app
        .get(&format!("/api/sales/{}", sale["id"].as_str().unwrap()), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], sale["id"]);

    let (_, mine) = app
        .get(&format!("/api/sales/vendedor/{}", sale["vendedorId"].as_str().unwrap()), &token)
        .await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (_, today) = app.get("/api/sales/today", &token).await;
    assert_eq!(today.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_insufficient_stock_rejects_whole_cart() {
    let app = TestApp::new().await;
    let token = app.login(SELLER).await;
    let coke = app.product_by_barcode(&token, COKE_BARCODE).await;
    let soap = app.product_by_barcode(&token, "7501026002304").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/sales",
            Some(&token),
            Some(json!({
                "items": [
                    { "productoId": coke["id"], "cantidad": 1 },
                    { "productoId": soap["id"], "cantidad": 9 }
                ],
                "metodoPago": "tarjeta"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Stock insuficiente para Jabón Zote 400g. Disponible: 8"
    );

    assert_eq!(app.product_by_barcode(&token, COKE_BARCODE).await["stock"], 50);
    let (_, sales) = app.get("/api/sales", &token).await;
    assert!(sales.as_array().unwrap().is_empty());
}

#[rstest]
#[case(json!({ "metodoPago": "efectivo" }), "Se requieren items para la venta")]
#[case(json!({ "items": [], "metodoPago": "efectivo" }), "Se requieren items para la venta")]
#[case(json!({ "items": [{ "productoId": "x", "cantidad": 1 }] }), "Se requiere método de pago")]
#[case(
    json!({ "items": [{ "productoId": "x", "cantidad": 1 }], "metodoPago": "efectivo" }),
    "Producto no encontrado: x"
)]
#[tokio::test]
async fn test_sale_request_validation(#[case] body: Value, #[case] message: &str) {
    let app = TestApp::new().await;
    let token = app.login(SELLER).await;

    let (status, response) = app
        .send(Method::POST, "/api/sales", Some(&token), Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], message);
}

#[tokio::test]
async fn test_reports_and_stats() {
    let app = TestApp::new().await;
    let token = app.login(SELLER).await;
    let coke = app.product_by_barcode(&token, COKE_BARCODE).await;
    let milk = app.product_by_barcode(&token, "7501055363513").await;

    for (product, quantity) in [(&coke, 3), (&milk, 5), (&coke, 4)] {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/sales",
                Some(&token),
                Some(json!({
                    "items": [{ "productoId": product["id"], "cantidad": quantity }],
                    "metodoPago": "efectivo"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, top) = app.get("/api/sales/report/top-products?limit=1", &token).await;
    assert_eq!(top.as_array().unwrap().len(), 1);
    assert_eq!(top[0]["productoNombre"], "Coca Cola 600ml");
    assert_eq!(top[0]["cantidad"], 7);

    let (_, by_day) = app.get("/api/sales/report/by-day", &token).await;
    let by_day = by_day.as_array().unwrap();
    assert_eq!(by_day.len(), 7);
    assert_eq!(by_day[6]["cantidad"], 3);

    let (status, stats) = app.get("/api/stats", &token).await;
    assert_eq!(status, StatusCode::OK);
    // 7 x 18.00 + 5 x 28.50
    assert_eq!(stats["totalVentas"], 268.5);
    assert_eq!(stats["ventasHoy"], 268.5);
    assert_eq!(stats["productosActivos"], 12);
    assert_eq!(stats["usuariosActivos"], 2);
    assert_eq!(stats["productosBajoStock"], 1);

    let (status, detailed) = app.get("/api/stats/detailed", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detailed["resumen"]["ventasHoyCount"], 3);
    assert_eq!(detailed["resumen"]["totalVentas"], 268.5);
    assert_eq!(detailed["ventasPorDia"].as_array().unwrap().len(), 7);
    assert_eq!(detailed["productosTopVentas"][0]["cantidad"], 7);
    assert_eq!(detailed["productosBajoStock"][0]["nombre"], "Jabón Zote 400g");
}

#[rstest]
#[case("", 7)]
#[case("?days=30", 30)]
#[case("?days=-5", 7)]
#[case("?days=100000", 366)]
#[case("?days=9223372036854775807", 366)]
#[tokio::test]
async fn test_by_day_report_length(#[case] query: &str, #[case] expected: usize) {
    let app = TestApp::new().await;
    let token = app.login(SELLER).await;

    let (status, body) = app
        .get(&format!("/api/sales/report/by-day{query}"), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), expected);
}

#[tokio::test]
async fn test_sales_filter_requires_both_dates() {
    let app = TestApp::new().await;
    let token = app.login(SELLER).await;

    let (status, body) = app.get("/api/sales/filter?startDate=2024-01-01", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Se requieren fechas de inicio y fin");

    let (status, body) = app
        .get("/api/sales/filter?startDate=2024-01-01&endDate=2024-01-31", &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_user_management() {
    let app = TestApp::new().await;
    let admin = app.login(ADMIN).await;

    let (status, created) = app
        .send(
            Method::POST,
            "/api/users",
            Some(&admin),
            Some(json!({
                "nombre": "Ana",
                "email": "Ana@Tienda.com",
                "password": "ana12345",
                "rol": "vendedor"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["email"], "ana@tienda.com");
    assert!(created.get("password").is_none());

    let (status, body) = app
        .send(
            Method::POST,
            "/api/users",
            Some(&admin),
            Some(json!({
                "nombre": "Otra Ana",
                "email": "ANA@tienda.com",
                "password": "x",
                "rol": "vendedor"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "El email ya está registrado");

    let (status, users) = app.get("/api/users", &admin).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<_> = users
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["nombre"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Administrador", "Ana", "Juan Vendedor"]);

    let (status, _) = app.get("/api/users/nope", &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[rstest]
#[case(ADMIN, true, StatusCode::BAD_REQUEST)]
#[case(SELLER, true, StatusCode::BAD_REQUEST)]
#[case(SELLER, false, StatusCode::FORBIDDEN)]
#[case(ADMIN, false, StatusCode::OK)]
#[tokio::test]
async fn test_user_deletion_rules(
    #[case] caller: (&str, &str),
    #[case] target_self: bool,
    #[case] expected: StatusCode,
) {
    let app = TestApp::new().await;
    let token = app.login(caller).await;
    let other = if caller == ADMIN { SELLER } else { ADMIN };
    let target_email = if target_self { caller.0 } else { other.0 };
    let target = app
        .state
        .users
        .find_by_email(target_email)
        .await
        .unwrap()
        .unwrap();

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/api/users/{}", target.id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, expected);
    if target_self {
        assert_eq!(body["error"], "No puedes eliminarte a ti mismo");
    }
}
