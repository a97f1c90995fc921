//! Request and response payloads of the HTTP API.
//!
//! Request fields are all optional at the serde level so that a missing
//! field produces the API's own validation message instead of a generic
//! deserialization error. Currency amounts are rounded to cents on the way
//! in.

use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

use crate::engine::CartLine;
use crate::error::{Error, Result};
use crate::stores::{NewProduct, NewUser, PaymentMethod, ProductChanges, Role, UserChanges, UserProfile};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn credentials(self) -> Result<(String, String)> {
        match (present(self.email), present(self.password)) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => Err(Error::validation("Email y contraseña son requeridos")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub nombre: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub rol: Option<Role>,
}

impl CreateUserRequest {
    pub fn into_new_user(self) -> Result<NewUser> {
        match (
            present(self.nombre),
            present(self.email),
            present(self.password),
            self.rol,
        ) {
            (Some(name), Some(email), Some(password), Some(role)) => Ok(NewUser {
                name,
                email,
                password,
                role,
            }),
            _ => Err(Error::validation("Todos los campos son requeridos")),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub nombre: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub rol: Option<Role>,
    pub activo: Option<bool>,
}

impl From<UpdateUserRequest> for UserChanges {
    fn from(request: UpdateUserRequest) -> Self {
        UserChanges {
            name: present(request.nombre),
            email: present(request.email),
            password: present(request.password),
            role: request.rol,
            active: request.activo,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub nombre: Option<String>,
    pub descripcion: Option<String>,
    pub categoria_id: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_currency")]
    pub precio: Option<Decimal>,
    pub stock: Option<i64>,
    pub unidad_id: Option<i64>,
    pub codigo_barras: Option<String>,
}

impl CreateProductRequest {
    pub fn into_new_product(self) -> Result<NewProduct> {
        let (Some(name), Some(category_id), Some(price), Some(stock), Some(unit_id)) = (
            present(self.nombre),
            self.categoria_id,
            self.precio,
            self.stock,
            self.unidad_id,
        ) else {
            return Err(Error::validation(
                "Campos requeridos: nombre, categoriaId, precio, stock, unidadId",
            ));
        };
        check_price(price)?;

        Ok(NewProduct {
            name,
            description: self.descripcion.unwrap_or_default(),
            category_id,
            price,
            stock,
            unit_id,
            barcode: present(self.codigo_barras),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub nombre: Option<String>,
    pub descripcion: Option<String>,
    pub categoria_id: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_currency")]
    pub precio: Option<Decimal>,
    pub stock: Option<i64>,
    pub unidad_id: Option<i64>,
    /// Absent leaves the barcode alone; `null` or `""` removes it.
    #[serde(default, deserialize_with = "deserialize_explicit")]
    pub codigo_barras: Option<Option<String>>,
    pub activo: Option<bool>,
}

impl UpdateProductRequest {
    pub fn into_changes(self) -> Result<ProductChanges> {
        if let Some(price) = self.precio {
            check_price(price)?;
        }
        Ok(ProductChanges {
            name: present(self.nombre),
            description: self.descripcion,
            category_id: self.categoria_id,
            price: self.precio,
            stock: self.stock,
            unit_id: self.unidad_id,
            barcode: self.codigo_barras.map(present),
            active: self.activo,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub nombre: Option<String>,
    pub descripcion: Option<String>,
}

impl CreateCategoryRequest {
    pub fn into_parts(self) -> Result<(String, Option<String>)> {
        let name = present(self.nombre).ok_or_else(|| Error::validation("El nombre es requerido"))?;
        Ok((name, present(self.descripcion)))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUnitRequest {
    pub nombre: Option<String>,
    pub abreviatura: Option<String>,
}

impl CreateUnitRequest {
    pub fn into_parts(self) -> Result<(String, String)> {
        match (present(self.nombre), present(self.abreviatura)) {
            (Some(name), Some(abbreviation)) => Ok((name, abbreviation)),
            _ => Err(Error::validation("El nombre y la abreviatura son requeridos")),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineRequest {
    pub producto_id: String,
    pub cantidad: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub items: Option<Vec<CartLineRequest>>,
    pub metodo_pago: Option<PaymentMethod>,
}

impl CreateSaleRequest {
    /// Checks the request shape; per-product checks belong to the engine.
    pub fn into_cart(self) -> Result<(Vec<CartLine>, PaymentMethod)> {
        let items = match self.items {
            Some(items) if !items.is_empty() => items,
            _ => return Err(Error::validation("Se requieren items para la venta")),
        };
        let payment_method = self
            .metodo_pago
            .ok_or_else(|| Error::validation("Se requiere método de pago"))?;

        let cart = items
            .into_iter()
            .map(|line| CartLine {
                product_id: line.producto_id,
                quantity: line.cantidad,
            })
            .collect();
        Ok((cart, payment_method))
    }
}

/// Query parameters are kept as raw strings: an unparsable value falls back
/// to the endpoint default instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct ThresholdQuery {
    pub threshold: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DaysQuery {
    pub days: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Parses a positive integer parameter, using `default` for anything
/// missing, malformed, zero or negative.
pub fn positive_or(value: Option<&str>, default: i64) -> i64 {
    value
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn check_price(price: Decimal) -> Result<()> {
    if price < Decimal::ZERO {
        return Err(Error::validation("El precio no puede ser negativo"));
    }
    Ok(())
}

fn deserialize_currency<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Decimal>::deserialize(deserializer).map(|opt_dec| {
        opt_dec.map(|dec| dec.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    })
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field
/// (`None`, via `#[serde(default)]`).
fn deserialize_explicit<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn parse<T: for<'de> Deserialize<'de>>(json: &str) -> T {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_product_request() {
        let request: CreateProductRequest = parse(
            r#"{"nombre":"Coca Cola 600ml","categoriaId":1,"precio":18,"stock":50,
                "unidadId":1,"codigoBarras":"7501055300846"}"#,
        );
        let product = request.into_new_product().unwrap();
        assert_eq!(product.name, "Coca Cola 600ml");
        assert_eq!(product.price, dec!(18));
        assert_eq!(product.stock, 50);
        assert_eq!(product.description, "");
        assert_eq!(product.barcode.as_deref(), Some("7501055300846"));
    }

    #[test]
    fn test_price_rounds_to_cents() {
        let request: CreateProductRequest = parse(
            r#"{"nombre":"A","categoriaId":1,"precio":12.345,"stock":1,"unidadId":1}"#,
        );
        assert_eq!(request.precio, Some(dec!(12.35)));

        let request: CreateProductRequest = parse(
            r#"{"nombre":"A","categoriaId":1,"precio":"9.999","stock":1,"unidadId":1}"#,
        );
        assert_eq!(request.precio, Some(dec!(10.00)));
    }

    #[test]
    fn test_missing_product_fields_are_rejected() {
        let request: CreateProductRequest = parse(r#"{"nombre":"A","precio":1}"#);
        assert!(matches!(
            request.into_new_product(),
            Err(Error::Validation(m)) if m.starts_with("Campos requeridos")
        ));

        let request: CreateProductRequest =
            parse(r#"{"nombre":"  ","categoriaId":1,"precio":1,"stock":1,"unidadId":1}"#);
        assert!(request.into_new_product().is_err());
    }

    #[test]
    fn test_negative_price_is_rejected() {
        let request: CreateProductRequest =
            parse(r#"{"nombre":"A","categoriaId":1,"precio":-1,"stock":1,"unidadId":1}"#);
        assert!(matches!(request.into_new_product(), Err(Error::Validation(_))));

        let update: UpdateProductRequest = parse(r#"{"precio":-0.5}"#);
        assert!(update.into_changes().is_err());
    }

    #[test]
    fn test_empty_barcode_on_create_means_none() {
        let request: CreateProductRequest = parse(
            r#"{"nombre":"A","categoriaId":1,"precio":1,"stock":1,"unidadId":1,"codigoBarras":""}"#,
        );
        assert_eq!(request.into_new_product().unwrap().barcode, None);
    }

    #[test]
    fn test_update_barcode_absent_null_and_value() {
        let absent: UpdateProductRequest = parse(r#"{"nombre":"B"}"#);
        assert_eq!(absent.into_changes().unwrap().barcode, None);

        let null: UpdateProductRequest = parse(r#"{"codigoBarras":null}"#);
        assert_eq!(null.into_changes().unwrap().barcode, Some(None));

        let empty: UpdateProductRequest = parse(r#"{"codigoBarras":""}"#);
        assert_eq!(empty.into_changes().unwrap().barcode, Some(None));

        let value: UpdateProductRequest = parse(r#"{"codigoBarras":"123"}"#);
        assert_eq!(
            value.into_changes().unwrap().barcode,
            Some(Some("123".to_string()))
        );
    }

    #[test]
    fn test_empty_update_is_empty() {
        let update: UpdateProductRequest = parse("{}");
        assert!(update.into_changes().unwrap().is_empty());
    }

    #[test]
    fn test_sale_request_checks_items_before_payment_method() {
        let request: CreateSaleRequest = parse(r#"{"items":[]}"#);
        assert!(matches!(
            request.into_cart(),
            Err(Error::Validation(m)) if m == "Se requieren items para la venta"
        ));

        let request: CreateSaleRequest =
            parse(r#"{"items":[{"productoId":"p1","cantidad":2}]}"#);
        assert!(matches!(
            request.into_cart(),
            Err(Error::Validation(m)) if m == "Se requiere método de pago"
        ));
    }

    #[test]
    fn test_parse_sale_request() {
        let request: CreateSaleRequest = parse(
            r#"{"items":[{"productoId":"p1","cantidad":2}],"metodoPago":"tarjeta"}"#,
        );
        let (cart, method) = request.into_cart().unwrap();
        assert_eq!(
            cart,
            vec![CartLine {
                product_id: "p1".to_string(),
                quantity: 2
            }]
        );
        assert_eq!(method, PaymentMethod::Card);
    }

    #[test]
    fn test_unknown_payment_method_does_not_parse() {
        let parsed = serde_json::from_str::<CreateSaleRequest>(
            r#"{"items":[{"productoId":"p1","cantidad":1}],"metodoPago":"cheque"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_user_requests() {
        let request: CreateUserRequest = parse(
            r#"{"nombre":"Juan","email":"j@x.com","password":"123","rol":"vendedor"}"#,
        );
        assert_eq!(request.into_new_user().unwrap().role, Role::Seller);

        let request: CreateUserRequest = parse(r#"{"nombre":"Juan","email":"j@x.com"}"#);
        assert!(request.into_new_user().is_err());

        let changes: UserChanges =
            parse::<UpdateUserRequest>(r#"{"password":"","activo":false}"#).into();
        assert_eq!(changes.password, None);
        assert_eq!(changes.active, Some(false));
    }

    #[test]
    fn test_positive_or_falls_back() {
        assert_eq!(positive_or(Some("5"), 10), 5);
        assert_eq!(positive_or(Some(" 3 "), 10), 3);
        assert_eq!(positive_or(Some("abc"), 10), 10);
        assert_eq!(positive_or(Some("0"), 10), 10);
        assert_eq!(positive_or(Some("-2"), 7), 7);
        assert_eq!(positive_or(None, 7), 7);
    }
}
