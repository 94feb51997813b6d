//! Request and response bodies, plus query-string parsing into domain filters.

use axum::{http::StatusCode, response::Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockella_auth::User;
use stockella_core::{AlertId, CategoryId, ProductId, UserId};
use stockella_infra::ProductChange;
use stockella_inventory::{
    AlertFilter, AlertKind, AuditAction, AuditFilter, MovementFilter, MovementKind, PageRequest,
    Product, ProductQuery, UserQuery, DEFAULT_USER_PAGE_LIMIT,
};

use super::errors::{invalid_id, json_error};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMovementRequest {
    pub product_id: String,
    pub kind: String,
    /// Raw JSON; see [`CreateMovementRequest::quantity`].
    #[serde(default)]
    pub quantity: serde_json::Value,
    #[serde(default)]
    pub reason: Option<String>,
}

impl CreateMovementRequest {
    /// Whole numbers only; the sign is checked by the ledger.
    pub fn quantity(&self) -> Result<i64, Response> {
        self.quantity.as_i64().ok_or_else(|| {
            json_error(
                StatusCode::BAD_REQUEST,
                "invalid_quantity",
                format!("quantity must be a positive integer, got {}", self.quantity),
            )
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Product plus the alert raised by the write, if any.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<AlertId>,
}

impl From<ProductChange> for ProductResponse {
    fn from(change: ProductChange) -> Self {
        Self {
            alert_id: change.alert.as_ref().map(|a| a.id),
            product: change.product,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub user_id: UserId,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ProductListParams {
    pub fn into_query(self) -> Result<ProductQuery, Response> {
        let category = self
            .category
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| raw.trim().parse::<CategoryId>().map_err(|_| invalid_id("category", &raw)))
            .transpose()?;
        Ok(ProductQuery {
            search: self.search,
            category,
            page: PageRequest::new(self.page, self.limit),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListParams {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl From<UserListParams> for UserQuery {
    fn from(p: UserListParams) -> Self {
        Self {
            search: p.search,
            page: PageRequest::with_default_limit(p.page, p.limit, DEFAULT_USER_PAGE_LIMIT),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementListParams {
    pub kind: Option<String>,
    pub product_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl MovementListParams {
    pub fn into_filter(self) -> Result<MovementFilter, Response> {
        let kind = self
            .kind
            .map(|k| {
                k.parse::<MovementKind>()
                    .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_kind", e.to_string()))
            })
            .transpose()?;
        let product_id = self
            .product_id
            .map(|raw| raw.parse::<ProductId>().map_err(|_| invalid_id("product", &raw)))
            .transpose()?;
        Ok(MovementFilter {
            kind,
            product_id,
            from: self.from,
            to: self.to,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertListParams {
    pub kind: Option<String>,
    pub acknowledged: Option<bool>,
}

impl AlertListParams {
    pub fn into_filter(self) -> Result<AlertFilter, Response> {
        let kind = self
            .kind
            .map(|k| {
                k.parse::<AlertKind>()
                    .map_err(|e| json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()))
            })
            .transpose()?;
        Ok(AlertFilter {
            kind,
            acknowledged: self.acknowledged,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditListParams {
    pub user_id: Option<String>,
    pub action: Option<String>,
    pub detail: Option<String>,
}

impl AuditListParams {
    pub fn into_filter(self) -> Result<AuditFilter, Response> {
        let user_id = self
            .user_id
            .map(|raw| raw.parse::<UserId>().map_err(|_| invalid_id("user", &raw)))
            .transpose()?;
        let action = self
            .action
            .map(|a| {
                a.parse::<AuditAction>()
                    .map_err(|e| json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()))
            })
            .transpose()?;
        Ok(AuditFilter {
            user_id,
            action,
            detail: self.detail.filter(|d| !d.trim().is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_params_parse_kind_and_product() {
        let id = ProductId::new();
        let filter = MovementListParams {
            kind: Some("outflow".into()),
            product_id: Some(id.to_string()),
            ..Default::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.kind, Some(MovementKind::Outflow));
        assert_eq!(filter.product_id, Some(id));
    }

    #[test]
    fn bad_movement_kind_is_bad_request() {
        let err = MovementListParams {
            kind: Some("Sideways".into()),
            ..Default::default()
        }
        .into_filter()
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn bad_user_id_is_bad_request() {
        let err = AuditListParams {
            user_id: Some("not-a-uuid".into()),
            ..Default::default()
        }
        .into_filter()
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn product_params_normalize_paging() {
        let q = ProductListParams {
            search: Some("bolt".into()),
            page: Some(0),
            limit: Some(500),
            ..Default::default()
        }
        .into_query()
        .unwrap();
        assert_eq!(q.page.page(), 1);
        assert_eq!(q.page.limit(), 100);
        assert_eq!(q.category, None);
    }

    #[test]
    fn product_params_parse_the_category() {
        let id = CategoryId::new();
        let q = ProductListParams {
            category: Some(id.to_string()),
            ..Default::default()
        }
        .into_query()
        .unwrap();
        assert_eq!(q.category, Some(id));

        let err = ProductListParams {
            category: Some("tools".into()),
            ..Default::default()
        }
        .into_query()
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn user_params_default_to_ten_per_page() {
        let q: UserQuery = UserListParams {
            search: Some("ana".into()),
            ..Default::default()
        }
        .into();
        assert_eq!(q.page.page(), 1);
        assert_eq!(q.page.limit(), 10);
    }

    fn movement_body(quantity: serde_json::Value) -> CreateMovementRequest {
        serde_json::from_value(serde_json::json!({
            "productId": ProductId::new().to_string(),
            "kind": "Inflow",
            "quantity": quantity,
        }))
        .unwrap()
    }

    #[test]
    fn whole_quantities_pass_through_unchecked() {
        assert_eq!(movement_body(serde_json::json!(7)).quantity().unwrap(), 7);
        assert_eq!(movement_body(serde_json::json!(-3)).quantity().unwrap(), -3);
    }

    #[test]
    fn non_integer_quantities_are_invalid() {
        for raw in [
            serde_json::json!(1.5),
            serde_json::json!("2"),
            serde_json::Value::Null,
            serde_json::json!(u64::MAX),
        ] {
            let err = movement_body(raw.clone()).quantity().unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{raw}");
        }

        let missing: CreateMovementRequest = serde_json::from_value(serde_json::json!({
            "productId": ProductId::new().to_string(),
            "kind": "Inflow",
        }))
        .unwrap();
        assert!(missing.quantity().is_err());
    }
}
