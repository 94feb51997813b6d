use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use stockella_core::{CategoryId, DomainError, DomainResult, Entity, ProductId};

/// Catalog entry whose `stock` is owned by the stock ledger.
///
/// Every field except `stock` is maintained through [`NewProduct`] /
/// [`ProductPatch`]; stock only changes through a committed movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i64,
    pub min_stock: i64,
    pub unit: Option<String>,
    pub active: bool,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        crate::alert::is_low_stock(self.stock, self.min_stock)
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.stock == 0
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }

    fn audit_label(&self) -> String {
        format!("product '{}'", self.name)
    }
}

/// Input for registering a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub min_stock: i64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

impl NewProduct {
    /// Validate and normalize into a fresh product (active unless stated otherwise).
    pub fn into_product(self, id: ProductId, now: DateTime<Utc>) -> DomainResult<Product> {
        let code = required("code", &self.code)?;
        let name = required("name", &self.name)?;
        non_negative_price(self.price)?;
        if self.stock < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        non_negative_min(self.min_stock)?;

        Ok(Product {
            id,
            code,
            name,
            description: optional(self.description),
            price: self.price,
            stock: self.stock,
            min_stock: self.min_stock,
            unit: optional(self.unit),
            active: self.active.unwrap_or(true),
            registered_at: now,
            category_id: self.category_id,
        })
    }
}

/// Partial update; `None` leaves a field untouched. Stock is not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub min_stock: Option<i64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    /// `Some(None)` (explicit `null`) detaches the product from its category.
    #[serde(default, deserialize_with = "present")]
    pub category_id: Option<Option<CategoryId>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// What changed when a patch was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOutcome {
    pub code_changed: bool,
    pub threshold_changed: bool,
    /// The product went from inactive to active.
    pub activated: bool,
    /// The product now points at a different, non-empty category.
    pub category_assigned: bool,
}

impl PatchOutcome {
    /// Whether the low-stock rule has to be looked at again.
    pub fn needs_alert_check(&self) -> bool {
        self.threshold_changed || self.activated
    }
}

impl Product {
    /// Apply a patch in place. Validation happens before any field is touched.
    pub fn apply_patch(&mut self, patch: ProductPatch) -> DomainResult<PatchOutcome> {
        let code = patch.code.as_deref().map(|c| required("code", c)).transpose()?;
        let name = patch.name.as_deref().map(|n| required("name", n)).transpose()?;
        if let Some(price) = patch.price {
            non_negative_price(price)?;
        }
        if let Some(min) = patch.min_stock {
            non_negative_min(min)?;
        }

        let code_changed = code.as_ref().is_some_and(|c| *c != self.code);
        let threshold_changed = patch.min_stock.is_some_and(|m| m != self.min_stock);
        let activated = !self.active && patch.active == Some(true);
        let category_assigned = matches!(patch.category_id, Some(Some(c)) if self.category_id != Some(c));

        if let Some(code) = code {
            self.code = code;
        }
        if let Some(name) = name {
            self.name = name;
        }
        if patch.description.is_some() {
            self.description = optional(patch.description);
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(min) = patch.min_stock {
            self.min_stock = min;
        }
        if patch.unit.is_some() {
            self.unit = optional(patch.unit);
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        if let Some(category) = patch.category_id {
            self.category_id = category;
        }

        Ok(PatchOutcome {
            code_changed,
            threshold_changed,
            activated,
            category_assigned,
        })
    }
}

fn required(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

// Blank optional text is stored as absent.
fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_negative_price(price: Decimal) -> DomainResult<()> {
    if price < Decimal::ZERO {
        return Err(DomainError::validation("price cannot be negative"));
    }
    Ok(())
}

fn non_negative_min(min: i64) -> DomainResult<()> {
    if min < 0 {
        return Err(DomainError::validation("minimum stock cannot be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn input() -> NewProduct {
        NewProduct {
            code: "  SKU-001 ".to_string(),
            name: "Widget".to_string(),
            description: Some("   ".to_string()),
            price: dec!(12.50),
            stock: 10,
            min_stock: 5,
            unit: Some("pcs".to_string()),
            active: None,
            category_id: None,
        }
    }

    fn product() -> Product {
        input().into_product(ProductId::new(), Utc::now()).unwrap()
    }

    #[test]
    fn new_product_is_trimmed_and_active_by_default() {
        let p = product();
        assert_eq!(p.code, "SKU-001");
        assert_eq!(p.description, None);
        assert!(p.active);
        assert_eq!(p.stock, 10);
    }

    #[test]
    fn new_product_rejects_empty_code() {
        let mut i = input();
        i.code = "   ".to_string();
        let err = i.into_product(ProductId::new(), Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::validation("code cannot be empty"));
    }

    #[test]
    fn new_product_rejects_negative_values() {
        let mut i = input();
        i.price = dec!(-0.01);
        assert!(matches!(
            i.into_product(ProductId::new(), Utc::now()),
            Err(DomainError::Validation(_))
        ));

        let mut i = input();
        i.stock = -1;
        assert!(matches!(
            i.into_product(ProductId::new(), Utc::now()),
            Err(DomainError::Validation(_))
        ));

        let mut i = input();
        i.min_stock = -1;
        assert!(matches!(
            i.into_product(ProductId::new(), Utc::now()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn zero_price_is_allowed() {
        let mut i = input();
        i.price = Decimal::ZERO;
        assert!(i.into_product(ProductId::new(), Utc::now()).is_ok());
    }

    #[test]
    fn patch_reports_threshold_and_code_changes() {
        let mut p = product();
        let outcome = p
            .apply_patch(ProductPatch {
                min_stock: Some(20),
                code: Some("SKU-001".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(outcome.threshold_changed);
        assert!(!outcome.code_changed);
        assert_eq!(p.min_stock, 20);
        assert!(p.is_low_stock());
    }

    #[test]
    fn invalid_patch_leaves_product_untouched() {
        let mut p = product();
        let before = p.clone();
        let err = p
            .apply_patch(ProductPatch {
                name: Some("Renamed".to_string()),
                price: Some(dec!(-1)),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(p, before);
    }

    #[test]
    fn reactivation_is_reported() {
        let mut p = product();
        p.active = false;
        let outcome = p
            .apply_patch(ProductPatch {
                active: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert!(outcome.activated);
        assert!(outcome.needs_alert_check());

        let outcome = p
            .apply_patch(ProductPatch {
                active: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert!(!outcome.activated);
        assert!(!outcome.needs_alert_check());
    }

    #[test]
    fn patch_distinguishes_absent_and_null_category() {
        let category = CategoryId::new();
        let mut p = product();
        p.category_id = Some(category);

        let patch: ProductPatch = serde_json::from_str(r#"{"name":"Gadget"}"#).unwrap();
        assert_eq!(patch.category_id, None);
        p.apply_patch(patch).unwrap();
        assert_eq!(p.category_id, Some(category));

        let patch: ProductPatch = serde_json::from_str(r#"{"categoryId":null}"#).unwrap();
        assert_eq!(patch.category_id, Some(None));
        let outcome = p.apply_patch(patch).unwrap();
        assert!(!outcome.category_assigned);
        assert_eq!(p.category_id, None);

        let patch: ProductPatch =
            serde_json::from_str(&format!(r#"{{"categoryId":"{category}"}}"#)).unwrap();
        assert!(p.apply_patch(patch).unwrap().category_assigned);
        assert_eq!(p.category_id, Some(category));
    }

    #[test]
    fn product_serializes_camel_case() {
        let json = serde_json::to_value(product()).unwrap();
        assert_eq!(json["minStock"], 5);
        assert!(json.get("registeredAt").is_some());
    }
}
