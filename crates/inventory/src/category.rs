use serde::{Deserialize, Serialize};

use stockella_core::{CategoryId, DomainError, DomainResult, Entity};

/// Label shown for products without a category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Longest accepted category name, in characters.
pub const MAX_CATEGORY_NAME_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> CategoryId {
        self.id
    }

    fn audit_label(&self) -> String {
        format!("category '{}'", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewCategory {
    pub fn into_category(self, id: CategoryId) -> DomainResult<Category> {
        Ok(Category {
            id,
            name: name(&self.name)?,
            description: self.description.filter(|d| !d.trim().is_empty()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Category {
    /// Returns whether the name changed.
    pub fn apply_patch(&mut self, patch: CategoryPatch) -> DomainResult<bool> {
        let new_name = patch.name.as_deref().map(name).transpose()?;
        let renamed = new_name.as_ref().is_some_and(|n| *n != self.name);
        if let Some(n) = new_name {
            self.name = n;
        }
        if let Some(d) = patch.description {
            self.description = Some(d).filter(|d| !d.trim().is_empty());
        }
        Ok(renamed)
    }
}

fn name(raw: &str) -> DomainResult<String> {
    let n = raw.trim();
    if n.is_empty() {
        return Err(DomainError::validation("category name cannot be empty"));
    }
    if n.chars().count() > MAX_CATEGORY_NAME_LEN {
        return Err(DomainError::validation(format!(
            "category name exceeds {MAX_CATEGORY_NAME_LEN} characters"
        )));
    }
    Ok(n.to_string())
}
