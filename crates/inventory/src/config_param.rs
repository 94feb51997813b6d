use serde::{Deserialize, Serialize};

use stockella_core::{ConfigParamId, DomainError, DomainResult, Entity};

/// Administrator-managed key/value setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigParam {
    pub id: ConfigParamId,
    pub key: String,
    pub value: String,
    pub description: Option<String>,
}

impl Entity for ConfigParam {
    type Id = ConfigParamId;

    fn id(&self) -> ConfigParamId {
        self.id
    }

    fn audit_label(&self) -> String {
        format!("parameter '{}'", self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConfigParam {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewConfigParam {
    pub fn into_param(self, id: ConfigParamId) -> DomainResult<ConfigParam> {
        Ok(ConfigParam {
            id,
            key: key(&self.key)?,
            value: self.value,
            description: self.description.filter(|d| !d.trim().is_empty()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigParamPatch {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ConfigParam {
    pub fn apply_patch(&mut self, patch: ConfigParamPatch) -> DomainResult<()> {
        let new_key = patch.key.as_deref().map(key).transpose()?;
        if let Some(k) = new_key {
            self.key = k;
        }
        if let Some(v) = patch.value {
            self.value = v;
        }
        if let Some(d) = patch.description {
            self.description = Some(d).filter(|d| !d.trim().is_empty());
        }
        Ok(())
    }
}

fn key(raw: &str) -> DomainResult<String> {
    let k = raw.trim();
    if k.is_empty() {
        return Err(DomainError::validation("key cannot be empty"));
    }
    Ok(k.to_string())
}
