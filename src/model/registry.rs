use crate::error::{Result, StemError};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Fixed set of model identifiers the separation tool is allowed to run.
#[derive(Clone, Debug, Deserialize)]
pub struct ModelRegistry {
    default: String,
    models: Vec<ModelEntry>,
}

const REGISTRY_JSON: &str = include_str!("../../models/registry.json");

impl ModelRegistry {
    /// The registry shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(REGISTRY_JSON)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let reg: ModelRegistry = serde_json::from_str(json)?;
        reg.checked()
    }

    /// Registry restricted to `names`; the first name becomes the default.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let models: Vec<ModelEntry> = names
            .into_iter()
            .map(|n| ModelEntry {
                name: n.into(),
                description: String::new(),
            })
            .collect();
        let default = models
            .first()
            .map(|m| m.name.clone())
            .ok_or_else(|| StemError::Registry("model list is empty".into()))?;
        ModelRegistry { default, models }.checked()
    }

    fn checked(self) -> Result<Self> {
        if !self.contains(&self.default) {
            return Err(StemError::Registry(format!(
                "default model `{}` is not in the model list",
                self.default
            )));
        }
        Ok(self)
    }

    pub fn default_model(&self) -> &str {
        &self.default
    }

    pub fn entries(&self) -> &[ModelEntry] {
        &self.models
    }

    pub fn names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name.clone()).collect()
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m.name == model)
    }

    pub fn validate(&self, model: &str) -> Result<()> {
        if self.contains(model) {
            Ok(())
        } else {
            Err(StemError::InvalidModel {
                model: model.to_string(),
                supported: self.names(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_defaults_to_htdemucs() {
        let reg = ModelRegistry::builtin().unwrap();
        assert_eq!(reg.default_model(), "htdemucs");
        for name in ["htdemucs", "htdemucs_ft", "mdx", "mdx_extra"] {
            assert!(reg.contains(name), "missing {name}");
        }
    }

    #[test]
    fn unknown_model_is_rejected() {
        let reg = ModelRegistry::builtin().unwrap();
        match reg.validate("not-a-model") {
            Err(StemError::InvalidModel { model, supported }) => {
                assert_eq!(model, "not-a-model");
                assert_eq!(supported, reg.names());
            }
            other => panic!("expected InvalidModel, got {other:?}"),
        }
    }

    #[test]
    fn from_names_uses_first_as_default() {
        let reg = ModelRegistry::from_names(["mdx", "htdemucs"]).unwrap();
        assert_eq!(reg.default_model(), "mdx");
        assert!(ModelRegistry::from_names(Vec::<String>::new()).is_err());
    }

    #[test]
    fn default_must_be_listed() {
        let json = r#"{ "default": "ghost", "models": [ { "name": "htdemucs" } ] }"#;
        assert!(matches!(
            ModelRegistry::from_json(json),
            Err(StemError::Registry(_))
        ));
    }
}
