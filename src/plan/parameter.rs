use serde::{Deserialize, Deserializer, Serialize};

/// Extraction strategy of a parameter definition. Unknown tags decode as
/// `Static` so legacy files keep loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ParameterKind {
    Regexp,
    #[serde(rename = "JSON")]
    Json,
    #[default]
    Static,
}

impl<'de> Deserialize<'de> for ParameterKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(match tag.as_str() {
            "Regexp" => ParameterKind::Regexp,
            "JSON" => ParameterKind::Json,
            _ => ParameterKind::Static,
        })
    }
}

/// Named value definition seeding worker contexts. For `Static` parameters
/// `value` is the value itself; for extractors it is the fallback used when
/// the expression does not match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Type", default)]
    pub kind: ParameterKind,
    #[serde(rename = "Value", default)]
    pub value: String,
    #[serde(rename = "Expression", default)]
    pub expression: String,
}

impl Parameter {
    #[must_use]
    pub fn is_extractor(&self) -> bool {
        matches!(self.kind, ParameterKind::Regexp | ParameterKind::Json)
    }
}
