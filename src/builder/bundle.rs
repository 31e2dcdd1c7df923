//! The import/export wire artifact (§6): a small JSON envelope around
//! base64-encoded CESR frames, or (per [`crate::builder::Builder::import_raw_frames`])
//! no envelope at all — just concatenated frames.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleType {
    Kel,
    Tel,
    Acdc,
    Mixed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleScope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aid: Option<String>,
    #[serde(rename = "registryId", skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    #[serde(rename = "credentialId", skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub created: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<BundleScope>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(rename = "type")]
    pub kind: BundleType,
    pub version: String,
    pub events: Vec<String>,
    pub metadata: BundleMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_type_serializes_lowercase() {
        let bundle = Bundle {
            kind: BundleType::Mixed,
            version: "1.0".to_string(),
            events: vec![],
            metadata: BundleMetadata { source: None, created: "2026-01-01T00:00:00Z".to_string(), scope: None },
        };
        let value = serde_json::to_value(&bundle).unwrap();
        assert_eq!(value["type"], "mixed");
        assert!(value.get("metadata").unwrap().get("source").is_none());
    }
}
