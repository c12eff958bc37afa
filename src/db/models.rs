use crate::hierarchy::FlatNode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MapMode {
    OneDay,
    #[default]
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportMeta {
    pub exported_by: String,
    #[serde(default)]
    pub mode: MapMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_day_mode_applied: Option<bool>,
}

impl Default for ExportMeta {
    fn default() -> Self {
        Self {
            exported_by: "cogmap-ai-fallback".to_string(),
            mode: MapMode::Full,
            one_day_mode_applied: Some(false),
        }
    }
}

/// A stored mind map document. `nodes` is the flat list exactly as the
/// generator produced it; the tree is rebuilt from it on every load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MindMap {
    pub map_id: String,
    pub title: String,
    /// RFC 3339
    pub created_at: String,
    #[serde(default)]
    pub nodes: Vec<FlatNode>,
    #[serde(default)]
    pub export_meta: ExportMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub is_saved: bool,
    #[serde(default)]
    pub node_count: usize,
    /// Text the map was generated from, used as chat context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
}

/// Row in a user's map listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MapSummary {
    pub map_id: String,
    pub title: String,
    pub created_at: String,
    pub node_count: usize,
}

/// One note per (map, node); `id` equals `node_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub node_id: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    #[default]
    Detailed,
    Simplest,
}

impl DetailLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::Detailed => "detailed",
            DetailLevel::Simplest => "simplest",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "detailed" => Some(DetailLevel::Detailed),
            "simplest" => Some(DetailLevel::Simplest),
            _ => None,
        }
    }
}

/// Per-node explanation. The `schemaVersion` tag says which optional
/// attachment the record may carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeSummary {
    #[serde(rename = "nodeId")]
    pub node_id: String,
    pub tl_dr: String,
    pub detailed: String,
    pub analogy: String,
    #[serde(flatten)]
    pub attachment: SummaryAttachment,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "schemaVersion")]
pub enum SummaryAttachment {
    /// Text only
    #[serde(rename = "1")]
    None,
    /// Text plus an illustration
    #[serde(rename = "2", rename_all = "camelCase")]
    Image {
        #[serde(default)]
        image_url: Option<String>,
    },
    /// Text plus the source passage it was grounded on
    #[serde(rename = "3", rename_all = "camelCase")]
    Context {
        #[serde(default)]
        context_excerpt: Option<String>,
    },
}

impl NodeSummary {
    pub fn schema_version(&self) -> u8 {
        match self.attachment {
            SummaryAttachment::None => 1,
            SummaryAttachment::Image { .. } => 2,
            SummaryAttachment::Context { .. } => 3,
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        match &self.attachment {
            SummaryAttachment::Image { image_url } => image_url.as_deref(),
            _ => None,
        }
    }

    pub fn context_excerpt(&self) -> Option<&str> {
        match &self.attachment {
            SummaryAttachment::Context { context_excerpt } => context_excerpt.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mind_map_wire_names() {
        let map = MindMap {
            map_id: "map-1".into(),
            title: "T".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
            nodes: vec![FlatNode::root("a", "Root")],
            export_meta: ExportMeta::default(),
            user_id: None,
            is_saved: true,
            node_count: 1,
            source_text: None,
        };
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["mapId"], "map-1");
        assert_eq!(json["exportMeta"]["exportedBy"], "cogmap-ai-fallback");
        assert_eq!(json["exportMeta"]["mode"], "full");
        assert_eq!(json["exportMeta"]["oneDayModeApplied"], false);
        assert_eq!(json["nodeCount"], 1);
        assert!(json.get("userId").is_none());
        assert!(json["nodes"][0].get("parentId").is_none());
    }

    #[test]
    fn test_mode_wire_names() {
        assert_eq!(serde_json::to_value(MapMode::OneDay).unwrap(), "oneday");
        let meta: ExportMeta = serde_json::from_str(r#"{"exportedBy":"x","mode":"oneday"}"#).unwrap();
        assert_eq!(meta.mode, MapMode::OneDay);
        assert_eq!(meta.one_day_mode_applied, None);
    }

    #[test]
    fn test_summary_versions() {
        let v1: NodeSummary = serde_json::from_str(
            r#"{"nodeId":"n","tl_dr":"a","detailed":"b","analogy":"c","schemaVersion":"1"}"#,
        )
        .unwrap();
        assert_eq!(v1.schema_version(), 1);
        assert_eq!(v1.image_url(), None);

        let v2: NodeSummary = serde_json::from_str(
            r#"{"nodeId":"n","tl_dr":"a","detailed":"b","analogy":"c","schemaVersion":"2","imageUrl":"http://img"}"#,
        )
        .unwrap();
        assert_eq!(v2.schema_version(), 2);
        assert_eq!(v2.image_url(), Some("http://img"));

        let v3 = NodeSummary {
            node_id: "n".into(),
            tl_dr: "a".into(),
            detailed: "b".into(),
            analogy: "c".into(),
            attachment: SummaryAttachment::Context { context_excerpt: Some("src".into()) },
        };
        let json = serde_json::to_value(&v3).unwrap();
        assert_eq!(json["schemaVersion"], "3");
        assert_eq!(json["contextExcerpt"], "src");
        assert_eq!(serde_json::from_value::<NodeSummary>(json).unwrap(), v3);
    }

    #[test]
    fn test_summary_image_may_be_absent() {
        let v2: NodeSummary = serde_json::from_str(
            r#"{"nodeId":"n","tl_dr":"a","detailed":"b","analogy":"c","schemaVersion":"2"}"#,
        )
        .unwrap();
        assert_eq!(v2.schema_version(), 2);
        assert_eq!(v2.image_url(), None);
    }
}
