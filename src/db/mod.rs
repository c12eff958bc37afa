mod schema;
mod models;

pub use schema::Database;
pub use models::{DetailLevel, ExportMeta, MapMode, MapSummary, MindMap, Note, NodeSummary, SummaryAttachment};

use crate::error::Result;

/// Document store for maps, their notes, and cached node summaries.
/// Everything is scoped to a user.
pub trait MapStore: Send + Sync {
    /// Insert or replace a map. The stored copy is marked saved and its
    /// node count is taken from `map.nodes`.
    fn save_map(&self, user: &str, map: &MindMap) -> Result<()>;
    fn get_map(&self, user: &str, map_id: &str) -> Result<Option<MindMap>>;
    /// Most recently saved first
    fn list_maps(&self, user: &str) -> Result<Vec<MapSummary>>;
    /// Removes the map with its notes and summaries. False if it didn't exist.
    fn delete_map(&self, user: &str, map_id: &str) -> Result<bool>;

    /// Create or overwrite the note on a node, keeping its original
    /// creation time.
    fn save_note(&self, user: &str, map_id: &str, node_id: &str, content: &str) -> Result<Note>;
    fn get_note(&self, user: &str, map_id: &str, node_id: &str) -> Result<Option<Note>>;
    fn list_notes(&self, user: &str, map_id: &str) -> Result<Vec<Note>>;

    fn cache_summary(&self, user: &str, map_id: &str, detail: DetailLevel, summary: &NodeSummary) -> Result<()>;
    fn get_summary(&self, user: &str, map_id: &str, node_id: &str, detail: DetailLevel) -> Result<Option<NodeSummary>>;
}
