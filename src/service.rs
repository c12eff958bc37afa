//! Mind map operations shared by the HTTP server and the CLI
//!
//! `MindMapService` owns nothing global: the store, the text generator and
//! the layout constants are handed in once at startup.

use crate::ai_client::{self, GenerateOptions, GenerateRequest, InputType, TextGenerator, VoiceCommand};
use crate::db::{DetailLevel, MapStore, MapSummary, MindMap, Note, NodeSummary};
use crate::error::{CogmapError, Result};
use crate::export::{export_map, ExportFormat, ExportedFile};
use crate::hierarchy::{build_hierarchy_with_report, BuildReport, TreeNode, MAX_DEPTH};
use crate::layout::{layout, LayoutConfig, TreeLayout};
use crate::pdf_extractor::extract_text_from_pdf;
use serde::Serialize;
use std::sync::Arc;

/// A stored map together with the tree rebuilt from it.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedMap {
    #[serde(flatten)]
    pub map: MindMap,
    pub root: TreeNode,
    pub report: BuildReport,
}

#[derive(Clone)]
pub struct MindMapService {
    store: Arc<dyn MapStore>,
    generator: Arc<dyn TextGenerator>,
    layout: LayoutConfig,
}

impl MindMapService {
    pub fn new(store: Arc<dyn MapStore>, generator: Arc<dyn TextGenerator>, layout: LayoutConfig) -> Self {
        Self { store, generator, layout }
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Rebuild the tree of `map`; a node list without a usable root is
    /// `Unbuildable`, one deeper than [`MAX_DEPTH`] is `TooDeep`.
    fn assemble(map: MindMap) -> Result<LoadedMap> {
        let build = build_hierarchy_with_report(&map.nodes);
        let root = build.root.ok_or(CogmapError::Unbuildable)?;
        let depth = root.depth();
        if depth > MAX_DEPTH {
            return Err(CogmapError::TooDeep { depth, limit: MAX_DEPTH });
        }
        Ok(LoadedMap { map, root, report: build.report })
    }

    // ========================================================================
    // Generation
    // ========================================================================

    /// Generate a map from text or a transcript and save it for `user`.
    pub async fn generate(&self, user: &str, request: GenerateRequest) -> Result<LoadedMap> {
        if request.payload.trim().is_empty() {
            return Err(CogmapError::InvalidInput("Input text is empty".to_string()));
        }

        let mut map = ai_client::generate_mind_map(self.generator.as_ref(), &request)
            .await
            .map_err(CogmapError::Ai)?;
        map.user_id = Some(user.to_string());

        // Notes and cached summaries are keyed by map id, so a reused id would
        // attach the old map's data to the new nodes
        if self.store.get_map(user, &map.map_id)?.is_some() {
            let fresh = format!("map-{}", uuid::Uuid::new_v4());
            tracing::warn!(user, taken = %map.map_id, map_id = %fresh, "Map id already in use, minted a new one");
            map.map_id = fresh;
        }

        let mut loaded = Self::assemble(map)?;
        if !loaded.report.is_clean() {
            tracing::warn!(
                map_id = %loaded.map.map_id,
                issues = loaded.report.issues.len(),
                reachable = loaded.report.reachable,
                "Generated node list needed repairs"
            );
        }

        self.store.save_map(user, &loaded.map)?;
        loaded.map.is_saved = true;
        loaded.map.node_count = loaded.map.nodes.len();

        tracing::info!(
            user,
            map_id = %loaded.map.map_id,
            title = %loaded.map.title,
            nodes = loaded.report.reachable,
            "Mind map generated"
        );
        Ok(loaded)
    }

    /// Extract the text layer of a PDF and generate from it.
    pub async fn generate_from_pdf(&self, user: &str, pdf: &[u8], detail_level: DetailLevel) -> Result<LoadedMap> {
        let text = extract_text_from_pdf(pdf).map_err(CogmapError::Pdf)?;
        let request = GenerateRequest {
            input_type: InputType::File,
            payload: text,
            options: GenerateOptions { detail_level },
        };
        self.generate(user, request).await
    }

    // ========================================================================
    // Stored maps
    // ========================================================================

    pub fn load(&self, user: &str, map_id: &str) -> Result<LoadedMap> {
        let map = self
            .store
            .get_map(user, map_id)?
            .ok_or_else(|| CogmapError::NotFound(format!("Map '{}'", map_id)))?;
        Self::assemble(map)
    }

    pub fn list(&self, user: &str) -> Result<Vec<MapSummary>> {
        self.store.list_maps(user)
    }

    pub fn delete(&self, user: &str, map_id: &str) -> Result<()> {
        if self.store.delete_map(user, map_id)? {
            tracing::info!(user, map_id, "Mind map deleted");
            Ok(())
        } else {
            Err(CogmapError::NotFound(format!("Map '{}'", map_id)))
        }
    }

    pub fn layout(&self, user: &str, map_id: &str) -> Result<TreeLayout> {
        let loaded = self.load(user, map_id)?;
        Ok(layout(&loaded.root, &self.layout))
    }

    pub fn export(&self, user: &str, map_id: &str, format: ExportFormat) -> Result<ExportedFile> {
        let loaded = self.load(user, map_id)?;
        export_map(&loaded.map, format, &self.layout)
    }

    // ========================================================================
    // Node summaries
    // ========================================================================

    /// Explain one node. Answers are cached per detail level; the map's
    /// source text, when stored, grounds the explanation.
    pub async fn summarize(
        &self,
        user: &str,
        map_id: &str,
        node_id: &str,
        detail_level: DetailLevel,
    ) -> Result<NodeSummary> {
        let loaded = self.load(user, map_id)?;
        let node = loaded
            .root
            .find(node_id)
            .ok_or_else(|| CogmapError::NotFound(format!("Node '{}' in map '{}'", node_id, map_id)))?;

        if let Some(cached) = self.store.get_summary(user, map_id, node_id, detail_level)? {
            tracing::debug!(map_id, node_id, "Summary cache hit");
            return Ok(cached);
        }

        let summary = ai_client::summarize_node(
            self.generator.as_ref(),
            node_id,
            &node.label,
            detail_level,
            loaded.map.source_text.as_deref(),
        )
        .await
        .map_err(CogmapError::Ai)?;

        self.store.cache_summary(user, map_id, detail_level, &summary)?;
        Ok(summary)
    }

    // ========================================================================
    // Notes
    // ========================================================================

    pub fn save_note(&self, user: &str, map_id: &str, node_id: &str, content: &str) -> Result<Note> {
        let loaded = self.load(user, map_id)?;
        if loaded.root.find(node_id).is_none() {
            return Err(CogmapError::NotFound(format!("Node '{}' in map '{}'", node_id, map_id)));
        }
        self.store.save_note(user, map_id, node_id, content)
    }

    pub fn note(&self, user: &str, map_id: &str, node_id: &str) -> Result<Note> {
        self.store
            .get_note(user, map_id, node_id)?
            .ok_or_else(|| CogmapError::NotFound(format!("Note on node '{}'", node_id)))
    }

    pub fn notes(&self, user: &str, map_id: &str) -> Result<Vec<Note>> {
        if self.store.get_map(user, map_id)?.is_none() {
            return Err(CogmapError::NotFound(format!("Map '{}'", map_id)));
        }
        self.store.list_notes(user, map_id)
    }

    // ========================================================================
    // Chat and voice
    // ========================================================================

    /// Answer a question from the map's source text only. Maps saved
    /// without source text fall back to their node labels as context.
    pub async fn chat(&self, user: &str, map_id: &str, question: &str) -> Result<String> {
        if question.trim().is_empty() {
            return Err(CogmapError::InvalidInput("Question is empty".to_string()));
        }
        let loaded = self.load(user, map_id)?;
        let context = match loaded.map.source_text.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(text) => text.to_string(),
            None => serde_json::to_string_pretty(&loaded.root)?,
        };
        ai_client::context_chat(self.generator.as_ref(), question, &context)
            .await
            .map_err(CogmapError::Ai)
    }

    pub async fn voice_command(&self, transcript: &str) -> Result<VoiceCommand> {
        if transcript.trim().is_empty() {
            return Err(CogmapError::InvalidInput("Voice transcript is empty".to_string()));
        }
        ai_client::interpret_voice_command(self.generator.as_ref(), transcript)
            .await
            .map_err(CogmapError::Ai)
    }
}
