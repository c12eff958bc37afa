use super::models::{DetailLevel, ExportMeta, MapSummary, MindMap, Note, NodeSummary};
use super::MapStore;
use crate::error::{CogmapError, Result};
use crate::hierarchy::FlatNode;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

pub struct Database {
    conn: Mutex<Connection>,
    path: String,
}

impl Database {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CogmapError::InvalidInput(format!("Cannot create {}: {}", parent.display(), e))
                })?;
            }
        }
        let conn = Connection::open(&path)?;
        let db = Database { conn: Mutex::new(conn), path: path_str };
        db.init()?;
        Ok(db)
    }

    pub fn get_path(&self) -> String {
        self.path.clone()
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn: Mutex::new(conn), path: ":memory:".to_string() };
        db.init()?;
        Ok(db)
    }

    /// Lock the connection, recovering from a poisoned mutex
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn init(&self) -> Result<()> {
        let conn = self.conn();

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS maps (
                user_id TEXT NOT NULL,
                map_id TEXT NOT NULL,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                -- Flat node list as the generator returned it (JSON array)
                map_data TEXT NOT NULL,
                node_count INTEGER NOT NULL DEFAULT 0,
                export_meta TEXT,
                source_text TEXT,
                saved_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, map_id)
            );

            CREATE TABLE IF NOT EXISTS notes (
                user_id TEXT NOT NULL,
                map_id TEXT NOT NULL,
                node_id TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, map_id, node_id),
                FOREIGN KEY (user_id, map_id) REFERENCES maps(user_id, map_id) ON DELETE CASCADE
            );

            -- Cached node explanations, one per detail level
            CREATE TABLE IF NOT EXISTS summaries (
                user_id TEXT NOT NULL,
                map_id TEXT NOT NULL,
                node_id TEXT NOT NULL,
                detail_level TEXT NOT NULL,
                summary TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, map_id, node_id, detail_level),
                FOREIGN KEY (user_id, map_id) REFERENCES maps(user_id, map_id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_maps_user ON maps(user_id, saved_at);
            ",
        )?;

        Ok(())
    }

    /// Online copy of the whole database to `dest`
    pub fn backup_to(&self, dest: &str) -> Result<()> {
        let conn = self.conn();
        let mut target = Connection::open(dest)?;
        let backup = rusqlite::backup::Backup::new(&conn, &mut target)?;
        backup.run_to_completion(256, Duration::from_millis(5), None)?;
        tracing::info!(dest, "Database backup written");
        Ok(())
    }

    fn map_exists(conn: &Connection, user: &str, map_id: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM maps WHERE user_id = ?1 AND map_id = ?2",
            params![user, map_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn row_to_map(row: &rusqlite::Row) -> rusqlite::Result<(MindMap, String, Option<String>)> {
        let map = MindMap {
            user_id: row.get(0)?,
            map_id: row.get(1)?,
            title: row.get(2)?,
            created_at: row.get(3)?,
            nodes: Vec::new(),
            export_meta: ExportMeta::default(),
            node_count: row.get::<_, i64>(5)?.max(0) as usize,
            is_saved: true,
            source_text: row.get(7)?,
        };
        Ok((map, row.get(4)?, row.get(6)?))
    }

    fn row_to_note(row: &rusqlite::Row) -> rusqlite::Result<Note> {
        let node_id: String = row.get(0)?;
        Ok(Note {
            id: node_id.clone(),
            node_id,
            content: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }

    const MAP_COLUMNS: &'static str =
        "user_id, map_id, title, created_at, map_data, node_count, export_meta, source_text";
}

impl MapStore for Database {
    fn save_map(&self, user: &str, map: &MindMap) -> Result<()> {
        let map_data = serde_json::to_string(&map.nodes)?;
        let export_meta = serde_json::to_string(&map.export_meta)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO maps (user_id, map_id, title, created_at, map_data, node_count, export_meta, source_text, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(user_id, map_id) DO UPDATE SET
                title = excluded.title,
                map_data = excluded.map_data,
                node_count = excluded.node_count,
                export_meta = excluded.export_meta,
                source_text = COALESCE(excluded.source_text, maps.source_text),
                saved_at = excluded.saved_at",
            params![
                user,
                map.map_id,
                map.title,
                map.created_at,
                map_data,
                map.nodes.len() as i64,
                export_meta,
                map.source_text,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn get_map(&self, user: &str, map_id: &str) -> Result<Option<MindMap>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                &format!("SELECT {} FROM maps WHERE user_id = ?1 AND map_id = ?2", Self::MAP_COLUMNS),
                params![user, map_id],
                Self::row_to_map,
            )
            .optional()?;

        let Some((mut map, map_data, export_meta)) = row else {
            return Ok(None);
        };
        map.nodes = serde_json::from_str::<Vec<FlatNode>>(&map_data)?;
        if let Some(meta) = export_meta {
            map.export_meta = serde_json::from_str(&meta)?;
        }
        Ok(Some(map))
    }

    fn list_maps(&self, user: &str) -> Result<Vec<MapSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT map_id, title, created_at, node_count FROM maps
             WHERE user_id = ?1 ORDER BY saved_at DESC, map_id",
        )?;
        let maps = stmt
            .query_map(params![user], |row| {
                Ok(MapSummary {
                    map_id: row.get(0)?,
                    title: row.get(1)?,
                    created_at: row.get(2)?,
                    node_count: row.get::<_, i64>(3)?.max(0) as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(maps)
    }

    fn delete_map(&self, user: &str, map_id: &str) -> Result<bool> {
        let conn = self.conn();
        let deleted = conn.execute(
            "DELETE FROM maps WHERE user_id = ?1 AND map_id = ?2",
            params![user, map_id],
        )?;
        Ok(deleted > 0)
    }

    fn save_note(&self, user: &str, map_id: &str, node_id: &str, content: &str) -> Result<Note> {
        let conn = self.conn();
        if !Self::map_exists(&conn, user, map_id)? {
            return Err(CogmapError::NotFound(format!("Map '{}'", map_id)));
        }
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        conn.execute(
            "INSERT INTO notes (user_id, map_id, node_id, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(user_id, map_id, node_id) DO UPDATE SET
                content = excluded.content,
                updated_at = excluded.updated_at",
            params![user, map_id, node_id, content, now],
        )?;
        let note = conn.query_row(
            "SELECT node_id, content, created_at, updated_at FROM notes
             WHERE user_id = ?1 AND map_id = ?2 AND node_id = ?3",
            params![user, map_id, node_id],
            Self::row_to_note,
        )?;
        Ok(note)
    }

    fn get_note(&self, user: &str, map_id: &str, node_id: &str) -> Result<Option<Note>> {
        let conn = self.conn();
        let note = conn
            .query_row(
                "SELECT node_id, content, created_at, updated_at FROM notes
                 WHERE user_id = ?1 AND map_id = ?2 AND node_id = ?3",
                params![user, map_id, node_id],
                Self::row_to_note,
            )
            .optional()?;
        Ok(note)
    }

    fn list_notes(&self, user: &str, map_id: &str) -> Result<Vec<Note>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT node_id, content, created_at, updated_at FROM notes
             WHERE user_id = ?1 AND map_id = ?2 ORDER BY updated_at DESC, node_id",
        )?;
        let notes = stmt
            .query_map(params![user, map_id], Self::row_to_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }

    fn cache_summary(&self, user: &str, map_id: &str, detail: DetailLevel, summary: &NodeSummary) -> Result<()> {
        let json = serde_json::to_string(summary)?;
        let conn = self.conn();
        if !Self::map_exists(&conn, user, map_id)? {
            return Err(CogmapError::NotFound(format!("Map '{}'", map_id)));
        }
        conn.execute(
            "INSERT OR REPLACE INTO summaries (user_id, map_id, node_id, detail_level, summary, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user,
                map_id,
                summary.node_id,
                detail.as_str(),
                json,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn get_summary(&self, user: &str, map_id: &str, node_id: &str, detail: DetailLevel) -> Result<Option<NodeSummary>> {
        let conn = self.conn();
        let json: Option<String> = conn
            .query_row(
                "SELECT summary FROM summaries
                 WHERE user_id = ?1 AND map_id = ?2 AND node_id = ?3 AND detail_level = ?4",
                params![user, map_id, node_id, detail.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SummaryAttachment;
    use tempfile::TempDir;

    fn sample_map(id: &str) -> MindMap {
        MindMap {
            map_id: id.to_string(),
            title: "Cells".to_string(),
            created_at: "2026-03-01T12:00:00+00:00".to_string(),
            nodes: vec![
                FlatNode::root("a", "Cells"),
                FlatNode::child("b", "Nucleus", "a"),
                FlatNode::child("c", "Mitochondria", "a"),
            ],
            export_meta: ExportMeta::default(),
            user_id: None,
            is_saved: false,
            node_count: 0,
            source_text: Some("Cells have organelles.".to_string()),
        }
    }

    fn summary(node_id: &str) -> NodeSummary {
        NodeSummary {
            node_id: node_id.to_string(),
            tl_dr: "Powerhouse.".to_string(),
            detailed: "Makes ATP.".to_string(),
            analogy: "A power plant.".to_string(),
            attachment: SummaryAttachment::None,
        }
    }

    #[test]
    fn test_save_and_load_map() {
        let db = Database::in_memory().unwrap();
        db.save_map("u1", &sample_map("m1")).unwrap();

        let map = db.get_map("u1", "m1").unwrap().unwrap();
        assert_eq!(map.nodes, sample_map("m1").nodes);
        assert_eq!(map.node_count, 3);
        assert!(map.is_saved);
        assert_eq!(map.user_id.as_deref(), Some("u1"));
        assert_eq!(map.source_text.as_deref(), Some("Cells have organelles."));
        assert_eq!(map.export_meta, ExportMeta::default());
    }

    #[test]
    fn test_maps_are_scoped_per_user() {
        let db = Database::in_memory().unwrap();
        db.save_map("u1", &sample_map("m1")).unwrap();
        assert!(db.get_map("u2", "m1").unwrap().is_none());
        assert!(db.list_maps("u2").unwrap().is_empty());
        assert!(!db.delete_map("u2", "m1").unwrap());
    }

    #[test]
    fn test_save_map_upserts() {
        let db = Database::in_memory().unwrap();
        db.save_map("u1", &sample_map("m1")).unwrap();

        let mut edited = sample_map("m1");
        edited.title = "Cell Biology".to_string();
        edited.nodes.pop();
        edited.source_text = None;
        db.save_map("u1", &edited).unwrap();

        let maps = db.list_maps("u1").unwrap();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].title, "Cell Biology");
        assert_eq!(maps[0].node_count, 2);
        // Source text survives a save that doesn't carry it
        let map = db.get_map("u1", "m1").unwrap().unwrap();
        assert_eq!(map.source_text.as_deref(), Some("Cells have organelles."));
    }

    #[test]
    fn test_notes_merge_and_cascade() {
        let db = Database::in_memory().unwrap();
        db.save_map("u1", &sample_map("m1")).unwrap();

        let first = db.save_note("u1", "m1", "b", "remember the envelope").unwrap();
        assert_eq!(first.id, "b");
        let second = db.save_note("u1", "m1", "b", "double membrane").unwrap();
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.content, "double membrane");
        assert!(second.updated_at >= first.updated_at);

        db.save_note("u1", "m1", "c", "ATP").unwrap();
        assert_eq!(db.list_notes("u1", "m1").unwrap().len(), 2);
        assert!(db.get_note("u1", "m1", "zzz").unwrap().is_none());

        assert!(db.delete_map("u1", "m1").unwrap());
        assert!(db.list_notes("u1", "m1").unwrap().is_empty());
    }

    #[test]
    fn test_note_on_missing_map() {
        let db = Database::in_memory().unwrap();
        let err = db.save_note("u1", "nope", "a", "x").unwrap_err();
        assert!(matches!(err, CogmapError::NotFound(_)));
    }

    #[test]
    fn test_summary_cache_by_detail_level() {
        let db = Database::in_memory().unwrap();
        db.save_map("u1", &sample_map("m1")).unwrap();
        db.cache_summary("u1", "m1", DetailLevel::Detailed, &summary("c")).unwrap();

        let hit = db.get_summary("u1", "m1", "c", DetailLevel::Detailed).unwrap();
        assert_eq!(hit, Some(summary("c")));
        assert!(db.get_summary("u1", "m1", "c", DetailLevel::Simplest).unwrap().is_none());

        db.delete_map("u1", "m1").unwrap();
        assert!(db.get_summary("u1", "m1", "c", DetailLevel::Detailed).unwrap().is_none());
    }

    #[test]
    fn test_file_database_and_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("cogmap.db");
        {
            let db = Database::new(&path).unwrap();
            db.save_map("u1", &sample_map("m1")).unwrap();
            let backup = dir.path().join("backup.db");
            db.backup_to(&backup.to_string_lossy()).unwrap();
            let copy = Database::new(&backup).unwrap();
            assert!(copy.get_map("u1", "m1").unwrap().is_some());
        }
        let reopened = Database::new(&path).unwrap();
        assert_eq!(reopened.list_maps("u1").unwrap().len(), 1);
        assert_eq!(reopened.get_path(), path.to_string_lossy());
    }

    #[test]
    fn test_corrupt_map_data_is_an_encoding_error() {
        let db = Database::in_memory().unwrap();
        db.save_map("u1", &sample_map("m1")).unwrap();
        db.conn()
            .execute("UPDATE maps SET map_data = 'not json' WHERE map_id = 'm1'", [])
            .unwrap();
        assert!(matches!(db.get_map("u1", "m1"), Err(CogmapError::Encoding(_))));
    }
}
