use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::PlaylistId;
use crate::provenance::Provenance;
use crate::summary::PlaylistSummary;
use crate::taxonomy::MoodCategory;

use super::migrations::MIGRATIONS;

/// One recorded analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEntry {
    pub id: Uuid,
    pub playlist_id: PlaylistId,
    pub recorded_at: DateTime<Utc>,
    pub provenance: Provenance,
    pub total_tracks: usize,
    pub dominant_mood: MoodCategory,
    pub summary: PlaylistSummary,
}

/// Append-only history of playlist analyses backed by SQLite.
#[derive(Debug)]
pub struct AnalysisLog {
    conn: Connection,
}

type RawRow = (String, String, String, String);

impl AnalysisLog {
    /// Open (or create) a log at the given path and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let log = Self { conn };
        log.apply_migrations()?;
        Ok(log)
    }

    /// Open an in-memory log (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let log = Self { conn };
        log.apply_migrations()?;
        Ok(log)
    }

    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    fn apply_migrations(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for migration in MIGRATIONS {
            if !applied.contains(&migration.version) {
                log::info!(
                    "Applying migration {} ({})",
                    migration.version,
                    migration.name
                );
                self.conn.execute_batch(migration.sql)?;
                self.conn.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, migration.name],
                )?;
            }
        }

        Ok(())
    }

    /// Append a summary for a playlist and return the stored entry.
    pub fn record(
        &self,
        playlist_id: &PlaylistId,
        summary: &PlaylistSummary,
    ) -> Result<AnalysisEntry> {
        let entry = AnalysisEntry {
            id: Uuid::new_v4(),
            playlist_id: playlist_id.clone(),
            recorded_at: Utc::now(),
            provenance: summary.provenance,
            total_tracks: summary.total_tracks,
            dominant_mood: summary.dominant_mood,
            summary: summary.clone(),
        };

        self.conn.execute(
            "INSERT INTO analyses (
                id, playlist_id, recorded_at, provenance, total_tracks,
                dominant_mood, avg_mood_score, summary_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                entry.id.to_string(),
                entry.playlist_id.as_str(),
                entry.recorded_at.to_rfc3339(),
                entry.provenance.as_str(),
                i64::try_from(entry.total_tracks).unwrap_or(i64::MAX),
                entry.dominant_mood.label(),
                summary.avg_mood_score,
                serde_json::to_string(summary)?,
            ],
        )?;
        log::debug!("Recorded analysis {} for playlist {}", entry.id, playlist_id);
        Ok(entry)
    }

    /// Fetch one entry by id.
    pub fn get(&self, id: &Uuid) -> Result<AnalysisEntry> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, playlist_id, recorded_at, summary_json
                 FROM analyses WHERE id = ?1",
                [id.to_string()],
                raw_row,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound {
                entity: "analysis",
                id: id.to_string(),
            })?;
        entry_from_raw(raw)
    }

    /// Most recent entries first, optionally restricted to one playlist.
    pub fn list(
        &self,
        playlist_id: Option<&PlaylistId>,
        limit: usize,
    ) -> Result<Vec<AnalysisEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<RawRow> = match playlist_id {
            Some(pid) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, playlist_id, recorded_at, summary_json FROM analyses
                     WHERE playlist_id = ?1
                     ORDER BY rowid DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(rusqlite::params![pid.as_str(), limit], raw_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, playlist_id, recorded_at, summary_json FROM analyses
                     ORDER BY rowid DESC LIMIT ?1",
                )?;
                let rows = stmt.query_map([limit], raw_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        rows.into_iter().map(entry_from_raw).collect()
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM analyses", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}

fn raw_row(row: &rusqlite::Row) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn entry_from_raw((id, playlist_id, recorded_at, summary_json): RawRow) -> Result<AnalysisEntry> {
    let id = Uuid::parse_str(&id)
        .map_err(|e| Error::InvalidData(format!("bad analysis id {id}: {e}")))?;
    let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
        .map_err(|e| Error::InvalidData(format!("bad timestamp {recorded_at}: {e}")))?
        .with_timezone(&Utc);
    let summary: PlaylistSummary = serde_json::from_str(&summary_json)?;

    Ok(AnalysisEntry {
        id,
        playlist_id: PlaylistId::new(playlist_id),
        recorded_at,
        provenance: summary.provenance,
        total_tracks: summary.total_tracks,
        dominant_mood: summary.dominant_mood,
        summary,
    })
}
