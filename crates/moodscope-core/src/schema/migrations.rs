/// A schema migration.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const MIGRATION_001: &str = r"
-- One row per completed analysis; rows are never updated
CREATE TABLE IF NOT EXISTS analyses (
    id TEXT PRIMARY KEY,
    playlist_id TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    provenance TEXT NOT NULL,
    total_tracks INTEGER NOT NULL,
    dominant_mood TEXT NOT NULL,
    avg_mood_score REAL NOT NULL,
    summary_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_analyses_playlist_id ON analyses(playlist_id);
CREATE INDEX IF NOT EXISTS idx_analyses_recorded_at ON analyses(recorded_at);
";

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "analyses",
    sql: MIGRATION_001,
}];
