//! Read-only access to the gazetteer file, an SQLite database produced by an
//! out-of-band ETL. The server never writes to it.
//!
//! Expected layout:
//!
//! ```sql
//! CREATE TABLE place (
//!     id TEXT PRIMARY KEY,
//!     name TEXT NOT NULL,
//!     name_norm TEXT NOT NULL,
//!     alt_names TEXT NOT NULL DEFAULT '',
//!     lat REAL NOT NULL,
//!     lon REAL NOT NULL,
//!     place_class TEXT NOT NULL,
//!     municipality_code TEXT,
//!     municipality_name TEXT,
//!     county_name TEXT,
//!     importance REAL NOT NULL DEFAULT 0,
//!     county_seat INTEGER NOT NULL DEFAULT 0,
//!     municipality_seat INTEGER NOT NULL DEFAULT 0
//! );
//! CREATE INDEX place_name_norm_idx ON place (name_norm);
//! CREATE TABLE place_alt (place_id TEXT NOT NULL, name_norm TEXT NOT NULL);
//! CREATE INDEX place_alt_name_idx ON place_alt (name_norm);
//! CREATE VIRTUAL TABLE place_fts USING fts5(
//!     name, alt_names, content='place', content_rowid='rowid',
//!     tokenize='unicode61'
//! );
//! CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
//! ```
//!
//! The unicode61 tokenizer keeps æ/ø/å as letters, so full-text lookups work
//! for Norwegian names without transliteration.

use crate::model::{PlaceClass, PlaceRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GazetteerError {
    #[error("gazetteer file not found: {0}")]
    Missing(String),

    #[error("gazetteer query failed: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GazetteerInfo {
    pub record_count: i64,
    pub build_date: Option<String>,
}

const PLACE_COLUMNS: &str = "p.id, p.name, p.alt_names, p.lat, p.lon, p.place_class, \
     p.municipality_code, p.municipality_name, p.county_name, p.importance, \
     p.county_seat, p.municipality_seat";

#[derive(Debug, Clone)]
pub struct GazetteerStore {
    pool: SqlitePool,
}

impl GazetteerStore {
    /// Opens the file read-only; fails when it does not exist so the caller
    /// can continue without the resolver.
    pub async fn open(path: &Path) -> Result<Self, GazetteerError> {
        if !path.is_file() {
            return Err(GazetteerError::Missing(path.display().to_string()));
        }
        let options = SqliteConnectOptions::new().filename(path).read_only(true);
        let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;
        Ok(Self { pool })
    }

    pub async fn find_exact_primary(&self, name: &str) -> Result<Vec<PlaceRecord>, GazetteerError> {
        let sql = format!(
            "SELECT {PLACE_COLUMNS} FROM place p WHERE p.name_norm = ?1 \
             ORDER BY p.importance DESC, p.id"
        );
        let rows = sqlx::query(&sql).bind(name).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(place_from_row).collect())
    }

    pub async fn find_exact_alt(&self, name: &str) -> Result<Vec<PlaceRecord>, GazetteerError> {
        let sql = format!(
            "SELECT {PLACE_COLUMNS} FROM place p \
             JOIN place_alt a ON a.place_id = p.id \
             WHERE a.name_norm = ?1 \
             ORDER BY p.importance DESC, p.id"
        );
        let rows = sqlx::query(&sql).bind(name).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(place_from_row).collect())
    }

    /// Indexed full-text lookup. The second tuple element is a relevance
    /// score derived from bm25 (the raw rank is "lower is better"; this is
    /// its negation, so larger means a closer match).
    pub async fn find_full_text(
        &self, query: &str, limit: u32,
    ) -> Result<Vec<(PlaceRecord, f64)>, GazetteerError> {
        let match_expr = fts_match_expression(query);
        if match_expr.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {PLACE_COLUMNS}, place_fts.rank AS rank FROM place_fts \
             JOIN place p ON p.rowid = place_fts.rowid \
             WHERE place_fts MATCH ?1 \
             ORDER BY place_fts.rank LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(&match_expr)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| {
                let rank: f64 = row.try_get("rank").unwrap_or(0.0);
                (place_from_row(row), -rank)
            })
            .collect())
    }

    pub async fn info(&self) -> Result<GazetteerInfo, GazetteerError> {
        let record_count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM place")
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;
        let build_date = sqlx::query("SELECT value FROM meta WHERE key = 'build_date'")
            .fetch_optional(&self.pool)
            .await?
            .and_then(|row| row.try_get::<String, _>("value").ok());
        Ok(GazetteerInfo { record_count, build_date })
    }
}

/// Escapes the query for FTS5: every token double-quoted, the last one as a
/// prefix term, so punctuation in user input cannot break the MATCH grammar.
fn fts_match_expression(query: &str) -> String {
    let tokens: Vec<String> = query
        .split_whitespace()
        .map(|token| format!("\"{}\"", token.replace('"', "\"\"")))
        .collect();
    match tokens.split_last() {
        None => String::new(),
        Some((last, head)) => {
            let mut parts: Vec<String> = head.to_vec();
            parts.push(format!("{last}*"));
            parts.join(" ")
        },
    }
}

fn place_from_row(row: &SqliteRow) -> PlaceRecord {
    let alt_names: String = row.try_get("alt_names").unwrap_or_default();
    let place_class: String = row.try_get("place_class").unwrap_or_default();
    PlaceRecord {
        id: row.try_get("id").unwrap_or_default(),
        name: row.try_get("name").unwrap_or_default(),
        alt_names: alt_names
            .split('|')
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
        lat: row.try_get("lat").unwrap_or_default(),
        lon: row.try_get("lon").unwrap_or_default(),
        place_class: PlaceClass::from_str(&place_class).unwrap_or(PlaceClass::Settlement),
        municipality_code: row.try_get("municipality_code").ok().flatten(),
        municipality_name: row.try_get("municipality_name").ok().flatten(),
        county_name: row.try_get("county_name").ok().flatten(),
        importance: row.try_get("importance").unwrap_or_default(),
        county_seat: row.try_get::<i64, _>("county_seat").unwrap_or_default() != 0,
        municipality_seat: row.try_get::<i64, _>("municipality_seat").unwrap_or_default() != 0,
    }
}
