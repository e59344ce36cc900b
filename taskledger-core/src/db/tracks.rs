use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{in_clause, insert_row, parse_column, rank_values, row_exists, Database};
use crate::error::{Error, Result};
use crate::graph;
use crate::models::{self_dependency, TaskFilter, Track, TrackFilter, TrackStatus, TrackWithTasks};
use crate::repository::{TaskStore, TrackStore};

const COLUMNS: &str =
    "id, roadmap_id, title, description, status, rank, created_at, updated_at";

/// Reads the track columns; dependencies are filled in by the caller.
fn track_from_row(row: &Row) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        roadmap_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        status: parse_column(4, row.get(4)?, TrackStatus::from_str)?,
        rank: row.get(5)?,
        dependencies: Vec::new(),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub(super) fn load_dependencies(conn: &Connection, track_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT depends_on_id FROM track_dependencies WHERE track_id = ?1 ORDER BY depends_on_id",
    )?;
    let deps = stmt
        .query_map([track_id], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(deps)
}

fn track_exists(conn: &Connection, id: &str) -> Result<bool> {
    row_exists(conn, "SELECT 1 FROM tracks WHERE id = ?1", [id])
}

/// Delete-all-then-reinsert of the outgoing edges of `track`, followed by a
/// cycle check from the track. Must run inside the caller's transaction.
fn replace_dependencies(conn: &Connection, track: &Track) -> Result<()> {
    conn.execute(
        "DELETE FROM track_dependencies WHERE track_id = ?1",
        [&track.id],
    )?;
    for dep in &track.dependencies {
        if !track_exists(conn, dep)? {
            return Err(Error::not_found("track", dep));
        }
        insert_row(
            conn,
            "track dependency",
            &format!("{} -> {dep}", track.id),
            "INSERT INTO track_dependencies (track_id, depends_on_id) VALUES (?1, ?2)",
            [&track.id, dep],
        )?;
    }
    graph::validate_no_cycles(&track.id, |id| load_dependencies(conn, id))
}

pub(super) fn load_track(conn: &Connection, id: &str) -> Result<Track> {
    let mut track = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM tracks WHERE id = ?1"),
            [id],
            track_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("track", id))?;
    track.dependencies = load_dependencies(conn, id)?;
    Ok(track)
}

impl TrackStore for Database {
    fn save_track(&self, track: &Track) -> Result<()> {
        track.validate()?;
        let tx = self.write_tx()?;
        if track_exists(&tx, &track.id)? {
            return Err(Error::already_exists("track", &track.id));
        }
        if !row_exists(&tx, "SELECT 1 FROM roadmaps WHERE id = ?1", [&track.roadmap_id])? {
            return Err(Error::not_found("roadmap", &track.roadmap_id));
        }
        insert_row(
            &tx,
            "track",
            &track.id,
            &format!("INSERT INTO tracks ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                track.id,
                track.roadmap_id,
                track.title,
                track.description,
                track.status.as_str(),
                track.rank,
                track.created_at,
                track.updated_at,
            ],
        )?;
        replace_dependencies(&tx, track)?;
        tx.commit()?;
        debug!(track_id = %track.id, deps = track.dependencies.len(), "saved track");
        Ok(())
    }

    fn get_track(&self, id: &str) -> Result<Track> {
        load_track(&self.conn, id)
    }

    fn list_tracks(&self, roadmap_id: &str, filter: &TrackFilter) -> Result<Vec<Track>> {
        let mut sql = format!("SELECT {COLUMNS} FROM tracks WHERE roadmap_id = ?");
        let mut args: Vec<Value> = vec![Value::Text(roadmap_id.to_string())];
        if let Some(clause) = in_clause("status", filter.statuses.len()) {
            sql.push_str(" AND ");
            sql.push_str(&clause);
            args.extend(
                filter
                    .statuses
                    .iter()
                    .map(|s| Value::Text(s.as_str().to_string())),
            );
        }
        if let Some(clause) = in_clause("rank", filter.ranks.len()) {
            sql.push_str(" AND ");
            sql.push_str(&clause);
            args.extend(rank_values(&filter.ranks));
        }
        sql.push_str(" ORDER BY rank, id");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut tracks = stmt
            .query_map(params_from_iter(args), track_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for track in &mut tracks {
            track.dependencies = load_dependencies(&self.conn, &track.id)?;
        }
        Ok(tracks)
    }

    fn update_track(&self, track: &Track) -> Result<()> {
        track.validate()?;
        let tx = self.write_tx()?;
        if !row_exists(&tx, "SELECT 1 FROM roadmaps WHERE id = ?1", [&track.roadmap_id])? {
            return Err(Error::not_found("roadmap", &track.roadmap_id));
        }
        let changed = tx.execute(
            "UPDATE tracks SET roadmap_id = ?2, title = ?3, description = ?4, status = ?5, \
             rank = ?6, updated_at = ?7 WHERE id = ?1",
            params![
                track.id,
                track.roadmap_id,
                track.title,
                track.description,
                track.status.as_str(),
                track.rank,
                track.updated_at,
            ],
        )?;
        if changed == 0 {
            return Err(Error::not_found("track", &track.id));
        }
        replace_dependencies(&tx, track)?;
        tx.commit()?;
        debug!(track_id = %track.id, "updated track");
        Ok(())
    }

    fn delete_track(&self, id: &str) -> Result<()> {
        let changed = self.conn.execute("DELETE FROM tracks WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(Error::not_found("track", id));
        }
        debug!(track_id = %id, "deleted track");
        Ok(())
    }

    fn add_track_dependency(&self, track_id: &str, depends_on: &str) -> Result<()> {
        if track_id == depends_on {
            return Err(self_dependency(track_id));
        }
        let tx = self.write_tx()?;
        for id in [track_id, depends_on] {
            if !track_exists(&tx, id)? {
                return Err(Error::not_found("track", id));
            }
        }
        insert_row(
            &tx,
            "track dependency",
            &format!("{track_id} -> {depends_on}"),
            "INSERT INTO track_dependencies (track_id, depends_on_id) VALUES (?1, ?2)",
            [track_id, depends_on],
        )?;
        graph::validate_no_cycles(track_id, |id| load_dependencies(&tx, id))?;
        tx.execute(
            "UPDATE tracks SET updated_at = ?2 WHERE id = ?1",
            params![track_id, chrono::Utc::now()],
        )?;
        tx.commit()?;
        debug!(track_id, depends_on, "added track dependency");
        Ok(())
    }

    fn remove_track_dependency(&self, track_id: &str, depends_on: &str) -> Result<()> {
        let tx = self.write_tx()?;
        let changed = tx.execute(
            "DELETE FROM track_dependencies WHERE track_id = ?1 AND depends_on_id = ?2",
            [track_id, depends_on],
        )?;
        if changed == 0 {
            return Err(Error::not_found(
                "track dependency",
                format!("{track_id} -> {depends_on}"),
            ));
        }
        tx.execute(
            "UPDATE tracks SET updated_at = ?2 WHERE id = ?1",
            params![track_id, chrono::Utc::now()],
        )?;
        tx.commit()?;
        debug!(track_id, depends_on, "removed track dependency");
        Ok(())
    }

    fn track_dependencies(&self, track_id: &str) -> Result<Vec<String>> {
        if !track_exists(&self.conn, track_id)? {
            return Err(Error::not_found("track", track_id));
        }
        load_dependencies(&self.conn, track_id)
    }

    fn validate_no_cycles(&self, track_id: &str) -> Result<()> {
        if !track_exists(&self.conn, track_id)? {
            return Err(Error::not_found("track", track_id));
        }
        graph::validate_no_cycles(track_id, |id| load_dependencies(&self.conn, id))
    }

    fn track_with_tasks(&self, id: &str) -> Result<TrackWithTasks> {
        let track = self.get_track(id)?;
        let tasks = self.list_tasks(&TaskFilter {
            track_id: Some(id.to_string()),
            ..Default::default()
        })?;
        Ok(TrackWithTasks { track, tasks })
    }
}
