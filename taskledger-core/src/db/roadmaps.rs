use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::{insert_row, Database};
use crate::error::{Error, Result};
use crate::models::{Roadmap, RoadmapWithTracks, TrackFilter};
use crate::repository::{RoadmapStore, TrackStore};

const COLUMNS: &str = "id, vision, success_criteria, created_at, updated_at";

fn roadmap_from_row(row: &Row) -> rusqlite::Result<Roadmap> {
    Ok(Roadmap {
        id: row.get(0)?,
        vision: row.get(1)?,
        success_criteria: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

impl RoadmapStore for Database {
    fn save_roadmap(&self, roadmap: &Roadmap) -> Result<()> {
        roadmap.validate()?;
        insert_row(
            &self.conn,
            "roadmap",
            &roadmap.id,
            &format!("INSERT INTO roadmaps ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
            params![
                roadmap.id,
                roadmap.vision,
                roadmap.success_criteria,
                roadmap.created_at,
                roadmap.updated_at,
            ],
        )?;
        debug!(roadmap_id = %roadmap.id, "saved roadmap");
        Ok(())
    }

    fn get_roadmap(&self, id: &str) -> Result<Roadmap> {
        self.conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM roadmaps WHERE id = ?1"),
                [id],
                roadmap_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("roadmap", id))
    }

    fn active_roadmap(&self) -> Result<Option<Roadmap>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM roadmaps ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                [],
                roadmap_from_row,
            )
            .optional()?)
    }

    fn list_roadmaps(&self) -> Result<Vec<Roadmap>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM roadmaps ORDER BY created_at, rowid"
        ))?;
        let roadmaps = stmt
            .query_map([], roadmap_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(roadmaps)
    }

    fn update_roadmap(&self, roadmap: &Roadmap) -> Result<()> {
        roadmap.validate()?;
        let changed = self.conn.execute(
            "UPDATE roadmaps SET vision = ?2, success_criteria = ?3, updated_at = ?4 WHERE id = ?1",
            params![
                roadmap.id,
                roadmap.vision,
                roadmap.success_criteria,
                roadmap.updated_at,
            ],
        )?;
        if changed == 0 {
            return Err(Error::not_found("roadmap", &roadmap.id));
        }
        debug!(roadmap_id = %roadmap.id, "updated roadmap");
        Ok(())
    }

    fn delete_roadmap(&self, id: &str) -> Result<()> {
        let changed = self.conn.execute("DELETE FROM roadmaps WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(Error::not_found("roadmap", id));
        }
        debug!(roadmap_id = %id, "deleted roadmap");
        Ok(())
    }

    fn roadmap_with_tracks(&self, id: &str) -> Result<RoadmapWithTracks> {
        let roadmap = self.get_roadmap(id)?;
        let tracks = self.list_tracks(id, &TrackFilter::default())?;
        Ok(RoadmapWithTracks { roadmap, tracks })
    }
}
