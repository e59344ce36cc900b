use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{insert_row, parse_column, row_exists, Database};
use crate::error::{Error, Result};
use crate::models::{Adr, AdrStatus};
use crate::repository::AdrStore;

const COLUMNS: &str = "id, track_id, title, status, context, decision, consequences, \
                       alternatives, superseded_by, created_at, updated_at";

fn adr_from_row(row: &Row) -> rusqlite::Result<Adr> {
    Ok(Adr {
        id: row.get(0)?,
        track_id: row.get(1)?,
        title: row.get(2)?,
        status: parse_column(3, row.get(3)?, AdrStatus::from_str)?,
        context: row.get(4)?,
        decision: row.get(5)?,
        consequences: row.get(6)?,
        alternatives: row.get(7)?,
        superseded_by: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn load_adr(conn: &Connection, id: &str) -> Result<Adr> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM adrs WHERE id = ?1"),
        [id],
        adr_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("adr", id))
}

fn adr_exists(conn: &Connection, id: &str) -> Result<bool> {
    row_exists(conn, "SELECT 1 FROM adrs WHERE id = ?1", [id])
}

fn check_references(conn: &Connection, adr: &Adr) -> Result<()> {
    if !row_exists(conn, "SELECT 1 FROM tracks WHERE id = ?1", [&adr.track_id])? {
        return Err(Error::not_found("track", &adr.track_id));
    }
    if let Some(by) = &adr.superseded_by {
        if !adr_exists(conn, by)? {
            return Err(Error::not_found("adr", by));
        }
    }
    Ok(())
}

fn write_status(conn: &Connection, adr: &Adr) -> Result<()> {
    conn.execute(
        "UPDATE adrs SET status = ?2, superseded_by = ?3, updated_at = ?4 WHERE id = ?1",
        params![adr.id, adr.status.as_str(), adr.superseded_by, adr.updated_at],
    )?;
    Ok(())
}

impl AdrStore for Database {
    fn save_adr(&self, adr: &Adr) -> Result<()> {
        adr.validate()?;
        let tx = self.write_tx()?;
        if adr_exists(&tx, &adr.id)? {
            return Err(Error::already_exists("adr", &adr.id));
        }
        check_references(&tx, adr)?;
        insert_row(
            &tx,
            "adr",
            &adr.id,
            &format!(
                "INSERT INTO adrs ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                adr.id,
                adr.track_id,
                adr.title,
                adr.status.as_str(),
                adr.context,
                adr.decision,
                adr.consequences,
                adr.alternatives,
                adr.superseded_by,
                adr.created_at,
                adr.updated_at,
            ],
        )?;
        tx.commit()?;
        debug!(adr_id = %adr.id, track_id = %adr.track_id, "saved adr");
        Ok(())
    }

    fn get_adr(&self, id: &str) -> Result<Adr> {
        load_adr(&self.conn, id)
    }

    fn list_adrs(&self, track_id: Option<&str>) -> Result<Vec<Adr>> {
        let adrs = match track_id {
            Some(track_id) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM adrs WHERE track_id = ?1 ORDER BY created_at, rowid"
                ))?;
                let rows = stmt.query_map([track_id], adr_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM adrs ORDER BY created_at, rowid"
                ))?;
                let rows = stmt.query_map([], adr_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(adrs)
    }

    fn update_adr(&self, adr: &Adr) -> Result<()> {
        adr.validate()?;
        let tx = self.write_tx()?;
        if !adr_exists(&tx, &adr.id)? {
            return Err(Error::not_found("adr", &adr.id));
        }
        check_references(&tx, adr)?;
        tx.execute(
            "UPDATE adrs SET track_id = ?2, title = ?3, status = ?4, context = ?5, decision = ?6, \
             consequences = ?7, alternatives = ?8, superseded_by = ?9, updated_at = ?10 \
             WHERE id = ?1",
            params![
                adr.id,
                adr.track_id,
                adr.title,
                adr.status.as_str(),
                adr.context,
                adr.decision,
                adr.consequences,
                adr.alternatives,
                adr.superseded_by,
                adr.updated_at,
            ],
        )?;
        tx.commit()?;
        debug!(adr_id = %adr.id, "updated adr");
        Ok(())
    }

    fn supersede_adr(&self, id: &str, superseded_by: &str) -> Result<Adr> {
        if id == superseded_by {
            return Err(Error::invalid("adr", format!("{id} cannot supersede itself")));
        }
        let tx = self.write_tx()?;
        let mut adr = load_adr(&tx, id)?;
        if !adr_exists(&tx, superseded_by)? {
            return Err(Error::not_found("adr", superseded_by));
        }
        adr.status = AdrStatus::Superseded;
        adr.superseded_by = Some(superseded_by.to_string());
        adr.updated_at = Utc::now();
        write_status(&tx, &adr)?;
        tx.commit()?;
        debug!(adr_id = %id, superseded_by, "superseded adr");
        Ok(adr)
    }

    fn deprecate_adr(&self, id: &str) -> Result<Adr> {
        let tx = self.write_tx()?;
        let mut adr = load_adr(&tx, id)?;
        adr.status = AdrStatus::Deprecated;
        adr.updated_at = Utc::now();
        write_status(&tx, &adr)?;
        tx.commit()?;
        debug!(adr_id = %id, "deprecated adr");
        Ok(adr)
    }

    fn delete_adr(&self, id: &str) -> Result<()> {
        let changed = self.conn.execute("DELETE FROM adrs WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(Error::not_found("adr", id));
        }
        debug!(adr_id = %id, "deleted adr");
        Ok(())
    }
}
