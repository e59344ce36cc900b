use rusqlite::{params, OptionalExtension, Params, Row};
use tracing::debug;

use super::tasks::task_exists;
use super::{insert_row, parse_column, row_exists, Database};
use crate::error::{Error, Result};
use crate::models::{Criterion, CriterionStatus, VerificationType};
use crate::repository::CriteriaStore;

const COLUMNS: &str = "ac.id, ac.task_id, ac.description, ac.verification_type, ac.status, \
                       ac.notes, ac.testing_instructions, ac.created_at, ac.updated_at";

fn criterion_from_row(row: &Row) -> rusqlite::Result<Criterion> {
    Ok(Criterion {
        id: row.get(0)?,
        task_id: row.get(1)?,
        description: row.get(2)?,
        verification: parse_column(3, row.get(3)?, VerificationType::from_str)?,
        status: parse_column(4, row.get(4)?, CriterionStatus::from_str)?,
        notes: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        testing_instructions: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl Database {
    fn query_criteria<P: Params>(&self, joins_and_filter: &str, params: P) -> Result<Vec<Criterion>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM acceptance_criteria ac {joins_and_filter} \
             ORDER BY ac.created_at, ac.rowid"
        ))?;
        let criteria = stmt
            .query_map(params, criterion_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(criteria)
    }
}

impl CriteriaStore for Database {
    fn save_criterion(&self, criterion: &Criterion) -> Result<()> {
        criterion.validate()?;
        let tx = self.write_tx()?;
        if row_exists(
            &tx,
            "SELECT 1 FROM acceptance_criteria WHERE id = ?1",
            [&criterion.id],
        )? {
            return Err(Error::already_exists("acceptance criterion", &criterion.id));
        }
        if !task_exists(&tx, &criterion.task_id)? {
            return Err(Error::not_found("task", &criterion.task_id));
        }
        insert_row(
            &tx,
            "acceptance criterion",
            &criterion.id,
            "INSERT INTO acceptance_criteria (id, task_id, description, verification_type, \
             status, notes, testing_instructions, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                criterion.id,
                criterion.task_id,
                criterion.description,
                criterion.verification.as_str(),
                criterion.status.as_str(),
                criterion.notes,
                criterion.testing_instructions,
                criterion.created_at,
                criterion.updated_at,
            ],
        )?;
        tx.commit()?;
        debug!(ac_id = %criterion.id, task_id = %criterion.task_id, "saved acceptance criterion");
        Ok(())
    }

    fn get_criterion(&self, id: &str) -> Result<Criterion> {
        self.conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM acceptance_criteria ac WHERE ac.id = ?1"),
                [id],
                criterion_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("acceptance criterion", id))
    }

    fn list_criteria(&self, task_id: &str) -> Result<Vec<Criterion>> {
        self.query_criteria("WHERE ac.task_id = ?1", [task_id])
    }

    fn update_criterion(&self, criterion: &Criterion) -> Result<()> {
        criterion.validate()?;
        let tx = self.write_tx()?;
        if !task_exists(&tx, &criterion.task_id)? {
            return Err(Error::not_found("task", &criterion.task_id));
        }
        let changed = tx.execute(
            "UPDATE acceptance_criteria SET task_id = ?2, description = ?3, \
             verification_type = ?4, status = ?5, notes = ?6, testing_instructions = ?7, \
             updated_at = ?8 WHERE id = ?1",
            params![
                criterion.id,
                criterion.task_id,
                criterion.description,
                criterion.verification.as_str(),
                criterion.status.as_str(),
                criterion.notes,
                criterion.testing_instructions,
                criterion.updated_at,
            ],
        )?;
        if changed == 0 {
            return Err(Error::not_found("acceptance criterion", &criterion.id));
        }
        tx.commit()?;
        debug!(ac_id = %criterion.id, status = criterion.status.as_str(), "updated acceptance criterion");
        Ok(())
    }

    fn delete_criterion(&self, id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM acceptance_criteria WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(Error::not_found("acceptance criterion", id));
        }
        debug!(ac_id = %id, "deleted acceptance criterion");
        Ok(())
    }

    fn criteria_for_track(&self, track_id: &str) -> Result<Vec<Criterion>> {
        self.query_criteria(
            "JOIN tasks t ON t.id = ac.task_id WHERE t.track_id = ?1",
            [track_id],
        )
    }

    fn criteria_for_iteration(&self, number: u32) -> Result<Vec<Criterion>> {
        self.query_criteria(
            "JOIN iteration_tasks it ON it.task_id = ac.task_id WHERE it.iteration_number = ?1",
            [number],
        )
    }
}
