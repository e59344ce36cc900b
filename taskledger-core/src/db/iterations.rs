use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::tasks::{qualified_columns, task_exists, task_from_row};
use super::{insert_row, parse_column, row_exists, Database};
use crate::error::{Error, Result};
use crate::models::{Iteration, IterationStatus, Task};
use crate::repository::IterationStore;

const COLUMNS: &str = "number, name, goal, status, rank, deliverable, started_at, \
                       completed_at, created_at, updated_at";

fn iteration_from_row(row: &Row) -> rusqlite::Result<Iteration> {
    Ok(Iteration {
        number: row.get(0)?,
        name: row.get(1)?,
        goal: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        status: parse_column(3, row.get(3)?, IterationStatus::from_str)?,
        rank: row.get(4)?,
        deliverable: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        task_ids: Vec::new(),
        started_at: row.get(6)?,
        completed_at: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn load_task_ids(conn: &Connection, number: u32) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT task_id FROM iteration_tasks WHERE iteration_number = ?1 ORDER BY task_id",
    )?;
    let ids = stmt
        .query_map([number], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

fn query_one(conn: &Connection, where_clause: &str, number: Option<u32>) -> Result<Option<Iteration>> {
    let sql = format!("SELECT {COLUMNS} FROM iterations {where_clause} LIMIT 1");
    let found = match number {
        Some(n) => conn.query_row(&sql, [n], iteration_from_row).optional()?,
        None => conn.query_row(&sql, [], iteration_from_row).optional()?,
    };
    match found {
        Some(mut iteration) => {
            iteration.task_ids = load_task_ids(conn, iteration.number)?;
            Ok(Some(iteration))
        }
        None => Ok(None),
    }
}

fn load_iteration(conn: &Connection, number: u32) -> Result<Iteration> {
    query_one(conn, "WHERE number = ?1", Some(number))?
        .ok_or_else(|| Error::not_found("iteration", number))
}

fn iteration_exists(conn: &Connection, number: u32) -> Result<bool> {
    row_exists(conn, "SELECT 1 FROM iterations WHERE number = ?1", [number])
}

/// Fails if an iteration other than `number` is already current.
fn ensure_no_other_current(conn: &Connection, number: u32) -> Result<()> {
    let other: Option<u32> = conn
        .query_row(
            "SELECT number FROM iterations WHERE status = 'current' AND number != ?1",
            [number],
            |r| r.get(0),
        )
        .optional()?;
    match other {
        Some(current) => Err(Error::invalid(
            "iteration",
            format!("iteration {current} is already current"),
        )),
        None => Ok(()),
    }
}

fn replace_members(conn: &Connection, iteration: &Iteration) -> Result<()> {
    conn.execute(
        "DELETE FROM iteration_tasks WHERE iteration_number = ?1",
        [iteration.number],
    )?;
    for task_id in &iteration.task_ids {
        if !task_exists(conn, task_id)? {
            return Err(Error::not_found("task", task_id));
        }
        insert_row(
            conn,
            "iteration task",
            &format!("{}/{task_id}", iteration.number),
            "INSERT INTO iteration_tasks (iteration_number, task_id) VALUES (?1, ?2)",
            params![iteration.number, task_id],
        )?;
    }
    Ok(())
}

fn set_status(conn: &Connection, iteration: &Iteration) -> Result<()> {
    conn.execute(
        "UPDATE iterations SET status = ?2, started_at = ?3, completed_at = ?4, updated_at = ?5 \
         WHERE number = ?1",
        params![
            iteration.number,
            iteration.status.as_str(),
            iteration.started_at,
            iteration.completed_at,
            iteration.updated_at,
        ],
    )?;
    Ok(())
}

impl IterationStore for Database {
    fn save_iteration(&self, iteration: &Iteration) -> Result<()> {
        iteration.validate()?;
        let tx = self.write_tx()?;
        if iteration_exists(&tx, iteration.number)? {
            return Err(Error::already_exists("iteration", iteration.number));
        }
        if iteration.is_current() {
            ensure_no_other_current(&tx, iteration.number)?;
        }
        insert_row(
            &tx,
            "iteration",
            &iteration.number.to_string(),
            &format!(
                "INSERT INTO iterations ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                iteration.number,
                iteration.name,
                iteration.goal,
                iteration.status.as_str(),
                iteration.rank,
                iteration.deliverable,
                iteration.started_at,
                iteration.completed_at,
                iteration.created_at,
                iteration.updated_at,
            ],
        )?;
        replace_members(&tx, iteration)?;
        tx.commit()?;
        debug!(number = iteration.number, tasks = iteration.task_count(), "saved iteration");
        Ok(())
    }

    fn get_iteration(&self, number: u32) -> Result<Iteration> {
        load_iteration(&self.conn, number)
    }

    fn current_iteration(&self) -> Result<Option<Iteration>> {
        query_one(&self.conn, "WHERE status = 'current'", None)
    }

    fn next_planned_iteration(&self) -> Result<Option<Iteration>> {
        query_one(
            &self.conn,
            "WHERE status = 'planned' ORDER BY rank, number",
            None,
        )
    }

    fn list_iterations(&self) -> Result<Vec<Iteration>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM iterations ORDER BY rank, number"
        ))?;
        let mut iterations = stmt
            .query_map([], iteration_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for iteration in &mut iterations {
            iteration.task_ids = load_task_ids(&self.conn, iteration.number)?;
        }
        Ok(iterations)
    }

    fn update_iteration(&self, iteration: &Iteration) -> Result<()> {
        iteration.validate()?;
        let tx = self.write_tx()?;
        let stored = load_iteration(&tx, iteration.number)?;
        if !stored.status.can_transition_to(iteration.status) {
            return Err(Error::invalid(
                "iteration",
                format!(
                    "cannot move iteration {} from {} to {}",
                    iteration.number,
                    stored.status.as_str(),
                    iteration.status.as_str()
                ),
            ));
        }
        if iteration.is_current() {
            ensure_no_other_current(&tx, iteration.number)?;
        }
        let mut started_at = iteration.started_at;
        let mut completed_at = iteration.completed_at;
        if stored.status != iteration.status {
            let now = Utc::now();
            match iteration.status {
                IterationStatus::Current => {
                    started_at.get_or_insert(now);
                }
                IterationStatus::Complete => {
                    completed_at.get_or_insert(now);
                }
                IterationStatus::Planned => {}
            }
        }
        tx.execute(
            "UPDATE iterations SET name = ?2, goal = ?3, status = ?4, rank = ?5, deliverable = ?6, \
             started_at = ?7, completed_at = ?8, updated_at = ?9 WHERE number = ?1",
            params![
                iteration.number,
                iteration.name,
                iteration.goal,
                iteration.status.as_str(),
                iteration.rank,
                iteration.deliverable,
                started_at,
                completed_at,
                iteration.updated_at,
            ],
        )?;
        replace_members(&tx, iteration)?;
        tx.commit()?;
        debug!(number = iteration.number, "updated iteration");
        Ok(())
    }

    fn delete_iteration(&self, number: u32) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM iterations WHERE number = ?1", [number])?;
        if changed == 0 {
            return Err(Error::not_found("iteration", number));
        }
        debug!(number, "deleted iteration");
        Ok(())
    }

    fn add_task_to_iteration(&self, number: u32, task_id: &str) -> Result<()> {
        let tx = self.write_tx()?;
        if !iteration_exists(&tx, number)? {
            return Err(Error::not_found("iteration", number));
        }
        if !task_exists(&tx, task_id)? {
            return Err(Error::not_found("task", task_id));
        }
        insert_row(
            &tx,
            "iteration task",
            &format!("{number}/{task_id}"),
            "INSERT INTO iteration_tasks (iteration_number, task_id) VALUES (?1, ?2)",
            params![number, task_id],
        )?;
        tx.execute(
            "UPDATE iterations SET updated_at = ?2 WHERE number = ?1",
            params![number, Utc::now()],
        )?;
        tx.commit()?;
        debug!(number, task_id, "added task to iteration");
        Ok(())
    }

    fn remove_task_from_iteration(&self, number: u32, task_id: &str) -> Result<()> {
        let tx = self.write_tx()?;
        let changed = tx.execute(
            "DELETE FROM iteration_tasks WHERE iteration_number = ?1 AND task_id = ?2",
            params![number, task_id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("iteration task", format!("{number}/{task_id}")));
        }
        tx.execute(
            "UPDATE iterations SET updated_at = ?2 WHERE number = ?1",
            params![number, Utc::now()],
        )?;
        tx.commit()?;
        debug!(number, task_id, "removed task from iteration");
        Ok(())
    }

    fn iteration_tasks(&self, number: u32) -> Result<Vec<Task>> {
        if !iteration_exists(&self.conn, number)? {
            return Err(Error::not_found("iteration", number));
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM tasks t \
             JOIN iteration_tasks it ON it.task_id = t.id \
             WHERE it.iteration_number = ?1 \
             ORDER BY t.rank, t.id",
            qualified_columns()
        ))?;
        let tasks = stmt
            .query_map([number], task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    fn iterations_for_task(&self, task_id: &str) -> Result<Vec<Iteration>> {
        let columns = COLUMNS
            .split(',')
            .map(|c| format!("i.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {columns} FROM iterations i \
             JOIN iteration_tasks it ON it.iteration_number = i.number \
             WHERE it.task_id = ?1 \
             ORDER BY i.number"
        ))?;
        let mut iterations = stmt
            .query_map([task_id], iteration_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for iteration in &mut iterations {
            iteration.task_ids = load_task_ids(&self.conn, iteration.number)?;
        }
        Ok(iterations)
    }

    fn start_iteration(&self, number: u32) -> Result<Iteration> {
        let tx = self.write_tx()?;
        let mut iteration = load_iteration(&tx, number)?;
        if iteration.status != IterationStatus::Planned {
            return Err(Error::invalid(
                "iteration",
                format!(
                    "iteration {number} must be in planned status to start (is {})",
                    iteration.status.as_str()
                ),
            ));
        }
        ensure_no_other_current(&tx, number)?;
        let now = Utc::now();
        iteration.status = IterationStatus::Current;
        iteration.started_at = Some(now);
        iteration.updated_at = now;
        set_status(&tx, &iteration)?;
        tx.commit()?;
        info!(number, "iteration started");
        Ok(iteration)
    }

    fn complete_iteration(&self, number: u32) -> Result<Iteration> {
        let tx = self.write_tx()?;
        let mut iteration = load_iteration(&tx, number)?;
        if iteration.status != IterationStatus::Current {
            return Err(Error::invalid(
                "iteration",
                format!(
                    "iteration {number} must be in current status to complete (is {})",
                    iteration.status.as_str()
                ),
            ));
        }
        let now = Utc::now();
        iteration.status = IterationStatus::Complete;
        iteration.completed_at = Some(now);
        iteration.updated_at = now;
        set_status(&tx, &iteration)?;
        tx.commit()?;
        info!(number, "iteration completed");
        Ok(iteration)
    }
}
