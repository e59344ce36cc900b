use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{in_clause, insert_row, parse_column, rank_values, row_exists, Database};
use crate::error::{Error, Result};
use crate::models::{Task, TaskFilter, TaskStatus};
use crate::repository::TaskStore;

pub(super) const COLUMNS: &str =
    "id, track_id, title, description, status, rank, branch, created_at, updated_at";

pub(super) fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        track_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        status: parse_column(4, row.get(4)?, TaskStatus::from_str)?,
        rank: row.get(5)?,
        branch: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Task columns qualified with the `t` alias, for joins.
pub(super) fn qualified_columns() -> String {
    COLUMNS
        .split(", ")
        .map(|c| format!("t.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(super) fn task_exists(conn: &Connection, id: &str) -> Result<bool> {
    row_exists(conn, "SELECT 1 FROM tasks WHERE id = ?1", [id])
}

fn load_task(conn: &Connection, id: &str) -> Result<Task> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM tasks WHERE id = ?1"),
        [id],
        task_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("task", id))
}

fn require_track(conn: &Connection, track_id: &str) -> Result<()> {
    if !row_exists(conn, "SELECT 1 FROM tracks WHERE id = ?1", [track_id])? {
        return Err(Error::not_found("track", track_id));
    }
    Ok(())
}

impl TaskStore for Database {
    fn save_task(&self, task: &Task) -> Result<()> {
        task.validate()?;
        let tx = self.write_tx()?;
        if task_exists(&tx, &task.id)? {
            return Err(Error::already_exists("task", &task.id));
        }
        require_track(&tx, &task.track_id)?;
        insert_row(
            &tx,
            "task",
            &task.id,
            &format!("INSERT INTO tasks ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            params![
                task.id,
                task.track_id,
                task.title,
                task.description,
                task.status.as_str(),
                task.rank,
                task.branch,
                task.created_at,
                task.updated_at,
            ],
        )?;
        tx.commit()?;
        debug!(task_id = %task.id, track_id = %task.track_id, "saved task");
        Ok(())
    }

    fn get_task(&self, id: &str) -> Result<Task> {
        load_task(&self.conn, id)
    }

    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<Value> = Vec::new();
        if let Some(track_id) = &filter.track_id {
            clauses.push("track_id = ?".to_string());
            args.push(Value::Text(track_id.clone()));
        }
        if let Some(clause) = in_clause("status", filter.statuses.len()) {
            clauses.push(clause);
            args.extend(
                filter
                    .statuses
                    .iter()
                    .map(|s| Value::Text(s.as_str().to_string())),
            );
        }
        if let Some(clause) = in_clause("rank", filter.ranks.len()) {
            clauses.push(clause);
            args.extend(rank_values(&filter.ranks));
        }

        let mut sql = format!("SELECT {COLUMNS} FROM tasks");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY rank, id");

        let mut stmt = self.conn.prepare(&sql)?;
        let tasks = stmt
            .query_map(params_from_iter(args), task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    fn update_task(&self, task: &Task) -> Result<()> {
        task.validate()?;
        let tx = self.write_tx()?;
        if !task_exists(&tx, &task.id)? {
            return Err(Error::not_found("task", &task.id));
        }
        require_track(&tx, &task.track_id)?;
        tx.execute(
            "UPDATE tasks SET track_id = ?2, title = ?3, description = ?4, status = ?5, \
             rank = ?6, branch = ?7, updated_at = ?8 WHERE id = ?1",
            params![
                task.id,
                task.track_id,
                task.title,
                task.description,
                task.status.as_str(),
                task.rank,
                task.branch,
                task.updated_at,
            ],
        )?;
        tx.commit()?;
        debug!(task_id = %task.id, "updated task");
        Ok(())
    }

    fn delete_task(&self, id: &str) -> Result<()> {
        let changed = self.conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(Error::not_found("task", id));
        }
        debug!(task_id = %id, "deleted task");
        Ok(())
    }

    fn move_task_to_track(&self, task_id: &str, track_id: &str) -> Result<Task> {
        let tx = self.write_tx()?;
        let mut task = load_task(&tx, task_id)?;
        require_track(&tx, track_id)?;
        task.track_id = track_id.to_string();
        task.updated_at = Utc::now();
        tx.execute(
            "UPDATE tasks SET track_id = ?2, updated_at = ?3 WHERE id = ?1",
            params![task.id, task.track_id, task.updated_at],
        )?;
        tx.commit()?;
        debug!(task_id, track_id, "moved task");
        Ok(task)
    }

    fn backlog_tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM tasks t \
             LEFT JOIN iteration_tasks it ON it.task_id = t.id \
             WHERE it.task_id IS NULL AND t.status != 'done' \
             ORDER BY t.rank, t.id",
            qualified_columns()
        ))?;
        let tasks = stmt
            .query_map([], task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }
}
