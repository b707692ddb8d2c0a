use super::queries::{
    self, ACTIVITY_COLUMNS, ACTIVITY_GOAL_COLUMNS, ENTRY_COLUMNS, GOAL_COLUMNS,
    REFLECTION_COLUMNS,
};
use super::{EntryFilter, Store, StoreError, StoreResult, WeekFilter};
use crate::models::{
    Activity, ActivityGoal, ActivityType, DailyEntry, NewActivity, NewActivityGoal,
    NewDailyEntry, NewWeeklyGoal, NewWeeklyReflection, WeeklyGoal, WeeklyReflection,
    now_timestamp,
};
use anyhow::{Context, anyhow};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Params, Row, params, params_from_iter};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

type RowMapper<T> = fn(&Row<'_>) -> rusqlite::Result<T>;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite DB")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable SQLite foreign keys")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;

        Ok(store)
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn()?;
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                conn.execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })?;

        // Databases created before activities could be reordered lack the column.
        if !has_column(&conn, "activities", "display_order")? {
            conn.execute(queries::ADD_ACTIVITIES_DISPLAY_ORDER, [])
                .context("Failed to add activities.display_order")?;
        }

        Ok(())
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable(anyhow!("SQLite connection lock poisoned")))
    }

    fn query_all<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: RowMapper<T>,
    ) -> StoreResult<Vec<T>> {
        let conn = self.conn()?;
        let mut statement = conn.prepare(sql)?;
        let rows = statement
            .query_map(params, map)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn query_optional<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: RowMapper<T>,
    ) -> StoreResult<Option<T>> {
        let conn = self.conn()?;
        let row = conn.query_row(sql, params, map).optional()?;
        Ok(row)
    }

    fn query_returning<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: RowMapper<T>,
    ) -> StoreResult<T> {
        let conn = self.conn()?;
        let row = conn.query_row(sql, params, map)?;
        Ok(row)
    }
}

impl Store for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn list_active_activities(&self) -> StoreResult<Vec<Activity>> {
        self.query_all(
            &format!(
                "SELECT {ACTIVITY_COLUMNS} FROM activities
                 WHERE is_active = 1
                 ORDER BY display_order ASC, created_at ASC, rowid ASC"
            ),
            [],
            activity_from_row,
        )
    }

    fn insert_activity(&self, activity: &NewActivity) -> StoreResult<Activity> {
        self.query_returning(
            &format!(
                "INSERT INTO activities
                   (id, name, is_active, activity_type, target_unit, display_order, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5,
                   (SELECT COALESCE(MAX(display_order) + 1, 0) FROM activities), ?6)
                 RETURNING {ACTIVITY_COLUMNS}"
            ),
            params![
                new_id(),
                activity.name,
                activity.is_active,
                activity.activity_type,
                activity.target_unit,
                now_timestamp()
            ],
            activity_from_row,
        )
    }

    fn get_activity(&self, id: &str) -> StoreResult<Option<Activity>> {
        self.query_optional(
            &format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = ?1"),
            params![id],
            activity_from_row,
        )
    }

    fn deactivate_activity(&self, id: &str) -> StoreResult<Option<Activity>> {
        self.query_optional(
            &format!(
                "UPDATE activities SET is_active = 0 WHERE id = ?1 RETURNING {ACTIVITY_COLUMNS}"
            ),
            params![id],
            activity_from_row,
        )
    }

    fn set_display_order(&self, id: &str, display_order: i64) -> StoreResult<Option<Activity>> {
        self.query_optional(
            &format!(
                "UPDATE activities SET display_order = ?2 WHERE id = ?1
                 RETURNING {ACTIVITY_COLUMNS}"
            ),
            params![id, display_order],
            activity_from_row,
        )
    }

    fn list_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<DailyEntry>> {
        let mut conditions = Conditions::default();
        conditions.push("activity_id", "=", filter.activity_id.as_deref());
        conditions.push("entry_date", ">=", filter.start_date.as_deref());
        conditions.push("entry_date", "<=", filter.end_date.as_deref());

        self.query_all(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM daily_entries{}
                 ORDER BY entry_date DESC, created_at ASC, rowid ASC",
                conditions.where_clause()
            ),
            params_from_iter(conditions.values.iter()),
            entry_from_row,
        )
    }

    fn upsert_entry(&self, entry: &NewDailyEntry) -> StoreResult<DailyEntry> {
        self.query_returning(
            &format!(
                "INSERT INTO daily_entries (id, activity_id, entry_date, value_amount, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(activity_id, entry_date)
                 DO UPDATE SET value_amount = excluded.value_amount
                 RETURNING {ENTRY_COLUMNS}"
            ),
            params![
                new_id(),
                entry.activity_id,
                entry.entry_date,
                entry.value_amount,
                now_timestamp()
            ],
            entry_from_row,
        )
    }

    fn get_entry(&self, id: &str) -> StoreResult<Option<DailyEntry>> {
        self.query_optional(
            &format!("SELECT {ENTRY_COLUMNS} FROM daily_entries WHERE id = ?1"),
            params![id],
            entry_from_row,
        )
    }

    fn entries_on_dates(
        &self,
        activity_id: &str,
        dates: &[String],
    ) -> StoreResult<Vec<DailyEntry>> {
        if dates.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (0..dates.len())
            .map(|index| format!("?{}", index + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let values = std::iter::once(activity_id).chain(dates.iter().map(String::as_str));

        self.query_all(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM daily_entries
                 WHERE activity_id = ?1 AND entry_date IN ({placeholders})
                 ORDER BY entry_date ASC, rowid ASC"
            ),
            params_from_iter(values),
            entry_from_row,
        )
    }

    fn list_goals(&self, filter: &WeekFilter) -> StoreResult<Vec<WeeklyGoal>> {
        let conditions = Conditions::for_week(filter);
        self.query_all(
            &format!(
                "SELECT {GOAL_COLUMNS} FROM weekly_goals{}
                 ORDER BY created_at DESC, rowid DESC",
                conditions.where_clause()
            ),
            params_from_iter(conditions.values.iter()),
            goal_from_row,
        )
    }

    fn upsert_goal(&self, goal: &NewWeeklyGoal) -> StoreResult<WeeklyGoal> {
        self.query_returning(
            &format!(
                "INSERT INTO weekly_goals
                   (id, activity_id, week_start_date, target_value, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(activity_id, week_start_date)
                 DO UPDATE SET target_value = excluded.target_value
                 RETURNING {GOAL_COLUMNS}"
            ),
            params![
                new_id(),
                goal.activity_id,
                goal.week_start_date,
                goal.target_value,
                now_timestamp()
            ],
            goal_from_row,
        )
    }

    fn get_goal(&self, id: &str) -> StoreResult<Option<WeeklyGoal>> {
        self.query_optional(
            &format!("SELECT {GOAL_COLUMNS} FROM weekly_goals WHERE id = ?1"),
            params![id],
            goal_from_row,
        )
    }

    fn find_goal(
        &self,
        activity_id: &str,
        week_start_date: &str,
    ) -> StoreResult<Option<WeeklyGoal>> {
        self.query_optional(
            &format!(
                "SELECT {GOAL_COLUMNS} FROM weekly_goals
                 WHERE activity_id = ?1 AND week_start_date = ?2"
            ),
            params![activity_id, week_start_date],
            goal_from_row,
        )
    }

    fn list_reflections(&self, filter: &WeekFilter) -> StoreResult<Vec<WeeklyReflection>> {
        let conditions = Conditions::for_week(filter);
        self.query_all(
            &format!(
                "SELECT {REFLECTION_COLUMNS} FROM weekly_reflections{}
                 ORDER BY created_at DESC, rowid DESC",
                conditions.where_clause()
            ),
            params_from_iter(conditions.values.iter()),
            reflection_from_row,
        )
    }

    fn upsert_reflection(
        &self,
        reflection: &NewWeeklyReflection,
    ) -> StoreResult<WeeklyReflection> {
        self.query_returning(
            &format!(
                "INSERT INTO weekly_reflections
                   (id, activity_id, week_start_date, reflection_text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(activity_id, week_start_date)
                 DO UPDATE SET reflection_text = excluded.reflection_text
                 RETURNING {REFLECTION_COLUMNS}"
            ),
            params![
                new_id(),
                reflection.activity_id,
                reflection.week_start_date,
                reflection.reflection_text,
                now_timestamp()
            ],
            reflection_from_row,
        )
    }

    fn get_reflection(&self, id: &str) -> StoreResult<Option<WeeklyReflection>> {
        self.query_optional(
            &format!("SELECT {REFLECTION_COLUMNS} FROM weekly_reflections WHERE id = ?1"),
            params![id],
            reflection_from_row,
        )
    }

    fn find_reflection(
        &self,
        activity_id: &str,
        week_start_date: &str,
    ) -> StoreResult<Option<WeeklyReflection>> {
        self.query_optional(
            &format!(
                "SELECT {REFLECTION_COLUMNS} FROM weekly_reflections
                 WHERE activity_id = ?1 AND week_start_date = ?2"
            ),
            params![activity_id, week_start_date],
            reflection_from_row,
        )
    }

    fn list_activity_goals(&self, filter: &WeekFilter) -> StoreResult<Vec<ActivityGoal>> {
        let conditions = Conditions::for_week(filter);
        self.query_all(
            &format!(
                "SELECT {ACTIVITY_GOAL_COLUMNS} FROM activity_goals{}
                 ORDER BY display_order ASC, created_at ASC, rowid ASC",
                conditions.where_clause()
            ),
            params_from_iter(conditions.values.iter()),
            activity_goal_from_row,
        )
    }

    fn insert_activity_goal(&self, goal: &NewActivityGoal) -> StoreResult<ActivityGoal> {
        self.query_returning(
            &format!(
                "INSERT INTO activity_goals
                   (id, activity_id, week_start_date, goal_text, completed,
                    display_order, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0,
                   COALESCE(?5, (SELECT COALESCE(MAX(display_order) + 1, 0) FROM activity_goals
                                 WHERE activity_id = ?2 AND week_start_date = ?3)),
                   ?6)
                 RETURNING {ACTIVITY_GOAL_COLUMNS}"
            ),
            params![
                new_id(),
                goal.activity_id,
                goal.week_start_date,
                goal.goal_text,
                goal.display_order,
                now_timestamp()
            ],
            activity_goal_from_row,
        )
    }

    fn set_activity_goal_completed(
        &self,
        id: &str,
        completed: bool,
    ) -> StoreResult<Option<ActivityGoal>> {
        let completed_at = completed.then(now_timestamp);
        self.query_optional(
            &format!(
                "UPDATE activity_goals SET completed = ?2, completed_at = ?3 WHERE id = ?1
                 RETURNING {ACTIVITY_GOAL_COLUMNS}"
            ),
            params![id, completed, completed_at],
            activity_goal_from_row,
        )
    }

    fn delete_activity_goal(&self, id: &str) -> StoreResult<Option<ActivityGoal>> {
        self.query_optional(
            &format!("DELETE FROM activity_goals WHERE id = ?1 RETURNING {ACTIVITY_GOAL_COLUMNS}"),
            params![id],
            activity_goal_from_row,
        )
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2",
            params![table, column],
            |_| Ok(()),
        )
        .optional()
        .with_context(|| format!("Failed to inspect table: {table}"))?;
    Ok(found.is_some())
}

#[derive(Debug, Default)]
struct Conditions {
    clauses: Vec<String>,
    values: Vec<String>,
}

impl Conditions {
    fn for_week(filter: &WeekFilter) -> Self {
        let mut conditions = Self::default();
        conditions.push("activity_id", "=", filter.activity_id.as_deref());
        conditions.push("week_start_date", "=", filter.week_start_date.as_deref());
        conditions
    }

    fn push(&mut self, column: &str, operator: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.values.push(value.to_string());
            self.clauses
                .push(format!("{column} {operator} ?{}", self.values.len()));
        }
    }

    fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                Self::Rejected(message.clone().unwrap_or_else(|| failure.to_string()))
            }
            _ => Self::Unavailable(anyhow::Error::new(error).context("SQLite query failed")),
        }
    }
}

impl ToSql for ActivityType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ActivityType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    Ok(Activity {
        id: row.get(0)?,
        name: row.get(1)?,
        is_active: row.get(2)?,
        activity_type: row.get(3)?,
        target_unit: row.get(4)?,
        display_order: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<DailyEntry> {
    Ok(DailyEntry {
        id: row.get(0)?,
        activity_id: row.get(1)?,
        entry_date: row.get(2)?,
        value_amount: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn goal_from_row(row: &Row<'_>) -> rusqlite::Result<WeeklyGoal> {
    Ok(WeeklyGoal {
        id: row.get(0)?,
        activity_id: row.get(1)?,
        week_start_date: row.get(2)?,
        target_value: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn reflection_from_row(row: &Row<'_>) -> rusqlite::Result<WeeklyReflection> {
    Ok(WeeklyReflection {
        id: row.get(0)?,
        activity_id: row.get(1)?,
        week_start_date: row.get(2)?,
        reflection_text: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn activity_goal_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityGoal> {
    Ok(ActivityGoal {
        id: row.get(0)?,
        activity_id: row.get(1)?,
        week_start_date: row.get(2)?,
        goal_text: row.get(3)?,
        completed: row.get(4)?,
        completed_at: row.get(5)?,
        display_order: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}
