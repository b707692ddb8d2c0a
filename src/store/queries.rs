pub const CREATE_ACTIVITIES: &str = r#"
CREATE TABLE IF NOT EXISTS activities (
  id            TEXT PRIMARY KEY,
  name          TEXT NOT NULL UNIQUE,
  is_active     INTEGER NOT NULL DEFAULT 1,
  activity_type TEXT NOT NULL DEFAULT 'time' CHECK (activity_type IN ('time', 'count')),
  target_unit   TEXT NOT NULL DEFAULT 'hours',
  display_order INTEGER NOT NULL DEFAULT 0,
  created_at    TEXT NOT NULL
);
"#;

pub const CREATE_DAILY_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS daily_entries (
  id           TEXT PRIMARY KEY,
  activity_id  TEXT NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
  entry_date   TEXT NOT NULL,
  value_amount REAL NOT NULL DEFAULT 0 CHECK (value_amount >= 0),
  created_at   TEXT NOT NULL,
  UNIQUE (activity_id, entry_date)
);
"#;

pub const CREATE_WEEKLY_GOALS: &str = r#"
CREATE TABLE IF NOT EXISTS weekly_goals (
  id              TEXT PRIMARY KEY,
  activity_id     TEXT NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
  week_start_date TEXT NOT NULL,
  target_value    REAL NOT NULL DEFAULT 0,
  created_at      TEXT NOT NULL,
  UNIQUE (activity_id, week_start_date)
);
"#;

pub const CREATE_WEEKLY_REFLECTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS weekly_reflections (
  id              TEXT PRIMARY KEY,
  activity_id     TEXT NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
  week_start_date TEXT NOT NULL,
  reflection_text TEXT NOT NULL DEFAULT '',
  created_at      TEXT NOT NULL,
  UNIQUE (activity_id, week_start_date)
);
"#;

pub const CREATE_ACTIVITY_GOALS: &str = r#"
CREATE TABLE IF NOT EXISTS activity_goals (
  id              TEXT PRIMARY KEY,
  activity_id     TEXT NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
  week_start_date TEXT NOT NULL,
  goal_text       TEXT NOT NULL,
  completed       INTEGER NOT NULL DEFAULT 0,
  completed_at    TEXT,
  display_order   INTEGER NOT NULL DEFAULT 0,
  created_at      TEXT NOT NULL
);
"#;

pub const ADD_ACTIVITIES_DISPLAY_ORDER: &str =
    "ALTER TABLE activities ADD COLUMN display_order INTEGER NOT NULL DEFAULT 0;";

pub const INDEX_DAILY_ENTRIES_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_daily_entries_date ON daily_entries(entry_date);";

pub const INDEX_WEEKLY_GOALS_WEEK: &str =
    "CREATE INDEX IF NOT EXISTS idx_weekly_goals_week ON weekly_goals(week_start_date);";

pub const INDEX_WEEKLY_REFLECTIONS_WEEK: &str = r#"
CREATE INDEX IF NOT EXISTS idx_weekly_reflections_week
  ON weekly_reflections(week_start_date);
"#;

pub const INDEX_ACTIVITY_GOALS_WEEK: &str = r#"
CREATE INDEX IF NOT EXISTS idx_activity_goals_week
  ON activity_goals(activity_id, week_start_date);
"#;

pub const ACTIVITY_COLUMNS: &str =
    "id, name, is_active, activity_type, target_unit, display_order, created_at";
pub const ENTRY_COLUMNS: &str = "id, activity_id, entry_date, value_amount, created_at";
pub const GOAL_COLUMNS: &str = "id, activity_id, week_start_date, target_value, created_at";
pub const REFLECTION_COLUMNS: &str =
    "id, activity_id, week_start_date, reflection_text, created_at";
pub const ACTIVITY_GOAL_COLUMNS: &str = "id, activity_id, week_start_date, goal_text, \
    completed, completed_at, display_order, created_at";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_ACTIVITIES,
        CREATE_DAILY_ENTRIES,
        CREATE_WEEKLY_GOALS,
        CREATE_WEEKLY_REFLECTIONS,
        CREATE_ACTIVITY_GOALS,
        INDEX_DAILY_ENTRIES_DATE,
        INDEX_WEEKLY_GOALS_WEEK,
        INDEX_WEEKLY_REFLECTIONS_WEEK,
        INDEX_ACTIVITY_GOALS_WEEK,
    ]
}
