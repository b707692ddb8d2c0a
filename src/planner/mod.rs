use crate::models::{
    Activity, ActivityGoal, NewActivityGoal, NewWeeklyGoal, ValidationError, WeeklyGoal,
    format_date, parse_week_start, previous_week_start,
};
use crate::store::{Store, StoreError, StoreResult, WeekFilter};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarryForward {
    pub week_start_date: String,
    pub previous_week_start_date: String,
    pub weekly_goals: Vec<WeeklyGoal>,
    pub activity_goals: Vec<ActivityGoal>,
}

// Copies last week's target into activities with no goal yet, and last week's
// unfinished checklist items into activities with an empty checklist.
pub fn carry_forward(
    store: &dyn Store,
    week_start_date: &str,
) -> Result<CarryForward, PlannerError> {
    let monday = parse_week_start("week_start_date", week_start_date)?;
    let previous = previous_week_start("week_start_date", monday)?;
    let week_start_date = format_date(monday);
    let previous_week_start_date = format_date(previous);

    let mut weekly_goals = Vec::new();
    let mut activity_goals = Vec::new();

    for activity in store.list_active_activities()? {
        if let Some(goal) =
            carry_target(store, &activity, &week_start_date, &previous_week_start_date)?
        {
            weekly_goals.push(goal);
        }
        activity_goals.extend(carry_checklist(
            store,
            &activity,
            &week_start_date,
            &previous_week_start_date,
        )?);
    }

    info!(
        week_start_date = %week_start_date,
        goals = weekly_goals.len(),
        checklist_items = activity_goals.len(),
        "week carried forward"
    );

    Ok(CarryForward {
        week_start_date,
        previous_week_start_date,
        weekly_goals,
        activity_goals,
    })
}

fn carry_target(
    store: &dyn Store,
    activity: &Activity,
    week_start_date: &str,
    previous_week_start_date: &str,
) -> StoreResult<Option<WeeklyGoal>> {
    if store.find_goal(&activity.id, week_start_date)?.is_some() {
        return Ok(None);
    }

    store
        .find_goal(&activity.id, previous_week_start_date)?
        .map(|previous| {
            store.upsert_goal(&NewWeeklyGoal {
                activity_id: activity.id.clone(),
                week_start_date: week_start_date.to_string(),
                target_value: previous.target_value,
            })
        })
        .transpose()
}

fn carry_checklist(
    store: &dyn Store,
    activity: &Activity,
    week_start_date: &str,
    previous_week_start_date: &str,
) -> StoreResult<Vec<ActivityGoal>> {
    let week = |week_start_date: &str| WeekFilter {
        activity_id: Some(activity.id.clone()),
        week_start_date: Some(week_start_date.to_string()),
    };

    if !store.list_activity_goals(&week(week_start_date))?.is_empty() {
        return Ok(Vec::new());
    }

    store
        .list_activity_goals(&week(previous_week_start_date))?
        .into_iter()
        .filter(|item| !item.completed)
        .map(|item| {
            store.insert_activity_goal(&NewActivityGoal {
                activity_id: activity.id.clone(),
                week_start_date: week_start_date.to_string(),
                goal_text: item.goal_text,
                display_order: Some(item.display_order),
            })
        })
        .collect()
}
