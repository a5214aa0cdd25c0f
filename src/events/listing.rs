use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use sqlx::{prelude::FromRow, QueryBuilder, Sqlite};

use crate::{
    database::Database,
    errors::AppError,
    models::{Event, User},
};

use super::filters::{EventFilter, EventQuery, TimeFrame};

const EVENT_CARD_SELECT: &str = "SELECT e.pk, e.name, e.description, e.date, e.time, e.location, e.asset, c.pk AS category_pk, c.name AS category_name, (SELECT COUNT(*) FROM event_rsvps r WHERE r.event_pk = e.pk) AS participant_count FROM events e INNER JOIN categories c ON c.pk = e.category_pk";

/// An event with its category name and the number of users that RSVPed.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventCard {
    pub pk: i64,
    pub name: String,
    pub description: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: String,
    pub asset: Option<String>,
    pub category_pk: i64,
    pub category_name: String,
    pub participant_count: i64,
}

impl EventCard {
    pub fn asset_path(&self) -> &str {
        self.asset.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventListing {
    pub events: Vec<EventCard>,
    pub upcoming_events: Vec<EventCard>,
    pub query: EventQuery,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventDetails {
    pub event: EventCard,
    pub attendees: Vec<String>,
}

#[derive(Debug, Clone, Default, FromRow, Serialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_events: i64,
    pub upcoming_events: i64,
    pub past_events: i64,
    pub today_events: i64,
    pub total_participants: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub time_frame: TimeFrame,
    pub events: Vec<EventCard>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Participant {
    pub pk: i64,
    pub username: String,
    pub email: String,
    pub rsvp_count: i64,
    pub events: String,
}

async fn fetch_cards(
    database: &Database,
    filter: &EventFilter<'_>,
    today: NaiveDate,
) -> Result<Vec<EventCard>, AppError> {
    let mut builder = QueryBuilder::<Sqlite>::new(EVENT_CARD_SELECT);
    filter.push_predicates(&mut builder, today);
    builder.push(" ORDER BY e.date, e.time, e.pk");
    Ok(builder
        .build_query_as::<EventCard>()
        .fetch_all(&**database)
        .await?)
}

/// The filtered events plus the sidebar of upcoming ones, which ignores every input.
pub async fn list_events(
    database: &Database,
    query: EventQuery,
    today: NaiveDate,
) -> Result<EventListing, AppError> {
    let events = fetch_cards(database, &EventFilter::from_query(&query), today).await?;
    let upcoming_events = upcoming(database, today).await?;
    tracing::debug!(
        results = events.len(),
        upcoming = upcoming_events.len(),
        ?query,
        "events listed"
    );
    Ok(EventListing {
        events,
        upcoming_events,
        query,
    })
}

pub async fn upcoming(database: &Database, today: NaiveDate) -> Result<Vec<EventCard>, AppError> {
    fetch_cards(database, &EventFilter::only(TimeFrame::Upcoming), today).await
}

pub async fn event_details(database: &Database, pk: i64) -> Result<EventDetails, AppError> {
    let event = sqlx::query_as::<_, EventCard>(&format!("{} WHERE e.pk = $1;", EVENT_CARD_SELECT))
        .bind(pk)
        .fetch_optional(&**database)
        .await?
        .ok_or_else(|| AppError::not_found("event", pk))?;
    let attendees = Event::attendees(database, pk).await?;
    Ok(EventDetails { event, attendees })
}

pub async fn dashboard(
    database: &Database,
    filter_type: &str,
    today: NaiveDate,
) -> Result<Dashboard, AppError> {
    let stats = sqlx::query_as::<_, DashboardStats>(
        "SELECT
            (SELECT COUNT(*) FROM events) AS total_events,
            (SELECT COUNT(*) FROM events WHERE date > $1) AS upcoming_events,
            (SELECT COUNT(*) FROM events WHERE date < $1) AS past_events,
            (SELECT COUNT(*) FROM events WHERE date = $1) AS today_events,
            (SELECT COUNT(DISTINCT user_pk) FROM event_rsvps) AS total_participants;",
    )
    .bind(today)
    .fetch_one(&**database)
    .await?;

    let time_frame = TimeFrame::parse(filter_type);
    let events = fetch_cards(database, &EventFilter::only(time_frame), today).await?;
    Ok(Dashboard {
        stats,
        time_frame,
        events,
    })
}

pub async fn participants(database: &Database) -> Result<Vec<Participant>, AppError> {
    Ok(sqlx::query_as(
        "SELECT users.pk, users.username, users.email, COUNT(events.pk) AS rsvp_count, GROUP_CONCAT(events.name, ', ') AS events
            FROM users
            INNER JOIN event_rsvps ON event_rsvps.user_pk = users.pk
            INNER JOIN events ON events.pk = event_rsvps.event_pk
            GROUP BY users.pk
            ORDER BY users.username;",
    )
    .fetch_all(&**database)
    .await?)
}

pub async fn user_rsvps(database: &Database, user: &User) -> Result<Vec<EventCard>, AppError> {
    Ok(sqlx::query_as(&format!(
        "{} INNER JOIN event_rsvps mine ON mine.event_pk = e.pk WHERE mine.user_pk = $1 ORDER BY e.date, e.time, e.pk;",
        EVENT_CARD_SELECT
    ))
    .bind(user.pk)
    .fetch_all(&**database)
    .await?)
}
