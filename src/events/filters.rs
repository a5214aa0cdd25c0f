//! Composition of the event search predicate.
//!
//! Every listing (home page, events page, dashboard, sidebar) goes through
//! [`EventFilter`], so the rules below hold everywhere:
//!
//! * `type` narrows to `upcoming` (after today), `recent` (before today) or
//!   `today`; anything else keeps every event.
//! * `name` and `category` are case-insensitive substring matches.
//! * `date_from`/`date_to` are inclusive bounds, both, either or none.
//! * All of them are AND-ed together.
//!
//! Dates in `date_from`/`date_to` are bound as received; the store decides what
//! a malformed one means.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFrame {
    All,
    Upcoming,
    Recent,
    Today,
}

impl TimeFrame {
    /// Unknown values fall back to [`TimeFrame::All`].
    pub fn parse(input: &str) -> Self {
        match input {
            "upcoming" => Self::Upcoming,
            "recent" => Self::Recent,
            "today" => Self::Today,
            _ => Self::All,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Upcoming => "upcoming",
            Self::Recent => "recent",
            Self::Today => "today",
        }
    }
}

/// Query-string parameters of the listing pages, echoed back untouched so
/// the filter form can be filled again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventQuery {
    #[serde(rename = "type")]
    pub filter_type: String,
    pub name: String,
    pub category: String,
    pub date_from: String,
    pub date_to: String,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            filter_type: TimeFrame::All.as_str().to_owned(),
            name: String::new(),
            category: String::new(),
            date_from: String::new(),
            date_to: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateRange<'a> {
    Between(&'a str, &'a str),
    From(&'a str),
    Until(&'a str),
    Unbounded,
}

impl<'a> DateRange<'a> {
    fn new(date_from: &'a str, date_to: &'a str) -> Self {
        match (date_from.is_empty(), date_to.is_empty()) {
            (false, false) => Self::Between(date_from, date_to),
            (false, true) => Self::From(date_from),
            (true, false) => Self::Until(date_to),
            (true, true) => Self::Unbounded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter<'a> {
    time_frame: TimeFrame,
    name: Option<&'a str>,
    category: Option<&'a str>,
    range: DateRange<'a>,
}

impl<'a> EventFilter<'a> {
    pub fn from_query(query: &'a EventQuery) -> Self {
        Self {
            time_frame: TimeFrame::parse(&query.filter_type),
            name: non_empty(&query.name),
            category: non_empty(&query.category),
            range: DateRange::new(&query.date_from, &query.date_to),
        }
    }

    pub fn only(time_frame: TimeFrame) -> Self {
        Self {
            time_frame,
            name: None,
            category: None,
            range: DateRange::Unbounded,
        }
    }

    pub fn time_frame(&self) -> TimeFrame {
        self.time_frame
    }

    /// Appends the `WHERE` clause to a query selecting from `events e`
    /// joined with `categories c`.
    pub fn push_predicates(&self, builder: &mut QueryBuilder<'_, Sqlite>, today: NaiveDate) {
        let mut clause = Clause::default();

        match self.time_frame {
            TimeFrame::Upcoming => {
                clause.next(builder).push("e.date > ").push_bind(today);
            }
            TimeFrame::Recent => {
                clause.next(builder).push("e.date < ").push_bind(today);
            }
            TimeFrame::Today => {
                clause.next(builder).push("e.date = ").push_bind(today);
            }
            TimeFrame::All => {}
        }

        if let Some(name) = self.name {
            clause
                .next(builder)
                .push("e.name LIKE ")
                .push_bind(contains_pattern(name))
                .push(" ESCAPE '\\'");
        }

        if let Some(category) = self.category {
            clause
                .next(builder)
                .push("c.name LIKE ")
                .push_bind(contains_pattern(category))
                .push(" ESCAPE '\\'");
        }

        match self.range {
            DateRange::Between(from, to) => {
                clause
                    .next(builder)
                    .push("e.date BETWEEN ")
                    .push_bind(from.to_owned())
                    .push(" AND ")
                    .push_bind(to.to_owned());
            }
            DateRange::From(from) => {
                clause
                    .next(builder)
                    .push("e.date >= ")
                    .push_bind(from.to_owned());
            }
            DateRange::Until(to) => {
                clause.next(builder).push("e.date <= ").push_bind(to.to_owned());
            }
            DateRange::Unbounded => {}
        }
    }
}

#[derive(Default)]
struct Clause {
    started: bool,
}

impl Clause {
    fn next<'b, 'args>(
        &mut self,
        builder: &'b mut QueryBuilder<'args, Sqlite>,
    ) -> &'b mut QueryBuilder<'args, Sqlite> {
        let keyword = if self.started { " AND " } else { " WHERE " };
        self.started = true;
        builder.push(keyword)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

/// `LIKE` pattern matching `value` anywhere, with its own wildcards escaped.
fn contains_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
