mod filters;
mod listing;

pub use filters::{DateRange, EventFilter, EventQuery, TimeFrame};
pub use listing::{
    dashboard, event_details, list_events, participants, upcoming, user_rsvps, Dashboard,
    DashboardStats, EventCard, EventDetails, EventListing, Participant,
};
