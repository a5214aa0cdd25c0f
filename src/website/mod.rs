mod events;
mod forms;
mod router;
mod users;
mod views;

pub use forms::{
    CategoryForm, CsrfOnly, EventForm, GroupForm, ProfileForm, RoleForm, SecureForm,
};
pub use router::get_router;
pub use views::{template_to_response, ErrorPage, HtmlResult, MessagePage, Page};
