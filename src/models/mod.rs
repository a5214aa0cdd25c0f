mod category;
mod event;
mod group;
mod user;

pub use category::{Category, CategoryData};
pub use event::{Event, EventData};
pub use group::{Group, GroupWithPermissions, Permission, Role};
pub use user::{NewUser, ProfileData, User, UserWithGroups, UserWithPassword};
