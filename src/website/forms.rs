use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};
use chrono::{NaiveDate, NaiveTime};
use serde::{de::DeserializeOwned, Deserialize};
use validator::Validate;

use crate::{
    auth::validate_form,
    errors::AppError,
    models::{Category, CategoryData, Event, EventData, ProfileData, User},
    sessions::Session,
    state::AppState,
};

/// Urlencoded form whose `csrf_token` field must match the visitor's session.
///
/// Needs `sessions_middleware` in front of the handler.
#[derive(Debug)]
pub struct SecureForm<T>(T);

impl<T> SecureForm<T> {
    pub fn data(self) -> T {
        self.0
    }
}

#[derive(Deserialize)]
struct CsrfField {
    #[serde(default)]
    csrf_token: String,
}

impl<T> FromRequest<AppState> for SecureForm<T>
where
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = req
            .extensions()
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::custom_internal("the sessions middleware is missing"))?;

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|_| AppError::validation("The form could not be read."))?;

        let field: CsrfField = serde_urlencoded::from_bytes(&body).map_err(|_| AppError::Csrf)?;
        if !session
            .token_is_valid(&state.config.session_key, &field.csrf_token)
            .await
        {
            tracing::debug!("form rejected, wrong csrf token");
            return Err(AppError::Csrf);
        }

        serde_urlencoded::from_bytes(&body)
            .map(Self)
            .map_err(|e| AppError::validation(format!("The form is incomplete: {}.", e)))
    }
}

/// Forms carrying nothing but the csrf token, like the delete buttons.
#[derive(Debug, Deserialize)]
pub struct CsrfOnly {}

/// Raw values of the event form, kept as typed so they can be shown again.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct EventForm {
    #[validate(length(max = 255, message = "Name is too long."))]
    pub name: String,
    pub description: String,
    pub date: String,
    pub time: String,
    #[validate(length(max = 255, message = "Location is too long."))]
    pub location: String,
    pub category: String,
    pub asset: String,
}

impl EventForm {
    pub fn from_event(event: &Event) -> Self {
        Self {
            name: event.name.clone(),
            description: event.description.clone(),
            date: event.date.format("%Y-%m-%d").to_string(),
            time: event.time.format("%H:%M").to_string(),
            location: event.location.clone(),
            category: event.category_pk.to_string(),
            asset: event.asset.clone().unwrap_or_default(),
        }
    }

    pub fn to_data(&self) -> Result<EventData, AppError> {
        let mut problems = Vec::new();
        required(&self.name, "Name is required.", &mut problems);
        required(&self.description, "Description is required.", &mut problems);
        required(&self.location, "Location is required.", &mut problems);
        match validate_form(self) {
            Ok(()) => {}
            Err(AppError::Validation(found)) => problems.extend(found),
            Err(e) => return Err(e),
        }

        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|_| problems.push("Enter a valid date.".to_owned()))
            .ok();
        let time = NaiveTime::parse_from_str(&self.time, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&self.time, "%H:%M:%S"))
            .map_err(|_| problems.push("Enter a valid time.".to_owned()))
            .ok();
        let category_pk = self
            .category
            .parse::<i64>()
            .map_err(|_| problems.push("Select a category.".to_owned()))
            .ok();

        match (date, time, category_pk) {
            (Some(date), Some(time), Some(category_pk)) if problems.is_empty() => Ok(EventData {
                name: self.name.trim().to_owned(),
                category_pk,
                description: self.description.trim().to_owned(),
                date,
                time,
                location: self.location.trim().to_owned(),
                asset: (!self.asset.trim().is_empty()).then(|| self.asset.trim().to_owned()),
            }),
            _ => Err(AppError::Validation(problems)),
        }
    }
}

/// Blank input counts as missing once surrounding whitespace is dropped.
fn required(value: &str, message: &str, problems: &mut Vec<String>) {
    if value.trim().is_empty() {
        problems.push(message.to_owned());
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CategoryForm {
    #[validate(length(max = 100, message = "Name is too long."))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl CategoryForm {
    pub fn from_category(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            description: category.description.clone(),
        }
    }

    pub fn to_data(&self) -> Result<CategoryData, AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Name is required."));
        }
        validate_form(self)?;
        Ok(CategoryData {
            name: self.name.trim().to_owned(),
            description: self.description.clone(),
        })
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileForm {
    #[serde(default)]
    #[validate(length(max = 150, message = "First name is too long."))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Last name is too long."))]
    pub last_name: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 15, message = "Phone number is too long."))]
    pub phone: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub address: String,
}

impl ProfileForm {
    pub fn from_user(user: &User) -> Self {
        Self {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            bio: user.bio.clone(),
            address: user.address.clone(),
        }
    }

    pub fn to_data(&self) -> ProfileData {
        ProfileData {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            bio: self.bio.clone(),
            address: self.address.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub group: i64,
}

/// The group form repeats `permissions` once per checked box, so it's read
/// from the raw pairs.
#[derive(Debug, Default)]
pub struct GroupForm {
    pub name: String,
    pub permissions: Vec<i64>,
}

impl GroupForm {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, AppError> {
        let mut form = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "name" => form.name = value.trim().to_owned(),
                "permissions" => form.permissions.push(
                    value
                        .parse()
                        .map_err(|_| AppError::validation("Select valid permissions."))?,
                ),
                _ => {}
            }
        }
        if form.name.is_empty() {
            return Err(AppError::validation("Name is required."));
        }
        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_form() -> EventForm {
        EventForm {
            name: " Tech Talk ".into(),
            description: "Talks".into(),
            date: "2024-03-10".into(),
            time: "18:30".into(),
            location: "Hall A".into(),
            category: "1".into(),
            asset: String::new(),
        }
    }

    #[test]
    fn test_event_form_to_data() {
        let data = event_form().to_data().unwrap();
        assert_eq!(data.name, "Tech Talk");
        assert_eq!(data.date, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(data.time, NaiveTime::from_hms_opt(18, 30, 0).unwrap());
        assert_eq!(data.asset, None);
    }

    #[test]
    fn test_event_form_collects_every_problem() {
        let form = EventForm {
            name: String::new(),
            date: "10/03/2024".into(),
            category: String::new(),
            ..event_form()
        };
        let Err(AppError::Validation(problems)) = form.to_data() else {
            panic!("the form should be rejected");
        };
        assert_eq!(
            problems,
            vec![
                "Name is required.".to_owned(),
                "Enter a valid date.".to_owned(),
                "Select a category.".to_owned(),
            ]
        );
    }

    #[test]
    fn test_blank_event_fields_are_required() {
        let form = EventForm {
            name: "   ".into(),
            location: "\t ".into(),
            ..event_form()
        };
        let Err(AppError::Validation(problems)) = form.to_data() else {
            panic!("blank fields should be rejected");
        };
        assert_eq!(
            problems,
            vec![
                "Name is required.".to_owned(),
                "Location is required.".to_owned(),
            ]
        );
    }

    #[test]
    fn test_event_name_and_location_fit_255_characters() {
        let longest = EventForm {
            name: "n".repeat(255),
            location: "l".repeat(255),
            ..event_form()
        };
        let data = longest.to_data().unwrap();
        assert_eq!(data.name.chars().count(), 255);
        assert_eq!(data.location.chars().count(), 255);

        let too_long = EventForm {
            name: "n".repeat(256),
            location: "l".repeat(256),
            ..event_form()
        };
        let Err(AppError::Validation(problems)) = too_long.to_data() else {
            panic!("256 characters should be rejected");
        };
        assert_eq!(
            problems,
            vec![
                "Location is too long.".to_owned(),
                "Name is too long.".to_owned(),
            ]
        );
    }

    #[test]
    fn test_blank_category_name_is_required() {
        let form = CategoryForm {
            name: "   ".into(),
            description: "Talks".into(),
        };
        let Err(AppError::Validation(problems)) = form.to_data() else {
            panic!("a blank name should be rejected");
        };
        assert_eq!(problems, vec!["Name is required.".to_owned()]);

        let too_long = CategoryForm {
            name: "c".repeat(101),
            ..form
        };
        let Err(AppError::Validation(problems)) = too_long.to_data() else {
            panic!("101 characters should be rejected");
        };
        assert_eq!(problems, vec!["Name is too long.".to_owned()]);
    }

    #[test]
    fn test_group_form_reads_repeated_permissions() {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str("csrf_token=x&name=Helpers&permissions=1&permissions=4")
                .unwrap();
        let form = GroupForm::from_pairs(pairs).unwrap();
        assert_eq!(form.name, "Helpers");
        assert_eq!(form.permissions, vec![1, 4]);
    }

    #[test]
    fn test_csrf_only_ignores_the_token() {
        let _: CsrfOnly = serde_urlencoded::from_str("csrf_token=abc").unwrap();
    }
}
