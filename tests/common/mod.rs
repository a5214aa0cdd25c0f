#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use chrono::{NaiveDate, NaiveTime};
use http_body_util::BodyExt;
use tower::ServiceExt;

use evently::{
    auth::hash_password,
    models::{Category, CategoryData, Event, EventData, NewUser, Role, User},
    state::{App, AppState, Clock},
    website::get_router,
};

pub const PASSWORD: &str = "Str0ng@pass";

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

pub struct StubApp {
    state: AppState,
    router: Router,
}

impl StubApp {
    pub async fn new(today: &str) -> Self {
        let app = App::stub(Clock::Fixed(date(today))).unwrap();
        app.database.run_migrations().await.unwrap();
        let state = AppState::new(app);
        Self {
            router: get_router(state.clone()),
            state,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn request(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub fn browser(&self) -> Browser<'_> {
        Browser {
            app: self,
            cookies: Vec::new(),
        }
    }

    pub async fn category(&self, name: &str) -> i64 {
        Category::create(
            &self.state.database,
            &CategoryData {
                name: name.into(),
                description: format!("All about {}", name),
            },
        )
        .await
        .unwrap()
    }

    pub async fn event(&self, name: &str, category_pk: i64, day: &str) -> i64 {
        Event::create(
            &self.state.database,
            &EventData {
                name: name.into(),
                category_pk,
                description: format!("{} description", name),
                date: date(day),
                time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
                location: "Main hall".into(),
                asset: None,
            },
        )
        .await
        .unwrap()
    }

    /// An activated account belonging to `role`, its password is [`PASSWORD`].
    pub async fn user(&self, username: &str, role: Role) -> User {
        let database = &self.state.database;
        let mut tx = database.start_transaction().await.unwrap();
        let user = User::create_inactive(
            &mut *tx,
            &NewUser {
                username: username.into(),
                email: format!("{}@example.com", username),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: hash_password(PASSWORD).unwrap(),
            },
        )
        .await
        .unwrap()
        .add_to_group(role, &mut *tx)
        .await
        .unwrap();
        User::activate(&mut *tx, user.pk).await.unwrap();
        tx.commit().await.unwrap();
        User::get(database, user.pk).await.unwrap()
    }
}

/// Keeps the cookies between requests like a browser would.
pub struct Browser<'a> {
    app: &'a StubApp,
    cookies: Vec<(String, String)>,
}

impl Browser<'_> {
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn csrf_token(&self) -> String {
        self.cookie("csrf_token").unwrap_or_default().to_owned()
    }

    pub async fn get(&mut self, uri: &str) -> Response<Body> {
        let request = self
            .with_cookies(Request::builder().uri(uri))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Posts the form with the current csrf token added.
    pub async fn post(&mut self, uri: &str, fields: &[(&str, &str)]) -> Response<Body> {
        let token = self.csrf_token();
        let mut fields = fields.to_vec();
        fields.push(("csrf_token", token.as_str()));
        self.post_raw(uri, &serde_urlencoded::to_string(&fields).unwrap())
            .await
    }

    pub async fn post_raw(&mut self, uri: &str, body: &str) -> Response<Body> {
        let request = self
            .with_cookies(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded"),
            )
            .body(Body::from(body.to_owned()))
            .unwrap();
        self.send(request).await
    }

    pub async fn sign_in(&mut self, username: &str) {
        self.get("/user/sign-in").await;
        let response = self
            .post(
                "/user/sign-in",
                &[("username", username), ("password", PASSWORD)],
            )
            .await;
        assert_eq!(response.status(), 303, "sign in failed for {}", username);
    }

    fn with_cookies(&self, builder: axum::http::request::Builder) -> axum::http::request::Builder {
        if self.cookies.is_empty() {
            return builder;
        }
        let cookie = self
            .cookies
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("; ");
        builder.header(header::COOKIE, cookie)
    }

    async fn send(&mut self, request: Request<Body>) -> Response<Body> {
        let response = self.app.request(request).await;
        for value in response.headers().get_all(header::SET_COOKIE) {
            let pair = value.to_str().unwrap().split(';').next().unwrap();
            let (key, value) = pair.split_once('=').unwrap();
            self.cookies.retain(|(k, _)| k != key);
            self.cookies.push((key.to_owned(), value.to_owned()));
        }
        response
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}
