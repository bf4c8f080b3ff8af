use std::{collections::HashMap, convert::Infallible, sync::Arc};

use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tera::{Context, Result as TeraResult, Tera, Value};
use warp::{
    http::{header::SET_COOKIE, HeaderValue, StatusCode, Uri},
    reply::Response,
    Filter, Rejection, Reply,
};

use crate::{
    catch_log::ValidationError,
    config::Config,
    dashboard::Dashboard,
    models::Submission,
    session::{Clock, SessionHandle, SessionStore},
};

pub const SESSION_COOKIE: &str = "bass_bash_session";
/// Carries the outcome of a form post across the redirect back to `/`.
pub const FLASH_COOKIE: &str = "bass_bash_flash";
const FLASH_LOGGED: &str = "logged";
const FLASH_MAX_AGE_SECS: u32 = 60;
const MAX_BODY_BYTES: u64 = 16 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not load templates")]
    LoadTemplates(#[source] tera::Error),

    #[error("Could not render template")]
    RenderTemplate(#[source] tera::Error),
}

fn round<const N: usize>(value: &Value, _args: &HashMap<String, Value>) -> TeraResult<Value> {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(x) => Ok(Value::String(format!("{x:.N$}"))),
            None => Ok(value.clone()),
        },
        _ => Ok(value.clone()),
    }
}

fn templates() -> Result<Tera, Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates([
        ("base.html", include_str!("templates/base.html")),
        ("dashboard.html", include_str!("templates/dashboard.html")),
    ])
    .map_err(Error::LoadTemplates)?;
    tera.register_filter("round1", round::<1>);
    Ok(tera)
}

/// Shared by every request.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    sessions: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    templates: Arc<Tera>,
}

impl AppState {
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Result<Self, Error> {
        Ok(Self {
            sessions: Arc::new(SessionStore::new(&config)),
            config: Arc::new(config),
            clock,
            templates: Arc::new(templates()?),
        })
    }

    fn render(&self, dashboard: &Dashboard, flash: Option<&Flash>) -> Result<String, Error> {
        let mut context = Context::new();
        context.insert("title", &self.config.title);
        context.insert("variant", &self.sessions.variant());
        context.insert("dashboard", dashboard);
        context.insert("flash", &flash);

        self.templates
            .render("dashboard.html", &context)
            .map_err(Error::RenderTemplate)
    }

    fn html(&self, dashboard: &Dashboard, flash: Option<&Flash>) -> Box<dyn Reply> {
        match self.render(dashboard, flash) {
            Ok(html) => Box::new(warp::reply::html(html)),
            Err(err) => {
                error!("Could not render dashboard: {:?}", err);
                Box::new(warp::reply::with_status(
                    warp::reply(),
                    StatusCode::INTERNAL_SERVER_ERROR,
                ))
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct Flash {
    kind: &'static str,
    text: String,
}

impl Flash {
    fn success() -> Self {
        Self {
            kind: "success",
            text: "Catch logged! 🎉".to_string(),
        }
    }

    fn error(err: ValidationError) -> Self {
        Self {
            kind: "error",
            text: err.to_string(),
        }
    }

    /// Reads back the value written by `submit_form`. Unknown values are
    /// ignored.
    fn from_cookie(value: &str) -> Option<Self> {
        if value == FLASH_LOGGED {
            Some(Self::success())
        } else {
            ValidationError::from_kind(value).map(Self::error)
        }
    }
}

/// The catch form as posted by the browser. Everything arrives as text and
/// unchecked checkboxes are missing entirely.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatchForm {
    technician: String,
    length_in: String,
    weight_lbs: String,
    tagged: Option<String>,
    tag_number: String,
}

impl From<CatchForm> for Submission {
    fn from(form: CatchForm) -> Self {
        Self {
            technician: form.technician,
            length_in: form.length_in.trim().parse().unwrap_or(0.0),
            weight_lbs: form.weight_lbs.trim().parse().ok(),
            tagged: form.tagged.is_some(),
            tag_number: Some(form.tag_number),
        }
    }
}

fn session_cookie_value(handle: &SessionHandle) -> Option<String> {
    handle
        .created
        .then(|| format!("{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax", handle.id))
}

fn with_cookies(reply: impl Reply, cookies: impl IntoIterator<Item = String>) -> Response {
    let mut res = reply.into_response();
    for cookie in cookies {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                res.headers_mut().append(SET_COOKIE, value);
            }
            Err(err) => error!("Could not set cookie {cookie:?}: {err}"),
        }
    }
    res
}

fn error_body(err: ValidationError) -> serde_json::Value {
    json!({ "error": err.to_string(), "kind": err.kind() })
}

async fn show_dashboard(
    cookie: Option<String>,
    flash: Option<String>,
    state: AppState,
) -> Result<Box<dyn Reply>, Infallible> {
    debug!("GET /");
    let now = state.clock.now();

    let dashboard = state
        .sessions
        .view(cookie.as_deref(), now, |session| session.dashboard(now.date()))
        .await;

    let html = state.html(
        &dashboard,
        flash.as_deref().and_then(Flash::from_cookie).as_ref(),
    );
    let clear = flash.map(|_| format!("{FLASH_COOKIE}=; Path=/; Max-Age=0"));

    Ok(Box::new(with_cookies(html, clear)))
}

async fn submit_form(
    cookie: Option<String>,
    form: CatchForm,
    state: AppState,
) -> Result<Box<dyn Reply>, Infallible> {
    debug!("POST / {:?}", form);
    let now = state.clock.now();
    let submission = Submission::from(form);

    let (handle, outcome) = state
        .sessions
        .with_session(cookie.as_deref(), now, |session| {
            match session.submit_catch(submission, now) {
                Ok(_) => FLASH_LOGGED,
                Err(err) => err.kind(),
            }
        })
        .await;

    let flash = format!(
        "{FLASH_COOKIE}={outcome}; Path=/; Max-Age={FLASH_MAX_AGE_SECS}; HttpOnly; SameSite=Lax"
    );
    let redirect = warp::redirect::see_other(Uri::from_static("/"));

    Ok(Box::new(with_cookies(
        redirect,
        session_cookie_value(&handle).into_iter().chain([flash]),
    )))
}

async fn api_dashboard(
    cookie: Option<String>,
    state: AppState,
) -> Result<Box<dyn Reply>, Infallible> {
    debug!("GET /api/dashboard");
    let now = state.clock.now();

    let dashboard = state
        .sessions
        .view(cookie.as_deref(), now, |session| session.dashboard(now.date()))
        .await;

    Ok(Box::new(warp::reply::json(&dashboard)))
}

async fn api_submit(
    cookie: Option<String>,
    submission: Submission,
    state: AppState,
) -> Result<Box<dyn Reply>, Infallible> {
    debug!("POST /api/catches {:?}", submission);
    let now = state.clock.now();

    let (handle, result) = state
        .sessions
        .with_session(cookie.as_deref(), now, |session| {
            session.submit_catch(submission, now)
        })
        .await;

    let reply: Box<dyn Reply> = match result {
        Ok(receipt) => Box::new(warp::reply::with_status(
            warp::reply::json(&receipt),
            StatusCode::CREATED,
        )),
        Err(err) => Box::new(warp::reply::with_status(
            warp::reply::json(&error_body(err)),
            StatusCode::UNPROCESSABLE_ENTITY,
        )),
    };

    Ok(Box::new(with_cookies(reply, session_cookie_value(&handle))))
}

macro_rules! assets {
    {$first_file:literal => $first_content_type:literal, $($file:literal => $content_type:literal),*} => {
        warp::get().or(warp::head()).unify().and({
            let f = warp::path($first_file)
                .and(warp::path::end())
                .map(|| { assets!(BUILDER, $first_file, $first_content_type) });
                $(
                    let f = f.or(warp::path($file)
                        .and(warp::path::end())
                        .map(|| { assets!(BUILDER, $file, $content_type) }));
                )*
            f
        })
    };
    (BUILDER, $file:literal, $content_type:literal) => {
        ::warp::hyper::Response::builder()
            .header("content-type", $content_type)
            .header("cache-control", "public, max-age=31536000")
            .body(::warp::hyper::Body::from(include_bytes!(concat!("assets/", $file)).as_slice()))
    };
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn session_cookie() -> impl Filter<Extract = (Option<String>,), Error = Infallible> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE)
}

fn flash_cookie() -> impl Filter<Extract = (Option<String>,), Error = Infallible> + Clone {
    warp::cookie::optional::<String>(FLASH_COOKIE)
}

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    // GET /
    let dashboard = warp::path::end()
        .and(warp::get())
        .and(session_cookie())
        .and(flash_cookie())
        .and(with_state(state.clone()))
        .and_then(show_dashboard);

    // POST /
    let submit = warp::path::end()
        .and(warp::post())
        .and(session_cookie())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::form::<CatchForm>())
        .and(with_state(state.clone()))
        .and_then(submit_form);

    // GET /api/dashboard
    let api_dashboard = warp::path!("api" / "dashboard")
        .and(warp::get())
        .and(session_cookie())
        .and(with_state(state.clone()))
        .and_then(api_dashboard);

    // POST /api/catches
    let api_submit = warp::path!("api" / "catches")
        .and(warp::post())
        .and(session_cookie())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json::<Submission>())
        .and(with_state(state))
        .and_then(api_submit);

    let assets = assets! {
        "style.css" => "text/css",
        "favicon.svg" => "image/svg+xml"
    };

    dashboard
        .or(submit)
        .or(api_dashboard)
        .or(api_submit)
        .or(assets)
        .with(warp::log("bass_bash::web"))
}
