pub mod account;
pub mod admin;
pub mod api;
pub mod dashboard;
pub mod gateway;

use axum::{
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};

const FLASH_SUCCESS: &str = "flash_success";
const FLASH_ERROR: &str = "flash_error";

/// One-shot messages carried across a redirect in cookies.
#[derive(Debug, Default)]
pub struct Flash {
    pub success: Option<String>,
    pub error: Option<String>,
}

/// Set a flash cookie and redirect to the given path.
pub fn set_flash_and_redirect(
    jar: CookieJar,
    success: Option<&str>,
    error: Option<&str>,
    destination: &str,
) -> Response {
    let mut jar = jar;

    if let Some(msg) = success {
        jar = jar.add(flash_cookie(FLASH_SUCCESS, msg));
    }
    if let Some(msg) = error {
        jar = jar.add(flash_cookie(FLASH_ERROR, msg));
    }

    (jar, Redirect::to(destination)).into_response()
}

/// Read and clear the flash cookies.
pub fn take_flash(jar: CookieJar) -> (CookieJar, Flash) {
    let flash = Flash {
        success: jar.get(FLASH_SUCCESS).map(|c| c.value().to_owned()),
        error: jar.get(FLASH_ERROR).map(|c| c.value().to_owned()),
    };

    let clear_success = Cookie::build((FLASH_SUCCESS, ""))
        .path("/")
        .max_age(time::Duration::seconds(0))
        .build();
    let clear_error = Cookie::build((FLASH_ERROR, ""))
        .path("/")
        .max_age(time::Duration::seconds(0))
        .build();

    (jar.remove(clear_success).remove(clear_error), flash)
}

fn flash_cookie(name: &'static str, msg: &str) -> Cookie<'static> {
    Cookie::build((name, msg.to_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(30))
        .build()
}

/// The request's User-Agent header, if present and valid UTF-8.
pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
