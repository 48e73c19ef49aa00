use chrono::NaiveDate;
use reqwest::{cookie::CookieStore, header, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    errors::{AppError, AppResult},
    untis::UntisClient,
    util::{encode_request_date, HolidayInterval},
};

const JSON_OR_TEXT: &str = "application/json, text/plain, */*";

#[derive(Clone)]
pub struct Credentials {
    pub school: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolYear {
    pub id: i64,
    pub name: String,
    pub date_range: DateRange,
    #[serde(default)]
    pub time_grid: Option<serde_json::Value>,
}

/// Everything a weekly fetch needs, as produced by the login handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: String,
    /// School name as sent in the `schoolname` cookie of weekly fetches.
    pub school_id: String,
    pub user_id: i64,
    pub allowed_class: Option<i64>,
    pub current_school_year: Option<SchoolYear>,
    pub holidays: Option<Vec<HolidayInterval>>,
}

/// Splits a `Cookie` header value into its value for `name`.
fn cookie_value(cookies: &str, name: &str) -> Option<String> {
    cookies.split(';').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k.trim() == name {
            Some(v.trim().to_owned())
        } else {
            None
        }
    })
}

/// Logs in and collects the session, user id, school year and holidays.
pub async fn get_session(
    client: &UntisClient,
    credentials: &Credentials,
    today: NaiveDate,
) -> AppResult<Session> {
    let http = client.http();

    let form = [
        ("school", credentials.school.as_str()),
        ("j_username", credentials.username.as_str()),
        ("j_password", credentials.password.as_str()),
        ("token", ""),
    ];
    let res = http
        .post(client.url("j_spring_security_check"))
        .header(header::ACCEPT, mime::APPLICATION_JSON.as_ref())
        .form(&form)
        .send()
        .await?;
    debug!(status = res.status().as_u16(), "login submitted");

    // session cookies are scoped to the /WebUntis path
    let scope = Url::parse(&client.url("")).map_err(|_| AppError::InternalError)?;
    let cookies = client
        .jar()
        .cookies(&scope)
        .and_then(|v| v.to_str().ok().map(str::to_owned))
        .ok_or(AppError::InvalidUsernamePassword)?;
    let session_id =
        cookie_value(&cookies, "JSESSIONID").ok_or(AppError::InvalidUsernamePassword)?;

    let token = http
        .get(client.url("api/token/new"))
        .header(header::ACCEPT, JSON_OR_TEXT)
        .send()
        .await?
        .error_for_status()
        .map_err(|_| AppError::InvalidToken)?
        .text()
        .await?;
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::InvalidToken);
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct AppData {
        user: User,
        current_school_year: Option<SchoolYear>,
        holidays: Option<Vec<HolidayInterval>>,
    }

    #[derive(Debug, Deserialize)]
    struct User {
        person: Person,
    }

    #[derive(Debug, Deserialize)]
    struct Person {
        id: i64,
    }

    let app: AppData = http
        .get(client.url("api/rest/view/v1/app/data"))
        .header(header::ACCEPT, JSON_OR_TEXT)
        .bearer_auth(token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .map_err(|_| AppError::InternalError)?;

    #[derive(Debug, Deserialize)]
    struct PageConfig {
        data: PageData,
    }

    #[derive(Debug, Deserialize)]
    struct PageData {
        elements: Vec<PageElement>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct PageElement {
        klasse_id: Option<i64>,
    }

    let page: PageConfig = http
        .get(client.url("api/public/timetable/weekly/pageconfig"))
        .query(&[
            ("type", "5".to_owned()),
            ("date", encode_request_date(today)),
            ("isMyTimetableSelected", "true".to_owned()),
        ])
        .header(header::ACCEPT, JSON_OR_TEXT)
        .bearer_auth(token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .map_err(|_| AppError::InternalError)?;

    let allowed_class = page.data.elements.first().and_then(|e| e.klasse_id);
    debug!(user = app.user.person.id, ?allowed_class, "session established");

    Ok(Session {
        session_id,
        school_id: credentials.school.clone(),
        user_id: app.user.person.id,
        allowed_class,
        current_school_year: app.current_school_year,
        holidays: app.holidays,
    })
}
