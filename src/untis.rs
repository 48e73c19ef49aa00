use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{
    cookie::Jar,
    header::{self, HeaderValue},
    Client, StatusCode,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    auth::Session,
    errors::{AppError, AppResult},
    util::encode_request_date,
};

/// Element type code used by WebUntis for a student's personal timetable.
const STUDENT_ELEMENT_TYPE: u8 = 5;
const WEEKLY_FORMAT_ID: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "u8")]
pub enum ElementKind {
    Class,
    Teacher,
    Subject,
    Room,
    Student,
    Other(u8),
}

impl From<u8> for ElementKind {
    fn from(code: u8) -> Self {
        match code {
            1 => ElementKind::Class,
            2 => ElementKind::Teacher,
            3 => ElementKind::Subject,
            4 => ElementKind::Room,
            5 => ElementKind::Student,
            n => ElementKind::Other(n),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CellState {
    Substitution,
    Cancel,
    Free,
    #[default]
    #[serde(other)]
    Other,
}

/// Catalog entry accompanying one fetched week.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawElement {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub long_name: Option<String>,
}

/// Reference from a period into the week's element catalog.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodElement {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub id: i64,
    #[serde(default)]
    pub org_id: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPeriod {
    pub lesson_id: i64,
    #[serde(default)]
    pub cell_state: CellState,
    pub date: i64,
    pub start_time: i64,
    pub end_time: i64,
    #[serde(default)]
    pub period_text: Option<String>,
    #[serde(default)]
    pub elements: Vec<PeriodElement>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekData {
    pub element_periods: BTreeMap<String, Vec<RawPeriod>>,
    pub elements: Vec<RawElement>,
    #[serde(skip)]
    pub element_id: Option<i64>,
}

impl WeekData {
    /// Periods of the requested element, or of the first listed element when
    /// the requested one is absent. Integer keys list first, in numeric order.
    pub fn periods(&self) -> &[RawPeriod] {
        self.element_id
            .and_then(|id| self.element_periods.get(&id.to_string()))
            .or_else(|| {
                self.element_periods
                    .iter()
                    .min_by_key(|(k, _)| k.parse::<u64>().map_or((1, 0), |n| (0, n)))
                    .map(|(_, periods)| periods)
            })
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WeekResponse {
    Forbidden,
    Invalid { status: u16 },
    Week(WeekData),
}

/// Classifies one weekly response. Statuses of 500 and above are transport
/// failures, everything below is inspected.
pub fn classify_response(
    status: StatusCode,
    body: &[u8],
    element_id: Option<i64>,
) -> AppResult<WeekResponse> {
    #[derive(Debug, Deserialize)]
    struct Envelope {
        data: Outer,
    }

    #[derive(Debug, Deserialize)]
    struct Outer {
        result: Inner,
    }

    #[derive(Debug, Deserialize)]
    struct Inner {
        data: WeekData,
    }

    if status.as_u16() >= 500 {
        return Err(AppError::Upstream {
            status: status.as_u16(),
        });
    }
    if status == StatusCode::FORBIDDEN {
        return Ok(WeekResponse::Forbidden);
    }

    match serde_json::from_slice::<Envelope>(body) {
        Ok(Envelope { data }) => {
            let mut week = data.result.data;
            week.element_id = element_id;
            Ok(WeekResponse::Week(week))
        }
        Err(e) => {
            warn!(status = status.as_u16(), error = %e, "dropping malformed weekly payload");
            Ok(WeekResponse::Invalid {
                status: status.as_u16(),
            })
        }
    }
}

/// Anything that can produce one week of raw timetable data.
#[async_trait]
pub trait WeekSource: Sync {
    async fn fetch_week(&self, date: NaiveDate) -> AppResult<WeekResponse>;
}

#[derive(Debug, Clone)]
pub struct UntisClient {
    client: Client,
    jar: Arc<Jar>,
    base_url: String,
}

impl UntisClient {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(jar.clone())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            jar,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/WebUntis/{}", self.base_url, path)
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn jar(&self) -> &Jar {
        &self.jar
    }

    /// Binds the client to a session for weekly fetches.
    pub fn weeks<'a>(&'a self, session: &'a Session) -> AppResult<WeekFetcher<'a>> {
        if session.session_id.is_empty() {
            return Err(AppError::MissingSession);
        }

        Ok(WeekFetcher {
            client: self,
            session,
        })
    }
}

#[derive(Debug)]
pub struct WeekFetcher<'a> {
    client: &'a UntisClient,
    session: &'a Session,
}

impl WeekFetcher<'_> {
    fn cookie(&self) -> AppResult<HeaderValue> {
        HeaderValue::from_str(&format!(
            "JSESSIONID={}; schoolname=\"{}\";",
            self.session.session_id, self.session.school_id
        ))
        .map_err(|_| AppError::invalid_input("session id or school is not a valid header value"))
    }
}

#[async_trait]
impl WeekSource for WeekFetcher<'_> {
    async fn fetch_week(&self, date: NaiveDate) -> AppResult<WeekResponse> {
        let res = self
            .client
            .http()
            .get(self.client.url("api/public/timetable/weekly/data"))
            .query(&[
                ("elementType", STUDENT_ELEMENT_TYPE.to_string()),
                ("elementId", self.session.user_id.to_string()),
                ("date", encode_request_date(date)),
                ("formatId", WEEKLY_FORMAT_ID.to_string()),
            ])
            .header(header::COOKIE, self.cookie()?)
            .header(header::ACCEPT, mime::APPLICATION_JSON.as_ref())
            .send()
            .await?;

        let status = res.status();
        let body = res.bytes().await?;
        debug!(%date, status = status.as_u16(), bytes = body.len(), "fetched week");

        classify_response(status, &body, Some(self.session.user_id))
    }
}
