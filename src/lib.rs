pub mod aggregate;
pub mod auth;
pub mod blocks;
pub mod config;
pub mod errors;
pub mod lesson;
pub mod untis;
pub mod util;

use aggregate::{get_data, TimetableResponse};
use auth::Session;
use chrono::NaiveDate;
use errors::AppResult;
use lesson::{DecoderConfig, Entity};
use serde::Deserialize;
use untis::UntisClient;

/// Weeks fetched after the requested one by "get week".
pub const GET_WEEK_LOOK_AHEAD: u32 = 1;

/// Weeks fetched after today when sampling the catalogs.
pub const SAMPLE_LOOK_AHEAD: u32 = 2;

/// Upper bound on weeks fetched after the requested one; each week is one
/// upstream request.
pub const MAX_LOOK_AHEAD: u32 = 52;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Teachers,
    Rooms,
    Subjects,
}

impl Resource {
    /// Picks this resource's catalog out of an aggregation result.
    pub fn select(self, response: TimetableResponse) -> Vec<Entity> {
        response
            .data
            .map(|t| match self {
                Resource::Teachers => t.teachers,
                Resource::Rooms => t.rooms,
                Resource::Subjects => t.subjects,
            })
            .unwrap_or_default()
    }
}

pub async fn get_timetable(
    client: &UntisClient,
    session: &Session,
    date: NaiveDate,
    look_ahead: u32,
    config: &DecoderConfig,
) -> AppResult<TimetableResponse> {
    let source = client.weeks(session)?;
    get_data(&source, session.holidays.as_deref(), date, look_ahead, config).await
}

/// Teachers, rooms or subjects seen in the weeks around `today`. Empty when
/// the sample yielded no data.
pub async fn get_catalog(
    client: &UntisClient,
    session: &Session,
    resource: Resource,
    today: NaiveDate,
    config: &DecoderConfig,
) -> AppResult<Vec<Entity>> {
    let sample = get_timetable(client, session, today, SAMPLE_LOOK_AHEAD, config).await?;
    Ok(resource.select(sample))
}
