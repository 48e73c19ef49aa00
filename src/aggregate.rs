use chrono::{Duration, NaiveDate};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::{
    blocks::{combine_to_blocks, Block},
    errors::{AppError, AppResult},
    lesson::{decode_week, Catalog, DecoderConfig, Entity, Lesson},
    untis::{WeekData, WeekResponse, WeekSource},
    util::HolidayInterval,
    MAX_LOOK_AHEAD,
};

pub const STATUS_OK: u16 = 200;
pub const STATUS_FORBIDDEN: u16 = 403;
pub const STATUS_NO_DATA: u16 = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timetable {
    pub lessons: Vec<Block>,
    pub teachers: Vec<Entity>,
    pub rooms: Vec<Entity>,
    pub subjects: Vec<Entity>,
}

/// Result of an aggregation. Authorization failures and weeks without usable
/// data are reported through `status` with no `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableResponse {
    pub status: u16,
    pub data: Option<Timetable>,
}

impl TimetableResponse {
    fn failed(status: u16) -> Self {
        Self { status, data: None }
    }
}

/// Start date followed by `look_ahead` dates, each one week apart.
pub fn week_dates(start: NaiveDate, look_ahead: u32) -> AppResult<Vec<NaiveDate>> {
    (0..=look_ahead)
        .map(|w| {
            start
                .checked_add_signed(Duration::weeks(w.into()))
                .ok_or_else(|| {
                    AppError::InvalidInput(format!("{} weeks after {} is out of range", w, start))
                })
        })
        .collect()
}

/// Fetches `look_ahead + 1` weeks concurrently and assembles them into one
/// ordered timetable with merged catalogs.
#[instrument(skip(source, holidays, config))]
pub async fn get_data<S: WeekSource>(
    source: &S,
    holidays: Option<&[HolidayInterval]>,
    start: NaiveDate,
    look_ahead: u32,
    config: &DecoderConfig,
) -> AppResult<TimetableResponse> {
    if holidays.is_none() {
        return Err(AppError::invalid_input("no holiday list for this session"));
    }

    if look_ahead > MAX_LOOK_AHEAD {
        return Err(AppError::InvalidInput(format!(
            "look-ahead of {} weeks exceeds the limit of {}",
            look_ahead, MAX_LOOK_AHEAD
        )));
    }

    let dates = week_dates(start, look_ahead)?;
    let responses = try_join_all(dates.iter().map(|d| source.fetch_week(*d))).await?;

    if responses.iter().any(|r| matches!(r, WeekResponse::Forbidden)) {
        warn!("weekly fetch was forbidden");
        return Ok(TimetableResponse::failed(STATUS_FORBIDDEN));
    }

    let weeks: Vec<WeekData> = responses
        .into_iter()
        .filter_map(|r| match r {
            WeekResponse::Week(week) => Some(week),
            _ => None,
        })
        .collect();
    if weeks.is_empty() {
        return Ok(TimetableResponse::failed(STATUS_NO_DATA));
    }

    let mut lessons: Vec<Lesson> = Vec::new();
    let mut decoded: Vec<&WeekData> = Vec::new();
    for week in &weeks {
        match decode_week(week, config) {
            Ok(mut l) => {
                debug!(periods = l.len(), elements = week.elements.len(), "decoded week");
                lessons.append(&mut l);
                decoded.push(week);
            }
            Err(e) => warn!(error = %e, "dropping week with undecodable periods"),
        }
    }
    if decoded.is_empty() {
        return Ok(TimetableResponse::failed(STATUS_NO_DATA));
    }

    // a week with at most one element has no published timetable
    let substantive: Vec<&WeekData> = decoded
        .into_iter()
        .filter(|w| w.elements.len() > 1)
        .collect();
    if substantive.is_empty() {
        return Ok(TimetableResponse::failed(STATUS_NO_DATA));
    }

    let catalog = Catalog::from_elements(substantive.into_iter().flat_map(|w| &w.elements));
    let lessons = combine_to_blocks(lessons, holidays)?;

    Ok(TimetableResponse {
        status: STATUS_OK,
        data: Some(Timetable {
            lessons,
            teachers: catalog.teachers,
            rooms: catalog.rooms,
            subjects: catalog.subjects,
        }),
    })
}
