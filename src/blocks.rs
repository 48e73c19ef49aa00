use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    errors::AppResult,
    lesson::Lesson,
    util::{is_in_holiday, parse_display_instant, HolidayInterval},
};

/// One displayed timetable entry: a single period or a merged double period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub is_in_holiday: bool,
}

/// Merges lessons sharing `(id, date)` into double periods and orders the
/// result by calendar time.
///
/// A cancelled block is only reported as cancelled outside of holidays.
pub fn combine_to_blocks(
    lessons: Vec<Lesson>,
    holidays: Option<&[HolidayInterval]>,
) -> AppResult<Vec<Block>> {
    let mut groups: Vec<(Lesson, Option<Lesson>)> = Vec::new();
    let mut index: HashMap<(i64, String), usize> = HashMap::new();

    for lesson in lessons {
        let key = (lesson.id, lesson.date.clone());
        match index.get(&key).copied() {
            Some(i) if groups[i].1.is_none() => groups[i].1 = Some(lesson),
            Some(_) => warn!(
                lesson = lesson.id,
                date = %lesson.date,
                "more than two periods share a lesson and date, ignoring extra"
            ),
            None => {
                index.insert(key, groups.len());
                groups.push((lesson, None));
            }
        }
    }

    let mut blocks = groups
        .into_iter()
        .map(|(first, second)| {
            let in_holiday = is_in_holiday(&first.date, holidays)?;
            let mut lesson = first;

            if let Some(adj) = second {
                lesson.end_time = adj.end_time;
                lesson.is_substitution |= adj.is_substitution;
                lesson.is_cancelled |= adj.is_cancelled;
                lesson.is_free |= adj.is_free;
            }
            lesson.is_cancelled &= !in_holiday;

            Ok(Block {
                lesson,
                is_in_holiday: in_holiday,
            })
        })
        .collect::<AppResult<Vec<Block>>>()?;

    blocks.sort_by_cached_key(|b| parse_display_instant(&b.lesson.date, &b.lesson.start_time));

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::AppError, lesson::Entity};
    use serde_json::json;

    fn lesson(id: i64, date: &str, start: &str, end: &str) -> Lesson {
        Lesson {
            id,
            date: date.to_owned(),
            start_time: start.to_owned(),
            end_time: end.to_owned(),
            teacher: "A".to_owned(),
            subst_teacher: "Unknown".to_owned(),
            subject: "MA".to_owned(),
            room: Entity {
                id: 40,
                name: "R101".to_owned(),
                long_name: None,
            },
            additional_info: String::new(),
            is_substitution: false,
            is_teams: false,
            is_eva: false,
            is_cancelled: false,
            is_free: false,
        }
    }

    fn holidays() -> Vec<HolidayInterval> {
        vec![serde_json::from_value(json!({ "start": "2024-12-23", "end": "2025-01-06" })).unwrap()]
    }

    #[test]
    fn double_period_merges() {
        let blocks = combine_to_blocks(
            vec![
                lesson(1, "15.01.2024", "08:00", "08:45"),
                lesson(1, "15.01.2024", "08:45", "09:30"),
            ],
            Some(&[][..]),
        )
        .unwrap();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].lesson.start_time, "08:00");
        assert_eq!(blocks[0].lesson.end_time, "09:30");
        assert!(!blocks[0].is_in_holiday);
    }

    #[test]
    fn merged_flags_are_ored() {
        let mut second = lesson(1, "15.01.2024", "08:45", "09:30");
        second.is_substitution = true;
        second.is_free = true;
        second.is_cancelled = true;

        let blocks = combine_to_blocks(
            vec![lesson(1, "15.01.2024", "08:00", "08:45"), second],
            Some(&[][..]),
        )
        .unwrap();

        let b = &blocks[0].lesson;
        assert!(b.is_substitution && b.is_free && b.is_cancelled);
    }

    #[test]
    fn same_lesson_on_other_day_stays_separate() {
        let blocks = combine_to_blocks(
            vec![
                lesson(1, "15.01.2024", "08:00", "08:45"),
                lesson(1, "16.01.2024", "08:00", "08:45"),
            ],
            Some(&[][..]),
        )
        .unwrap();

        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn extra_periods_beyond_a_pair_are_dropped() {
        let blocks = combine_to_blocks(
            vec![
                lesson(1, "15.01.2024", "08:00", "08:45"),
                lesson(1, "15.01.2024", "08:45", "09:30"),
                lesson(1, "15.01.2024", "09:30", "10:15"),
            ],
            Some(&[][..]),
        )
        .unwrap();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].lesson.end_time, "09:30");
    }

    #[test]
    fn cancellation_in_holiday_is_suppressed() {
        let mut l = lesson(1, "27.12.2024", "08:00", "08:45");
        l.is_cancelled = true;
        let mut pair = vec![
            lesson(2, "30.12.2024", "08:00", "08:45"),
            lesson(2, "30.12.2024", "08:45", "09:30"),
        ];
        pair[0].is_cancelled = true;

        let mut input = vec![l];
        input.append(&mut pair);
        let blocks = combine_to_blocks(input, Some(holidays().as_slice())).unwrap();

        for b in &blocks {
            assert!(b.is_in_holiday);
            assert!(!b.lesson.is_cancelled);
        }
    }

    #[test]
    fn cancellation_outside_holiday_is_kept() {
        let mut l = lesson(1, "13.01.2025", "08:00", "08:45");
        l.is_cancelled = true;

        let blocks = combine_to_blocks(vec![l], Some(holidays().as_slice())).unwrap();
        assert!(blocks[0].lesson.is_cancelled);
        assert!(!blocks[0].is_in_holiday);
    }

    #[test]
    fn ordered_by_calendar_time() {
        let blocks = combine_to_blocks(
            vec![
                lesson(1, "02.02.2024", "08:00", "08:45"),
                lesson(2, "15.01.2024", "10:00", "10:45"),
                lesson(3, "15.01.2024", "08:00", "08:45"),
                lesson(4, "01.03.2023", "13:00", "13:45"),
            ],
            Some(&[][..]),
        )
        .unwrap();

        let ids: Vec<i64> = blocks.iter().map(|b| b.lesson.id).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);

        let instants: Vec<_> = blocks
            .iter()
            .map(|b| parse_display_instant(&b.lesson.date, &b.lesson.start_time).unwrap())
            .collect();
        assert!(instants.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn missing_holidays_fail() {
        let res = combine_to_blocks(vec![lesson(1, "15.01.2024", "08:00", "08:45")], None);
        assert!(matches!(res, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn serializes_flat() {
        let blocks =
            combine_to_blocks(vec![lesson(1, "15.01.2024", "08:00", "08:45")], Some(&[][..])).unwrap();
        let v = serde_json::to_value(&blocks[0]).unwrap();

        assert_eq!(v["startTime"], "08:00");
        assert_eq!(v["isInHoliday"], false);
        assert_eq!(v["room"]["name"], "R101");
        assert!(v["room"].get("longName").is_none());
    }
}
