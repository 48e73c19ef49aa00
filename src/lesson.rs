use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    errors::AppResult,
    untis::{CellState, ElementKind, PeriodElement, RawElement, RawPeriod, WeekData},
    util::{decode_date, decode_time},
};

pub const UNKNOWN: &str = "Unknown";

/// School-specific teacher ids that encode administrative states rather than
/// real substitute teachers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    pub supervision_id: i64,
    pub team_teaching_id: i64,
    pub unknown_name: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            supervision_id: 81,
            team_teaching_id: 411,
            unknown_name: UNKNOWN.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub long_name: Option<String>,
}

impl Entity {
    pub fn unknown(config: &DecoderConfig) -> Self {
        Self {
            id: -1,
            name: config.unknown_name.clone(),
            long_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: i64,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub teacher: String,
    pub subst_teacher: String,
    pub subject: String,
    pub room: Entity,
    pub additional_info: String,
    pub is_substitution: bool,
    pub is_teams: bool,
    pub is_eva: bool,
    pub is_cancelled: bool,
    pub is_free: bool,
}

/// Teachers, rooms and subjects, each deduplicated by id in order of first
/// appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub teachers: Vec<Entity>,
    pub rooms: Vec<Entity>,
    pub subjects: Vec<Entity>,
}

impl Catalog {
    pub fn from_elements<'a, I>(elements: I) -> Self
    where
        I: IntoIterator<Item = &'a RawElement>,
    {
        let mut catalog = Catalog::default();
        let mut seen: HashSet<(ElementKind, i64)> = HashSet::new();

        for e in elements {
            let list = match e.kind {
                ElementKind::Teacher => &mut catalog.teachers,
                ElementKind::Room => &mut catalog.rooms,
                ElementKind::Subject => &mut catalog.subjects,
                _ => continue,
            };
            if !seen.insert((e.kind, e.id)) {
                continue;
            }
            list.push(Entity {
                id: e.id,
                name: e.name.clone(),
                // teachers carry no long name
                long_name: match e.kind {
                    ElementKind::Teacher => None,
                    _ => e.long_name.clone(),
                },
            });
        }

        catalog
    }
}

/// Id-keyed view of one week's elements. The first element with a given id
/// wins.
struct Lookup<'a> {
    teachers: HashMap<i64, &'a RawElement>,
    rooms: HashMap<i64, &'a RawElement>,
    subjects: HashMap<i64, &'a RawElement>,
}

impl<'a> Lookup<'a> {
    fn new(elements: &'a [RawElement]) -> Self {
        let mut lookup = Lookup {
            teachers: HashMap::new(),
            rooms: HashMap::new(),
            subjects: HashMap::new(),
        };
        for e in elements {
            let map = match e.kind {
                ElementKind::Teacher => &mut lookup.teachers,
                ElementKind::Room => &mut lookup.rooms,
                ElementKind::Subject => &mut lookup.subjects,
                _ => continue,
            };
            map.entry(e.id).or_insert(e);
        }
        lookup
    }

    fn name(map: &HashMap<i64, &RawElement>, id: i64) -> Option<String> {
        map.get(&id).map(|e| e.name.clone())
    }
}

fn find_ref(period: &RawPeriod, kind: ElementKind) -> Option<&PeriodElement> {
    period.elements.iter().find(|e| e.kind == kind)
}

fn teacher_ref(period: &RawPeriod) -> Option<&PeriodElement> {
    let substitution = period.cell_state == CellState::Substitution;
    period
        .elements
        .iter()
        .find(|e| e.kind == ElementKind::Teacher && (!substitution || e.org_id != 0))
}

fn decode_period(period: &RawPeriod, lookup: &Lookup, config: &DecoderConfig) -> AppResult<Lesson> {
    let unknown = || config.unknown_name.clone();
    let substitution = period.cell_state == CellState::Substitution;

    let teacher = teacher_ref(period);
    let room = find_ref(period, ElementKind::Room);
    let subject = find_ref(period, ElementKind::Subject);

    let teacher_name = teacher
        .and_then(|t| {
            let id = if substitution { t.org_id } else { t.id };
            Lookup::name(&lookup.teachers, id)
        })
        .unwrap_or_else(unknown);
    let subst_teacher = match teacher {
        Some(t) if substitution => Lookup::name(&lookup.teachers, t.id).unwrap_or_else(unknown),
        _ => unknown(),
    };
    let subject_name = subject
        .and_then(|s| Lookup::name(&lookup.subjects, s.id))
        .unwrap_or_else(unknown);

    // Room lookup only happens when the period references a subject.
    let room = match (subject, room) {
        (Some(_), Some(r)) => lookup.rooms.get(&r.id).map(|e| Entity {
            id: e.id,
            name: e.name.clone(),
            long_name: e.long_name.clone(),
        }),
        _ => None,
    }
    .unwrap_or_else(|| Entity::unknown(config));

    let teacher_id = teacher.map(|t| t.id);
    let is_marker = matches!(
        teacher_id,
        Some(id) if id == config.supervision_id || id == config.team_teaching_id
    );

    Ok(Lesson {
        id: period.lesson_id,
        date: decode_date(period.date)?,
        start_time: decode_time(period.start_time)?,
        end_time: decode_time(period.end_time)?,
        teacher: teacher_name,
        subst_teacher,
        subject: subject_name,
        room,
        additional_info: period.period_text.clone().unwrap_or_default(),
        is_substitution: substitution && !is_marker,
        is_teams: substitution && teacher_id == Some(config.team_teaching_id),
        is_eva: teacher_id == Some(config.supervision_id),
        is_cancelled: period.cell_state == CellState::Cancel,
        is_free: period.cell_state == CellState::Free,
    })
}

/// Decodes one week's periods in input order. Unresolvable names degrade to
/// the unknown placeholder; malformed date or time codes fail the week.
pub fn decode_week(week: &WeekData, config: &DecoderConfig) -> AppResult<Vec<Lesson>> {
    let lookup = Lookup::new(&week.elements);

    week.periods()
        .iter()
        .map(|p| decode_period(p, &lookup, config))
        .collect()
}
