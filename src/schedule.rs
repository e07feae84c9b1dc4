use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Per-day availability. The one-character codes are shared by the wire
/// protocol, the store, and the shell's buttons, so they must round-trip
/// without remapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    #[serde(rename = "〇")]
    Available,
    #[serde(rename = "△")]
    Maybe,
    #[serde(rename = "×")]
    Unavailable,
    #[serde(rename = "-")]
    Unset,
}

impl Availability {
    pub fn from_code(c: char) -> Option<Availability> {
        match c {
            '〇' => Some(Availability::Available),
            '△' => Some(Availability::Maybe),
            '×' => Some(Availability::Unavailable),
            '-' => Some(Availability::Unset),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            Availability::Available => '〇',
            Availability::Maybe => '△',
            Availability::Unavailable => '×',
            Availability::Unset => '-',
        }
    }

    pub fn parse(raw: &str) -> Option<Availability> {
        let mut chars = raw.trim().chars();
        let first = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Availability::from_code(first)
    }
}

/// One calendar month of a member's availability. `month` is zero-based
/// (0 = January) to match the month arithmetic below. `availabilities`
/// holds one entry per day, index 0 = day 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySchedule {
    pub year: i32,
    pub month: u32,
    pub availabilities: Vec<Availability>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleError {
    pub code: String,
    pub message: String,
}

impl ScheduleError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// The month being viewed and edited, derived from today plus a month
/// offset. Never stored with the schedules; re-derived on every open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthCursor {
    pub year: i32,
    pub month: u32,
    pub days: usize,
    pub start_weekday: u32,
}

pub fn days_in_month(year: i32, month: u32) -> Option<usize> {
    let first = NaiveDate::from_ymd_opt(year, month + 1, 1)?;
    let next = first.checked_add_months(Months::new(1))?;
    Some(next.signed_duration_since(first).num_days() as usize)
}

pub fn month_cursor(today: NaiveDate, month_offset: i32) -> Option<MonthCursor> {
    let shifted = if month_offset >= 0 {
        today.checked_add_months(Months::new(month_offset as u32))?
    } else {
        today.checked_sub_months(Months::new(month_offset.unsigned_abs()))?
    };
    let first = shifted.with_day(1)?;
    Some(MonthCursor {
        year: first.year(),
        month: first.month0(),
        days: days_in_month(first.year(), first.month0())?,
        start_weekday: first.weekday().num_days_from_sunday(),
    })
}

pub fn default_availabilities(year: i32, month: u32) -> Option<Vec<Availability>> {
    Some(vec![Availability::Unset; days_in_month(year, month)?])
}

pub fn find_schedule<'a>(
    schedules: &'a [MonthlySchedule],
    year: i32,
    month: u32,
) -> Option<&'a MonthlySchedule> {
    schedules
        .iter()
        .find(|s| s.year == year && s.month == month)
}

/// Replaces the availabilities of the entry matching `updated`'s month and
/// passes every other entry through unchanged, preserving order. A month
/// missing from the collection is appended rather than dropped: a member
/// whose initial load was empty still gets to keep their edits.
pub fn merge_schedule(
    schedules: &[MonthlySchedule],
    updated: &MonthlySchedule,
) -> Vec<MonthlySchedule> {
    let mut merged = Vec::with_capacity(schedules.len() + 1);
    let mut matched = false;
    for entry in schedules {
        if entry.year == updated.year && entry.month == updated.month {
            matched = true;
            merged.push(MonthlySchedule {
                year: entry.year,
                month: entry.month,
                availabilities: updated.availabilities.clone(),
            });
        } else {
            merged.push(entry.clone());
        }
    }
    if !matched {
        merged.push(updated.clone());
    }
    merged
}

/// Single-cell edit. Selecting the value a day already holds clears it
/// back to unset; anything else overwrites. An out-of-range index is a
/// caller bug and is rejected, never clamped.
pub fn toggle_day(
    selections: &[Availability],
    day_index: usize,
    value: Availability,
) -> Result<Vec<Availability>, ScheduleError> {
    if day_index >= selections.len() {
        return Err(ScheduleError::new(
            "day_out_of_range",
            format!(
                "day index {} out of range for {} days",
                day_index,
                selections.len()
            ),
        ));
    }
    let mut updated = selections.to_vec();
    updated[day_index] = if updated[day_index] == value {
        Availability::Unset
    } else {
        value
    };
    Ok(updated)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayFilter {
    AllDays,
    Weekday(u32),
}

impl DayFilter {
    /// `-` is the shell's "all days" dropdown entry; everything else must
    /// be a full weekday name.
    pub fn parse(raw: &str) -> Option<DayFilter> {
        let t = raw.trim();
        if t == "-" {
            return Some(DayFilter::AllDays);
        }
        WEEKDAY_NAMES
            .iter()
            .position(|name| *name == t)
            .map(|i| DayFilter::Weekday(i as u32))
    }
}

/// Bulk weekday edit. Unlike `toggle_day` this is a direct set: matching
/// days take `value` unconditionally, so repeated application is
/// idempotent. Non-matching days are left exactly as they were.
pub fn bulk_apply(
    selections: &[Availability],
    start_weekday: u32,
    filter: DayFilter,
    value: Availability,
) -> Vec<Availability> {
    selections
        .iter()
        .enumerate()
        .map(|(index, current)| {
            let day_of_week = (start_weekday + index as u32) % 7;
            match filter {
                DayFilter::AllDays => value,
                DayFilter::Weekday(target) if target == day_of_week => value,
                DayFilter::Weekday(_) => *current,
            }
        })
        .collect()
}

/// Store format: one code character per day. Short or unknown input
/// normalizes to unset so a stored row can never misalign day indices.
pub fn decode_codes(raw: &str, days: usize) -> Vec<Availability> {
    let mut selections: Vec<Availability> = raw
        .chars()
        .map(|c| Availability::from_code(c).unwrap_or(Availability::Unset))
        .collect();
    if selections.len() < days {
        selections.resize(days, Availability::Unset);
    } else if selections.len() > days {
        selections.truncate(days);
    }
    selections
}

pub fn encode_codes(selections: &[Availability]) -> String {
    selections.iter().map(|a| a.code()).collect()
}
