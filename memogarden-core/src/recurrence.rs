//! Occurrence generation for iCal-style recurrence rules.
//!
//! Supports the subset the recurrence entities use: `FREQ` of DAILY,
//! WEEKLY, MONTHLY, or YEARLY, with optional `INTERVAL`, `COUNT`, and
//! `UNTIL`. Monthly and yearly steps clamp to the last day of a short
//! month (Jan 31 + 1 month = Feb 28/29).

use chrono::{Days, Months, NaiveDate};

use crate::errors::{GardenResult, MemoGardenError};

/// How often the rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// A parsed recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub freq: Frequency,
    pub interval: u32,
    pub count: Option<u32>,
    pub until: Option<NaiveDate>,
}

/// Parse an RRULE string of `KEY=VALUE` parts separated by `;`.
pub fn parse_rrule(rrule: &str) -> GardenResult<RecurrenceRule> {
    let mut freq = None;
    let mut interval = 1u32;
    let mut count = None;
    let mut until = None;

    for part in rrule.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let Some((key, value)) = part.split_once('=') else {
            return Err(MemoGardenError::validation(format!(
                "malformed rrule part '{part}'"
            )));
        };
        match key.to_ascii_uppercase().as_str() {
            "FREQ" => {
                freq = Some(match value.to_ascii_uppercase().as_str() {
                    "DAILY" => Frequency::Daily,
                    "WEEKLY" => Frequency::Weekly,
                    "MONTHLY" => Frequency::Monthly,
                    "YEARLY" => Frequency::Yearly,
                    other => {
                        return Err(MemoGardenError::validation(format!(
                            "unsupported rrule frequency '{other}'"
                        )))
                    }
                });
            }
            "INTERVAL" => {
                interval = value.parse().map_err(|_| {
                    MemoGardenError::validation(format!("invalid rrule interval '{value}'"))
                })?;
                if interval == 0 {
                    return Err(MemoGardenError::validation("rrule interval must be positive"));
                }
            }
            "COUNT" => {
                count = Some(value.parse().map_err(|_| {
                    MemoGardenError::validation(format!("invalid rrule count '{value}'"))
                })?);
            }
            "UNTIL" => {
                until = Some(parse_until(value)?);
            }
            // BYDAY and friends are not evaluated here.
            _ => {}
        }
    }

    let Some(freq) = freq else {
        return Err(MemoGardenError::validation("rrule is missing FREQ"));
    };
    Ok(RecurrenceRule {
        freq,
        interval,
        count,
        until,
    })
}

fn parse_until(value: &str) -> GardenResult<NaiveDate> {
    // Either a bare 8-digit date stamp or an ISO date; time parts of a
    // full UNTIL stamp are ignored.
    let date_part = &value[..value.len().min(8)];
    NaiveDate::parse_from_str(date_part, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(&value[..value.len().min(10)], "%Y-%m-%d"))
        .map_err(|_| MemoGardenError::validation(format!("invalid rrule UNTIL '{value}'")))
}

/// All occurrences of a rule anchored at `start`, intersected with the
/// inclusive `[window_start, window_end]` window.
pub fn generate_occurrences(
    rrule: &str,
    start: NaiveDate,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> GardenResult<Vec<NaiveDate>> {
    let rule = parse_rrule(rrule)?;
    let mut occurrences = Vec::new();

    let mut fired: u32 = 0;
    let mut step: u32 = 0;
    loop {
        let Some(current) = advance(start, rule.freq, rule.interval, step) else {
            break;
        };
        if let Some(count) = rule.count {
            if fired >= count {
                break;
            }
        }
        if let Some(until) = rule.until {
            if current > until {
                break;
            }
        }
        if current > window_end {
            break;
        }
        fired += 1;
        if current >= window_start {
            occurrences.push(current);
        }
        step += 1;
    }

    Ok(occurrences)
}

/// The rule's `step`-th occurrence after its anchor.
fn advance(start: NaiveDate, freq: Frequency, interval: u32, step: u32) -> Option<NaiveDate> {
    let distance = interval.checked_mul(step)?;
    match freq {
        Frequency::Daily => start.checked_add_days(Days::new(u64::from(distance))),
        Frequency::Weekly => start.checked_add_days(Days::new(u64::from(distance) * 7)),
        Frequency::Monthly => start.checked_add_months(Months::new(distance)),
        Frequency::Yearly => start.checked_add_months(Months::new(distance.checked_mul(12)?)),
    }
}
