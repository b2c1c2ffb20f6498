//! Natural-language times for reminders and calendar events.
//!
//! Understands relative offsets ("in 20 minutes", "in an hour"), a day word
//! ("today", "tomorrow", "monday", "next friday"), a clock time ("6 pm",
//! "18:30", "9:15am", "noon") and ISO-like stamps ("2026-03-01 18:30").

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday};
use regex::Regex;

const DEFAULT_HOUR: u32 = 9;

fn weekday(word: &str) -> Option<Weekday> {
    Some(match word {
        "monday" | "mon" => Weekday::Mon,
        "tuesday" | "tue" | "tues" => Weekday::Tue,
        "wednesday" | "wed" => Weekday::Wed,
        "thursday" | "thu" | "thur" | "thurs" => Weekday::Thu,
        "friday" | "fri" => Weekday::Fri,
        "saturday" | "sat" => Weekday::Sat,
        "sunday" | "sun" => Weekday::Sun,
        _ => return None,
    })
}

fn relative_offset(text: &str) -> Option<Duration> {
    let re = Regex::new(r"\bin\s+(\d+|an?|one)\s*(min|mins|minute|minutes|hr|hrs|hour|hours|day|days|week|weeks)\b").ok()?;
    let caps = re.captures(text)?;
    let amount: i64 = match &caps[1] {
        "a" | "an" | "one" => 1,
        n => n.parse().ok()?,
    };
    let unit = &caps[2];
    if unit.starts_with("min") {
        Duration::try_minutes(amount)
    } else if unit.starts_with('h') {
        Duration::try_hours(amount)
    } else if unit.starts_with('w') {
        Duration::try_weeks(amount)
    } else {
        Duration::try_days(amount)
    }
}

fn clock_time(text: &str) -> Option<NaiveTime> {
    if text.contains("noon") {
        return NaiveTime::from_hms_opt(12, 0, 0);
    }
    if text.contains("midnight") {
        return NaiveTime::from_hms_opt(0, 0, 0);
    }

    let re = Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*(a\.?m\.?|p\.?m\.?)?(?:\s|$|[^\w:])").ok()?;
    for caps in re.captures_iter(text) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
        let meridiem = caps.get(3).map(|m| m.as_str().starts_with('p'));
        // A bare number without ":" or am/pm is a day or count, not a time.
        if caps.get(2).is_none() && meridiem.is_none() {
            continue;
        }
        let hour = match meridiem {
            Some(_) if hour == 0 || hour > 12 => continue,
            Some(true) if hour < 12 => hour + 12,
            Some(false) if hour == 12 => 0,
            _ => hour,
        };
        if let Some(t) = NaiveTime::from_hms_opt(hour, minute, 0) {
            return Some(t);
        }
    }
    None
}

fn day_word<Tz: TimeZone>(text: &str, now: &DateTime<Tz>) -> Option<NaiveDate> {
    let today = now.date_naive();
    if text.contains("day after tomorrow") {
        return today.checked_add_signed(Duration::days(2));
    }
    if text.contains("tomorrow") {
        return today.succ_opt();
    }
    if text.contains("today") || text.contains("tonight") {
        return Some(today);
    }
    let words: Vec<&str> = text
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();
    // "next friday" and "friday" both mean the coming friday; a weekday equal
    // to today means a week from now.
    let target = words.iter().find_map(|w| weekday(w))?;
    let ahead = (7 + target.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        % 7;
    let days = if ahead == 0 { 7 } else { ahead };
    today.checked_add_signed(Duration::days(days))
}

fn iso_like(text: &str) -> Option<NaiveDateTime> {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    for fmt in ["%Y-%m-%d %H:%M", "%Y-%m-%d %I:%M %p", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(&cleaned, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(DEFAULT_HOUR, 0, 0))
}

fn localize<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&naive).earliest()
}

/// Parse `text` relative to `now`. Returns `None` for anything not understood
/// or for explicit stamps already in the past.
pub fn parse_when<Tz: TimeZone>(text: &str, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }
    let tz = now.timezone();

    if let Some(offset) = relative_offset(&lower) {
        return now.clone().checked_add_signed(offset);
    }

    if let Some(naive) = iso_like(&lower.to_uppercase()) {
        let dt = localize(&tz, naive)?;
        return (dt > *now).then_some(dt);
    }

    let date = day_word(&lower, now);
    let time = clock_time(&lower);
    match (date, time) {
        (Some(d), Some(t)) => {
            let dt = localize(&tz, d.and_time(t))?;
            if dt < *now {
                // "today at 9am" after 9am rolls to tomorrow.
                return localize(&tz, d.succ_opt()?.and_time(t));
            }
            Some(dt)
        }
        (Some(d), None) => {
            let t = if lower.contains("tonight") {
                NaiveTime::from_hms_opt(20, 0, 0)?
            } else {
                NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0)?
            };
            let dt = localize(&tz, d.and_time(t))?;
            (dt > *now).then_some(dt)
        }
        (None, Some(t)) => {
            let today = now.date_naive();
            let dt = localize(&tz, today.and_time(t))?;
            if dt <= *now {
                return localize(&tz, today.succ_opt()?.and_time(t));
            }
            Some(dt)
        }
        (None, None) => None,
    }
}
