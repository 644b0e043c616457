//! C1 — Transcript Parser: stream bytes to an ordered sequence of
//! [`ParsedMessage`] records, sniffing the date layout and dropping system
//! lines along the way. See SPEC_FULL.md §4.1.

use crate::error::AnalysisError;
use crate::models::ParsedMessage;
use crate::sidedata::is_system_or_media;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{BufRead, BufReader, Read};

/// Number of leading header-matching lines used to sniff the date layout.
const SNIFF_WINDOW: usize = 100;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)^\x{200E}?\[?(?P<d1>\d{1,2})/(?P<d2>\d{1,2})/(?P<year>\d{2,4}),\s*(?P<hour>\d{1,2}):(?P<minute>\d{2})(?::(?P<second>\d{2}))?[\s\x{202f}]?(?P<ampm>[ap]m)?\]?\s*(?:[-|]\s*)?(?P<sender>[^:]+?):\s*(?P<message>.*)$"#,
    )
    .expect("header regex must compile")
});

const PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[]^_`{|}~\u{201c}\u{201d}\u{2018}\u{2019}";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DateOrder {
    DayFirst,
    MonthFirst,
}

struct HeaderMatch {
    date_src: String,
    d1: u32,
    d2: u32,
    year: u32,
    hour: u32,
    minute: u32,
    second: u32,
    pm: Option<bool>,
    sender: String,
    message: String,
}

pub struct ParseOutcome {
    /// Count of all non-blank lines, regardless of whether they matched the
    /// header grammar or were later dropped as system/media noise.
    pub raw_count: u32,
    pub messages: Vec<ParsedMessage>,
}

pub fn parse_transcript<R: Read>(reader: R) -> Result<ParseOutcome, AnalysisError> {
    let buffered = BufReader::new(reader);
    let mut lines = Vec::new();
    for line in buffered.lines() {
        let line = line.map_err(|e| AnalysisError::ParserFatal(e.to_string()))?;
        lines.push(line);
    }
    Ok(parse_lines(&lines))
}

fn parse_lines(lines: &[String]) -> ParseOutcome {
    let mut raw_count = 0u32;
    let mut candidates = Vec::new();

    for raw in lines {
        let line = raw.trim_start_matches('\u{200E}');
        if line.trim().is_empty() {
            continue;
        }
        raw_count += 1;

        if let Some(caps) = HEADER_RE.captures(line) {
            candidates.push(extract_header(&caps));
        }
    }

    let sniff_sample = &candidates[..candidates.len().min(SNIFF_WINDOW)];
    let layout = sniff_layout(sniff_sample);

    let mut messages = Vec::with_capacity(candidates.len());
    for cand in &candidates {
        let Some(timestamp) = resolve_timestamp(cand, layout) else {
            continue;
        };
        let lower_message = cand.message.to_lowercase();
        if is_system_or_media(&lower_message) {
            continue;
        }
        messages.push(ParsedMessage {
            timestamp,
            source_date: cand.date_src.clone(),
            sender: cand.sender.trim().to_string(),
            cleaned_text: clean_message(&cand.message),
            original_text: cand.message.clone(),
        });
    }

    ParseOutcome { raw_count, messages }
}

fn extract_header(caps: &regex::Captures) -> HeaderMatch {
    let get = |name: &str| caps.name(name).map(|m| m.as_str()).unwrap_or("");
    let year_src = get("year");
    let mut year: u32 = year_src.parse().unwrap_or(0);
    if year_src.len() <= 2 {
        year += 2000;
    }
    let pm = caps.name("ampm").map(|m| m.as_str().eq_ignore_ascii_case("pm"));

    HeaderMatch {
        date_src: format!("{}/{}/{}", get("d1"), get("d2"), year_src),
        d1: get("d1").parse().unwrap_or(0),
        d2: get("d2").parse().unwrap_or(0),
        year,
        hour: get("hour").parse().unwrap_or(0),
        minute: get("minute").parse().unwrap_or(0),
        second: caps.name("second").map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0),
        pm,
        sender: get("sender").to_string(),
        message: get("message").to_string(),
    }
}

/// Attempt to interpret `(d1, d2, year)` as a calendar date under `order`.
fn try_date(cand: &HeaderMatch, order: DateOrder) -> Option<NaiveDate> {
    let (day, month) = match order {
        DateOrder::DayFirst => (cand.d1, cand.d2),
        DateOrder::MonthFirst => (cand.d2, cand.d1),
    };
    NaiveDate::from_ymd_opt(cand.year as i32, month, day)
}

fn try_time(cand: &HeaderMatch) -> Option<NaiveTime> {
    let mut hour = cand.hour;
    if let Some(pm) = cand.pm {
        if hour == 12 {
            hour = if pm { 12 } else { 0 };
        } else if pm {
            hour += 12;
        }
    }
    NaiveTime::from_hms_opt(hour, cand.minute, cand.second)
}

/// First-100-candidates layout elimination. European (day-first) wins ties;
/// this tie-break is the only opinionated decision in the parser and MUST be
/// preserved (§4.1).
fn sniff_layout(sample: &[HeaderMatch]) -> Option<DateOrder> {
    let mut eligible = vec![DateOrder::DayFirst, DateOrder::MonthFirst];

    for cand in sample {
        eligible.retain(|&order| try_date(cand, order).is_some());
        if eligible.is_empty() {
            break;
        }
    }

    if eligible.contains(&DateOrder::DayFirst) {
        Some(DateOrder::DayFirst)
    } else if eligible.contains(&DateOrder::MonthFirst) {
        Some(DateOrder::MonthFirst)
    } else {
        None
    }
}

/// Resolve a candidate's timestamp. When sniffing produced no surviving
/// layout, fall back to trying every order line-by-line (day-first first),
/// dropping the line if neither accepts it.
fn resolve_timestamp(cand: &HeaderMatch, layout: Option<DateOrder>) -> Option<DateTime<Utc>> {
    let time = try_time(cand)?;
    let orders: Vec<DateOrder> = match layout {
        Some(order) => vec![order],
        None => vec![DateOrder::DayFirst, DateOrder::MonthFirst],
    };
    for order in orders {
        if let Some(date) = try_date(cand, order) {
            let naive = NaiveDateTime::new(date, time);
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
        }
    }
    None
}

fn clean_message(text: &str) -> String {
    static URL_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)\b(?:https?://|www\.)\S+").expect("url regex must compile")
    });
    let without_urls = URL_RE.replace_all(text, " ");

    without_urls
        .split_whitespace()
        .filter_map(|token| {
            let cleaned: String = token
                .chars()
                .filter(|c| !PUNCTUATION.contains(*c))
                .collect::<String>()
                .to_lowercase();
            if cleaned.chars().count() < 3 || crate::sidedata::is_stopword(&cleaned) {
                None
            } else {
                Some(cleaned)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str) -> ParseOutcome {
        parse_transcript(Cursor::new(text.as_bytes())).unwrap()
    }

    #[test]
    fn parses_bracketed_line() {
        let out = parse("[2/3/24, 10:00] A: hi\n");
        assert_eq!(out.raw_count, 1);
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].sender, "A");
        assert_eq!(out.messages[0].timestamp.format("%H:%M").to_string(), "10:00");
    }

    #[test]
    fn parses_dash_separated_line() {
        let out = parse("2/3/24, 10:05 - B: hey hey\n");
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].sender, "B");
    }

    #[test]
    fn day_first_wins_ties() {
        // 02/03/25 is ambiguous: both day-first (Feb 3) and month-first (Mar 2)
        // parse cleanly with no other evidence in the sample to eliminate either.
        let out = parse("02/03/25, 09:00 - A: hi\n");
        assert_eq!(out.messages[0].timestamp.format("%m-%d").to_string(), "02-03");
    }

    #[test]
    fn day_first_survives_when_month_first_is_impossible() {
        // "13/01/24" is invalid as month-first (month=13), eliminating it outright;
        // both lines parse cleanly under day-first.
        let out = parse("13/01/24, 09:00 - A: hi\n02/25/24, 09:05 - A: hi\n");
        assert_eq!(out.messages.len(), 2);
        assert_eq!(out.messages[0].timestamp.format("%m-%d").to_string(), "01-13");
    }

    #[test]
    fn drops_system_lines_but_counts_them_raw() {
        let out = parse(
            "[2/3/24, 10:00] A: hi\n[2/3/24, 10:01] A: image omitted>\n",
        );
        assert_eq!(out.raw_count, 2);
        assert_eq!(out.messages.len(), 1);
    }

    #[test]
    fn strips_leading_lrm_and_blank_lines() {
        let out = parse("\u{200e}[2/3/24, 10:00] A: hi\n\n\n");
        assert_eq!(out.raw_count, 1);
        assert_eq!(out.messages.len(), 1);
    }

    #[test]
    fn cleans_urls_stopwords_and_short_tokens() {
        let out = parse("[2/3/24, 10:00] A: check this out http://example.com the cat sat\n");
        assert_eq!(out.messages[0].cleaned_text, "check cat sat");
    }

    #[test]
    fn am_pm_hour_conversion() {
        let out = parse("2/3/24, 9:15 PM - A: late night\n");
        assert_eq!(out.messages[0].timestamp.format("%H:%M").to_string(), "21:15");
    }

    #[test]
    fn twelve_am_is_midnight() {
        let out = parse("2/3/24, 12:00 AM - A: midnight\n");
        assert_eq!(out.messages[0].timestamp.format("%H:%M").to_string(), "00:00");
    }

    #[test]
    fn non_matching_lines_are_skipped_but_not_merged() {
        let out = parse("[2/3/24, 10:00] A: hi\nthis is a continuation line\n");
        assert_eq!(out.raw_count, 2);
        assert_eq!(out.messages.len(), 1);
    }
}
