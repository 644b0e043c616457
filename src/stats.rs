//! C2 — Statistics Engine: a single pass over the parsed stream producing every
//! derived quantity in [`ChatStatistics`]. See SPEC_FULL.md §4.2.

use crate::emoji;
use crate::error::AnalysisError;
use crate::models::{ChatStatistics, InteractionMatrix, MonthlyPoint, MonthlySeries, UserCount, WeekdayVsWeekend};
use crate::models::ParsedMessage;
use chrono::{Datelike, NaiveDate, Timelike};
use regex::Regex;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

const ELIGIBLE_GAP_MIN_SECS: i64 = 5;
const ELIGIBLE_GAP_MAX_SECS: i64 = 12 * 3600;
const MIN_ELIGIBLE_GAPS_FOR_PERCENTILE: usize = 20;
const DEFAULT_CONVO_BREAK_MINUTES: f64 = 120.0;

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]{3,}$").expect("word regex must compile"));

/// The 85th-percentile cross-sender response latency plus 30, clamped to
/// `[30, 300]` minutes; falls back to 120 minutes under 20 eligible gaps.
pub fn dynamic_conversation_break_minutes(messages: &[ParsedMessage]) -> f64 {
    let mut gaps_minutes: Vec<f64> = Vec::new();
    for pair in messages.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if prev.sender == cur.sender {
            continue;
        }
        let secs = (cur.timestamp - prev.timestamp).num_seconds();
        if secs > ELIGIBLE_GAP_MIN_SECS && secs < ELIGIBLE_GAP_MAX_SECS {
            gaps_minutes.push(secs as f64 / 60.0);
        }
    }

    if gaps_minutes.len() < MIN_ELIGIBLE_GAPS_FOR_PERCENTILE {
        return DEFAULT_CONVO_BREAK_MINUTES;
    }

    gaps_minutes.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let p85 = percentile(&gaps_minutes, 85.0);
    (p85 + 30.0).clamp(30.0, 300.0)
}

/// Linear-interpolated percentile using the `(p/100)(n+1)` rank convention.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    let rank = (p / 100.0) * (n as f64 + 1.0);
    if rank <= 1.0 {
        return sorted[0];
    }
    if rank >= n as f64 {
        return sorted[n - 1];
    }
    let lower_idx = rank.floor() as usize;
    let frac = rank - lower_idx as f64;
    let lower = sorted[lower_idx - 1];
    let upper = sorted[lower_idx];
    lower + frac * (upper - lower)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `raw_count` is the parser's raw-line count, carried through unchanged as
/// `ChatStatistics::total_messages` (§9 open-question resolution); every
/// percentage below is still computed over the accepted-message count, the
/// only denominator that keeps the "sums to 100" invariant true when system
/// lines were dropped along the way.
pub fn compute(
    messages: &[ParsedMessage],
    convo_break_minutes: f64,
    raw_count: u32,
) -> Result<ChatStatistics, AnalysisError> {
    if messages.is_empty() {
        return Err(AnalysisError::ParserFatal(
            "statistics require at least one accepted message".to_string(),
        ));
    }

    let total: u32 = messages.len() as u32;
    let senders: std::collections::BTreeSet<&str> =
        messages.iter().map(|m| m.sender.as_str()).collect();

    let mut user_message_count: BTreeMap<String, u32> =
        senders.iter().map(|s| (s.to_string(), 0)).collect();
    let mut starter_count: BTreeMap<String, u32> =
        senders.iter().map(|s| (s.to_string(), 0)).collect();
    let mut first_text_count: BTreeMap<String, u32> =
        senders.iter().map(|s| (s.to_string(), 0)).collect();
    let mut ignored_count: BTreeMap<String, u32> =
        senders.iter().map(|s| (s.to_string(), 0)).collect();
    let mut monthly: BTreeMap<String, BTreeMap<String, u32>> =
        senders.iter().map(|s| (s.to_string(), BTreeMap::new())).collect();
    let mut weekday_totals = [0u32; 7];
    let mut hour_counts = [0u32; 24];
    let mut word_counts: BTreeMap<String, u32> = BTreeMap::new();
    let mut emoji_counts: BTreeMap<String, u32> = BTreeMap::new();
    let mut matrix_counts: BTreeMap<(String, String), u32> = BTreeMap::new();

    let mut last_date: Option<NaiveDate> = None;
    let mut current_streak: Option<(String, u32)> = None;
    let mut best_streak: Option<UserCount> = None;
    let mut response_times: Vec<f64> = Vec::new();

    for (i, msg) in messages.iter().enumerate() {
        *user_message_count.get_mut(&msg.sender).unwrap() += 1;

        let date = msg.timestamp.date_naive();
        if last_date != Some(date) {
            *first_text_count.get_mut(&msg.sender).unwrap() += 1;
            last_date = Some(date);
        }

        let month_key = format!("{:04}-{:02}", date.year(), date.month());
        *monthly.get_mut(&msg.sender).unwrap().entry(month_key).or_insert(0) += 1;

        let weekday_idx = msg.timestamp.weekday().num_days_from_monday() as usize;
        weekday_totals[weekday_idx] += 1;
        hour_counts[msg.timestamp.hour() as usize] += 1;

        for token in msg.cleaned_text.split_whitespace() {
            if WORD_RE.is_match(token) {
                *word_counts.entry(token.to_string()).or_insert(0) += 1;
            }
        }
        for cluster in emoji::extract(&msg.original_text) {
            *emoji_counts.entry(cluster).or_insert(0) += 1;
        }

        match &mut current_streak {
            Some((sender, len)) if *sender == msg.sender => *len += 1,
            Some((sender, len)) => {
                record_streak(&mut best_streak, sender.clone(), *len);
                current_streak = Some((msg.sender.clone(), 1));
            }
            None => current_streak = Some((msg.sender.clone(), 1)),
        }

        let is_start = match i.checked_sub(1).map(|p| &messages[p]) {
            None => true,
            Some(prev) => {
                let gap_secs = (msg.timestamp - prev.timestamp).num_seconds();
                gap_secs as f64 / 60.0 >= convo_break_minutes
            }
        };
        if is_start {
            *starter_count.get_mut(&msg.sender).unwrap() += 1;
        }

        if i > 0 {
            let prev = &messages[i - 1];
            if prev.sender != msg.sender {
                *matrix_counts
                    .entry((prev.sender.clone(), msg.sender.clone()))
                    .or_insert(0) += 1;

                let gap_secs = (msg.timestamp - prev.timestamp).num_seconds();
                if gap_secs > ELIGIBLE_GAP_MIN_SECS && gap_secs < ELIGIBLE_GAP_MAX_SECS {
                    response_times.push(gap_secs as f64 / 60.0);
                }
            } else {
                *ignored_count.get_mut(&prev.sender).unwrap() += 1;
            }
        }
    }

    if let Some((sender, len)) = current_streak {
        record_streak(&mut best_streak, sender, len);
    }

    let most_active_users_pct: BTreeMap<String, f64> = user_message_count
        .iter()
        .map(|(s, &c)| (s.clone(), round2(c as f64 / total as f64 * 100.0)))
        .collect();

    let total_starts: u32 = starter_count.values().sum();
    let conversation_starters_pct: BTreeMap<String, f64> = starter_count
        .iter()
        .map(|(s, &c)| {
            let pct = if total_starts == 0 { 0.0 } else { c as f64 / total_starts as f64 * 100.0 };
            (s.clone(), round2(pct))
        })
        .collect();

    let ignore_opportunities = total.saturating_sub(1).max(1) as f64;
    let most_ignored_users_pct: BTreeMap<String, f64> = ignored_count
        .iter()
        .map(|(s, &c)| (s.clone(), round2(c as f64 / ignore_opportunities * 100.0)))
        .collect();

    let first_text_champion = first_text_count
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(user, &count)| UserCount { user: user.clone(), count });

    let mut common_words: Vec<(String, u32)> = word_counts.into_iter().collect();
    common_words.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    common_words.truncate(10);

    let mut common_emojis: Vec<(String, u32)> = emoji_counts.into_iter().collect();
    common_emojis.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    common_emojis.truncate(6);

    let average_response_time_minutes = if response_times.is_empty() {
        0.0
    } else {
        response_times.iter().sum::<f64>() / response_times.len() as f64
    };

    let peak_hour = hour_counts
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
        .map(|(hour, _)| hour as u8);

    let user_monthly_activity = build_monthly_series(&monthly, messages);

    let weekday_total: u32 = weekday_totals[0..5].iter().sum();
    let weekend_total: u32 = weekday_totals[5..7].iter().sum();
    let average_weekday_messages = weekday_total as f64 / 5.0;
    let average_weekend_messages = weekend_total as f64 / 2.0;
    let difference = average_weekday_messages - average_weekend_messages;
    let percentage_difference = if average_weekday_messages == 0.0 {
        0.0
    } else {
        round2(difference / average_weekday_messages * 100.0)
    };
    let weekday_vs_weekend_avg = WeekdayVsWeekend {
        average_weekday_messages: round2(average_weekday_messages),
        average_weekend_messages: round2(average_weekend_messages),
        difference: round2(difference),
        percentage_difference,
    };

    let user_interaction_matrix = if senders.len() >= 2 {
        Some(build_interaction_matrix(&senders, &matrix_counts))
    } else {
        None
    };

    let dates: Vec<NaiveDate> = messages.iter().map(|m| m.timestamp.date_naive()).collect();
    let days_active = dates
        .iter()
        .min()
        .zip(dates.iter().max())
        .map(|(min, max)| (*max - *min).num_days() as u32 + 1)
        .unwrap_or(0);

    Ok(ChatStatistics {
        total_messages: raw_count,
        days_active,
        user_message_count,
        most_active_users_pct,
        conversation_starters_pct,
        most_ignored_users_pct,
        first_text_champion,
        longest_monologue: best_streak,
        common_words,
        common_emojis,
        average_response_time_minutes: round2(average_response_time_minutes),
        peak_hour,
        user_monthly_activity,
        weekday_vs_weekend_avg,
        user_interaction_matrix,
    })
}

fn record_streak(best: &mut Option<UserCount>, sender: String, len: u32) {
    let replace = match best {
        None => true,
        Some(current) => len > current.count,
    };
    if replace {
        *best = Some(UserCount { user: sender, count: len });
    }
}

fn build_monthly_series(
    monthly: &BTreeMap<String, BTreeMap<String, u32>>,
    messages: &[ParsedMessage],
) -> Vec<MonthlySeries> {
    let mut min_month = None;
    let mut max_month = None;
    for msg in messages {
        let date = msg.timestamp.date_naive();
        let key = (date.year(), date.month());
        min_month = Some(min_month.map_or(key, |m: (i32, u32)| m.min(key)));
        max_month = Some(max_month.map_or(key, |m: (i32, u32)| m.max(key)));
    }
    let (Some((start_y, start_m)), Some((end_y, end_m))) = (min_month, max_month) else {
        return Vec::new();
    };

    let mut months = Vec::new();
    let (mut y, mut m) = (start_y, start_m);
    loop {
        months.push(format!("{:04}-{:02}", y, m));
        if (y, m) == (end_y, end_m) {
            break;
        }
        m += 1;
        if m > 12 {
            m = 1;
            y += 1;
        }
    }

    monthly
        .iter()
        .map(|(sender, counts)| MonthlySeries {
            id: sender.clone(),
            data: months
                .iter()
                .map(|month| MonthlyPoint {
                    x: month.clone(),
                    y: *counts.get(month).unwrap_or(&0),
                })
                .collect(),
        })
        .collect()
}

fn build_interaction_matrix(
    senders: &std::collections::BTreeSet<&str>,
    matrix_counts: &BTreeMap<(String, String), u32>,
) -> InteractionMatrix {
    let ordered: Vec<&str> = senders.iter().copied().collect();
    let mut rows: InteractionMatrix = Vec::with_capacity(ordered.len() + 1);

    let mut header = vec![serde_json::Value::Null];
    header.extend(ordered.iter().map(|s| serde_json::Value::String(s.to_string())));
    rows.push(header);

    for from in &ordered {
        let mut row = vec![serde_json::Value::String(from.to_string())];
        for to in &ordered {
            let count = if from == to {
                0
            } else {
                matrix_counts.get(&(from.to_string(), to.to_string())).copied().unwrap_or(0)
            };
            row.push(serde_json::Value::Number(count.into()));
        }
        rows.push(row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_transcript;
    use std::io::Cursor;

    fn messages_from(text: &str) -> Vec<ParsedMessage> {
        parse_transcript(Cursor::new(text.as_bytes())).unwrap().messages
    }

    #[test]
    fn single_message_scenario() {
        let msgs = messages_from("[2/3/24, 10:00] A: hi\n");
        let raw = msgs.len() as u32;
        let stats = compute(&msgs, DEFAULT_CONVO_BREAK_MINUTES, raw).unwrap();
        assert_eq!(stats.days_active, 1);
        assert_eq!(stats.peak_hour, Some(10));
        assert_eq!(stats.most_active_users_pct.get("A"), Some(&100.0));
        assert_eq!(stats.longest_monologue, Some(UserCount { user: "A".into(), count: 1 }));
        assert!(stats.user_interaction_matrix.is_none());
    }

    #[test]
    fn two_sender_response_time_and_matrix() {
        let msgs = messages_from(
            "2/3/24, 10:00 - A: hi there friend\n2/3/24, 10:05 - B: hey hey\n",
        );
        let raw = msgs.len() as u32;
        let stats = compute(&msgs, DEFAULT_CONVO_BREAK_MINUTES, raw).unwrap();
        assert_eq!(stats.average_response_time_minutes, 5.0);
        assert_eq!(
            stats.first_text_champion,
            Some(UserCount { user: "A".into(), count: 1 })
        );
        let matrix = stats.user_interaction_matrix.unwrap();
        assert_eq!(matrix[0][1], serde_json::Value::String("A".into()));
        assert_eq!(matrix[0][2], serde_json::Value::String("B".into()));
    }

    #[test]
    fn monologue_and_ignored_share() {
        let msgs = messages_from(
            "2/3/24, 10:00:00 - A: one two three\n\
             2/3/24, 10:00:20 - A: four five six\n\
             2/3/24, 10:00:40 - A: seven eight nine\n",
        );
        let raw = msgs.len() as u32;
        let stats = compute(&msgs, DEFAULT_CONVO_BREAK_MINUTES, raw).unwrap();
        assert_eq!(stats.longest_monologue, Some(UserCount { user: "A".into(), count: 3 }));
        assert_eq!(stats.most_ignored_users_pct.get("A"), Some(&100.0));
        assert_eq!(stats.average_response_time_minutes, 0.0);
    }

    #[test]
    fn monthly_series_fills_gap_month() {
        let msgs = messages_from(
            "15/1/24, 09:00 - A: hi there team\n15/3/24, 09:00 - A: back again now\n",
        );
        let raw = msgs.len() as u32;
        let stats = compute(&msgs, DEFAULT_CONVO_BREAK_MINUTES, raw).unwrap();
        let series = &stats.user_monthly_activity[0];
        assert_eq!(series.data.len(), 3);
        assert_eq!(series.data[1].x, "2024-02");
        assert_eq!(series.data[1].y, 0);
    }

    #[test]
    fn percentile_matches_known_sample() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 50.0), 3.0);
    }

    #[test]
    fn few_eligible_gaps_fall_back_to_default() {
        let msgs = messages_from(
            "2/3/24, 10:00 - A: hi there friend\n2/3/24, 10:05 - B: hey hey there\n",
        );
        assert_eq!(dynamic_conversation_break_minutes(&msgs), DEFAULT_CONVO_BREAK_MINUTES);
    }
}
