//! Dashboard analytics over a snapshot of application records.
//!
//! Every calculator is a pure function of its inputs and an explicit `now`.
//! Nothing here fails: absent or unparseable fields count as zero/empty.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::dates;
use crate::models::{
    Application, Rejection, ResumeVersion, Status, COMPANY_TYPE_OPTIONS, REGION_OPTIONS,
    REJECTION_REASONS, REJECTION_STAGES,
};

const TREND_WEEKS: i64 = 8;
const RECENT_WINDOW_DAYS: i64 = 7;
const FOLLOW_UP_HORIZON_DAYS: i64 = 7;
const STALE_CONTACT_DAYS: f64 = 7.0;
const TOP_LEARNINGS: usize = 5;
const CALLOUT_MIN_CUSTOMIZED: usize = 3;
const COMPANY_MATCH_THRESHOLD: f64 = 0.92;

/// Rounds halves toward positive infinity.
fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

/// Whole-number percentage, 0 when `whole` is 0.
pub fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    round_half_up(part as f64 * 100.0 / whole as f64) as u32
}

/// Any move away from `Applied` counts as the employer responding.
pub fn has_response(app: &Application) -> bool {
    app.status != Status::Applied
}

pub fn response_rate<'a, I>(apps: I) -> u32
where
    I: IntoIterator<Item = &'a Application>,
{
    let mut total = 0;
    let mut responded = 0;
    for app in apps {
        total += 1;
        if has_response(app) {
            responded += 1;
        }
    }
    percent(responded, total)
}

// --- Funnel ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunnelStage {
    pub name: String,
    pub count: usize,
}

/// For each funnel stage, how many applications got at least that far.
/// Rejected applications count for every stage their history passed through.
pub fn funnel(apps: &[Application]) -> Vec<FunnelStage> {
    Status::FUNNEL
        .iter()
        .enumerate()
        .map(|(idx, stage)| {
            let count = apps
                .iter()
                .filter(|app| {
                    let reached = app.status.funnel_position().is_some_and(|pos| pos >= idx);
                    reached
                        || (app.status == Status::Rejected
                            && app.status_history.iter().any(|h| h.status == *stage))
                })
                .count();
            FunnelStage {
                name: stage.as_str().to_string(),
                count,
            }
        })
        .collect()
}

// --- Headline numbers ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetrics {
    pub total: usize,
    pub active: usize,
    pub response_rate: u32,
    pub avg_days_to_response: i64,
    pub interviews_this_week: usize,
    pub phone_screens: usize,
    pub onsite_interviews: usize,
    pub ghosted: usize,
}

impl KeyMetrics {
    pub fn compute(apps: &[Application], now: DateTime<Utc>) -> Self {
        Self {
            total: apps.len(),
            active: apps.iter().filter(|a| !a.status.is_terminal()).count(),
            response_rate: response_rate(apps),
            avg_days_to_response: avg_days_to_response(apps),
            interviews_this_week: interviews_this_week(apps, now),
            phone_screens: phone_screen_count(apps),
            onsite_interviews: onsite_count(apps),
            ghosted: apps.iter().filter(|a| a.status == Status::Ghost).count(),
        }
    }
}

/// Mean gap between the first two history entries, over applications that
/// have at least two.
pub fn avg_days_to_response(apps: &[Application]) -> i64 {
    let gaps: Vec<f64> = apps
        .iter()
        .filter(|a| a.status_history.len() >= 2)
        .filter_map(|a| {
            let applied = dates::parse_instant(&a.status_history[0].date)?;
            let first_response = dates::parse_instant(&a.status_history[1].date)?;
            Some(dates::days_between(applied, first_response))
        })
        .collect();

    if gaps.is_empty() {
        return 0;
    }
    round_half_up(gaps.iter().sum::<f64>() / gaps.len() as f64)
}

pub fn interviews_this_week(apps: &[Application], now: DateTime<Utc>) -> usize {
    let week_ago = now - Duration::days(RECENT_WINDOW_DAYS);
    apps.iter()
        .filter(|a| a.status.is_interviewing())
        .filter(|a| {
            a.last_history_entry()
                .and_then(|h| dates::parse_instant(&h.date))
                .is_some_and(|date| date >= week_ago)
        })
        .count()
}

/// Applications that ever reached a phone screen.
pub fn phone_screen_count(apps: &[Application]) -> usize {
    apps.iter()
        .filter(|a| a.ever_had_status(&[Status::PhoneScreen]))
        .count()
}

/// Applications that ever reached a technical or onsite round.
pub fn onsite_count(apps: &[Application]) -> usize {
    apps.iter()
        .filter(|a| a.ever_had_status(&[Status::Onsite, Status::Technical]))
        .count()
}

// --- Weekly trend ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekBucket {
    pub week: String,
    pub applications: usize,
    pub responses: usize,
}

/// Eight rolling 7-day windows ending at `now`, oldest first.
pub fn weekly_trend(apps: &[Application], now: DateTime<Utc>) -> Vec<WeekBucket> {
    (0..TREND_WEEKS)
        .rev()
        .map(|i| {
            let start = now - Duration::days((i + 1) * 7);
            let end = now - Duration::days(i * 7);
            let within = |date: Option<DateTime<Utc>>| date.is_some_and(|d| d >= start && d < end);

            let applications = apps
                .iter()
                .filter(|a| within(a.date_applied.as_deref().and_then(dates::parse_instant)))
                .count();
            let responses = apps
                .iter()
                .filter(|a| {
                    within(
                        a.status_history
                            .get(1)
                            .and_then(|h| dates::parse_instant(&h.date)),
                    )
                })
                .count();

            WeekBucket {
                week: format!("Week {}", TREND_WEEKS - i),
                applications,
                responses,
            }
        })
        .collect()
}

// --- Rejections ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LearningCount {
    /// Lowercased, trimmed text; this is the counting key and the display value.
    pub learning: String,
    /// First occurrence with its original casing.
    pub example: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionPatterns {
    pub rejected: usize,
    pub documented: usize,
    pub undocumented: usize,
    pub by_stage: Vec<CategoryCount>,
    pub by_reason: Vec<CategoryCount>,
    pub top_learnings: Vec<LearningCount>,
}

pub fn rejection_patterns(apps: &[Application]) -> RejectionPatterns {
    let rejected: Vec<&Application> = apps
        .iter()
        .filter(|a| a.status == Status::Rejected)
        .collect();
    let documented: Vec<&Rejection> = rejected
        .iter()
        .filter_map(|a| a.rejection.as_ref())
        .collect();

    RejectionPatterns {
        rejected: rejected.len(),
        documented: documented.len(),
        undocumented: rejected.len() - documented.len(),
        by_stage: sparse_counts(&REJECTION_STAGES, documented.iter().map(|r| r.stage.as_deref())),
        by_reason: sparse_counts(
            &REJECTION_REASONS,
            documented.iter().map(|r| r.reason.as_deref()),
        ),
        top_learnings: top_learnings(documented.iter().copied(), TOP_LEARNINGS),
    }
}

/// Counts per category in table order, omitting categories nobody hit.
fn sparse_counts<'a>(
    categories: &[&str],
    values: impl Iterator<Item = Option<&'a str>>,
) -> Vec<CategoryCount> {
    let values: Vec<&str> = values.flatten().collect();
    categories
        .iter()
        .map(|name| CategoryCount {
            name: name.to_string(),
            count: values.iter().filter(|v| *v == name).count(),
        })
        .filter(|c| c.count > 0)
        .collect()
}

/// Most frequent learnings by normalized text. Ties keep first-seen order.
pub fn top_learnings<'a>(
    rejections: impl Iterator<Item = &'a Rejection>,
    limit: usize,
) -> Vec<LearningCount> {
    let mut counts: Vec<LearningCount> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for raw in rejections.flat_map(|r| r.learnings.iter()) {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            continue;
        }
        match index.get(&normalized) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(normalized.clone(), counts.len());
                counts.push(LearningCount {
                    learning: normalized,
                    example: raw.trim().to_string(),
                    count: 1,
                });
            }
        }
    }

    // sort_by is stable, so equal counts stay in first-seen order
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(limit);
    counts
}

// --- Follow-ups ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FollowUpBucket {
    Overdue,
    DueToday,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpItem {
    pub id: String,
    pub company: String,
    pub title: String,
    pub due: NaiveDate,
    pub days_until_due: i64,
    pub bucket: FollowUpBucket,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpSchedule {
    pub overdue: Vec<FollowUpItem>,
    pub due_today: Vec<FollowUpItem>,
    pub upcoming: Vec<FollowUpItem>,
}

impl FollowUpSchedule {
    pub fn is_empty(&self) -> bool {
        self.overdue.is_empty() && self.due_today.is_empty() && self.upcoming.is_empty()
    }
}

/// Buckets scheduled follow-ups of open applications by calendar day.
/// Items more than a week out are dropped.
pub fn classify_follow_ups(apps: &[Application], now: DateTime<Utc>) -> FollowUpSchedule {
    let today = now.date_naive();

    let mut items: Vec<FollowUpItem> = apps
        .iter()
        .filter(|a| !a.status.is_terminal())
        .filter_map(|a| {
            let due = a.next_follow_up_date.as_deref().and_then(dates::parse_day)?;
            let days_until_due =
                dates::days_between(now, dates::start_of_day(due)).ceil() as i64;
            let bucket = if due < today {
                FollowUpBucket::Overdue
            } else if due == today {
                FollowUpBucket::DueToday
            } else if days_until_due <= FOLLOW_UP_HORIZON_DAYS {
                FollowUpBucket::Upcoming
            } else {
                return None;
            };
            Some(FollowUpItem {
                id: a.id.clone(),
                company: a.company.clone(),
                title: a.title.clone(),
                due,
                days_until_due,
                bucket,
                notes: a.follow_up_notes.clone(),
            })
        })
        .collect();
    items.sort_by_key(|item| item.due);

    let mut schedule = FollowUpSchedule::default();
    for item in items {
        match item.bucket {
            FollowUpBucket::Overdue => schedule.overdue.push(item),
            FollowUpBucket::DueToday => schedule.due_today.push(item),
            FollowUpBucket::Upcoming => schedule.upcoming.push(item),
        }
    }
    schedule
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRef {
    pub id: String,
    pub company: String,
    pub title: String,
    pub status: Status,
}

impl From<&Application> for ApplicationRef {
    fn from(app: &Application) -> Self {
        Self {
            id: app.id.clone(),
            company: app.company.clone(),
            title: app.title.clone(),
            status: app.status.clone(),
        }
    }
}

/// Open applications with no contact for a week or more. Falls back to the
/// application date when no contact was ever logged.
pub fn needs_follow_up(apps: &[Application], now: DateTime<Utc>) -> Vec<ApplicationRef> {
    apps.iter()
        .filter(|a| !a.status.is_terminal())
        .filter(|a| {
            a.last_contact_date
                .as_deref()
                .filter(|d| !d.is_empty())
                .or(a.date_applied.as_deref())
                .and_then(dates::parse_instant)
                .is_some_and(|last| dates::days_between(last, now) >= STALE_CONTACT_DAYS)
        })
        .map(ApplicationRef::from)
        .collect()
}

pub fn recently_rejected(apps: &[Application], now: DateTime<Utc>) -> Vec<ApplicationRef> {
    apps.iter()
        .filter(|a| a.status == Status::Rejected)
        .filter(|a| {
            a.last_history_entry()
                .and_then(|h| dates::parse_instant(&h.date))
                .is_some_and(|d| dates::days_between(d, now) <= RECENT_WINDOW_DAYS as f64)
        })
        .map(ApplicationRef::from)
        .collect()
}

// --- Quality comparison ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityComparison {
    pub customized_count: usize,
    pub customized_response_rate: u32,
    pub quick_apply_count: usize,
    pub quick_apply_response_rate: u32,
    pub callout: Option<String>,
}

pub fn quality_comparison(apps: &[Application]) -> QualityComparison {
    let (customized, quick): (Vec<&Application>, Vec<&Application>) =
        apps.iter().partition(|a| a.quality.is_customized());

    let customized_rate = response_rate(customized.iter().copied());
    let quick_rate = response_rate(quick.iter().copied());

    let callout = (customized_rate > quick_rate && customized.len() >= CALLOUT_MIN_CUSTOMIZED)
        .then(|| {
            format!(
                "Customized applications are outperforming quick-apply by {}%!",
                customized_rate - quick_rate
            )
        });

    QualityComparison {
        customized_count: customized.len(),
        customized_response_rate: customized_rate,
        quick_apply_count: quick.len(),
        quick_apply_response_rate: quick_rate,
        callout,
    }
}

// --- Breakdowns ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionStats {
    pub name: String,
    pub total: usize,
    pub responded: usize,
    pub response_rate: u32,
}

pub fn region_breakdown(apps: &[Application]) -> Vec<RegionStats> {
    REGION_OPTIONS
        .iter()
        .map(|region| {
            let in_region: Vec<&Application> = apps
                .iter()
                .filter(|a| a.region.as_deref() == Some(*region))
                .collect();
            let responded = in_region.iter().filter(|a| has_response(a)).count();
            RegionStats {
                name: region.to_string(),
                total: in_region.len(),
                responded,
                response_rate: percent(responded, in_region.len()),
            }
        })
        .filter(|r| r.total > 0)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeStats {
    pub name: String,
    pub times_used: usize,
    pub response_rate: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePerformance {
    pub versions: Vec<ResumeStats>,
    pub best: Option<String>,
}

pub fn resume_performance(apps: &[Application], resumes: &[ResumeVersion]) -> ResumePerformance {
    let versions: Vec<ResumeStats> = resumes
        .iter()
        .map(|version| {
            let used: Vec<&Application> = apps
                .iter()
                .filter(|a| a.resume_version_id() == Some(version.id.as_str()))
                .collect();
            ResumeStats {
                name: version.name.clone(),
                times_used: used.len(),
                response_rate: response_rate(used.iter().copied()),
            }
        })
        .filter(|r| r.times_used > 0)
        .collect();

    let best = versions
        .iter()
        .fold(None::<&ResumeStats>, |best, r| match best {
            Some(b) if b.response_rate >= r.response_rate => Some(b),
            _ => Some(r),
        })
        .map(|r| r.name.clone());

    ResumePerformance { versions, best }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyTypeStats {
    pub name: String,
    pub total: usize,
    pub response_rate: u32,
}

pub fn company_type_breakdown(apps: &[Application]) -> Vec<CompanyTypeStats> {
    COMPANY_TYPE_OPTIONS
        .iter()
        .map(|kind| {
            let of_type: Vec<&Application> = apps
                .iter()
                .filter(|a| a.company_type.as_deref() == Some(*kind))
                .collect();
            CompanyTypeStats {
                name: kind.to_string(),
                total: of_type.len(),
                response_rate: response_rate(of_type.iter().copied()),
            }
        })
        .filter(|c| c.total > 0)
        .collect()
}

// --- Target company linkage ---

fn normalize_company(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Applications whose company name matches `name`, allowing small spelling
/// differences ("Genentech" vs "Genentech Inc").
pub fn applications_for_company<'a>(apps: &'a [Application], name: &str) -> Vec<&'a Application> {
    let wanted = normalize_company(name);
    if wanted.is_empty() {
        return Vec::new();
    }
    apps.iter()
        .filter(|a| {
            let company = normalize_company(&a.company);
            !company.is_empty()
                && (company == wanted
                    || strsim::jaro_winkler(&company, &wanted) >= COMPANY_MATCH_THRESHOLD)
        })
        .collect()
}

/// List filter: any of `statuses`, any of `regions`, and a case-insensitive
/// `search` over company, title and location. Empty parts match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationFilter {
    pub statuses: Vec<Status>,
    pub regions: Vec<String>,
    pub search: Option<String>,
}

impl ApplicationFilter {
    pub fn matches(&self, app: &Application) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&app.status) {
            return false;
        }
        if !self.regions.is_empty() {
            let Some(region) = app.region.as_deref() else {
                return false;
            };
            if !self.regions.iter().any(|r| r.trim().eq_ignore_ascii_case(region.trim())) {
                return false;
            }
        }
        let needle = self
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        needle.is_none_or(|needle| {
            [Some(app.company.as_str()), Some(app.title.as_str()), app.location.as_deref()]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle))
        })
    }
}

// --- Everything the dashboard shows ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub generated_at: DateTime<Utc>,
    pub metrics: KeyMetrics,
    pub funnel: Vec<FunnelStage>,
    pub weekly_trend: Vec<WeekBucket>,
    pub regions: Vec<RegionStats>,
    pub resumes: ResumePerformance,
    pub company_types: Vec<CompanyTypeStats>,
    pub quality: QualityComparison,
    pub rejections: RejectionPatterns,
    pub follow_ups: FollowUpSchedule,
    pub needs_follow_up: Vec<ApplicationRef>,
    pub recently_rejected: Vec<ApplicationRef>,
}

impl Dashboard {
    /// Recomputes every metric from scratch; there is no caching.
    pub fn build(apps: &[Application], resumes: &[ResumeVersion], now: DateTime<Utc>) -> Self {
        Self {
            generated_at: now,
            metrics: KeyMetrics::compute(apps, now),
            funnel: funnel(apps),
            weekly_trend: weekly_trend(apps, now),
            regions: region_breakdown(apps),
            resumes: resume_performance(apps, resumes),
            company_types: company_type_breakdown(apps),
            quality: quality_comparison(apps),
            rejections: rejection_patterns(apps),
            follow_ups: classify_follow_ups(apps, now),
            needs_follow_up: needs_follow_up(apps, now),
            recently_rejected: recently_rejected(apps, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Quality, StatusEntry};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn app(id: &str, status: Status) -> Application {
        let mut app = Application::new("Acme", "Scientist", "2025-06-01");
        app.id = id.to_string();
        app.status = status;
        app.status_history.clear();
        app
    }

    fn with_history(mut app: Application, entries: &[(Status, &str)]) -> Application {
        app.status_history = entries
            .iter()
            .map(|(status, date)| StatusEntry {
                status: status.clone(),
                date: date.to_string(),
                notes: None,
            })
            .collect();
        app
    }

    fn customized(mut app: Application) -> Application {
        app.quality = Quality {
            custom_resume: true,
            ..Default::default()
        };
        app
    }

    fn rejected_with(learnings: &[&str]) -> Application {
        let mut a = app("r", Status::Rejected);
        a.rejection = Some(Rejection {
            learnings: learnings.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        });
        a
    }

    #[test]
    fn test_funnel_is_non_increasing() {
        let apps = vec![
            app("1", Status::Applied),
            app("2", Status::Reviewed),
            app("3", Status::PhoneScreen),
            app("4", Status::Technical),
            app("5", Status::Onsite),
            app("6", Status::Offer),
            app("7", Status::Onsite),
            app("8", Status::Ghost),
        ];
        let stages = funnel(&apps);
        assert_eq!(stages.len(), 6);
        for pair in stages.windows(2) {
            assert!(pair[0].count >= pair[1].count);
        }
        let counts: Vec<usize> = stages.iter().map(|s| s.count).collect();
        assert_eq!(counts, vec![7, 6, 5, 4, 3, 1]);
        assert_eq!(stages[2].name, "Phone Screen");
    }

    #[test]
    fn test_funnel_counts_rejected_by_history() {
        let rejected = with_history(
            app("1", Status::Rejected),
            &[
                (Status::Applied, "2025-06-01"),
                (Status::PhoneScreen, "2025-06-03"),
                (Status::Rejected, "2025-06-05"),
            ],
        );
        let withdrawn = with_history(
            app("2", Status::Withdrawn),
            &[(Status::Applied, "2025-06-01"), (Status::PhoneScreen, "2025-06-02")],
        );
        let counts: Vec<usize> = funnel(&[rejected, withdrawn]).iter().map(|s| s.count).collect();
        // the rejected app passed Applied and Phone Screen but never Reviewed
        assert_eq!(counts, vec![1, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn test_response_rate() {
        assert_eq!(response_rate(&[] as &[Application]), 0);
        let apps = vec![
            app("1", Status::Applied),
            app("2", Status::Reviewed),
            app("3", Status::Applied),
            app("4", Status::Offer),
        ];
        assert_eq!(response_rate(&apps), 50);
    }

    #[test]
    fn test_percent_rounds_half_up() {
        assert_eq!(percent(1, 8), 13); // 12.5
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(3, 0), 0);
    }

    #[test]
    fn test_avg_days_ignores_single_entry_history() {
        let qualifying = with_history(
            app("1", Status::Reviewed),
            &[(Status::Applied, "2025-06-01"), (Status::Reviewed, "2025-06-04")],
        );
        let single = with_history(app("2", Status::Applied), &[(Status::Applied, "2025-06-01")]);
        assert_eq!(avg_days_to_response(&[qualifying, single]), 3);
        assert_eq!(avg_days_to_response(&[]), 0);
    }

    #[test]
    fn test_avg_days_averages_fractional_gaps() {
        let a = with_history(
            app("1", Status::Reviewed),
            &[(Status::Applied, "2025-06-01T00:00:00Z"), (Status::Reviewed, "2025-06-02T12:00:00Z")],
        );
        let b = with_history(
            app("2", Status::Reviewed),
            &[(Status::Applied, "2025-06-01"), (Status::Reviewed, "2025-06-03")],
        );
        // (1.5 + 2) / 2 = 1.75
        assert_eq!(avg_days_to_response(&[a, b]), 2);
    }

    #[test]
    fn test_interviews_this_week() {
        let recent = with_history(
            app("1", Status::Technical),
            &[(Status::Applied, "2025-05-01"), (Status::Technical, "2025-06-12")],
        );
        let stale = with_history(
            app("2", Status::Onsite),
            &[(Status::Applied, "2025-05-01"), (Status::Onsite, "2025-05-20")],
        );
        let not_interviewing = with_history(
            app("3", Status::Offer),
            &[(Status::Offer, "2025-06-14")],
        );
        let no_history = app("4", Status::PhoneScreen);
        assert_eq!(
            interviews_this_week(&[recent, stale, not_interviewing, no_history], now()),
            1
        );
    }

    #[test]
    fn test_stage_counts_include_past_stages() {
        let passed_through = with_history(
            app("1", Status::Rejected),
            &[(Status::Applied, "2025-06-01"), (Status::PhoneScreen, "2025-06-02"), (Status::Technical, "2025-06-05")],
        );
        let current = app("2", Status::PhoneScreen);
        let never = app("3", Status::Reviewed);
        let apps = vec![passed_through, current, never];
        assert_eq!(phone_screen_count(&apps), 2);
        assert_eq!(onsite_count(&apps), 1);
    }

    #[test]
    fn test_weekly_trend_buckets() {
        let mut this_week = with_history(
            app("1", Status::Reviewed),
            &[(Status::Applied, "2025-06-10"), (Status::Reviewed, "2025-06-12")],
        );
        this_week.date_applied = Some("2025-06-10".into());
        let mut three_weeks_ago = app("2", Status::Applied);
        three_weeks_ago.date_applied = Some("2025-05-23".into());
        let mut too_old = app("3", Status::Applied);
        too_old.date_applied = Some("2025-01-01".into());
        let mut undated = app("4", Status::Applied);
        undated.date_applied = None;

        let trend = weekly_trend(&[this_week, three_weeks_ago, too_old, undated], now());
        assert_eq!(trend.len(), 8);
        assert_eq!(trend[0].week, "Week 1");
        assert_eq!(trend[7].week, "Week 8");
        assert_eq!(trend[7].applications, 1);
        assert_eq!(trend[7].responses, 1);
        assert_eq!(trend[4].applications, 1);
        let total: usize = trend.iter().map(|w| w.applications).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_learnings_are_normalized_and_counted() {
        let apps = vec![
            rejected_with(&["Need more SQL"]),
            rejected_with(&["need more sql ", "Practice STAR stories"]),
        ];
        let patterns = rejection_patterns(&apps);
        assert_eq!(patterns.top_learnings[0].learning, "need more sql");
        assert_eq!(patterns.top_learnings[0].count, 2);
        assert_eq!(patterns.top_learnings[0].example, "Need more SQL");
        assert_eq!(patterns.top_learnings[1].learning, "practice star stories");
    }

    #[test]
    fn test_top_learnings_limit_and_tie_order() {
        let apps = vec![rejected_with(&["a", "b", "c", "d", "e", "f", "f"])];
        let top = rejection_patterns(&apps).top_learnings;
        let names: Vec<&str> = top.iter().map(|l| l.learning.as_str()).collect();
        assert_eq!(names, vec!["f", "a", "b", "c", "d"]);
    }

    #[test]
    fn test_rejection_categories_are_sparse() {
        let mut a = app("1", Status::Rejected);
        a.rejection = Some(Rejection {
            stage: Some("Phone Screen".into()),
            reason: Some("Skills Gap".into()),
            ..Default::default()
        });
        let mut b = app("2", Status::Rejected);
        b.rejection = Some(Rejection {
            stage: Some("Phone Screen".into()),
            reason: Some("Not In Table".into()),
            ..Default::default()
        });
        let undocumented = app("3", Status::Rejected);
        let mut withdrawn_with_record = app("4", Status::Withdrawn);
        withdrawn_with_record.rejection = Some(Rejection {
            stage: Some("Final Round".into()),
            ..Default::default()
        });

        let patterns = rejection_patterns(&[a, b, undocumented, withdrawn_with_record]);
        assert_eq!(patterns.rejected, 3);
        assert_eq!(patterns.documented, 2);
        assert_eq!(patterns.undocumented, 1);
        assert_eq!(
            patterns.by_stage,
            vec![CategoryCount { name: "Phone Screen".into(), count: 2 }]
        );
        assert_eq!(
            patterns.by_reason,
            vec![CategoryCount { name: "Skills Gap".into(), count: 1 }]
        );
    }

    #[test]
    fn test_follow_up_classification() {
        let mut due_today = app("today", Status::Applied);
        due_today.next_follow_up_date = Some("2025-06-15".into());
        let mut overdue = app("late", Status::Reviewed);
        overdue.next_follow_up_date = Some("2025-06-10".into());
        let mut soon = app("soon", Status::PhoneScreen);
        soon.next_follow_up_date = Some("2025-06-18".into());
        let mut far = app("far", Status::Applied);
        far.next_follow_up_date = Some("2025-06-25".into());
        let mut closed = app("closed", Status::Offer);
        closed.next_follow_up_date = Some("2025-06-10".into());
        let mut blank = app("blank", Status::Applied);
        blank.next_follow_up_date = Some(String::new());

        let schedule = classify_follow_ups(&[due_today, overdue, soon, far, closed, blank], now());
        let ids = |items: &[FollowUpItem]| items.iter().map(|i| i.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&schedule.due_today), vec!["today"]);
        assert_eq!(ids(&schedule.overdue), vec!["late"]);
        assert_eq!(ids(&schedule.upcoming), vec!["soon"]);
        assert_eq!(schedule.upcoming[0].days_until_due, 3);
    }

    #[test]
    fn test_follow_ups_sorted_by_date() {
        let mut later = app("later", Status::Applied);
        later.next_follow_up_date = Some("2025-06-03".into());
        let mut earlier = app("earlier", Status::Applied);
        earlier.next_follow_up_date = Some("2025-06-01".into());
        let schedule = classify_follow_ups(&[later, earlier], now());
        assert_eq!(schedule.overdue[0].id, "earlier");
        assert_eq!(schedule.overdue[1].id, "later");
    }

    #[test]
    fn test_quality_callout_triggers() {
        let mut apps = vec![
            customized(app("c1", Status::Reviewed)),
            customized(app("c2", Status::Offer)),
            customized(app("c3", Status::Applied)),
            app("q1", Status::Reviewed),
        ];
        for i in 0..4 {
            apps.push(app(&format!("q{}", i + 2), Status::Applied));
        }
        let cmp = quality_comparison(&apps);
        assert_eq!(cmp.customized_count, 3);
        assert_eq!(cmp.customized_response_rate, 67);
        assert_eq!(cmp.quick_apply_count, 5);
        assert_eq!(cmp.quick_apply_response_rate, 20);
        assert_eq!(
            cmp.callout.as_deref(),
            Some("Customized applications are outperforming quick-apply by 47%!")
        );
    }

    #[test]
    fn test_quality_callout_needs_three_customized() {
        let apps = vec![
            customized(app("c1", Status::Reviewed)),
            customized(app("c2", Status::Offer)),
            app("q1", Status::Applied),
            app("q2", Status::Applied),
        ];
        let cmp = quality_comparison(&apps);
        assert_eq!(cmp.customized_response_rate, 100);
        assert!(cmp.callout.is_none());
    }

    #[test]
    fn test_region_and_company_type_breakdowns() {
        let mut a = app("1", Status::Reviewed);
        a.region = Some("Remote".into());
        a.company_type = Some("Startup".into());
        let mut b = app("2", Status::Applied);
        b.region = Some("Remote".into());
        let mut c = app("3", Status::Applied);
        c.region = Some("Mars".into());

        let regions = region_breakdown(&[a.clone(), b.clone(), c]);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].total, 2);
        assert_eq!(regions[0].responded, 1);
        assert_eq!(regions[0].response_rate, 50);

        let types = company_type_breakdown(&[a, b]);
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].name, "Startup");
        assert_eq!(types[0].response_rate, 100);
    }

    #[test]
    fn test_resume_performance_picks_first_best() {
        let resumes = vec![
            ResumeVersion {
                id: "r1".into(),
                name: "Analytical".into(),
                description: None,
                target_roles: None,
                content: None,
                file_name: None,
                created_at: None,
            },
            ResumeVersion {
                id: "r2".into(),
                name: "Process Dev".into(),
                description: None,
                target_roles: None,
                content: None,
                file_name: None,
                created_at: None,
            },
            ResumeVersion {
                id: "r3".into(),
                name: "Unused".into(),
                description: None,
                target_roles: None,
                content: None,
                file_name: None,
                created_at: None,
            },
        ];
        let mut a = app("1", Status::Reviewed);
        a.resume_version = Some("r1".into());
        let mut b = app("2", Status::Onsite);
        b.resume_version = Some("r2".into());
        let mut c = app("3", Status::Applied);
        c.resume_version = Some(String::new());

        let perf = resume_performance(&[a, b, c], &resumes);
        assert_eq!(perf.versions.len(), 2);
        assert_eq!(perf.best.as_deref(), Some("Analytical"));
    }

    #[test]
    fn test_needs_follow_up_and_recently_rejected() {
        let mut stale = app("stale", Status::Applied);
        stale.date_applied = Some("2025-06-01".into());
        let mut contacted = app("contacted", Status::Reviewed);
        contacted.date_applied = Some("2025-05-01".into());
        contacted.last_contact_date = Some("2025-06-12".into());
        let mut undated = app("undated", Status::Applied);
        undated.date_applied = None;
        let recent_reject = with_history(
            app("rej", Status::Rejected),
            &[(Status::Applied, "2025-05-01"), (Status::Rejected, "2025-06-10")],
        );
        let old_reject = with_history(
            app("old", Status::Rejected),
            &[(Status::Rejected, "2025-04-01")],
        );

        let apps = vec![stale, contacted, undated, recent_reject, old_reject];
        let ids: Vec<String> = needs_follow_up(&apps, now()).into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["stale"]);
        let ids: Vec<String> = recently_rejected(&apps, now()).into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["rej"]);
    }

    #[test]
    fn test_applications_for_company_tolerates_spelling() {
        let mut a = app("1", Status::Applied);
        a.company = "Genentech  Inc".into();
        let mut b = app("2", Status::Applied);
        b.company = "Vertex".into();
        let apps = vec![a, b];
        let matched = applications_for_company(&apps, "genentech inc.");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, "1");
        assert!(applications_for_company(&apps, "  ").is_empty());
    }

    #[test]
    fn test_application_filter_combines_parts() {
        let mut a = app("1", Status::Applied);
        a.company = "Moderna".into();
        a.title = "Analytical Scientist".into();
        a.region = Some("Boston/Cambridge".into());
        let mut b = app("2", Status::PhoneScreen);
        b.company = "Vertex".into();
        b.title = "Process Chemist".into();
        b.location = Some("Boston, MA".into());
        b.region = Some("Boston/Cambridge".into());
        let mut c = app("3", Status::Rejected);
        c.company = "Genentech".into();
        c.region = Some("SF Bay Area".into());
        let d = app("4", Status::Applied);
        let apps = vec![a, b, c, d];

        let ids = |filter: &ApplicationFilter| -> Vec<String> {
            apps.iter().filter(|a| filter.matches(a)).map(|a| a.id.clone()).collect()
        };

        assert_eq!(ids(&ApplicationFilter::default()).len(), 4);

        let by_status = ApplicationFilter {
            statuses: vec![Status::Applied, Status::PhoneScreen],
            ..Default::default()
        };
        assert_eq!(ids(&by_status), vec!["1", "2", "4"]);

        let by_region = ApplicationFilter {
            regions: vec!["boston/cambridge".into(), "SF Bay Area".into()],
            ..Default::default()
        };
        assert_eq!(ids(&by_region), vec!["1", "2", "3"]);

        let search_location = ApplicationFilter {
            search: Some("  boston ".into()),
            ..Default::default()
        };
        assert_eq!(ids(&search_location), vec!["2"]);

        let combined = ApplicationFilter {
            statuses: vec![Status::Applied],
            regions: vec!["Boston/Cambridge".into()],
            search: Some("scientist".into()),
        };
        assert_eq!(ids(&combined), vec!["1"]);
    }

    #[test]
    fn test_dashboard_on_empty_collection() {
        let dash = Dashboard::build(&[], &[], now());
        assert_eq!(dash.metrics, KeyMetrics::default());
        assert!(dash.funnel.iter().all(|s| s.count == 0));
        assert_eq!(dash.weekly_trend.len(), 8);
        assert!(dash.follow_ups.is_empty());
        assert!(dash.quality.callout.is_none());
        let json = serde_json::to_value(&dash).unwrap();
        assert!(json["metrics"]["avgDaysToResponse"].is_number());
        assert!(json["followUps"]["dueToday"].is_array());
    }
}
