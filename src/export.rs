//! CSV export, JSON backups and the markdown summary / interview-prep documents.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::analytics::{percent, response_rate};
use crate::dates::format_date;
use crate::models::{null_as_default, Application, ResumeVersion, Status, TargetCompany};
use crate::store::{migrate, Store};

pub const BACKUP_VERSION: &str = "2.0";
const SUMMARY_ACTIVE_LIMIT: usize = 15;
const PREP_RESEARCH_LINES: usize = 10;
const PREP_LIST_ITEMS: usize = 5;
const PREP_DESCRIPTION_LINES: usize = 40;
const WRAP_WIDTH: usize = 90;

// --- CSV ---

fn csv_cell(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_document(header: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut out = header.iter().map(|h| csv_cell(h)).collect::<Vec<_>>().join(",");
    for row in rows {
        out.push('\n');
        out.push_str(&row.iter().map(|c| csv_cell(c)).collect::<Vec<_>>().join(","));
    }
    out.push('\n');
    out
}

fn flatten(text: Option<&str>) -> String {
    text.unwrap_or_default().replace("\r\n", " ").replace('\n', " ")
}

pub fn applications_csv(apps: &[Application], resumes: &[ResumeVersion]) -> String {
    let header = [
        "Company",
        "Title",
        "Status",
        "Date Applied",
        "Location",
        "Region",
        "Company Type",
        "Resume Version",
        "Application Source",
        "Referral",
        "Tags",
        "Last Contact",
        "Next Follow-up",
        "Notes",
    ];
    let rows = apps
        .iter()
        .map(|app| {
            let resume = app
                .resume_version_id()
                .map(|id| {
                    resumes
                        .iter()
                        .find(|r| r.id == id)
                        .map(|r| r.name.clone())
                        .unwrap_or_else(|| id.to_string())
                })
                .unwrap_or_default();
            vec![
                app.company.clone(),
                app.title.clone(),
                app.status.to_string(),
                app.date_applied.clone().unwrap_or_default(),
                app.location.clone().unwrap_or_default(),
                app.region.clone().unwrap_or_default(),
                app.company_type.clone().unwrap_or_default(),
                resume,
                app.application_source.clone().unwrap_or_default(),
                app.referral.clone().unwrap_or_default(),
                app.tags.join("; "),
                app.last_contact_date.clone().unwrap_or_default(),
                app.next_follow_up_date.clone().unwrap_or_default(),
                flatten(app.interview_notes.as_deref()),
            ]
        })
        .collect();
    csv_document(&header, rows)
}

pub fn companies_csv(companies: &[TargetCompany]) -> String {
    let header = [
        "Company",
        "Category",
        "Priority",
        "Status",
        "Careers URL",
        "Connections",
        "Notes",
    ];
    let rows = companies
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                c.category.clone().unwrap_or_default(),
                c.priority.to_string(),
                c.status.clone(),
                c.careers_url.clone().unwrap_or_default(),
                c.connections.len().to_string(),
                flatten(c.notes.as_deref()),
            ]
        })
        .collect();
    csv_document(&header, rows)
}

// --- JSON backup ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub export_date: DateTime<Utc>,
    pub version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub applications: Vec<Application>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resume_versions: Vec<ResumeVersion>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub target_companies: Vec<TargetCompany>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreCounts {
    pub applications: usize,
    pub resume_versions: usize,
    pub target_companies: usize,
}

/// Snapshots every collection and records the backup time.
pub fn create_backup(store: &Store, now: DateTime<Utc>) -> Result<Backup> {
    let backup = Backup {
        export_date: now,
        version: BACKUP_VERSION.to_string(),
        applications: store.load_applications()?,
        resume_versions: store.load_resume_versions()?,
        target_companies: store.load_target_companies()?,
    };
    store.mark_backup(now)?;
    Ok(backup)
}

pub fn parse_backup(json: &str) -> Result<Backup> {
    let backup: Backup = serde_json::from_str(json).context("Not a valid jobtrack backup file")?;
    if backup.version != BACKUP_VERSION {
        warn!(version = %backup.version, "restoring backup from a different format version");
    }
    Ok(backup)
}

/// Replaces all stored collections with the backup's contents.
pub fn restore_backup(store: &Store, backup: Backup) -> Result<RestoreCounts> {
    if backup.applications.iter().any(|a| a.id.trim().is_empty()) {
        return Err(anyhow!("Backup contains an application without an id"));
    }
    let applications = migrate(backup.applications);
    store.save_applications(&applications)?;
    store.save_resume_versions(&backup.resume_versions)?;
    store.save_target_companies(&backup.target_companies)?;
    let counts = RestoreCounts {
        applications: applications.len(),
        resume_versions: backup.resume_versions.len(),
        target_companies: backup.target_companies.len(),
    };
    info!(?counts, "restored backup");
    Ok(counts)
}

// --- Summary ---

fn is_summary_active(app: &Application) -> bool {
    !matches!(app.status, Status::Rejected | Status::Withdrawn | Status::Ghost)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total: usize,
    pub active_apps: usize,
    pub response_rate: u32,
    pub by_status: BTreeMap<String, usize>,
    pub by_region: BTreeMap<String, usize>,
    pub by_company_type: BTreeMap<String, usize>,
    pub generated_at: DateTime<Utc>,
}

pub fn summary_stats(apps: &[Application], now: DateTime<Utc>) -> SummaryStats {
    let mut by_status = BTreeMap::new();
    let mut by_region = BTreeMap::new();
    let mut by_company_type = BTreeMap::new();
    for app in apps {
        *by_status.entry(app.status.to_string()).or_insert(0) += 1;
        if let Some(region) = app.region.as_deref().filter(|r| !r.is_empty()) {
            *by_region.entry(region.to_string()).or_insert(0) += 1;
        }
        if let Some(kind) = app.company_type.as_deref().filter(|t| !t.is_empty()) {
            *by_company_type.entry(kind.to_string()).or_insert(0) += 1;
        }
    }
    SummaryStats {
        total: apps.len(),
        active_apps: apps.iter().filter(|a| is_summary_active(a)).count(),
        response_rate: response_rate(apps),
        by_status,
        by_region,
        by_company_type,
        generated_at: now,
    }
}

pub fn summary_report(apps: &[Application], stats: &SummaryStats) -> String {
    let mut out = String::new();
    out.push_str("# Job Search Summary\n\n");
    out.push_str(&format!("Generated: {}\n\n", stats.generated_at.format("%b %-d, %Y")));

    out.push_str("## Key Metrics\n\n");
    out.push_str(&format!("- Total Applications: {}\n", stats.total));
    out.push_str(&format!("- Active Applications: {}\n", stats.active_apps));
    out.push_str(&format!("- Response Rate: {}%\n\n", stats.response_rate));

    out.push_str("## By Status\n\n");
    for (status, count) in &stats.by_status {
        out.push_str(&format!("- {}: {} ({}%)\n", status, count, percent(*count, stats.total)));
    }
    out.push('\n');

    let active: Vec<&Application> = apps
        .iter()
        .filter(|a| is_summary_active(a))
        .take(SUMMARY_ACTIVE_LIMIT)
        .collect();
    if !active.is_empty() {
        out.push_str("## Active Applications\n\n");
        for app in active {
            out.push_str(&format!("- {} - {} ({})\n", app.company, app.title, app.status));
        }
    }
    out
}

// --- Interview prep sheet ---

fn wrapped_lines(text: &str) -> Vec<String> {
    text.lines()
        .flat_map(|line| {
            if line.trim().is_empty() {
                vec![String::new()]
            } else {
                textwrap::wrap(line, WRAP_WIDTH)
                    .into_iter()
                    .map(|l| l.into_owned())
                    .collect()
            }
        })
        .collect()
}

pub fn interview_prep_sheet(
    app: &Application,
    resume: Option<&ResumeVersion>,
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Interview Preparation: {}\n\n", app.company));
    out.push_str(&format!("**{}**\n\n", app.title));

    out.push_str("## Quick Info\n\n");
    let location = app.location.as_deref().filter(|l| !l.is_empty());
    out.push_str(&format!("- Location: {}\n", location.unwrap_or("Not specified")));
    out.push_str(&format!("- Applied: {}\n", format_date(app.date_applied.as_deref())));
    out.push_str(&format!("- Current Status: {}\n", app.status));
    let resume_name = resume.map(|r| r.name.as_str()).unwrap_or("Not specified");
    out.push_str(&format!("- Resume Version: {}\n", resume_name));
    if let Some(referral) = app.referral.as_deref().filter(|r| !r.is_empty()) {
        out.push_str(&format!("- Referral: {}\n", referral));
    }
    out.push('\n');

    if !app.status_history.is_empty() {
        out.push_str("## Timeline\n\n");
        for entry in &app.status_history {
            let notes = entry
                .notes
                .as_deref()
                .map(|n| format!(": {}", n))
                .unwrap_or_default();
            out.push_str(&format!("- {} - {}{}\n", format_date(Some(&entry.date)), entry.status, notes));
        }
        out.push('\n');
    }

    if let Some(prep) = &app.interview_prep {
        if !prep.company_research.trim().is_empty() {
            out.push_str("## Company Research\n\n");
            for line in wrapped_lines(&prep.company_research)
                .into_iter()
                .take(PREP_RESEARCH_LINES)
            {
                out.push_str(&format!("{}\n", line));
            }
            out.push('\n');
        }
        if !prep.questions_to_ask.is_empty() {
            out.push_str("## Questions to Ask\n\n");
            for q in prep.questions_to_ask.iter().take(PREP_LIST_ITEMS) {
                out.push_str(&format!("- {}\n", q));
            }
            out.push('\n');
        }
        if !prep.technical_topics.is_empty() {
            out.push_str("## Technical Topics to Review\n\n");
            for topic in prep.technical_topics.iter().take(PREP_LIST_ITEMS) {
                out.push_str(&format!("- {}\n", topic));
            }
            out.push('\n');
        }
    }

    if let Some(jd) = app.job_description.as_ref().filter(|jd| !jd.content.trim().is_empty()) {
        out.push_str("## Job Description\n\n");
        let lines = wrapped_lines(&jd.content);
        let total = lines.len();
        for line in lines.into_iter().take(PREP_DESCRIPTION_LINES) {
            out.push_str(&format!("> {}\n", line));
        }
        if total > PREP_DESCRIPTION_LINES {
            out.push_str(&format!(">\n> _(truncated, {} more lines)_\n", total - PREP_DESCRIPTION_LINES));
        }
        out.push('\n');
    }

    out.push_str(&format!("---\nGenerated {}\n", now.format("%b %-d, %Y")));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InterviewPrep, JobDescription};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn with_status(company: &str, status: Status) -> Application {
        let mut app = Application::new(company, "Scientist", "2025-06-01");
        app.status = status;
        app
    }

    #[test]
    fn test_csv_cell_escaping() {
        assert_eq!(csv_cell("plain"), "plain");
        assert_eq!(csv_cell("Acme, Inc"), "\"Acme, Inc\"");
        assert_eq!(csv_cell("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_cell("a\nb"), "\"a\nb\"");
    }

    #[test]
    fn test_applications_csv_rows() {
        let resume = ResumeVersion {
            id: "r1".into(),
            name: "Analytical".into(),
            description: None,
            target_roles: None,
            content: None,
            file_name: None,
            created_at: None,
        };
        let mut app = Application::new("Acme, Inc", "Chemist", "2025-06-01");
        app.resume_version = Some("r1".into());
        app.tags = vec!["hplc".into(), "remote".into()];
        app.interview_notes = Some("line one\nline \"two\"".into());

        let csv = applications_csv(&[app], &[resume]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Company,Title,Status"));
        assert!(lines[1].starts_with("\"Acme, Inc\",Chemist,Applied,2025-06-01"));
        assert!(lines[1].contains(",Analytical,"));
        assert!(lines[1].contains("hplc; remote"));
        assert!(lines[1].ends_with("\"line one line \"\"two\"\"\""));
    }

    #[test]
    fn test_companies_csv_counts_connections() {
        let mut company = TargetCompany::new("Moderna");
        company.connections.push(Default::default());
        company.connections.push(Default::default());
        let csv = companies_csv(&[company]);
        assert_eq!(csv.lines().nth(1), Some("Moderna,,3,Researching,,2,"));
    }

    #[test]
    fn test_summary_stats() {
        let mut remote = with_status("A", Status::Reviewed);
        remote.region = Some("Remote".into());
        remote.company_type = Some("Startup".into());
        let apps = vec![
            remote,
            with_status("B", Status::Applied),
            with_status("C", Status::Rejected),
            with_status("D", Status::Offer),
        ];
        let stats = summary_stats(&apps, now());
        assert_eq!(stats.total, 4);
        // Offer still counts as active here
        assert_eq!(stats.active_apps, 3);
        assert_eq!(stats.response_rate, 75);
        assert_eq!(stats.by_status["Rejected"], 1);
        assert_eq!(stats.by_region.len(), 1);
        assert_eq!(stats.by_company_type["Startup"], 1);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["activeApps"], 3);
        assert!(json["generatedAt"].is_string());
    }

    #[test]
    fn test_summary_report_limits_active_list() {
        let apps: Vec<Application> = (0..20)
            .map(|i| with_status(&format!("Co{}", i), Status::Applied))
            .collect();
        let stats = summary_stats(&apps, now());
        let report = summary_report(&apps, &stats);
        assert!(report.contains("- Total Applications: 20"));
        assert!(report.contains("- Applied: 20 (100%)"));
        assert!(report.contains("- Co14 - Scientist (Applied)"));
        assert!(!report.contains("- Co15 - "));
    }

    #[test]
    fn test_prep_sheet_truncates_sections() {
        let mut app = Application::new("Vertex", "Senior Scientist", "2025-06-01");
        app.update_status(Status::PhoneScreen, "2025-06-05", Some("with HM".into()), None);
        app.interview_prep = Some(InterviewPrep {
            company_research: (1..=12).map(|i| format!("fact {}", i)).collect::<Vec<_>>().join("\n"),
            questions_to_ask: (1..=7).map(|i| format!("q{}", i)).collect(),
            technical_topics: vec!["LC-MS".into()],
            ..Default::default()
        });
        app.job_description = Some(JobDescription {
            content: (1..=45).map(|i| format!("jd line {}", i)).collect::<Vec<_>>().join("\n"),
            ..Default::default()
        });

        let sheet = interview_prep_sheet(&app, None, now());
        assert!(sheet.contains("- Resume Version: Not specified"));
        assert!(sheet.contains("- Jun 5, 2025 - Phone Screen: with HM"));
        assert!(sheet.contains("fact 10\n"));
        assert!(!sheet.contains("fact 11"));
        assert!(sheet.contains("- q5\n"));
        assert!(!sheet.contains("- q6"));
        assert!(sheet.contains("> jd line 40\n"));
        assert!(!sheet.contains("jd line 41"));
        assert!(sheet.contains("5 more lines"));
    }

    #[test]
    fn test_backup_round_trip_through_store() {
        let store = Store::open_in_memory().unwrap();
        store.add_application(Application::new("Acme", "Chemist", "2025-06-01")).unwrap();
        store.add_target_company(TargetCompany::new("Moderna")).unwrap();

        let backup = create_backup(&store, now()).unwrap();
        assert_eq!(backup.version, BACKUP_VERSION);
        assert_eq!(store.last_backup().unwrap(), Some(now()));
        let json = serde_json::to_string_pretty(&backup).unwrap();
        assert!(json.contains("\"exportDate\""));

        let other = Store::open_in_memory().unwrap();
        let counts = restore_backup(&other, parse_backup(&json).unwrap()).unwrap();
        assert_eq!(counts.applications, 1);
        assert_eq!(counts.target_companies, 1);
        assert_eq!(other.load_applications().unwrap(), store.load_applications().unwrap());
    }

    #[test]
    fn test_parse_backup_tolerates_missing_collections() {
        let backup = parse_backup(r#"{"exportDate":"2025-01-01T00:00:00.000Z","version":"1.0",
            "applications":[{"id":"a","status":"Applied","company":"X"}]}"#)
        .unwrap();
        assert_eq!(backup.applications.len(), 1);
        assert!(backup.resume_versions.is_empty());
        assert!(parse_backup("[]").is_err());
    }

    #[test]
    fn test_parse_backup_reads_null_fields_as_empty() {
        let backup = parse_backup(r#"{"exportDate":"2025-01-01T00:00:00Z","version":"2.0",
            "applications":[{"id":"a","status":"Rejected","statusHistory":null,"tags":null,
                "rejection":{"stage":null,"learnings":null}}],
            "resumeVersions":null,
            "targetCompanies":[{"id":"c","name":"Moderna","priority":null,"status":null,"connections":null}]}"#)
        .unwrap();
        assert_eq!(backup.applications.len(), 1);
        assert!(backup.applications[0].status_history.is_empty());
        assert!(backup.resume_versions.is_empty());
        assert_eq!(backup.target_companies[0].priority, 3);
        assert_eq!(backup.target_companies[0].status, "Researching");
    }
}
