use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

// --- Option tables ---

pub const REJECTION_STAGES: [&str; 7] = [
    "Resume Screen",
    "Phone Screen",
    "Technical Interview",
    "Onsite Interview",
    "Final Round",
    "Offer Stage",
    "Unknown",
];

pub const REJECTION_REASONS: [&str; 9] = [
    "Skills Gap",
    "Experience Level",
    "Culture Fit",
    "Better Candidate",
    "Salary Expectations",
    "Position Filled",
    "Position Cancelled",
    "Internal Candidate",
    "Unknown",
];

pub const REGION_OPTIONS: [&str; 6] = [
    "Boston/Cambridge",
    "RTP/Durham",
    "SF Bay Area",
    "San Diego",
    "Remote",
    "Other",
];

pub const COMPANY_TYPE_OPTIONS: [&str; 5] = [
    "Large Pharma",
    "Mid-size Biotech",
    "Startup",
    "CDMO/CRO",
    "Academic",
];

pub const MODALITY_OPTIONS: [&str; 7] = [
    "Small Molecule",
    "Protein Therapeutics",
    "mAb/Biologics",
    "Gene Therapy",
    "Vaccines",
    "Cell Therapy",
    "Broad Analytical",
];

pub const APPLICATION_SOURCE_OPTIONS: [&str; 6] = [
    "LinkedIn",
    "Indeed",
    "Company Website",
    "Recruiter",
    "Referral",
    "Other",
];

pub const COMPANY_STATUS_OPTIONS: [&str; 5] = [
    "Researching",
    "Ready to Apply",
    "Applied",
    "Interviewing",
    "Dormant",
];

pub const INTRO_STATUS_OPTIONS: [&str; 4] = ["Not Asked", "Asked", "Intro Made", "Declined"];

// --- Status ---

/// Application status. Unknown strings read from storage are kept verbatim in
/// `Other` so they survive a load/save round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    #[default]
    Applied,
    Reviewed,
    PhoneScreen,
    Technical,
    Onsite,
    Offer,
    Rejected,
    Ghost,
    Withdrawn,
    Other(String),
}

impl Status {
    pub const ALL: [Status; 9] = [
        Status::Applied,
        Status::Reviewed,
        Status::PhoneScreen,
        Status::Technical,
        Status::Onsite,
        Status::Offer,
        Status::Rejected,
        Status::Ghost,
        Status::Withdrawn,
    ];

    /// Progression used by the funnel, earliest first.
    pub const FUNNEL: [Status; 6] = [
        Status::Applied,
        Status::Reviewed,
        Status::PhoneScreen,
        Status::Technical,
        Status::Onsite,
        Status::Offer,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Status::Applied => "Applied",
            Status::Reviewed => "Reviewed",
            Status::PhoneScreen => "Phone Screen",
            Status::Technical => "Technical",
            Status::Onsite => "Onsite",
            Status::Offer => "Offer",
            Status::Rejected => "Rejected",
            Status::Ghost => "Ghost",
            Status::Withdrawn => "Withdrawn",
            Status::Other(s) => s,
        }
    }

    /// Case-insensitive lookup that also accepts `phone-screen` / `phone_screen`.
    pub fn parse(s: &str) -> Option<Status> {
        let wanted = s.trim().to_lowercase().replace(['-', '_'], " ");
        Status::ALL
            .iter()
            .find(|status| status.as_str().to_lowercase() == wanted)
            .cloned()
    }

    pub fn funnel_position(&self) -> Option<usize> {
        Status::FUNNEL.iter().position(|s| s == self)
    }

    /// No further follow-up is expected once an application lands here.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Rejected | Status::Withdrawn | Status::Offer | Status::Ghost
        )
    }

    pub fn is_interviewing(&self) -> bool {
        matches!(self, Status::PhoneScreen | Status::Technical | Status::Onsite)
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        Status::ALL
            .iter()
            .find(|status| status.as_str() == s)
            .cloned()
            .unwrap_or(Status::Other(s))
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        match status {
            Status::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads `null` the same as an absent field.
pub(crate) fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Option::unwrap_or_default)
}

fn null_as_priority<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    Option::<u8>::deserialize(d).map(|p| p.unwrap_or_else(default_priority))
}

fn null_as_company_status<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Option::<String>::deserialize(d).map(|s| s.unwrap_or_else(default_company_status))
}

// --- Application and its parts ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: Status,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rejection {
    pub stage: Option<String>,
    pub reason: Option<String>,
    pub feedback_verbatim: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub learnings: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub action_items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Quality {
    #[serde(deserialize_with = "null_as_default")]
    pub custom_resume: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub custom_cover_letter: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub ats_optimized: bool,
    pub resume_file_name: Option<String>,
    pub cover_letter_file_name: Option<String>,
}

impl Quality {
    pub fn is_customized(&self) -> bool {
        self.custom_resume || self.custom_cover_letter
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualificationStanding {
    Met,
    Partial,
    Unmet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Qualification {
    #[serde(deserialize_with = "null_as_default")]
    pub requirement: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub evidence: String,
    #[serde(deserialize_with = "null_as_default")]
    pub suggestion: String,
}

impl Qualification {
    pub fn standing(&self) -> QualificationStanding {
        match self.status.trim().to_lowercase().as_str() {
            "met" => QualificationStanding::Met,
            "partial" => QualificationStanding::Partial,
            _ => QualificationStanding::Unmet,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiAnalysis {
    #[serde(deserialize_with = "null_as_default")]
    pub fit_score: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub fit_tier: String,
    #[serde(deserialize_with = "null_as_default")]
    pub level_fit: String,
    #[serde(deserialize_with = "null_as_default")]
    pub lane_fit: String,
    pub requirements_met: Option<u32>,
    pub requirements_total: Option<u32>,
    #[serde(deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(deserialize_with = "null_as_default")]
    pub qualifications: Vec<Qualification>,
    #[serde(deserialize_with = "null_as_default")]
    pub strengths: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub gaps: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub recommendations: Vec<String>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

/// Tier label for a fit score, using the same cut-offs the analysis prompt asks for.
pub fn fit_tier_for(score: f64) -> &'static str {
    if score >= 80.0 {
        "Strong Fit"
    } else if score >= 60.0 {
        "Good Fit"
    } else if score >= 40.0 {
        "Stretch"
    } else {
        "Long Shot"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterviewPrep {
    #[serde(deserialize_with = "null_as_default")]
    pub company_research: String,
    #[serde(deserialize_with = "null_as_default")]
    pub role_questions: Vec<serde_json::Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub behavioral_stories: Vec<serde_json::Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub technical_topics: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub questions_to_ask: Vec<String>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobDescription {
    #[serde(deserialize_with = "null_as_default")]
    pub content: String,
    pub saved_date: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub status: Status,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub company_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub modality: Vec<String>,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub job_url: Option<String>,
    #[serde(default)]
    pub requisition_id: Option<String>,
    #[serde(default)]
    pub date_applied: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status_history: Vec<StatusEntry>,
    #[serde(default)]
    pub rejection: Option<Rejection>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub quality: Quality,
    #[serde(default)]
    pub next_follow_up_date: Option<String>,
    #[serde(default)]
    pub follow_up_notes: Option<String>,
    #[serde(default)]
    pub last_contact_date: Option<String>,
    #[serde(default)]
    pub ai_analysis: Option<AiAnalysis>,
    #[serde(default)]
    pub resume_version: Option<String>,
    #[serde(default)]
    pub application_source: Option<String>,
    #[serde(default)]
    pub referral: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub interview_notes: Option<String>,
    #[serde(default)]
    pub interview_prep: Option<InterviewPrep>,
    #[serde(default)]
    pub job_description: Option<JobDescription>,
}

impl Application {
    /// A fresh application in `Applied` with its opening history entry.
    pub fn new(company: &str, title: &str, date_applied: &str) -> Self {
        Self {
            id: new_id(),
            status: Status::Applied,
            company: company.trim().to_string(),
            title: title.trim().to_string(),
            location: None,
            region: None,
            company_type: None,
            modality: Vec::new(),
            salary: None,
            job_url: None,
            requisition_id: None,
            date_applied: Some(date_applied.to_string()),
            status_history: vec![StatusEntry {
                status: Status::Applied,
                date: date_applied.to_string(),
                notes: None,
            }],
            rejection: None,
            quality: Quality::default(),
            next_follow_up_date: None,
            follow_up_notes: None,
            last_contact_date: None,
            ai_analysis: None,
            resume_version: None,
            application_source: None,
            referral: None,
            tags: Vec::new(),
            interview_notes: None,
            interview_prep: Some(InterviewPrep::default()),
            job_description: None,
        }
    }

    /// Records a status change. The history entry and `status` are always
    /// written together so the newest entry matches the current status.
    pub fn update_status(
        &mut self,
        status: Status,
        date: &str,
        notes: Option<String>,
        rejection: Option<Rejection>,
    ) {
        self.status_history.push(StatusEntry {
            status: status.clone(),
            date: date.to_string(),
            notes: notes.filter(|n| !n.trim().is_empty()),
        });
        if status == Status::Rejected {
            if rejection.is_some() {
                self.rejection = rejection;
            }
        } else {
            self.rejection = None;
        }
        self.status = status;
        self.last_contact_date = Some(date.to_string());
    }

    /// Resume version id, treating the empty string the form writes as "none".
    pub fn resume_version_id(&self) -> Option<&str> {
        self.resume_version.as_deref().filter(|id| !id.is_empty())
    }

    pub fn last_history_entry(&self) -> Option<&StatusEntry> {
        self.status_history.last()
    }

    pub fn ever_had_status(&self, wanted: &[Status]) -> bool {
        wanted.contains(&self.status)
            || self.status_history.iter().any(|h| wanted.contains(&h.status))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeVersion {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub target_roles: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Contact {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub role: Option<String>,
    pub intro_status: Option<String>,
    pub notes: Option<String>,
}

fn default_priority() -> u8 {
    3
}

fn default_company_status() -> String {
    "Researching".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCompany {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_priority", deserialize_with = "null_as_priority")]
    pub priority: u8, // 1 (highest) - 5
    #[serde(default = "default_company_status", deserialize_with = "null_as_company_status")]
    pub status: String,
    #[serde(default)]
    pub careers_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub connections: Vec<Contact>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TargetCompany {
    pub fn new(name: &str) -> Self {
        Self {
            id: new_id(),
            name: name.trim().to_string(),
            category: None,
            priority: default_priority(),
            status: default_company_status(),
            careers_url: None,
            connections: Vec::new(),
            notes: None,
        }
    }
}

/// Random v4 UUID record id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_known_and_unknown_values() {
        let known: Status = serde_json::from_str("\"Phone Screen\"").unwrap();
        assert_eq!(known, Status::PhoneScreen);
        assert_eq!(serde_json::to_string(&known).unwrap(), "\"Phone Screen\"");

        let unknown: Status = serde_json::from_str("\"On Hold\"").unwrap();
        assert_eq!(unknown, Status::Other("On Hold".to_string()));
        assert_eq!(serde_json::to_string(&unknown).unwrap(), "\"On Hold\"");
    }

    #[test]
    fn test_status_parse_is_lenient() {
        assert_eq!(Status::parse("phone-screen"), Some(Status::PhoneScreen));
        assert_eq!(Status::parse("ONSITE"), Some(Status::Onsite));
        assert_eq!(Status::parse("on hold"), None);
    }

    #[test]
    fn test_application_requires_only_id_and_status() {
        let app: Application = serde_json::from_str(r#"{"id":"a1","status":"Reviewed"}"#).unwrap();
        assert_eq!(app.status, Status::Reviewed);
        assert!(app.status_history.is_empty());
        assert!(!app.quality.is_customized());
        assert!(app.resume_version_id().is_none());
    }

    #[test]
    fn test_application_reads_browser_export_fields() {
        let json = r#"{
            "id": "a2",
            "status": "Rejected",
            "company": "Acme Bio",
            "dateApplied": "2025-01-02",
            "statusHistory": [
                {"status": "Applied", "date": "2025-01-02"},
                {"status": "Rejected", "date": "2025-01-09", "notes": "form letter"}
            ],
            "rejection": {"stage": "Resume Screen", "learnings": ["Need more SQL"]},
            "quality": {"customResume": true},
            "resumeVersion": ""
        }"#;
        let app: Application = serde_json::from_str(json).unwrap();
        assert_eq!(app.status_history.len(), 2);
        assert_eq!(app.rejection.unwrap().learnings, vec!["Need more SQL"]);
        assert!(app.quality.custom_resume);
        assert_eq!(app.resume_version, Some(String::new()));
    }

    #[test]
    fn test_update_status_keeps_history_in_step() {
        let mut app = Application::new("Acme", "Scientist", "2025-03-01");
        app.update_status(Status::PhoneScreen, "2025-03-05", Some("recruiter call".into()), None);
        assert_eq!(app.status, Status::PhoneScreen);
        assert_eq!(app.last_history_entry().unwrap().status, Status::PhoneScreen);
        assert_eq!(app.last_contact_date.as_deref(), Some("2025-03-05"));

        let rejection = Rejection {
            stage: Some("Phone Screen".into()),
            ..Default::default()
        };
        app.update_status(Status::Rejected, "2025-03-10", None, Some(rejection));
        assert!(app.rejection.is_some());
        assert_eq!(app.status_history.len(), 3);

        app.update_status(Status::Reviewed, "2025-03-12", Some("  ".into()), None);
        assert!(app.rejection.is_none());
        assert!(app.last_history_entry().unwrap().notes.is_none());
    }

    #[test]
    fn test_qualification_standing() {
        let q = |s: &str| Qualification {
            status: s.to_string(),
            ..Default::default()
        };
        assert_eq!(q("Met").standing(), QualificationStanding::Met);
        assert_eq!(q("partial").standing(), QualificationStanding::Partial);
        assert_eq!(q("Gap").standing(), QualificationStanding::Unmet);
    }

    #[test]
    fn test_fit_tier_cutoffs() {
        assert_eq!(fit_tier_for(85.0), "Strong Fit");
        assert_eq!(fit_tier_for(60.0), "Good Fit");
        assert_eq!(fit_tier_for(59.9), "Stretch");
        assert_eq!(fit_tier_for(10.0), "Long Shot");
    }

    #[test]
    fn test_new_id_is_v4_uuid_and_unique() {
        let a = new_id();
        let b = new_id();
        assert_eq!(Uuid::parse_str(&a).unwrap().get_version_num(), 4);
        assert_eq!(a.len(), 36);
        assert_ne!(a, b);
    }

    #[test]
    fn test_null_fields_read_as_defaults() {
        let json = r#"{
            "id": "n1",
            "status": "Reviewed",
            "company": null,
            "statusHistory": [{"status": "Applied", "date": null, "notes": null}],
            "quality": {"customResume": null, "resumeFileName": null},
            "rejection": {"learnings": null, "actionItems": null},
            "aiAnalysis": {"fitScore": null, "summary": null, "qualifications": null},
            "interviewPrep": {"companyResearch": null, "roleQuestions": null},
            "jobDescription": {"content": null},
            "modality": null,
            "tags": null
        }"#;
        let app: Application = serde_json::from_str(json).unwrap();
        assert_eq!(app.company, "");
        assert_eq!(app.status_history[0].date, "");
        assert!(!app.quality.custom_resume);
        assert!(app.rejection.unwrap().action_items.is_empty());
        assert_eq!(app.ai_analysis.unwrap().fit_score, 0.0);
        assert!(app.interview_prep.unwrap().role_questions.is_empty());
        assert!(app.modality.is_empty() && app.tags.is_empty());

        let app: Application =
            serde_json::from_str(r#"{"id":"n2","status":"Applied","quality":null}"#).unwrap();
        assert_eq!(app.quality, Quality::default());
    }
}
