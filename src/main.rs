mod ai;
mod analytics;
mod config;
mod dates;
mod export;
mod models;
mod store;
mod tui;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use analytics::{applications_for_company, ApplicationFilter, Dashboard};
use config::{Config, LlmSettings};
use dates::{days_ago, format_date, parse_day, today_iso};
use models::{
    Application, Contact, JobDescription, Quality, Rejection, ResumeVersion, Status, TargetCompany,
    APPLICATION_SOURCE_OPTIONS, COMPANY_STATUS_OPTIONS, COMPANY_TYPE_OPTIONS, INTRO_STATUS_OPTIONS,
    MODALITY_OPTIONS, REGION_OPTIONS, REJECTION_REASONS, REJECTION_STAGES,
};
use store::Store;
use tui::{short_id, truncate};

#[derive(Parser)]
#[command(name = "jobtrack")]
#[command(about = "Track job applications and see what is working in your search")]
struct Cli {
    /// Path to the data file (overrides JOBTRACK_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data file
    Init,

    /// Record a new application
    Add {
        company: String,
        title: String,

        /// Date applied (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<String>,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        region: Option<String>,

        #[arg(long)]
        company_type: Option<String>,

        /// Work arrangement (repeatable)
        #[arg(long)]
        modality: Vec<String>,

        #[arg(long)]
        salary: Option<String>,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        req_id: Option<String>,

        /// Where the posting was found
        #[arg(long)]
        source: Option<String>,

        #[arg(long)]
        referral: Option<String>,

        /// Resume version name or id
        #[arg(short, long)]
        resume: Option<String>,

        #[arg(long)]
        tag: Vec<String>,

        #[arg(long)]
        custom_resume: bool,

        #[arg(long)]
        custom_cover_letter: bool,

        #[arg(long)]
        ats: bool,

        /// File holding the job description to archive
        #[arg(long)]
        jd_file: Option<PathBuf>,

        /// Next follow-up date (YYYY-MM-DD)
        #[arg(long)]
        follow_up: Option<String>,
    },

    /// List applications
    List {
        /// Status to include (repeatable)
        #[arg(short, long)]
        status: Vec<String>,

        /// Region to include (repeatable)
        #[arg(short, long)]
        region: Vec<String>,

        /// Text to find in company, title or location
        #[arg(long)]
        search: Option<String>,

        /// Company name (near-miss spellings match)
        #[arg(short, long)]
        company: Option<String>,
    },

    /// Show application details
    Show { id: String },

    /// Delete an application
    Delete { id: String },

    /// Move an application to a new status
    Status {
        id: String,
        status: String,

        /// Date of the change (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,

        /// Rejection stage
        #[arg(long)]
        stage: Option<String>,

        /// Rejection reason
        #[arg(long)]
        reason: Option<String>,

        /// Feedback exactly as received
        #[arg(long)]
        feedback: Option<String>,

        /// Lesson learned (repeatable)
        #[arg(long)]
        learning: Vec<String>,

        /// Action item (repeatable)
        #[arg(long)]
        action: Vec<String>,
    },

    /// Set or clear the next follow-up date
    FollowUp {
        id: String,

        /// YYYY-MM-DD, or "clear"
        date: String,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Record how much an application was tailored
    Quality {
        id: String,

        #[arg(long)]
        custom_resume: Option<bool>,

        #[arg(long)]
        custom_cover_letter: Option<bool>,

        #[arg(long)]
        ats: Option<bool>,

        #[arg(long)]
        resume_file: Option<String>,

        #[arg(long)]
        cover_letter_file: Option<String>,
    },

    /// Manage resume versions
    Resume {
        #[command(subcommand)]
        command: ResumeCommands,
    },

    /// Manage target companies
    Company {
        #[command(subcommand)]
        command: CompanyCommands,
    },

    /// Show the analytics dashboard
    Dashboard {
        /// Print the dashboard as JSON instead of opening the viewer
        #[arg(long)]
        json: bool,
    },

    /// Browse applications interactively
    Browse {
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Score a resume against an application's job description
    Analyze {
        id: String,

        /// Resume version name or id (default: the one used to apply)
        #[arg(short, long)]
        resume: Option<String>,

        /// Plain-text resume file, used instead of a stored version
        #[arg(long)]
        resume_file: Option<PathBuf>,

        /// Job description file (archived on the application)
        #[arg(long)]
        jd_file: Option<PathBuf>,

        #[arg(short, long)]
        model: Option<String>,
    },

    /// Ask for coaching based on your search data
    Coach {
        #[arg(short, long)]
        question: Option<String>,

        #[arg(short, long)]
        model: Option<String>,
    },

    /// Update interview prep notes and produce a prep sheet
    Prep {
        id: String,

        /// Company research notes (replaces existing)
        #[arg(long)]
        research: Option<String>,

        /// Question to ask the interviewer (repeatable)
        #[arg(long)]
        question: Vec<String>,

        /// Technical topic to review (repeatable)
        #[arg(long)]
        topic: Vec<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export data
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },

    /// Replace all data with a JSON backup
    Import { file: PathBuf },

    /// Write a markdown summary of the search
    Report {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show how much space each collection uses
    Storage {
        /// Delete every stored collection
        #[arg(long)]
        clear: bool,

        /// Confirm --clear
        #[arg(long)]
        yes: bool,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ResumeCommands {
    /// Add a resume version
    Add {
        name: String,

        /// Resume text file
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(short, long)]
        description: Option<String>,

        /// Roles this version targets
        #[arg(long)]
        roles: Option<String>,
    },

    /// List resume versions with their response rates
    List,
}

#[derive(Subcommand)]
enum CompanyCommands {
    /// Add a target company
    Add {
        name: String,

        #[arg(long)]
        category: Option<String>,

        /// 1 (highest) to 5
        #[arg(short, long, default_value = "3")]
        priority: u8,

        #[arg(short, long)]
        status: Option<String>,

        #[arg(long)]
        careers_url: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// List target companies
    List,

    /// Show a target company and its applications
    Show { name: String },

    /// Add a contact at a target company
    Contact {
        company: String,
        name: String,

        #[arg(long)]
        role: Option<String>,

        #[arg(long)]
        intro_status: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
enum ExportCommands {
    /// Applications as CSV
    Csv {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Target companies as CSV
    Companies {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Full JSON backup
    Json {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show resolved settings
    Show,

    /// Choose the model used by analyze and coach
    SetModel { model: String },
}

fn init_tracing(config: &Config) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_filter())))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Prints a note when `value` is not one of the usual choices. Unusual values are still saved.
fn note_unlisted(field: &str, value: Option<&str>, options: &[&str]) {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        if !options.iter().any(|o| o.eq_ignore_ascii_case(v)) {
            println!("Note: '{}' is not a standard {} ({}).", v, field, options.join(", "));
        }
    }
}

fn date_arg(value: Option<String>, now: DateTime<Utc>) -> Result<String> {
    match value {
        None => Ok(today_iso(now)),
        Some(v) => parse_day(&v)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .ok_or_else(|| anyhow!("Invalid date '{}'. Use YYYY-MM-DD.", v)),
    }
}

fn parse_status(value: &str) -> Result<Status> {
    Status::parse(value).ok_or_else(|| {
        anyhow!(
            "Unknown status '{}'. Use one of: {}",
            value,
            Status::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        )
    })
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_or_print(output: Option<PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(&path, content).with_context(|| format!("Failed to write to {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn provider_for(store: &Store, model: Option<String>) -> Result<Box<dyn ai::AIProvider>> {
    let model = match model {
        Some(m) => m,
        None => LlmSettings::load(store)?.model,
    };
    let spec = ai::resolve_model(&model)?;
    ai::create_provider(&spec)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::resolve(cli.db)?;
    init_tracing(&config);
    let now = Utc::now();

    let store = Store::open(&config.db_path)?;
    if !matches!(cli.command, Commands::Init) {
        store.ensure_initialized()?;
    }

    match cli.command {
        Commands::Init => {
            store.init()?;
            let path = store.path().unwrap_or(config.db_path.as_path());
            println!("Data file initialized at {}", path.display());
        }

        Commands::Add {
            company,
            title,
            date,
            location,
            region,
            company_type,
            modality,
            salary,
            url,
            req_id,
            source,
            referral,
            resume,
            tag,
            custom_resume,
            custom_cover_letter,
            ats,
            jd_file,
            follow_up,
        } => {
            if company.trim().is_empty() || title.trim().is_empty() {
                return Err(anyhow!("Company and title are required"));
            }
            note_unlisted("region", region.as_deref(), &REGION_OPTIONS);
            note_unlisted("company type", company_type.as_deref(), &COMPANY_TYPE_OPTIONS);
            note_unlisted("application source", source.as_deref(), &APPLICATION_SOURCE_OPTIONS);
            for m in &modality {
                note_unlisted("modality", Some(m.as_str()), &MODALITY_OPTIONS);
            }

            let date = date_arg(date, now)?;
            let mut app = Application::new(&company, &title, &date);
            app.location = location;
            app.region = region;
            app.company_type = company_type;
            app.modality = modality;
            app.salary = salary;
            app.job_url = url;
            app.requisition_id = req_id;
            app.application_source = source;
            app.referral = referral;
            app.tags = tag;
            app.quality = Quality {
                custom_resume,
                custom_cover_letter,
                ats_optimized: ats,
                ..Quality::default()
            };
            if let Some(name) = resume {
                let version = store
                    .find_resume_version(&name)?
                    .ok_or_else(|| anyhow!("Resume version '{}' not found", name))?;
                app.resume_version = Some(version.id);
            }
            if let Some(path) = jd_file {
                app.job_description = Some(JobDescription {
                    content: read_text(&path)?,
                    saved_date: Some(now.to_rfc3339()),
                    source: Some(path.display().to_string()),
                });
            }
            if follow_up.is_some() {
                app.next_follow_up_date = Some(date_arg(follow_up, now)?);
            }

            let id = store.add_application(app)?;
            info!(%id, "application added");
            println!("Added application {} ({} - {})", short_id(&id), company.trim(), title.trim());
        }

        Commands::List {
            status,
            region,
            search,
            company,
        } => {
            let filter = ApplicationFilter {
                statuses: status.iter().map(|s| parse_status(s)).collect::<Result<_>>()?,
                regions: region,
                search,
            };
            let apps = store.load_applications()?;
            let apps: Vec<&Application> = match &company {
                Some(name) => applications_for_company(&apps, name),
                None => apps.iter().collect(),
            };
            let apps: Vec<&Application> = apps.into_iter().filter(|a| filter.matches(a)).collect();
            if apps.is_empty() {
                println!("No applications found.");
            } else {
                println!(
                    "{:<9} {:<13} {:<22} {:<28} {:<12} {:>5}",
                    "ID", "STATUS", "COMPANY", "TITLE", "APPLIED", "DAYS"
                );
                println!("{}", "-".repeat(92));
                for app in apps {
                    let age = app
                        .date_applied
                        .as_deref()
                        .and_then(|d| days_ago(d, now))
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<9} {:<13} {:<22} {:<28} {:<12} {:>5}",
                        short_id(&app.id),
                        app.status.as_str(),
                        truncate(&app.company, 20),
                        truncate(&app.title, 26),
                        app.date_applied.as_deref().unwrap_or("-"),
                        age
                    );
                }
            }
        }

        Commands::Show { id } => match store.get_application(&id)? {
            Some(app) => print_application(&store, &app)?,
            None => println!("Application '{}' not found.", id),
        },

        Commands::Delete { id } => {
            let removed = store.delete_application(&id)?;
            println!("Deleted {} - {}", removed.company, removed.title);
        }

        Commands::Status {
            id,
            status,
            date,
            notes,
            stage,
            reason,
            feedback,
            learning,
            action,
        } => {
            let status = parse_status(&status)?;
            let date = date_arg(date, now)?;
            let has_details = stage.is_some()
                || reason.is_some()
                || feedback.is_some()
                || !learning.is_empty()
                || !action.is_empty();
            let rejection = if status == Status::Rejected && has_details {
                note_unlisted("rejection stage", stage.as_deref(), &REJECTION_STAGES);
                note_unlisted("rejection reason", reason.as_deref(), &REJECTION_REASONS);
                Some(Rejection {
                    stage,
                    reason,
                    feedback_verbatim: feedback,
                    learnings: learning,
                    action_items: action,
                })
            } else {
                if has_details {
                    println!("Note: rejection details are only kept for Rejected applications.");
                }
                None
            };
            let updated = store.update_application(&id, |app| {
                app.update_status(status, &date, notes, rejection);
            })?;
            println!("{} - {} is now {}", updated.company, updated.title, updated.status);
            if updated.status == Status::Rejected && updated.rejection.is_none() {
                println!("Tip: add --stage/--reason/--learning to learn from this rejection.");
            }
        }

        Commands::FollowUp { id, date, notes } => {
            let due = if date.eq_ignore_ascii_case("clear") {
                None
            } else {
                Some(date_arg(Some(date), now)?)
            };
            let updated = store.update_application(&id, |app| {
                app.next_follow_up_date = due;
                if notes.is_some() {
                    app.follow_up_notes = notes;
                }
            })?;
            match &updated.next_follow_up_date {
                Some(d) => println!("Follow up with {} on {}", updated.company, format_date(Some(d))),
                None => println!("Cleared follow-up for {}", updated.company),
            }
        }

        Commands::Quality {
            id,
            custom_resume,
            custom_cover_letter,
            ats,
            resume_file,
            cover_letter_file,
        } => {
            let updated = store.update_application(&id, |app| {
                let q = &mut app.quality;
                if let Some(v) = custom_resume {
                    q.custom_resume = v;
                }
                if let Some(v) = custom_cover_letter {
                    q.custom_cover_letter = v;
                }
                if let Some(v) = ats {
                    q.ats_optimized = v;
                }
                if resume_file.is_some() {
                    q.resume_file_name = resume_file;
                }
                if cover_letter_file.is_some() {
                    q.cover_letter_file_name = cover_letter_file;
                }
            })?;
            let q = &updated.quality;
            println!(
                "{}: custom resume {}, custom cover letter {}, ATS optimized {}",
                updated.company, q.custom_resume, q.custom_cover_letter, q.ats_optimized
            );
        }

        Commands::Resume { command } => match command {
            ResumeCommands::Add {
                name,
                file,
                description,
                roles,
            } => {
                let content = file.as_deref().map(read_text).transpose()?;
                let version = ResumeVersion {
                    id: models::new_id(),
                    name: name.trim().to_string(),
                    description,
                    target_roles: roles,
                    content,
                    file_name: file.map(|f| f.display().to_string()),
                    created_at: Some(now.to_rfc3339()),
                };
                store.add_resume_version(version)?;
                println!("Added resume version '{}'", name.trim());
            }

            ResumeCommands::List => {
                let apps = store.load_applications()?;
                let resumes = store.load_resume_versions()?;
                if resumes.is_empty() {
                    println!("No resume versions found.");
                } else {
                    let performance = analytics::resume_performance(&apps, &resumes);
                    println!("{:<24} {:>6} {:>9}  {:<30}", "NAME", "USED", "RESPONSE", "TARGET ROLES");
                    println!("{}", "-".repeat(72));
                    for resume in &resumes {
                        let stats = performance.versions.iter().find(|v| v.name == resume.name);
                        println!(
                            "{:<24} {:>6} {:>9}  {:<30}",
                            truncate(&resume.name, 22),
                            stats.map(|v| v.times_used).unwrap_or(0),
                            stats
                                .map(|v| format!("{}%", v.response_rate))
                                .unwrap_or_else(|| "-".to_string()),
                            truncate(resume.target_roles.as_deref().unwrap_or(""), 28)
                        );
                    }
                    if let Some(best) = &performance.best {
                        println!("\nBest performing: {}", best);
                    }
                }
            }
        },

        Commands::Company { command } => match command {
            CompanyCommands::Add {
                name,
                category,
                priority,
                status,
                careers_url,
                notes,
            } => {
                if !(1..=5).contains(&priority) {
                    return Err(anyhow!("Priority must be between 1 and 5"));
                }
                note_unlisted("company type", category.as_deref(), &COMPANY_TYPE_OPTIONS);
                note_unlisted("company status", status.as_deref(), &COMPANY_STATUS_OPTIONS);
                let mut company = TargetCompany::new(&name);
                company.category = category;
                company.priority = priority;
                if let Some(status) = status {
                    company.status = status;
                }
                company.careers_url = careers_url;
                company.notes = notes;
                store.add_target_company(company)?;
                println!("Added target company '{}'", name.trim());
            }

            CompanyCommands::List => {
                let mut companies = store.load_target_companies()?;
                if companies.is_empty() {
                    println!("No target companies found.");
                } else {
                    let apps = store.load_applications()?;
                    companies.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
                    println!("{:<4} {:<26} {:<18} {:<14} {:>5}", "PRI", "NAME", "CATEGORY", "STATUS", "APPS");
                    println!("{}", "-".repeat(71));
                    for c in companies {
                        println!(
                            "{:<4} {:<26} {:<18} {:<14} {:>5}",
                            c.priority,
                            truncate(&c.name, 24),
                            truncate(c.category.as_deref().unwrap_or("-"), 16),
                            truncate(&c.status, 12),
                            applications_for_company(&apps, &c.name).len()
                        );
                    }
                }
            }

            CompanyCommands::Show { name } => match store.find_target_company(&name)? {
                Some(c) => {
                    println!("{}", c.name);
                    println!("Priority: {}", c.priority);
                    println!("Status: {}", c.status);
                    if let Some(category) = &c.category {
                        println!("Category: {}", category);
                    }
                    if let Some(url) = &c.careers_url {
                        println!("Careers: {}", url);
                    }
                    if let Some(notes) = &c.notes {
                        println!("Notes: {}", notes);
                    }
                    if !c.connections.is_empty() {
                        println!("\nConnections:");
                        for contact in &c.connections {
                            println!(
                                "  {} ({}) - {}",
                                contact.name,
                                contact.role.as_deref().unwrap_or("?"),
                                contact.intro_status.as_deref().unwrap_or("Not Asked")
                            );
                        }
                    }
                    let apps = store.load_applications()?;
                    let linked = applications_for_company(&apps, &c.name);
                    if !linked.is_empty() {
                        println!("\nApplications ({}):", linked.len());
                        for app in linked {
                            println!("  {} - {} ({})", short_id(&app.id), app.title, app.status);
                        }
                    }
                }
                None => println!("Target company '{}' not found.", name),
            },

            CompanyCommands::Contact {
                company,
                name,
                role,
                intro_status,
                notes,
            } => {
                note_unlisted("intro status", intro_status.as_deref(), &INTRO_STATUS_OPTIONS);
                let contact = Contact {
                    name: name.trim().to_string(),
                    role,
                    intro_status,
                    notes,
                };
                let updated = store.update_target_company(&company, |c| c.connections.push(contact))?;
                println!("{} now has {} connection(s)", updated.name, updated.connections.len());
            }
        },

        Commands::Dashboard { json } => {
            if json {
                let apps = store.load_applications()?;
                let resumes = store.load_resume_versions()?;
                let dashboard = Dashboard::build(&apps, &resumes, now);
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                tui::run_dashboard(&store, now)?;
            }
        }

        Commands::Browse { status } => {
            let filter = status.as_deref().map(parse_status).transpose()?;
            tui::run_browse(&store, filter, now)?;
        }

        Commands::Analyze {
            id,
            resume,
            resume_file,
            jd_file,
            model,
        } => {
            let app = store
                .get_application(&id)?
                .ok_or_else(|| anyhow!("Application '{}' not found", id))?;

            let job_text = match &jd_file {
                Some(path) => read_text(path)?,
                None => app
                    .job_description
                    .as_ref()
                    .map(|jd| jd.content.clone())
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| anyhow!("No job description saved for this application. Pass --jd-file."))?,
            };

            let resume_text = match (&resume_file, &resume) {
                (Some(path), _) => read_text(path)?,
                (None, Some(name)) => resume_content(&store, name)?,
                (None, None) => {
                    let rid = app
                        .resume_version_id()
                        .ok_or_else(|| anyhow!("No resume chosen. Pass --resume or --resume-file."))?;
                    resume_content(&store, rid)?
                }
            };

            let provider = provider_for(&store, model)?;
            println!("Analyzing fit with {}...", provider.model_name());
            let analysis = ai::analyze_qualifications(provider.as_ref(), &resume_text, &job_text, now)?;

            store.update_application(&app.id, |a| {
                a.ai_analysis = Some(analysis.clone());
                if let Some(path) = &jd_file {
                    a.job_description = Some(JobDescription {
                        content: job_text.clone(),
                        saved_date: Some(now.to_rfc3339()),
                        source: Some(path.display().to_string()),
                    });
                }
            })?;

            println!("\n{}: {:.0}/100 ({})", app.company, analysis.fit_score, analysis.fit_tier);
            if let (Some(met), Some(total)) = (analysis.requirements_met, analysis.requirements_total) {
                println!("Requirements met: {}/{}", met, total);
            }
            if !analysis.level_fit.is_empty() || !analysis.lane_fit.is_empty() {
                println!("Level: {}  Lane: {}", analysis.level_fit, analysis.lane_fit);
            }
            if !analysis.summary.is_empty() {
                println!("\n{}", textwrap::fill(&analysis.summary, 90));
            }
            for q in &analysis.qualifications {
                let mark = match q.standing() {
                    models::QualificationStanding::Met => "+",
                    models::QualificationStanding::Partial => "~",
                    models::QualificationStanding::Unmet => "-",
                };
                println!("  {} {}", mark, q.requirement);
            }
            for rec in &analysis.recommendations {
                println!("  > {}", rec);
            }
        }

        Commands::Coach { question, model } => {
            let apps = store.load_applications()?;
            let resumes = store.load_resume_versions()?;
            let dashboard = Dashboard::build(&apps, &resumes, now);
            let data = serde_json::to_string_pretty(&dashboard)?;
            let provider = provider_for(&store, model)?;
            debug!(bytes = data.len(), "sending dashboard for coaching");
            let advice = ai::coach(provider.as_ref(), &data, question.as_deref())?;
            println!("{}", advice.trim());
        }

        Commands::Prep {
            id,
            research,
            question,
            topic,
            output,
        } => {
            let touched = research.is_some() || !question.is_empty() || !topic.is_empty();
            let app = if touched {
                store.update_application(&id, |app| {
                    let prep = app.interview_prep.get_or_insert_with(Default::default);
                    if let Some(r) = research {
                        prep.company_research = r;
                    }
                    prep.questions_to_ask.extend(question);
                    prep.technical_topics.extend(topic);
                    prep.last_updated = Some(now.to_rfc3339());
                })?
            } else {
                store
                    .get_application(&id)?
                    .ok_or_else(|| anyhow!("Application '{}' not found", id))?
            };
            let resume = match app.resume_version_id() {
                Some(rid) => store.find_resume_version(rid)?,
                None => None,
            };
            let sheet = export::interview_prep_sheet(&app, resume.as_ref(), now);
            write_or_print(output, &sheet)?;
        }

        Commands::Export { command } => match command {
            ExportCommands::Csv { output } => {
                let apps = store.load_applications()?;
                let resumes = store.load_resume_versions()?;
                write_or_print(output, &export::applications_csv(&apps, &resumes))?;
            }
            ExportCommands::Companies { output } => {
                let companies = store.load_target_companies()?;
                write_or_print(output, &export::companies_csv(&companies))?;
            }
            ExportCommands::Json { output } => {
                let backup = export::create_backup(&store, now)?;
                let json = serde_json::to_string_pretty(&backup)?;
                let output = output.unwrap_or_else(|| {
                    PathBuf::from(format!("jobtrack_backup_{}.json", today_iso(now)))
                });
                write_or_print(Some(output), &json)?;
            }
        },

        Commands::Import { file } => {
            let backup = export::parse_backup(&read_text(&file)?)?;
            let counts = export::restore_backup(&store, backup)?;
            println!(
                "Restored {} application(s), {} resume version(s), {} target compan(ies)",
                counts.applications, counts.resume_versions, counts.target_companies
            );
        }

        Commands::Report { output } => {
            let apps = store.load_applications()?;
            let stats = export::summary_stats(&apps, now);
            write_or_print(output, &export::summary_report(&apps, &stats))?;
        }

        Commands::Storage { clear: true, yes } => {
            if !yes {
                return Err(anyhow!("This deletes all data. Re-run with --clear --yes (consider 'jobtrack export json' first)."));
            }
            store.clear_all()?;
            println!("All data cleared.");
        }

        Commands::Storage { clear: false, .. } => {
            let usage = store.storage_info()?;
            let total: usize = usage.iter().map(|u| u.bytes).sum();
            println!("{:<20} {:>12}", "KEY", "BYTES");
            println!("{}", "-".repeat(33));
            for u in &usage {
                println!("{:<20} {:>12}", u.key, u.bytes);
            }
            println!("{:<20} {:>12}", "total", total);
            match store.last_backup()? {
                Some(at) => println!("\nLast backup: {}", at.format("%b %-d, %Y %H:%M UTC")),
                None => println!("\nNo backup yet. Run 'jobtrack export json'."),
            }
        }

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                println!("Data file: {}", config.db_path.display());
                println!("Log level: {}", config.log_level);
                println!("Model: {}", LlmSettings::load(&store)?.model);
                println!("Ollama host: {}", ai::ollama_host(std::env::var("OLLAMA_HOST").ok()));
            }
            ConfigCommands::SetModel { model } => {
                let settings = LlmSettings::set_model(&store, &model)?;
                println!("Model set to {}", settings.model);
            }
        },
    }

    Ok(())
}

fn resume_content(store: &Store, name_or_id: &str) -> Result<String> {
    let version = store
        .find_resume_version(name_or_id)?
        .ok_or_else(|| anyhow!("Resume version '{}' not found", name_or_id))?;
    version
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| anyhow!("Resume version '{}' has no saved text. Pass --resume-file.", version.name))
}

fn print_application(store: &Store, app: &Application) -> Result<()> {
    println!("{} - {}", app.company, app.title);
    println!("ID: {}", app.id);
    println!("Status: {}", app.status);
    println!("Applied: {}", format_date(app.date_applied.as_deref()));
    for (label, value) in [
        ("Location", &app.location),
        ("Region", &app.region),
        ("Company type", &app.company_type),
        ("Salary", &app.salary),
        ("URL", &app.job_url),
        ("Requisition", &app.requisition_id),
        ("Source", &app.application_source),
        ("Referral", &app.referral),
    ] {
        if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
            println!("{}: {}", label, v);
        }
    }
    if !app.modality.is_empty() {
        println!("Modality: {}", app.modality.join(", "));
    }
    if let Some(rid) = app.resume_version_id() {
        let name = store.find_resume_version(rid)?.map(|r| r.name).unwrap_or_else(|| rid.to_string());
        println!("Resume: {}", name);
    }
    if !app.tags.is_empty() {
        println!("Tags: {}", app.tags.join(", "));
    }
    if let Some(due) = &app.next_follow_up_date {
        println!("Next follow-up: {}", format_date(Some(due)));
    }

    println!("\nHistory:");
    for entry in &app.status_history {
        match &entry.notes {
            Some(notes) => println!("  {}  {} - {}", format_date(Some(&entry.date)), entry.status, notes),
            None => println!("  {}  {}", format_date(Some(&entry.date)), entry.status),
        }
    }

    if let Some(r) = &app.rejection {
        println!("\nRejection:");
        if let Some(stage) = &r.stage {
            println!("  Stage: {}", stage);
        }
        if let Some(reason) = &r.reason {
            println!("  Reason: {}", reason);
        }
        if let Some(feedback) = &r.feedback_verbatim {
            println!("  Feedback: \"{}\"", feedback);
        }
        for l in &r.learnings {
            println!("  Learning: {}", l);
        }
        for a in &r.action_items {
            println!("  Action: {}", a);
        }
    }

    if let Some(analysis) = &app.ai_analysis {
        println!("\nAI fit: {:.0}/100 ({})", analysis.fit_score, analysis.fit_tier);
        if let Some(at) = analysis.analyzed_at {
            println!("  analyzed {}", at.format("%b %-d, %Y"));
        }
    }
    if let Some(notes) = &app.interview_notes {
        println!("\n--- Notes ---\n{}", notes);
    }
    Ok(())
}
