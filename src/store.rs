use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::models::{Application, InterviewPrep, ResumeVersion, TargetCompany};

pub const KEY_APPLICATIONS: &str = "applications";
pub const KEY_RESUME_VERSIONS: &str = "resume_versions";
pub const KEY_TARGET_COMPANIES: &str = "target_companies";
pub const KEY_LLM_SETTINGS: &str = "llm_settings";
pub const KEY_LAST_BACKUP: &str = "last_backup";

pub const ALL_KEYS: [&str; 5] = [
    KEY_APPLICATIONS,
    KEY_RESUME_VERSIONS,
    KEY_TARGET_COMPANIES,
    KEY_LLM_SETTINGS,
    KEY_LAST_BACKUP,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyUsage {
    pub key: String,
    pub bytes: usize,
}

/// Key/value store of JSON blobs, one blob per record collection.
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        debug!(path = %path.display(), "opened store");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn, path: None };
        store.init()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='kv'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!("Store not initialized. Run 'jobtrack init' first."));
        }
        Ok(())
    }

    // --- Raw key/value access ---

    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .with_context(|| format!("Failed to read key '{}'", key))
    }

    fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    /// Loads and decodes a blob. A blob that no longer parses is copied to
    /// `<key>.unreadable`, logged and treated as missing, so the next save
    /// under `key` cannot destroy the only copy.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_raw(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                let aside = unreadable_key(key);
                self.put_raw(&aside, &raw)?;
                warn!(key, kept_as = %aside, error = %e, "stored value unreadable, using default");
                Ok(None)
            }
        }
    }

    /// Raw text set aside by `load` when `key` last failed to decode.
    pub fn unreadable_copy(&self, key: &str) -> Result<Option<String>> {
        self.get_raw(&unreadable_key(key))
    }

    pub fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        Ok(self.load(key)?.unwrap_or_default())
    }

    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize value for '{}'", key))?;
        self.put_raw(key, &raw)?;
        debug!(key, bytes = raw.len(), "saved");
        Ok(())
    }

    pub fn clear(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }

    pub fn clear_all(&self) -> Result<()> {
        for key in ALL_KEYS {
            self.clear(key)?;
            self.clear(&unreadable_key(key))?;
        }
        Ok(())
    }

    pub fn storage_info(&self) -> Result<Vec<KeyUsage>> {
        ALL_KEYS
            .iter()
            .map(|key| {
                let bytes = self.get_raw(key)?.map(|v| v.len()).unwrap_or(0);
                Ok(KeyUsage {
                    key: key.to_string(),
                    bytes,
                })
            })
            .collect()
    }

    pub fn last_backup(&self) -> Result<Option<DateTime<Utc>>> {
        self.load(KEY_LAST_BACKUP)
    }

    pub fn mark_backup(&self, now: DateTime<Utc>) -> Result<()> {
        self.save(KEY_LAST_BACKUP, &now)
    }

    // --- Collections ---

    pub fn load_applications(&self) -> Result<Vec<Application>> {
        let apps: Vec<Application> = self.load_or_default(KEY_APPLICATIONS)?;
        Ok(migrate(apps))
    }

    pub fn save_applications(&self, apps: &[Application]) -> Result<()> {
        self.save(KEY_APPLICATIONS, apps)
    }

    pub fn load_resume_versions(&self) -> Result<Vec<ResumeVersion>> {
        self.load_or_default(KEY_RESUME_VERSIONS)
    }

    pub fn save_resume_versions(&self, versions: &[ResumeVersion]) -> Result<()> {
        self.save(KEY_RESUME_VERSIONS, versions)
    }

    pub fn load_target_companies(&self) -> Result<Vec<TargetCompany>> {
        self.load_or_default(KEY_TARGET_COMPANIES)
    }

    pub fn save_target_companies(&self, companies: &[TargetCompany]) -> Result<()> {
        self.save(KEY_TARGET_COMPANIES, companies)
    }

    // --- Application operations ---

    pub fn add_application(&self, app: Application) -> Result<String> {
        let mut apps = self.load_applications()?;
        let id = app.id.clone();
        apps.push(app);
        self.save_applications(&apps)?;
        Ok(id)
    }

    /// Looks up by full id or by a unique id prefix.
    pub fn get_application(&self, id: &str) -> Result<Option<Application>> {
        let apps = self.load_applications()?;
        Ok(resolve_id(&apps, id)?.map(|idx| apps[idx].clone()))
    }

    pub fn update_application<F>(&self, id: &str, change: F) -> Result<Application>
    where
        F: FnOnce(&mut Application),
    {
        let mut apps = self.load_applications()?;
        let idx = resolve_id(&apps, id)?.ok_or_else(|| anyhow!("Application '{}' not found", id))?;
        change(&mut apps[idx]);
        let updated = apps[idx].clone();
        self.save_applications(&apps)?;
        Ok(updated)
    }

    pub fn delete_application(&self, id: &str) -> Result<Application> {
        let mut apps = self.load_applications()?;
        let idx = resolve_id(&apps, id)?.ok_or_else(|| anyhow!("Application '{}' not found", id))?;
        let removed = apps.remove(idx);
        self.save_applications(&apps)?;
        Ok(removed)
    }

    // --- Resume versions ---

    pub fn add_resume_version(&self, version: ResumeVersion) -> Result<String> {
        let mut versions = self.load_resume_versions()?;
        if versions
            .iter()
            .any(|v| v.name.eq_ignore_ascii_case(&version.name))
        {
            return Err(anyhow!("Resume version '{}' already exists", version.name));
        }
        let id = version.id.clone();
        versions.push(version);
        self.save_resume_versions(&versions)?;
        Ok(id)
    }

    /// Finds a resume version by id or case-insensitive name.
    pub fn find_resume_version(&self, name_or_id: &str) -> Result<Option<ResumeVersion>> {
        Ok(self
            .load_resume_versions()?
            .into_iter()
            .find(|v| v.id == name_or_id || v.name.eq_ignore_ascii_case(name_or_id)))
    }

    // --- Target companies ---

    pub fn add_target_company(&self, company: TargetCompany) -> Result<String> {
        let mut companies = self.load_target_companies()?;
        if companies
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&company.name))
        {
            return Err(anyhow!("Target company '{}' already exists", company.name));
        }
        let id = company.id.clone();
        companies.push(company);
        self.save_target_companies(&companies)?;
        Ok(id)
    }

    pub fn find_target_company(&self, name: &str) -> Result<Option<TargetCompany>> {
        Ok(self
            .load_target_companies()?
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim())))
    }

    pub fn update_target_company<F>(&self, name: &str, change: F) -> Result<TargetCompany>
    where
        F: FnOnce(&mut TargetCompany),
    {
        let mut companies = self.load_target_companies()?;
        let company = companies
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| anyhow!("Target company '{}' not found", name))?;
        change(company);
        let updated = company.clone();
        self.save_target_companies(&companies)?;
        Ok(updated)
    }
}

/// Fills in fields that older saved records predate.
pub fn migrate(apps: Vec<Application>) -> Vec<Application> {
    apps.into_iter()
        .map(|mut app| {
            if app.interview_prep.is_none() {
                app.interview_prep = Some(InterviewPrep::default());
            }
            app
        })
        .collect()
}

fn unreadable_key(key: &str) -> String {
    format!("{}.unreadable", key)
}

fn resolve_id(apps: &[Application], id: &str) -> Result<Option<usize>> {
    if let Some(idx) = apps.iter().position(|a| a.id == id) {
        return Ok(Some(idx));
    }
    if id.is_empty() {
        return Ok(None);
    }
    let matches: Vec<usize> = apps
        .iter()
        .enumerate()
        .filter(|(_, a)| a.id.starts_with(id))
        .map(|(idx, _)| idx)
        .collect();
    match matches.as_slice() {
        [] => Ok(None),
        [idx] => Ok(Some(*idx)),
        _ => Err(anyhow!("Id prefix '{}' is ambiguous ({} matches)", id, matches.len())),
    }
}
