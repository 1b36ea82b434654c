use anyhow::Result;
use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use tracing::warn;

use crate::analytics::{Dashboard, FollowUpItem};
use crate::dates::{format_date, today_iso};
use crate::models::{Application, ResumeVersion, Status};
use crate::store::Store;

const BAR_WIDTH: usize = 30;

type Term = Terminal<CrosstermBackend<std::io::Stdout>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Browse,
    Dashboard,
}

struct AppState {
    apps: Vec<Application>,
    resumes: Vec<ResumeVersion>,
    visible: Vec<usize>,
    selected: usize,
    scroll_offset: u16,
    view: View,
    message: Option<String>,
}

impl AppState {
    fn new(apps: Vec<Application>, resumes: Vec<ResumeVersion>, filter: Option<&Status>, view: View) -> Self {
        let visible = apps
            .iter()
            .enumerate()
            .filter(|(_, a)| filter.is_none_or(|s| &a.status == s))
            .map(|(i, _)| i)
            .collect();
        Self {
            apps,
            resumes,
            visible,
            selected: 0,
            scroll_offset: 0,
            view,
            message: None,
        }
    }

    fn current(&self) -> Option<&Application> {
        self.visible.get(self.selected).map(|&i| &self.apps[i])
    }

    fn next(&mut self) {
        if self.selected + 1 < self.visible.len() {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    fn toggle_view(&mut self) {
        self.view = match self.view {
            View::Browse => View::Dashboard,
            View::Dashboard => View::Browse,
        };
        self.scroll_offset = 0;
    }

    fn set_status(&mut self, store: &Store, status: Status, now: DateTime<Utc>) {
        let Some(&idx) = self.visible.get(self.selected) else {
            return;
        };
        if self.apps[idx].status == status {
            return;
        }
        let date = today_iso(now);
        let id = self.apps[idx].id.clone();
        let label = status.to_string();
        match store.update_application(&id, |app| app.update_status(status, &date, None, None)) {
            Ok(updated) => {
                self.message = Some(if updated.status == Status::Rejected {
                    format!(
                        "Marked Rejected. Add details with: jobtrack status {} rejected --stage ..",
                        short_id(&id)
                    )
                } else {
                    format!("Marked {}", label)
                });
                self.apps[idx] = updated;
            }
            Err(e) => {
                warn!(error = %e, "status update failed");
                self.message = Some(format!("Update failed: {}", e));
            }
        }
    }
}

/// Single-key status shortcuts used in the browser.
fn status_for_key(c: char) -> Option<Status> {
    match c {
        'a' => Some(Status::Applied),
        'v' => Some(Status::Reviewed),
        'p' => Some(Status::PhoneScreen),
        't' => Some(Status::Technical),
        'o' => Some(Status::Onsite),
        'f' => Some(Status::Offer),
        'x' => Some(Status::Rejected),
        'g' => Some(Status::Ghost),
        'w' => Some(Status::Withdrawn),
        _ => None,
    }
}

fn status_color(status: &Status) -> Color {
    match status {
        Status::Applied => Color::Gray,
        Status::Reviewed => Color::Blue,
        Status::PhoneScreen | Status::Technical | Status::Onsite => Color::Yellow,
        Status::Offer => Color::Green,
        Status::Rejected => Color::Red,
        Status::Ghost | Status::Withdrawn | Status::Other(_) => Color::DarkGray,
    }
}

fn with_terminal<F>(body: F) -> Result<()>
where
    F: FnOnce(&mut Term) -> Result<()>,
{
    enable_raw_mode()?;
    let result = stdout()
        .execute(EnterAlternateScreen)
        .map_err(anyhow::Error::from)
        .and_then(|_| Terminal::new(CrosstermBackend::new(stdout())).map_err(anyhow::Error::from))
        .and_then(|mut terminal| body(&mut terminal));
    // Both teardown steps run even if the first fails.
    let raw = disable_raw_mode().map_err(anyhow::Error::from);
    let screen = stdout()
        .execute(LeaveAlternateScreen)
        .map(|_| ())
        .map_err(anyhow::Error::from);
    first_error([result, raw, screen])
}

fn first_error(steps: impl IntoIterator<Item = Result<()>>) -> Result<()> {
    for step in steps {
        step?;
    }
    Ok(())
}

pub fn run_dashboard(store: &Store, now: DateTime<Utc>) -> Result<()> {
    let apps = store.load_applications()?;
    let resumes = store.load_resume_versions()?;
    let mut state = AppState::new(apps, resumes, None, View::Dashboard);
    with_terminal(|terminal| run_loop(terminal, &mut state, store, now, false))
}

pub fn run_browse(store: &Store, status_filter: Option<Status>, now: DateTime<Utc>) -> Result<()> {
    let apps = store.load_applications()?;
    let resumes = store.load_resume_versions()?;
    let mut state = AppState::new(apps, resumes, status_filter.as_ref(), View::Browse);
    if state.visible.is_empty() {
        println!("No applications found.");
        return Ok(());
    }
    with_terminal(|terminal| run_loop(terminal, &mut state, store, now, true))
}

fn run_loop(
    terminal: &mut Term,
    state: &mut AppState,
    store: &Store,
    now: DateTime<Utc>,
    editable: bool,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        let dashboard = Dashboard::build(&state.apps, &state.resumes, now);
        terminal.draw(|frame| draw(frame, state, &dashboard, &mut list_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            state.message = None;
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Tab if editable => state.toggle_view(),
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                KeyCode::Char(c) if editable && state.view == View::Browse => {
                    if let Some(status) = status_for_key(c) {
                        state.set_status(store, status, now);
                    }
                }
                _ => {}
            }
            list_state.select(Some(state.selected));
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &AppState, dashboard: &Dashboard, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    match state.view {
        View::Dashboard => {
            let body = Paragraph::new(Text::from(dashboard_lines(dashboard)))
                .block(Block::default().borders(Borders::ALL).title(" Dashboard "))
                .wrap(Wrap { trim: false })
                .scroll((state.scroll_offset, 0));
            frame.render_widget(body, rows[0]);
        }
        View::Browse => draw_browse(frame, rows[0], state, list_state),
    }

    let footer = match (&state.message, state.view) {
        (Some(msg), _) => msg.clone(),
        (None, View::Browse) => {
            " j/k:move J/K:scroll  a:applied v:reviewed p:phone t:tech o:onsite f:offer x:reject g:ghost w:withdrawn  Tab:dashboard q:quit".to_string()
        }
        (None, View::Dashboard) => " J/K:scroll  Tab:applications  q:quit".to_string(),
    };
    frame.render_widget(
        Paragraph::new(footer).style(Style::default().fg(Color::DarkGray)),
        rows[1],
    );
}

fn draw_browse(frame: &mut Frame, area: Rect, state: &AppState, list_state: &mut ListState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let items: Vec<ListItem> = state
        .visible
        .iter()
        .map(|&i| {
            let app = &state.apps[i];
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<13}", app.status.as_str()),
                    Style::default().fg(status_color(&app.status)),
                ),
                Span::raw(format!("{} | {}", truncate(&app.company, 20), truncate(&app.title, 28))),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Applications ({}) ", state.visible.len())),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, cols[0], list_state);

    let detail = Paragraph::new(Text::from(detail_lines(state)))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));
    frame.render_widget(detail, cols[1]);
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// First eight characters of an id, for display.
pub fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(i, _)| &id[..i])
}

fn heading(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default().add_modifier(Modifier::BOLD),
    ))
}

fn detail_lines(state: &AppState) -> Vec<Line<'static>> {
    let Some(app) = state.current() else {
        return vec![Line::from("No application selected")];
    };
    let mut lines = vec![
        heading(&app.title),
        Line::from(format!("at {}", app.company)),
        Line::from(Span::styled(
            format!("Status: {}", app.status),
            Style::default().fg(status_color(&app.status)),
        )),
        Line::from(format!("Applied: {}", format_date(app.date_applied.as_deref()))),
    ];
    for (label, value) in [
        ("Location", &app.location),
        ("Region", &app.region),
        ("Type", &app.company_type),
        ("Salary", &app.salary),
        ("URL", &app.job_url),
        ("Next follow-up", &app.next_follow_up_date),
    ] {
        if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
            lines.push(Line::from(format!("{}: {}", label, v)));
        }
    }
    if let Some(resume_id) = app.resume_version_id() {
        let name = state
            .resumes
            .iter()
            .find(|r| r.id == resume_id)
            .map(|r| r.name.as_str())
            .unwrap_or(resume_id);
        lines.push(Line::from(format!("Resume: {}", name)));
    }
    let q = &app.quality;
    lines.push(Line::from(format!(
        "Quality: resume {} | cover letter {} | ATS {}",
        check(q.custom_resume),
        check(q.custom_cover_letter),
        check(q.ats_optimized)
    )));

    lines.push(Line::from(""));
    lines.push(heading("History"));
    for entry in app.status_history.iter().rev() {
        let notes = entry.notes.as_deref().map(|n| format!(" - {}", n)).unwrap_or_default();
        lines.push(Line::from(format!(
            "  {}  {}{}",
            format_date(Some(&entry.date)),
            entry.status,
            notes
        )));
    }

    if let Some(rejection) = &app.rejection {
        lines.push(Line::from(""));
        lines.push(heading("Rejection"));
        if let Some(stage) = &rejection.stage {
            lines.push(Line::from(format!("  Stage: {}", stage)));
        }
        if let Some(reason) = &rejection.reason {
            lines.push(Line::from(format!("  Reason: {}", reason)));
        }
        if let Some(feedback) = &rejection.feedback_verbatim {
            lines.push(Line::from(format!("  Feedback: \"{}\"", feedback)));
        }
        for learning in &rejection.learnings {
            lines.push(Line::from(format!("  * {}", learning)));
        }
    } else if app.status == Status::Rejected {
        lines.push(Line::from(Span::styled(
            "Rejection not documented yet",
            Style::default().fg(Color::Red),
        )));
    }

    if let Some(ai) = &app.ai_analysis {
        lines.push(Line::from(""));
        lines.push(heading(&format!("AI Fit: {:.0}/100 ({})", ai.fit_score, ai.fit_tier)));
        if !ai.summary.is_empty() {
            for line in textwrap::fill(&ai.summary, 70).lines() {
                lines.push(Line::from(format!("  {}", line)));
            }
        }
        for gap in &ai.gaps {
            lines.push(Line::from(format!("  - gap: {}", gap)));
        }
    }

    if let Some(notes) = app.interview_notes.as_deref().filter(|n| !n.is_empty()) {
        lines.push(Line::from(""));
        lines.push(heading("Notes"));
        for line in textwrap::fill(notes, 70).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
    }
    lines
}

fn check(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn bar(count: usize, max: usize, width: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let filled = (count * width).div_ceil(max).min(width);
    "#".repeat(filled)
}

fn follow_up_line(item: &FollowUpItem) -> Line<'static> {
    let when = match item.days_until_due {
        d if d < 0 => format!("{} days overdue", -d),
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        d => format!("in {} days", d),
    };
    Line::from(format!("  {} - {} ({})", item.company, item.title, when))
}

fn dashboard_lines(d: &Dashboard) -> Vec<Line<'static>> {
    let m = &d.metrics;
    let mut lines = vec![
        heading("Key Metrics"),
        Line::from(format!(
            "  Total {}   Active {}   Response rate {}%   Avg days to response {}",
            m.total, m.active, m.response_rate, m.avg_days_to_response
        )),
        Line::from(format!(
            "  Interviews this week {}   Phone screens {}   Onsites {}   Ghosted {}",
            m.interviews_this_week, m.phone_screens, m.onsite_interviews, m.ghosted
        )),
        Line::from(""),
        heading("Funnel"),
    ];
    let funnel_max = d.funnel.first().map(|s| s.count).unwrap_or(0);
    for stage in &d.funnel {
        lines.push(Line::from(format!(
            "  {:<13}{:>4} {}",
            stage.name,
            stage.count,
            bar(stage.count, funnel_max, BAR_WIDTH)
        )));
    }

    lines.push(Line::from(""));
    lines.push(heading("Weekly Trend (applications / responses)"));
    let trend_max = d.weekly_trend.iter().map(|w| w.applications).max().unwrap_or(0);
    for week in &d.weekly_trend {
        lines.push(Line::from(format!(
            "  {:<8}{:>3} / {:<3} {}",
            week.week,
            week.applications,
            week.responses,
            bar(week.applications, trend_max, BAR_WIDTH)
        )));
    }

    lines.push(Line::from(""));
    lines.push(heading("Follow-ups"));
    let f = &d.follow_ups;
    if f.is_empty() {
        lines.push(Line::from("  Nothing scheduled in the next week"));
    }
    for (label, items, color) in [
        ("Overdue", &f.overdue, Color::Red),
        ("Due today", &f.due_today, Color::Yellow),
        ("Upcoming", &f.upcoming, Color::Cyan),
    ] {
        if items.is_empty() {
            continue;
        }
        lines.push(Line::from(Span::styled(
            format!(" {} ({})", label, items.len()),
            Style::default().fg(color),
        )));
        lines.extend(items.iter().map(follow_up_line));
    }
    if !d.needs_follow_up.is_empty() {
        lines.push(Line::from(format!(
            " No contact in 7+ days: {}",
            d.needs_follow_up
                .iter()
                .map(|a| a.company.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    lines.push(Line::from(""));
    lines.push(heading("Application Quality"));
    let q = &d.quality;
    lines.push(Line::from(format!(
        "  Customized {} ({}% response)   Quick apply {} ({}% response)",
        q.customized_count, q.customized_response_rate, q.quick_apply_count, q.quick_apply_response_rate
    )));
    if let Some(callout) = &q.callout {
        lines.push(Line::from(Span::styled(
            format!("  {}", callout),
            Style::default().fg(Color::Green),
        )));
    }

    let r = &d.rejections;
    lines.push(Line::from(""));
    lines.push(heading(&format!(
        "Rejections ({} total, {} documented)",
        r.rejected, r.documented
    )));
    if r.undocumented > 0 {
        lines.push(Line::from(Span::styled(
            format!("  {} rejection(s) still need details", r.undocumented),
            Style::default().fg(Color::Yellow),
        )));
    }
    for (title, counts) in [("By stage", &r.by_stage), ("By reason", &r.by_reason)] {
        if counts.is_empty() {
            continue;
        }
        lines.push(Line::from(format!(" {}", title)));
        for c in counts {
            lines.push(Line::from(format!("  {:<22}{:>3}", c.name, c.count)));
        }
    }
    if !r.top_learnings.is_empty() {
        lines.push(Line::from(" Top learnings"));
        for l in &r.top_learnings {
            lines.push(Line::from(format!("  {}x {}", l.count, l.example)));
        }
    }

    if !d.regions.is_empty() {
        lines.push(Line::from(""));
        lines.push(heading("Regions"));
        for region in &d.regions {
            lines.push(Line::from(format!(
                "  {:<18}{:>3} apps {:>4}% response",
                region.name, region.total, region.response_rate
            )));
        }
    }
    if !d.resumes.versions.is_empty() {
        lines.push(Line::from(""));
        lines.push(heading("Resume Versions"));
        for v in &d.resumes.versions {
            lines.push(Line::from(format!(
                "  {:<24}{:>3} uses {:>4}% response",
                v.name, v.times_used, v.response_rate
            )));
        }
    }
    lines
}
