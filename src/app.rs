use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::model::config::AppConfig;
use crate::model::section::{Section, parse_sections};
use crate::model::snippet::{DEFAULT_FOLDER, Snippet, find_snippet, folder_names};
use crate::model::store::SnippetStore;
use crate::msg::Msg;
use crate::render::render_section;

/// How long the "Copied" banner stays up before auto-reverting.
const COPY_FEEDBACK: Duration = Duration::from_secs(1);

/// The three focus regions, in cycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Snippets,
    Sections,
    Content,
}

impl Pane {
    /// Forward cycle; a hidden snippet pane is skipped over.
    pub fn next(self, hide_snippets: bool) -> Self {
        let next = match self {
            Pane::Snippets => Pane::Sections,
            Pane::Sections => Pane::Content,
            Pane::Content => Pane::Snippets,
        };
        if hide_snippets && next == Pane::Snippets {
            Pane::Sections
        } else {
            next
        }
    }

    /// Backward cycle; a hidden snippet pane is skipped over.
    pub fn prev(self, hide_snippets: bool) -> Self {
        let prev = match self {
            Pane::Snippets => Pane::Content,
            Pane::Sections => Pane::Snippets,
            Pane::Content => Pane::Sections,
        };
        if hide_snippets && prev == Pane::Snippets {
            Pane::Content
        } else {
            prev
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Navigating,
    Copying,
    Quitting,
    Editing,
}

/// In-list fuzzy filter. While `entering`, every action key is guarded off
/// except the dismissal keys.
struct Filter {
    pane: Pane,
    query: String,
    entering: bool,
}

pub struct App {
    pub config: AppConfig,
    store: SnippetStore,
    folders: Vec<String>,
    active_folder: usize,
    snippets_by_folder: HashMap<String, Vec<Snippet>>,
    pane: Pane,
    state: AppState,
    hide_snippet_pane: bool,
    help_expanded: bool,
    snippet_sel: usize,
    section_sel: usize,
    content_scroll: u16,
    filter: Option<Filter>,
    // Sections are arena'd by snippet path string, never by snippet value.
    sections_cache: HashMap<String, Vec<Section>>,
    content_cache: HashMap<(String, usize), Text<'static>>,
    copy_revert_at: Option<Instant>,
    pending_edit: Option<PathBuf>,
    section_before_edit: usize,
    pub should_quit: bool,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let store = SnippetStore::new(config.home_path(), &config.general.index_file);
        store.ensure_seeded()?;

        let mut snippets = store.load();
        match store.reconcile(&mut snippets) {
            Ok(true) => {
                if let Err(err) = store.save(&snippets) {
                    tracing::warn!("could not persist reconciled index: {err}");
                }
            }
            Ok(false) => {}
            Err(err) => tracing::warn!("snippet scan failed, keeping loaded index: {err}"),
        }

        let mut folders = folder_names(&snippets);
        if folders.is_empty() {
            folders.push(DEFAULT_FOLDER.to_string());
        }

        let active_folder = folders
            .iter()
            .position(|f| *f == config.general.folder)
            .unwrap_or(0);

        let mut snippets_by_folder: HashMap<String, Vec<Snippet>> = HashMap::new();
        for snippet in snippets {
            snippets_by_folder
                .entry(snippet.folder.clone())
                .or_default()
                .push(snippet);
        }

        let pane = match config.general.default_pane.as_str() {
            "snippet" => Pane::Snippets,
            "content" => Pane::Content,
            _ => Pane::Sections,
        };

        Ok(Self {
            config,
            store,
            folders,
            active_folder,
            snippets_by_folder,
            pane,
            state: AppState::Navigating,
            hide_snippet_pane: false,
            help_expanded: false,
            snippet_sel: 0,
            section_sel: 0,
            content_scroll: 0,
            filter: None,
            sections_cache: HashMap::new(),
            content_cache: HashMap::new(),
            copy_revert_at: None,
            pending_edit: None,
            section_before_edit: 0,
            should_quit: false,
        })
    }

    /// Jump straight to the best fuzzy match for `query` and collapse to
    /// 2-pane mode, unless configured otherwise. No match leaves the app in
    /// its default state.
    pub fn open_query(&mut self, query: &str) {
        let all = self.all_snippets();
        let Some(found) = find_snippet(query, &all).cloned() else {
            return;
        };

        if let Some(folder_idx) = self.folders.iter().position(|f| *f == found.folder) {
            self.active_folder = folder_idx;
        }
        if let Some(idx) = self
            .active_list()
            .iter()
            .position(|s| s.file == found.file)
        {
            self.snippet_sel = idx;
            self.section_sel = 0;
            if !self.config.general.always_show_snippet_pane {
                self.hide_snippet_pane = true;
            }
        }
    }

    /// Every snippet in folder order, per-folder order preserved. This is
    /// the order flushed back to the index on exit.
    pub fn all_snippets(&self) -> Vec<Snippet> {
        self.folders
            .iter()
            .flat_map(|folder| {
                self.snippets_by_folder
                    .get(folder)
                    .cloned()
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Dump the whole collection back to the index file; failures are logged
    /// and otherwise swallowed since the session is ending anyway.
    pub fn flush_index(&self) {
        if let Err(err) = self.store.save(&self.all_snippets()) {
            tracing::warn!("could not persist snippet index: {err}");
        }
    }

    /// Edit path handed to the event loop, which owns the terminal
    /// suspend/resume boundary around the blocking editor.
    pub fn take_pending_edit(&mut self) -> Option<PathBuf> {
        self.pending_edit.take()
    }

    // ── Update ───────────────────────────────────────────────────

    pub fn update(&mut self, msg: Msg) {
        match msg {
            Msg::Key(key) => self.handle_key(key),
            Msg::Tick => self.handle_tick(),
            Msg::Resize(_, _) => {}
            Msg::EditorDone => self.finish_edit(),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        // Any further input dismisses the copied banner early; the key is
        // consumed as a state reset only.
        if self.state == AppState::Copying {
            self.state = AppState::Navigating;
            self.copy_revert_at = None;
            return;
        }

        if self.filter.as_ref().is_some_and(|f| f.entering) {
            self.handle_filter_key(key);
            return;
        }

        if key.code == KeyCode::Char('q')
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
        {
            self.state = AppState::Quitting;
            self.should_quit = true;
            return;
        }

        if self.matches(&self.config.keys.next_pane, key) {
            self.pane = self.pane.next(self.hide_snippet_pane);
            return;
        }
        if self.matches(&self.config.keys.prev_pane, key) {
            self.pane = self.pane.prev(self.hide_snippet_pane);
            return;
        }
        if self.matches(&self.config.keys.toggle_snippet_pane, key) {
            self.hide_snippet_pane = !self.hide_snippet_pane;
            if self.hide_snippet_pane && self.pane == Pane::Snippets {
                self.pane = Pane::Sections;
            }
            return;
        }

        match key.code {
            KeyCode::Char('?') => {
                self.help_expanded = !self.help_expanded;
                return;
            }
            KeyCode::Char('J') => {
                self.move_snippet(1);
                return;
            }
            KeyCode::Char('K') => {
                self.move_snippet(-1);
                return;
            }
            KeyCode::Char('/') => {
                self.begin_filter();
                return;
            }
            KeyCode::Esc if self.filter.is_some() => {
                self.filter = None;
                self.clamp_selection();
                return;
            }
            _ => {}
        }

        if self.matches(&self.config.keys.edit, key) {
            self.begin_edit();
            return;
        }

        if let KeyCode::Char(ch) = key.code {
            let lower = ch.to_ascii_lowercase().to_string();
            if self.config.keys.copy.iter().any(|k| *k == lower) {
                let exit_after = ch.is_ascii_uppercase();
                self.handle_copy(ch, exit_after);
                return;
            }
        }

        self.handle_nav(key);
    }

    fn handle_tick(&mut self) {
        if self.state == AppState::Copying
            && self
                .copy_revert_at
                .is_some_and(|at| Instant::now() >= at)
        {
            self.state = AppState::Navigating;
            self.copy_revert_at = None;
        }
    }

    fn handle_nav(&mut self, key: KeyEvent) {
        let delta: isize = match key.code {
            KeyCode::Char('j') | KeyCode::Down => 1,
            KeyCode::Char('k') | KeyCode::Up => -1,
            _ => return,
        };

        match self.pane {
            Pane::Snippets => self.select_snippet(delta),
            Pane::Sections => self.select_section(delta),
            Pane::Content => {
                self.content_scroll = if delta > 0 {
                    self.content_scroll.saturating_add(1)
                } else {
                    self.content_scroll.saturating_sub(1)
                };
            }
        }
    }

    fn select_snippet(&mut self, delta: isize) {
        let len = self.visible_snippets().len();
        if len == 0 {
            return;
        }
        let next = (self.snippet_sel as isize + delta).clamp(0, len as isize - 1) as usize;
        if next != self.snippet_sel {
            self.snippet_sel = next;
            self.section_sel = 0;
            self.content_scroll = 0;
        }
    }

    fn select_section(&mut self, delta: isize) {
        self.ensure_sections();
        let len = self.visible_sections().len();
        if len == 0 {
            return;
        }
        let next = (self.section_sel as isize + delta).clamp(0, len as isize - 1) as usize;
        if next != self.section_sel {
            self.section_sel = next;
            self.content_scroll = 0;
        }
    }

    /// Swap the selected snippet with its neighbor in the per-folder order,
    /// carrying the cursor along. Out-of-range moves are no-ops, as is any
    /// move while a filter narrows the list.
    fn move_snippet(&mut self, delta: isize) {
        if self.filter_query_for(Pane::Snippets).is_some() {
            return;
        }
        let folder = self.active_folder_name();
        let Some(list) = self.snippets_by_folder.get_mut(&folder) else {
            return;
        };
        let from = self.snippet_sel;
        let to = from as isize + delta;
        if from >= list.len() || to < 0 || to >= list.len() as isize {
            return;
        }
        list.swap(from, to as usize);
        self.snippet_sel = to as usize;
    }

    // ── Filtering ────────────────────────────────────────────────

    fn begin_filter(&mut self) {
        if self.pane == Pane::Content {
            return;
        }
        self.filter = Some(Filter {
            pane: self.pane,
            query: String::new(),
            entering: true,
        });
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.filter = None,
            KeyCode::Enter => {
                // An empty accepted query is the same as no filter.
                if self.filter.as_ref().is_some_and(|f| f.query.is_empty()) {
                    self.filter = None;
                } else if let Some(filter) = self.filter.as_mut() {
                    filter.entering = false;
                }
            }
            KeyCode::Backspace => {
                if let Some(filter) = self.filter.as_mut() {
                    filter.query.pop();
                }
            }
            KeyCode::Char(ch)
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
            {
                if let Some(filter) = self.filter.as_mut() {
                    filter.query.push(ch);
                }
            }
            _ => {}
        }

        self.clamp_selection();
    }

    fn filter_query_for(&self, pane: Pane) -> Option<&str> {
        self.filter
            .as_ref()
            .filter(|f| f.pane == pane && !f.query.is_empty())
            .map(|f| f.query.as_str())
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_snippets().len();
        if len == 0 {
            self.snippet_sel = 0;
        } else if self.snippet_sel >= len {
            self.snippet_sel = len - 1;
        }

        self.ensure_sections();
        let len = self.visible_sections().len();
        if len == 0 {
            self.section_sel = 0;
        } else if self.section_sel >= len {
            self.section_sel = len - 1;
        }
    }

    // ── Selection & caches ───────────────────────────────────────

    fn active_folder_name(&self) -> String {
        self.folders
            .get(self.active_folder)
            .cloned()
            .unwrap_or_else(|| DEFAULT_FOLDER.to_string())
    }

    fn active_list(&self) -> &[Snippet] {
        self.folders
            .get(self.active_folder)
            .and_then(|f| self.snippets_by_folder.get(f))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Indices into the active folder list, narrowed and ranked by the
    /// snippet filter when one applies.
    fn visible_snippets(&self) -> Vec<usize> {
        let list = self.active_list();
        let Some(query) = self.filter_query_for(Pane::Snippets) else {
            return (0..list.len()).collect();
        };

        let matcher = SkimMatcherV2::default();
        let mut scored: Vec<(i64, usize)> = list
            .iter()
            .enumerate()
            .filter_map(|(i, s)| matcher.fuzzy_match(&s.display(), query).map(|sc| (sc, i)))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.into_iter().map(|(_, i)| i).collect()
    }

    fn visible_sections(&self) -> Vec<usize> {
        let sections = self.current_sections();
        let Some(query) = self.filter_query_for(Pane::Sections) else {
            return (0..sections.len()).collect();
        };

        let matcher = SkimMatcherV2::default();
        let mut scored: Vec<(i64, usize)> = sections
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                matcher
                    .fuzzy_match(s.display_title(), query)
                    .map(|sc| (sc, i))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.into_iter().map(|(_, i)| i).collect()
    }

    fn selected_snippet(&self) -> Option<&Snippet> {
        let visible = self.visible_snippets();
        let idx = *visible.get(self.snippet_sel)?;
        self.active_list().get(idx)
    }

    /// Parse-and-cache the selected snippet's sections. Sections are
    /// recomputed only on first access and after an edit.
    fn ensure_sections(&mut self) {
        let Some(snippet) = self.selected_snippet().cloned() else {
            return;
        };
        let path = snippet.path();
        if self.sections_cache.contains_key(&path) {
            return;
        }
        let body = self.store.read_content(&snippet);
        let sections = parse_sections(&snippet.folder, &snippet.file, &body);
        self.sections_cache.insert(path, sections);
    }

    fn current_sections(&self) -> &[Section] {
        let Some(snippet) = self.selected_snippet() else {
            return &[];
        };
        self.sections_cache
            .get(&snippet.path())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn selected_section(&self) -> Option<&Section> {
        let visible = self.visible_sections();
        let idx = *visible.get(self.section_sel)?;
        self.current_sections().get(idx)
    }

    /// Styled content for the selected section, memoized per
    /// (snippet path, section index).
    fn ensure_content(&mut self) -> Option<Text<'static>> {
        self.ensure_sections();
        let snippet = self.selected_snippet()?.clone();
        let path = snippet.path();
        let idx = *self.visible_sections().get(self.section_sel)?;

        if let Some(cached) = self.content_cache.get(&(path.clone(), idx)) {
            return Some(cached.clone());
        }

        let section = self.sections_cache.get(&path)?.get(idx)?.clone();
        let text = render_section(&section, &self.config);
        self.content_cache.insert((path, idx), text.clone());
        Some(text)
    }

    // ── Copying ──────────────────────────────────────────────────

    fn handle_copy(&mut self, pressed: char, exit_after: bool) {
        self.ensure_sections();

        let Some(content) = self.content_to_copy(pressed) else {
            // Unmapped copy key: no-op, but still lands in navigating.
            self.state = AppState::Navigating;
            return;
        };

        let copied = write_clipboard(&content);

        if exit_after || self.config.general.exit_after_copy {
            self.state = AppState::Quitting;
            self.should_quit = true;
            return;
        }

        if copied {
            self.state = AppState::Copying;
            self.copy_revert_at = Some(Instant::now() + COPY_FEEDBACK);
        } else {
            self.state = AppState::Navigating;
        }
    }

    /// Snippet pane copies the whole file; the other panes copy the code
    /// block whose copyable-position matches the pressed key's index in the
    /// configured copy key list.
    fn content_to_copy(&self, pressed: char) -> Option<String> {
        if self.pane == Pane::Snippets {
            let snippet = self.selected_snippet()?;
            return Some(self.store.read_content(snippet));
        }

        let lower = pressed.to_ascii_lowercase().to_string();
        let key_index = self.config.keys.copy.iter().position(|k| *k == lower)?;

        let section = self.selected_section()?;
        let mut copy_count = 0;
        for block in &section.code_blocks {
            if block.is_copyable() {
                copy_count += 1;
                if key_index + 1 == copy_count {
                    return Some(block.content.clone());
                }
            }
        }
        None
    }

    // ── Editing ──────────────────────────────────────────────────

    /// Arm the synchronous editor boundary. The event loop suspends the
    /// terminal, blocks on the editor, then feeds `Msg::EditorDone` back in.
    fn begin_edit(&mut self) {
        if self.state == AppState::Editing {
            return;
        }
        let Some(snippet) = self.selected_snippet() else {
            return;
        };
        self.pending_edit = Some(self.store.snippet_path(snippet));
        self.section_before_edit = self.section_sel;
        self.state = AppState::Editing;
    }

    /// Re-parse the edited snippet from scratch, restore the section cursor
    /// if it is still in range, and drop the stale rendered content.
    fn finish_edit(&mut self) {
        self.state = AppState::Navigating;

        let Some(snippet) = self.selected_snippet().cloned() else {
            return;
        };
        let path = snippet.path();
        self.sections_cache.remove(&path);
        self.content_cache.retain(|(p, _), _| *p != path);

        self.ensure_sections();
        let count = self.visible_sections().len();
        self.section_sel = if self.section_before_edit < count {
            self.section_before_edit
        } else {
            0
        };
        self.content_scroll = 0;
    }

    // ── Key matching ─────────────────────────────────────────────

    fn matches(&self, specs: &[String], key: KeyEvent) -> bool {
        specs.iter().any(|spec| key_event_matches(spec, key))
    }

    // ── View ─────────────────────────────────────────────────────

    pub fn view(&mut self, frame: &mut Frame) {
        self.ensure_sections();

        let help_height = if self.help_expanded { 6 } else { 1 };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(help_height)])
            .split(frame.area());

        let body = if self.hide_snippet_pane {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(34), Constraint::Min(1)])
                .split(chunks[0])
        } else {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Length(30),
                    Constraint::Length(30),
                    Constraint::Min(1),
                ])
                .split(chunks[0])
        };

        let mut col = 0;
        if !self.hide_snippet_pane {
            self.render_snippet_pane(frame, body[col]);
            col += 1;
        }
        self.render_section_pane(frame, body[col]);
        self.render_content_pane(frame, body[col + 1]);
        self.render_help(frame, chunks[1]);
    }

    fn pane_block(&self, title: String, pane: Pane) -> Block<'static> {
        let focused = self.pane == pane;

        let (label, label_style) = if focused && self.state == AppState::Copying {
            (
                "Copied".to_string(),
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
        } else if focused
            && let Some(filter) = self.filter.as_ref().filter(|f| f.pane == pane && f.entering)
        {
            (
                format!("Find: {}", filter.query),
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            )
        } else if focused {
            (
                title,
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            (title, Style::default().fg(Color::Gray).bg(Color::DarkGray))
        };

        let border_style = if focused {
            Style::default().fg(Color::Magenta)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(Span::styled(format!(" {label} "), label_style))
    }

    fn render_snippet_pane(&mut self, frame: &mut Frame, area: Rect) {
        let visible = self.visible_snippets();
        let list = self.active_list();

        let items: Vec<ListItem> = visible
            .iter()
            .filter_map(|&idx| list.get(idx))
            .map(|snippet| {
                ListItem::new(vec![
                    Line::from(Span::styled(
                        snippet.name.clone(),
                        Style::default().fg(Color::Gray),
                    )),
                    Line::from(Span::styled(
                        format!(
                            "{} • {}",
                            snippet.folder,
                            snippet.date.format("%Y-%m-%d")
                        ),
                        Style::default().fg(Color::DarkGray),
                    )),
                ])
            })
            .collect();

        let mut state = ListState::default();
        if !visible.is_empty() {
            state.select(Some(self.snippet_sel.min(visible.len() - 1)));
        }

        let widget = List::new(items)
            .block(self.pane_block("Snippets".to_string(), Pane::Snippets))
            .highlight_style(
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_stateful_widget(widget, area, &mut state);
    }

    fn render_section_pane(&mut self, frame: &mut Frame, area: Rect) {
        let title = match self.selected_snippet() {
            Some(snippet) if self.hide_snippet_pane => {
                format!("{} / {}", snippet.folder, snippet.name)
            }
            Some(snippet) => snippet.name.clone(),
            None => "Sections".to_string(),
        };

        let visible = self.visible_sections();
        let sections = self.current_sections();
        let items: Vec<ListItem> = visible
            .iter()
            .filter_map(|&idx| sections.get(idx))
            .map(|section| {
                ListItem::new(Line::from(Span::styled(
                    section.display_title().to_string(),
                    Style::default().fg(Color::Gray),
                )))
            })
            .collect();

        let mut state = ListState::default();
        if !visible.is_empty() {
            state.select(Some(self.section_sel.min(visible.len() - 1)));
        }

        let widget = List::new(items)
            .block(self.pane_block(title, Pane::Sections))
            .highlight_style(
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_stateful_widget(widget, area, &mut state);
    }

    fn render_content_pane(&mut self, frame: &mut Frame, area: Rect) {
        let text = self.ensure_content().unwrap_or_default();

        let max_scroll = max_content_scroll(text.lines.len(), area.height);
        if self.content_scroll > max_scroll {
            self.content_scroll = max_scroll;
        }

        let widget = Paragraph::new(text)
            .block(self.pane_block("Content".to_string(), Pane::Content))
            .scroll((self.content_scroll, 0));
        frame.render_widget(widget, area);
    }

    fn render_help(&self, frame: &mut Frame, area: Rect) {
        let keys = &self.config.keys;
        let first = |list: &[String], fallback: &str| -> String {
            list.first().cloned().unwrap_or_else(|| fallback.to_string())
        };

        let style = Style::default().fg(Color::DarkGray);
        let lines: Vec<Line> = if self.help_expanded {
            vec![
                Line::from(Span::styled(
                    format!(
                        " {}/{} next/prev pane    j/k cursor down/up",
                        first(&keys.next_pane, "n"),
                        first(&keys.prev_pane, "N")
                    ),
                    style,
                )),
                Line::from(Span::styled(
                    format!(
                        " {} copy code block     {} copy & exit",
                        keys.copy.join("/"),
                        keys.copy.join("/").to_uppercase()
                    ),
                    style,
                )),
                Line::from(Span::styled(
                    format!(
                        " {} edit snippet        J/K move snippet",
                        first(&keys.edit, "i")
                    ),
                    style,
                )),
                Line::from(Span::styled(
                    format!(
                        " {} toggle snippet pane   / filter list",
                        first(&keys.toggle_snippet_pane, "s")
                    ),
                    style,
                )),
                Line::from(Span::styled(" ? close help            q quit", style)),
            ]
        } else {
            vec![Line::from(Span::styled(
                format!(
                    " {}/{} panes • {} copy • {} edit • / filter • ? help • q quit",
                    first(&keys.next_pane, "n"),
                    first(&keys.prev_pane, "N"),
                    keys.copy.join("/"),
                    first(&keys.edit, "i"),
                ),
                style,
            ))]
        };

        frame.render_widget(Paragraph::new(lines), area);
    }
}

/// Highest useful scroll offset for a content body. Line counts beyond the
/// u16 range saturate instead of wrapping.
fn max_content_scroll(line_count: usize, height: u16) -> u16 {
    u16::try_from(line_count)
        .unwrap_or(u16::MAX)
        .saturating_sub(height.saturating_sub(2))
}

fn write_clipboard(text: &str) -> bool {
    match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text.to_string())) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!("clipboard write failed: {err}");
            false
        }
    }
}

fn key_event_matches(spec: &str, key: KeyEvent) -> bool {
    match spec {
        "tab" => key.code == KeyCode::Tab,
        "backtab" | "shift+tab" => key.code == KeyCode::BackTab,
        "left" => key.code == KeyCode::Left,
        "right" => key.code == KeyCode::Right,
        "up" => key.code == KeyCode::Up,
        "down" => key.code == KeyCode::Down,
        "enter" => key.code == KeyCode::Enter,
        "esc" => key.code == KeyCode::Esc,
        _ => {
            if let Some(rest) = spec.strip_prefix("ctrl+") {
                let mut chars = rest.chars();
                return match (chars.next(), chars.next()) {
                    (Some(ch), None) => {
                        key.modifiers.contains(KeyModifiers::CONTROL)
                            && key.code == KeyCode::Char(ch)
                    }
                    _ => false,
                };
            }

            let mut chars = spec.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => {
                    key.code == KeyCode::Char(ch)
                        && !key.modifiers.contains(KeyModifiers::CONTROL)
                }
                _ => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn key(ch: char) -> KeyEvent {
        let mods = if ch.is_ascii_uppercase() {
            KeyModifiers::SHIFT
        } else {
            KeyModifiers::NONE
        };
        KeyEvent::new(KeyCode::Char(ch), mods)
    }

    /// Home dir with the given snippets and a pre-written empty index, so
    /// first-run seeding stays out of the way.
    fn test_app(files: &[(&str, &str, &str)]) -> (App, TempDir) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.json"), "{\n  \"snippet_list\": []\n}\n").unwrap();
        for (folder, file, body) in files {
            let folder_path = dir.path().join(folder);
            fs::create_dir_all(&folder_path).unwrap();
            fs::write(folder_path.join(file), body).unwrap();
        }
        let config = AppConfig::for_test(dir.path());
        let app = App::new(config).unwrap();
        (app, dir)
    }

    const THREE_BLOCKS: &str = "## Blocks\n\n\
```bash {copyable}\nfirst\n```\n\n\
```bash\nsecond\n```\n\n\
```bash {copyable}\nthird\n```\n";

    #[test]
    fn pane_cycle_visits_all_three() {
        let mut pane = Pane::Snippets;
        pane = pane.next(false);
        assert_eq!(pane, Pane::Sections);
        pane = pane.next(false);
        assert_eq!(pane, Pane::Content);
        pane = pane.next(false);
        assert_eq!(pane, Pane::Snippets);
        assert_eq!(Pane::Snippets.prev(false), Pane::Content);
    }

    #[test]
    fn hidden_snippet_pane_is_skipped_both_directions() {
        assert_eq!(Pane::Content.next(true), Pane::Sections);
        assert_eq!(Pane::Sections.prev(true), Pane::Content);
        assert_eq!(Pane::Sections.next(true), Pane::Content);
        assert_eq!(Pane::Content.prev(true), Pane::Sections);
    }

    #[test]
    fn key_during_copying_only_resets_state() {
        let (mut app, _dir) = test_app(&[("a", "x.md", "## X\n")]);
        let before = app.pane;
        app.state = AppState::Copying;
        app.copy_revert_at = Some(Instant::now() + COPY_FEEDBACK);

        // 'n' would normally advance the pane.
        app.update(Msg::Key(key('n')));

        assert_eq!(app.state, AppState::Navigating);
        assert_eq!(app.pane, before);
        assert!(app.copy_revert_at.is_none());
    }

    #[test]
    fn copy_feedback_reverts_on_deadline() {
        let (mut app, _dir) = test_app(&[("a", "x.md", "## X\n")]);
        app.state = AppState::Copying;
        app.copy_revert_at = Some(Instant::now() - Duration::from_millis(1));

        app.update(Msg::Tick);

        assert_eq!(app.state, AppState::Navigating);
    }

    #[test]
    fn copy_feedback_survives_early_ticks() {
        let (mut app, _dir) = test_app(&[("a", "x.md", "## X\n")]);
        app.state = AppState::Copying;
        app.copy_revert_at = Some(Instant::now() + Duration::from_secs(60));

        app.update(Msg::Tick);

        assert_eq!(app.state, AppState::Copying);
    }

    #[test]
    fn copy_key_selection_is_positional() {
        let (mut app, _dir) = test_app(&[("a", "x.md", THREE_BLOCKS)]);
        app.pane = Pane::Sections;
        app.ensure_sections();

        assert_eq!(app.content_to_copy('c').as_deref(), Some("first"));
        assert_eq!(app.content_to_copy('d').as_deref(), Some("third"));
        // 'e' is a configured key with no third copyable block behind it.
        assert_eq!(app.content_to_copy('e'), None);
        // Capital variants address the same blocks.
        assert_eq!(app.content_to_copy('D').as_deref(), Some("third"));
    }

    #[test]
    fn snippet_pane_copy_takes_whole_file() {
        let (mut app, _dir) = test_app(&[("a", "x.md", THREE_BLOCKS)]);
        app.pane = Pane::Snippets;
        app.ensure_sections();

        let copied = app.content_to_copy('c').unwrap();
        assert_eq!(copied, THREE_BLOCKS);
    }

    #[test]
    fn capital_copy_key_copies_and_quits() {
        let (mut app, _dir) = test_app(&[("a", "x.md", THREE_BLOCKS)]);
        app.pane = Pane::Sections;

        app.update(Msg::Key(key('C')));

        assert_eq!(app.state, AppState::Quitting);
        assert!(app.should_quit);
    }

    #[test]
    fn exit_after_copy_quits_on_lowercase_key() {
        let (mut app, _dir) = test_app(&[("a", "x.md", THREE_BLOCKS)]);
        app.config.general.exit_after_copy = true;
        app.pane = Pane::Sections;

        app.update(Msg::Key(key('c')));

        assert_eq!(app.state, AppState::Quitting);
        assert!(app.should_quit);
    }

    #[test]
    fn unmapped_copy_key_is_noop_back_to_navigating() {
        let (mut app, _dir) = test_app(&[("a", "x.md", THREE_BLOCKS)]);
        app.pane = Pane::Sections;
        app.handle_copy('g', false);
        assert_eq!(app.state, AppState::Navigating);
        assert!(!app.should_quit);
    }

    #[test]
    fn move_first_up_and_last_down_are_noops() {
        let (mut app, _dir) = test_app(&[
            ("a", "x.md", "## X\n"),
            ("a", "y.md", "## Y\n"),
        ]);

        app.snippet_sel = 0;
        app.move_snippet(-1);
        assert_eq!(app.snippet_sel, 0);
        assert_eq!(app.active_list()[0].name, "x");

        app.snippet_sel = 1;
        app.move_snippet(1);
        assert_eq!(app.snippet_sel, 1);
        assert_eq!(app.active_list()[1].name, "y");
    }

    #[test]
    fn move_swaps_neighbor_and_carries_cursor() {
        let (mut app, _dir) = test_app(&[
            ("a", "x.md", "## X\n"),
            ("a", "y.md", "## Y\n"),
        ]);

        app.snippet_sel = 0;
        app.move_snippet(1);
        assert_eq!(app.snippet_sel, 1);
        let names: Vec<&str> = app.active_list().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["y", "x"]);
    }

    #[test]
    fn toggling_pane_visibility_moves_focus_off_hidden_pane() {
        let (mut app, _dir) = test_app(&[("a", "x.md", "## X\n")]);
        app.pane = Pane::Snippets;

        app.update(Msg::Key(key('s')));

        assert!(app.hide_snippet_pane);
        assert_eq!(app.pane, Pane::Sections);
    }

    #[test]
    fn edit_reparses_and_restores_section_in_range() {
        let body = "## One\n\ntext\n\n---\n\n## Two\n";
        let (mut app, dir) = test_app(&[("a", "x.md", body)]);
        app.pane = Pane::Sections;
        app.ensure_sections();
        app.section_sel = 1;

        app.update(Msg::Key(key('i')));
        assert_eq!(app.state, AppState::Editing);
        let path = app.take_pending_edit().expect("edit path armed");

        fs::write(&path, "## One\n\nchanged\n\n---\n\n## Renamed\n").unwrap();
        app.update(Msg::EditorDone);

        assert_eq!(app.state, AppState::Navigating);
        assert_eq!(app.section_sel, 1);
        assert_eq!(app.current_sections()[1].title, "Renamed");
        drop(dir);
    }

    #[test]
    fn edit_resets_section_when_out_of_range() {
        let body = "## One\n\n---\n\n## Two\n";
        let (mut app, dir) = test_app(&[("a", "x.md", body)]);
        app.ensure_sections();
        app.section_sel = 1;

        app.update(Msg::Key(key('i')));
        let path = app.take_pending_edit().unwrap();
        fs::write(&path, "## Only\n").unwrap();
        app.update(Msg::EditorDone);

        assert_eq!(app.section_sel, 0);
        assert_eq!(app.current_sections().len(), 1);
        drop(dir);
    }

    #[test]
    fn edit_key_is_gated_while_editing() {
        let (mut app, _dir) = test_app(&[("a", "x.md", "## X\n")]);
        app.update(Msg::Key(key('i')));
        let first = app.take_pending_edit();
        assert!(first.is_some());

        app.update(Msg::Key(key('i')));
        assert!(app.take_pending_edit().is_none());
    }

    #[test]
    fn filter_entry_guards_action_keys() {
        let (mut app, _dir) = test_app(&[("a", "x.md", "## X\n")]);
        app.pane = Pane::Snippets;

        app.update(Msg::Key(key('/')));
        app.update(Msg::Key(key('q')));

        assert!(!app.should_quit);
        assert_eq!(
            app.filter.as_ref().map(|f| f.query.as_str()),
            Some("q")
        );

        app.update(Msg::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(app.filter.is_none());
    }

    #[test]
    fn filter_narrows_snippet_list() {
        let (mut app, _dir) = test_app(&[
            ("a", "docker.md", "## Docker\n"),
            ("a", "lifetimes.md", "## Lifetimes\n"),
        ]);
        app.pane = Pane::Snippets;

        app.update(Msg::Key(key('/')));
        for ch in "lftm".chars() {
            app.update(Msg::Key(key(ch)));
        }

        let visible = app.visible_snippets();
        assert_eq!(visible.len(), 1);
        assert_eq!(app.selected_snippet().unwrap().name, "lifetimes");
    }

    #[test]
    fn empty_snippet_still_has_one_navigable_section() {
        let (mut app, _dir) = test_app(&[("a", "blank.md", "")]);
        app.ensure_sections();
        assert_eq!(app.current_sections().len(), 1);
        assert!(app.selected_section().is_some());
    }

    #[test]
    fn open_query_selects_match_and_hides_snippet_pane() {
        let (mut app, _dir) = test_app(&[
            ("a", "docker.md", "## Docker\n"),
            ("b", "lifetimes.md", "## Lifetimes\n"),
        ]);

        app.open_query("lftm");

        assert!(app.hide_snippet_pane);
        assert_eq!(app.selected_snippet().unwrap().name, "lifetimes");
    }

    #[test]
    fn scroll_clamp_saturates_on_huge_content() {
        assert_eq!(max_content_scroll(10, 40), 0);
        assert_eq!(max_content_scroll(50, 12), 40);
        // Past the u16 range the clamp saturates instead of wrapping.
        assert_eq!(max_content_scroll(70_000, 40), u16::MAX - 38);
        assert_eq!(max_content_scroll(usize::MAX, 2), u16::MAX);
    }

    #[test]
    fn flush_preserves_in_session_reorder() {
        let (mut app, dir) = test_app(&[
            ("a", "x.md", "## X\n"),
            ("a", "y.md", "## Y\n"),
        ]);

        app.snippet_sel = 0;
        app.move_snippet(1);
        app.flush_index();

        let raw = fs::read_to_string(dir.path().join("index.json")).unwrap();
        let y_at = raw.find("\"y\"").unwrap();
        let x_at = raw.find("\"x\"").unwrap();
        assert!(y_at < x_at);
    }
}
