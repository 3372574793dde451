//! Admin view: password login, then upload, list, and delete of knowledge
//! files.

use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};
use tracing::warn;

use kbchat_core::admin::notice;
use kbchat_core::{AdminSession, UploadReport, select_markdown};
use kbchat_shared::{KnowledgeFile, Result};

use super::Action;

/// Which part of the admin panel receives keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Paths,
    Files,
}

pub(crate) struct AdminScreen {
    session: Option<AdminSession>,
    password: String,
    /// Whitespace-separated file paths to upload.
    paths: String,
    files: Vec<KnowledgeFile>,
    selected: usize,
    focus: Focus,
    /// File awaiting a y/n delete confirmation.
    confirm: Option<KnowledgeFile>,
    uploading: bool,
    deleting: Option<String>,
    loading_files: bool,
    status: Option<String>,
}

impl AdminScreen {
    pub(crate) fn new() -> Self {
        Self {
            session: None,
            password: String::new(),
            paths: String::new(),
            files: Vec::new(),
            selected: 0,
            focus: Focus::Paths,
            confirm: None,
            uploading: false,
            deleting: None,
            loading_files: false,
            status: None,
        }
    }

    /// Forget the session and every piece of panel state.
    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    pub(crate) fn session(&self) -> Option<&AdminSession> {
        self.session.as_ref()
    }

    pub(crate) fn files(&self) -> &[KnowledgeFile] {
        &self.files
    }

    pub(crate) fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub(crate) fn is_uploading(&self) -> bool {
        self.uploading
    }

    // -----------------------------------------------------------------------
    // Task results
    // -----------------------------------------------------------------------

    pub(crate) fn login_succeeded(&mut self, session: AdminSession) {
        self.session = Some(session);
        self.password.clear();
        self.status = None;
    }

    pub(crate) fn login_failed(&mut self, message: String) {
        self.password.clear();
        self.status = Some(message);
    }

    pub(crate) fn files_requested(&mut self) {
        self.loading_files = true;
    }

    pub(crate) fn on_listed(&mut self, result: Result<Vec<KnowledgeFile>>) {
        self.loading_files = false;
        match result {
            Ok(files) => {
                self.files = files;
                self.selected = self.selected.min(self.files.len().saturating_sub(1));
            }
            Err(e) => {
                warn!(error = %e, "failed to list knowledge files");
                self.status = Some(notice::LIST_FAILED.into());
            }
        }
    }

    /// Returns a follow-up refresh when the upload stored anything.
    pub(crate) fn on_uploaded(&mut self, result: Result<UploadReport>) -> Option<Action> {
        self.uploading = false;
        match result {
            Ok(report) => {
                self.paths.clear();
                self.status = Some(match report.notice {
                    Some(n) => format!("{}\n{n}", notice::UPLOAD_SUCCEEDED),
                    None => notice::UPLOAD_SUCCEEDED.to_string(),
                });
                Some(Action::RefreshFiles)
            }
            Err(e) => {
                warn!(error = %e, "upload failed");
                self.status = Some(notice::UPLOAD_FAILED.into());
                None
            }
        }
    }

    pub(crate) fn on_deleted(&mut self, file: &KnowledgeFile, result: Result<()>) -> Option<Action> {
        self.deleting = None;
        match result {
            Ok(()) => {
                self.files.retain(|f| f.id != file.id);
                self.selected = self.selected.min(self.files.len().saturating_sub(1));
                self.status = Some(notice::deleted(&file.file_name));
                None
            }
            Err(e) => {
                warn!(error = %e, id = %file.id, "delete failed");
                self.status = Some(notice::delete_failed(&file.file_name));
                Some(Action::RefreshFiles)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Keys
    // -----------------------------------------------------------------------

    pub(crate) fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
        if modifiers.contains(KeyModifiers::CONTROL) {
            return None;
        }
        if self.session.is_none() {
            return self.handle_login_key(code);
        }
        if self.confirm.is_some() {
            return self.handle_confirm_key(code);
        }

        match (self.focus, code) {
            (_, KeyCode::Tab | KeyCode::BackTab) => {
                self.focus = match self.focus {
                    Focus::Paths => Focus::Files,
                    Focus::Files => Focus::Paths,
                };
                None
            }
            (Focus::Paths, KeyCode::Enter) => self.start_upload(),
            (Focus::Paths, KeyCode::Backspace) => {
                self.paths.pop();
                None
            }
            (Focus::Paths, KeyCode::Char(c)) => {
                self.paths.push(c);
                None
            }
            (Focus::Files, KeyCode::Up | KeyCode::Char('k')) => {
                self.selected = self.selected.saturating_sub(1);
                None
            }
            (Focus::Files, KeyCode::Down | KeyCode::Char('j')) => {
                if self.selected + 1 < self.files.len() {
                    self.selected += 1;
                }
                None
            }
            (Focus::Files, KeyCode::Char('d') | KeyCode::Delete) => {
                if self.deleting.is_none() {
                    if let Some(file) = self.files.get(self.selected) {
                        self.status = Some(format!(
                            "{} (y/n)",
                            notice::confirm_delete(&file.file_name)
                        ));
                        self.confirm = Some(file.clone());
                    }
                }
                None
            }
            (Focus::Files, KeyCode::Char('r')) => Some(Action::RefreshFiles),
            _ => None,
        }
    }

    fn handle_login_key(&mut self, code: KeyCode) -> Option<Action> {
        match code {
            KeyCode::Enter if !self.password.is_empty() => {
                Some(Action::Login(std::mem::take(&mut self.password)))
            }
            KeyCode::Backspace => {
                self.password.pop();
                None
            }
            KeyCode::Char(c) => {
                self.password.push(c);
                None
            }
            _ => None,
        }
    }

    fn handle_confirm_key(&mut self, code: KeyCode) -> Option<Action> {
        match code {
            KeyCode::Char('y' | 'Y') | KeyCode::Enter => {
                let file = self.confirm.take()?;
                self.deleting = Some(file.id.clone());
                self.status = None;
                Some(Action::Delete(file))
            }
            KeyCode::Char('n' | 'N') => {
                self.confirm = None;
                self.status = None;
                None
            }
            _ => None,
        }
    }

    fn start_upload(&mut self) -> Option<Action> {
        if self.uploading {
            return None;
        }
        let paths: Vec<PathBuf> = self.paths.split_whitespace().map(PathBuf::from).collect();
        let selection = select_markdown(&paths);

        if selection.accepted.is_empty() {
            self.status = Some(match selection.notice {
                Some(n) => format!("{n}\n{}", notice::NO_FILES_SELECTED),
                None => notice::NO_FILES_SELECTED.to_string(),
            });
            return None;
        }

        self.uploading = true;
        self.status = Some(match selection.notice {
            Some(n) => format!("{}\n{n}", notice::uploading(selection.accepted.len())),
            None => notice::uploading(selection.accepted.len()),
        });
        Some(Action::Upload(paths))
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        if self.session.is_none() {
            self.draw_login(f, area);
        } else {
            self.draw_panel(f, area);
        }
    }

    fn draw_login(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(2), // Prompt
                Constraint::Length(3), // Password
                Constraint::Min(1),    // Status
            ])
            .split(area);

        f.render_widget(
            Paragraph::new("관리자 비밀번호를 입력하세요.").alignment(Alignment::Center),
            chunks[0],
        );

        let masked = "*".repeat(self.password.chars().count());
        let input = Paragraph::new(masked).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" 비밀번호 (Enter 로그인) ")
                .border_style(Style::default().fg(Color::Yellow)),
        );
        f.render_widget(input, chunks[1]);

        if let Some(status) = &self.status {
            let p = Paragraph::new(status.as_str())
                .style(Style::default().fg(Color::Red))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });
            f.render_widget(p, chunks[2]);
        }
    }

    fn draw_panel(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Paths
                Constraint::Min(3),    // File list
                Constraint::Length(3), // Status
            ])
            .split(area);

        let focus_style = |focus: Focus| {
            if self.focus == focus {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            }
        };

        let paths_title = if self.uploading {
            " 업로드 중... ".to_string()
        } else {
            " 업로드할 .md 파일 경로 (공백 구분, Enter 업로드) ".to_string()
        };
        let paths = Paragraph::new(self.paths.as_str()).block(
            Block::default()
                .borders(Borders::ALL)
                .title(paths_title)
                .border_style(focus_style(Focus::Paths)),
        );
        f.render_widget(paths, chunks[0]);

        let list_block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" 업로드된 파일 ({}) · d 삭제 · r 새로고침 ", self.files.len()))
            .border_style(focus_style(Focus::Files));

        if self.loading_files && self.files.is_empty() {
            f.render_widget(Paragraph::new("불러오는 중...").block(list_block), chunks[1]);
        } else if self.files.is_empty() {
            f.render_widget(
                Paragraph::new(notice::NO_FILES_STORED)
                    .alignment(Alignment::Center)
                    .block(list_block),
                chunks[1],
            );
        } else {
            let items: Vec<ListItem> = self
                .files
                .iter()
                .enumerate()
                .map(|(i, file)| {
                    let selected = i == self.selected && self.focus == Focus::Files;
                    let prefix = if selected { "▸ " } else { "  " };
                    let suffix = if self.deleting.as_deref() == Some(file.id.as_str()) {
                        "  (삭제 중...)"
                    } else {
                        ""
                    };
                    let style = if selected {
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                    } else {
                        Style::default()
                    };
                    ListItem::new(format!("{prefix}{}{suffix}", file.file_name)).style(style)
                })
                .collect();
            f.render_widget(List::new(items).block(list_block), chunks[1]);
        }

        if let Some(status) = &self.status {
            let p = Paragraph::new(status.as_str())
                .style(Style::default().fg(Color::Yellow))
                .wrap(Wrap { trim: true });
            f.render_widget(p, chunks[2]);
        }
    }
}
