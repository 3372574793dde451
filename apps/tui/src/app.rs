//! Widget state and event loop.
//!
//! The UI loop owns all state. Answers, uploads, deletes, and listings run
//! as tokio tasks that report back over an unbounded channel; results tagged
//! with an older session epoch are dropped.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use tokio::sync::mpsc;
use tracing::{debug, info};

use kbchat_core::{AdminGate, AnswerService, KnowledgeAdmin, PendingQuestion, UploadReport};
use kbchat_shared::{KbChatError, KnowledgeFile};

use crate::screens::{Action, AdminScreen, ChatScreen, View};
use crate::widgets::{anchored_rect, status_bar, toggle_button};

/// Panel size in cells; shrinks on small terminals.
const PANEL_WIDTH: u16 = 64;
const PANEL_HEIGHT: u16 = 26;
const BUTTON_WIDTH: u16 = 16;
const BUTTON_HEIGHT: u16 = 3;

/// Backends the widget talks to.
pub(crate) struct Services {
    pub answer: Arc<AnswerService>,
    pub gate: AdminGate,
    pub admin: KnowledgeAdmin,
}

/// Persona shown in the header and greeting seeded into each session.
pub(crate) struct Persona {
    pub name: String,
    pub greeting: String,
}

/// Result of a background task.
#[derive(Debug)]
pub(crate) enum TaskResult {
    Answer {
        pending: PendingQuestion,
        text: String,
    },
    Uploaded {
        epoch: u64,
        result: kbchat_shared::Result<UploadReport>,
    },
    Deleted {
        epoch: u64,
        file: KnowledgeFile,
        result: kbchat_shared::Result<()>,
    },
    Listed {
        epoch: u64,
        result: kbchat_shared::Result<Vec<KnowledgeFile>>,
    },
}

/// Application state.
pub(crate) struct App {
    /// Whether the chat panel is visible.
    pub open: bool,
    pub view: View,
    pub chat: ChatScreen,
    pub admin: AdminScreen,
    /// Bumped whenever the panel closes; stale admin results are dropped.
    epoch: u64,
    pub should_quit: bool,
    /// Status message shown in bottom bar.
    pub status: String,
    persona: String,
    services: Services,
    tx: mpsc::UnboundedSender<TaskResult>,
    rx: mpsc::UnboundedReceiver<TaskResult>,
}

impl App {
    pub(crate) fn new(services: Services, persona: Persona) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            open: false,
            view: View::Chat,
            chat: ChatScreen::new(&persona.name, &persona.greeting),
            admin: AdminScreen::new(),
            epoch: 0,
            should_quit: false,
            status: idle_status(),
            persona: persona.name,
            services,
            tx,
            rx,
        }
    }

    /// Header title for the current view.
    pub(crate) fn title(&self) -> String {
        match self.view {
            View::Chat => self.persona.clone(),
            View::Admin => View::Admin.to_string(),
        }
    }

    fn open_panel(&mut self) {
        self.open = true;
        self.status = open_status(self.view);
        info!("chat panel opened");
    }

    /// Hide the panel and start a fresh session.
    fn close_panel(&mut self) {
        self.open = false;
        self.view = View::Chat;
        self.chat.reset();
        self.admin.reset();
        self.epoch += 1;
        self.status = idle_status();
        info!(epoch = self.epoch, "chat panel closed, session reset");
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if matches!(code, KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL)) {
            self.should_quit = true;
            return;
        }

        if !self.open {
            match code {
                KeyCode::Enter | KeyCode::Char(' ') => self.open_panel(),
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            }
            return;
        }

        match code {
            KeyCode::Esc => self.close_panel(),
            KeyCode::F(2) => {
                self.view = self.view.toggled();
                self.status = open_status(self.view);
                if self.view == View::Admin && self.admin.session().is_some() {
                    self.dispatch(Action::RefreshFiles);
                }
            }
            _ => {
                let action = match self.view {
                    View::Chat => self.chat.handle_key(code, modifiers),
                    View::Admin => self.admin.handle_key(code, modifiers),
                };
                if let Some(action) = action {
                    self.dispatch(action);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Background work
    // -----------------------------------------------------------------------

    fn dispatch(&mut self, action: Action) {
        match action {
            Action::Ask(pending) => self.spawn_answer(pending),
            Action::Login(password) => match self.services.gate.login(&password) {
                Ok(session) => {
                    self.admin.login_succeeded(session);
                    self.dispatch(Action::RefreshFiles);
                }
                Err(KbChatError::Unauthorized(message)) => self.admin.login_failed(message),
                Err(e) => self.admin.login_failed(e.to_string()),
            },
            Action::Upload(paths) => self.spawn_upload(paths),
            Action::Delete(file) => self.spawn_delete(file),
            Action::RefreshFiles => self.spawn_list(),
        }
    }

    fn spawn_answer(&self, pending: PendingQuestion) {
        let service = self.services.answer.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let text = service.answer(&pending.question).await;
            let _ = tx.send(TaskResult::Answer { pending, text });
        });
    }

    fn spawn_upload(&self, paths: Vec<PathBuf>) {
        let Some(session) = self.admin.session().cloned() else {
            return;
        };
        let admin = self.services.admin.clone();
        let tx = self.tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = admin.upload(&session, &paths).await;
            let _ = tx.send(TaskResult::Uploaded { epoch, result });
        });
    }

    fn spawn_delete(&self, file: KnowledgeFile) {
        let Some(session) = self.admin.session().cloned() else {
            return;
        };
        let admin = self.services.admin.clone();
        let tx = self.tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = admin.delete(&session, &file.id).await;
            let _ = tx.send(TaskResult::Deleted {
                epoch,
                file,
                result,
            });
        });
    }

    fn spawn_list(&mut self) {
        let Some(session) = self.admin.session().cloned() else {
            return;
        };
        self.admin.files_requested();
        let admin = self.services.admin.clone();
        let tx = self.tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = admin.list(&session).await;
            let _ = tx.send(TaskResult::Listed { epoch, result });
        });
    }

    /// Apply every task result that has arrived so far.
    pub(crate) fn drain_results(&mut self) {
        while let Ok(result) = self.rx.try_recv() {
            self.apply(result);
        }
    }

    pub(crate) fn apply(&mut self, result: TaskResult) {
        let follow_up = match result {
            TaskResult::Answer { pending, text } => {
                let resolution = self.chat.resolve(&pending, text);
                debug!(seq = pending.seq, ?resolution, "answer resolved");
                None
            }
            TaskResult::Uploaded { epoch, .. }
            | TaskResult::Deleted { epoch, .. }
            | TaskResult::Listed { epoch, .. }
                if epoch != self.epoch =>
            {
                debug!(epoch, current = self.epoch, "dropping result from closed session");
                None
            }
            TaskResult::Uploaded { result, .. } => self.admin.on_uploaded(result),
            TaskResult::Deleted { file, result, .. } => self.admin.on_deleted(&file, result),
            TaskResult::Listed { result, .. } => {
                self.admin.on_listed(result);
                None
            }
        };

        if let Some(action) = follow_up {
            self.dispatch(action);
        }
    }

    #[cfg(test)]
    pub(crate) async fn next_result(&mut self) -> Option<TaskResult> {
        self.rx.recv().await
    }
}

fn idle_status() -> String {
    "Enter: 채팅 열기 · q: 종료".to_string()
}

fn open_status(view: View) -> String {
    let other = view.toggled();
    format!("{view} · F2: {other}(으)로 전환 · Esc: 닫기")
}

// ---------------------------------------------------------------------------
// Terminal loop
// ---------------------------------------------------------------------------

/// Entry point: sets up terminal, runs event loop, restores terminal.
pub(crate) fn run(services: Services, persona: Persona) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, App::new(services, persona));

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        app.drain_results();
        terminal.draw(|f| draw(f, &app))?;

        // Poll for events with 100ms timeout for responsive UI
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code, key.modifiers);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Page
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());
    let page = chunks[0];

    let backdrop = Paragraph::new(vec![
        Line::from(""),
        Line::from(format!("kbchat · {}", app.persona)).style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(""),
        Line::from("오른쪽 아래 버튼으로 채팅을 열 수 있어요."),
    ])
    .alignment(Alignment::Center)
    .style(Style::default().fg(Color::DarkGray));
    f.render_widget(backdrop, page);

    let button = anchored_rect(BUTTON_WIDTH, BUTTON_HEIGHT, page);
    f.render_widget(toggle_button(app.open), button);

    if app.open {
        let above_button = Rect {
            height: page.height.saturating_sub(BUTTON_HEIGHT),
            ..page
        };
        let panel = anchored_rect(PANEL_WIDTH, PANEL_HEIGHT, above_button);
        draw_panel(f, app, panel);
    }

    f.render_widget(status_bar(&app.status), chunks[1]);
}

fn draw_panel(f: &mut Frame, app: &App, area: Rect) {
    let switch_hint = format!(" [F2] {} ", app.view.toggled());
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", app.title()))
        .title_bottom(Line::from(switch_hint).right_aligned())
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);

    f.render_widget(Clear, area);
    f.render_widget(block, area);

    match app.view {
        View::Chat => app.chat.draw(f, inner),
        View::Admin => app.admin.draw(f, inner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use kbchat_core::{AnswerSettings, password_digest};
    use kbchat_gemini::{GenerateRequest, GenerativeModel};
    use kbchat_shared::{AdminConfig, AppConfig, Sender};
    use kbchat_storage::Storage;
    use uuid::Uuid;

    /// Replies with the question and a running call number.
    #[derive(Default)]
    struct EchoModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerativeModel for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, req: &GenerateRequest) -> kbchat_shared::Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let question = req.contents.rsplit("사용자 질문: ").next().unwrap_or_default();
            Ok(format!("answer {n} to {question}"))
        }
    }

    async fn test_app() -> (App, Arc<Storage>) {
        let tmp = std::env::temp_dir().join(format!("kbchat_tui_{}.db", Uuid::now_v7()));
        let storage = Arc::new(Storage::open(&tmp).await.expect("open test db"));
        storage.insert_document("a.md", "# Info\nHours: 9-6", Utc::now()).await.unwrap();

        let config = AppConfig::default();
        let answer = AnswerService::new(
            storage.clone(),
            Arc::new(EchoModel::default()),
            AnswerSettings::from(&config),
        );
        let services = Services {
            answer: Arc::new(answer),
            gate: AdminGate::from_config(&AdminConfig {
                password_sha256: Some(password_digest("pw")),
            }),
            admin: KnowledgeAdmin::new(storage.clone()),
        };
        let persona = Persona {
            name: config.assistant.name.clone(),
            greeting: config.assistant.greeting.clone(),
        };
        (App::new(services, persona), storage)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(KeyCode::Char(c), KeyModifiers::NONE);
        }
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(code, KeyModifiers::NONE);
    }

    #[tokio::test]
    async fn f2_toggles_view_and_header() {
        let (mut app, _) = test_app().await;
        press(&mut app, KeyCode::Enter);
        assert!(app.open);
        assert_eq!(app.title(), "생활백서봇");

        press(&mut app, KeyCode::F(2));
        assert_eq!(app.view, View::Admin);
        assert_eq!(app.title(), "관리자 페이지");

        press(&mut app, KeyCode::F(2));
        assert_eq!(app.view, View::Chat);
    }

    #[tokio::test]
    async fn esc_closes_and_resets_to_chat() {
        let (mut app, _) = test_app().await;
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::F(2));
        press(&mut app, KeyCode::Esc);

        assert!(!app.open);
        assert_eq!(app.view, View::Chat);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.view, View::Chat);
    }

    #[tokio::test]
    async fn question_round_trip_appends_answer() {
        let (mut app, _) = test_app().await;
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "hours?");
        press(&mut app, KeyCode::Enter);
        assert!(app.chat.conversation().is_loading());

        let result = app.next_result().await.expect("answer");
        app.apply(result);

        let messages = app.chat.conversation().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].sender, Sender::Bot);
        assert!(messages[2].text.contains("hours?"));
        assert!(!app.chat.conversation().is_loading());
    }

    #[tokio::test]
    async fn answer_after_close_is_dropped() {
        let (mut app, _) = test_app().await;
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "hours?");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Esc);

        let result = app.next_result().await.expect("answer");
        app.apply(result);
        assert_eq!(app.chat.conversation().messages().len(), 1);
    }

    #[tokio::test]
    async fn admin_login_loads_files_and_wrong_password_is_reported() {
        let (mut app, _) = test_app().await;
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::F(2));

        type_text(&mut app, "nope");
        press(&mut app, KeyCode::Enter);
        assert!(app.admin.session().is_none());
        assert_eq!(app.admin.status(), Some("비밀번호가 올바르지 않습니다."));

        type_text(&mut app, "pw");
        press(&mut app, KeyCode::Enter);
        assert!(app.admin.session().is_some());

        let result = app.next_result().await.expect("listing");
        app.apply(result);
        let names: Vec<&str> = app.admin.files().iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, ["a.md"]);
    }

    #[tokio::test]
    async fn returning_to_admin_view_reloads_files() {
        let (mut app, storage) = test_app().await;
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::F(2));
        type_text(&mut app, "pw");
        press(&mut app, KeyCode::Enter);
        let result = app.next_result().await.expect("listing");
        app.apply(result);
        assert_eq!(app.admin.files().len(), 1);

        storage.insert_document("b.md", "B", Utc::now()).await.unwrap();
        press(&mut app, KeyCode::F(2));
        press(&mut app, KeyCode::F(2));
        assert_eq!(app.view, View::Admin);

        let result = app.next_result().await.expect("listing");
        app.apply(result);
        let names: Vec<&str> = app.admin.files().iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, ["a.md", "b.md"]);
    }
}
