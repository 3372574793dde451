//! Chat view: transcript, typing indicator, and the message input.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use kbchat_core::{Conversation, PendingQuestion, Resolution, parse_citations};
use kbchat_shared::Sender;

use super::Action;
use crate::widgets::estimated_height;

pub(crate) struct ChatScreen {
    conversation: Conversation,
    persona: String,
}

impl ChatScreen {
    pub(crate) fn new(persona: &str, greeting: &str) -> Self {
        Self {
            conversation: Conversation::new(greeting),
            persona: persona.to_string(),
        }
    }

    pub(crate) fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub(crate) fn reset(&mut self) {
        self.conversation.reset();
    }

    pub(crate) fn resolve(&mut self, pending: &PendingQuestion, answer: String) -> Resolution {
        self.conversation.resolve(pending, answer)
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
        match code {
            KeyCode::Enter => self.conversation.submit().map(Action::Ask),
            KeyCode::Backspace => {
                self.conversation.draft_mut().pop();
                None
            }
            KeyCode::Char(c) if !modifiers.contains(KeyModifiers::CONTROL) => {
                self.conversation.draft_mut().push(c);
                None
            }
            _ => None,
        }
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),    // Transcript
                Constraint::Length(1), // Typing indicator
                Constraint::Length(3), // Input
            ])
            .split(area);

        self.draw_transcript(f, chunks[0]);

        if self.conversation.is_loading() {
            let typing = Paragraph::new(format!(" {}이(가) 답변을 준비하고 있어요...", self.persona))
                .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC));
            f.render_widget(typing, chunks[1]);
        }

        let input = Paragraph::new(self.conversation.draft()).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" 메시지를 입력하세요 (Enter 전송) ")
                .border_style(Style::default().fg(Color::Yellow)),
        );
        f.render_widget(input, chunks[2]);
    }

    fn draw_transcript(&self, f: &mut Frame, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        let mut rows: u16 = 0;

        for message in self.conversation.messages() {
            let (label, style, alignment) = match message.sender {
                Sender::User => ("나", Style::default().fg(Color::Cyan), Alignment::Right),
                Sender::Bot => (
                    self.persona.as_str(),
                    Style::default().fg(Color::Green),
                    Alignment::Left,
                ),
            };

            lines.push(
                Line::from(Span::styled(label.to_string(), style.add_modifier(Modifier::BOLD)))
                    .alignment(alignment),
            );
            for text in message.text.lines() {
                lines.push(Line::from(text.to_string()).alignment(alignment));
            }
            rows = rows.saturating_add(1 + estimated_height(&message.text, area.width));

            if message.sender == Sender::Bot {
                for citation in parse_citations(&message.text) {
                    let source = match &citation.section {
                        Some(section) => format!("  ↳ 출처: {} · {section}", citation.file_name),
                        None => format!("  ↳ 출처: {}", citation.file_name),
                    };
                    lines.push(Line::from(Span::styled(
                        source,
                        Style::default().fg(Color::DarkGray),
                    )));
                    rows = rows.saturating_add(1);
                }
            }
            lines.push(Line::from(""));
            rows = rows.saturating_add(1);
        }

        // Keep the newest message in view.
        let scroll = rows.saturating_sub(area.height);
        let transcript = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0));
        f.render_widget(transcript, area);
    }
}
