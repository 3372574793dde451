//! In-memory conversation state for one widget session.
//!
//! Each accepted submission gets a sequence number. Answers may resolve in
//! any order; an answer older than the last appended one is discarded so the
//! transcript never shows replies out of order. A [`Conversation::reset`]
//! starts a new epoch, and answers from a previous epoch are discarded too.

use std::collections::BTreeSet;

use tracing::debug;

use kbchat_shared::{Message, Sender};

/// A submitted question waiting for its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuestion {
    pub epoch: u64,
    pub seq: u64,
    pub question: String,
}

/// What [`Conversation::resolve`] did with an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Appended,
    Discarded,
}

/// Visible transcript plus the composing input.
#[derive(Debug, Clone)]
pub struct Conversation {
    greeting: String,
    messages: Vec<Message>,
    draft: String,
    epoch: u64,
    next_seq: u64,
    last_answered: u64,
    in_flight: BTreeSet<u64>,
}

impl Conversation {
    /// Start a session seeded with one bot greeting.
    pub fn new(greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        Self {
            messages: vec![Message::bot(greeting.clone())],
            greeting,
            draft: String::new(),
            epoch: 0,
            next_seq: 1,
            last_answered: 0,
            in_flight: BTreeSet::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut String {
        &mut self.draft
    }

    /// Whether any answer that could still be appended is outstanding.
    pub fn is_loading(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Accept the draft as a question.
    ///
    /// Whitespace-only drafts are rejected and left untouched. Otherwise the
    /// user message is appended immediately, the draft cleared, and the
    /// returned [`PendingQuestion`] must be passed back to [`Self::resolve`].
    pub fn submit(&mut self) -> Option<PendingQuestion> {
        let question = self.draft.trim();
        if question.is_empty() {
            return None;
        }
        let question = question.to_string();
        self.draft.clear();

        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight.insert(seq);
        self.messages.push(Message::user(question.clone()));

        Some(PendingQuestion {
            epoch: self.epoch,
            seq,
            question,
        })
    }

    /// Record the answer for `pending`.
    pub fn resolve(&mut self, pending: &PendingQuestion, answer: impl Into<String>) -> Resolution {
        if pending.epoch != self.epoch {
            debug!(seq = pending.seq, "discarding answer from a previous session");
            return Resolution::Discarded;
        }

        // Entries at or below the last appended answer were already dropped,
        // so a missing entry means stale or already resolved.
        if !self.in_flight.remove(&pending.seq) {
            debug!(
                seq = pending.seq,
                last = self.last_answered,
                "discarding stale or duplicate answer"
            );
            return Resolution::Discarded;
        }

        self.messages.push(Message::bot(answer));
        self.last_answered = pending.seq;
        // Anything older can no longer be appended.
        self.in_flight = self.in_flight.split_off(&(pending.seq + 1));
        Resolution::Appended
    }

    /// Drop the transcript and start over with the greeting.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.messages = vec![Message::bot(self.greeting.clone())];
        self.draft.clear();
        self.next_seq = 1;
        self.last_answered = 0;
        self.in_flight.clear();
    }

    /// Number of user turns in the transcript.
    pub fn user_turns(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.sender == Sender::User)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Conversation {
        Conversation::new("hello!")
    }

    fn ask(conv: &mut Conversation, text: &str) -> PendingQuestion {
        conv.draft_mut().push_str(text);
        conv.submit().expect("accepted")
    }

    #[test]
    fn starts_with_greeting() {
        let conv = conversation();
        assert_eq!(conv.messages().len(), 1);
        assert_eq!(conv.messages()[0].sender, Sender::Bot);
        assert_eq!(conv.messages()[0].text, "hello!");
        assert!(!conv.is_loading());
    }

    #[test]
    fn whitespace_submission_is_ignored() {
        let mut conv = conversation();
        conv.draft_mut().push_str("   \t ");
        assert!(conv.submit().is_none());
        assert_eq!(conv.messages().len(), 1);
        assert_eq!(conv.user_turns(), 0);
        assert!(!conv.is_loading());
        assert_eq!(conv.draft(), "   \t ");
    }

    #[test]
    fn submit_appends_user_message_and_clears_draft() {
        let mut conv = conversation();
        let pending = ask(&mut conv, "  What are the hours?  ");

        assert_eq!(pending.question, "What are the hours?");
        assert_eq!(conv.draft(), "");
        assert!(conv.is_loading());
        let last = conv.messages().last().unwrap();
        assert_eq!(last.sender, Sender::User);
        assert_eq!(last.text, "What are the hours?");
    }

    #[test]
    fn resolve_appends_one_bot_message() {
        let mut conv = conversation();
        let pending = ask(&mut conv, "q");

        assert_eq!(conv.resolve(&pending, "a"), Resolution::Appended);
        assert_eq!(conv.messages().len(), 3);
        assert_eq!(conv.messages()[2].sender, Sender::Bot);
        assert!(!conv.is_loading());
    }

    #[test]
    fn in_order_answers_both_append() {
        let mut conv = conversation();
        let first = ask(&mut conv, "one");
        let second = ask(&mut conv, "two");

        assert_eq!(conv.resolve(&first, "a1"), Resolution::Appended);
        assert!(conv.is_loading());
        assert_eq!(conv.resolve(&second, "a2"), Resolution::Appended);
        assert!(!conv.is_loading());

        let texts: Vec<&str> = conv.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["hello!", "one", "two", "a1", "a2"]);
    }

    #[test]
    fn stale_answer_is_discarded() {
        let mut conv = conversation();
        let first = ask(&mut conv, "one");
        let second = ask(&mut conv, "two");

        assert_eq!(conv.resolve(&second, "a2"), Resolution::Appended);
        assert!(!conv.is_loading());
        assert_eq!(conv.resolve(&first, "a1"), Resolution::Discarded);

        let bot_texts: Vec<&str> = conv
            .messages()
            .iter()
            .filter(|m| m.sender == Sender::Bot)
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(bot_texts, ["hello!", "a2"]);
    }

    #[test]
    fn resolving_the_same_question_twice_appends_once() {
        let mut conv = conversation();
        let pending = ask(&mut conv, "q");

        assert_eq!(conv.resolve(&pending, "a"), Resolution::Appended);
        assert_eq!(conv.resolve(&pending.clone(), "a again"), Resolution::Discarded);
        assert_eq!(conv.messages().len(), 3);
        assert!(!conv.is_loading());
    }

    #[test]
    fn reset_discards_answers_from_previous_session() {
        let mut conv = conversation();
        let pending = ask(&mut conv, "q");
        conv.reset();

        assert_eq!(conv.messages().len(), 1);
        assert!(!conv.is_loading());
        assert_eq!(conv.resolve(&pending, "late"), Resolution::Discarded);
        assert_eq!(conv.messages().len(), 1);

        let fresh = ask(&mut conv, "again");
        assert_eq!(conv.resolve(&fresh, "a"), Resolution::Appended);
    }

    #[test]
    fn messages_are_never_rewritten() {
        let mut conv = conversation();
        let first = ask(&mut conv, "one");
        let snapshot: Vec<_> = conv.messages().to_vec();
        conv.resolve(&first, "a1");
        assert_eq!(&conv.messages()[..snapshot.len()], snapshot.as_slice());
    }
}
