use rand::seq::SliceRandom;

use crate::api::ApiError;
use crate::diff::{self, AnswerDiff};
use crate::models::LearningQuestion;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PracticeState {
    Loading,
    Failed(String),
    Empty,
    Ready,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipState {
    Idle,
    Loading,
    Ready(Vec<u8>),
    Failed(String),
}

/// One pass through the practice words handed out by the server.
pub struct Practice {
    pub session: Session,
    pub state: PracticeState,
    pub questions: Vec<LearningQuestion>,
    pub index: usize,
    pub input: String,
    pub clip: ClipState,
    pub result: Option<AnswerDiff>,
    /// Mismatch percentage of every checked word so far.
    pub mismatches: Vec<f64>,
}

impl Practice {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            state: PracticeState::Loading,
            questions: Vec::new(),
            index: 0,
            input: String::new(),
            clip: ClipState::Idle,
            result: None,
            mismatches: Vec::new(),
        }
    }

    pub fn retry(&mut self) {
        self.state = PracticeState::Loading;
    }

    pub fn loaded(&mut self, result: Result<Vec<LearningQuestion>, ApiError>, shuffle: bool) {
        if self.state != PracticeState::Loading {
            return;
        }
        match result {
            Ok(mut questions) if !questions.is_empty() => {
                if shuffle {
                    questions.shuffle(&mut rand::rng());
                }
                self.questions = questions;
                self.index = 0;
                self.state = PracticeState::Ready;
                self.reset_question();
            }
            Ok(_) => self.state = PracticeState::Empty,
            Err(e) => self.state = PracticeState::Failed(e.to_string()),
        }
    }

    fn reset_question(&mut self) {
        self.input.clear();
        self.clip = ClipState::Idle;
        self.result = None;
    }

    pub fn current(&self) -> Option<&LearningQuestion> {
        if self.state != PracticeState::Ready {
            return None;
        }
        self.questions.get(self.index)
    }

    /// URL of the current word's clip when it still needs fetching.
    pub fn clip_to_fetch(&mut self) -> Option<(usize, String)> {
        if !matches!(self.clip, ClipState::Idle | ClipState::Failed(_)) {
            return None;
        }
        let url = self.current()?.url.clone();
        self.clip = ClipState::Loading;
        Some((self.index, url))
    }

    /// Store a downloaded clip. Returns it for playback unless the user has
    /// already moved on to another word.
    pub fn clip_loaded(&mut self, index: usize, result: Result<Vec<u8>, ApiError>) -> Option<&[u8]> {
        if index != self.index || self.state != PracticeState::Ready {
            return None;
        }
        self.clip = match result {
            Ok(bytes) => ClipState::Ready(bytes),
            Err(e) => ClipState::Failed(e.to_string()),
        };
        self.clip()
    }

    pub fn clip(&self) -> Option<&[u8]> {
        match &self.clip {
            ClipState::Ready(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn type_char(&mut self, c: char) {
        if self.result.is_none() {
            self.input.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.result.is_none() {
            self.input.pop();
        }
    }

    /// Grade the typed answer against the current word.
    pub fn check(&mut self) -> Option<&AnswerDiff> {
        if self.result.is_some() {
            return self.result.as_ref();
        }
        let reference = self.current()?.correct_answer.clone();
        let diff = diff::compare(&reference, &self.input);
        tracing::debug!(
            word = %reference,
            mismatches = diff.mismatches,
            percent = diff.mismatch_percent(),
            "checked practice answer"
        );
        self.mismatches.push(diff.mismatch_percent());
        self.result = Some(diff);
        self.result.as_ref()
    }

    /// Move to the next word. Returns false once the list is exhausted.
    pub fn advance(&mut self) -> bool {
        if self.state != PracticeState::Ready || self.result.is_none() {
            return self.state == PracticeState::Ready;
        }
        self.index += 1;
        self.reset_question();
        if self.index >= self.questions.len() {
            self.state = PracticeState::Complete;
            return false;
        }
        true
    }

    /// Session accuracy: 100 minus the mean mismatch percentage.
    pub fn accuracy(&self) -> u32 {
        if self.mismatches.is_empty() {
            return 0;
        }
        let mean = self.mismatches.iter().sum::<f64>() / self.mismatches.len() as f64;
        (100.0 - mean).round().clamp(0.0, 100.0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<LearningQuestion> {
        list.iter()
            .map(|w| LearningQuestion {
                correct_answer: w.to_string(),
                url: format!("/static/audio/{w}.mp3"),
            })
            .collect()
    }

    fn practice(list: &[&str]) -> Practice {
        let mut p = Practice::new(Session::new("amy", "3B").unwrap());
        p.loaded(Ok(words(list)), false);
        p
    }

    fn answer(p: &mut Practice, text: &str) {
        for c in text.chars() {
            p.type_char(c);
        }
        p.check();
    }

    #[test]
    fn empty_list_and_errors() {
        let mut p = Practice::new(Session::new("amy", "3B").unwrap());
        p.loaded(Ok(Vec::new()), false);
        assert_eq!(p.state, PracticeState::Empty);
        assert!(p.current().is_none());

        p.retry();
        p.loaded(Err(ApiError::Decode("bad".into())), false);
        assert!(matches!(p.state, PracticeState::Failed(_)));
    }

    #[test]
    fn runs_through_words_and_scores() {
        let mut p = practice(&["cat", "dog"]);
        assert_eq!(p.current().unwrap().correct_answer, "cat");

        answer(&mut p, "cbt");
        assert_eq!(p.result.as_ref().unwrap().mismatch_percent_rounded(), 33);
        // input is frozen once checked
        p.type_char('x');
        assert_eq!(p.input, "cbt");
        assert!(p.advance());

        answer(&mut p, "DOG");
        assert!(p.result.as_ref().unwrap().is_perfect());
        assert!(!p.advance());
        assert_eq!(p.state, PracticeState::Complete);
        assert_eq!(p.accuracy(), 83);
    }

    #[test]
    fn advance_needs_a_checked_answer() {
        let mut p = practice(&["cat", "dog"]);
        assert!(p.advance());
        assert_eq!(p.index, 0);
    }

    #[test]
    fn check_is_idempotent() {
        let mut p = practice(&["cat"]);
        answer(&mut p, "c");
        p.check();
        assert_eq!(p.mismatches.len(), 1);
    }

    #[test]
    fn clips_are_fetched_once_and_stale_ones_dropped() {
        let mut p = practice(&["cat", "dog"]);
        assert_eq!(p.clip_to_fetch(), Some((0, "/static/audio/cat.mp3".to_string())));
        assert_eq!(p.clip_to_fetch(), None);

        answer(&mut p, "cat");
        p.advance();
        assert!(p.clip_loaded(0, Ok(vec![1])).is_none());
        assert_eq!(p.clip, ClipState::Idle);

        assert_eq!(p.clip_to_fetch(), Some((1, "/static/audio/dog.mp3".to_string())));
        assert_eq!(p.clip_loaded(1, Ok(vec![9])), Some(&[9u8][..]));
        assert_eq!(p.clip(), Some(&[9u8][..]));
    }

    #[test]
    fn failed_clip_can_be_refetched() {
        let mut p = practice(&["cat"]);
        p.clip_to_fetch();
        p.clip_loaded(0, Err(ApiError::Status(404, String::new())));
        assert!(matches!(p.clip, ClipState::Failed(_)));
        assert!(p.clip_to_fetch().is_some());
    }

    #[test]
    fn shuffle_keeps_every_word() {
        let mut p = Practice::new(Session::new("amy", "3B").unwrap());
        p.loaded(Ok(words(&["a", "b", "c", "d", "e"])), true);
        let mut seen: Vec<_> = p.questions.iter().map(|q| q.correct_answer.clone()).collect();
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn no_answers_no_accuracy() {
        let p = practice(&["cat"]);
        assert_eq!(p.accuracy(), 0);
    }

    #[test]
    fn late_list_does_not_restart_a_session() {
        let mut p = practice(&["cat", "dog"]);
        answer(&mut p, "cbt");
        p.loaded(Ok(words(&["sun"])), false);

        assert_eq!(p.current().unwrap().correct_answer, "cat");
        assert_eq!(p.input, "cbt");
        assert!(p.result.is_some());
        assert_eq!(p.mismatches.len(), 1);
    }
}
