//! Step machine for the four-section screening test.

use std::path::PathBuf;

use crate::api::{ApiError, Prompt, PromptKind, Question};
use crate::session::Session;

pub const SECTION_COUNT: usize = 4;
pub const LETTER_CHOICES: [char; 4] = ['B', 'D', 'W', 'M'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Comprehension,
    Pronunciation,
    StutterDetection,
    Handwriting,
}

impl Section {
    pub fn of(question: Question) -> Self {
        match question {
            Question::One | Question::Two => Section::Comprehension,
            Question::Three => Section::Pronunciation,
            Question::Four => Section::StutterDetection,
            Question::Five => Section::Handwriting,
        }
    }

    pub fn number(self) -> usize {
        match self {
            Section::Comprehension => 1,
            Section::Pronunciation => 2,
            Section::StutterDetection => 3,
            Section::Handwriting => 4,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Section::Comprehension => "Comprehension",
            Section::Pronunciation => "Pronunciation",
            Section::StutterDetection => "Stutter Detection",
            Section::Handwriting => "Handwriting",
        }
    }
}

/// How a question is answered on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    Typed,
    Letter,
    AudioFile,
    ImageFile,
}

impl AnswerKind {
    pub fn of(question: Question) -> Self {
        match question {
            Question::One => AnswerKind::Typed,
            Question::Two => AnswerKind::Letter,
            Question::Three | Question::Four => AnswerKind::AudioFile,
            Question::Five => AnswerKind::ImageFile,
        }
    }
}

pub fn heading(question: Question) -> &'static str {
    match question {
        Question::One => "Listen & Type",
        Question::Two => "Letter Discrimination",
        Question::Three => "Pronunciation",
        Question::Four => "Stutter Detection",
        Question::Five => "Handwriting",
    }
}

pub fn instructions(question: Question) -> &'static str {
    match question {
        Question::One => "Listen carefully, then type what you hear.",
        Question::Two => "Listen to the letter, then pick the one you heard.",
        Question::Three => "Read the word aloud and record yourself. Enter the recording's file path.",
        Question::Four => "Read the word aloud so we can check fluency. Enter the recording's file path.",
        Question::Five => "Write the sentence by hand and photograph it. Enter the photo's file path.",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    Letter(char),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptState {
    Loading,
    Ready(Prompt),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Starting,
    StartFailed(String),
    Answering,
    Finishing,
    FinishFailed(String),
    Done,
}

/// What the screen should do after a submission completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Next(Question),
    Finish,
    Stay,
}

pub struct TestFlow {
    pub session: Session,
    pub stage: Stage,
    pub question: Question,
    pub prompt: PromptState,
    pub input: String,
    pub letter: usize,
    pub submitting: bool,
    pub status: Option<String>,
}

impl TestFlow {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            stage: Stage::Starting,
            question: Question::One,
            prompt: PromptState::Loading,
            input: String::new(),
            letter: 0,
            submitting: false,
            status: None,
        }
    }

    pub fn section(&self) -> Section {
        Section::of(self.question)
    }

    pub fn retry_start(&mut self) {
        self.stage = Stage::Starting;
    }

    /// Returns true when the first question should be loaded.
    pub fn started(&mut self, result: Result<(), ApiError>) -> bool {
        match result {
            Ok(()) => {
                self.stage = Stage::Answering;
                self.show(Question::One);
                true
            }
            Err(e) => {
                self.stage = Stage::StartFailed(e.to_string());
                false
            }
        }
    }

    fn show(&mut self, question: Question) {
        self.question = question;
        self.prompt = PromptState::Loading;
        self.input.clear();
        self.letter = 0;
        self.submitting = false;
        self.status = None;
    }

    pub fn reload_prompt(&mut self) {
        self.prompt = PromptState::Loading;
    }

    /// Store a loaded prompt. Returns the audio to play, if any. Prompts for
    /// a question the user has moved past are dropped.
    pub fn prompt_loaded(
        &mut self,
        question: Question,
        result: Result<Prompt, ApiError>,
    ) -> Option<&[u8]> {
        if question != self.question || self.stage != Stage::Answering {
            tracing::debug!(question = question.number(), "dropping stale prompt");
            return None;
        }
        self.prompt = match result {
            Ok(prompt) => PromptState::Ready(prompt),
            Err(e) => PromptState::Failed(e.to_string()),
        };
        self.audio()
    }

    pub fn audio(&self) -> Option<&[u8]> {
        match &self.prompt {
            PromptState::Ready(Prompt::Audio(bytes)) => Some(bytes),
            _ => None,
        }
    }

    pub fn prompt_text(&self) -> Option<&str> {
        match &self.prompt {
            PromptState::Ready(Prompt::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn type_char(&mut self, c: char) {
        if AnswerKind::of(self.question) == AnswerKind::Letter {
            let upper = c.to_ascii_uppercase();
            if let Some(i) = LETTER_CHOICES.iter().position(|&l| l == upper) {
                self.letter = i;
            }
        } else {
            self.input.push(c);
        }
    }

    pub fn backspace(&mut self) {
        self.input.pop();
    }

    pub fn next_letter(&mut self) {
        self.letter = (self.letter + 1) % LETTER_CHOICES.len();
    }

    pub fn previous_letter(&mut self) {
        self.letter = (self.letter + LETTER_CHOICES.len() - 1) % LETTER_CHOICES.len();
    }

    pub fn selected_letter(&self) -> char {
        LETTER_CHOICES[self.letter]
    }

    /// Validate the current input and mark the question as submitting.
    pub fn take_answer(&mut self) -> Option<Answer> {
        if self.submitting || self.stage != Stage::Answering {
            return None;
        }
        if !matches!(self.prompt, PromptState::Ready(_)) {
            self.status = Some("Wait for the question to load".to_string());
            return None;
        }
        let input = self.input.trim();
        let answer = match AnswerKind::of(self.question) {
            AnswerKind::Letter => Answer::Letter(self.selected_letter()),
            _ if input.is_empty() => {
                self.status = Some(match AnswerKind::of(self.question) {
                    AnswerKind::Typed => "Type your answer first".to_string(),
                    _ => "Enter a file path first".to_string(),
                });
                return None;
            }
            AnswerKind::Typed => Answer::Text(input.to_string()),
            AnswerKind::AudioFile | AnswerKind::ImageFile => Answer::File(PathBuf::from(input)),
        };
        self.submitting = true;
        self.status = None;
        Some(answer)
    }

    pub fn submitted(&mut self, question: Question, result: Result<(), ApiError>) -> Advance {
        if question != self.question || !self.submitting {
            return Advance::Stay;
        }
        self.submitting = false;
        match result {
            Ok(()) => match question.next() {
                Some(next) => {
                    self.show(next);
                    Advance::Next(next)
                }
                None => {
                    self.stage = Stage::Finishing;
                    Advance::Finish
                }
            },
            Err(e) => {
                self.status = Some(e.to_string());
                Advance::Stay
            }
        }
    }

    pub fn retry_finish(&mut self) {
        self.stage = Stage::Finishing;
    }

    pub fn finished(&mut self, result: Result<(), ApiError>) {
        if self.stage != Stage::Finishing {
            return;
        }
        self.stage = match result {
            Ok(()) => Stage::Done,
            Err(e) => Stage::FinishFailed(e.to_string()),
        };
    }

    pub fn expects_audio(&self) -> bool {
        self.question.prompt_kind() == PromptKind::Audio
    }
}
