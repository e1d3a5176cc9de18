use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome stored for a single question. The backend writes either a
/// grade word ("correct" / "incorrect") or a numeric score.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum QuestionOutcome {
    Score(f64),
    Text(String),
}

impl fmt::Display for QuestionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionOutcome::Score(v) => write!(f, "{v:.0}"),
            QuestionOutcome::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            0 => Some(Difficulty::Easy),
            1 => Some(Difficulty::Medium),
            2 => Some(Difficulty::Hard),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// One completed screening test, as returned by `/get_user_class_data`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TestRecord {
    pub test_id: i64,
    pub username: String,
    #[serde(rename = "class")]
    pub class_name: String,
    #[serde(default)]
    pub question1: Option<QuestionOutcome>,
    #[serde(default)]
    pub question2: Option<QuestionOutcome>,
    #[serde(default)]
    pub question3: Option<QuestionOutcome>,
    #[serde(default)]
    pub question4: Option<QuestionOutcome>,
    #[serde(default)]
    pub question5: Option<QuestionOutcome>,
    #[serde(default)]
    pub spelling_accuracy: Option<f64>,
    #[serde(default)]
    pub handwriting_metric: Option<f64>,
    #[serde(default)]
    pub stutter_metric: Option<f64>,
    #[serde(default)]
    pub speaking_accuracy: Option<f64>,
    #[serde(default)]
    pub total_score: Option<f64>,
    #[serde(default)]
    pub difficulty_level: Option<i64>,
}

impl TestRecord {
    pub fn questions(&self) -> [Option<&QuestionOutcome>; 5] {
        [
            self.question1.as_ref(),
            self.question2.as_ref(),
            self.question3.as_ref(),
            self.question4.as_ref(),
            self.question5.as_ref(),
        ]
    }

    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty_level.and_then(Difficulty::from_level)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LearningQuestion {
    pub correct_answer: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LearningResponse {
    pub audio_files: Vec<LearningQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WordPrompt {
    pub word_prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhrasePrompt {
    pub phrase: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct UsernameBody<'a> {
    pub username: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_decodes_backend_row() {
        let json = r#"{
            "test_id": 7,
            "username": "amy",
            "class": "3B",
            "question1": "correct",
            "question2": "incorrect",
            "question3": 82.5,
            "question4": null,
            "question5": "correct",
            "spelling_accuracy": 100,
            "stutter_metric": 0.1,
            "speaking_accuracy": 87.0,
            "handwriting_metric": null,
            "total_score": 74.25,
            "difficulty_level": 1
        }"#;
        let record: TestRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.test_id, 7);
        assert_eq!(record.class_name, "3B");
        assert_eq!(
            record.question1,
            Some(QuestionOutcome::Text("correct".into()))
        );
        assert_eq!(record.question3, Some(QuestionOutcome::Score(82.5)));
        assert_eq!(record.question4, None);
        assert_eq!(record.handwriting_metric, None);
        assert_eq!(record.difficulty(), Some(Difficulty::Medium));
        assert_eq!(record.questions().iter().filter(|q| q.is_some()).count(), 4);
    }

    #[test]
    fn record_tolerates_missing_optional_columns() {
        let json = r#"{"test_id": 1, "username": "amy", "class": "3B"}"#;
        let record: TestRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.total_score, None);
        assert_eq!(record.difficulty(), None);
    }

    #[test]
    fn outcome_display() {
        assert_eq!(QuestionOutcome::Score(66.6).to_string(), "67");
        assert_eq!(QuestionOutcome::Text("correct".into()).to_string(), "correct");
    }

    #[test]
    fn learning_response_shape() {
        let json = r#"{"audio_files": [{"correct_answer": "ship", "url": "/static/audio/ship.mp3"}]}"#;
        let resp: LearningResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.audio_files.len(), 1);
        assert_eq!(resp.audio_files[0].correct_answer, "ship");
    }
}
