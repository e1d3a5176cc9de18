//! HTTP client for the DysCover screening backend.
//!
//! Every call is a single request/response with no retries. Failures come
//! back as [`ApiError`], whose display string is what the screens show.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{
    LearningQuestion, LearningResponse, PhrasePrompt, TestRecord, UsernameBody, WordPrompt,
};
use crate::session::Session;

const USER_AGENT: &str = concat!("dyscover/", env!("CARGO_PKG_VERSION"));
const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned {0}: {1}")]
    Status(u16, String),

    #[error("Could not read server response: {0}")]
    Decode(String),

    #[error("Could not use file: {0}")]
    Upload(String),
}

/// The five screening questions, in the order they are asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Question {
    One,
    Two,
    Three,
    Four,
    Five,
}

/// What `GET /question_*` hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Audio,
    Word,
    Phrase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Audio(Vec<u8>),
    Text(String),
}

impl Question {
    pub const ALL: [Question; 5] = [
        Question::One,
        Question::Two,
        Question::Three,
        Question::Four,
        Question::Five,
    ];

    pub fn number(self) -> usize {
        match self {
            Question::One => 1,
            Question::Two => 2,
            Question::Three => 3,
            Question::Four => 4,
            Question::Five => 5,
        }
    }

    pub fn next(self) -> Option<Question> {
        Question::ALL.get(self.number()).copied()
    }

    pub fn route(self) -> &'static str {
        match self {
            Question::One => "question_one",
            Question::Two => "question_two",
            Question::Three => "question_three",
            Question::Four => "question_four",
            Question::Five => "question_five",
        }
    }

    pub fn prompt_kind(self) -> PromptKind {
        match self {
            Question::One | Question::Two => PromptKind::Audio,
            Question::Three | Question::Four => PromptKind::Word,
            Question::Five => PromptKind::Phrase,
        }
    }

    /// JSON key for questions answered with text.
    pub fn answer_key(self) -> Option<&'static str> {
        match self {
            Question::One => Some("question_one_answer"),
            Question::Two => Some("question_two_answer"),
            _ => None,
        }
    }

    /// Multipart part name for questions answered with a file.
    pub fn upload_part(self) -> Option<&'static str> {
        match self {
            Question::Three | Question::Four => Some("audio"),
            Question::Five => Some("image"),
            _ => None,
        }
    }
}

/// A file read from disk for a multipart answer.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mime = infer::get(&bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or(FALLBACK_MIME)
            .to_string();
        Self {
            file_name: file_name.into(),
            mime,
            bytes,
        }
    }

    pub async fn read(path: &Path) -> Result<Self, ApiError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::Upload(format!("{}: {e}", path.display())))?;
        if bytes.is_empty() {
            return Err(ApiError::Upload(format!("{} is empty", path.display())));
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, bytes))
    }

    /// Reject files whose sniffed type clearly does not belong in `part`.
    /// Unrecognised content is let through.
    pub fn check_part(&self, part: &str) -> Result<(), ApiError> {
        if self.mime == FALLBACK_MIME {
            return Ok(());
        }
        let expected = match part {
            "image" => "image/",
            "audio" => "audio/",
            _ => return Ok(()),
        };
        // m4a voice memos sniff as video/mp4 containers
        let accepted = self.mime.starts_with(expected)
            || (part == "audio" && self.mime == "video/mp4");
        if accepted {
            Ok(())
        } else {
            Err(ApiError::Upload(format!(
                "{} looks like {}, expected {part}",
                self.file_name, self.mime
            )))
        }
    }
}

pub struct BackendClient {
    http: reqwest::Client,
    base: Url,
}

impl BackendClient {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut base =
            Url::parse(server_url).map_err(|e| ApiError::InvalidUrl(format!("{server_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(server_url.to_string()));
        }
        // keep any path prefix when joining routes
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, route: &str) -> Result<Url, ApiError> {
        self.base
            .join(route)
            .map_err(|e| ApiError::InvalidUrl(format!("{route}: {e}")))
    }

    pub async fn start_test(&self, username: &str) -> Result<(), ApiError> {
        self.post_username("start", username).await
    }

    pub async fn finish_test(&self, username: &str) -> Result<(), ApiError> {
        self.post_username("finish_test", username).await
    }

    async fn post_username(&self, route: &str, username: &str) -> Result<(), ApiError> {
        let url = self.url(route)?;
        tracing::debug!(%url, username, "POST");
        let response = self
            .http
            .post(url)
            .json(&UsernameBody { username })
            .send()
            .await
            .map_err(network)?;
        check_status(response).await?;
        tracing::info!(route, username, "request accepted");
        Ok(())
    }

    /// Load the prompt for `question`: audio bytes or the text to read/write.
    pub async fn fetch_prompt(&self, question: Question) -> Result<Prompt, ApiError> {
        let url = self.url(question.route())?;
        tracing::debug!(%url, question = question.number(), "fetching prompt");
        let response = self.http.get(url).send().await.map_err(network)?;
        let response = check_status(response).await?;

        let prompt = match question.prompt_kind() {
            PromptKind::Audio => Prompt::Audio(read_bytes(response).await?),
            PromptKind::Word => Prompt::Text(decode::<WordPrompt>(response).await?.word_prompt),
            PromptKind::Phrase => Prompt::Text(decode::<PhrasePrompt>(response).await?.phrase),
        };
        Ok(prompt)
    }

    pub async fn submit_text(&self, question: Question, answer: &str) -> Result<(), ApiError> {
        let key = question.answer_key().ok_or_else(|| {
            ApiError::Upload(format!("question {} takes a file", question.number()))
        })?;
        let mut body = Map::new();
        body.insert(key.to_string(), Value::String(answer.to_string()));

        let url = self.url(question.route())?;
        tracing::debug!(%url, question = question.number(), "submitting answer");
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(network)?;
        check_status(response).await?;
        tracing::info!(question = question.number(), "answer submitted");
        Ok(())
    }

    pub async fn submit_upload(&self, question: Question, upload: Upload) -> Result<(), ApiError> {
        let part_name = question.upload_part().ok_or_else(|| {
            ApiError::Upload(format!("question {} takes a typed answer", question.number()))
        })?;
        upload.check_part(part_name)?;

        let size = upload.bytes.len();
        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name.clone())
            .mime_str(&upload.mime)
            .map_err(|e| ApiError::Upload(e.to_string()))?;
        let form = Form::new().part(part_name, part);

        let url = self.url(question.route())?;
        tracing::debug!(%url, part = part_name, size, mime = %upload.mime, "uploading");
        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(network)?;
        check_status(response).await?;
        tracing::info!(question = question.number(), file = %upload.file_name, "upload accepted");
        Ok(())
    }

    pub async fn user_class_data(&self, session: &Session) -> Result<Vec<TestRecord>, ApiError> {
        let url = self.url("get_user_class_data")?;
        let response = self
            .http
            .get(url)
            .query(&[
                ("username", session.username()),
                ("class_name", session.class_name()),
            ])
            .send()
            .await
            .map_err(network)?;
        let response = check_status(response).await?;
        let records: Vec<TestRecord> = decode(response).await?;
        tracing::info!(
            username = session.username(),
            class = session.class_name(),
            count = records.len(),
            "loaded test history"
        );
        Ok(records)
    }

    pub async fn learning_questions(
        &self,
        username: &str,
    ) -> Result<Vec<LearningQuestion>, ApiError> {
        let url = self.url("get_learning_audio_files")?;
        let response = self
            .http
            .get(url)
            .query(&[("username", username)])
            .send()
            .await
            .map_err(network)?;
        let response = check_status(response).await?;
        let learning: LearningResponse = decode(response).await?;
        tracing::info!(username, count = learning.audio_files.len(), "loaded practice words");
        Ok(learning.audio_files)
    }

    /// Download audio for a practice word. `url` may be absolute or relative
    /// to the server.
    pub async fn fetch_audio(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let url = self.url(url)?;
        tracing::debug!(%url, "fetching audio");
        let response = self.http.get(url).send().await.map_err(network)?;
        let response = check_status(response).await?;
        read_bytes(response).await
    }
}

fn network(e: reqwest::Error) -> ApiError {
    tracing::warn!(error = %e, "request failed");
    ApiError::Network(e.to_string())
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let response_url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), url = %response_url, body = %body, "server rejected request");
    Err(ApiError::Status(status.as_u16(), body))
}

async fn read_bytes(response: Response) -> Result<Vec<u8>, ApiError> {
    let bytes = response.bytes().await.map_err(network)?;
    Ok(bytes.to_vec())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await.map_err(network)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::warn!(error = %e, "malformed JSON from server");
        ApiError::Decode(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client(server: &Server) -> BackendClient {
        BackendClient::new(&server.url(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn question_contract() {
        assert_eq!(Question::One.route(), "question_one");
        assert_eq!(Question::Five.route(), "question_five");
        assert_eq!(Question::Two.answer_key(), Some("question_two_answer"));
        assert_eq!(Question::Three.upload_part(), Some("audio"));
        assert_eq!(Question::Five.upload_part(), Some("image"));
        assert_eq!(Question::One.upload_part(), None);
        assert_eq!(Question::Four.next(), Some(Question::Five));
        assert_eq!(Question::Five.next(), None);
    }

    #[test]
    fn rejects_unusable_server_url() {
        assert!(matches!(
            BackendClient::new("not a url", Duration::from_secs(1)),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn keeps_path_prefix() {
        let client = BackendClient::new("http://localhost:8443/api", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.url("start").unwrap().as_str(),
            "http://localhost:8443/api/start"
        );
        assert_eq!(
            client.url("https://cdn.example.com/a.mp3").unwrap().as_str(),
            "https://cdn.example.com/a.mp3"
        );
    }

    #[test]
    fn upload_sniffs_mime() {
        let png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let upload = Upload::new("page.png", png);
        assert_eq!(upload.mime, "image/png");
        assert!(upload.check_part("image").is_ok());
        assert!(matches!(upload.check_part("audio"), Err(ApiError::Upload(_))));

        let unknown = Upload::new("clip.raw", b"hello".to_vec());
        assert_eq!(unknown.mime, FALLBACK_MIME);
        assert!(unknown.check_part("audio").is_ok());
    }

    #[tokio::test]
    async fn upload_read_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Upload::read(&dir.path().join("nope.wav")).await.unwrap_err();
        assert!(matches!(err, ApiError::Upload(_)));
    }

    #[tokio::test]
    async fn upload_read_takes_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take1.wav");
        std::fs::write(&path, b"RIFF\x24\0\0\0WAVEfmt ").unwrap();
        let upload = Upload::read(&path).await.unwrap();
        assert_eq!(upload.file_name, "take1.wav");
        assert!(upload.mime.starts_with("audio/"));
    }

    #[tokio::test]
    async fn start_posts_username() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/start")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(serde_json::json!({"username": "amy"})))
            .with_status(200)
            .with_body(r#"{"message": "User amy started successfully"}"#)
            .create_async()
            .await;

        client(&server).start_test("amy").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn finish_surfaces_status_errors() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/finish_test")
            .with_status(400)
            .with_body("Missing username")
            .create_async()
            .await;

        let err = client(&server).finish_test("amy").await.unwrap_err();
        match err {
            ApiError::Status(code, body) => {
                assert_eq!(code, 400);
                assert_eq!(body, "Missing username");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn audio_prompt_is_raw_bytes() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/question_one")
            .with_status(200)
            .with_header("content-type", "audio/mpeg")
            .with_body([0xFF, 0xFB, 0x90, 0x00])
            .create_async()
            .await;

        let prompt = client(&server).fetch_prompt(Question::One).await.unwrap();
        assert_eq!(prompt, Prompt::Audio(vec![0xFF, 0xFB, 0x90, 0x00]));
    }

    #[tokio::test]
    async fn word_and_phrase_prompts() {
        let mut server = Server::new_async().await;
        let _three = server
            .mock("GET", "/question_three")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"word_prompt": "butterfly"}"#)
            .create_async()
            .await;
        let _five = server
            .mock("GET", "/question_five")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"phrase": "The cat sat on the mat."}"#)
            .create_async()
            .await;

        let client = client(&server);
        assert_eq!(
            client.fetch_prompt(Question::Three).await.unwrap(),
            Prompt::Text("butterfly".into())
        );
        assert_eq!(
            client.fetch_prompt(Question::Five).await.unwrap(),
            Prompt::Text("The cat sat on the mat.".into())
        );
    }

    #[tokio::test]
    async fn malformed_prompt_is_decode_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/question_four")
            .with_status(200)
            .with_body(r#"{"word": "oops"}"#)
            .create_async()
            .await;

        let err = client(&server).fetch_prompt(Question::Four).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn text_answer_uses_question_key() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/question_two")
            .match_body(Matcher::Json(serde_json::json!({"question_two_answer": "D"})))
            .with_status(200)
            .create_async()
            .await;

        client(&server).submit_text(Question::Two, "D").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn text_answer_refused_for_upload_question() {
        let server = Server::new_async().await;
        let err = client(&server)
            .submit_text(Question::Five, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upload(_)));
    }

    #[tokio::test]
    async fn upload_is_single_named_part() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/question_three")
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data; boundary=.+".into()),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="audio""#.into()),
                Matcher::Regex(r#"filename="take1.wav""#.into()),
            ]))
            .with_status(200)
            .create_async()
            .await;

        let upload = Upload::new("take1.wav", b"RIFF\x24\0\0\0WAVEfmt ".to_vec());
        client(&server)
            .submit_upload(Question::Three, upload)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn class_data_sends_query() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/get_user_class_data")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("username".into(), "amy".into()),
                Matcher::UrlEncoded("class_name".into(), "3 B".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"test_id": 1, "username": "amy", "class": "3 B", "total_score": 71.5},
                    {"test_id": 2, "username": "amy", "class": "3 B", "total_score": 80}]"#,
            )
            .create_async()
            .await;

        let session = Session::new("amy", "3 B").unwrap();
        let records = client(&server).user_class_data(&session).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].total_score, Some(80.0));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn class_data_rejects_bad_json() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/get_user_class_data")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let session = Session::new("amy", "3B").unwrap();
        let err = client(&server).user_class_data(&session).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn learning_questions_and_relative_audio() {
        let mut server = Server::new_async().await;
        let _list = server
            .mock("GET", "/get_learning_audio_files")
            .match_query(Matcher::UrlEncoded("username".into(), "amy".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"audio_files": [
                    {"correct_answer": "ship", "url": "/static/audio/ship.mp3"},
                    {"correct_answer": "shop", "url": "/static/audio/shop.mp3"}
                ]}"#,
            )
            .create_async()
            .await;
        let _audio = server
            .mock("GET", "/static/audio/ship.mp3")
            .with_status(200)
            .with_body("ID3")
            .create_async()
            .await;

        let client = client(&server);
        let questions = client.learning_questions("amy").await.unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[1].correct_answer, "shop");

        let bytes = client.fetch_audio(&questions[0].url).await.unwrap();
        assert_eq!(bytes, b"ID3");
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let client = BackendClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.start_test("amy").await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }
}
