use std::{error::Error, future::Future, io, path::PathBuf, sync::Arc, time::Duration};

use crate::{
    api::{ApiError, BackendClient, Prompt, Question, Upload},
    audio::AudioPlayer,
    config::Settings,
    learning::{Practice, PracticeState},
    models::{LearningQuestion, TestRecord},
    session::Session,
    test_flow::{Advance, Answer, AnswerKind, PromptState, Stage, TestFlow},
    ui::draw_ui,
};

use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Completion of a background request, delivered back to the UI loop.
#[derive(Debug)]
pub enum AppEvent {
    HistoryLoaded(Result<Vec<TestRecord>, ApiError>),
    TestStarted(Result<(), ApiError>),
    PromptLoaded(Question, Result<Prompt, ApiError>),
    AnswerSubmitted(Question, Result<(), ApiError>),
    TestFinished(Result<(), ApiError>),
    PracticeLoaded(Result<Vec<LearningQuestion>, ApiError>),
    ClipLoaded(usize, Result<Vec<u8>, ApiError>),
}

/// An [`AppEvent`] tagged with the screen generation that asked for it.
#[derive(Debug)]
pub struct Completion {
    pub generation: u64,
    pub event: AppEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Username,
    ClassName,
}

pub struct UsernameForm {
    pub username: String,
    pub class_name: String,
    pub focus: Field,
    pub error: Option<String>,
}

impl UsernameForm {
    fn prefilled(settings: &Settings) -> Self {
        Self {
            username: settings.last_username.clone(),
            class_name: settings.last_class_name.clone(),
            focus: Field::Username,
            error: None,
        }
    }

    fn focused(&mut self) -> &mut String {
        match self.focus {
            Field::Username => &mut self.username,
            Field::ClassName => &mut self.class_name,
        }
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Field::Username => Field::ClassName,
            Field::ClassName => Field::Username,
        };
    }
}

pub enum History {
    Loading,
    Loaded(Vec<TestRecord>),
    Failed(String),
}

pub struct Dashboard {
    pub session: Session,
    pub history: History,
    pub selected: usize,
}

impl Dashboard {
    fn new(session: Session) -> Self {
        Self {
            session,
            history: History::Loading,
            selected: 0,
        }
    }

    pub fn records(&self) -> &[TestRecord] {
        match &self.history {
            History::Loaded(records) => records,
            _ => &[],
        }
    }
}

pub enum Screen {
    Welcome,
    EnterUsername(UsernameForm),
    Dashboard(Dashboard),
    Test(TestFlow),
    Learning(Practice),
}

/// Spawns requests on the runtime and routes their results to the UI loop.
struct Backend {
    client: Arc<BackendClient>,
    runtime: Handle,
    tx: UnboundedSender<Completion>,
    /// Bumped whenever a screen that issues requests is opened.
    generation: u64,
}

impl Backend {
    fn spawn<T, F, W>(&self, request: F, wrap: W)
    where
        T: Send + 'static,
        F: Future<Output = Result<T, ApiError>> + Send + 'static,
        W: FnOnce(Result<T, ApiError>) -> AppEvent + Send + 'static,
    {
        let tx = self.tx.clone();
        let generation = self.generation;
        self.runtime.spawn(async move {
            let result = request.await;
            if let Err(e) = &result {
                tracing::warn!(error = %e, "request failed");
            }
            // receiver only goes away on shutdown
            let _ = tx.send(Completion {
                generation,
                event: wrap(result),
            });
        });
    }

    fn load_history(&self, session: &Session) {
        let client = self.client.clone();
        let session = session.clone();
        self.spawn(
            async move { client.user_class_data(&session).await },
            AppEvent::HistoryLoaded,
        );
    }

    fn start_test(&self, session: &Session) {
        let client = self.client.clone();
        let username = session.username().to_string();
        self.spawn(
            async move { client.start_test(&username).await },
            AppEvent::TestStarted,
        );
    }

    fn load_prompt(&self, question: Question) {
        let client = self.client.clone();
        self.spawn(
            async move { client.fetch_prompt(question).await },
            move |result| AppEvent::PromptLoaded(question, result),
        );
    }

    fn submit(&self, question: Question, answer: Answer) {
        let client = self.client.clone();
        self.spawn(
            async move {
                match answer {
                    Answer::Text(text) => client.submit_text(question, &text).await,
                    Answer::Letter(letter) => {
                        client.submit_text(question, &letter.to_string()).await
                    }
                    Answer::File(path) => {
                        let upload = Upload::read(&path).await?;
                        client.submit_upload(question, upload).await
                    }
                }
            },
            move |result| AppEvent::AnswerSubmitted(question, result),
        );
    }

    fn finish_test(&self, session: &Session) {
        let client = self.client.clone();
        let username = session.username().to_string();
        self.spawn(
            async move { client.finish_test(&username).await },
            AppEvent::TestFinished,
        );
    }

    fn load_practice(&self, session: &Session) {
        let client = self.client.clone();
        let username = session.username().to_string();
        self.spawn(
            async move { client.learning_questions(&username).await },
            AppEvent::PracticeLoaded,
        );
    }

    fn load_clip(&self, index: usize, url: String) {
        let client = self.client.clone();
        self.spawn(
            async move { client.fetch_audio(&url).await },
            move |result| AppEvent::ClipLoaded(index, result),
        );
    }
}

pub struct App {
    pub screen: Screen,
    pub settings: Settings,
    pub notice: Option<String>,
    pub shuffle: bool,
    config_path: Option<PathBuf>,
    player: AudioPlayer,
    backend: Backend,
    events: UnboundedReceiver<Completion>,
}

impl App {
    pub fn new(
        settings: Settings,
        config_path: Option<PathBuf>,
        client: BackendClient,
        runtime: Handle,
        shuffle: bool,
    ) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        Self {
            screen: Screen::Welcome,
            settings,
            notice: None,
            shuffle,
            config_path,
            player: AudioPlayer::default(),
            backend: Backend {
                client: Arc::new(client),
                runtime,
                tx,
                generation: 0,
            },
            events,
        }
    }

    pub fn server_url(&self) -> &str {
        self.backend.client.base_url().as_str()
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
    }

    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = ratatui::backend::CrosstermBackend::new(stdout);
        let mut terminal = ratatui::Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        self.player.stop();
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        result
    }

    fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut ratatui::Terminal<B>,
    ) -> Result<(), Box<dyn Error>> {
        loop {
            while let Ok(completion) = self.events.try_recv() {
                self.handle_event(completion);
            }

            terminal.draw(|f| draw_ui(f, self))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn play(&mut self, bytes: &[u8]) {
        if let Err(e) = self.player.play(bytes) {
            tracing::warn!(error = %e, "audio playback failed");
            self.notice = Some(format!("Could not play audio: {e}"));
        }
    }

    /// Start a new screen generation. Results for earlier screens are dropped.
    fn next_generation(&mut self) {
        self.backend.generation += 1;
    }

    fn open_dashboard(&mut self, session: Session) {
        self.player.stop();
        self.next_generation();
        self.backend.load_history(&session);
        self.screen = Screen::Dashboard(Dashboard::new(session));
    }

    /// Returns true when the app should quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }
        self.notice = None;

        match &mut self.screen {
            Screen::Welcome => match key.code {
                KeyCode::Esc | KeyCode::Char('q') => return true,
                KeyCode::Enter => {
                    self.screen = Screen::EnterUsername(UsernameForm::prefilled(&self.settings));
                }
                _ => {}
            },
            Screen::EnterUsername(form) => match key.code {
                KeyCode::Esc => self.screen = Screen::Welcome,
                KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                    form.toggle_focus()
                }
                KeyCode::Char(c) => {
                    form.focused().push(c);
                    form.error = None;
                }
                KeyCode::Backspace => {
                    form.focused().pop();
                }
                KeyCode::Enter => match Session::new(&form.username, &form.class_name) {
                    Ok(session) => {
                        tracing::info!(
                            username = session.username(),
                            class = session.class_name(),
                            "session started"
                        );
                        self.settings.remember(&session);
                        if let Err(e) = self.settings.store(self.config_path.as_deref()) {
                            tracing::warn!(error = %e, "could not save settings");
                        }
                        self.open_dashboard(session);
                    }
                    Err(e) => form.error = Some(e.to_string()),
                },
                _ => {}
            },
            Screen::Dashboard(dash) => match key.code {
                KeyCode::Char('q') => return true,
                KeyCode::Esc => {
                    self.screen = Screen::EnterUsername(UsernameForm::prefilled(&self.settings));
                }
                KeyCode::Char('r') => {
                    dash.history = History::Loading;
                    self.backend.load_history(&dash.session);
                }
                KeyCode::Char('t') => {
                    let session = dash.session.clone();
                    self.next_generation();
                    self.backend.start_test(&session);
                    self.screen = Screen::Test(TestFlow::new(session));
                }
                KeyCode::Char('l') => {
                    let session = dash.session.clone();
                    self.next_generation();
                    self.backend.load_practice(&session);
                    self.screen = Screen::Learning(Practice::new(session));
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    let len = dash.records().len();
                    if len > 0 {
                        dash.selected = (dash.selected + 1) % len;
                    }
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    let len = dash.records().len();
                    if len > 0 {
                        dash.selected = (dash.selected + len - 1) % len;
                    }
                }
                _ => {}
            },
            Screen::Test(_) => self.handle_test_key(key.code),
            Screen::Learning(_) => self.handle_learning_key(key.code),
        }
        false
    }

    fn handle_test_key(&mut self, code: KeyCode) {
        let Screen::Test(flow) = &mut self.screen else {
            return;
        };

        if code == KeyCode::Esc {
            tracing::info!(
                username = flow.session.username(),
                question = flow.question.number(),
                "test abandoned"
            );
            let session = flow.session.clone();
            self.open_dashboard(session);
            return;
        }

        match flow.stage.clone() {
            Stage::StartFailed(_) if code == KeyCode::Enter => {
                flow.retry_start();
                self.backend.start_test(&flow.session);
            }
            Stage::FinishFailed(_) if code == KeyCode::Enter => {
                flow.retry_finish();
                self.backend.finish_test(&flow.session);
            }
            Stage::Answering => match code {
                KeyCode::Tab => {
                    if let Some(bytes) = flow.audio() {
                        let bytes = bytes.to_vec();
                        self.play(&bytes);
                    }
                }
                KeyCode::Left if AnswerKind::of(flow.question) == AnswerKind::Letter => {
                    flow.previous_letter()
                }
                KeyCode::Right if AnswerKind::of(flow.question) == AnswerKind::Letter => {
                    flow.next_letter()
                }
                KeyCode::Char(c) => flow.type_char(c),
                KeyCode::Backspace => flow.backspace(),
                KeyCode::Enter => {
                    if matches!(flow.prompt, PromptState::Failed(_)) {
                        flow.reload_prompt();
                        self.backend.load_prompt(flow.question);
                    } else if let Some(answer) = flow.take_answer() {
                        self.player.stop();
                        self.backend.submit(flow.question, answer);
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    fn handle_learning_key(&mut self, code: KeyCode) {
        let Screen::Learning(practice) = &mut self.screen else {
            return;
        };

        match (practice.state.clone(), code) {
            (_, KeyCode::Esc) | (PracticeState::Complete, KeyCode::Enter) => {
                let session = practice.session.clone();
                self.open_dashboard(session);
            }
            (PracticeState::Failed(_), KeyCode::Enter) => {
                practice.retry();
                self.backend.load_practice(&practice.session);
            }
            (PracticeState::Ready, KeyCode::Tab) => {
                if let Some(bytes) = practice.clip() {
                    let bytes = bytes.to_vec();
                    self.play(&bytes);
                } else if let Some((index, url)) = practice.clip_to_fetch() {
                    self.backend.load_clip(index, url);
                }
            }
            (PracticeState::Ready, KeyCode::Char(c)) => practice.type_char(c),
            (PracticeState::Ready, KeyCode::Backspace) => practice.backspace(),
            (PracticeState::Ready, KeyCode::Enter) => {
                if practice.result.is_none() {
                    practice.check();
                } else if practice.advance() {
                    self.player.stop();
                    if let Some((index, url)) = practice.clip_to_fetch() {
                        self.backend.load_clip(index, url);
                    }
                } else {
                    let accuracy = practice.accuracy();
                    let username = practice.session.username().to_string();
                    tracing::info!(%username, accuracy, words = practice.questions.len(), "practice complete");
                    self.settings.record_learning(&username, accuracy);
                    if let Err(e) = self.settings.store(self.config_path.as_deref()) {
                        tracing::warn!(error = %e, "could not save practice history");
                    }
                }
            }
            _ => {}
        }
    }

    pub fn handle_event(&mut self, completion: Completion) {
        let Completion { generation, event } = completion;
        if generation != self.backend.generation {
            tracing::debug!(generation, current = self.backend.generation, "dropping stale result");
            return;
        }

        let mut clip = None;
        let mut back_to = None;

        match (&mut self.screen, event) {
            (Screen::Dashboard(dash), AppEvent::HistoryLoaded(result)) => {
                dash.history = match result {
                    Ok(records) => History::Loaded(records),
                    Err(e) => History::Failed(e.to_string()),
                };
                dash.selected = 0;
            }
            (Screen::Test(flow), AppEvent::TestStarted(result)) => {
                if flow.stage == Stage::Starting && flow.started(result) {
                    self.backend.load_prompt(flow.question);
                }
            }
            (Screen::Test(flow), AppEvent::PromptLoaded(question, result)) => {
                clip = flow.prompt_loaded(question, result).map(<[u8]>::to_vec);
            }
            (Screen::Test(flow), AppEvent::AnswerSubmitted(question, result)) => {
                match flow.submitted(question, result) {
                    Advance::Next(next) => self.backend.load_prompt(next),
                    Advance::Finish => self.backend.finish_test(&flow.session),
                    Advance::Stay => {}
                }
            }
            (Screen::Test(flow), AppEvent::TestFinished(result)) => {
                flow.finished(result);
                if flow.stage == Stage::Done {
                    tracing::info!(username = flow.session.username(), "test completed");
                    back_to = Some(flow.session.clone());
                }
            }
            (Screen::Learning(practice), AppEvent::PracticeLoaded(result)) => {
                practice.loaded(result, self.shuffle);
                if let Some((index, url)) = practice.clip_to_fetch() {
                    self.backend.load_clip(index, url);
                }
            }
            (Screen::Learning(practice), AppEvent::ClipLoaded(index, result)) => {
                clip = practice.clip_loaded(index, result).map(<[u8]>::to_vec);
            }
            _ => tracing::debug!("dropping result for a screen that is gone"),
        }

        if let Some(session) = back_to {
            self.open_dashboard(session);
        } else if let Some(bytes) = clip {
            self.play(&bytes);
        }
    }
}
