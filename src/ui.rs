use crate::{
    api::{Prompt, Question},
    app::{App, Dashboard, Field, History, Screen, UsernameForm},
    chart::{self, Summary},
    diff::AnswerDiff,
    learning::{ClipState, Practice, PracticeState},
    models::TestRecord,
    test_flow::{
        self, AnswerKind, LETTER_CHOICES, PromptState, SECTION_COUNT, Stage, TestFlow,
    },
};

use ratatui::{
    layout::{Constraint, Direction, Layout},
    prelude::*,
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span, Text},
    widgets::{
        Axis, Block, Borders, Cell, Chart, Dataset, Gauge, GraphType, Paragraph, Row, Table,
        TableState, Wrap,
    },
};

const ACCENT: Color = Color::Yellow;
const RECENT_PRACTICE: usize = 10;

pub fn draw_ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(f.area());

    match &app.screen {
        Screen::Welcome => draw_welcome(f, chunks[0], app.server_url()),
        Screen::EnterUsername(form) => draw_username(f, chunks[0], form),
        Screen::Dashboard(dash) => draw_dashboard(f, chunks[0], dash),
        Screen::Test(flow) => draw_test(f, chunks[0], flow, app.is_playing()),
        Screen::Learning(practice) => draw_learning(
            f,
            chunks[0],
            practice,
            app.settings.learning_history(practice.session.username()),
            app.is_playing(),
        ),
    }

    draw_footer(f, chunks[1], app);
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

fn error_line(msg: &str) -> Line<'static> {
    Line::from(Span::styled(msg.to_string(), Style::default().fg(Color::Red)))
}

fn help_text(screen: &Screen) -> &'static str {
    match screen {
        Screen::Welcome => "<Enter> get started   <q> quit",
        Screen::EnterUsername(_) => "<Tab> switch field   <Enter> continue   <Esc> back",
        Screen::Dashboard(_) => {
            "<t> take test   <l> practice   <r> refresh   <↑/↓> select   <Esc> change user   <q> quit"
        }
        Screen::Test(flow) if AnswerKind::of(flow.question) == AnswerKind::Letter => {
            "<←/→> or letter key to choose   <Tab> replay   <Enter> submit   <Esc> leave test"
        }
        Screen::Test(flow) if flow.expects_audio() => {
            "<Tab> replay   <Enter> submit   <Esc> leave test"
        }
        Screen::Test(_) => "<Enter> submit   <Esc> leave test",
        Screen::Learning(_) => "<Tab> hear word   <Enter> check / next   <Esc> back to dashboard",
    }
}

fn draw_footer(f: &mut Frame, area: Rect, app: &App) {
    let mut lines = vec![Line::from(help_text(&app.screen))];
    if let Some(notice) = &app.notice {
        lines.push(error_line(notice));
    }
    let footer = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::TOP))
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    f.render_widget(footer, area);
}

fn draw_welcome(f: &mut Frame, area: Rect, server: &str) {
    let area = centered_rect(60, 50, area);
    let lines = vec![
        Line::from(Span::styled(
            "DysCover",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Reading and spelling screening, one small step at a time."),
        Line::from(""),
        Line::from(Span::styled(
            format!("Server: {server}"),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
        Line::from("Press <Enter> to get started"),
    ];
    let welcome = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(welcome, area);
}

fn input_box<'a>(title: &'a str, value: &'a str, focused: bool) -> Paragraph<'a> {
    let cursor = if focused { "_" } else { "" };
    Paragraph::new(format!("{value}{cursor}")).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(focus_style(focused)),
    )
}

fn draw_username(f: &mut Frame, area: Rect, form: &UsernameForm) {
    let area = centered_rect(60, 60, area);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(1),
        ])
        .split(area);

    let title = Paragraph::new(Span::styled(
        "Welcome to DysCover",
        Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center);
    f.render_widget(title, rows[0]);

    f.render_widget(
        input_box("Username", &form.username, form.focus == Field::Username),
        rows[1],
    );
    f.render_widget(
        input_box("Class name", &form.class_name, form.focus == Field::ClassName),
        rows[2],
    );

    if let Some(error) = &form.error {
        f.render_widget(
            Paragraph::new(error_line(error)).alignment(Alignment::Center),
            rows[3],
        );
    }
}

fn metric(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"))
}

fn outcome(record: &TestRecord, index: usize) -> String {
    record.questions()[index].map_or_else(|| "-".to_string(), |q| q.to_string())
}

/// Difficulty level shown in the greeting, taken from the first record.
fn level_label(records: &[TestRecord]) -> String {
    records
        .first()
        .and_then(TestRecord::difficulty)
        .map(|d| format!("   Level: {}", d.label()))
        .unwrap_or_default()
}

fn draw_dashboard(f: &mut Frame, area: Rect, dash: &Dashboard) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(12),
            Constraint::Min(5),
        ])
        .split(area);

    let difficulty = level_label(dash.records());
    let greeting = Paragraph::new(Line::from(vec![
        Span::styled(
            format!("Hello, {}", dash.session.username()),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("   Class: {}{difficulty}", dash.session.class_name())),
    ]))
    .block(Block::default().title("Dashboard").borders(Borders::ALL));
    f.render_widget(greeting, chunks[0]);

    let records = match &dash.history {
        History::Loading => {
            f.render_widget(
                Paragraph::new("Loading results...").alignment(Alignment::Center),
                chunks[1],
            );
            return;
        }
        History::Failed(msg) => {
            let body = Paragraph::new(vec![
                error_line(msg),
                Line::from("Press <r> to try again"),
            ])
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
            f.render_widget(body, chunks[1]);
            return;
        }
        History::Loaded(records) if records.is_empty() => {
            f.render_widget(
                Paragraph::new("No tests yet. Press <t> to take your first one.")
                    .alignment(Alignment::Center),
                chunks[1],
            );
            return;
        }
        History::Loaded(records) => records,
    };

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[1]);
    draw_summary(f, middle[0], &Summary::from_records(records));
    draw_score_chart(f, middle[1], records);
    draw_record_table(f, chunks[2], records, dash.selected);
}

fn draw_summary(f: &mut Frame, area: Rect, summary: &Summary) {
    let block = Block::default()
        .title(format!("Averages over {} tests", summary.tests))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let metrics = [
        ("Total score", summary.avg_total, Color::Red),
        ("Spelling", summary.avg_spelling, Color::Green),
        ("Handwriting", summary.avg_handwriting, Color::Magenta),
        ("Speaking", summary.avg_speaking, Color::Blue),
        ("Stutter", summary.avg_stutter, Color::Gray),
    ];
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(metrics.iter().map(|_| Constraint::Length(2)))
        .split(inner);

    for ((title, value, color), row) in metrics.iter().zip(rows.iter()) {
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(*color))
            .ratio(chart::fraction(*value, 100.0))
            .label(format!("{title}: {value:.0}"));
        f.render_widget(gauge, Rect { height: 1, ..*row });
    }
}

fn draw_score_chart(f: &mut Frame, area: Rect, records: &[TestRecord]) {
    let scores = chart::total_scores(records);
    let points = chart::line_points(&scores);
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let datasets = vec![
        Dataset::default()
            .name("Total score")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(ACCENT))
            .data(&points),
    ];

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title("Total score by test")
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .bounds([0.0, (points.len().max(2) - 1) as f64])
                .labels(["1".to_string(), format!("{}", points.len())]),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, 100.0])
                .labels([format!("{min:.0}"), format!("{max:.0}")]),
        );
    f.render_widget(chart, area);
}

fn draw_record_table(f: &mut Frame, area: Rect, records: &[TestRecord], selected: usize) {
    let header = Row::new(vec![
        "Test", "Q1", "Q2", "Q3", "Q4", "Q5", "Spelling", "Handwriting", "Speaking", "Stutter",
        "Total",
    ])
    .style(Style::default().fg(Color::Cyan));

    let rows: Vec<Row> = records
        .iter()
        .map(|r| {
            let mut cells = vec![Cell::from(r.test_id.to_string())];
            cells.extend((0..5).map(|i| Cell::from(outcome(r, i))));
            cells.extend(
                [
                    r.spelling_accuracy,
                    r.handwriting_metric,
                    r.speaking_accuracy,
                    r.stutter_metric,
                    r.total_score,
                ]
                .into_iter()
                .map(|v| Cell::from(metric(v))),
            );
            Row::new(cells)
        })
        .collect();

    let mut widths = vec![Constraint::Length(6)];
    widths.extend([Constraint::Length(10); 5]);
    widths.extend([Constraint::Length(12); 5]);

    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().title("History").borders(Borders::ALL))
        .row_highlight_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD));
    let mut state = TableState::default().with_selected(Some(selected));
    f.render_stateful_widget(table, area, &mut state);
}

fn step_indicator(current: usize) -> Line<'static> {
    let dots: Vec<Span> = (1..=SECTION_COUNT)
        .map(|i| {
            let color = if i <= current { ACCENT } else { Color::DarkGray };
            Span::styled("● ", Style::default().fg(color))
        })
        .collect();
    Line::from(dots)
}

fn draw_test(f: &mut Frame, area: Rect, flow: &TestFlow, playing: bool) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(area);

    let section = flow.section();
    let header = Paragraph::new(vec![
        Line::from(Span::styled(
            "Dyslexia Test",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::from(format!(
            "Section {} of {SECTION_COUNT}: {}",
            section.number(),
            section.title()
        )),
        step_indicator(section.number()),
    ])
    .alignment(Alignment::Center);
    f.render_widget(header, chunks[0]);

    let mut lines: Vec<Line> = Vec::new();
    match &flow.stage {
        Stage::Starting => lines.push(Line::from("Starting test...")),
        Stage::StartFailed(msg) => {
            lines.push(error_line(msg));
            lines.push(Line::from("Press <Enter> to try again"));
        }
        Stage::Finishing => lines.push(Line::from("Saving your results...")),
        Stage::FinishFailed(msg) => {
            lines.push(error_line(msg));
            lines.push(Line::from("Press <Enter> to try saving again"));
        }
        Stage::Done => lines.push(Line::from("All done!")),
        Stage::Answering => question_lines(flow, playing, &mut lines),
    }

    let card = Paragraph::new(lines)
        .block(
            Block::default()
                .title(format!("Question {}", flow.question.number()))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(card, chunks[1]);

    if flow.stage == Stage::Answering {
        let title = match AnswerKind::of(flow.question) {
            AnswerKind::Typed => Some("Your answer"),
            AnswerKind::AudioFile => Some("Recording file"),
            AnswerKind::ImageFile => Some("Photo file"),
            AnswerKind::Letter => None,
        };
        if let Some(title) = title {
            f.render_widget(input_box(title, &flow.input, !flow.submitting), chunks[2]);
        }
    }
}

fn question_lines(flow: &TestFlow, playing: bool, lines: &mut Vec<Line<'static>>) {
    lines.push(Line::from(Span::styled(
        test_flow::heading(flow.question),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(test_flow::instructions(flow.question)));
    lines.push(Line::from(""));

    match &flow.prompt {
        PromptState::Loading => lines.push(Line::from("Loading question...")),
        PromptState::Failed(msg) => {
            lines.push(error_line(msg));
            lines.push(Line::from("Press <Enter> to reload the question"));
        }
        PromptState::Ready(Prompt::Audio(_)) => lines.push(Line::from(if playing {
            "♪ Playing..."
        } else {
            "Press <Tab> to hear it again"
        })),
        PromptState::Ready(Prompt::Text(_)) => {}
    }
    if let Some(text) = flow.prompt_text() {
        lines.push(Line::from(Span::styled(
            text.to_string(),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )));
    }

    if flow.question == Question::Two {
        lines.push(Line::from(""));
        let choices: Vec<Span> = LETTER_CHOICES
            .iter()
            .enumerate()
            .map(|(i, letter)| {
                let style = if i == flow.letter {
                    Style::default()
                        .fg(Color::Black)
                        .bg(ACCENT)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(ACCENT)
                };
                Span::styled(format!("  {letter}  "), style)
            })
            .collect();
        lines.push(Line::from(choices));
    }

    lines.push(Line::from(""));
    if flow.submitting {
        lines.push(Line::from("Submitting..."));
    } else if let Some(status) = &flow.status {
        lines.push(error_line(status));
    }
}

/// Green for right letters, red for wrong or missing ones, grey for
/// unscored extras.
pub fn diff_spans(diff: &AnswerDiff) -> Vec<Span<'static>> {
    let mut spans: Vec<Span> = diff
        .marks
        .iter()
        .map(|m| {
            let color = if m.correct { Color::Green } else { Color::Red };
            let mut style = Style::default().fg(color);
            if m.typed.is_none() {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            Span::styled(m.shown().to_string(), style)
        })
        .collect();
    if !diff.extra.is_empty() {
        spans.push(Span::styled(
            diff.extra.clone(),
            Style::default().fg(Color::DarkGray),
        ));
    }
    spans
}

fn draw_learning(f: &mut Frame, area: Rect, practice: &Practice, history: &[u32], playing: bool) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(10)])
        .split(area);

    let mut lines: Vec<Line> = Vec::new();
    let title = match &practice.state {
        PracticeState::Loading => {
            lines.push(Line::from("Loading practice words..."));
            "Practice".to_string()
        }
        PracticeState::Failed(msg) => {
            lines.push(error_line(msg));
            lines.push(Line::from("Press <Enter> to try again"));
            "Practice".to_string()
        }
        PracticeState::Empty => {
            lines.push(Line::from("No practice words yet. Take a test first."));
            "Practice".to_string()
        }
        PracticeState::Complete => {
            lines.push(Line::from(Span::styled(
                "Practice complete!",
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(format!("Accuracy: {}%", practice.accuracy())));
            lines.push(Line::from(""));
            lines.push(Line::from("Press <Enter> to return to the dashboard"));
            "Practice".to_string()
        }
        PracticeState::Ready => {
            practice_lines(practice, playing, &mut lines);
            format!(
                "Practice: word {} of {}",
                practice.index + 1,
                practice.questions.len()
            )
        }
    };

    let body = Paragraph::new(lines)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(body, chunks[0]);

    draw_practice_history(f, chunks[1], history);
}

fn verdict(diff: &AnswerDiff, word: &str) -> String {
    if diff.is_perfect() {
        return "Perfect!".to_string();
    }
    format!(
        "{} of {} letters wrong ({}%, {:.0}% right). The word is \"{word}\".",
        diff.mismatches,
        diff.reference_len(),
        diff.mismatch_percent_rounded(),
        diff.accuracy_percent(),
    )
}

fn practice_lines(practice: &Practice, playing: bool, lines: &mut Vec<Line<'static>>) {
    lines.push(Line::from("Listen carefully, then spell the word."));
    lines.push(match &practice.clip {
        ClipState::Idle => Line::from("Press <Tab> to hear the word"),
        ClipState::Loading => Line::from("Loading audio..."),
        ClipState::Ready(_) if playing => Line::from("♪ Playing..."),
        ClipState::Ready(_) => Line::from("Press <Tab> to hear it again"),
        ClipState::Failed(msg) => error_line(msg),
    });
    lines.push(Line::from(""));

    match (&practice.result, practice.current()) {
        (Some(diff), Some(question)) => {
            lines.push(Line::from(diff_spans(diff)));
            lines.push(Line::from(""));
            let color = if diff.is_perfect() { Color::Green } else { Color::Red };
            lines.push(Line::from(Span::styled(
                verdict(diff, &question.correct_answer),
                Style::default().fg(color),
            )));
            lines.push(Line::from("Press <Enter> for the next word"));
        }
        _ => lines.push(Line::from(Span::styled(
            format!("{}_", practice.input),
            Style::default().fg(Color::Green),
        ))),
    }
}

fn draw_practice_history(f: &mut Frame, area: Rect, history: &[u32]) {
    let recent = &history[history.len().saturating_sub(RECENT_PRACTICE)..];
    let data: Vec<(f64, f64)> = recent
        .iter()
        .enumerate()
        .map(|(i, s)| (i as f64, *s as f64))
        .collect();
    let target: Vec<(f64, f64)> = (0..recent.len()).map(|i| (i as f64, 90.0)).collect();

    let datasets = vec![
        Dataset::default()
            .name("Accuracy")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Green))
            .data(&data),
        Dataset::default()
            .name("90%")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Red))
            .data(&target),
    ];

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title("Recent practice sessions")
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .bounds([0.0, data.len().max(1) as f64])
                .labels(["0".into(), format!("{}", data.len())]),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, 100.0])
                .labels(["0%", "50%", "100%"]),
        );
    f.render_widget(chart, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
