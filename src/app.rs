use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::client::{AskResponse, BackendClient, CompanyPerformance, PerformanceOutcome};
use crate::config::Config;

pub const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Input,
    Chat,
    Months,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Bot,
}

/// Rendering state of the performance pane. Replaced wholesale on every
/// query; results never accumulate across calls.
#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceView {
    Empty,
    Loading { month: String },
    Error(String),
    Results { month: String, rows: Vec<CompanyPerformance> },
}

#[derive(Debug, Clone)]
pub struct ChartState {
    pub source: String,
    pub path: PathBuf,
    pub fetched_at: DateTime<Utc>,
}

/// One in-flight request. The sequence number ties a completion back to the
/// action generation that issued it, so a stale response can never clobber a
/// newer one.
struct Pending<T> {
    seq: u64,
    handle: JoinHandle<Result<T>>,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Chat state (append-only history)
    pub chat_messages: Vec<ChatMessage>,
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Month selector
    pub month_state: ListState,

    // Performance report
    pub performance: PerformanceView,

    // Chart (set when /ask returns chart_url)
    pub chart: Option<ChartState>,

    // Animation state
    pub animation_frame: u8,

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub months_area: Option<Rect>,

    // In-flight requests, one slot per action
    chat_seq: u64,
    perf_seq: u64,
    chart_seq: u64,
    chat_task: Option<Pending<AskResponse>>,
    perf_task: Option<(String, Pending<PerformanceOutcome>)>,
    chart_task: Option<(String, Pending<PathBuf>)>,

    client: BackendClient,
    cache_dir: PathBuf,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let client = BackendClient::new(&config.backend_url());

        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("revenue-console");

        let mut month_state = ListState::default();
        let initial = config
            .default_month
            .as_deref()
            .and_then(|m| MONTHS.iter().position(|candidate| *candidate == m))
            .unwrap_or(0);
        month_state.select(Some(initial));

        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            focus: FocusPane::Input,

            chat_messages: Vec::new(),
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            input: String::new(),
            cursor: 0,

            month_state,

            performance: PerformanceView::Empty,

            chart: None,

            animation_frame: 0,

            chat_area: None,
            months_area: None,

            chat_seq: 0,
            perf_seq: 0,
            chart_seq: 0,
            chat_task: None,
            perf_task: None,
            chart_task: None,

            client,
            cache_dir,
        }
    }

    pub fn backend_url(&self) -> &str {
        self.client.base_url()
    }

    pub fn chat_pending(&self) -> bool {
        self.chat_task.is_some()
    }

    pub fn chart_pending(&self) -> bool {
        self.chart_task.is_some()
    }

    /// Append one chat row and keep the newest entry visible. Always an
    /// append, never an upsert: identical arguments produce distinct rows.
    pub fn push_message(&mut self, role: ChatRole, content: String) {
        self.chat_messages.push(ChatMessage { role, content });
        self.scroll_chat_to_bottom();
    }

    /// First half of the send action: validate and record the user's row.
    /// Returns the query to issue, or None for trimmed-empty input (no row,
    /// no request). The user row lands synchronously, so it always renders
    /// before the bot's reply of the same exchange.
    pub fn begin_send(&mut self) -> Option<String> {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return None;
        }

        self.push_message(ChatRole::User, text.clone());
        self.input.clear();
        self.cursor = 0;
        Some(text)
    }

    pub fn send_message(&mut self) {
        let Some(query) = self.begin_send() else {
            return;
        };

        let seq = self.next_chat_seq();
        info!(seq, "sending chat query");

        let client = self.client.clone();
        let handle = tokio::spawn(async move { client.ask(&query).await });

        if let Some(previous) = self.chat_task.replace(Pending { seq, handle }) {
            previous.handle.abort();
        }
    }

    pub fn next_chat_seq(&mut self) -> u64 {
        self.chat_seq += 1;
        self.chat_seq
    }

    pub fn apply_chat_outcome(&mut self, seq: u64, outcome: Result<AskResponse>) {
        if seq != self.chat_seq {
            debug!(seq, latest = self.chat_seq, "discarding stale chat response");
            return;
        }

        match outcome {
            Ok(response) => {
                self.push_message(ChatRole::Bot, response.answer);
                if let Some(chart_url) = response.chart_url {
                    self.start_chart_fetch(&chart_url);
                }
            }
            Err(e) => {
                error!(error = %e, "chat request failed");
                self.push_message(
                    ChatRole::Bot,
                    "Error: could not reach the assistant backend.".to_string(),
                );
            }
        }
    }

    pub fn selected_month(&self) -> Option<&'static str> {
        self.month_state.selected().and_then(|i| MONTHS.get(i).copied())
    }

    pub fn month_down(&mut self) {
        let i = self.month_state.selected().unwrap_or(0);
        self.month_state.select(Some((i + 1).min(MONTHS.len() - 1)));
    }

    pub fn month_up(&mut self) {
        let i = self.month_state.selected().unwrap_or(0);
        self.month_state.select(Some(i.saturating_sub(1)));
    }

    pub fn fetch_performance(&mut self) {
        let Some(month) = self.selected_month() else {
            return;
        };
        let month = month.to_string();

        self.performance = PerformanceView::Loading {
            month: month.clone(),
        };

        let seq = self.next_perf_seq();
        info!(seq, month = %month, "fetching revenue performance");
        let _ = Config::save_default_month(&month);

        let client = self.client.clone();
        let query_month = month.clone();
        let handle = tokio::spawn(async move { client.revenue_performance(&query_month).await });

        if let Some((_, previous)) = self.perf_task.replace((month, Pending { seq, handle })) {
            previous.handle.abort();
        }
    }

    pub fn next_perf_seq(&mut self) -> u64 {
        self.perf_seq += 1;
        self.perf_seq
    }

    pub fn apply_performance(
        &mut self,
        seq: u64,
        month: String,
        outcome: Result<PerformanceOutcome>,
    ) {
        if seq != self.perf_seq {
            debug!(seq, latest = self.perf_seq, "discarding stale performance response");
            return;
        }

        self.performance = match outcome {
            Ok(PerformanceOutcome::Success(rows)) => PerformanceView::Results { month, rows },
            Ok(PerformanceOutcome::Failure(message)) => PerformanceView::Error(message),
            Err(e) => {
                error!(error = %e, month = %month, "performance request failed");
                PerformanceView::Error(format!("Request failed: {e:#}"))
            }
        };
    }

    /// Kick off a chart download. The source carries a fresh timestamp
    /// parameter so the bytes are re-fetched even when the path is unchanged
    /// between calls.
    pub fn start_chart_fetch(&mut self, chart_url: &str) {
        let stamp = Utc::now().timestamp_millis();
        let source = match self.client.chart_source(chart_url, stamp) {
            Ok(source) => source,
            Err(e) => {
                error!(error = %e, chart_url, "invalid chart url");
                return;
            }
        };

        let file_name = chart_url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("chart.png");
        let path = self.cache_dir.join(file_name);

        let seq = self.next_chart_seq();
        debug!(seq, source = %source, "fetching chart");

        let client = self.client.clone();
        let fetch_source = source.clone();
        let handle = tokio::spawn(async move {
            let bytes = client.fetch_chart(&fetch_source).await?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, &bytes).await?;
            Ok(path)
        });

        if let Some((_, previous)) = self.chart_task.replace((source, Pending { seq, handle })) {
            previous.handle.abort();
        }
    }

    pub fn next_chart_seq(&mut self) -> u64 {
        self.chart_seq += 1;
        self.chart_seq
    }

    pub fn apply_chart_outcome(&mut self, seq: u64, source: String, outcome: Result<PathBuf>) {
        if seq != self.chart_seq {
            debug!(seq, latest = self.chart_seq, "discarding stale chart download");
            return;
        }

        match outcome {
            Ok(path) => {
                info!(path = %path.display(), "chart downloaded");
                self.chart = Some(ChartState {
                    source,
                    path,
                    fetched_at: Utc::now(),
                });
            }
            Err(e) => {
                error!(error = %e, "chart download failed");
            }
        }
    }

    /// Drive any finished background request to completion. Called from the
    /// event loop; aborted tasks surface as a JoinError and are dropped.
    pub async fn poll_pending(&mut self) {
        if let Some(pending) = self.chat_task.take() {
            if pending.handle.is_finished() {
                if let Ok(outcome) = pending.handle.await {
                    self.apply_chat_outcome(pending.seq, outcome);
                }
            } else {
                self.chat_task = Some(pending);
            }
        }

        if let Some((month, pending)) = self.perf_task.take() {
            if pending.handle.is_finished() {
                if let Ok(outcome) = pending.handle.await {
                    self.apply_performance(pending.seq, month, outcome);
                }
            } else {
                self.perf_task = Some((month, pending));
            }
        }

        if let Some((source, pending)) = self.chart_task.take() {
            if pending.handle.is_finished() {
                if let Ok(outcome) = pending.handle.await {
                    self.apply_chart_outcome(pending.seq, source, outcome);
                }
            } else {
                self.chart_task = Some((source, pending));
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.chat_task.is_some() || self.perf_task.is_some() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Chat scrolling
    pub fn chat_scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn chat_scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    /// Scroll the chat viewport so the newest row (or the typing indicator)
    /// is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.chat_messages {
            total_lines += 1; // Role line ("You:" or "Assistant:")
            for line in msg.content.lines() {
                // Character count, not byte length, for UTF-8 content
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        // Room for the "Thinking..." indicator
        total_lines += 2;

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        }
    }
}
