//! Status board: per-category counters, states and full indicators.
//!
//! The board is owned by the pipeline (render) thread. Background threads
//! (the actuation worker and the serial listener) never touch it directly;
//! they send [`BoardUpdate`] messages over an mpsc channel which the
//! pipeline drains once per tick before rendering.
//!
//! Displayed status derives purely from the current state and the full
//! indicator; no history is retained. A full bin overrides every other
//! state until the matching UNFULL signal arrives.

use std::collections::VecDeque;

use crate::category::TrashCategory;

const LOG_CAPACITY: usize = 100;

/// Lifecycle of one category's slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CategoryState {
    #[default]
    Awaiting,
    Detecting,
    Complete,
}

impl CategoryState {
    fn display_name(self) -> &'static str {
        match self {
            CategoryState::Awaiting => "待检测",
            CategoryState::Detecting => "检测中",
            CategoryState::Complete => "分类完成",
        }
    }
}

/// Status of one category, owned exclusively by the board.
#[derive(Clone, Copy, Debug, Default)]
pub struct CategoryStatus {
    pub count: u64,
    pub state: CategoryState,
    pub is_full: bool,
}

impl CategoryStatus {
    /// Text shown in the table's status column. Full overrides everything.
    pub fn display_status(&self) -> &'static str {
        if self.is_full {
            "满载"
        } else {
            self.state.display_name()
        }
    }
}

/// Mutation requests sent to the board from worker threads.
#[derive(Clone, Debug)]
pub enum BoardUpdate {
    /// Set a category's lifecycle state.
    State(TrashCategory, CategoryState),
    /// One actuation completed: count += 1 and state becomes Complete.
    Sorted(TrashCategory),
    /// Bin full indicator changed; clearing it also resets the state.
    Full(TrashCategory, bool),
    /// Append a line to the status log.
    Log(String),
}

/// In-memory counters and states for all categories, plus the text log.
pub struct StatusBoard {
    statuses: [CategoryStatus; 4],
    log_lines: VecDeque<String>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            statuses: [CategoryStatus::default(); 4],
            log_lines: VecDeque::new(),
        }
    }

    /// Apply one update. The caller (pipeline) drains its channel through
    /// here once per tick.
    pub fn apply(&mut self, update: BoardUpdate) {
        match update {
            BoardUpdate::State(category, state) => {
                self.statuses[category.index()].state = state;
            }
            BoardUpdate::Sorted(category) => {
                let status = &mut self.statuses[category.index()];
                status.count += 1;
                status.state = CategoryState::Complete;
            }
            BoardUpdate::Full(category, is_full) => {
                let status = &mut self.statuses[category.index()];
                status.is_full = is_full;
                if !is_full {
                    status.state = CategoryState::Awaiting;
                }
            }
            BoardUpdate::Log(message) => self.push_log(message),
        }
    }

    pub fn status(&self, category: TrashCategory) -> CategoryStatus {
        self.statuses[category.index()]
    }

    /// Read-only snapshot in table order.
    pub fn snapshot(&self) -> Vec<(TrashCategory, CategoryStatus)> {
        TrashCategory::ALL
            .iter()
            .map(|&category| (category, self.status(category)))
            .collect()
    }

    pub fn push_log(&mut self, message: String) {
        let line = format!("[{}] {}", timestamp(), message);
        log::info!("{}", message);
        if self.log_lines.len() == LOG_CAPACITY {
            self.log_lines.pop_front();
        }
        self.log_lines.push_back(line);
    }

    pub fn log_lines(&self) -> impl Iterator<Item = &str> {
        self.log_lines.iter().map(|line| line.as_str())
    }

    /// Render the four-row status table as terminal text.
    pub fn render_table(&self) -> String {
        let mut out = String::from("序号  垃圾类型      数量  状态\n");
        for (row, (category, status)) in self.snapshot().into_iter().enumerate() {
            out.push_str(&format!(
                "{:<4}  {:<10}  {:<4}  {}\n",
                row + 1,
                category.display_name(),
                status.count,
                status.display_status()
            ));
        }
        out
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

fn timestamp() -> String {
    let format = time::format_description::well_known::Rfc3339;
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(&format)
        .map(|s| s[11..19].to_string())
        .unwrap_or_default()
}
