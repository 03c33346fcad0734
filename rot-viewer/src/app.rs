use chrono::{DateTime, Local};
use com_utils::{
    ComObjectTable, ComUtilResult, ObjectTable, RegistryView, RunningObjects, WindowsRegistry,
};
use ratatui::widgets::TableState;

/// One rendered table row: the three columns the viewer displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    pub display_name: String,
    pub kind: String,
    pub class_id: String,
}

/// Viewer state: the latest snapshot plus refresh bookkeeping.
///
/// Refreshes are best-effort — a failed pass keeps the previous (stale)
/// rows on screen and surfaces the error in the status bar instead of
/// tearing the UI down.
pub struct App {
    pub rows: Vec<EntryRow>,
    pub table_state: TableState,
    pub paused: bool,
    pub should_exit: bool,
    pub last_error: Option<String>,
    pub last_refresh: Option<DateTime<Local>>,
    pub interval_ms: u64,
    pub passes: u64,
}

impl App {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            rows: Vec::new(),
            table_state: TableState::default(),
            paused: false,
            should_exit: false,
            last_error: None,
            last_refresh: None,
            interval_ms,
            passes: 0,
        }
    }

    /// Folds one pass's outcome into the view.
    pub fn apply_refresh(&mut self, result: ComUtilResult<Vec<EntryRow>>) {
        self.passes += 1;
        self.last_refresh = Some(Local::now());
        match result {
            Ok(rows) => {
                self.rows = rows;
                self.last_error = None;
                self.clamp_selection();
            }
            Err(e) => {
                tracing::warn!(error = %e, "enumeration pass failed");
                self.last_error = Some(e.to_string());
            }
        }
    }

    fn clamp_selection(&mut self) {
        if self.rows.is_empty() {
            self.table_state.select(None);
        } else {
            let selected = self.table_state.selected().unwrap_or(0);
            self.table_state.select(Some(selected.min(self.rows.len() - 1)));
        }
    }

    pub fn select_next(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let next = match self.table_state.selected() {
            Some(i) if i + 1 < self.rows.len() => i + 1,
            Some(i) => i,
            None => 0,
        };
        self.table_state.select(Some(next));
    }

    pub fn select_prev(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let prev = self.table_state.selected().map_or(0, |i| i.saturating_sub(1));
        self.table_state.select(Some(prev));
    }

    pub fn toggle_paused(&mut self) {
        self.paused = !self.paused;
        tracing::debug!(paused = self.paused, "refresh toggled");
    }
}

/// Runs one enumeration pass over the live table and flattens it into
/// displayable rows.
pub fn collect_entries(registry: &WindowsRegistry) -> ComUtilResult<Vec<EntryRow>> {
    let objects = RunningObjects::new(ComObjectTable::open()?);
    rows_from(&objects, registry)
}

fn rows_from<T: ObjectTable, R: RegistryView>(
    objects: &RunningObjects<T>,
    registry: &R,
) -> ComUtilResult<Vec<EntryRow>> {
    let mut rows = Vec::new();
    for entry in objects.entries()? {
        let entry = entry?;
        rows.push(EntryRow {
            display_name: entry.display_name(registry).to_string(),
            kind: entry.kind().to_string(),
            class_id: entry.class_id().to_string(),
        });
    }
    tracing::trace!(count = rows.len(), "collected entries");
    Ok(rows)
}
