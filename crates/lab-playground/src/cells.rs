use lab_client::protocol::ExecuteResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a notebook cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    #[default]
    Idle,
    Running,
    Done,
    Error,
}

/// Captured output of a completed execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellOutput {
    pub stdout: String,
    pub error: Option<String>,
    /// Base64-encoded chart images.
    pub charts: Vec<String>,
    /// Wall-clock execution time, for display only.
    pub duration_ms: Option<u64>,
}

impl CellOutput {
    pub fn from_response(response: ExecuteResponse, duration_ms: u64) -> Self {
        Self {
            stdout: response.stdout,
            error: response.error,
            charts: response.charts,
            duration_ms: Some(duration_ms),
        }
    }

    /// Output holding only an error message.
    pub fn error_text(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    fn status(&self) -> CellStatus {
        if self.error.is_some() {
            CellStatus::Error
        } else {
            CellStatus::Done
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: Uuid,
    pub code: String,
    pub status: CellStatus,
    pub output: Option<CellOutput>,
    pub execution_index: Option<u32>,
    /// Whether the output panel under the cell is expanded.
    pub output_open: bool,
}

impl Cell {
    fn empty() -> Self {
        Cell {
            id: Uuid::new_v4(),
            code: String::new(),
            status: CellStatus::Idle,
            output: None,
            execution_index: None,
            output_open: false,
        }
    }
}

/// Ordered collection of notebook cells.
///
/// The store owns every cell mutation; async continuations go through
/// its methods so a completion for a cell that no longer exists is a
/// no-op. Invariants: the list always holds at least one cell, at most
/// one cell is Running, and the execution index counter is shared by
/// manual runs, pipeline-injected cells, and prediction cells so the
/// numbering the user sees is a single monotonic sequence.
#[derive(Debug)]
pub struct CellStore {
    cells: Vec<Cell>,
    next_execution_index: u32,
}

impl Default for CellStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CellStore {
    pub fn new() -> Self {
        Self {
            cells: vec![Cell::empty()],
            next_execution_index: 1,
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, cell_id: Uuid) -> Option<&Cell> {
        self.cells.iter().find(|c| c.id == cell_id)
    }

    fn index_of(&self, cell_id: Uuid) -> Option<usize> {
        self.cells.iter().position(|c| c.id == cell_id)
    }

    /// Id of the cell currently Running, if any.
    pub fn running_cell(&self) -> Option<Uuid> {
        self.cells
            .iter()
            .find(|c| c.status == CellStatus::Running)
            .map(|c| c.id)
    }

    /// Append an empty cell at the end, returning its id.
    pub fn append_empty(&mut self) -> Uuid {
        let cell = Cell::empty();
        let id = cell.id;
        self.cells.push(cell);
        id
    }

    /// Insert an empty cell right after `after`, or at the top when
    /// `after` is None or unknown.
    pub fn insert_after(&mut self, after: Option<Uuid>) -> Uuid {
        let cell = Cell::empty();
        let id = cell.id;
        let index = after
            .and_then(|a| self.index_of(a))
            .map(|i| i + 1)
            .unwrap_or(0);
        self.cells.insert(index, cell);
        id
    }

    pub fn update_code(&mut self, cell_id: Uuid, code: &str) -> bool {
        match self.index_of(cell_id) {
            Some(i) => {
                self.cells[i].code = code.to_string();
                true
            }
            None => false,
        }
    }

    /// Delete a cell. Deleting the only remaining cell is a no-op.
    pub fn delete(&mut self, cell_id: Uuid) -> bool {
        if self.cells.len() <= 1 {
            return false;
        }
        match self.index_of(cell_id) {
            Some(i) => {
                self.cells.remove(i);
                true
            }
            None => false,
        }
    }

    /// Swap a cell with its predecessor.
    pub fn move_up(&mut self, cell_id: Uuid) -> bool {
        match self.index_of(cell_id) {
            Some(i) if i > 0 => {
                self.cells.swap(i, i - 1);
                true
            }
            _ => false,
        }
    }

    /// Swap a cell with its successor.
    pub fn move_down(&mut self, cell_id: Uuid) -> bool {
        match self.index_of(cell_id) {
            Some(i) if i + 1 < self.cells.len() => {
                self.cells.swap(i, i + 1);
                true
            }
            _ => false,
        }
    }

    /// Transition a cell to Running: clear prior output and assign the
    /// next execution index. Refuses while any cell is Running (the
    /// remote session is a single serialized resource) and for unknown
    /// ids. Returns the assigned index.
    pub fn begin_execution(&mut self, cell_id: Uuid) -> Option<u32> {
        if self.running_cell().is_some() {
            return None;
        }
        let i = self.index_of(cell_id)?;
        let index = self.next_execution_index;
        self.next_execution_index += 1;
        let cell = &mut self.cells[i];
        cell.status = CellStatus::Running;
        cell.output = None;
        cell.execution_index = Some(index);
        Some(index)
    }

    /// Reconcile a finished execution back into its cell and reopen the
    /// output panel. A completion for a deleted cell is a no-op.
    pub fn finish_execution(&mut self, cell_id: Uuid, output: CellOutput) {
        let Some(i) = self.index_of(cell_id) else {
            return;
        };
        let cell = &mut self.cells[i];
        cell.status = output.status();
        cell.output = Some(output);
        cell.output_open = true;
    }

    /// Mark a cell failed without it ever having run (safety-policy
    /// rejection). Consumes no execution index.
    pub fn mark_rejected(&mut self, cell_id: Uuid, message: &str) {
        let Some(i) = self.index_of(cell_id) else {
            return;
        };
        let cell = &mut self.cells[i];
        cell.status = CellStatus::Error;
        cell.output = Some(CellOutput::error_text(message));
        cell.output_open = true;
    }

    /// Expand or collapse a cell's output panel.
    pub fn set_output_open(&mut self, cell_id: Uuid, open: bool) -> bool {
        match self.index_of(cell_id) {
            Some(i) => {
                self.cells[i].output_open = open;
                true
            }
            None => false,
        }
    }

    /// Append a cell that already ran remotely (pipeline-injected or
    /// prediction code), numbered through the shared execution counter.
    pub fn append_executed(&mut self, code: &str, output: CellOutput) -> Uuid {
        let index = self.next_execution_index;
        self.next_execution_index += 1;
        let cell = Cell {
            id: Uuid::new_v4(),
            code: code.to_string(),
            status: output.status(),
            output: Some(output),
            execution_index: Some(index),
            output_open: true,
        };
        let id = cell.id;
        self.cells.push(cell);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_has_single_empty_cell() {
        let store = CellStore::new();
        assert_eq!(store.len(), 1);
        assert_eq!(store.cells()[0].status, CellStatus::Idle);
        assert!(store.cells()[0].code.is_empty());
        assert!(store.cells()[0].execution_index.is_none());
    }

    #[test]
    fn test_append_empty_adds_at_end() {
        let mut store = CellStore::new();
        let id = store.append_empty();
        assert_eq!(store.len(), 2);
        assert_eq!(store.cells()[1].id, id);
    }

    #[test]
    fn test_insert_after_existing_cell() {
        let mut store = CellStore::new();
        let first = store.cells()[0].id;
        let second = store.append_empty();
        let inserted = store.insert_after(Some(first));
        assert_eq!(store.cells()[0].id, first);
        assert_eq!(store.cells()[1].id, inserted);
        assert_eq!(store.cells()[2].id, second);
    }

    #[test]
    fn test_insert_after_none_goes_to_top() {
        let mut store = CellStore::new();
        let first = store.cells()[0].id;
        let inserted = store.insert_after(None);
        assert_eq!(store.cells()[0].id, inserted);
        assert_eq!(store.cells()[1].id, first);
    }

    #[test]
    fn test_update_code() {
        let mut store = CellStore::new();
        let id = store.cells()[0].id;
        assert!(store.update_code(id, "print('hi')"));
        assert_eq!(store.cells()[0].code, "print('hi')");
    }

    #[test]
    fn test_update_code_unknown_cell_returns_false() {
        let mut store = CellStore::new();
        assert!(!store.update_code(Uuid::new_v4(), "x"));
    }

    #[test]
    fn test_delete_removes_cell() {
        let mut store = CellStore::new();
        let first = store.cells()[0].id;
        store.append_empty();
        assert!(store.delete(first));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_last_remaining_cell_is_noop() {
        let mut store = CellStore::new();
        let only = store.cells()[0].id;
        assert!(!store.delete(only));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_unknown_cell_returns_false() {
        let mut store = CellStore::new();
        store.append_empty();
        assert!(!store.delete(Uuid::new_v4()));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_move_up_and_down() {
        let mut store = CellStore::new();
        let first = store.cells()[0].id;
        let second = store.append_empty();

        assert!(store.move_up(second));
        assert_eq!(store.cells()[0].id, second);

        assert!(store.move_down(second));
        assert_eq!(store.cells()[0].id, first);
    }

    #[test]
    fn test_move_up_at_top_is_noop() {
        let mut store = CellStore::new();
        let first = store.cells()[0].id;
        store.append_empty();
        assert!(!store.move_up(first));
        assert_eq!(store.cells()[0].id, first);
    }

    #[test]
    fn test_move_down_at_bottom_is_noop() {
        let mut store = CellStore::new();
        store.append_empty();
        let last = store.cells()[1].id;
        assert!(!store.move_down(last));
    }

    #[test]
    fn test_begin_execution_assigns_monotonic_indices() {
        let mut store = CellStore::new();
        let first = store.cells()[0].id;
        let second = store.append_empty();

        assert_eq!(store.begin_execution(first), Some(1));
        store.finish_execution(first, CellOutput::default());
        assert_eq!(store.begin_execution(second), Some(2));
    }

    #[test]
    fn test_begin_execution_clears_prior_output() {
        let mut store = CellStore::new();
        let id = store.cells()[0].id;
        store.begin_execution(id);
        store.finish_execution(
            id,
            CellOutput {
                stdout: "old".to_string(),
                ..CellOutput::default()
            },
        );
        store.begin_execution(id);
        assert!(store.cells()[0].output.is_none());
        assert_eq!(store.cells()[0].status, CellStatus::Running);
    }

    #[test]
    fn test_begin_execution_refuses_while_another_cell_runs() {
        let mut store = CellStore::new();
        let first = store.cells()[0].id;
        let second = store.append_empty();

        assert!(store.begin_execution(first).is_some());
        assert!(store.begin_execution(second).is_none());
        assert_eq!(store.running_cell(), Some(first));
    }

    #[test]
    fn test_at_most_one_running_cell() {
        let mut store = CellStore::new();
        let first = store.cells()[0].id;
        store.append_empty();
        store.append_empty();
        store.begin_execution(first);

        let running = store
            .cells()
            .iter()
            .filter(|c| c.status == CellStatus::Running)
            .count();
        assert_eq!(running, 1);
    }

    #[test]
    fn test_begin_execution_unknown_cell_returns_none() {
        let mut store = CellStore::new();
        assert!(store.begin_execution(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_finish_execution_sets_done_and_opens_panel() {
        let mut store = CellStore::new();
        let id = store.cells()[0].id;
        store.begin_execution(id);
        store.finish_execution(
            id,
            CellOutput {
                stdout: "42\n".to_string(),
                ..CellOutput::default()
            },
        );
        let cell = &store.cells()[0];
        assert_eq!(cell.status, CellStatus::Done);
        assert!(cell.output_open);
        assert_eq!(cell.output.as_ref().unwrap().stdout, "42\n");
    }

    #[test]
    fn test_finish_execution_with_error_sets_error_status() {
        let mut store = CellStore::new();
        let id = store.cells()[0].id;
        store.begin_execution(id);
        store.finish_execution(id, CellOutput::error_text("NameError: x"));
        assert_eq!(store.cells()[0].status, CellStatus::Error);
    }

    #[test]
    fn test_finish_execution_for_deleted_cell_is_noop() {
        let mut store = CellStore::new();
        store.finish_execution(Uuid::new_v4(), CellOutput::default());
        assert_eq!(store.len(), 1);
        assert!(store.cells()[0].output.is_none());
    }

    #[test]
    fn test_mark_rejected_sets_error_without_index() {
        let mut store = CellStore::new();
        let id = store.cells()[0].id;
        store.mark_rejected(id, "Package installation is disabled");
        let cell = &store.cells()[0];
        assert_eq!(cell.status, CellStatus::Error);
        assert!(cell.execution_index.is_none());
        assert_eq!(
            cell.output.as_ref().unwrap().error.as_deref(),
            Some("Package installation is disabled")
        );
    }

    #[test]
    fn test_append_executed_numbers_through_shared_counter() {
        let mut store = CellStore::new();
        let manual = store.cells()[0].id;
        store.begin_execution(manual);
        store.finish_execution(manual, CellOutput::default());

        let injected = store.append_executed("df.head()", CellOutput::default());
        assert_eq!(store.get(injected).unwrap().execution_index, Some(2));

        store.append_executed("model.predict(X)", CellOutput::default());
        let indices: Vec<u32> = store
            .cells()
            .iter()
            .filter_map(|c| c.execution_index)
            .collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn test_set_output_open_toggles_panel() {
        let mut store = CellStore::new();
        let id = store.cells()[0].id;
        store.begin_execution(id);
        store.finish_execution(id, CellOutput::default());
        assert!(store.cells()[0].output_open);

        assert!(store.set_output_open(id, false));
        assert!(!store.cells()[0].output_open);
        assert!(!store.set_output_open(Uuid::new_v4(), true));
    }

    #[test]
    fn test_append_executed_with_error_output() {
        let mut store = CellStore::new();
        let id = store.append_executed("1/0", CellOutput::error_text("ZeroDivisionError"));
        let cell = store.get(id).unwrap();
        assert_eq!(cell.status, CellStatus::Error);
        assert!(cell.output_open);
    }
}
