// store.rs

use crate::api::TaskApi;
use crate::error::ApiResult;
use crate::task::{Task, TaskPayload};

/// In-memory container for the task collection and everything the views
/// derive from it. Single writer (the event loop); readers get slices.
///
/// `tasks` is the server truth from the last applied load. `filtered_list`
/// is the active view of it and is the only thing filtering touches.
/// `task_selected` holds at most one id; re-selecting it clears it.
/// `refetch` is a flip-flag with no meaning of its own - watchers reload
/// when they see it change.
pub struct TaskStore {
    tasks: Vec<Task>,
    filtered_list: Vec<Task>,
    task_selected: Option<String>,
    search_input: String,
    refetch: bool,
    loading: bool,
    // Monotonic guard so a slow list response cannot overwrite a newer one.
    issued_seq: u64,
    applied_seq: u64,
}

impl Default for TaskStore {
    fn default() -> Self {
        TaskStore::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            filtered_list: Vec::new(),
            task_selected: None,
            search_input: String::new(),
            refetch: false,
            loading: false,
            issued_seq: 0,
            applied_seq: 0,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn filtered_list(&self) -> &[Task] {
        &self.filtered_list
    }

    pub fn selected(&self) -> Option<&str> {
        self.task_selected.as_deref()
    }

    pub fn selected_task(&self) -> Option<&Task> {
        let id = self.task_selected.as_deref()?;
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn refetch(&self) -> bool {
        self.refetch
    }

    /// Issues a ticket for a list load that will complete later. The ticket
    /// goes back into `finish_load` together with the outcome.
    pub fn begin_load(&mut self) -> u64 {
        self.loading = true;
        self.issued_seq += 1;
        self.issued_seq
    }

    /// Applies a finished load. Results older than the newest applied one
    /// are dropped. A failure keeps the previous list. Loading only turns
    /// off once the newest issued load has come back, so an error cannot
    /// leave the flag stuck and a stale response cannot clear it early.
    pub fn finish_load(&mut self, seq: u64, result: ApiResult<Vec<Task>>) -> bool {
        if seq <= self.applied_seq {
            return false;
        }
        self.applied_seq = seq;
        if seq == self.issued_seq {
            self.loading = false;
        }
        match result {
            Ok(tasks) => {
                self.filtered_list = tasks.clone();
                self.tasks = tasks;
                true
            }
            Err(err) => {
                eprintln!("[TASKS] list load failed: {}", err);
                false
            }
        }
    }

    /// Blocking load: fetch the list and apply it in one step.
    pub fn load(&mut self, api: &TaskApi) {
        let seq = self.begin_load();
        let result = api.list();
        self.finish_load(seq, result);
    }

    /// Toggle semantics: the same id clears the selection, a different id
    /// replaces it. The container never holds more than one id.
    pub fn select(&mut self, id: &str) {
        if self.task_selected.as_deref() == Some(id) {
            self.task_selected = None;
        } else {
            self.task_selected = Some(id.to_string());
        }
    }

    pub fn clear_selection(&mut self) {
        self.task_selected = None;
    }

    /// Flips the change signal. Watchers re-load when they observe a flip;
    /// the value itself means nothing.
    pub fn trigger_refetch(&mut self) {
        self.refetch = !self.refetch;
    }

    /// Recomputes the filtered view: case-insensitive substring match on
    /// title or description. Empty input restores the full list. `tasks`
    /// itself is never touched.
    pub fn apply_filter(&mut self, text: &str) {
        self.search_input = text.to_string();
        let needle = text.to_lowercase();
        let needle = needle.trim();
        if needle.is_empty() {
            self.filtered_list = self.tasks.clone();
            return;
        }
        self.filtered_list = self
            .tasks
            .iter()
            .filter(|task| {
                task.title.to_lowercase().contains(needle)
                    || task.description.to_lowercase().contains(needle)
            })
            .cloned()
            .collect();
    }

    /// Create, then reload the list before anyone reads it. One unit: a
    /// caller can never observe the store between the mutation and the
    /// refresh.
    pub fn create_and_refresh(&mut self, api: &TaskApi, payload: &TaskPayload) -> ApiResult<Task> {
        let task = api.create_task(payload)?;
        self.after_mutation(api);
        Ok(task)
    }

    pub fn update_and_refresh(
        &mut self,
        api: &TaskApi,
        payload: &TaskPayload,
        task_id: &str,
    ) -> ApiResult<Task> {
        let task = api.update_task(payload, task_id)?;
        self.after_mutation(api);
        Ok(task)
    }

    pub fn complete_and_refresh(&mut self, api: &TaskApi, task_id: &str) -> ApiResult<Option<Task>> {
        let task = api.complete_task(task_id)?;
        self.after_mutation(api);
        Ok(task)
    }

    pub fn delete_and_refresh(&mut self, api: &TaskApi, task_id: &str) -> ApiResult<()> {
        api.delete_task(task_id)?;
        self.after_mutation(api);
        Ok(())
    }

    fn after_mutation(&mut self, api: &TaskApi) {
        self.clear_selection();
        self.load(api);
    }
}
