//! Task & Dependency Graph (spec §4, C3): tasks, edges, reverse edges,
//! counters.
//!
//! Grounded in `cj_Task_new`/`cj_Task_dependency_add`/`cj_Graph_vertex_add`
//! in `cj.c`. Per the redesign note in spec.md §9, vertices and edges are a
//! tagged-variant `Task` plus forward/reverse adjacency stored as pairs of
//! task ids, not the original's cyclic `next`-pointer object graph.

use crate::tile::MatrixRef;
use crate::worker::Kernel;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    NotReady,
    Queued,
    Running,
    Done,
    Failed,
}

/// Dependency kind an edge carries, for diagnostics (spec §6) and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepKind {
    Raw,
    War,
}

impl DepKind {
    pub fn label(self) -> &'static str {
        match self {
            DepKind::Raw => "RAW",
            DepKind::War => "WAR",
        }
    }
}

struct TaskState {
    status: TaskStatus,
    /// Signed so a bug trips the `< 0` assertion instead of silently
    /// wrapping, per the "negative pending-deps is a fatal invariant
    /// violation" rule (spec §4.5).
    pending_deps: i64,
    successors: Vec<(TaskId, DepKind)>,
    assigned_worker: Option<usize>,
    cost: Option<f64>,
}

pub struct Task {
    pub id: TaskId,
    pub kernel_label: &'static str,
    pub args: Vec<MatrixRef>,
    pub kernel: Arc<dyn Kernel>,
    state: Mutex<TaskState>,
    predecessors: Mutex<Vec<(TaskId, DepKind)>>,
}

impl Task {
    fn new(id: TaskId, kernel_label: &'static str, args: Vec<MatrixRef>, kernel: Arc<dyn Kernel>) -> Self {
        Self {
            id,
            kernel_label,
            args,
            kernel,
            state: Mutex::new(TaskState {
                status: TaskStatus::NotReady,
                pending_deps: 0,
                successors: Vec::new(),
                assigned_worker: None,
                cost: None,
            }),
            predecessors: Mutex::new(Vec::new()),
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.state.lock().status
    }

    pub fn pending_deps(&self) -> i64 {
        self.state.lock().pending_deps
    }

    pub fn assigned_worker(&self) -> Option<usize> {
        self.state.lock().assigned_worker
    }

    pub fn cost(&self) -> Option<f64> {
        self.state.lock().cost
    }

    pub fn predecessors(&self) -> Vec<(TaskId, DepKind)> {
        self.predecessors.lock().clone()
    }

    pub fn successors(&self) -> Vec<(TaskId, DepKind)> {
        self.state.lock().successors.clone()
    }

    /// Adds an edge `self -> successor` of the given kind, incrementing the
    /// successor's pending-deps counter if `self` is not yet `Done`. Called
    /// by the dependency analyser while building the graph, with `self`
    /// locked first (it is always the lower-id endpoint — see
    /// `crate::analyser`).
    fn add_successor(&self, successor: &Task, kind: DepKind) {
        let mut my_state = self.state.lock();
        let not_done = my_state.status != TaskStatus::Done;
        my_state.successors.push((successor.id, kind));
        drop(my_state);

        successor.predecessors.lock().push((self.id, kind));
        if not_done {
            let mut succ_state = successor.state.lock();
            succ_state.pending_deps += 1;
        }
    }

    fn set_status(&self, status: TaskStatus) {
        self.state.lock().status = status;
    }

    fn set_running(&self, worker: usize) {
        let mut s = self.state.lock();
        s.status = TaskStatus::Running;
        s.assigned_worker = Some(worker);
    }

    fn set_queued(&self, cost: f64) {
        let mut s = self.state.lock();
        debug_assert_eq!(s.status, TaskStatus::NotReady);
        s.status = TaskStatus::Queued;
        s.cost = Some(cost);
    }

    /// Decrements the pending-deps counter, panicking (invariant violation,
    /// spec §4.5) if it would go negative. Returns `true` if the counter
    /// reached zero and the task was still `NotReady`, meaning the caller
    /// should enqueue it.
    fn decrement_pending(&self) -> bool {
        let mut s = self.state.lock();
        s.pending_deps -= 1;
        assert!(
            s.pending_deps >= 0,
            "task {:?}: pending_deps went negative",
            self.id
        );
        s.pending_deps == 0 && s.status == TaskStatus::NotReady
    }
}

/// The dependency graph: an append-only, by-id indexed set of tasks plus
/// their forward/reverse adjacency (stored inline on each `Task`).
pub struct TaskGraph {
    tasks: RwLock<Vec<Arc<Task>>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: TaskId) -> Arc<Task> {
        self.tasks.read()[id.0].clone()
    }

    pub fn all(&self) -> Vec<Arc<Task>> {
        self.tasks.read().clone()
    }

    /// Creates a new task with the next monotonic id and publishes it into
    /// the graph. The id totally orders task birth (spec §3 invariant).
    pub(crate) fn create(
        &self,
        kernel_label: &'static str,
        args: Vec<MatrixRef>,
        kernel: Arc<dyn Kernel>,
    ) -> Arc<Task> {
        let mut tasks = self.tasks.write();
        let id = TaskId(tasks.len());
        let task = Arc::new(Task::new(id, kernel_label, args, kernel));
        tasks.push(task.clone());
        task
    }

    pub(crate) fn add_edge(&self, from: TaskId, to: TaskId, kind: DepKind) {
        assert!(from.0 < to.0, "edge {:?} -> {:?} violates id ordering", from, to);
        let from_task = self.get(from);
        let to_task = self.get(to);
        from_task.add_successor(&to_task, kind);
    }

    pub(crate) fn set_status(&self, id: TaskId, status: TaskStatus) {
        self.get(id).set_status(status);
    }

    pub(crate) fn set_running(&self, id: TaskId, worker: usize) {
        self.get(id).set_running(worker);
    }

    pub(crate) fn set_queued(&self, id: TaskId, cost: f64) {
        self.get(id).set_queued(cost);
    }

    /// Decrements every successor's pending-deps counter and returns the
    /// ids that reached zero while still `NotReady` — the caller enqueues
    /// those (spec §4.5 step 5).
    pub(crate) fn complete_and_collect_ready(&self, id: TaskId) -> Vec<TaskId> {
        let task = self.get(id);
        let mut ready = Vec::new();
        for (succ_id, _kind) in task.successors() {
            let succ = self.get(succ_id);
            if succ.decrement_pending() {
                ready.push(succ_id);
            }
        }
        task.set_status(TaskStatus::Done);
        ready
    }

    /// Marks `id` and every transitive successor `Failed`, declining to
    /// enqueue any of them (spec §4.8 kernel-failure propagation).
    pub(crate) fn fail_transitively(&self, id: TaskId) -> Vec<TaskId> {
        let mut failed = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let task = self.get(cur);
            if task.status() == TaskStatus::Failed {
                continue;
            }
            task.set_status(TaskStatus::Failed);
            failed.push(cur);
            for (succ, _) in task.successors() {
                stack.push(succ);
            }
        }
        failed
    }

    /// Every task whose `pending_deps == 0` and status is still
    /// `NotReady` — used by the session controller's transition to
    /// `Draining` (spec §4.7).
    pub(crate) fn zero_dep_not_ready(&self) -> Vec<TaskId> {
        self.tasks
            .read()
            .iter()
            .filter(|t| t.status() == TaskStatus::NotReady && t.pending_deps() == 0)
            .map(|t| t.id)
            .collect()
    }
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}
