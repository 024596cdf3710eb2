//! Dependency Analyser (spec §4.2, C4): converts a task's ordered tile R/W
//! arguments into RAW/WAR edges against the coherence directory's
//! reader/writer bookkeeping.
//!
//! Grounded in `cj_Task_dependency_analysis` in `cj.c`. Arguments are
//! processed in declared order but the result is order-independent: edges
//! are added against whatever tile state existed before this task was
//! inserted (spec §4.2).

use crate::coherence::CoherenceDirectory;
use crate::graph::{DepKind, TaskGraph, TaskId};
use crate::tile::MatrixRef;

/// Runs dependency analysis for a newly created task and links it into the
/// graph. Must be called with the session's analysis lock held — the
/// baseline only locks the per-tile coherence entry and the edge
/// endpoints, relying on single-threaded submission for the rest (spec
/// §4.2 closing paragraph).
pub(crate) fn analyse(graph: &TaskGraph, coherence: &CoherenceDirectory, task_id: TaskId, args: &[MatrixRef]) {
    for arg in args {
        let tile = arg.tile;

        if arg.mode.reads() {
            if let Some(writer) = coherence.last_writer(tile) {
                if writer != task_id {
                    graph.add_edge(writer, task_id, DepKind::Raw);
                }
            }
            coherence.record_read(tile, task_id);
        }

        if arg.mode.writes() {
            for reader in coherence.readers_since_last_writer(tile) {
                if reader != task_id {
                    graph.add_edge(reader, task_id, DepKind::War);
                }
            }
            coherence.record_write(tile, task_id);
        }
    }
}
