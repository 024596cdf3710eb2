//! Diagnostics (spec §4.9): DOT-like text export of the dependency graph.
//!
//! Grounded in `cj_Graph_output_dot` in `cj.c`, which walks the vertex array
//! once and prints one `node [label=...]` line per task followed by one
//! edge line per successor. Call with the session's analysis lock held so
//! the graph is not mutated mid-walk.

use crate::graph::TaskGraph;

/// Renders the current graph as a DOT-like digraph: one line per task
/// (id, kernel label, assigned worker, status) and one line per edge
/// (RAW/WAR label).
pub(crate) fn to_dot(graph: &TaskGraph) -> String {
    let mut out = String::from("digraph cj {\n");
    for task in graph.all() {
        out.push_str(&format!(
            "  t{} [label=\"{} ({:?})\" worker={:?}];\n",
            task.id.0,
            task.kernel_label,
            task.status(),
            task.assigned_worker()
        ));
    }
    for task in graph.all() {
        for (succ, kind) in task.successors() {
            out.push_str(&format!(
                "  t{} -> t{} [label=\"{}\"];\n",
                task.id.0,
                succ.0,
                kind.label()
            ));
        }
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyser::analyse;
    use crate::coherence::CoherenceDirectory;
    use crate::tile::{BaseId, MatrixRef, TileId};
    use crate::worker::NoopKernel;
    use std::sync::Arc;

    #[test]
    fn renders_nodes_and_edges() {
        let graph = TaskGraph::new();
        let coherence = CoherenceDirectory::new();
        let kernel = Arc::new(NoopKernel);
        let a = TileId { base: BaseId(0), row: 0, col: 0 };
        let b = TileId { base: BaseId(0), row: 0, col: 1 };

        let t1 = graph.create("write_a", vec![MatrixRef::write(a)], kernel.clone());
        analyse(&graph, &coherence, t1.id, &t1.args);
        let t2 = graph.create("rw_ab", vec![MatrixRef::read(a), MatrixRef::write(b)], kernel);
        analyse(&graph, &coherence, t2.id, &t2.args);

        let dot = to_dot(&graph);
        assert!(dot.contains("t0 [label=\"write_a"));
        assert!(dot.contains("t0 -> t1 [label=\"RAW\"]"));
    }
}
