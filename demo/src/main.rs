use cj_kernels::{GemmKernel, TileStore};
use cj_runtime::{AccessMode, ElementType, Kernel, MatrixRef, RuntimeConfig, Session};
use ndarray::Array2;
use std::sync::Arc;

fn main() {
    env_logger::init();

    let session = Session::init(RuntimeConfig {
        executor_workers: 2,
        ..Default::default()
    })
    .expect("session init");

    // A 2x2 grid of 2x2 tiles, single precision.
    let base = session.register_base(2, 2, 2, ElementType::Single);
    let shape = session.base(base).expect("base just registered");
    let (a, b, c, d) = (shape.tile(0, 0), shape.tile(0, 1), shape.tile(1, 0), shape.tile(1, 1));

    let store = Arc::new(TileStore::new());
    let denom = 64.0;
    store.insert(a, ndarray::array![[1. / denom, 2. / denom], [3. / denom, 4. / denom]]);
    store.insert(b, ndarray::array![[1. / denom, 2. / denom], [3. / denom, 4. / denom]]);
    store.insert(c, Array2::zeros((2, 2)));
    store.insert(d, Array2::zeros((2, 2)));

    let kernel: Arc<dyn Kernel> = Arc::new(GemmKernel::new(store.clone()));

    session.queue_begin();
    session
        .submit(
            "gemm",
            vec![MatrixRef::new(a, AccessMode::R), MatrixRef::new(b, AccessMode::R), MatrixRef::new(c, AccessMode::RW)],
            kernel.clone(),
        )
        .expect("submit gemm(a, b -> c)");
    session
        .submit(
            "gemm",
            vec![MatrixRef::new(c, AccessMode::R), MatrixRef::new(b, AccessMode::R), MatrixRef::new(d, AccessMode::RW)],
            kernel,
        )
        .expect("submit gemm(c, b -> d)");
    session.queue_end();

    let report = session.term();
    println!("{}", report.dot);
    if report.failed_tasks.is_empty() {
        println!("d = {:?}", store.get(d).expect("d has data"));
    } else {
        println!("failed tasks: {:?}", report.failed_tasks);
    }
}
