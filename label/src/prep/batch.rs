//! 文件级并行：固定大小的线程池，结果经由通道返回。

use super::error::{PrepError, Result};
use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::sync::Arc;
use threadpool::ThreadPool;

/// 实际使用的工作线程数：0表示逻辑CPU个数。
#[inline]
pub fn worker_count(requested: usize) -> usize {
    match requested {
        0 => num_cpus::get(),
        n => n,
    }
}

/// 用`workers`个工作线程对每个输入执行`job`。
///
/// 每完成一个任务就以其结果调用一次`on_done`（在调用者线程中，按完成顺序）。
/// 返回与`inputs`顺序一致的(输入, 结果)列表。
pub fn run_batch<F, D>(
    inputs: Vec<PathBuf>,
    workers: usize,
    job: F,
    mut on_done: D,
) -> Result<Vec<(PathBuf, Result<PathBuf>)>>
where
    F: Fn(&PathBuf) -> Result<PathBuf> + Send + Sync + 'static,
    D: FnMut(&PathBuf, &Result<PathBuf>),
{
    let len = inputs.len();
    let workers = worker_count(workers);
    if workers == 1 || len <= 1 {
        return Ok(inputs
            .into_iter()
            .map(|input| {
                let res = job(&input);
                on_done(&input, &res);
                (input, res)
            })
            .collect());
    }

    let pool = ThreadPool::new(workers.min(len));
    let job = Arc::new(job);
    let (tx, rx) = channel();
    for (index, input) in inputs.into_iter().enumerate() {
        let tx = tx.clone();
        let job = Arc::clone(&job);
        pool.execute(move || {
            let res = job(&input);
            let _ = tx.send((index, input, res));
        });
    }
    drop(tx);

    let mut slots: Vec<Option<(PathBuf, Result<PathBuf>)>> = (0..len).map(|_| None).collect();
    for (index, input, res) in rx.iter().take(len) {
        on_done(&input, &res);
        slots[index] = Some((input, res));
    }
    pool.join();

    let lost = slots.iter().filter(|s| s.is_none()).count();
    if lost != 0 {
        return Err(PrepError::PoolDisconnected(lost));
    }
    Ok(slots.into_iter().flatten().collect())
}
