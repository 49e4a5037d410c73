pub mod args;
mod brain_extract;
mod conform;
mod infer;
mod preprocess;
mod relabel;
mod reorder_labels;
mod utils;
mod volumetry;

#[cfg(test)]
mod test_utils;

/// 批处理命令默认的工作线程数。
const DEFAULT_WORKERS: usize = 4;
