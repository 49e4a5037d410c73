use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use label::prelude::{run_batch, worker_count, AccTimer, Result as PrepResult};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// 解析形如`3`、`1000-1035`或`2,41-43`的标签集合。
pub fn label_ranges(s: &str) -> Result<BTreeSet<i32>, String> {
    let err = || format!("`{s}` is not a label or an inclusive label range `a-b`");
    let mut set = BTreeSet::<i32>::new();
    for ranges in s.split(',').filter(|r| !r.is_empty()) {
        let mut d_iter = ranges.split('-');
        let d1: i32 = d_iter.next().ok_or_else(err)?.trim().parse().map_err(|_| err())?;
        if let Some(d2) = d_iter.next() {
            let d2: i32 = d2.trim().parse().map_err(|_| err())?;
            if d2 < d1 || d_iter.next().is_some() {
                return Err(err());
            }
            set.extend(d1..=d2);
        } else {
            set.insert(d1);
        }
    }
    if set.is_empty() {
        return Err(err());
    }
    Ok(set)
}

/// 在输入目录名后追加后缀，得到同级目录，例如`data/raw` -> `data/raw_cfm`。
pub fn sibling_dir(input_dir: &Path, suffix: &str) -> anyhow::Result<PathBuf> {
    let input_dir = fs::canonicalize(input_dir)
        .with_context(|| format!("cannot resolve input directory `{}`", input_dir.display()))?;
    let Some(name) = input_dir.file_name() else {
        bail!("`{}` has no directory name to derive an output directory from", input_dir.display());
    };
    let mut name = OsString::from(name);
    name.push(suffix);
    Ok(input_dir.with_file_name(name))
}

/// 批处理进度条。
pub fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}")
        .map(|s| s.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// 用线程池处理所有输入文件，显示进度；任一文件失败时在全部尝试后返回错误。
pub fn process_files<F>(inputs: Vec<PathBuf>, workers: usize, job: F) -> anyhow::Result<()>
where
    F: Fn(&PathBuf) -> PrepResult<PathBuf> + Send + Sync + 'static,
{
    let len = inputs.len();
    let workers = worker_count(workers).min(len.max(1));
    log::info!("Processing {len} files with {workers} workers...");

    let pb = progress_bar(len);
    let results = run_batch(inputs, workers, job, |input, res| {
        if let Ok(out) = res {
            log::debug!("{} -> {}", input.display(), out.display());
        }
        pb.inc(1);
    })?;
    pb.finish_and_clear();

    let mut failed = 0;
    for (input, res) in results {
        if let Err(e) = res {
            log::error!("{}: {:#}", input.display(), anyhow::Error::new(e));
            failed += 1;
        }
    }
    if failed != 0 {
        bail!("{failed} of {len} files failed");
    }
    log::info!("All files processed.");
    Ok(())
}

/// 把命令还原为一行可读的命令行。
pub fn command_line(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 执行外部命令并计时；无法启动或返回非零状态都视为失败。
pub fn run_external(cmd: &mut Command, step: &str) -> anyhow::Result<Duration> {
    log::info!("{step}: {}", command_line(cmd));
    let mut timer = AccTimer::new();
    timer.start();
    let status = cmd
        .status()
        .with_context(|| format!("{step}: cannot run `{}`", cmd.get_program().to_string_lossy()))?;
    timer.elapsed();
    if !status.success() {
        bail!("{step} failed ({status})");
    }
    log::info!("{step} completed in {:.2} seconds.", timer.get_total_secs());
    Ok(timer.total())
}
