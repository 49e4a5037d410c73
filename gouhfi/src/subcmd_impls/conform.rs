use super::utils::process_files;
use super::DEFAULT_WORKERS;
use anyhow::Context;
use clap::Args;
use label::prelude::list_nii_files;
use label::prep::conform::ConformOptions;
use label::prep::nii::ensure_dir;
use label::prep::orient::Orientation;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct Conform {
    /// 输入目录。
    #[arg(long = "input-dir", short, alias = "input_dir")]
    input_dir: PathBuf,
    /// 输出目录。
    #[arg(long = "output-dir", short, alias = "output_dir")]
    output_dir: PathBuf,
    #[command(flatten)]
    conform: ConformArgs,
    /// 工作线程数，0表示逻辑CPU个数。
    #[arg(long = "num-workers", alias = "num_workers", default_value_t = DEFAULT_WORKERS)]
    num_workers: usize,
}

/// 规范化参数，`preprocess`子命令共用。
#[derive(Args, Debug, Clone)]
pub struct ConformArgs {
    /// 目标朝向（三个字母的轴编码）。
    #[arg(long, default_value = "LIA")]
    orientation: Orientation,
    /// 输出强度下界。
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    min: f32,
    /// 输出强度上界。
    #[arg(long, default_value_t = 255.0, allow_negative_numbers = true)]
    max: f32,
    /// 映射到下界的百分位数。
    #[arg(long, default_value_t = 0.5)]
    pmin: f64,
    /// 映射到上界的百分位数。
    #[arg(long, default_value_t = 99.5)]
    pmax: f64,
}

impl ConformArgs {
    pub fn options(&self) -> anyhow::Result<ConformOptions> {
        let opts = ConformOptions {
            orientation: self.orientation,
            min: self.min,
            max: self.max,
            pmin: self.pmin,
            pmax: self.pmax,
        };
        opts.validate()?;
        Ok(opts)
    }
}

impl Conform {
    pub fn run(&mut self) -> anyhow::Result<()> {
        // [input-dir/*.nii*] -> [output-dir/*.nii*]
        let opts = self.conform.options()?;
        conform_dir(opts, &self.input_dir, &self.output_dir, self.num_workers)
    }
}

/// 规范化`input_dir`下的所有体数据。
pub fn conform_dir(
    opts: ConformOptions,
    input_dir: &Path,
    output_dir: &Path,
    workers: usize,
) -> anyhow::Result<()> {
    let inputs = list_nii_files(input_dir)
        .with_context(|| format!("cannot list `{}`", input_dir.display()))?;
    ensure_dir(output_dir)?;
    if inputs.is_empty() {
        log::warn!("no .nii/.nii.gz files found in `{}`", input_dir.display());
        return Ok(());
    }
    log::info!(
        "conforming to {} with intensities in [{}, {}] (percentiles {}..{})",
        opts.orientation,
        opts.min,
        opts.max,
        opts.pmin,
        opts.pmax
    );
    let output_dir = output_dir.to_path_buf();
    process_files(inputs, workers, move |input| opts.process_file(input, &output_dir))
}
