use super::utils::process_files;
use anyhow::Context;
use clap::Args;
use label::prelude::list_nii_files;
use label::prep::extract::{AntsPyNetExtractor, BrainExtractOptions, BrainExtractor, DEFAULT_PYTHON};
use label::prep::nii::ensure_dir;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct BrainExtract {
    /// 输入目录。
    #[arg(long = "input-dir", short, alias = "input_dir")]
    input_dir: PathBuf,
    /// 输出目录（默认与输入目录相同）。
    #[arg(long = "output-dir", short, alias = "output_dir")]
    output_dir: Option<PathBuf>,
    /// 跳过连通域与形态学处理，只写出掩膜后的图像。
    #[arg(long = "skip-morpho", alias = "skip_morpho")]
    skip_morpho: bool,
    #[command(flatten)]
    extract: ExtractArgs,
    /// 工作线程数，0表示逻辑CPU个数。每个线程各自启动一个Python进程。
    #[arg(long = "num-workers", alias = "num_workers", default_value_t = 1)]
    num_workers: usize,
}

/// 脑提取参数，`preprocess`子命令共用。
#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// 传给ANTsPyNet的模态。
    #[arg(long, default_value = "t1")]
    modality: String,
    /// 闭运算后额外膨胀的体素数。
    #[arg(long = "dilation-voxels", alias = "dilation_voxels", default_value_t = 0)]
    dilation_voxels: usize,
    /// 输出文件名加`_masked`后缀，否则保持原文件名。
    #[arg(long)]
    rename: bool,
    /// 安装了`antspynet`的Python解释器。
    #[arg(long, default_value = DEFAULT_PYTHON)]
    python: OsString,
}

impl ExtractArgs {
    pub fn options(&self, skip_morpho: bool) -> BrainExtractOptions {
        BrainExtractOptions {
            modality: self.modality.clone(),
            skip_morpho,
            dilation_voxels: self.dilation_voxels,
            rename: self.rename,
        }
    }

    pub fn extractor(&self) -> AntsPyNetExtractor {
        AntsPyNetExtractor {
            python: self.python.clone(),
        }
    }
}

impl BrainExtract {
    pub fn run(&mut self) -> anyhow::Result<()> {
        // [input-dir/*.nii*] -> [output-dir/*.nii*, output-dir/mask_*.nii*]
        let output_dir = self.output_dir.as_deref().unwrap_or(&self.input_dir);
        extract_dir(
            self.extract.options(self.skip_morpho),
            self.extract.extractor(),
            &self.input_dir,
            output_dir,
            self.num_workers,
        )
    }
}

/// 对`input_dir`下的所有体数据执行脑提取。
pub fn extract_dir<E: BrainExtractor + 'static>(
    opts: BrainExtractOptions,
    extractor: E,
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
    if opts.skip_morpho {
        log::info!("morphological operations skipped, no mask will be written");
    }
    let output_dir = output_dir.to_path_buf();
    process_files(inputs, workers, move |input| {
        let out = opts.process_file(&extractor, input, &output_dir)?;
        if let Some(mask) = &out.mask {
            log::info!("{}: mask saved to `{}`", input.display(), mask.display());
        }
        Ok(out.image)
    })
}
