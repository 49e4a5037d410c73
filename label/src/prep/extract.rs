//! 脑提取：由外部ANTsPyNet网络生成脑概率图，再进行掩膜后处理。

use super::error::{PrepError, Result};
use super::improc::consts::{CLOSING_RADIUS, MASK_THRESHOLD};
use super::improc::{apply_mask, binary_closing, binary_dilation, largest_component, threshold_mask};
use super::nii::{file_name_of, masked_name, NiiVolume};
use ndarray::Array3;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        /// 默认的Python解释器。
        pub const DEFAULT_PYTHON: &str = "python";
    } else {
        /// 默认的Python解释器。
        pub const DEFAULT_PYTHON: &str = "python3";
    }
}

/// 在输入体数据的网格上生成脑概率图。
pub trait BrainExtractor: Send + Sync {
    /// 对`input`执行脑提取，把概率图写到`prob_out`。
    fn probability_map(&self, input: &Path, modality: &str, prob_out: &Path) -> Result<()>;
}

/// 通过Python子进程调用`antspynet.brain_extraction`。
#[derive(Debug, Clone)]
pub struct AntsPyNetExtractor {
    pub python: OsString,
}

const ANTSPYNET_SCRIPT: &str = r#"
import os, sys
os.environ["TF_CPP_MIN_LOG_LEVEL"] = "3"
import ants
import antspynet
image = ants.image_read(sys.argv[1])
prob = antspynet.brain_extraction(image, modality=sys.argv[3])
ants.image_write(prob, sys.argv[2])
"#;

impl Default for AntsPyNetExtractor {
    fn default() -> Self {
        Self {
            python: DEFAULT_PYTHON.into(),
        }
    }
}

impl AntsPyNetExtractor {
    /// 构造子进程命令（不执行）。
    pub fn command(&self, input: &Path, modality: &str, prob_out: &Path) -> Command {
        let mut cmd = Command::new(&self.python);
        cmd.arg("-c")
            .arg(ANTSPYNET_SCRIPT)
            .arg(input)
            .arg(prob_out)
            .arg(modality)
            .env("TF_CPP_MIN_LOG_LEVEL", "3");
        cmd
    }
}

impl BrainExtractor for AntsPyNetExtractor {
    fn probability_map(&self, input: &Path, modality: &str, prob_out: &Path) -> Result<()> {
        let program = self.python.to_string_lossy().into_owned();
        let status = self
            .command(input, modality, prob_out)
            .status()
            .map_err(|e| PrepError::External {
                program: program.clone(),
                reason: e.to_string(),
            })?;
        if !status.success() {
            return Err(PrepError::External {
                program,
                reason: format!("brain extraction of `{}` exited with {status}", input.display()),
            });
        }
        Ok(())
    }
}

/// 脑提取选项。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrainExtractOptions {
    /// 传给网络的模态（如`t1`）。
    pub modality: String,
    /// 跳过连通域与形态学处理，只写出掩膜后的图像。
    pub skip_morpho: bool,
    /// 闭运算之后额外膨胀的半径（体素），0表示不膨胀。
    pub dilation_voxels: usize,
    /// 输出文件名加`_masked`后缀。
    pub rename: bool,
}

impl Default for BrainExtractOptions {
    fn default() -> Self {
        Self {
            modality: "t1".to_owned(),
            skip_morpho: false,
            dilation_voxels: 0,
            rename: false,
        }
    }
}

/// 单个文件的输出路径。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOutput {
    pub image: PathBuf,
    pub mask: Option<PathBuf>,
}

impl BrainExtractOptions {
    /// 由概率图得到最终的脑掩膜。
    pub fn refine_mask(&self, prob: &Array3<f32>) -> Array3<bool> {
        let mask = threshold_mask(prob.view(), MASK_THRESHOLD);
        if self.skip_morpho {
            return mask;
        }
        let largest = largest_component(mask.view());
        let closed = binary_closing(largest.view(), CLOSING_RADIUS);
        if self.dilation_voxels > 0 {
            binary_dilation(closed.view(), self.dilation_voxels)
        } else {
            closed
        }
    }

    /// 输出图像与掩膜的文件名。
    pub fn output_names(&self, input_name: &str) -> (String, String) {
        let image = if self.rename {
            masked_name(input_name)
        } else {
            input_name.to_owned()
        };
        (image, format!("mask_{input_name}"))
    }

    /// 对单个文件执行脑提取并写出结果。
    pub fn process_file<E: BrainExtractor + ?Sized>(
        &self,
        extractor: &E,
        input: &Path,
        output_dir: &Path,
    ) -> Result<ExtractOutput> {
        let input_name = file_name_of(input)?;
        let (image_name, mask_name) = self.output_names(input_name);
        let image = NiiVolume::read(input)?;

        let scratch = tempfile::tempdir().map_err(|e| PrepError::io(std::env::temp_dir(), e))?;
        let prob_path = scratch.path().join("brain_probability.nii.gz");
        extractor.probability_map(input, &self.modality, &prob_path)?;
        let prob = NiiVolume::read(&prob_path)?;
        if prob.shape() != image.shape() {
            let (a, b) = (prob.shape(), image.shape());
            return Err(PrepError::ShapeMismatch(vec![a.0, a.1, a.2], vec![b.0, b.1, b.2]));
        }

        let mask = self.refine_mask(&prob.data);
        if !mask.iter().any(|&m| m) {
            log::warn!("{}: brain mask is empty", input.display());
        }
        let masked = apply_mask(image.data.view(), mask.view());
        let image_out = output_dir.join(image_name);
        image.write_with(&image_out, &masked)?;

        let mask_out = if self.skip_morpho {
            None
        } else {
            let mask_out = output_dir.join(mask_name);
            image.write_with(&mask_out, &mask.mapv(u8::from))?;
            Some(mask_out)
        };
        Ok(ExtractOutput {
            image: image_out,
            mask: mask_out,
        })
    }
}
