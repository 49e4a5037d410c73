use super::utils::progress_bar;
use anyhow::Context;
use clap::{Args, ValueEnum};
use label::prelude::{list_nii_files, LabelLut, LabelVolume, NiiVolume};
use label::prep::nii::{ensure_dir, file_name_of};
use label::prep::volumetry::{compute_volumes, write_csv};
use std::fmt;
use std::path::{Path, PathBuf};

/// 分割任务，决定默认的标签表与输出文件名。
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Task {
    Brain,
    Cortex,
}

impl Task {
    fn default_label_file(self) -> &'static str {
        match self {
            Task::Brain => "brain_labels.txt",
            Task::Cortex => "cortex_labels.txt",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Brain => write!(f, "brain"),
            Task::Cortex => write!(f, "cortex"),
        }
    }
}

#[derive(Args, Debug)]
pub struct Volumetry {
    /// 标签图（.nii或.nii.gz）所在目录。
    input_dir: PathBuf,
    /// CSV输出目录（默认与输入目录相同）。
    #[arg(long = "output-dir", short, alias = "output_dir")]
    output_dir: Option<PathBuf>,
    /// 任务类型。
    #[arg(long, short, value_enum)]
    task: Task,
    /// 自定义标签表（`ID NAME`每行一项）。
    #[arg(long = "label-file", short, alias = "label_file")]
    label_file: Option<PathBuf>,
}

impl Volumetry {
    pub fn run(&mut self) -> anyhow::Result<()> {
        // [input_dir/*.nii*] -> [output-dir/volumetry_<task>.csv]
        let label_file = self
            .label_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.task.default_label_file()));
        if !label_file.is_file() {
            log::error!("label file `{}` not found", label_file.display());
            return Ok(());
        }
        let lut = LabelLut::from_file(&label_file)?;
        log::info!("{} labels loaded from `{}`", lut.len(), label_file.display());

        let inputs = list_nii_files(&self.input_dir)
            .with_context(|| format!("cannot list `{}`", self.input_dir.display()))?;
        if inputs.is_empty() {
            log::warn!("no .nii/.nii.gz files found in `{}`", self.input_dir.display());
            return Ok(());
        }

        let output_dir = self.output_dir.as_deref().unwrap_or(&self.input_dir);
        ensure_dir(output_dir)?;
        let csv_path = output_dir.join(format!("volumetry_{}.csv", self.task));
        Program::new(inputs, lut).run(&csv_path)
    }
}

struct Program {
    inputs: Vec<PathBuf>,
    lut: LabelLut,
}

impl Program {
    #[inline]
    fn new(inputs: Vec<PathBuf>, lut: LabelLut) -> Self {
        Self { inputs, lut }
    }

    fn run(&self, csv_path: &Path) -> anyhow::Result<()> {
        let pb = progress_bar(self.inputs.len());
        let mut rows = Vec::new();
        for input in self.inputs.iter() {
            let nii = NiiVolume::read(input)?;
            let volume = LabelVolume::from_rounded(nii.data.view());
            rows.extend(compute_volumes(
                file_name_of(input)?,
                &volume,
                &self.lut,
                nii.voxel_volume(),
            ));
            pb.inc(1);
        }
        pb.finish_and_clear();
        write_csv(csv_path, &rows)?;
        log::info!("Volumetry saved to `{}`", csv_path.display());
        Ok(())
    }
}
