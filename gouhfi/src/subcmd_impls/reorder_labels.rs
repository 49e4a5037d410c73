use super::utils::process_files;
use super::DEFAULT_WORKERS;
use anyhow::Context;
use clap::Args;
use label::prelude::{list_nii_files, LabelLut};
use label::prep::lut::LabelReorder;
use label::prep::nii::ensure_dir;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ReorderLabels {
    /// 输入目录（分割结果）。
    #[arg(long = "input-dir", short, alias = "input_dir")]
    input_dir: PathBuf,
    /// 输出目录。
    #[arg(long = "output-dir", short, alias = "output_dir")]
    output_dir: PathBuf,
    /// 输入标签所用的查找表。
    #[arg(long = "old-labels-file", alias = "old_labels_file")]
    old_labels_file: PathBuf,
    /// 目标查找表。
    #[arg(long = "new-labels-file", alias = "new_labels_file")]
    new_labels_file: PathBuf,
    /// 工作线程数，0表示逻辑CPU个数。
    #[arg(long = "num-workers", alias = "num_workers", default_value_t = DEFAULT_WORKERS)]
    num_workers: usize,
}

impl ReorderLabels {
    pub fn run(&mut self) -> anyhow::Result<()> {
        // [input-dir/*.nii*] -> [output-dir/*.nii*]
        reorder_dir(
            &self.input_dir,
            &self.output_dir,
            &self.old_labels_file,
            &self.new_labels_file,
            self.num_workers,
        )
    }
}

/// 按标签名称把`input_dir`下的分割结果从`old_lut`重排到`new_lut`。
pub fn reorder_dir(
    input_dir: &Path,
    output_dir: &Path,
    old_lut: &Path,
    new_lut: &Path,
    workers: usize,
) -> anyhow::Result<()> {
    let old = LabelLut::from_file(old_lut)?;
    let new = LabelLut::from_file(new_lut)?;
    let reorder = LabelReorder::new(&old, &new);
    let missing: Vec<i32> = old
        .iter()
        .map(|(id, _)| id)
        .filter(|&id| reorder.get(id).is_none())
        .collect();
    if !missing.is_empty() {
        log::warn!(
            "labels {missing:?} of `{}` have no name match in `{}`",
            old_lut.display(),
            new_lut.display()
        );
    }

    let inputs = list_nii_files(input_dir)
        .with_context(|| format!("cannot list `{}`", input_dir.display()))?;
    if inputs.is_empty() {
        log::warn!("no .nii/.nii.gz files found in `{}`", input_dir.display());
        return Ok(());
    }
    ensure_dir(output_dir)?;
    let output_dir = output_dir.to_path_buf();
    process_files(inputs, workers, move |input| reorder.process_file(input, &output_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subcmd_impls::args::{Cli, Commands};
    use clap::Parser;
    use std::fs;

    #[test]
    fn test_parse_legacy_names() {
        let cli = Cli::try_parse_from([
            "gouhfi",
            "reorder-labels",
            "--input_dir",
            "pp",
            "--output_dir",
            "reo",
            "--old_labels_file",
            "old.txt",
            "--new_labels_file",
            "new.txt",
        ])
        .unwrap();
        let Commands::ReorderLabels(r) = cli.command else {
            panic!("expected reorder-labels");
        };
        assert_eq!(r.old_labels_file, Path::new("old.txt"));
        assert_eq!(r.new_labels_file, Path::new("new.txt"));
        assert_eq!(r.num_workers, 4);
    }

    #[test]
    fn test_missing_lut_fails() {
        let dir = tempfile::tempdir().unwrap();
        let lut = dir.path().join("lut.txt");
        fs::write(&lut, "0 Unknown\n1 Left-WM\n").unwrap();
        let res = reorder_dir(dir.path(), dir.path(), &lut, &dir.path().join("none.txt"), 1);
        assert!(res.is_err());
    }

    #[test]
    fn test_empty_input_dir_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let lut = dir.path().join("lut.txt");
        fs::write(&lut, "0 Unknown\n1 Left-WM\n").unwrap();
        let out = dir.path().join("out");
        assert!(reorder_dir(dir.path(), &out, &lut, &lut, 1).is_ok());
        assert!(!out.exists());
    }
}
