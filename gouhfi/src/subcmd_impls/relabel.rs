use super::utils::{label_ranges, process_files};
use super::DEFAULT_WORKERS;
use anyhow::Context;
use clap::Args;
use label::prelude::{list_nii_files, RelabelOptions, SetToOne};
use label::prep::nii::ensure_dir;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct Relabel {
    /// 输入目录（.nii或.nii.gz标签图）。
    #[arg(long, alias = "input-dir")]
    input: PathBuf,
    /// 输出目录。
    #[arg(long, alias = "output-dir")]
    output: PathBuf,
    /// 要保留的标签，其余置0。支持`a-b`闭区间。
    #[arg(long = "keep-labels", alias = "keep_labels", num_args = 1.., value_parser = label_ranges)]
    keep_labels: Option<Vec<BTreeSet<i32>>>,
    /// 小于该值的标签置0。
    #[arg(long = "min-label", alias = "min_label")]
    min_label: Option<i32>,
    /// 大于该值的标签置0。
    #[arg(long = "max-label", alias = "max_label")]
    max_label: Option<i32>,
    /// 置为1的标签，或`all`表示所有非零标签。
    #[arg(long = "set-to-one", alias = "set_to_one", num_args = 1..)]
    set_to_one: Option<Vec<String>>,
    /// 将剩余标签重新编号为1..N。
    #[arg(long)]
    reindex: bool,
    /// 将左皮层分区（1000+）合并为3，右皮层分区（2000+）合并为42。
    #[arg(long = "combine-ctx", alias = "combine_ctx")]
    combine_ctx: bool,
    /// 工作线程数，0表示逻辑CPU个数。
    #[arg(long = "num-workers", alias = "num_workers", default_value_t = DEFAULT_WORKERS)]
    num_workers: usize,
}

impl Relabel {
    fn options(&self) -> anyhow::Result<RelabelOptions> {
        let set_to_one = match &self.set_to_one {
            Some(values) => Some(SetToOne::from_values(values).map_err(anyhow::Error::msg)?),
            None => None,
        };
        let opts = RelabelOptions {
            keep_labels: self
                .keep_labels
                .as_ref()
                .map(|sets| sets.iter().flatten().copied().collect()),
            min_label: self.min_label,
            max_label: self.max_label,
            combine_ctx: self.combine_ctx,
            set_to_one,
            reindex: self.reindex,
        };
        opts.validate()?;
        Ok(opts)
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        // [input/*.nii*] -> [output/*.nii*]
        let opts = self.options()?;
        let inputs = list_nii_files(&self.input)
            .with_context(|| format!("cannot list `{}`", self.input.display()))?;
        if inputs.is_empty() {
            log::warn!("no .nii/.nii.gz files found in `{}`", self.input.display());
            return Ok(());
        }
        ensure_dir(&self.output)?;
        let output = self.output.clone();
        process_files(inputs, self.num_workers, move |input| opts.process_file(input, &output))
    }
}
