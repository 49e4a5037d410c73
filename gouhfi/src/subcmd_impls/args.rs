use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gouhfi")]
#[command(about = "GOUHFI脑分割流程的预处理、推理与后处理工具集.")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// 子命令。
    #[command(subcommand)]
    pub(crate) command: Commands,
}

impl Cli {
    pub fn run_program(&mut self) -> anyhow::Result<()> {
        match self.command {
            Commands::Conform(ref mut v) => v.run(),
            Commands::BrainExtract(ref mut v) => v.run(),
            Commands::Preprocess(ref mut v) => v.run(),
            Commands::Relabel(ref mut v) => v.run(),
            Commands::ReorderLabels(ref mut v) => v.run(),
            Commands::Volumetry(ref mut v) => v.run(),
            Commands::Infer(ref mut v) => v.run(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// 将目录下的体数据统一朝向，并按百分位数重映射强度。
    Conform(crate::subcmd_impls::conform::Conform),
    /// 用ANTsPyNet提取脑区，并对脑掩膜做连通域与形态学处理。
    BrainExtract(crate::subcmd_impls::brain_extract::BrainExtract),
    /// 依次执行规范化与脑提取。
    Preprocess(crate::subcmd_impls::preprocess::Preprocess),
    /// 保留、删除、合并、二值化或重新编号分割标签。
    Relabel(crate::subcmd_impls::relabel::Relabel),
    /// 按标签名称将分割结果从一个查找表映射到另一个查找表。
    ReorderLabels(crate::subcmd_impls::reorder_labels::ReorderLabels),
    /// 统计每个标签的体积并写出CSV。
    Volumetry(crate::subcmd_impls::volumetry::Volumetry),
    /// 运行nnU-Net推理、后处理，并可选地重排标签。
    Infer(crate::subcmd_impls::infer::Infer),
}
