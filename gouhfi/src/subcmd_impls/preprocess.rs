use super::brain_extract::{extract_dir, ExtractArgs};
use super::conform::{conform_dir, ConformArgs};
use super::utils::sibling_dir;
use clap::Args;
use label::prelude::AccTimer;
use label::prep::conform::ConformOptions;
use label::prep::extract::{BrainExtractOptions, BrainExtractor};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct Preprocess {
    /// 原始图像所在目录。
    #[arg(long = "input-dir", short, alias = "input_dir")]
    input_dir: PathBuf,
    /// 脑提取结果目录（默认为输入目录名加`_preproc`）。
    #[arg(long = "output-dir", short, alias = "output_dir")]
    output_dir: Option<PathBuf>,
    #[command(flatten)]
    extract: ExtractArgs,
    /// 对脑掩膜执行连通域与形态学处理（默认跳过）。
    #[arg(long = "with-morpho", alias = "with_morpho")]
    with_morpho: bool,
    /// 只做规范化，不做脑提取。
    #[arg(long = "no-brain-extraction", alias = "no_brain_extraction")]
    no_brain_extraction: bool,
    #[command(flatten)]
    conform: ConformArgs,
    /// 每一步的工作线程数，0表示逻辑CPU个数。
    #[arg(long = "num-workers", alias = "num_workers", default_value_t = 1)]
    num_workers: usize,
}

impl Preprocess {
    pub fn run(&mut self) -> anyhow::Result<()> {
        // [input-dir] -> [input-dir_cfm] -> [output-dir | input-dir_preproc]
        let conform_dir = sibling_dir(&self.input_dir, "_cfm")?;
        let brain_dir = match &self.output_dir {
            Some(dir) => dir.clone(),
            None => sibling_dir(&self.input_dir, "_preproc")?,
        };
        let extract = if self.no_brain_extraction {
            None
        } else {
            Some((
                self.extract.options(!self.with_morpho),
                self.extract.extractor(),
            ))
        };
        Program::new(
            self.input_dir.clone(),
            conform_dir,
            brain_dir,
            self.conform.options()?,
            extract,
            self.num_workers,
        )
        .run()
    }
}

struct Program<E> {
    input_dir: PathBuf,
    conform_dir: PathBuf,
    brain_dir: PathBuf,
    conform: ConformOptions,
    extract: Option<(BrainExtractOptions, E)>,
    workers: usize,
}

impl<E: BrainExtractor + 'static> Program<E> {
    #[inline]
    fn new(
        input_dir: PathBuf,
        conform_dir: PathBuf,
        brain_dir: PathBuf,
        conform: ConformOptions,
        extract: Option<(BrainExtractOptions, E)>,
        workers: usize,
    ) -> Self {
        Self {
            input_dir,
            conform_dir,
            brain_dir,
            conform,
            extract,
            workers,
        }
    }

    fn run(self) -> anyhow::Result<()> {
        let mut timer = AccTimer::new();
        log::info!("=== Step 1: Conforming images -> `{}` ===", self.conform_dir.display());
        conform_dir(self.conform, &self.input_dir, &self.conform_dir, self.workers)?;

        match self.extract {
            Some((opts, extractor)) => {
                log::info!("=== Step 2: Brain extraction -> `{}` ===", self.brain_dir.display());
                extract_dir(opts, extractor, &self.conform_dir, &self.brain_dir, self.workers)?;
            }
            None => log::info!("=== Skipping brain extraction as requested ==="),
        }
        timer.elapsed();
        log::info!("Preprocessing completed in {:.2} seconds.", timer.get_total_secs());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subcmd_impls::args::{Cli, Commands};
    use crate::subcmd_impls::test_utils::{write_cube, FakeExtractor};
    use clap::Parser;
    use label::prelude::NiiVolume;
    use std::path::Path;

    fn parse(extra: &[&str]) -> Preprocess {
        let args = ["gouhfi", "preprocess", "-i", "raw"].iter().chain(extra);
        let Commands::Preprocess(p) = Cli::try_parse_from(args).unwrap().command else {
            panic!("expected preprocess");
        };
        p
    }

    #[test]
    fn test_morphology_skipped_by_default() {
        let p = parse(&[]);
        assert!(p.extract.options(!p.with_morpho).skip_morpho);
        assert!(!p.no_brain_extraction);
        let p = parse(&["--with-morpho", "--dilation-voxels", "1"]);
        assert!(!p.extract.options(!p.with_morpho).skip_morpho);
    }

    #[test]
    fn test_conform_and_extract_options_together() {
        let p = parse(&["--orientation", "RAS", "--pmax", "99", "--rename", "--no_brain_extraction"]);
        let c = p.conform.options().unwrap();
        assert_eq!(c.orientation.to_string(), "RAS");
        assert_eq!(c.pmax, 99.0);
        assert!(p.extract.options(true).rename);
        assert!(p.no_brain_extraction);
    }

    #[test]
    fn test_default_output_dirs() {
        let root = tempfile::tempdir().unwrap();
        let raw = root.path().join("raw");
        std::fs::create_dir(&raw).unwrap();
        let cfm = sibling_dir(&raw, "_cfm").unwrap();
        let pre = sibling_dir(&raw, "_preproc").unwrap();
        assert_eq!(cfm.file_name().unwrap(), "raw_cfm");
        assert_eq!(pre.file_name().unwrap(), "raw_preproc");
        assert_eq!(cfm.parent(), pre.parent());
    }

    fn program(root: &Path, extract: Option<(BrainExtractOptions, FakeExtractor)>) -> Program<FakeExtractor> {
        Program::new(
            root.join("raw"),
            root.join("raw_cfm"),
            root.join("raw_preproc"),
            parse(&[]).conform.options().unwrap(),
            extract,
            1,
        )
    }

    #[test]
    fn test_pipeline_writes_both_steps() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("raw")).unwrap();
        write_cube(&root.path().join("raw").join("sub-01.nii.gz"), 24);

        let p = parse(&[]);
        let opts = p.extract.options(!p.with_morpho);
        program(root.path(), Some((opts, FakeExtractor))).run().unwrap();

        let conformed = NiiVolume::read(root.path().join("raw_cfm").join("sub-01.nii.gz")).unwrap();
        assert_eq!(conformed.header.datatype, 2);
        assert_eq!(conformed.data.iter().copied().fold(0.0, f32::max), 255.0);
        assert!(root.path().join("raw_preproc").join("sub-01.nii.gz").is_file());
        assert!(!root.path().join("raw_preproc").join("mask_sub-01.nii.gz").exists());
    }

    #[test]
    fn test_empty_input_and_no_extraction() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("raw")).unwrap();
        let opts = BrainExtractOptions::default();
        program(root.path(), Some((opts, FakeExtractor))).run().unwrap();
        assert!(root.path().join("raw_cfm").is_dir());
        assert!(root.path().join("raw_preproc").is_dir());

        write_cube(&root.path().join("raw").join("a.nii"), 12);
        std::fs::remove_dir(root.path().join("raw_preproc")).unwrap();
        program(root.path(), None).run().unwrap();
        assert!(root.path().join("raw_cfm").join("a.nii").is_file());
        assert!(!root.path().join("raw_preproc").exists());
    }
}
