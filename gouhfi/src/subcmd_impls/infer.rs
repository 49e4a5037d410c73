use super::reorder_labels::reorder_dir;
use super::utils::run_external;
use anyhow::{anyhow, bail};
use clap::Args;
use label::prelude::AccTimer;
use label::prep::nii::ensure_dir;
use std::env;
use std::path::PathBuf;
use std::process::Command;

const GOUHFI_HOME: &str = "GOUHFI_HOME";
const DATASET_ID: &str = "014";
const TRAINER: &str = "nnUNetTrainer_NoDA_500epochs_AdamW";
const CONFIGURATION: &str = "3d_fullres";
const PLANS: &str = "nnUNetResEncL";
const CHECKPOINT: &str = "checkpoint_best.pth";

#[derive(Args, Debug)]
pub struct Infer {
    /// 待分割图像所在目录。
    #[arg(long = "input-dir", short, alias = "input_dir")]
    input_dir: PathBuf,
    /// 输出根目录（默认在输入目录下创建`outputs*`）。
    #[arg(long = "output-dir", short, alias = "output_dir")]
    output_dir: Option<PathBuf>,
    /// 预处理、保存与后处理的进程数。
    #[arg(long = "np", default_value_t = 4)]
    np: usize,
    /// 参与集成的折，以空白分隔。
    #[arg(long, default_value = "0 1 2 3 4")]
    folds: String,
    /// 后处理之后把标签从GOUHFI编号重排为FreeSurfer编号。
    #[arg(long = "reorder-labels", alias = "reorder_labels")]
    reorder_labels: bool,
    /// 使用CPU推理。
    #[arg(long)]
    cpu: bool,
}

impl Infer {
    pub fn run(&mut self) -> anyhow::Result<()> {
        let home = env::var_os(GOUHFI_HOME).ok_or_else(|| {
            anyhow!("{GOUHFI_HOME} is not set, point it at the GOUHFI installation directory")
        })?;
        Program::new(self, PathBuf::from(home))?.run()
    }
}

struct Program {
    home: PathBuf,
    input_dir: PathBuf,
    out_dir: PathBuf,
    out_pp_dir: PathBuf,
    out_pp_reo_dir: PathBuf,
    np: usize,
    folds: Vec<String>,
    reorder_labels: bool,
    cpu: bool,
}

impl Program {
    fn new(args: &Infer, home: PathBuf) -> anyhow::Result<Self> {
        let folds: Vec<String> = args.folds.split_whitespace().map(str::to_owned).collect();
        if folds.is_empty() {
            bail!("at least one fold is required");
        }
        let (out_dir, root) = match &args.output_dir {
            Some(dir) => (dir.clone(), dir.clone()),
            None => (args.input_dir.join("outputs"), args.input_dir.clone()),
        };
        Ok(Self {
            home,
            input_dir: args.input_dir.clone(),
            out_dir,
            out_pp_dir: root.join("outputs_postpro"),
            out_pp_reo_dir: root.join("outputs_postpro_reo"),
            np: args.np,
            folds,
            reorder_labels: args.reorder_labels,
            cpu: args.cpu,
        })
    }

    /// 训练好的模型目录。
    fn model_dir(&self) -> PathBuf {
        self.home
            .join("trained_model")
            .join(format!("Dataset{DATASET_ID}_gouhfi"))
            .join(format!("{TRAINER}__{PLANS}__{CONFIGURATION}"))
    }

    fn lut_path(&self, name: &str) -> PathBuf {
        self.home.join("misc").join(name)
    }

    /// nnU-Net通过环境变量定位模型；只对子进程设置。
    fn nnunet_command(&self, program: &str) -> Command {
        let mut cmd = Command::new(program);
        cmd.env("nnUNet_raw", self.home.join("nnUNet_raw"))
            .env("nnUNet_preprocessed", self.home.join("nnUNet_preprocessed"))
            .env("nnUNet_results", self.home.join("trained_model"));
        cmd
    }

    fn predict_command(&self) -> Command {
        let np = self.np.to_string();
        let mut cmd = self.nnunet_command("nnUNetv2_predict");
        cmd.arg("-d")
            .arg(DATASET_ID)
            .arg("-i")
            .arg(&self.input_dir)
            .arg("-o")
            .arg(&self.out_dir)
            .args(["-tr", TRAINER, "-c", CONFIGURATION, "-p", PLANS, "-f"])
            .args(&self.folds)
            .args(["-chk", CHECKPOINT, "-npp", np.as_str(), "-nps", np.as_str()]);
        if self.cpu {
            cmd.args(["-device", "cpu"]);
        }
        cmd
    }

    fn postprocess_command(&self) -> Command {
        let model_dir = self.model_dir();
        let mut cmd = self.nnunet_command("nnUNetv2_apply_postprocessing");
        cmd.arg("-i")
            .arg(&self.out_dir)
            .arg("-o")
            .arg(&self.out_pp_dir)
            .arg("-pp_pkl_file")
            .arg(model_dir.join("crossval_results_folds_0_1_2_3_4").join("postprocessing.pkl"))
            .arg("-np")
            .arg(self.np.to_string())
            .arg("-plans_json")
            .arg(model_dir.join("plans.json"));
        cmd
    }

    fn run(&self) -> anyhow::Result<()> {
        ensure_dir(&self.out_dir)?;
        ensure_dir(&self.out_pp_dir)?;
        if self.reorder_labels {
            ensure_dir(&self.out_pp_reo_dir)?;
        }
        if self.cpu {
            log::warn!("running inference on the CPU, expect a considerable increase in inference time");
        }

        run_external(&mut self.predict_command(), "Inference")?;
        run_external(&mut self.postprocess_command(), "Post-processing")?;

        if self.reorder_labels {
            log::info!("Reordering label maps to the FreeSurfer lookup table...");
            let mut timer = AccTimer::new();
            timer.start();
            reorder_dir(
                &self.out_pp_dir,
                &self.out_pp_reo_dir,
                &self.lut_path("gouhfi_v2p0_brain_labels_lut.txt"),
                &self.lut_path("freesurfer_brain_labels_lut.txt"),
                self.np,
            )?;
            timer.elapsed();
            log::info!("Label reordering completed in {:.2} seconds.", timer.get_total_secs());
        }
        Ok(())
    }

    #[cfg(test)]
    fn output_dirs(&self) -> [&std::path::Path; 3] {
        [
            self.out_dir.as_path(),
            self.out_pp_dir.as_path(),
            self.out_pp_reo_dir.as_path(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subcmd_impls::args::{Cli, Commands};
    use clap::Parser;
    use std::ffi::OsStr;
    use std::path::Path;

    fn parse(extra: &[&str]) -> Infer {
        let args = ["gouhfi", "infer", "-i", "/data/in"].iter().chain(extra);
        let Commands::Infer(i) = Cli::try_parse_from(args).unwrap().command else {
            panic!("expected infer");
        };
        i
    }

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_output_dirs() {
        let p = Program::new(&parse(&[]), "/opt/gouhfi".into()).unwrap();
        assert_eq!(
            p.output_dirs(),
            [
                Path::new("/data/in/outputs"),
                Path::new("/data/in/outputs_postpro"),
                Path::new("/data/in/outputs_postpro_reo"),
            ]
        );
        let p = Program::new(&parse(&["-o", "/data/out"]), "/opt/gouhfi".into()).unwrap();
        assert_eq!(
            p.output_dirs(),
            [
                Path::new("/data/out"),
                Path::new("/data/out/outputs_postpro"),
                Path::new("/data/out/outputs_postpro_reo"),
            ]
        );
    }

    #[test]
    fn test_predict_command() {
        let p = Program::new(&parse(&["--np", "2", "--folds", "0 3", "--cpu"]), "/opt/gouhfi".into()).unwrap();
        let cmd = p.predict_command();
        assert_eq!(cmd.get_program(), "nnUNetv2_predict");
        assert_eq!(
            args_of(&cmd).join(" "),
            "-d 014 -i /data/in -o /data/in/outputs -tr nnUNetTrainer_NoDA_500epochs_AdamW \
             -c 3d_fullres -p nnUNetResEncL -f 0 3 -chk checkpoint_best.pth -npp 2 -nps 2 -device cpu"
        );
        let envs: Vec<_> = cmd.get_envs().collect();
        assert!(envs.contains(&(
            OsStr::new("nnUNet_results"),
            Some(Path::new("/opt/gouhfi/trained_model").as_os_str())
        )));
        assert_eq!(envs.len(), 3);
    }

    #[test]
    fn test_postprocess_command() {
        let p = Program::new(&parse(&[]), "/opt/gouhfi".into()).unwrap();
        let cmd = p.postprocess_command();
        assert_eq!(cmd.get_program(), "nnUNetv2_apply_postprocessing");
        let model = "/opt/gouhfi/trained_model/Dataset014_gouhfi/\
                     nnUNetTrainer_NoDA_500epochs_AdamW__nnUNetResEncL__3d_fullres";
        assert_eq!(
            args_of(&cmd),
            [
                "-i".to_owned(),
                "/data/in/outputs".to_owned(),
                "-o".to_owned(),
                "/data/in/outputs_postpro".to_owned(),
                "-pp_pkl_file".to_owned(),
                format!("{model}/crossval_results_folds_0_1_2_3_4/postprocessing.pkl"),
                "-np".to_owned(),
                "4".to_owned(),
                "-plans_json".to_owned(),
                format!("{model}/plans.json"),
            ]
        );
    }

    #[test]
    fn test_defaults_and_empty_folds() {
        let i = parse(&["--reorder_labels"]);
        assert_eq!(i.np, 4);
        assert_eq!(i.folds, "0 1 2 3 4");
        assert!(i.reorder_labels);
        assert!(!i.cpu);
        assert!(Program::new(&parse(&["--folds", " "]), "/opt/gouhfi".into()).is_err());
    }
}
