//! 标签保留、截断、合并、二值化与重新编号。

use super::error::{PrepError, Result};
use super::improc::consts::{LEFT_CORTEX, LEFT_CORTEX_PARCELS, RIGHT_CORTEX, RIGHT_CORTEX_PARCELS};
use super::improc::LabelVolume;
use super::nii::{file_name_of, NiiVolume};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// 哪些标签置为1。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetToOne {
    /// 所有非零标签。
    All,
    /// 给定的标签。
    Labels(Vec<i32>),
}

impl FromStr for SetToOne {
    type Err = String;

    /// `all`（不区分大小写）或以空白/逗号分隔的整数列表。
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let values: Vec<&str> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|v| !v.is_empty())
            .collect();
        Self::from_values(&values)
    }
}

impl SetToOne {
    /// 由命令行给出的若干值构造：只有唯一的值为`all`时才表示全部。
    pub fn from_values<S: AsRef<str>>(values: &[S]) -> std::result::Result<Self, String> {
        match values {
            [] => Err("expected `all` or at least one label".to_owned()),
            [one] if one.as_ref().eq_ignore_ascii_case("all") => Ok(SetToOne::All),
            _ => values
                .iter()
                .map(|v| {
                    v.as_ref()
                        .parse::<i32>()
                        .map_err(|_| format!("`{}` is not a label", v.as_ref()))
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(SetToOne::Labels),
        }
    }
}

/// 标签变换选项。各步骤按字段声明顺序依次执行。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelabelOptions {
    /// 要保留的标签；其余置0。
    pub keep_labels: Option<BTreeSet<i32>>,
    /// 小于该值的标签置0。
    pub min_label: Option<i32>,
    /// 大于该值的标签置0。
    pub max_label: Option<i32>,
    /// 将左/右皮层分区（1000+/2000+）合并为3/42。
    pub combine_ctx: bool,
    /// 置为1的标签。
    pub set_to_one: Option<SetToOne>,
    /// 将剩余非零标签按升序重新编号为`1..=N`。
    pub reindex: bool,
}

impl RelabelOptions {
    /// 对标签体数据就地执行变换。
    pub fn apply(&self, volume: &mut LabelVolume) {
        if let Some(keep) = &self.keep_labels {
            volume.fill_where(|v| !keep.contains(&v), 0);
        }
        if let Some(min) = self.min_label {
            volume.fill_where(|v| v < min, 0);
        }
        if let Some(max) = self.max_label {
            volume.fill_where(|v| v > max, 0);
        }
        if self.combine_ctx {
            volume.fill_where(|v| LEFT_CORTEX_PARCELS.contains(&v), LEFT_CORTEX);
            volume.fill_where(|v| RIGHT_CORTEX_PARCELS.contains(&v), RIGHT_CORTEX);
        }
        match &self.set_to_one {
            Some(SetToOne::All) => volume.fill_where(|v| v != 0, 1),
            Some(SetToOne::Labels(labels)) => {
                for &label in labels {
                    volume.fill(label, 1);
                }
            }
            None => {}
        }
        if self.reindex {
            reindex(volume);
        }
    }

    /// 读取`input`，变换后以相同文件名写入`output_dir`，返回输出路径。
    pub fn process_file(&self, input: &Path, output_dir: &Path) -> Result<PathBuf> {
        let nii = NiiVolume::read(input)?;
        let mut volume = LabelVolume::from_rounded(nii.data.view());
        self.apply(&mut volume);
        let (labels, overflow) = volume.to_u8_wrapping();
        if overflow != 0 {
            log::warn!(
                "{}: {overflow} voxel(s) carry labels outside 0..=255 and were truncated to u8",
                input.display()
            );
        }
        let output = output_dir.join(file_name_of(input)?);
        nii.write_with(&output, &labels)?;
        Ok(output)
    }

    /// 检查选项组合是否有意义。
    pub fn validate(&self) -> Result<()> {
        if let Some(keep) = &self.keep_labels {
            if keep.is_empty() {
                return Err(PrepError::InvalidOption("keep list is empty".to_owned()));
            }
        }
        Ok(())
    }
}

/// 将非零标签按升序映射为`1..=N`。
pub fn reindex(volume: &mut LabelVolume) {
    let mapping: HashMap<i32, i32> = volume
        .unique_nonzero()
        .into_iter()
        .zip(1..)
        .collect();
    volume.data.mapv_inplace(|v| if v == 0 { 0 } else { mapping[&v] });
}
