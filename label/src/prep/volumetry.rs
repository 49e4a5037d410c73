//! 逐标签体积统计。

use super::error::{PrepError, Result};
use super::improc::consts::CSF_LABEL;
use super::improc::LabelVolume;
use super::lut::LabelLut;
use serde::Serialize;
use std::path::Path;

/// 总颅内体积（TIV）行的标签编号。
pub const TIV_ID: i32 = -1;

/// 脑体积（BV）行的标签编号。
pub const BV_ID: i32 = -2;

/// CSV输出中的一行。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeRow {
    #[serde(rename = "File")]
    pub file: String,
    #[serde(rename = "Label_ID")]
    pub label_id: i32,
    #[serde(rename = "Label_Name")]
    pub label_name: String,
    #[serde(rename = "Absolute_Volume_mm3")]
    pub absolute_volume_mm3: f64,
    #[serde(rename = "Normalized_Volume_TIV")]
    pub normalized_volume_tiv: f64,
    #[serde(rename = "Normalized_Volume_BV")]
    pub normalized_volume_bv: f64,
}

#[inline]
fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// 计算一个标签体数据的逐标签体积，最后附加TIV与BV两行。
///
/// TIV为所有非零体素，BV为TIV减去脑脊液（标签16）。
pub fn compute_volumes(
    file: &str,
    volume: &LabelVolume,
    lut: &LabelLut,
    voxel_volume: f64,
) -> Vec<VolumeRow> {
    let mut counts = std::collections::BTreeMap::<i32, usize>::new();
    for &v in volume.data.iter().filter(|&&v| v != 0) {
        *counts.entry(v).or_default() += 1;
    }
    let tiv_vox = volume.count_nonzero();
    let csf_vox = volume.count(CSF_LABEL);
    let bv_vox = tiv_vox - csf_vox;

    let tiv = tiv_vox as f64 * voxel_volume;
    let bv = bv_vox as f64 * voxel_volume;

    let mut rows: Vec<VolumeRow> = counts
        .into_iter()
        .map(|(label, n)| {
            let abs_vol = n as f64 * voxel_volume;
            VolumeRow {
                file: file.to_owned(),
                label_id: label,
                label_name: lut.name_or_default(label),
                absolute_volume_mm3: abs_vol,
                normalized_volume_tiv: ratio(abs_vol, tiv),
                normalized_volume_bv: ratio(abs_vol, bv),
            }
        })
        .collect();

    rows.push(VolumeRow {
        file: file.to_owned(),
        label_id: TIV_ID,
        label_name: "TIV".to_owned(),
        absolute_volume_mm3: tiv,
        normalized_volume_tiv: 1.0,
        normalized_volume_bv: ratio(tiv, bv),
    });
    rows.push(VolumeRow {
        file: file.to_owned(),
        label_id: BV_ID,
        label_name: "BrainVolume(BV)".to_owned(),
        absolute_volume_mm3: bv,
        normalized_volume_tiv: ratio(bv, tiv),
        normalized_volume_bv: 1.0,
    });
    rows
}

/// 将所有行写入CSV文件（带表头）。
pub fn write_csv<P: AsRef<Path>>(path: P, rows: &[VolumeRow]) -> Result<()> {
    let path = path.as_ref();
    let csv_err = |source| PrepError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|e| PrepError::io(path, e))
}
