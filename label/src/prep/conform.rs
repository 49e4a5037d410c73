//! 体数据规范化：统一朝向，并将强度按百分位数线性映射到固定区间。

use super::error::{PrepError, Result};
use super::nii::{file_name_of, write_with_header, NiiVolume};
use super::orient::{header_affine, Orientation, Reorientation};
use ndarray::{Array3, ArrayView3};
use std::path::{Path, PathBuf};

/// 规范化选项。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConformOptions {
    /// 目标朝向。
    pub orientation: Orientation,
    /// 输出强度下界。
    pub min: f32,
    /// 输出强度上界。
    pub max: f32,
    /// 映射到`min`的百分位数。
    pub pmin: f64,
    /// 映射到`max`的百分位数。
    pub pmax: f64,
}

impl ConformOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..100.0).contains(&self.pmin) || !(self.pmin < self.pmax && self.pmax <= 100.0) {
            return Err(PrepError::InvalidOption(format!(
                "percentiles must satisfy 0 <= pmin < pmax <= 100, got [{}, {}]",
                self.pmin, self.pmax
            )));
        }
        if !(self.min < self.max) {
            return Err(PrepError::InvalidOption(format!(
                "output range must satisfy min < max, got [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }

    /// 输出范围能否用无符号字节表示。
    #[inline]
    pub fn fits_u8(&self) -> bool {
        self.min >= 0.0 && self.max <= 255.0
    }

    /// 规范化一个体数据，返回新头部与强度已映射的数据。
    pub fn conform(&self, nii: &NiiVolume) -> (nifti::NiftiHeader, Array3<f32>) {
        let current = Orientation::from_affine(&header_affine(&nii.header));
        let reorient = Reorientation::between(current, self.orientation);
        let header = reorient.apply_header(&nii.header, nii.shape());
        let data = reorient.apply(nii.data.view());
        let (lo, hi) = percentile_range(data.view(), self.pmin, self.pmax);
        (header, rescale(data.view(), lo, hi, self.min, self.max))
    }

    /// 读取`input`，规范化后以相同文件名写入`output_dir`，返回输出路径。
    pub fn process_file(&self, input: &Path, output_dir: &Path) -> Result<PathBuf> {
        let nii = NiiVolume::read(input)?;
        let (header, data) = self.conform(&nii);
        let output = output_dir.join(file_name_of(input)?);
        if self.fits_u8() {
            write_with_header(&header, &output, &data.mapv(|v| v.round() as u8))?;
        } else {
            write_with_header(&header, &output, &data)?;
        }
        Ok(output)
    }
}

/// 线性插值的百分位数，`p`在`[0, 100]`之间。空输入返回0。
pub fn percentile(sorted: &[f32], p: f64) -> f32 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            let frac = rank - lo as f64;
            (sorted[lo] as f64 + (sorted[hi] as f64 - sorted[lo] as f64) * frac) as f32
        }
    }
}

/// 所有体素的(`pmin`, `pmax`)百分位数。
pub fn percentile_range(data: ArrayView3<f32>, pmin: f64, pmax: f64) -> (f32, f32) {
    let mut values: Vec<f32> = data.iter().copied().filter(|v| !v.is_nan()).collect();
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    (percentile(&values, pmin), percentile(&values, pmax))
}

/// 将`[lo, hi]`线性映射到`[min, max]`并截断；若`hi <= lo`则全部置为`min`。
pub fn rescale(data: ArrayView3<f32>, lo: f32, hi: f32, min: f32, max: f32) -> Array3<f32> {
    if hi <= lo {
        return Array3::from_elem(data.dim(), min);
    }
    let scale = (max - min) / (hi - lo);
    data.map(|&v| ((v - lo) * scale + min).clamp(min, max))
}
