//! 子命令测试共用的小工具。

use label::prelude::{NiiVolume, Result};
use label::prep::extract::BrainExtractor;
use label::prep::nii::write_with_header;
use ndarray::{s, Array3};
use nifti::NiftiHeader;
use std::path::Path;

/// RAS朝向、体素尺寸为`zooms`的头部。
pub fn ras_header(shape: (usize, usize, usize), zooms: [f32; 3]) -> NiftiHeader {
    let mut header = NiftiHeader::default();
    header.dim = [3, shape.0 as _, shape.1 as _, shape.2 as _, 1, 1, 1, 1];
    header.pixdim = [1.0, zooms[0], zooms[1], zooms[2], 1.0, 1.0, 1.0, 1.0];
    header.sform_code = 1;
    header.srow_x = [zooms[0], 0.0, 0.0, 0.0];
    header.srow_y = [0.0, zooms[1], 0.0, 0.0];
    header.srow_z = [0.0, 0.0, zooms[2], 0.0];
    header
}

pub fn write_volume(path: &Path, data: &Array3<f32>, zooms: [f32; 3]) {
    write_with_header(&ras_header(data.dim(), zooms), path, data).unwrap();
}

/// 边长`n`的体数据，中央有一个强度为100的立方体。
pub fn write_cube(path: &Path, n: usize) {
    let mut data = Array3::<f32>::zeros((n, n, n));
    let (lo, hi) = (n / 4, n - n / 4);
    data.slice_mut(s![lo..hi, lo..hi, lo..hi]).fill(100.0);
    write_volume(path, &data, [1.0; 3]);
}

/// 把输入中的亮体素当作脑的提取器，不启动任何外部进程。
pub struct FakeExtractor;

impl BrainExtractor for FakeExtractor {
    fn probability_map(&self, input: &Path, _modality: &str, prob_out: &Path) -> Result<()> {
        let img = NiiVolume::read(input)?;
        img.write_with(prob_out, &img.data.mapv(|v| if v > 0.5 { 0.9_f32 } else { 0.0 }))
    }
}
