//! 体素坐标系朝向：由仿射矩阵推断轴向编码，并将体数据重排为目标朝向。

use super::error::{PrepError, Result};
use ndarray::{Array3, ArrayView3, Axis};
use nifti::NiftiHeader;
use std::fmt;
use std::str::FromStr;

/// 4x4体素到世界坐标（RAS+，mm）的仿射矩阵，行优先。
pub type Affine = [[f64; 4]; 4];

/// 一个体素轴的朝向：对应的世界坐标轴以及沿该体素轴递增时是否指向正方向（R/A/S）。
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AxisCode {
    pub world: usize,
    pub positive: bool,
}

impl AxisCode {
    fn from_letter(c: char) -> Option<Self> {
        let (world, positive) = match c.to_ascii_uppercase() {
            'R' => (0, true),
            'L' => (0, false),
            'A' => (1, true),
            'P' => (1, false),
            'S' => (2, true),
            'I' => (2, false),
            _ => return None,
        };
        Some(Self { world, positive })
    }

    fn letter(self) -> char {
        match (self.world, self.positive) {
            (0, true) => 'R',
            (0, false) => 'L',
            (1, true) => 'A',
            (1, false) => 'P',
            (2, true) => 'S',
            _ => 'I',
        }
    }
}

/// 三个体素轴的朝向编码，例如`LIA`、`RAS`。
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Orientation(pub [AxisCode; 3]);

impl FromStr for Orientation {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        let err = || PrepError::Orientation(s.to_owned());
        let codes: Vec<AxisCode> = s
            .chars()
            .map(AxisCode::from_letter)
            .collect::<Option<_>>()
            .ok_or_else(err)?;
        let [a, b, c]: [AxisCode; 3] = codes.try_into().map_err(|_| err())?;
        if a.world == b.world || a.world == c.world || b.world == c.world {
            return Err(err());
        }
        Ok(Orientation([a, b, c]))
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for code in self.0 {
            write!(f, "{}", code.letter())?;
        }
        Ok(())
    }
}

impl Orientation {
    /// 由仿射矩阵推断朝向：按方向余弦绝对值从大到小，贪心地将体素轴分配给世界坐标轴。
    pub fn from_affine(affine: &Affine) -> Self {
        let mut assigned: [Option<AxisCode>; 3] = [None; 3];
        let mut used_world = [false; 3];
        for _ in 0..3 {
            let mut best: Option<(usize, usize, f64)> = None;
            for (voxel, slot) in assigned.iter().enumerate() {
                if slot.is_some() {
                    continue;
                }
                for (world, used) in used_world.iter().enumerate() {
                    if *used {
                        continue;
                    }
                    let m = affine[world][voxel].abs();
                    if best.map_or(true, |(_, _, b)| m > b) {
                        best = Some((voxel, world, m));
                    }
                }
            }
            if let Some((voxel, world, _)) = best {
                used_world[world] = true;
                assigned[voxel] = Some(AxisCode {
                    world,
                    positive: affine[world][voxel] >= 0.0,
                });
            }
        }
        let [a, b, c] = assigned.map(|code| code.unwrap_or(AxisCode { world: 0, positive: true }));
        Orientation([a, b, c])
    }
}

/// 从头部获得仿射矩阵：优先sform，其次qform，否则使用pixdim对角阵。
pub fn header_affine(header: &NiftiHeader) -> Affine {
    if header.sform_code > 0 {
        let row = |r: [f32; 4]| [r[0] as f64, r[1] as f64, r[2] as f64, r[3] as f64];
        return [
            row(header.srow_x),
            row(header.srow_y),
            row(header.srow_z),
            [0.0, 0.0, 0.0, 1.0],
        ];
    }
    let [dx, dy, dz] = [1, 2, 3].map(|i| {
        let d = header.pixdim[i] as f64;
        if d == 0.0 {
            1.0
        } else {
            d.abs()
        }
    });
    if header.qform_code > 0 {
        let (b, c, d) = (
            header.quatern_b as f64,
            header.quatern_c as f64,
            header.quatern_d as f64,
        );
        let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
        let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let r = [
            [a * a + b * b - c * c - d * d, 2.0 * (b * c - a * d), 2.0 * (b * d + a * c)],
            [2.0 * (b * c + a * d), a * a + c * c - b * b - d * d, 2.0 * (c * d - a * b)],
            [2.0 * (b * d - a * c), 2.0 * (c * d + a * b), a * a + d * d - c * c - b * b],
        ];
        let scale = [dx, dy, dz * qfac];
        let offset = [
            header.quatern_x as f64,
            header.quatern_y as f64,
            header.quatern_z as f64,
        ];
        let mut affine = [[0.0; 4]; 4];
        for row in 0..3 {
            for col in 0..3 {
                affine[row][col] = r[row][col] * scale[col];
            }
            affine[row][3] = offset[row];
        }
        affine[3][3] = 1.0;
        return affine;
    }
    [
        [dx, 0.0, 0.0, 0.0],
        [0.0, dy, 0.0, 0.0],
        [0.0, 0.0, dz, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// 从`from`到`to`的轴重排：新轴`t`取自旧轴`perm[t]`，`flip[t]`表示是否需要翻转。
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Reorientation {
    pub perm: [usize; 3],
    pub flip: [bool; 3],
}

impl Reorientation {
    pub fn between(from: Orientation, to: Orientation) -> Self {
        let mut perm = [0; 3];
        let mut flip = [false; 3];
        for (t, target) in to.0.iter().enumerate() {
            let s = from
                .0
                .iter()
                .position(|c| c.world == target.world)
                .unwrap_or(t);
            perm[t] = s;
            flip[t] = from.0[s].positive != target.positive;
        }
        Self { perm, flip }
    }

    /// 重排体数据。
    pub fn apply<T: Clone>(&self, data: ArrayView3<T>) -> Array3<T> {
        let mut view = data.permuted_axes(self.perm);
        for (axis, &f) in self.flip.iter().enumerate() {
            if f {
                view.invert_axis(Axis(axis));
            }
        }
        view.as_standard_layout().into_owned()
    }

    /// 重排后的仿射矩阵，使每个体素的世界坐标保持不变。`shape`为重排前的形状。
    pub fn apply_affine(&self, affine: &Affine, shape: (usize, usize, usize)) -> Affine {
        let old_shape = [shape.0, shape.1, shape.2];
        let mut out = *affine;
        for t in 0..3 {
            let s = self.perm[t];
            let sign = if self.flip[t] { -1.0 } else { 1.0 };
            for row in 0..3 {
                out[row][t] = affine[row][s] * sign;
            }
            if self.flip[t] {
                let extent = old_shape[s].saturating_sub(1) as f64;
                for row in 0..3 {
                    out[row][3] += affine[row][s] * extent;
                }
            }
        }
        out
    }

    /// 重排头部：更新维度、体素尺寸与sform，并清除qform。
    pub fn apply_header(&self, header: &NiftiHeader, shape: (usize, usize, usize)) -> NiftiHeader {
        let affine = self.apply_affine(&header_affine(header), shape);
        let mut out = header.clone();
        let old_shape = [shape.0, shape.1, shape.2];
        for t in 0..3 {
            out.dim[t + 1] = old_shape[self.perm[t]] as _;
            out.pixdim[t + 1] = header.pixdim[self.perm[t] + 1];
        }
        let row = |r: [f64; 4]| [r[0] as f32, r[1] as f32, r[2] as f32, r[3] as f32];
        out.srow_x = row(affine[0]);
        out.srow_y = row(affine[1]);
        out.srow_z = row(affine[2]);
        if out.sform_code <= 0 {
            out.sform_code = 1;
        }
        out.qform_code = 0;
        out
    }
}
