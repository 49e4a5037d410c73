//! 核心体数据处理算法：连通域、最大连通域保留、球形结构元素的形态学运算。

use super::edt::squared_edt;
use super::iter::PosIter;
use super::pos::Pos;
use ndarray::{Array3, ArrayView3, Zip};
use std::collections::VecDeque;

/// 标签与阈值常量。
pub mod consts {
    /// FreeSurfer查找表中的左侧皮层标签。
    pub const LEFT_CORTEX: i32 = 3;

    /// FreeSurfer查找表中的右侧皮层标签。
    pub const RIGHT_CORTEX: i32 = 42;

    /// 左侧皮层分区标签区间`[1000, 2000)`。
    pub const LEFT_CORTEX_PARCELS: std::ops::Range<i32> = 1000..2000;

    /// 右侧皮层分区标签区间`[2000, 3000)`。
    pub const RIGHT_CORTEX_PARCELS: std::ops::Range<i32> = 2000..3000;

    /// 脑脊液标签，不计入脑体积。
    pub const CSF_LABEL: i32 = 16;

    /// 脑提取概率图的二值化阈值（严格大于）。
    pub const MASK_THRESHOLD: f32 = 0.01;

    /// 闭运算所用球形结构元素的半径（体素）。
    pub const CLOSING_RADIUS: usize = 5;
}

type Area = Vec<Pos>;
type Areas = Vec<Area>;

/// 一个离散标签体数据，`data[[i, j, k]]`为体素(i, j, k)的标签。
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVolume {
    pub data: Array3<i32>,
}

impl LabelVolume {
    #[inline]
    pub fn new(data: Array3<i32>) -> Self {
        Self { data }
    }

    /// 将浮点体数据取整为整数标签，恰在.5处时取偶数。
    pub fn from_rounded(values: ArrayView3<f32>) -> Self {
        Self::new(values.map(|&v| v.round_ties_even() as i32))
    }

    /// 计算目前值为`label`的体素个数。
    pub fn count(&self, label: i32) -> usize {
        self.data.iter().filter(|&&v| v == label).count()
    }

    /// 计算非零体素个数。
    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// 将所有值为`old`的体素替换为`new`，返回被修改的体素个数。
    pub fn fill(&mut self, old: i32, new: i32) -> usize {
        let mut cnt = 0;
        self.data.iter_mut().filter(|v| **v == old).for_each(|v| {
            cnt += 1;
            *v = new
        });
        cnt
    }

    /// 将满足`pred`的体素全部置为`label`。
    pub fn fill_where<F: Fn(i32) -> bool>(&mut self, pred: F, label: i32) {
        self.data.iter_mut().filter(|v| pred(**v)).for_each(|v| *v = label);
    }

    /// 升序排列的所有非零标签（去重）。
    pub fn unique_nonzero(&self) -> Vec<i32> {
        let mut labels: Vec<i32> = self.data.iter().copied().filter(|&v| v != 0).collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// 将标签转换为`u8`（按补码截断），并返回超出`0..=255`的体素个数。
    pub fn to_u8_wrapping(&self) -> (Array3<u8>, usize) {
        let overflow = self.data.iter().filter(|&&v| !(0..=255).contains(&v)).count();
        (self.data.map(|&v| v as u8), overflow)
    }
}

/// 按照6-相邻规则获取`mask`中的所有前景连通区域。
///
/// 两个体素p1和p2属于一个区域，当且仅当存在一条从p1到p2的6-相邻路径，且路径上的所有体素都是前景。
/// 区域按其第一个体素的字典序排列。
pub fn area_group(mask: ArrayView3<bool>) -> Areas {
    let shape = mask.dim();
    let mut visited = Array3::<bool>::from_elem(shape, false);
    let mut ans: Areas = Vec::with_capacity(1);
    let mut bfs_q: VecDeque<Pos> = VecDeque::with_capacity(64);

    for pos in PosIter::new(shape) {
        let idx = pos.to_index();
        if visited[idx] || !mask[idx] {
            continue;
        }
        visited[idx] = true;
        bfs_q.push_back(pos);
        let mut one_area: Area = Vec::with_capacity(1);
        while let Some(cur_pos) = bfs_q.pop_front() {
            one_area.push(cur_pos);
            for n in cur_pos.n6_within(shape) {
                let n_idx = n.to_index();
                if mask[n_idx] && !visited[n_idx] {
                    visited[n_idx] = true;
                    bfs_q.push_back(n);
                }
            }
        }
        ans.push(one_area);
    }
    ans
}

/// 只保留`mask`中第一个最大的6-连通前景区域。若`mask`无前景，则返回全背景。
pub fn largest_component(mask: ArrayView3<bool>) -> Array3<bool> {
    let mut out = Array3::<bool>::from_elem(mask.dim(), false);
    let areas = area_group(mask);
    // max_by_key返回最后一个最大值，逆序查找以保留第一个。
    if let Some(biggest) = areas.iter().rev().max_by_key(|a| a.len()) {
        for p in biggest {
            out[p.to_index()] = true;
        }
    }
    out
}

/// 半径为`radius`的球形结构元素的所有偏移量：`x² + y² + z² <= radius²`。
pub fn ball_offsets(radius: usize) -> Vec<(isize, isize, isize)> {
    let r = radius as isize;
    let r2 = r * r;
    let mut offsets = Vec::new();
    for x in -r..=r {
        for y in -r..=r {
            for z in -r..=r {
                if x * x + y * y + z * z <= r2 {
                    offsets.push((x, y, z));
                }
            }
        }
    }
    offsets
}

/// 使用半径为`radius`的球形结构元素进行二值膨胀。体数据外部视为背景。
pub fn binary_dilation(mask: ArrayView3<bool>, radius: usize) -> Array3<bool> {
    if radius == 0 {
        return mask.to_owned();
    }
    let r2 = (radius * radius) as f64;
    squared_edt(mask).map(|&d| d <= r2)
}

/// 使用半径为`radius`的球形结构元素进行二值腐蚀。体数据外部视为前景。
pub fn binary_erosion(mask: ArrayView3<bool>, radius: usize) -> Array3<bool> {
    if radius == 0 {
        return mask.to_owned();
    }
    let background = mask.map(|&m| !m);
    let r2 = (radius * radius) as f64;
    squared_edt(background.view()).map(|&d| d > r2)
}

/// 闭运算：先膨胀后腐蚀。
pub fn binary_closing(mask: ArrayView3<bool>, radius: usize) -> Array3<bool> {
    let dilated = binary_dilation(mask, radius);
    binary_erosion(dilated.view(), radius)
}

/// `image * mask`：掩膜外的体素置零。
pub fn apply_mask(image: ArrayView3<f32>, mask: ArrayView3<bool>) -> Array3<f32> {
    let mut out = image.to_owned();
    Zip::from(&mut out).and(&mask).for_each(|v, &m| {
        if !m {
            *v = 0.0;
        }
    });
    out
}

/// 阈值化概率图：严格大于`threshold`的体素为前景。
pub fn threshold_mask(prob: ArrayView3<f32>, threshold: f32) -> Array3<bool> {
    prob.map(|&p| p > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::s;

    fn naive_dilation(mask: &Array3<bool>, radius: usize) -> Array3<bool> {
        let (ni, nj, nk) = mask.dim();
        let offsets = ball_offsets(radius);
        Array3::from_shape_fn(mask.dim(), |(i, j, k)| {
            offsets.iter().any(|&(x, y, z)| {
                let (a, b, c) = (i as isize + x, j as isize + y, k as isize + z);
                a >= 0
                    && b >= 0
                    && c >= 0
                    && (a as usize) < ni
                    && (b as usize) < nj
                    && (c as usize) < nk
                    && mask[[a as usize, b as usize, c as usize]]
            })
        })
    }

    #[test]
    fn test_ball_offsets_count() {
        assert_eq!(ball_offsets(0).len(), 1);
        assert_eq!(ball_offsets(1).len(), 7);
        // skimage.morphology.ball(5).sum()
        assert_eq!(ball_offsets(5).len(), 515);
    }

    #[test]
    fn test_area_group_two_blobs() {
        let mut m = Array3::from_elem((6, 6, 6), false);
        m.slice_mut(s![0..2, 0..2, 0..2]).fill(true);
        m.slice_mut(s![4..6, 4..6, 3..6]).fill(true);
        // diagonal contact is not 6-connected
        m[[2, 2, 2]] = true;
        let areas = area_group(m.view());
        assert_eq!(areas.len(), 3);
        assert_eq!(areas[0].len(), 8);
        assert_eq!(areas[1].len(), 1);
        assert_eq!(areas[2].len(), 12);
    }

    #[test]
    fn test_largest_component() {
        let mut m = Array3::from_elem((6, 6, 6), false);
        m.slice_mut(s![0..2, 0..2, 0..2]).fill(true);
        m.slice_mut(s![4..6, 4..6, 3..6]).fill(true);
        let out = largest_component(m.view());
        assert_eq!(out.iter().filter(|&&v| v).count(), 12);
        assert!(out[[5, 5, 5]]);
        assert!(!out[[0, 0, 0]]);
    }

    #[test]
    fn test_largest_component_ties_keep_first() {
        let mut m = Array3::from_elem((5, 1, 1), false);
        m[[0, 0, 0]] = true;
        m[[4, 0, 0]] = true;
        let out = largest_component(m.view());
        assert!(out[[0, 0, 0]]);
        assert!(!out[[4, 0, 0]]);
    }

    #[test]
    fn test_largest_component_empty() {
        let m = Array3::from_elem((3, 3, 3), false);
        assert!(largest_component(m.view()).iter().all(|&v| !v));
    }

    #[test]
    fn test_dilation_matches_naive() {
        let m = Array3::from_shape_fn((9, 8, 7), |(i, j, k)| (i * 5 + j * 3 + k) % 17 == 0);
        for r in 1..=3 {
            assert_eq!(binary_dilation(m.view(), r), naive_dilation(&m, r));
        }
    }

    #[test]
    fn test_closing_fills_small_hole() {
        let mut m = Array3::from_elem((9, 9, 9), false);
        m.slice_mut(s![1..8, 1..8, 1..8]).fill(true);
        m[[4, 4, 4]] = false;
        let closed = binary_closing(m.view(), 1);
        assert!(closed[[4, 4, 4]]);
        assert!(!closed[[0, 0, 0]]);
    }

    #[test]
    fn test_erosion_border_is_foreground() {
        let m = Array3::from_elem((4, 4, 4), true);
        assert!(binary_erosion(m.view(), 2).iter().all(|&v| v));
    }

    #[test]
    fn test_apply_mask_and_threshold() {
        let prob = Array3::from_shape_vec((1, 1, 3), vec![0.0, 0.01, 0.5]).unwrap();
        let mask = threshold_mask(prob.view(), consts::MASK_THRESHOLD);
        assert_eq!(mask.as_slice().unwrap(), &[false, false, true]);
        let img = Array3::from_elem((1, 1, 3), 7.0_f32);
        let out = apply_mask(img.view(), mask.view());
        assert_eq!(out.as_slice().unwrap(), &[0.0, 0.0, 7.0]);
    }

    #[test]
    fn test_from_rounded_ties_to_even() {
        let v = Array3::from_shape_vec((1, 1, 6), vec![0.5_f32, 1.5, 2.5, 3.5, 2.4999, -1.5]).unwrap();
        let labels = LabelVolume::from_rounded(v.view());
        assert_eq!(labels.data.as_slice().unwrap(), &[0, 2, 2, 4, 2, -2]);
    }

    #[test]
    fn test_counts() {
        let v = LabelVolume::new(Array3::from_shape_vec((1, 1, 5), vec![0, 16, 16, 3, 0]).unwrap());
        assert_eq!(v.count(16), 2);
        assert_eq!(v.count_nonzero(), 3);
    }

    #[test]
    fn test_to_u8_wrapping() {
        let v = LabelVolume::new(Array3::from_shape_vec((1, 1, 3), vec![1, 256, 1001]).unwrap());
        let (out, overflow) = v.to_u8_wrapping();
        assert_eq!(out.as_slice().unwrap(), &[1, 0, 233]);
        assert_eq!(overflow, 2);
    }
}
