//! 平方欧氏距离变换（Felzenszwalb & Huttenlocher 下包络算法），按轴分离计算。

use ndarray::{Array3, ArrayView3, Axis};

/// 对每个体素，计算其到最近“源”体素（`sources`中为`true`）的平方欧氏距离。
///
/// 体数据外部不视为源。若不存在任何源体素，则所有距离为`f64::INFINITY`。
pub fn squared_edt(sources: ArrayView3<bool>) -> Array3<f64> {
    let mut dist = sources.map(|&s| if s { 0.0 } else { f64::INFINITY });
    let longest = dist.shape().iter().copied().max().unwrap_or(0);
    let mut f = vec![0.0; longest];
    let mut d = vec![0.0; longest];
    let mut v = vec![0_usize; longest];
    let mut z = vec![0.0; longest + 1];

    for axis in 0..3 {
        for mut lane in dist.lanes_mut(Axis(axis)) {
            let n = lane.len();
            for (dst, src) in f.iter_mut().zip(lane.iter()) {
                *dst = *src;
            }
            edt_1d(&f[..n], &mut d[..n], &mut v[..n], &mut z[..=n]);
            for (dst, src) in lane.iter_mut().zip(d.iter()) {
                *dst = *src;
            }
        }
    }
    dist
}

/// 一维平方距离变换：`d[q] = min_p ((q - p)^2 + f[p])`。
fn edt_1d(f: &[f64], d: &mut [f64], v: &mut [usize], z: &mut [f64]) {
    let n = f.len();
    let mut k: isize = -1;
    for q in 0..n {
        if f[q].is_infinite() {
            continue;
        }
        let fq = f[q] + (q * q) as f64;
        loop {
            if k < 0 {
                k = 0;
                v[0] = q;
                z[0] = f64::NEG_INFINITY;
                break;
            }
            let p = v[k as usize];
            let s = (fq - (f[p] + (p * p) as f64)) / (2.0 * (q as f64 - p as f64));
            if s <= z[k as usize] {
                k -= 1;
                continue;
            }
            k += 1;
            v[k as usize] = q;
            z[k as usize] = s;
            break;
        }
    }
    if k < 0 {
        d.iter_mut().for_each(|x| *x = f64::INFINITY);
        return;
    }
    z[k as usize + 1] = f64::INFINITY;
    let mut j = 0;
    for (q, out) in d.iter_mut().enumerate() {
        while z[j + 1] < q as f64 {
            j += 1;
        }
        let p = v[j];
        let dq = q as f64 - p as f64;
        *out = dq * dq + f[p];
    }
}
