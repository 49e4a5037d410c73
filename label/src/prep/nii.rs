//! NIfTI体数据读写与目录枚举。

use super::error::{PrepError, Result};
use ndarray::{Array3, ArrayBase, Axis, Data, Ix3, IxDyn};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiError, NiftiHeader, NiftiObject, ReaderOptions};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 一个3D NIfTI体数据，连同其原始头部。
///
/// `data[[i, j, k]]`对应体素坐标(i, j, k)，已经应用`scl_slope`/`scl_inter`缩放。
#[derive(Debug, Clone)]
pub struct NiiVolume {
    pub header: NiftiHeader,
    pub data: Array3<f32>,
}

impl NiiVolume {
    /// 读取`.nii`或`.nii.gz`文件。第四维长度为1的4D体数据按3D处理。
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let obj = ReaderOptions::new()
            .read_file(path)
            .map_err(|source| PrepError::NiftiRead {
                path: path.to_path_buf(),
                source,
            })?;
        let header = obj.header().clone();
        let volume = obj
            .into_volume()
            .into_ndarray::<f32>()
            .map_err(|source| PrepError::NiftiRead {
                path: path.to_path_buf(),
                source,
            })?;
        let data = squeeze_to_3d(volume).map_err(|shape| PrepError::Shape {
            path: path.to_path_buf(),
            shape,
        })?;
        Ok(Self { header, data })
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// 单个体素的体积（mm³），即前三个空间维度的体素尺寸之积。
    pub fn voxel_volume(&self) -> f64 {
        self.header.pixdim[1..=3]
            .iter()
            .map(|&d| d as f64)
            .product()
    }

    /// 以当前头部为参考写出`data`，元素类型由`T`决定。
    pub fn write_with<T, S, P>(&self, path: P, data: &ArrayBase<S, Ix3>) -> Result<()>
    where
        T: VoxelElement,
        S: Data<Elem = T>,
        P: AsRef<Path>,
    {
        write_with_header(&self.header, path, data)
    }
}

/// 以`header`为参考写出`data`。缩放系数会被重置为恒等变换。
pub fn write_with_header<T, S, P>(
    header: &NiftiHeader,
    path: P,
    data: &ArrayBase<S, Ix3>,
) -> Result<()>
where
    T: VoxelElement,
    S: Data<Elem = T>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let mut header = header.clone();
    header.scl_slope = 1.0;
    header.scl_inter = 0.0;
    header.cal_min = 0.0;
    header.cal_max = 0.0;
    let options = WriterOptions::new(path).reference_header(&header);
    T::write_nifti(&options, data).map_err(|source| PrepError::NiftiWrite {
            path: path.to_path_buf(),
            source,
        })
}

/// 可以写入NIfTI文件的体素元素类型。
pub trait VoxelElement: Copy + Send + Sync + 'static {
    fn write_nifti<S: Data<Elem = Self>>(
        options: &WriterOptions<'_>,
        data: &ArrayBase<S, Ix3>,
    ) -> std::result::Result<(), NiftiError>;
}

macro_rules! impl_voxel_element {
    ($($t: ty),*) => {
        $(
            impl VoxelElement for $t {
                #[inline]
                fn write_nifti<S: Data<Elem = Self>>(
                    options: &WriterOptions<'_>,
                    data: &ArrayBase<S, Ix3>,
                ) -> std::result::Result<(), NiftiError> {
                    options.write_nifti(data)
                }
            }
        )*
    };
}

impl_voxel_element!(u8, i16, i32, f32);

fn squeeze_to_3d(mut volume: ndarray::Array<f32, IxDyn>) -> std::result::Result<Array3<f32>, Vec<usize>> {
    let shape = volume.shape().to_vec();
    match shape.len() {
        3 => {}
        4 if shape[3] == 1 => volume = volume.index_axis_move(Axis(3), 0),
        _ => return Err(shape),
    }
    volume.into_dimensionality::<Ix3>().map_err(|_| shape)
}

/// 判断文件名是否为NIfTI文件。
#[inline]
pub fn is_nii_name(name: &str) -> bool {
    name.ends_with(".nii") || name.ends_with(".nii.gz")
}

/// 去掉`.nii.gz`或`.nii`扩展名。
pub fn nii_stem(name: &str) -> &str {
    name.strip_suffix(".nii.gz")
        .or_else(|| name.strip_suffix(".nii"))
        .unwrap_or(name)
}

/// 生成带`_masked`后缀的文件名，保留原压缩格式。
pub fn masked_name(name: &str) -> String {
    if name.ends_with(".nii.gz") {
        format!("{}_masked.nii.gz", nii_stem(name))
    } else {
        format!("{}_masked.nii", nii_stem(name))
    }
}

/// 枚举`dir`下（不递归）的所有`.nii`/`.nii.gz`文件，按文件名排序。
pub fn list_nii_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    list_files_by(dir, is_nii_name)
}

/// 枚举`dir`下（不递归）文件名满足`pred`的所有文件，按文件名排序。
pub fn list_files_by<P: AsRef<Path>>(dir: P, pred: fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walkdir loop"));
            PrepError::io(dir, source)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if pred(name) {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}

/// 递归创建目录。
pub fn ensure_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|e| PrepError::io(dir, e))
}

/// 获得`path`的文件名（UTF-8）。
pub fn file_name_of(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| PrepError::InvalidOption(format!("`{}` has no UTF-8 file name", path.display())))
}
