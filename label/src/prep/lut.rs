//! 标签查找表（FreeSurfer风格`ID NAME [R G B A]`）及按名称重排标签。

use super::error::{PrepError, Result};
use super::improc::LabelVolume;
use super::nii::{file_name_of, NiiVolume};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// 标签编号到标签名称的查找表。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelLut {
    names: BTreeMap<i32, String>,
}

impl LabelLut {
    /// 从文件读取查找表。
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| PrepError::io(path, e))?;
        Self::parse(&text).map_err(|(line, reason)| PrepError::Lut {
            path: path.to_path_buf(),
            line,
            reason,
        })
    }

    /// 解析查找表文本。空行、以`#`开头的行以及少于两列的行被跳过。
    ///
    /// 失败时返回(行号, 原因)，行号从1开始。
    pub fn parse(text: &str) -> std::result::Result<Self, (usize, String)> {
        let mut names = BTreeMap::new();
        for (n, line) in text.lines().enumerate() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(id), Some(name)) = (parts.next(), parts.next()) else {
                continue;
            };
            let id: i32 = id
                .parse()
                .map_err(|_| (n + 1, format!("`{id}` is not a label id")))?;
            names.insert(id, name.to_owned());
        }
        Ok(Self { names })
    }

    #[inline]
    pub fn name(&self, id: i32) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// 标签名称；若查找表中不存在，则为`Label_<id>`。
    pub fn name_or_default(&self, id: i32) -> String {
        self.name(id)
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Label_{id}"))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &str)> {
        self.names.iter().map(|(&id, name)| (id, name.as_str()))
    }
}

/// 按标签名称从旧查找表映射到新查找表。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelReorder {
    mapping: HashMap<i32, i32>,
}

impl LabelReorder {
    /// 对`old`中的每个标签，在`new`中寻找同名标签作为新编号。0总是映射到0。
    pub fn new(old: &LabelLut, new: &LabelLut) -> Self {
        let by_name: HashMap<&str, i32> = new.iter().map(|(id, name)| (name, id)).collect();
        let mut mapping: HashMap<i32, i32> = old
            .iter()
            .filter_map(|(id, name)| by_name.get(name).map(|&new_id| (id, new_id)))
            .collect();
        mapping.insert(0, 0);
        Self { mapping }
    }

    #[inline]
    pub fn get(&self, old: i32) -> Option<i32> {
        self.mapping.get(&old).copied()
    }

    /// 最大的新编号。
    pub fn max_target(&self) -> i32 {
        self.mapping.values().copied().max().unwrap_or(0)
    }

    /// 就地重排标签，未能映射的标签置0。返回未能映射的标签集合。
    pub fn apply(&self, volume: &mut LabelVolume) -> BTreeSet<i32> {
        let mut unmatched = BTreeSet::new();
        volume.data.mapv_inplace(|v| match self.mapping.get(&v) {
            Some(&new) => new,
            None => {
                unmatched.insert(v);
                0
            }
        });
        unmatched
    }

    /// 读取`input`，重排后以相同文件名写入`output_dir`，返回输出路径。
    pub fn process_file(&self, input: &Path, output_dir: &Path) -> Result<PathBuf> {
        let nii = NiiVolume::read(input)?;
        let mut volume = LabelVolume::from_rounded(nii.data.view());
        let unmatched = self.apply(&mut volume);
        if !unmatched.is_empty() {
            log::warn!(
                "{}: labels {unmatched:?} have no counterpart in the new lookup table and were set to 0",
                input.display()
            );
        }
        let output = output_dir.join(file_name_of(input)?);
        if (0..=u8::MAX as i32).contains(&self.max_target()) {
            nii.write_with(&output, &volume.data.mapv(|v| v as u8))?;
        } else {
            nii.write_with(&output, &volume.data)?;
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prep::nii::tests::ras_header;
    use crate::prep::nii::write_with_header;
    use ndarray::Array3;

    const OLD: &str = "\
# GOUHFI labels
0   Unknown          0   0   0 0
1   Left-Cerebral-White-Matter 245 245 245 0
2   Left-Cerebral-Cortex 205 62 78 0
3   Right-Cerebral-Cortex 205 62 78 0

4   Made-Up-Structure
";

    const NEW: &str = "\
#No. Label Name:                            R   G   B   A
0   Unknown                                 0   0   0   0
2   Left-Cerebral-White-Matter              245 245 245 0
3   Left-Cerebral-Cortex                    205 62  78  0
42  Right-Cerebral-Cortex                   205 62  78  0
";

    #[test]
    fn test_parse_skips_comments_blank_and_short_lines() {
        let lut = LabelLut::parse("# c\n\n7\n5 Foo 1 2 3 0\n 6 Bar\n").unwrap();
        assert_eq!(lut.len(), 2);
        assert_eq!(lut.name(5), Some("Foo"));
        assert_eq!(lut.name(6), Some("Bar"));
        assert_eq!(lut.name_or_default(9), "Label_9");
    }

    #[test]
    fn test_parse_bad_id() {
        let err = LabelLut::parse("1 Ok\nx Bad\n").unwrap_err();
        assert_eq!(err.0, 2);
    }

    #[test]
    fn test_reorder_by_name() {
        let old = LabelLut::parse(OLD).unwrap();
        let new = LabelLut::parse(NEW).unwrap();
        let reorder = LabelReorder::new(&old, &new);
        assert_eq!(reorder.get(1), Some(2));
        assert_eq!(reorder.get(2), Some(3));
        assert_eq!(reorder.get(3), Some(42));
        assert_eq!(reorder.get(4), None);
        assert_eq!(reorder.max_target(), 42);

        let mut v = LabelVolume::new(Array3::from_shape_vec((1, 1, 6), vec![0, 1, 2, 3, 4, 9]).unwrap());
        let unmatched = reorder.apply(&mut v);
        assert_eq!(v.data.iter().copied().collect::<Vec<_>>(), [0, 2, 3, 42, 0, 0]);
        assert_eq!(unmatched.into_iter().collect::<Vec<_>>(), [4, 9]);
    }

    #[test]
    fn test_output_type_follows_largest_target() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("seg.nii");
        let data = Array3::from_shape_vec((1, 2, 2), vec![0.0_f32, 1.0, 2.0, 3.0]).unwrap();
        write_with_header(&ras_header((1, 2, 2), [1.0; 3]), &input, &data).unwrap();
        let old = LabelLut::parse(OLD).unwrap();

        let small = dir.path().join("small");
        fs::create_dir(&small).unwrap();
        let out = LabelReorder::new(&old, &LabelLut::parse(NEW).unwrap())
            .process_file(&input, &small)
            .unwrap();
        let nii = NiiVolume::read(&out).unwrap();
        assert_eq!(nii.header.datatype, 2);
        assert_eq!(nii.data.iter().copied().collect::<Vec<_>>(), [0.0, 2.0, 3.0, 42.0]);

        let large = dir.path().join("large");
        fs::create_dir(&large).unwrap();
        let wide = NEW.replace("42  Right", "1000 Right");
        let out = LabelReorder::new(&old, &LabelLut::parse(&wide).unwrap())
            .process_file(&input, &large)
            .unwrap();
        let nii = NiiVolume::read(&out).unwrap();
        assert_eq!(nii.header.datatype, 8);
        assert_eq!(nii.data.iter().copied().collect::<Vec<_>>(), [0.0, 2.0, 3.0, 1000.0]);
    }
}
