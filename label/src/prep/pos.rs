/// 代表一个体素坐标(i, j, k)索引，不负责边界检查。
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Pos {
    pub i: usize,
    pub j: usize,
    pub k: usize,
}

impl Pos {
    #[inline]
    pub fn new(i: usize, j: usize, k: usize) -> Self {
        Self { i, j, k }
    }

    #[inline]
    pub fn to_tuple(self) -> (usize, usize, usize) {
        (self.i, self.j, self.k)
    }

    #[inline]
    pub fn to_index(self) -> [usize; 3] {
        [self.i, self.j, self.k]
    }

    /// 获得`self`在形状为`shape`的体数据中的6-邻域坐标（已剔除越界坐标）。
    pub fn n6_within(self, shape: (usize, usize, usize)) -> impl Iterator<Item = Pos> {
        let (i, j, k) = self.to_tuple();
        let (ni, nj, nk) = shape;
        [
            (i.wrapping_sub(1), j, k),
            (i + 1, j, k),
            (i, j.wrapping_sub(1), k),
            (i, j + 1, k),
            (i, j, k.wrapping_sub(1)),
            (i, j, k + 1),
        ]
        .into_iter()
        .filter(move |&(a, b, c)| a < ni && b < nj && c < nk)
        .map(Pos::from)
    }
}

impl From<(usize, usize, usize)> for Pos {
    #[inline]
    fn from(pos: (usize, usize, usize)) -> Self {
        Pos::new(pos.0, pos.1, pos.2)
    }
}

#[cfg(test)]
mod tests {
    use super::Pos;

    #[test]
    fn test_n6_corner() {
        let n: Vec<Pos> = Pos::new(0, 0, 0).n6_within((3, 3, 3)).collect();
        assert_eq!(n.len(), 3);
        assert!(n.contains(&Pos::new(1, 0, 0)));
        assert!(n.contains(&Pos::new(0, 1, 0)));
        assert!(n.contains(&Pos::new(0, 0, 1)));
    }

    #[test]
    fn test_n6_inner() {
        assert_eq!(Pos::new(1, 1, 1).n6_within((3, 3, 3)).count(), 6);
    }
}
