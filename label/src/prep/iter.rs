use super::pos::Pos;

/// 按(i, j, k)字典序（k变化最快）枚举体数据中的所有体素坐标。
pub struct PosIter {
    cur: (usize, usize, usize),
    shape: (usize, usize, usize),
}

impl PosIter {
    #[inline]
    pub fn new(shape: (usize, usize, usize)) -> Self {
        Self {
            cur: (0, 0, 0),
            shape,
        }
    }
}

impl Iterator for PosIter {
    type Item = Pos;

    fn next(&mut self) -> Option<Self::Item> {
        let (ni, nj, nk) = self.shape;
        if ni == 0 || nj == 0 || nk == 0 || self.cur.0 == ni {
            return None;
        }
        let ret_pos = Pos::from(self.cur);
        let (i, j, k) = &mut self.cur;
        if *k + 1 == nk {
            *k = 0;
            if *j + 1 == nj {
                *j = 0;
                *i += 1;
            } else {
                *j += 1;
            }
        } else {
            *k += 1;
        }
        Some(ret_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::PosIter;

    fn test_pos_iter_with(ni: usize, nj: usize, nk: usize) {
        let mut it = PosIter::new((ni, nj, nk));
        for a in 0..ni {
            for b in 0..nj {
                for c in 0..nk {
                    assert_eq!(it.next(), Some((a, b, c).into()));
                }
            }
        }
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_pos_iter_zero() {
        test_pos_iter_with(0, 0, 0);
        test_pos_iter_with(4, 0, 2);
    }

    #[test]
    fn test_pos_iter_small() {
        test_pos_iter_with(3, 4, 5);
    }
}
