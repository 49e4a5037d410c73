use std::time::{Duration, Instant};

/// 累计计时器。
#[derive(Clone)]
pub struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器。初始化时会视为已经调用一次`self.start()`。
    #[inline]
    pub fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    /// 开始计时。可以通过再次调用来重置。
    #[inline]
    pub fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时，并将这一区间的时间累计起来。上一次调用必须是`self.start()`，否则时间计算值无意义。
    #[inline]
    pub fn elapsed(&mut self) {
        self.consumed += self.since.elapsed();
    }

    /// 获得累计时间。
    #[inline]
    pub fn total(&self) -> Duration {
        self.consumed
    }

    /// 获得累计时间（以秒为单位）。
    #[inline]
    pub fn get_total_secs(&self) -> f64 {
        self.consumed.as_secs_f64()
    }
}

impl Default for AccTimer {
    fn default() -> Self {
        Self::new()
    }
}
