use super::define::{
    clock::{MPEG_CLOCK, NORMALIZED_CLOCK, PTS_MASK, PTS_WRAP},
    PTS_NO_VALUE,
};

pub fn pts_mask(value: i64) -> i64 {
    value & PTS_MASK
}

pub fn is_valid(value: i64) -> bool {
    value != PTS_NO_VALUE
}

/// `later - earlier` in 33-bit modular arithmetic, folded into
/// `[-2^32, 2^32)` so that a timestamp just after a wrap still compares as
/// later.
pub fn pts_diff(later: i64, earlier: i64) -> i64 {
    let delta = pts_mask(later.wrapping_sub(earlier));
    if delta >= PTS_WRAP / 2 {
        delta - PTS_WRAP
    } else {
        delta
    }
}

pub fn pts_add(value: i64, delta: i64) -> i64 {
    if !is_valid(value) {
        return PTS_NO_VALUE;
    }
    pts_mask(value.wrapping_add(delta))
}

/// `value * num / den` without intermediate overflow, rounding toward zero.
pub fn rescale(value: i64, num: i64, den: i64) -> i64 {
    if !is_valid(value) || den == 0 {
        return value;
    }
    ((value as i128) * (num as i128) / (den as i128)) as i64
}

pub fn to_normalized(value: i64) -> i64 {
    rescale(value, NORMALIZED_CLOCK, MPEG_CLOCK)
}

/// Tracks how many times the 33-bit PES clock wrapped so timestamps handed
/// downstream keep increasing.
#[derive(Debug, Default, Clone)]
pub struct PtsWrap {
    wraps: i64,
    last: Option<i64>,
}

impl PtsWrap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.wraps = 0;
        self.last = None;
    }

    pub fn unwrap(&mut self, value: i64) -> i64 {
        if !is_valid(value) {
            return value;
        }

        let mut candidate = pts_mask(value) + self.wraps * PTS_WRAP;
        if let Some(last) = self.last {
            if candidate - last < -PTS_WRAP / 2 {
                self.wraps += 1;
                candidate += PTS_WRAP;
                log::debug!("pts wrapped, wrap count: {}", self.wraps);
            } else if candidate - last > PTS_WRAP / 2 && self.wraps > 0 {
                //a late timestamp from before the last wrap
                return candidate - PTS_WRAP;
            }
        }

        if self.last.map_or(true, |last| candidate > last) {
            self.last = Some(candidate);
        }
        candidate
    }
}
