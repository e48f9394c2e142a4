//! 时间滞回 (Temporal hysteresis)
//!
//! 计数器范围 [0, threshold]: 恐慌读数 +1, 正常读数 -1 (不低于0),
//! 计数器 ≥ threshold 时输出 PANIC。

use super::types::{AudioClassification, AudioStatus};

#[derive(Debug, Clone)]
pub struct PanicHysteresis {
    counter: u32,
    threshold: u32,
}

impl PanicHysteresis {
    pub fn new(threshold: u32) -> Self {
        Self {
            counter: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn status(&self) -> AudioStatus {
        if self.counter >= self.threshold {
            AudioStatus::Panic
        } else {
            AudioStatus::Normal
        }
    }

    /// 喂入一次读数, 返回更新后的分类
    pub fn update(&mut self, panic_like: bool) -> AudioClassification {
        self.counter = if panic_like {
            (self.counter + 1).min(self.threshold)
        } else {
            self.counter.saturating_sub(1)
        };
        self.classification()
    }

    pub fn classification(&self) -> AudioClassification {
        AudioClassification {
            status: self.status(),
            persistence_counter: self.counter,
        }
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(h: &mut PanicHysteresis, readings: &[bool]) -> Vec<AudioStatus> {
        readings.iter().map(|&r| h.update(r).status).collect()
    }

    #[test]
    fn test_fewer_than_threshold_never_panics() {
        let mut h = PanicHysteresis::new(3);
        let statuses = feed(&mut h, &[true, true]);
        assert!(statuses.iter().all(|s| *s == AudioStatus::Normal));
        assert_eq!(h.counter(), 2);
    }

    #[test]
    fn test_flips_at_threshold() {
        let mut h = PanicHysteresis::new(3);
        let statuses = feed(&mut h, &[true, true, true]);
        assert_eq!(statuses, vec![AudioStatus::Normal, AudioStatus::Normal, AudioStatus::Panic]);
    }

    #[test]
    fn test_counter_clamped_and_decays() {
        let mut h = PanicHysteresis::new(3);
        feed(&mut h, &[true; 10]);
        assert_eq!(h.counter(), 3);
        // 上限等于阈值: 一次正常读数即降到阈值以下
        let c = h.update(false);
        assert_eq!(c.persistence_counter, 2);
        assert_eq!(c.status, AudioStatus::Normal);
        feed(&mut h, &[false; 5]);
        assert_eq!(h.counter(), 0);
    }

    #[test]
    fn test_single_noisy_reading_does_not_toggle() {
        let mut h = PanicHysteresis::new(3);
        let statuses = feed(&mut h, &[true, false, true, false, true, true]);
        assert!(statuses.iter().all(|s| *s == AudioStatus::Normal));
        assert_eq!(h.update(true).status, AudioStatus::Panic);
    }

    #[test]
    fn test_zero_threshold_is_raised_to_one() {
        let mut h = PanicHysteresis::new(0);
        assert_eq!(h.status(), AudioStatus::Normal);
        assert_eq!(h.update(true).status, AudioStatus::Panic);
    }
}
