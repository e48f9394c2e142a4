/// 滑动窗口: 新样本从尾部进入, 最旧的样本从头部丢弃
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    data: Vec<f32>,
}

impl RollingBuffer {
    /// 初始全零, 与固定时长窗口一致
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(1)],
        }
    }

    pub fn with_duration(sample_rate: u32, seconds: f32) -> Self {
        Self::new((sample_rate as f32 * seconds).round() as usize)
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn push(&mut self, chunk: &[f32]) {
        let cap = self.data.len();
        if chunk.len() >= cap {
            self.data.copy_from_slice(&chunk[chunk.len() - cap..]);
            return;
        }
        let n = chunk.len();
        self.data.copy_within(n.., 0);
        self.data[cap - n..].copy_from_slice(chunk);
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}
