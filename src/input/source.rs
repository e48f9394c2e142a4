use std::fmt;
use std::str::FromStr;

/// 视频源标识: 构造时确定,重连时不再重新解析
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceId {
    Device(usize), // 本地摄像头索引
    Uri(String),   // RTSP/HTTP/文件路径
    Synthetic,     // 内置测试画面
}

impl SourceId {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("synthetic") {
            return SourceId::Synthetic;
        }
        // 纯数字视为设备索引
        if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(index) = raw.parse() {
                return SourceId::Device(index);
            }
        }
        SourceId::Uri(raw.to_string())
    }
}

impl FromStr for SourceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Device(index) => write!(f, "device#{}", index),
            SourceId::Uri(uri) => write!(f, "{}", uri),
            SourceId::Synthetic => write!(f, "synthetic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_index() {
        assert_eq!(SourceId::parse("0"), SourceId::Device(0));
        assert_eq!(SourceId::parse(" 2 "), SourceId::Device(2));
    }

    #[test]
    fn test_parse_uri() {
        assert_eq!(
            SourceId::parse("rtsp://10.0.0.5/stream"),
            SourceId::Uri("rtsp://10.0.0.5/stream".into())
        );
        assert_eq!(SourceId::parse("/dev/video0"), SourceId::Uri("/dev/video0".into()));
    }

    #[test]
    fn test_parse_synthetic() {
        assert_eq!(SourceId::parse("Synthetic"), SourceId::Synthetic);
    }
}
