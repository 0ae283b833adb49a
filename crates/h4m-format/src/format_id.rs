//! 容器格式标识符.
//!
//! 对标 FFmpeg 的输入格式名称.

use std::fmt;

/// 容器格式标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FormatId {
    /// HVQM4 (Hudson Soft 的 GameCube 视频容器)
    Hvqm4,
}

impl FormatId {
    /// 所有已知格式标识的列表
    pub const ALL: &[FormatId] = &[Self::Hvqm4];

    /// 获取格式的名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Hvqm4 => "hvqm4",
        }
    }

    /// 获取格式的描述
    pub const fn long_name(&self) -> &'static str {
        match self {
            Self::Hvqm4 => "HVQM4 Video",
        }
    }

    /// 获取格式常用的文件扩展名
    pub const fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Hvqm4 => &["h4m"],
        }
    }

    /// 根据文件扩展名猜测格式
    ///
    /// # 参数
    /// - `ext`: 文件扩展名 (不含 `.`, 如 "h4m")
    pub fn from_extension(ext: &str) -> Option<FormatId> {
        let ext_lower = ext.to_lowercase();
        Self::ALL
            .iter()
            .find(|id| id.extensions().contains(&ext_lower.as_str()))
            .copied()
    }

    /// 从文件路径猜测格式
    pub fn from_filename(filename: &str) -> Option<FormatId> {
        let (_, ext) = filename.rsplit_once('.')?;
        Self::from_extension(ext)
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_filename() {
        assert_eq!(FormatId::from_filename("intro.H4M"), Some(FormatId::Hvqm4));
        assert_eq!(FormatId::from_filename("movies/op.h4m"), Some(FormatId::Hvqm4));
        assert_eq!(FormatId::from_filename("op.thp"), None);
        assert_eq!(FormatId::from_filename("h4m"), None);
    }
}
