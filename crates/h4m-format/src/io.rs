//! I/O 抽象层.
//!
//! 对标 FFmpeg 的 `AVIOContext`, 为解封装器提供带缓冲的只读接口,
//! 支持文件、内存缓冲区和不可 seek 的字节流.

use std::io::{self, Read, Seek};
use std::path::Path;

use h4m_core::{H4mError, H4mResult};

/// I/O 上下文
///
/// 封装底层 I/O 操作, 为解封装器提供统一的数据读取接口.
/// 所有多字节整数按大端序读取 (HVQM4 的字节序).
pub struct IoContext {
    /// 内部 I/O 实现
    inner: Box<dyn IoBackend>,
    /// 读缓冲区
    buffer: Vec<u8>,
    /// 缓冲区中的有效数据长度
    buf_len: usize,
    /// 缓冲区当前读取位置
    buf_pos: usize,
}

/// I/O 后端 trait
///
/// 实现此 trait 以支持不同的 I/O 来源 (文件、内存、管道等).
pub trait IoBackend: Send {
    /// 读取数据到缓冲区
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// 定位 (seek)
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64>;
    /// 获取当前位置
    fn position(&mut self) -> io::Result<u64>;
    /// 获取总大小 (如果可知)
    fn size(&self) -> Option<u64>;
    /// 是否支持 seek
    fn is_seekable(&self) -> bool;
}

/// 默认缓冲区大小 (32 KB)
const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

impl IoContext {
    /// 从 I/O 后端创建上下文
    pub fn new(backend: Box<dyn IoBackend>) -> Self {
        Self {
            inner: backend,
            buffer: vec![0u8; DEFAULT_BUFFER_SIZE],
            buf_len: 0,
            buf_pos: 0,
        }
    }

    /// 从文件路径打开 (只读)
    pub fn open_read(path: impl AsRef<Path>) -> H4mResult<Self> {
        let file = std::fs::File::open(path)?;
        Ok(Self::new(Box::new(FileBackend::new(file))))
    }

    /// 从内存数据创建
    pub fn from_memory(data: impl Into<Vec<u8>>) -> Self {
        Self::new(Box::new(MemoryBackend::from_data(data.into())))
    }

    /// 从任意只读字节流创建 (不可 seek)
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self::new(Box::new(StreamBackend::new(reader)))
    }

    // ========================
    // 读取方法
    // ========================

    /// 读取指定字节数
    ///
    /// 数据不足时返回 `Io(UnexpectedEof)`, 不会返回部分数据.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> H4mResult<()> {
        let mut total_read = 0;
        while total_read < buf.len() {
            let buffered = self.buf_len - self.buf_pos;
            if buffered > 0 {
                let to_copy = buffered.min(buf.len() - total_read);
                buf[total_read..total_read + to_copy]
                    .copy_from_slice(&self.buffer[self.buf_pos..self.buf_pos + to_copy]);
                self.buf_pos += to_copy;
                total_read += to_copy;
            } else {
                self.buf_pos = 0;
                self.buf_len = self.inner.read(&mut self.buffer)?;
                if self.buf_len == 0 {
                    return Err(H4mError::truncated(format!(
                        "需要 {} 字节, 只读到 {total_read} 字节",
                        buf.len()
                    )));
                }
            }
        }
        Ok(())
    }

    /// 读取固定长度的字节数组
    pub fn read_array<const N: usize>(&mut self) -> H4mResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// 读取 1 个字节
    pub fn read_u8(&mut self) -> H4mResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// 读取 u16 大端
    pub fn read_u16_be(&mut self) -> H4mResult<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// 读取 u32 大端
    pub fn read_u32_be(&mut self) -> H4mResult<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// 读取指定数量的字节
    pub fn read_bytes(&mut self, count: usize) -> H4mResult<Vec<u8>> {
        let mut buf = vec![0u8; count];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// 跳过指定字节数
    pub fn skip(&mut self, count: usize) -> H4mResult<()> {
        // 先尝试消耗缓冲区中的数据
        let buffered = self.buf_len - self.buf_pos;
        if count <= buffered {
            self.buf_pos += count;
            return Ok(());
        }

        // 跳过缓冲区中所有剩余数据
        let remaining = count - buffered;
        self.buf_pos = self.buf_len;

        if self.inner.is_seekable() {
            let target = self.inner.position()? + remaining as u64;
            if self.inner.size().is_some_and(|size| target > size) {
                return Err(H4mError::truncated(format!("跳过 {count} 字节超出数据末尾")));
            }
            self.inner.seek(io::SeekFrom::Start(target))?;
        } else {
            // 逐块丢弃读取的数据
            let mut left = remaining;
            while left > 0 {
                let to_read = left.min(self.buffer.len());
                self.buf_len = self.inner.read(&mut self.buffer[..to_read])?;
                if self.buf_len == 0 {
                    return Err(H4mError::truncated(format!("跳过 {count} 字节超出数据末尾")));
                }
                left -= self.buf_len;
            }
            self.buf_pos = 0;
            self.buf_len = 0;
        }
        Ok(())
    }

    /// 预读数据用于格式探测, 不移动读取位置
    ///
    /// 只能在缓冲区为空或已读取的数据仍在缓冲区内时调用.
    /// 返回实际可用的字节 (可能少于 `count`).
    pub fn peek(&mut self, count: usize) -> H4mResult<&[u8]> {
        let count = count.min(self.buffer.len());
        if self.buf_len - self.buf_pos < count {
            // 把未消耗的数据移到缓冲区开头再补读
            self.buffer.copy_within(self.buf_pos..self.buf_len, 0);
            self.buf_len -= self.buf_pos;
            self.buf_pos = 0;
            while self.buf_len < count {
                let n = self.inner.read(&mut self.buffer[self.buf_len..])?;
                if n == 0 {
                    break;
                }
                self.buf_len += n;
            }
        }
        let end = (self.buf_pos + count).min(self.buf_len);
        Ok(&self.buffer[self.buf_pos..end])
    }

    // ========================
    // 定位方法
    // ========================

    /// 定位到绝对位置
    ///
    /// 注意: seek 会清空读缓冲区. 不可 seek 的流返回 `Unsupported`.
    pub fn seek_to(&mut self, pos: u64) -> H4mResult<u64> {
        if !self.inner.is_seekable() {
            return Err(H4mError::Unsupported("当前输入流不支持 seek".into()));
        }
        self.buf_pos = 0;
        self.buf_len = 0;
        Ok(self.inner.seek(io::SeekFrom::Start(pos))?)
    }

    /// 获取当前位置
    ///
    /// 考虑读缓冲区中尚未消耗的数据量.
    pub fn position(&mut self) -> H4mResult<u64> {
        let raw_pos = self.inner.position()?;
        let buffered = (self.buf_len - self.buf_pos) as u64;
        Ok(raw_pos - buffered)
    }

    /// 是否支持随机访问
    pub fn is_seekable(&self) -> bool {
        self.inner.is_seekable()
    }

    /// 获取总大小
    pub fn size(&self) -> Option<u64> {
        self.inner.size()
    }
}

/// 文件 I/O 后端
struct FileBackend {
    file: std::fs::File,
    size: Option<u64>,
}

impl FileBackend {
    fn new(file: std::fs::File) -> Self {
        let size = file.metadata().ok().map(|m| m.len());
        Self { file, size }
    }
}

impl IoBackend for FileBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }

    fn position(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// 内存缓冲区 I/O 后端
///
/// 用于测试和内存中处理.
pub struct MemoryBackend {
    /// 数据缓冲区
    data: Vec<u8>,
    /// 当前位置
    pos: usize,
}

impl MemoryBackend {
    /// 从已有数据创建
    pub fn from_data(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// 获取内部数据的引用
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl IoBackend for MemoryBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.data.len().saturating_sub(self.pos);
        let to_read = buf.len().min(available);
        if to_read == 0 {
            return Ok(0);
        }
        buf[..to_read].copy_from_slice(&self.data[self.pos..self.pos + to_read]);
        self.pos += to_read;
        Ok(to_read)
    }

    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            io::SeekFrom::Start(offset) => offset as i64,
            io::SeekFrom::End(offset) => self.data.len() as i64 + offset,
            io::SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek 位置不能为负",
            ));
        }
        self.pos = new_pos as usize;
        Ok(self.pos as u64)
    }

    fn position(&mut self) -> io::Result<u64> {
        Ok(self.pos as u64)
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// 顺序字节流后端 (管道, socket 等)
///
/// 只能向前读取, 位置为已读取的字节数.
pub struct StreamBackend<R> {
    reader: R,
    pos: u64,
}

impl<R: Read + Send> StreamBackend<R> {
    /// 包装一个只读字节流
    pub fn new(reader: R) -> Self {
        Self { reader, pos: 0 }
    }
}

impl<R: Read + Send> IoBackend for StreamBackend<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, _pos: io::SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "顺序字节流不支持 seek",
        ))
    }

    fn position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }

    fn size(&self) -> Option<u64> {
        None
    }

    fn is_seekable(&self) -> bool {
        false
    }
}
