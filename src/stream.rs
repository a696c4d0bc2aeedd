// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 流式响应体
//!
//! 未缓冲的文件在响应时按块从磁盘读取。读取过程中可以：
//! - 顺带计算 MD5，读到文件末尾后回填到记录上，供之后的请求输出 ETag；
//! - 经过 gzip 编码器转换，此时响应长度事先未知。
//!
//! 文件句柄归 [`FileStream`] 所有，无论正常结束还是连接中途断开，
//! 随 `FileStream` 被丢弃时都会关闭。

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use flate2::{write::GzEncoder, Compression};
use log::debug;
use md5::{Digest, Md5};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWrite, AsyncWriteExt},
};

use crate::record::FileRecord;

pub struct FileStream {
    file: File,
    record: Arc<FileRecord>,
    // 打开时记录的元数据，回填摘要前用来确认文件没有被刷新
    expected_modified: SystemTime,
    expected_size: u64,
    read_total: u64,
    hasher: Option<Md5>,
    encoder: Option<GzEncoder<Vec<u8>>>,
    buffer: Vec<u8>,
    finished: bool,
}

impl FileStream {
    /// 打开记录对应的源文件。`hash` 为真时在读取过程中计算摘要。
    pub async fn open(
        record: Arc<FileRecord>,
        expected_size: u64,
        expected_modified: SystemTime,
        hash: bool,
        gzip: bool,
        chunk_size: usize,
    ) -> io::Result<Self> {
        let file = File::open(record.source_path()).await?;
        Ok(Self {
            file,
            record,
            expected_modified,
            expected_size,
            read_total: 0,
            hasher: if hash { Some(Md5::new()) } else { None },
            encoder: if gzip {
                Some(GzEncoder::new(Vec::new(), Compression::default()))
            } else {
                None
            },
            buffer: vec![0u8; chunk_size.max(1)],
            finished: false,
        })
    }

    pub fn is_compressed(&self) -> bool {
        self.encoder.is_some()
    }

    /// 读取下一块数据，读完返回 `None`
    pub async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            let n = self.file.read(&mut self.buffer).await?;
            if n == 0 {
                self.finished = true;
                self.finish_digest();
                if let Some(encoder) = self.encoder.take() {
                    let tail = encoder.finish()?;
                    if !tail.is_empty() {
                        return Ok(Some(Bytes::from(tail)));
                    }
                }
                return Ok(None);
            }

            self.read_total += n as u64;
            let chunk = &self.buffer[..n];
            if let Some(hasher) = self.hasher.as_mut() {
                hasher.update(chunk);
            }
            match self.encoder.as_mut() {
                Some(encoder) => {
                    encoder.write_all(chunk)?;
                    let out = std::mem::take(encoder.get_mut());
                    if !out.is_empty() {
                        return Ok(Some(Bytes::from(out)));
                    }
                }
                None => return Ok(Some(Bytes::copy_from_slice(chunk))),
            }
        }
    }

    fn finish_digest(&mut self) {
        let hasher = match self.hasher.take() {
            Some(hasher) => hasher,
            None => return,
        };
        if self.read_total != self.expected_size {
            debug!(
                "文件{}读取长度{}与预期{}不符，放弃回填摘要",
                self.record.public_path(),
                self.read_total,
                self.expected_size
            );
            return;
        }
        let digest = STANDARD.encode(hasher.finalize());
        if self.record.store_digest(digest, self.expected_modified) {
            debug!("文件{}的摘要已在流式读取后回填", self.record.public_path());
        }
    }

    /// 把剩余内容全部写入 `writer`，返回写出的字节数
    pub async fn write_to<W>(mut self, writer: &mut W) -> io::Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut total_sent = 0u64;
        while let Some(chunk) = self.next_chunk().await? {
            writer.write_all(&chunk).await?;
            total_sent += chunk.len() as u64;
        }
        writer.flush().await?;
        Ok(total_sent)
    }

    /// 读出剩余的全部内容
    pub async fn collect(mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}

impl fmt::Debug for FileStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStream")
            .field("source", &self.record.source_path())
            .field("read_total", &self.read_total)
            .field("hashing", &self.hasher.is_some())
            .field("compressed", &self.encoder.is_some())
            .finish()
    }
}
