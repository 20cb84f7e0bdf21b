// 该文件是 Biaozhu （标注） 项目的一部分。
// src/frame.rs - 图像帧定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::io::Cursor;
use std::path::Path;

use image::ImageReader;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像格式错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 编码后的图像及其像素尺寸
///
/// 只解析文件头获取宽高，原始字节原样交给检测器。
#[derive(Debug, Clone)]
pub struct ImageFrame {
  data: Box<[u8]>,
  width: u32,
  height: u32,
}

impl ImageFrame {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, FrameError> {
    let data = std::fs::read(path.as_ref())?;
    let frame = Self::from_bytes(data)?;
    debug!(
      "读取图像 {}: {}x{}",
      path.as_ref().display(),
      frame.width,
      frame.height
    );
    Ok(frame)
  }

  pub fn from_bytes(data: Vec<u8>) -> Result<Self, FrameError> {
    let (width, height) = ImageReader::new(Cursor::new(&data))
      .with_guessed_format()?
      .into_dimensions()?;

    Ok(Self {
      data: data.into_boxed_slice(),
      width,
      height,
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn dimensions(&self) -> (u32, u32) {
    (self.width, self.height)
  }
}

impl AsRef<[u8]> for ImageFrame {
  fn as_ref(&self) -> &[u8] {
    &self.data
  }
}
