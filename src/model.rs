// 该文件是 Biaozhu （标注） 项目的一部分。
// src/model.rs - 模型
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

use thiserror::Error;
use tracing::debug;

use crate::frame::ImageFrame;

/// 检测器原始输出每行的字段数
pub const DETECTION_FIELDS: usize = 6;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 底层检测模型，每行输出 `(x_center, y_center, w, h, confidence, class_index)`
pub trait RawDetector {
  type Error: std::error::Error + Send + Sync + 'static;

  fn forward(&self, frame: &ImageFrame) -> Result<Vec<Vec<f64>>, Self::Error>;
}

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("模型推理错误: {0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("第 {index} 行输出格式错误: {reason}")]
  MalformedRow { index: usize, reason: String },
}

/// 单个检测框，像素单位，中心锚点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  pub x_center: f64,
  pub y_center: f64,
  pub width: f64,
  pub height: f64,
  pub confidence: f64,
  pub class_index: i64,
}

impl Detection {
  /// 从一行原始输出转换，只做类型转换，不缩放也不重排
  pub fn from_row(index: usize, row: &[f64]) -> Result<Self, DetectError> {
    let &[x_center, y_center, width, height, confidence, class_index] = row else {
      return Err(DetectError::MalformedRow {
        index,
        reason: format!("期望 {} 个字段, 实际 {} 个", DETECTION_FIELDS, row.len()),
      });
    };

    if !class_index.is_finite() {
      return Err(DetectError::MalformedRow {
        index,
        reason: format!("类别索引不是有限数: {}", class_index),
      });
    }

    Ok(Detection {
      x_center,
      y_center,
      width,
      height,
      confidence,
      class_index: class_index.trunc() as i64,
    })
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Detection> {
    self.items.iter()
  }
}

/// 检测器适配层，对外提供稳定的 `detect(image) -> [Detection]`
pub struct Detector<R> {
  raw: R,
}

impl<R: RawDetector> Detector<R> {
  pub fn new(raw: R) -> Self {
    Self { raw }
  }

  pub fn detect(&self, frame: &ImageFrame) -> Result<DetectResult, DetectError> {
    let rows = self
      .raw
      .forward(frame)
      .map_err(|e| DetectError::Backend(Box::new(e)))?;

    let items = rows
      .iter()
      .enumerate()
      .map(|(index, row)| Detection::from_row(index, row))
      .collect::<Result<Vec<_>, _>>()?;

    debug!("检测到 {} 个物体", items.len());
    Ok(DetectResult {
      items: items.into_boxed_slice(),
    })
  }
}

impl<R: RawDetector> Model for Detector<R> {
  type Input = ImageFrame;
  type Output = DetectResult;
  type Error = DetectError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.detect(input)
  }
}

mod mlflow_serving;
mod registry;
pub use self::mlflow_serving::{MlflowServing, MlflowServingBuilder, MlflowServingError};
pub use self::registry::{ModelRegistry, ModelVersion, RegistryError};
