// 该文件是 Biaozhu （标注） 项目的一部分。
// src/annotation.rs - 检测结果归一化为矩形标注
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::{model::Detection, task::TaskId};

pub const RECTANGLE_LABELS: &str = "rectanglelabels";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
  #[error("类别索引 {index} 超出标签表范围（共 {len} 个标签）")]
  LabelIndexOutOfRange { index: i64, len: usize },
  #[error("图像尺寸无效: {width}x{height}")]
  InvalidImageSize { width: u32, height: u32 },
}

/// 标注界面的标签配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelConfig {
  pub from_name: String,
  pub to_name: String,
  pub labels: Vec<String>,
}

impl LabelConfig {
  pub fn label(&self, class_index: i64) -> Result<&str, NormalizeError> {
    usize::try_from(class_index)
      .ok()
      .and_then(|index| self.labels.get(index))
      .map(String::as_str)
      .ok_or(NormalizeError::LabelIndexOutOfRange {
        index: class_index,
        len: self.labels.len(),
      })
  }
}

/// 百分比单位、左上角锚点的矩形
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectangleValue {
  pub rectanglelabels: Vec<String>,
  pub x: f64,
  pub y: f64,
  pub width: f64,
  pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
  pub from_name: String,
  pub to_name: String,
  #[serde(rename = "type")]
  pub kind: String,
  pub value: RectangleValue,
  pub score: f64,
}

/// 提交给标注存储的单个任务结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
  pub result: Vec<Annotation>,
  pub model_version: String,
  pub task: TaskId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub score: Option<f64>,
}

impl ResultEnvelope {
  pub fn new(
    result: Vec<Annotation>,
    score: Option<f64>,
    model_version: impl Into<String>,
    task: TaskId,
  ) -> Self {
    Self {
      result,
      model_version: model_version.into(),
      task,
      score,
    }
  }
}

/// 中心锚点像素框转换为左上角锚点百分比框
pub fn to_percent_rect(detection: &Detection, width: u32, height: u32) -> [f64; 4] {
  let (w, h) = (f64::from(width), f64::from(height));
  [
    100.0 * (detection.x_center - detection.width / 2.0) / w,
    100.0 * (detection.y_center - detection.height / 2.0) / h,
    100.0 * detection.width / w,
    100.0 * detection.height / h,
  ]
}

/// 将一张图像的检测结果转换为标注，并返回最低置信度
///
/// 最低置信度大于 1.0 时（包括没有检测结果）不返回汇总分数。
pub fn normalize(
  detections: &[Detection],
  width: u32,
  height: u32,
  labels: &LabelConfig,
) -> Result<(Vec<Annotation>, Option<f64>), NormalizeError> {
  if width == 0 || height == 0 {
    error!("图像尺寸无效: {}x{}", width, height);
    return Err(NormalizeError::InvalidImageSize { width, height });
  }

  let mut lowest_confidence: Option<f64> = None;
  let mut annotations = Vec::with_capacity(detections.len());

  for detection in detections {
    let label = labels.label(detection.class_index)?;
    let [x, y, w, h] = to_percent_rect(detection, width, height);

    // f64::min 会忽略 NaN
    lowest_confidence = Some(match lowest_confidence {
      Some(lowest) => lowest.min(detection.confidence),
      None => detection.confidence,
    });

    annotations.push(Annotation {
      from_name: labels.from_name.clone(),
      to_name: labels.to_name.clone(),
      kind: RECTANGLE_LABELS.to_string(),
      value: RectangleValue {
        rectanglelabels: vec![label.to_string()],
        x,
        y,
        width: w,
        height: h,
      },
      score: detection.confidence,
    });
  }

  let score = lowest_confidence.filter(|lowest| *lowest <= 1.0);
  Ok((annotations, score))
}
