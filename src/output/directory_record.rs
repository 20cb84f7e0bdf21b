// 该文件是 Biaozhu （标注） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use chrono::{Datelike, Utc};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  annotation::ResultEnvelope,
  output::{Publish, PublishOutcome},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 把结果写成本地 JSON 文件：`<dir>/YYYY/MM/DD/HH-MM-SS-<task>-<序号>.json`
///
/// 时间为 UTC，序号是 4 位大写十六进制，`<task>` 中的 `/` 和 `\` 替换为 `_`。
///
/// `folder:///path/to/dir?pretty` 输出带缩进的 JSON。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  pretty: bool,
  record_counter: Mutex<u16>,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let pretty = uri.query_pairs().any(|(k, _)| k == "pretty");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      pretty,
      record_counter: Mutex::new(0),
    })
  }
}

impl DirectoryRecordOutput {
  fn record_id(&self) -> u16 {
    let mut counter = self
      .record_counter
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    let id = counter.wrapping_add(1);
    *counter = id;
    id
  }

  fn record_path(&self, envelope: &ResultEnvelope) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    let task = envelope.task.to_string().replace(['/', '\\'], "_");
    Ok(directory.join(format!(
      "{}-{}-{:04X}.json",
      now.format("%H-%M-%S"),
      task,
      self.record_id()
    )))
  }
}

impl Publish for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn publish(&self, envelope: &ResultEnvelope) -> Result<PublishOutcome, Self::Error> {
    let path = self.record_path(envelope)?;
    let json = if self.pretty {
      serde_json::to_vec_pretty(envelope)?
    } else {
      serde_json::to_vec(envelope)?
    };
    std::fs::write(&path, json)?;
    debug!("任务 {} 的预测结果写入 {}", envelope.task, path.display());
    Ok(PublishOutcome::Accepted)
  }
}
