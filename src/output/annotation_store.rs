// 该文件是 Biaozhu （标注） 项目的一部分。
// src/output/annotation_store.rs - 远程标注存储输出
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

use reqwest::blocking::Client;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{
  annotation::ResultEnvelope,
  http::Credentials,
  output::{Publish, PublishOutcome},
};

#[derive(Error, Debug)]
pub enum AnnotationStoreError {
  #[error("提交请求失败: {0}")]
  Transport(#[from] reqwest::Error),
}

/// 以基本认证 POST 结果到远程标注存储
///
/// 只提交一次，不重试。
pub struct AnnotationStoreOutput {
  client: Client,
  endpoint: Url,
  credentials: Credentials,
}

impl AnnotationStoreOutput {
  pub fn new(client: Client, endpoint: Url, credentials: Credentials) -> Self {
    Self {
      client,
      endpoint,
      credentials,
    }
  }

  pub fn endpoint(&self) -> &Url {
    &self.endpoint
  }
}

impl Publish for AnnotationStoreOutput {
  type Error = AnnotationStoreError;

  fn publish(&self, envelope: &ResultEnvelope) -> Result<PublishOutcome, Self::Error> {
    let response = self
      .credentials
      .authorize(self.client.post(self.endpoint.clone()))
      .json(envelope)
      .send()?;

    let status = response.status();
    if status.is_success() {
      debug!("任务 {} 的预测结果已提交", envelope.task);
      return Ok(PublishOutcome::Accepted);
    }

    let body = response.text().unwrap_or_default();
    warn!(
      "任务 {} 的预测结果被拒绝，状态码 {}: {}",
      envelope.task, status, body
    );
    Ok(PublishOutcome::Rejected {
      status: status.as_u16(),
    })
  }
}
