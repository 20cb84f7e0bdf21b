// 该文件是 Biaozhu （标注） 项目的一部分。
// src/output.rs - 结果发布
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

use std::time::Duration;

#[cfg(feature = "directory_record")]
use crate::FromUrlWithScheme;
use crate::{FromUrl, annotation::ResultEnvelope, http::Credentials};
use thiserror::Error;
use url::Url;

/// 发布结果：非 2xx 响应不是错误，只记录为被拒绝
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
  Accepted,
  Rejected { status: u16 },
}

pub trait Publish {
  type Error;
  fn publish(&self, envelope: &ResultEnvelope) -> Result<PublishOutcome, Self::Error>;
}

impl<T: Publish + ?Sized> Publish for &T {
  type Error = T::Error;

  fn publish(&self, envelope: &ResultEnvelope) -> Result<PublishOutcome, Self::Error> {
    (**self).publish(envelope)
  }
}

mod annotation_store;
pub use self::annotation_store::{AnnotationStoreError, AnnotationStoreOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("标注存储错误: {0}")]
  AnnotationStoreError(#[from] AnnotationStoreError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("HTTP 客户端错误: {0}")]
  ClientError(#[from] reqwest::Error),
  #[error("标注存储需要认证凭据")]
  MissingCredentials,
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 按 URL 方案选择发布目标
pub struct OutputBuilder {
  url: Url,
  credentials: Option<Credentials>,
  timeout: Option<Duration>,
}

impl FromUrl for OutputBuilder {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      "http" | "https" => {}
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {}
      _ => return Err(OutputError::SchemeMismatch),
    }

    Ok(OutputBuilder {
      url: url.clone(),
      credentials: None,
      timeout: None,
    })
  }
}

impl OutputBuilder {
  pub fn credentials(mut self, credentials: Credentials) -> Self {
    self.credentials = Some(credentials);
    self
  }

  pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn build(self) -> Result<OutputWrapper, OutputError> {
    match self.url.scheme() {
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => Ok(OutputWrapper::DirectoryRecordOutput(
        DirectoryRecordOutput::from_url(&self.url)?,
      )),
      _ => {
        let credentials = self.credentials.ok_or(OutputError::MissingCredentials)?;
        let client = crate::http::blocking_client(self.timeout)?;
        Ok(OutputWrapper::AnnotationStoreOutput(
          AnnotationStoreOutput::new(client, self.url, credentials),
        ))
      }
    }
  }
}

pub enum OutputWrapper {
  AnnotationStoreOutput(AnnotationStoreOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl Publish for OutputWrapper {
  type Error = OutputError;

  fn publish(&self, envelope: &ResultEnvelope) -> Result<PublishOutcome, Self::Error> {
    match self {
      OutputWrapper::AnnotationStoreOutput(output) => {
        output.publish(envelope).map_err(OutputError::from)
      }
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => {
        output.publish(envelope).map_err(OutputError::from)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unknown_scheme() {
    let url = Url::parse("ftp://example.com/predictions").unwrap();
    assert!(matches!(
      OutputBuilder::from_url(&url),
      Err(OutputError::SchemeMismatch)
    ));
  }

  #[test]
  fn test_store_requires_credentials() {
    let url = Url::parse("https://dagshub.com/o/r/annotations/git/api/predictions/").unwrap();
    assert!(matches!(
      OutputBuilder::from_url(&url).unwrap().build(),
      Err(OutputError::MissingCredentials)
    ));
  }

  #[test]
  fn test_store_with_credentials() {
    let url = Url::parse("https://dagshub.com/o/r/annotations/git/api/predictions/").unwrap();
    let output = OutputBuilder::from_url(&url)
      .unwrap()
      .credentials(Credentials::new("o", "t"))
      .build()
      .unwrap();
    assert!(matches!(output, OutputWrapper::AnnotationStoreOutput(_)));
  }

  #[cfg(feature = "directory_record")]
  #[test]
  fn test_folder_scheme() {
    let dir = tempfile::tempdir().unwrap();
    let url = Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let output = OutputBuilder::from_url(&url).unwrap().build().unwrap();
    assert!(matches!(output, OutputWrapper::DirectoryRecordOutput(_)));
  }
}
