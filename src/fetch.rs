// 该文件是 Biaozhu （标注） 项目的一部分。
// src/fetch.rs - 远程图像下载
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
use tracing::{debug, error};

use crate::http::Credentials;

#[derive(Error, Debug)]
pub enum FetchError {
  #[error("请求 {url} 失败: {source}")]
  Transport {
    url: String,
    #[source]
    source: reqwest::Error,
  },
  #[error("请求 {url} 返回状态码 {status}")]
  Status { url: String, status: u16 },
}

pub trait Fetch {
  /// 取回地址对应的完整内容
  fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

impl<T: Fetch + ?Sized> Fetch for &T {
  fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
    (**self).fetch(url)
  }
}

/// 使用基本认证的 HTTP 下载器
pub struct HttpFetcher {
  client: Client,
  credentials: Credentials,
}

impl HttpFetcher {
  pub fn new(client: Client, credentials: Credentials) -> Self {
    Self {
      client,
      credentials,
    }
  }
}

impl Fetch for HttpFetcher {
  fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
    let transport = |source| FetchError::Transport {
      url: url.to_string(),
      source,
    };

    let response = self
      .credentials
      .authorize(self.client.get(url))
      .send()
      .map_err(transport)?;

    let status = response.status();
    if !status.is_success() {
      error!("下载 {} 失败，状态码 {}", url, status);
      return Err(FetchError::Status {
        url: url.to_string(),
        status: status.as_u16(),
      });
    }

    let body = response.bytes().map_err(transport)?;
    debug!("下载 {} 完成，共 {} 字节", url, body.len());
    Ok(body.to_vec())
  }
}
