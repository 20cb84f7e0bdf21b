// 该文件是 Biaozhu （标注） 项目的一部分。
// src/http.rs - HTTP 客户端与认证
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

use reqwest::blocking::{Client, RequestBuilder};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// 基本认证凭据（用户名 + 访问令牌）
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
  pub user: String,
  pub token: String,
}

impl Credentials {
  pub fn new(user: impl Into<String>, token: impl Into<String>) -> Self {
    Self {
      user: user.into(),
      token: token.into(),
    }
  }

  pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
    request.basic_auth(&self.user, Some(&self.token))
  }
}

// 令牌不进日志
impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Credentials")
      .field("user", &self.user)
      .field("token", &"***")
      .finish()
  }
}

/// 创建阻塞式 HTTP 客户端
///
/// `timeout` 为 `None` 时不设置超时，请求会一直等待对端响应。
pub fn blocking_client(timeout: Option<Duration>) -> Result<Client, reqwest::Error> {
  Client::builder()
    .user_agent(USER_AGENT)
    .timeout(timeout)
    .build()
}
