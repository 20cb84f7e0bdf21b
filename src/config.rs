// 该文件是 Biaozhu （标注） 项目的一部分。
// src/config.rs - 进程级配置
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

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::http::Credentials;

const DEFAULT_CACHE_DIR_NAME: &str = "biaozhu-cache";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
  #[error("未指定仓库名，请设置 --repo 或 --dvc-remote")]
  MissingRepo,
  #[error("DVC 远程地址无法解析出仓库: {0}")]
  InvalidDvcRemote(String),
}

/// 远程仓库身份：托管服务地址、所有者与仓库名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoIdentity {
  pub host: Url,
  pub owner: String,
  pub repo: String,
}

impl RepoIdentity {
  pub fn new(host: Url, owner: impl Into<String>, repo: impl Into<String>) -> Self {
    Self {
      host,
      owner: owner.into(),
      repo: repo.into(),
    }
  }

  /// 从 DVC 远程地址推断仓库身份，例如 `https://dagshub.com/owner/repo.dvc`
  pub fn from_dvc_remote(remote: &Url) -> Result<Self, ConfigError> {
    let segments: Vec<&str> = remote
      .path_segments()
      .map(|segments| segments.filter(|s| !s.is_empty()).collect())
      .unwrap_or_default();

    let [.., owner, repo] = segments.as_slice() else {
      return Err(ConfigError::InvalidDvcRemote(remote.to_string()));
    };

    let repo = Path::new(repo)
      .file_stem()
      .and_then(|stem| stem.to_str())
      .filter(|stem| !stem.is_empty())
      .ok_or_else(|| ConfigError::InvalidDvcRemote(remote.to_string()))?;

    let mut host = remote.clone();
    host.set_path("");
    host.set_query(None);
    host.set_fragment(None);
    let _ = host.set_username("");
    let _ = host.set_password(None);

    Ok(Self::new(host, *owner, repo))
  }

  /// `dvc remote list` 输出的一行，最后一列为远程地址
  pub fn from_dvc_remote_line(line: &str) -> Result<Self, ConfigError> {
    let remote = line
      .split_whitespace()
      .last()
      .ok_or_else(|| ConfigError::InvalidDvcRemote(line.to_string()))?;
    let remote =
      Url::parse(remote).map_err(|_| ConfigError::InvalidDvcRemote(line.to_string()))?;
    Self::from_dvc_remote(&remote)
  }

  fn host_prefix(&self) -> &str {
    self.host.as_str().trim_end_matches('/')
  }

  /// 仓库内文件的原始内容地址
  pub fn raw_content_url(&self, commit: &str, tree_path: &str) -> String {
    format!(
      "{}/api/v1/repos/{}/{}/raw/{}/{}",
      self.host_prefix(),
      self.owner,
      self.repo,
      commit,
      tree_path
    )
  }

  /// 标注存储的预测结果提交地址
  pub fn predictions_url(&self) -> String {
    format!(
      "{}/{}/{}/annotations/git/api/predictions/",
      self.host_prefix(),
      self.owner,
      self.repo
    )
  }
}

/// 远程服务连接参数，启动时读取一次
#[derive(clap::Args, Debug, Clone)]
pub struct RemoteArgs {
  /// 远程仓库用户名
  #[arg(long, env = "DAGSHUB_USER_NAME", value_name = "USER")]
  pub user: String,

  /// 远程仓库访问令牌
  #[arg(long, env = "DAGSHUB_TOKEN", value_name = "TOKEN", hide_env_values = true)]
  pub token: String,

  /// 仓库名
  #[arg(long, env = "DAGSHUB_REPO_NAME", value_name = "REPO")]
  pub repo: Option<String>,

  /// 仓库所有者（缺省时与用户名相同）
  #[arg(long, env = "BIAOZHU_REPO_OWNER", value_name = "OWNER")]
  pub owner: Option<String>,

  /// 托管服务地址
  #[arg(
    long,
    env = "BIAOZHU_HOST",
    default_value = "https://dagshub.com",
    value_name = "URL"
  )]
  pub host: Url,

  /// DVC 远程地址，给出时优先于 --host/--owner/--repo
  #[arg(long, value_name = "URL")]
  pub dvc_remote: Option<Url>,

  /// 图像缓存目录
  #[arg(long, env = "BIAOZHU_CACHE_DIR", value_name = "DIR")]
  pub cache_dir: Option<PathBuf>,

  /// HTTP 请求超时（秒），缺省不超时
  #[arg(long, value_name = "SECONDS")]
  pub http_timeout_secs: Option<u64>,
}

impl RemoteArgs {
  pub fn settings(&self) -> Result<Settings, ConfigError> {
    let identity = match &self.dvc_remote {
      Some(remote) => RepoIdentity::from_dvc_remote(remote)?,
      None => {
        let repo = self.repo.clone().ok_or(ConfigError::MissingRepo)?;
        let owner = self.owner.clone().unwrap_or_else(|| self.user.clone());
        RepoIdentity::new(self.host.clone(), owner, repo)
      }
    };

    let cache_dir = self
      .cache_dir
      .clone()
      .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_CACHE_DIR_NAME));

    Ok(Settings {
      credentials: Credentials::new(&self.user, &self.token),
      identity,
      cache_dir,
      http_timeout: self.http_timeout_secs.map(Duration::from_secs),
    })
  }
}

/// 不可变的进程级配置，构造组件时传入
#[derive(Debug, Clone)]
pub struct Settings {
  pub credentials: Credentials,
  pub identity: RepoIdentity,
  pub cache_dir: PathBuf,
  pub http_timeout: Option<Duration>,
}
