// 该文件是 Biaozhu （标注） 项目的一部分。
// src/reference.rs - 图像引用解析
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
use tracing::{debug, error};

use crate::config::RepoIdentity;

const HTTP_PREFIXES: [&str; 2] = ["http://", "https://"];
const REPO_PREFIX: &str = "repo://";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
  #[error("无法解析的图像引用: {0}")]
  UnresolvableReference(String),
}

/// 任务中的图像引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference<'a> {
  /// 绝对 HTTP(S) 地址，原样使用
  Remote(&'a str),
  /// `repo://<commit>/<tree_path>`，指向版本化仓库中的文件
  Repo { commit: &'a str, tree_path: &'a str },
}

fn has_prefix_ignore_case(uri: &str, prefix: &str) -> bool {
  uri
    .get(..prefix.len())
    .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

impl<'a> ImageReference<'a> {
  pub fn parse(uri: &'a str) -> Result<Self, ResolveError> {
    if HTTP_PREFIXES
      .iter()
      .any(|prefix| has_prefix_ignore_case(uri, prefix))
    {
      return Ok(ImageReference::Remote(uri));
    }

    if let Some(rest) = uri.strip_prefix(REPO_PREFIX) {
      // 第一段是提交或分支，其余部分为仓库内路径
      let (commit, tree_path) = rest.split_once('/').unwrap_or((rest, ""));
      if commit.is_empty() || tree_path.is_empty() {
        error!("仓库引用缺少提交或路径: {}", uri);
        return Err(ResolveError::UnresolvableReference(uri.to_string()));
      }
      return Ok(ImageReference::Repo { commit, tree_path });
    }

    error!("未知的图像引用方案: {}", uri);
    Err(ResolveError::UnresolvableReference(uri.to_string()))
  }
}

/// 将图像引用解析为可下载的完整地址
#[derive(Debug, Clone)]
pub struct Resolver {
  identity: RepoIdentity,
}

impl Resolver {
  pub fn new(identity: RepoIdentity) -> Self {
    Self { identity }
  }

  pub fn identity(&self) -> &RepoIdentity {
    &self.identity
  }

  pub fn resolve(&self, uri: &str) -> Result<String, ResolveError> {
    let url = match ImageReference::parse(uri)? {
      ImageReference::Remote(url) => url.to_string(),
      ImageReference::Repo { commit, tree_path } => {
        self.identity.raw_content_url(commit, tree_path)
      }
    };
    debug!("图像引用 {} 解析为 {}", uri, url);
    Ok(url)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  fn resolver() -> Resolver {
    Resolver::new(RepoIdentity::new(
      Url::parse("https://dagshub.com").unwrap(),
      "o",
      "r",
    ))
  }

  #[test]
  fn test_http_passes_through() {
    assert_eq!(
      resolver().resolve("https://x/y.jpg").unwrap(),
      "https://x/y.jpg"
    );
    assert_eq!(
      resolver().resolve("http://x:8080/a b.jpg?raw=1").unwrap(),
      "http://x:8080/a b.jpg?raw=1"
    );
  }

  #[test]
  fn test_repo_reference() {
    let url = resolver().resolve("repo://abc123/dir/img.png").unwrap();
    assert!(url.ends_with("/repos/o/r/raw/abc123/dir/img.png"));
    assert_eq!(
      url,
      "https://dagshub.com/api/v1/repos/o/r/raw/abc123/dir/img.png"
    );
  }

  #[test]
  fn test_repo_reference_keeps_nested_path() {
    assert_eq!(
      ImageReference::parse("repo://main/data/images/a/b.jpg").unwrap(),
      ImageReference::Repo {
        commit: "main",
        tree_path: "data/images/a/b.jpg"
      }
    );
  }

  #[test]
  fn test_unknown_scheme_is_unresolvable() {
    assert_eq!(
      resolver().resolve("ftp://bad"),
      Err(ResolveError::UnresolvableReference("ftp://bad".into()))
    );
    assert!(resolver().resolve("s3://bucket/key.jpg").is_err());
    assert!(resolver().resolve("/local/file.jpg").is_err());
    assert!(resolver().resolve("").is_err());
  }

  #[test]
  fn test_repo_without_commit_or_path_is_unresolvable() {
    assert!(resolver().resolve("repo:///dir/img.png").is_err());
    assert!(resolver().resolve("repo://abc123").is_err());
    assert!(resolver().resolve("repo://abc123/").is_err());
  }
}
