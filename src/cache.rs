// 该文件是 Biaozhu （标注） 项目的一部分。
// src/cache.rs - 图像内容缓存
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

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::fetch::{Fetch, FetchError};

const FINGERPRINT_LEN: usize = 6;

#[derive(Error, Debug)]
pub enum CacheError {
  #[error("无效的图像地址 {url}: {source}")]
  InvalidUrl {
    url: String,
    #[source]
    source: url::ParseError,
  },
  #[error("下载错误: {0}")]
  Fetch(#[from] FetchError),
  #[error("缓存文件 {path} I/O 错误: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// 地址指纹：地址字符串 MD5 的前 6 位十六进制
pub fn fingerprint(url: &str) -> String {
  let digest = format!("{:x}", md5::compute(url.as_bytes()));
  digest[..FINGERPRINT_LEN].to_string()
}

/// 本地图像缓存
///
/// 缓存项以 `<指纹>__<文件名>` 命名，写入后不会失效或被清理，
/// 远端内容变化不会被察觉。
#[derive(Debug, Clone)]
pub struct ContentCache {
  directory: PathBuf,
}

impl ContentCache {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
    }
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  /// 地址对应的缓存文件路径（不访问文件系统）
  pub fn entry_path(&self, url: &str) -> Result<PathBuf, CacheError> {
    let parsed = Url::parse(url).map_err(|source| CacheError::InvalidUrl {
      url: url.to_string(),
      source,
    })?;
    let encoded = parsed.path().rsplit('/').next().unwrap_or("");
    // Url 会把非 ASCII 字符转义，文件名使用解码后的形式
    let basename = urlencoding::decode(encoded)
      .map(|decoded| decoded.replace(['/', '\\'], "_"))
      .unwrap_or_else(|_| encoded.to_string());
    Ok(
      self
        .directory
        .join(format!("{}__{}", fingerprint(url), basename)),
    )
  }

  /// 确保地址内容已在本地，返回本地路径
  pub fn ensure_local<F: Fetch + ?Sized>(
    &self,
    url: &str,
    fetcher: &F,
  ) -> Result<PathBuf, CacheError> {
    let path = self.entry_path(url)?;
    if path.exists() {
      debug!("缓存命中: {} -> {}", url, path.display());
      return Ok(path);
    }

    info!("下载 {} 到 {}", url, path.display());
    let body = fetcher.fetch(url)?;

    std::fs::create_dir_all(&self.directory).map_err(|source| CacheError::Io {
      path: self.directory.clone(),
      source,
    })?;

    // 先写入同目录的临时文件再改名，中断的下载不会留下残缺的缓存项
    let io_error = |source| CacheError::Io {
      path: path.clone(),
      source,
    };
    let mut staging = tempfile::NamedTempFile::new_in(&self.directory).map_err(io_error)?;
    staging.write_all(&body).map_err(io_error)?;
    staging
      .persist(&path)
      .map_err(|persist| io_error(persist.error))?;

    Ok(path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;

  struct CountingFetcher {
    calls: Cell<usize>,
    status: Option<u16>,
  }

  impl CountingFetcher {
    fn ok() -> Self {
      Self {
        calls: Cell::new(0),
        status: None,
      }
    }

    fn failing(status: u16) -> Self {
      Self {
        calls: Cell::new(0),
        status: Some(status),
      }
    }
  }

  impl Fetch for CountingFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
      self.calls.set(self.calls.get() + 1);
      match self.status {
        Some(status) => Err(FetchError::Status {
          url: url.to_string(),
          status,
        }),
        None => Ok(url.as_bytes().to_vec()),
      }
    }
  }

  #[test]
  fn test_fingerprint() {
    // md5("") = d41d8cd98f00b204e9800998ecf8427e
    assert_eq!(fingerprint(""), "d41d8c");
    assert_eq!(fingerprint("https://x/y.jpg").len(), 6);
    assert_eq!(fingerprint("https://x/y.jpg"), fingerprint("https://x/y.jpg"));
    assert_ne!(fingerprint("https://x/y.jpg"), fingerprint("https://x/z.jpg"));
  }

  #[test]
  fn test_entry_path_uses_basename() {
    let cache = ContentCache::new("/cache");
    let url = "https://dagshub.com/api/v1/repos/o/r/raw/abc/dir/img.png";
    let path = cache.entry_path(url).unwrap();
    assert_eq!(
      path,
      PathBuf::from(format!("/cache/{}__img.png", fingerprint(url)))
    );
  }

  #[test]
  fn test_entry_path_ignores_query() {
    let cache = ContentCache::new("/cache");
    let path = cache.entry_path("https://x/a/photo.jpg?token=1").unwrap();
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.ends_with("__photo.jpg"));
  }

  #[test]
  fn test_entry_path_keeps_unicode_basename() {
    let cache = ContentCache::new("/cache");
    let url = "https://x/图片/松鼠.jpg";
    let path = cache.entry_path(url).unwrap();
    assert_eq!(
      path,
      PathBuf::from(format!("/cache/{}__松鼠.jpg", fingerprint(url)))
    );
  }

  #[test]
  fn test_entry_path_never_escapes_directory() {
    let cache = ContentCache::new("/cache");
    let path = cache.entry_path("https://x/a%2F..%2Fb.jpg").unwrap();
    assert_eq!(path.parent(), Some(Path::new("/cache")));
    assert!(path.to_str().unwrap().ends_with("__a_.._b.jpg"));
  }

  #[test]
  fn test_entry_path_rejects_invalid_url() {
    let cache = ContentCache::new("/cache");
    assert!(matches!(
      cache.entry_path("not a url"),
      Err(CacheError::InvalidUrl { .. })
    ));
  }

  #[test]
  fn test_second_call_hits_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ContentCache::new(dir.path().join("lazy"));
    let fetcher = CountingFetcher::ok();

    let first = cache.ensure_local("https://x/y.jpg", &fetcher).unwrap();
    let second = cache.ensure_local("https://x/y.jpg", &fetcher).unwrap();

    assert_eq!(first, second);
    assert_eq!(fetcher.calls.get(), 1);
    assert_eq!(std::fs::read(&first).unwrap(), b"https://x/y.jpg");
  }

  #[test]
  fn test_download_leaves_only_the_entry() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ContentCache::new(dir.path());
    let fetcher = CountingFetcher::ok();

    let path = cache.ensure_local("https://x/y.jpg", &fetcher).unwrap();

    let entries: Vec<PathBuf> = std::fs::read_dir(dir.path())
      .unwrap()
      .map(|entry| entry.unwrap().path())
      .collect();
    assert_eq!(entries, vec![path]);
  }

  #[test]
  fn test_fetch_failure_leaves_no_entry() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ContentCache::new(dir.path());
    let fetcher = CountingFetcher::failing(404);

    let err = cache.ensure_local("https://x/missing.jpg", &fetcher);
    assert!(matches!(
      err,
      Err(CacheError::Fetch(FetchError::Status { status: 404, .. }))
    ));
    assert!(!cache.entry_path("https://x/missing.jpg").unwrap().exists());

    // 失败不会被缓存，下次仍会重新下载
    let _ = cache.ensure_local("https://x/missing.jpg", &fetcher);
    assert_eq!(fetcher.calls.get(), 2);
  }
}
