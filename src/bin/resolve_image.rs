// 该文件是 Biaozhu （标注） 项目的一部分。
// src/bin/resolve_image.rs - 解析并缓存图像引用
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

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use biaozhu::{
  cache::ContentCache,
  config::RemoteArgs,
  fetch::HttpFetcher,
  http::blocking_client,
  reference::Resolver,
};

/// 解析图像引用并下载到本地缓存，可用于预热缓存
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub remote: RemoteArgs,

  /// 只解析地址，不下载
  #[arg(long)]
  pub resolve_only: bool,

  /// 图像引用（http(s):// 或 repo://<commit>/<path>）
  #[arg(required = true, value_name = "IMAGE")]
  pub images: Vec<String>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();
  let settings = args.remote.settings()?;

  let resolver = Resolver::new(settings.identity.clone());
  let cache = ContentCache::new(&settings.cache_dir);
  let fetcher = HttpFetcher::new(
    blocking_client(settings.http_timeout)?,
    settings.credentials.clone(),
  );

  info!("缓存目录: {}", cache.directory().display());

  let mut failures = 0usize;
  for image in &args.images {
    let url = match resolver.resolve(image) {
      Ok(url) => url,
      Err(e) => {
        error!("{}", e);
        failures += 1;
        continue;
      }
    };

    if args.resolve_only {
      println!("{}\t{}", image, url);
      continue;
    }

    match cache.ensure_local(&url, &fetcher) {
      Ok(path) => println!("{}\t{}", image, path.display()),
      Err(e) => {
        error!("缓存 {} 失败: {}", image, e);
        failures += 1;
      }
    }
  }

  if failures > 0 {
    anyhow::bail!("{} 个图像引用处理失败", failures);
  }

  Ok(())
}
