// 该文件是 Biaozhu （标注） 项目的一部分。
// src/main.rs - 批量预测主程序
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

mod args;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use biaozhu::{
  FromUrl,
  cache::ContentCache,
  fetch::HttpFetcher,
  http::blocking_client,
  model::{Detector, MlflowServingBuilder, ModelRegistry},
  output::OutputBuilder,
  reference::Resolver,
  task::{BatchDriver, LabelTask, TaskBatch, TaskStatus},
};

fn read_tasks(path: &Path) -> Result<Vec<LabelTask>> {
  let content = if path == Path::new("-") {
    let mut content = String::new();
    std::io::stdin()
      .read_to_string(&mut content)
      .context("无法读取标准输入")?;
    content
  } else {
    std::fs::read_to_string(path)
      .with_context(|| format!("无法读取任务文件: {}", path.display()))?
  };

  let batch: TaskBatch = serde_json::from_str(&content).context("任务列表格式错误")?;
  Ok(batch.into_tasks())
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();
  let settings = args.remote.settings()?;

  info!("仓库: {}/{}", settings.identity.owner, settings.identity.repo);
  info!("缓存目录: {}", settings.cache_dir.display());
  info!("模型服务: {}", args.model_server);

  let tasks = read_tasks(&args.tasks)?;
  let client = blocking_client(settings.http_timeout)?;

  let model_version = match &args.model_version {
    Some(version) => format!("{}:{}", args.model_name, version),
    None => {
      let tracking_uri = args
        .tracking_uri
        .clone()
        .context("未指定 --model-version 时需要设置 MLFLOW_TRACKING_URI")?;
      ModelRegistry::new(
        client.clone(),
        tracking_uri,
        Some(settings.credentials.clone()),
      )
      .latest_version(&args.model_name)?
      .to_string()
    }
  };
  info!("模型版本: {}", model_version);

  let detector = Detector::new(
    MlflowServingBuilder::from_url(&args.model_server)?
      .timeout(settings.http_timeout)
      .build()?,
  );

  let publish_url = match &args.publish {
    Some(url) => url.clone(),
    None => Url::parse(&settings.identity.predictions_url())?,
  };
  info!("结果发布到: {}", publish_url);
  let publisher = OutputBuilder::from_url(&publish_url)?
    .credentials(settings.credentials.clone())
    .timeout(settings.http_timeout)
    .build()?;

  let driver = BatchDriver::new(
    Resolver::new(settings.identity.clone()),
    ContentCache::new(&settings.cache_dir),
    HttpFetcher::new(client, settings.credentials.clone()),
    detector,
    publisher,
    args.label_config(),
    model_version,
  );

  let report = driver.run_batch(&tasks);

  println!();
  for task in &report.reports {
    match &task.status {
      TaskStatus::Published { annotations } => {
        println!("  - 任务 {}: 已提交 {} 个标注", task.task, annotations)
      }
      TaskStatus::Rejected {
        annotations,
        status,
      } => println!(
        "  - 任务 {}: {} 个标注被拒绝 (HTTP {})",
        task.task, annotations, status
      ),
      TaskStatus::Failed { stage, error } => {
        println!("  - 任务 {}: 在 {} 阶段失败: {}", task.task, stage, error)
      }
    }
  }
  println!();
  println!("总任务数: {}", report.len());
  println!("已提交: {}", report.published());
  println!("被拒绝: {}", report.rejected());
  println!("失败: {}", report.failed());

  Ok(())
}
