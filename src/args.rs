// 该文件是 Biaozhu （标注） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use biaozhu::{annotation::LabelConfig, config::RemoteArgs};
use clap::Parser;
use url::Url;

/// Biaozhu 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 任务列表 JSON 文件，`-` 表示标准输入
  #[arg(long, value_name = "FILE", default_value = "-")]
  pub tasks: PathBuf,

  #[command(flatten)]
  pub remote: RemoteArgs,

  /// 模型注册表地址
  #[arg(long, env = "MLFLOW_TRACKING_URI", value_name = "URL")]
  pub tracking_uri: Option<Url>,

  /// 注册的模型名
  #[arg(
    long,
    env = "BIAOZHU_MODEL_NAME",
    default_value = "SquirrelDetector",
    value_name = "NAME"
  )]
  pub model_name: String,

  /// 直接指定模型版本，跳过注册表查询
  #[arg(long, env = "BIAOZHU_MODEL_VERSION", value_name = "VERSION")]
  pub model_version: Option<String>,

  /// 模型推理服务地址
  #[arg(long, env = "BIAOZHU_MODEL_SERVER", value_name = "URL")]
  pub model_server: Url,

  /// 结果发布地址（http(s):// 或 folder://），缺省为仓库的标注存储
  #[arg(long, env = "BIAOZHU_PUBLISH", value_name = "URL")]
  pub publish: Option<Url>,

  /// 标注配置中的控件名
  #[arg(long, default_value = "label", value_name = "NAME")]
  pub from_name: String,

  /// 标注配置中的图像对象名
  #[arg(long, default_value = "image", value_name = "NAME")]
  pub to_name: String,

  /// 标签表，按类别索引顺序
  #[arg(
    long,
    value_delimiter = ',',
    default_value = "squirrel",
    value_name = "LABELS"
  )]
  pub labels: Vec<String>,
}

impl Args {
  pub fn label_config(&self) -> LabelConfig {
    LabelConfig {
      from_name: self.from_name.clone(),
      to_name: self.to_name.clone(),
      labels: self.labels.clone(),
    }
  }
}
