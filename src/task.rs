// 该文件是 Biaozhu （标注） 项目的一部分。
// src/task.rs - 标注任务与批处理
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

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  annotation::{LabelConfig, NormalizeError, ResultEnvelope, normalize},
  cache::{CacheError, ContentCache},
  fetch::Fetch,
  frame::{FrameError, ImageFrame},
  model::{DetectError, DetectResult, Model},
  output::{Publish, PublishOutcome},
  reference::{ResolveError, Resolver},
};

/// 任务标识，原样回传给标注存储
///
/// 数字标识保留 JSON 中的原始数值（负数、小数也不会让整批解析失败）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
  Number(serde_json::Number),
  Text(String),
}

impl fmt::Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TaskId::Number(id) => write!(f, "{}", id),
      TaskId::Text(id) => f.write_str(id),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskData {
  pub image: String,
}

/// 标注队列中的一个任务，其余字段（历史标注等）忽略
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabelTask {
  pub id: TaskId,
  pub data: TaskData,
}

/// 任务列表，接受 `[...]` 或 `{"tasks": [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TaskBatch {
  List(Vec<LabelTask>),
  Wrapped { tasks: Vec<LabelTask> },
}

impl TaskBatch {
  pub fn into_tasks(self) -> Vec<LabelTask> {
    match self {
      TaskBatch::List(tasks) | TaskBatch::Wrapped { tasks } => tasks,
    }
  }
}

/// 单个任务的处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Pending,
  Resolving,
  Fetching,
  Detecting,
  Normalizing,
  Publishing,
  Done,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Stage::Pending => "pending",
      Stage::Resolving => "resolving",
      Stage::Fetching => "fetching",
      Stage::Detecting => "detecting",
      Stage::Normalizing => "normalizing",
      Stage::Publishing => "publishing",
      Stage::Done => "done",
    };
    f.write_str(name)
  }
}

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("解析错误: {0}")]
  Resolve(#[from] ResolveError),
  #[error("缓存错误: {0}")]
  Cache(#[from] CacheError),
  #[error("图像错误: {0}")]
  Frame(#[from] FrameError),
  #[error("检测错误: {0}")]
  Detect(#[from] DetectError),
  #[error("归一化错误: {0}")]
  Normalize(#[from] NormalizeError),
  #[error("发布错误: {0}")]
  Publish(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TaskError {
  /// 出错时所处的阶段
  pub fn stage(&self) -> Stage {
    match self {
      TaskError::Resolve(_) => Stage::Resolving,
      TaskError::Cache(_) | TaskError::Frame(_) => Stage::Fetching,
      TaskError::Detect(_) => Stage::Detecting,
      TaskError::Normalize(_) => Stage::Normalizing,
      TaskError::Publish(_) => Stage::Publishing,
    }
  }
}

#[derive(Debug)]
pub enum TaskStatus {
  /// 结果已被标注存储接受
  Published { annotations: usize },
  /// 标注存储返回非 2xx，记录后继续
  Rejected { annotations: usize, status: u16 },
  Failed { stage: Stage, error: TaskError },
}

#[derive(Debug)]
pub struct TaskReport {
  pub task: TaskId,
  pub status: TaskStatus,
}

#[derive(Debug, Default)]
pub struct BatchReport {
  pub reports: Vec<TaskReport>,
}

impl BatchReport {
  pub fn len(&self) -> usize {
    self.reports.len()
  }

  pub fn is_empty(&self) -> bool {
    self.reports.is_empty()
  }

  pub fn published(&self) -> usize {
    self.count(|status| matches!(status, TaskStatus::Published { .. }))
  }

  pub fn rejected(&self) -> usize {
    self.count(|status| matches!(status, TaskStatus::Rejected { .. }))
  }

  pub fn failed(&self) -> usize {
    self.count(|status| matches!(status, TaskStatus::Failed { .. }))
  }

  fn count(&self, predicate: impl Fn(&TaskStatus) -> bool) -> usize {
    self
      .reports
      .iter()
      .filter(|report| predicate(&report.status))
      .count()
  }
}

/// 逐个处理任务：解析 → 下载 → 检测 → 归一化 → 发布
///
/// 单个任务失败只终止该任务，批次总会跑完。
pub struct BatchDriver<F, M, P> {
  resolver: Resolver,
  cache: ContentCache,
  fetcher: F,
  model: M,
  publisher: P,
  labels: LabelConfig,
  model_version: String,
}

impl<F, M, P> BatchDriver<F, M, P>
where
  F: Fetch,
  M: Model<Input = ImageFrame, Output = DetectResult, Error = DetectError>,
  P: Publish,
  P::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn new(
    resolver: Resolver,
    cache: ContentCache,
    fetcher: F,
    model: M,
    publisher: P,
    labels: LabelConfig,
    model_version: impl Into<String>,
  ) -> Self {
    Self {
      resolver,
      cache,
      fetcher,
      model,
      publisher,
      labels,
      model_version: model_version.into(),
    }
  }

  pub fn model_version(&self) -> &str {
    &self.model_version
  }

  fn enter(&self, task: &LabelTask, stage: Stage) {
    debug!("任务 {} 进入阶段 {}", task.id, stage);
  }

  fn run_task(&self, task: &LabelTask) -> Result<(usize, PublishOutcome), TaskError> {
    self.enter(task, Stage::Resolving);
    let url = self.resolver.resolve(&task.data.image)?;

    self.enter(task, Stage::Fetching);
    let path = self.cache.ensure_local(&url, &self.fetcher)?;
    let frame = ImageFrame::open(&path)?;

    self.enter(task, Stage::Detecting);
    let now = Instant::now();
    let detections = self.model.infer(&frame)?;
    debug!("任务 {} 推理完成，耗时: {:.2?}", task.id, now.elapsed());

    self.enter(task, Stage::Normalizing);
    let (annotations, score) = normalize(
      &detections.items,
      frame.width(),
      frame.height(),
      &self.labels,
    )?;
    let count = annotations.len();
    let envelope = ResultEnvelope::new(annotations, score, &self.model_version, task.id.clone());

    self.enter(task, Stage::Publishing);
    let outcome = self
      .publisher
      .publish(&envelope)
      .map_err(|e| TaskError::Publish(Box::new(e)))?;

    self.enter(task, Stage::Done);
    Ok((count, outcome))
  }

  /// 处理一个任务并给出结果状态，不会返回错误
  pub fn process(&self, task: &LabelTask) -> TaskReport {
    let status = match self.run_task(task) {
      Ok((annotations, PublishOutcome::Accepted)) => {
        info!("任务 {} 完成，提交 {} 个标注", task.id, annotations);
        TaskStatus::Published { annotations }
      }
      Ok((annotations, PublishOutcome::Rejected { status })) => {
        warn!("任务 {} 的结果未被接受，状态码 {}", task.id, status);
        TaskStatus::Rejected {
          annotations,
          status,
        }
      }
      Err(error) => {
        let stage = error.stage();
        warn!("任务 {} 在阶段 {} 失败: {}", task.id, stage, error);
        TaskStatus::Failed { stage, error }
      }
    };

    TaskReport {
      task: task.id.clone(),
      status,
    }
  }

  pub fn run_batch(&self, tasks: &[LabelTask]) -> BatchReport {
    info!("开始处理 {} 个任务", tasks.len());
    let reports = tasks.iter().map(|task| self.process(task)).collect();
    let report = BatchReport { reports };
    info!(
      "批次完成: 共 {} 个, 已提交 {} 个, 被拒绝 {} 个, 失败 {} 个",
      report.len(),
      report.published(),
      report.rejected(),
      report.failed()
    );
    report
  }

  /// 标注后端的预测入口：结果只通过发布对外可见，因此总是返回空列表
  pub fn predict(&self, tasks: &[LabelTask]) -> Vec<serde_json::Value> {
    self.run_batch(tasks);
    Vec::new()
  }
}
