// 该文件是 Biaozhu （标注） 项目的一部分。
// src/model/mlflow_serving.rs - MLflow 模型服务推理后端
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

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, frame::ImageFrame, http::blocking_client, model::RawDetector};

const INVOCATIONS_PATH: &str = "invocations";

#[derive(Error, Debug)]
pub enum MlflowServingError {
  #[error("模型服务地址必须使用 http 或 https 方案, 实际为 {0}")]
  SchemeMismatch(String),
  #[error("模型服务地址错误: {0}")]
  InvalidUrl(#[from] url::ParseError),
  #[error("模型服务请求失败: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("模型服务返回状态码 {status}: {body}")]
  Status { status: u16, body: String },
}

#[derive(Serialize)]
struct InvocationRequest<'a> {
  inputs: InvocationInputs<'a>,
}

#[derive(Serialize)]
struct InvocationInputs<'a> {
  image: &'a str,
}

#[derive(Deserialize)]
struct InvocationResponse {
  predictions: Vec<Vec<f64>>,
}

pub struct MlflowServingBuilder {
  server: Url,
  timeout: Option<Duration>,
}

impl FromUrl for MlflowServingBuilder {
  type Error = MlflowServingError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if !matches!(url.scheme(), "http" | "https") {
      error!("模型服务地址方案不支持: {}", url.scheme());
      return Err(MlflowServingError::SchemeMismatch(url.scheme().to_string()));
    }

    Ok(MlflowServingBuilder {
      server: url.clone(),
      timeout: None,
    })
  }
}

impl MlflowServingBuilder {
  pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn build(self) -> Result<MlflowServing, MlflowServingError> {
    let invocations = invocations_url(&self.server)?;
    info!("模型服务推理地址: {}", invocations);

    Ok(MlflowServing {
      client: blocking_client(self.timeout)?,
      invocations,
    })
  }
}

fn invocations_url(server: &Url) -> Result<Url, url::ParseError> {
  let mut base = server.clone();
  if !base.path().ends_with('/') {
    let path = format!("{}/", base.path());
    base.set_path(&path);
  }
  base.join(INVOCATIONS_PATH)
}

/// 通过 `/invocations` 接口调用已部署的检测模型
///
/// 请求体为 `{"inputs": {"image": "<base64>"}}`，
/// 响应体为 `{"predictions": [[x, y, w, h, conf, cls], ...]}`。
pub struct MlflowServing {
  client: Client,
  invocations: Url,
}

impl RawDetector for MlflowServing {
  type Error = MlflowServingError;

  fn forward(&self, frame: &ImageFrame) -> Result<Vec<Vec<f64>>, Self::Error> {
    let image = STANDARD.encode(frame.as_ref());
    let request = InvocationRequest {
      inputs: InvocationInputs { image: &image },
    };

    debug!("调用模型服务: {}", self.invocations);
    let response = self
      .client
      .post(self.invocations.clone())
      .json(&request)
      .send()?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().unwrap_or_default();
      error!("模型服务返回状态码 {}: {}", status, body);
      return Err(MlflowServingError::Status {
        status: status.as_u16(),
        body,
      });
    }

    let response: InvocationResponse = response.json()?;
    Ok(response.predictions)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_invocations_url() {
    let url = Url::parse("http://127.0.0.1:5001").unwrap();
    assert_eq!(
      invocations_url(&url).unwrap().as_str(),
      "http://127.0.0.1:5001/invocations"
    );

    let url = Url::parse("https://serving.local/models/squirrel").unwrap();
    assert_eq!(
      invocations_url(&url).unwrap().as_str(),
      "https://serving.local/models/squirrel/invocations"
    );
  }

  #[test]
  fn test_scheme_mismatch() {
    let url = Url::parse("grpc://127.0.0.1:5001").unwrap();
    assert!(matches!(
      MlflowServingBuilder::from_url(&url),
      Err(MlflowServingError::SchemeMismatch(_))
    ));
  }

  #[test]
  fn test_response_shape() {
    let body = r#"{"predictions": [[100.0, 50.0, 40.0, 20.0, 0.9, 0.0]]}"#;
    let response: InvocationResponse = serde_json::from_str(body).unwrap();
    assert_eq!(
      response.predictions,
      vec![vec![100.0, 50.0, 40.0, 20.0, 0.9, 0.0]]
    );
  }

  #[test]
  fn test_forward_posts_base64_image() {
    use crate::http::testing::{client, serve_once};
    use image::{ImageFormat, RgbImage};

    let mut png = std::io::Cursor::new(Vec::new());
    RgbImage::new(4, 2)
      .write_to(&mut png, ImageFormat::Png)
      .unwrap();
    let png = png.into_inner();
    let frame = ImageFrame::from_bytes(png.clone()).unwrap();

    let (base, server) = serve_once(200, r#"{"predictions": [[2.0, 1.0, 2.0, 2.0, 0.5, 0.0]]}"#);
    let serving = MlflowServing {
      client: client(),
      invocations: invocations_url(&Url::parse(&base).unwrap()).unwrap(),
    };

    let rows = serving.forward(&frame).unwrap();
    assert_eq!(rows, vec![vec![2.0, 1.0, 2.0, 2.0, 0.5, 0.0]]);

    let request = server.join().unwrap();
    assert_eq!(request.request_line, "POST /invocations HTTP/1.1");
    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(
      body,
      serde_json::json!({ "inputs": { "image": STANDARD.encode(&png) } })
    );
  }

  #[test]
  fn test_forward_error_status() {
    use crate::http::testing::{client, serve_once};

    let (base, server) = serve_once(503, "warming up");
    let serving = MlflowServing {
      client: client(),
      invocations: invocations_url(&Url::parse(&base).unwrap()).unwrap(),
    };
    let frame = ImageFrame::from_bytes({
      let mut png = std::io::Cursor::new(Vec::new());
      image::RgbImage::new(1, 1)
        .write_to(&mut png, image::ImageFormat::Png)
        .unwrap();
      png.into_inner()
    })
    .unwrap();

    let err = serving.forward(&frame).unwrap_err();
    server.join().unwrap();
    assert!(
      matches!(&err, MlflowServingError::Status { status: 503, body } if body == "warming up"),
      "{:?}",
      err
    );
  }

  #[test]
  fn test_request_shape() {
    let request = InvocationRequest {
      inputs: InvocationInputs { image: "aGk=" },
    };
    assert_eq!(
      serde_json::to_value(&request).unwrap(),
      serde_json::json!({ "inputs": { "image": "aGk=" } })
    );
  }
}
