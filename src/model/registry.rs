// 该文件是 Biaozhu （标注） 项目的一部分。
// src/model/registry.rs - 模型注册表查询
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

use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::http::Credentials;

const LATEST_VERSIONS_PATH: &str = "api/2.0/mlflow/registered-models/get-latest-versions";

#[derive(Error, Debug)]
pub enum RegistryError {
  #[error("注册表请求失败: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("注册表返回状态码 {status}: {body}")]
  Status { status: u16, body: String },
  #[error("注册表响应无法解析: {0}")]
  InvalidResponse(#[from] serde_json::Error),
  #[error("模型 {0} 没有已注册的版本")]
  NoVersions(String),
}

/// 已注册模型的名称与版本，显示为 `<name>:<version>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelVersion {
  pub name: String,
  pub version: String,
}

impl fmt::Display for ModelVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.name, self.version)
  }
}

#[derive(Deserialize)]
struct LatestVersionsResponse {
  #[serde(default)]
  model_versions: Vec<RegisteredVersion>,
}

#[derive(Deserialize)]
struct RegisteredVersion {
  version: String,
}

/// MLflow 兼容的模型注册表客户端
pub struct ModelRegistry {
  client: Client,
  tracking_uri: Url,
  credentials: Option<Credentials>,
}

impl ModelRegistry {
  pub fn new(client: Client, tracking_uri: Url, credentials: Option<Credentials>) -> Self {
    Self {
      client,
      tracking_uri,
      credentials,
    }
  }

  fn latest_versions_url(&self, name: &str) -> String {
    format!(
      "{}/{}?name={}",
      self.tracking_uri.as_str().trim_end_matches('/'),
      LATEST_VERSIONS_PATH,
      urlencoding::encode(name)
    )
  }

  /// 查询模型的最新版本，取注册表返回的第一项
  pub fn latest_version(&self, name: &str) -> Result<ModelVersion, RegistryError> {
    let url = self.latest_versions_url(name);
    let mut request = self.client.get(&url);
    if let Some(credentials) = &self.credentials {
      request = credentials.authorize(request);
    }

    let response = request.send()?;
    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
      error!("查询模型 {} 版本失败，状态码 {}", name, status);
      return Err(RegistryError::Status {
        status: status.as_u16(),
        body,
      });
    }

    let version = parse_latest_version(name, &body)?;
    info!("模型版本: {}", version);
    Ok(version)
  }
}

fn parse_latest_version(name: &str, body: &str) -> Result<ModelVersion, RegistryError> {
  let response: LatestVersionsResponse = serde_json::from_str(body)?;
  response
    .model_versions
    .into_iter()
    .next()
    .map(|registered| ModelVersion {
      name: name.to_string(),
      version: registered.version,
    })
    .ok_or_else(|| RegistryError::NoVersions(name.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_first_version() {
    let body = r#"{
      "model_versions": [
        {"name": "SquirrelDetector", "version": "7", "current_stage": "Production"},
        {"name": "SquirrelDetector", "version": "8", "current_stage": "None"}
      ]
    }"#;
    let version = parse_latest_version("SquirrelDetector", body).unwrap();
    assert_eq!(version.to_string(), "SquirrelDetector:7");
  }

  #[test]
  fn test_parse_without_versions() {
    assert!(matches!(
      parse_latest_version("SquirrelDetector", "{}"),
      Err(RegistryError::NoVersions(_))
    ));
  }

  #[test]
  fn test_latest_version_round_trip() {
    use crate::http::testing::{client, serve_once};

    let (base, server) = serve_once(
      200,
      r#"{"model_versions": [{"name": "Squirrel Detector", "version": "4"}]}"#,
    );
    let registry = ModelRegistry::new(
      client(),
      Url::parse(&format!("{}/o/r.mlflow", base)).unwrap(),
      Some(Credentials::new("user", "token")),
    );

    let version = registry.latest_version("Squirrel Detector").unwrap();
    assert_eq!(version.to_string(), "Squirrel Detector:4");

    let request = server.join().unwrap();
    assert_eq!(
      request.request_line,
      "GET /o/r.mlflow/api/2.0/mlflow/registered-models/get-latest-versions?name=Squirrel%20Detector HTTP/1.1"
    );
    assert_eq!(request.header("authorization"), Some("Basic dXNlcjp0b2tlbg=="));
  }

  #[test]
  fn test_latest_version_error_status() {
    use crate::http::testing::{client, serve_once};

    let (base, server) = serve_once(404, r#"{"error_code": "RESOURCE_DOES_NOT_EXIST"}"#);
    let registry = ModelRegistry::new(client(), Url::parse(&base).unwrap(), None);

    let err = registry.latest_version("Missing").unwrap_err();
    let request = server.join().unwrap();
    assert!(matches!(err, RegistryError::Status { status: 404, .. }), "{:?}", err);
    assert_eq!(request.header("authorization"), None);
  }

  #[test]
  fn test_latest_versions_url_encodes_name() {
    let registry = ModelRegistry::new(
      Client::new(),
      Url::parse("https://dagshub.com/o/r.mlflow").unwrap(),
      None,
    );
    assert_eq!(
      registry.latest_versions_url("Squirrel Detector"),
      "https://dagshub.com/o/r.mlflow/api/2.0/mlflow/registered-models/get-latest-versions?name=Squirrel%20Detector"
    );
  }
}
