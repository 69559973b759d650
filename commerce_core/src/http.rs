//! 后端 API 请求通道
//!
//! 所有请求都从这里发出：统一的基础地址、超时、JSON 内容类型，
//! 发送前附加 Bearer 令牌，收到 401 时集中清除会话并跳转登录页。

use crate::error::{Error, Result};
use crate::router::Navigator;
use crate::session::{AuthGate, Expiry};
use crate::types::ErrorBody;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// 基础地址环境变量
pub const API_URL_ENV: &str = "COMMERCE_API_URL";
/// 超时（毫秒）环境变量
pub const API_TIMEOUT_ENV: &str = "COMMERCE_API_TIMEOUT_MS";

/// 客户端配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 服务器 URL
    pub server_url: String,
    /// 请求超时（毫秒）
    pub timeout_ms: u64,
    /// 是否验证 TLS 证书
    pub verify_tls: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            timeout_ms: 5000,
            verify_tls: true,
        }
    }
}

impl ClientConfig {
    /// 默认配置，允许环境变量覆盖
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.server_url = url.trim().to_string();
            }
        }
        if let Ok(raw) = std::env::var(API_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.timeout_ms = ms,
                _ => warn!("Ignoring invalid {}={:?}", API_TIMEOUT_ENV, raw),
            }
        }
        config
    }

    /// 拼接完整 URL
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// 认证拦截器
///
/// 不依赖网络即可单独测试：`before` 决定请求头，`after` 处理响应状态。
#[derive(Clone)]
pub struct AuthInterceptor {
    gate: Arc<AuthGate>,
    navigator: Arc<Navigator>,
}

impl AuthInterceptor {
    pub fn new(gate: Arc<AuthGate>, navigator: Arc<Navigator>) -> Self {
        Self { gate, navigator }
    }

    /// 发送前：有令牌则附加 Authorization 头，返回本次携带的令牌
    pub async fn before(&self, builder: RequestBuilder) -> (RequestBuilder, Option<String>) {
        match self.gate.token().await {
            Some(token) => (builder.bearer_auth(&token), Some(token)),
            None => (builder, None),
        }
    }

    /// 收到响应后：401 清除会话并跳转登录页，其余状态原样放行
    pub async fn after(&self, status: StatusCode, sent_token: Option<&str>) -> Result<()> {
        if status != StatusCode::UNAUTHORIZED {
            return Ok(());
        }

        match self.gate.expire(sent_token).await? {
            Expiry::Superseded => {
                debug!("Ignoring 401 for a superseded session");
            }
            Expiry::Cleared | Expiry::AlreadyAnonymous => {
                self.navigator.redirect_to_login().await;
            }
        }
        Err(Error::Unauthorized)
    }
}

/// API 客户端
#[derive(Clone)]
pub struct ApiClient {
    config: ClientConfig,
    http_client: Client,
    interceptor: AuthInterceptor,
}

impl ApiClient {
    pub fn new(config: ClientConfig, interceptor: AuthInterceptor) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.timeout_ms))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
            interceptor,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// 发送请求并经过拦截器，返回成功的响应
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Response> {
        let url = self.config.url(path);
        debug!("{} {}", method, url);

        let mut builder = self.http_client.request(method, &url);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let (builder, sent_token) = self.interceptor.before(builder).await;
        let response = builder.send().await.map_err(|e| self.map_send_error(&url, e))?;

        let status = response.status();
        self.interceptor.after(status, sent_token.as_deref()).await?;

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| {
                    if text.trim().is_empty() {
                        status.canonical_reason().unwrap_or("request failed").to_string()
                    } else {
                        text
                    }
                });
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    fn map_send_error(&self, url: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            warn!("Request to {} timed out", url);
            Error::Timeout(self.config.timeout_ms)
        } else {
            Error::Network(format!("Failed to connect to {}: {}", url, e))
        }
    }

    /// 读取 JSON 响应体；超时同样适用于读取阶段
    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let url = response.url().to_string();
        let bytes = response.bytes().await.map_err(|e| self.map_send_error(&url, e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Encoding(format!("Failed to parse response from {}: {}", url, e)))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_with_query(path, &[]).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.send::<()>(Method::GET, path, query, None).await?;
        self.decode(response).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.send(Method::POST, path, &[], Some(body)).await?;
        self.decode(response).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.send(Method::PUT, path, &[], Some(body)).await?;
        self.decode(response).await
    }

    /// DELETE，忽略响应体
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send::<()>(Method::DELETE, path, &[], None).await?;
        Ok(())
    }
}
