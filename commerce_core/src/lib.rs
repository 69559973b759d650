//! 商城客户端核心库
//!
//! 提供电商后端的客户端实现，包括：
//! - 会话与认证网关（令牌持久化、登录状态推导）
//! - 路由守卫（受保护视图、登录页回跳）
//! - 统一的 API 请求通道（超时、Bearer 令牌、401 拦截）
//! - 商品、订单、评论、推荐、销售统计等页面级操作

pub mod client;
pub mod error;
pub mod http;
pub mod router;
pub mod session;
pub mod storage;
pub mod types;

pub use client::ShopClient;
pub use error::{Error, Result};
pub use http::{ApiClient, AuthInterceptor, ClientConfig};
pub use router::{Navigator, Route};
pub use session::AuthGate;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use types::*;
