//! 数据类型定义
//!
//! 与后端 JSON 对应的记录类型。字段名采用后端的 camelCase。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// 顾客
    Customer,
    /// 卖家
    Seller,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Customer => f.write_str("CUSTOMER"),
            Role::Seller => f.write_str("SELLER"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CUSTOMER" => Ok(Role::Customer),
            "SELLER" => Ok(Role::Seller),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// 用户信息（与令牌一同持久化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl UserProfile {
    pub fn is_seller(&self) -> bool {
        self.role == Some(Role::Seller)
    }
}

/// 会话信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
}

impl Session {
    /// 令牌存在即视为已认证
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// 登录请求
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// 注册请求
#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

/// 登录 / 注册响应数据
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user_id: i64,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

impl AuthResponse {
    /// 拆分为令牌和用户信息
    pub fn into_parts(self) -> (String, UserProfile) {
        let user = UserProfile {
            user_id: self.user_id,
            email: self.email,
            name: self.name,
            role: self.role,
        };
        (self.token, user)
    }
}

/// 商品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub rating_count: Option<i64>,
    #[serde(default)]
    pub view_count: Option<i64>,
}

/// 新建商品请求
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// 商品列表查询条件
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub name: Option<String>,
}

/// 推荐响应数据
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationResponse {
    #[serde(default)]
    pub products: Vec<Product>,
}

/// 下单请求
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub product_id: i64,
    pub quantity: u32,
}

/// 订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub product_id: i64,
    /// 商品被删除后后端返回 null
    #[serde(default)]
    pub product_name: Option<String>,
    pub quantity: u32,
    pub total_price: i64,
    #[serde(default)]
    pub order_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// 评论
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: i64,
    pub product_id: i64,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub user_name: Option<String>,
    pub content: String,
    pub rating: u8,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// 新评论
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDraft {
    pub product_id: i64,
    pub order_id: Option<i64>,
    pub content: String,
    pub rating: u8,
}

/// 评论修改内容
#[derive(Debug, Clone, Serialize)]
pub struct ReviewEdit {
    pub content: String,
    pub rating: u8,
}

/// 销售统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesStat {
    pub product_name: String,
    pub total_quantity: i64,
    pub total_sales: i64,
    #[serde(default)]
    pub average_rating: Option<f64>,
}

/// 后端错误响应
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
