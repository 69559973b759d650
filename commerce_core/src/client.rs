//! 商城客户端
//!
//! 页面级数据操作都建立在 `ApiClient` 之上，自身不处理认证与超时。
//! 本地校验失败时直接返回 `Error::Validation`，不发出任何请求。

use crate::error::{Error, Result};
use crate::http::{ApiClient, AuthInterceptor, ClientConfig};
use crate::router::{Navigator, Route};
use crate::session::AuthGate;
use crate::storage::KeyValueStore;
use crate::types::*;
use std::sync::Arc;
use tracing::{info, warn};

/// 评分范围
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// 默认推荐数量
pub const DEFAULT_TOP_N: u32 = 5;

/// 表示"全部分类"的取值，查询时省略该参数
pub const ALL_CATEGORIES: &str = "all";

/// 商城客户端
pub struct ShopClient {
    api: ApiClient,
    gate: Arc<AuthGate>,
    navigator: Arc<Navigator>,
}

impl ShopClient {
    /// 创建客户端，会话从给定存储恢复
    pub fn new(config: ClientConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let gate = Arc::new(AuthGate::restore(store)?);
        let navigator = Arc::new(Navigator::new(gate.clone()));
        let interceptor = AuthInterceptor::new(gate.clone(), navigator.clone());
        let api = ApiClient::new(config, interceptor)?;
        Ok(Self { api, gate, navigator })
    }

    pub fn gate(&self) -> &Arc<AuthGate> {
        &self.gate
    }

    pub fn navigator(&self) -> &Arc<Navigator> {
        &self.navigator
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    // ---- 认证 ----

    /// 用户注册，成功后直接登录并回到首页
    pub async fn signup(&self, email: &str, password: &str, name: &str, role: Role) -> Result<UserProfile> {
        self.ensure_anonymous().await?;
        validate_credentials(email, password)?;
        if name.trim().is_empty() {
            return Err(Error::Validation("name must not be empty".to_string()));
        }
        info!("Signing up user: {}", email);

        let request = SignupRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            role,
        };
        let response: AuthResponse = self.api.post("/api/auth/signup", &request).await?;
        self.establish(response).await
    }

    /// 用户登录，成功后回到首页
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        self.ensure_anonymous().await?;
        validate_credentials(email, password)?;
        info!("Logging in user: {}", email);

        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response: AuthResponse = self.api.post("/api/auth/login", &request).await?;
        self.establish(response).await
    }

    /// 已登录时登录 / 注册视图直接回到首页，不发请求，现有会话保持不变
    async fn ensure_anonymous(&self) -> Result<()> {
        if self.gate.is_authenticated().await {
            self.navigator.open(&Route::Home.path()).await;
            return Err(Error::AlreadyAuthenticated);
        }
        Ok(())
    }

    async fn establish(&self, response: AuthResponse) -> Result<UserProfile> {
        let (token, user) = response.into_parts();
        self.gate.login(user.clone(), token).await?;
        self.navigator.open(&Route::Home.path()).await;
        Ok(user)
    }

    /// 用户登出（仅本地），随后守卫会把当前视图带回登录页
    pub async fn logout(&self) -> Result<()> {
        self.gate.logout().await?;
        self.navigator.refresh().await;
        Ok(())
    }

    // ---- 商品 ----

    /// 商品列表，支持分类和名称过滤
    pub async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let mut query = Vec::new();
        if let Some(category) = filter.category.as_deref() {
            if !category.eq_ignore_ascii_case(ALL_CATEGORIES) && !category.is_empty() {
                query.push(("category", category.to_string()));
            }
        }
        if let Some(name) = filter.name.as_deref() {
            if !name.trim().is_empty() {
                query.push(("name", name.trim().to_string()));
            }
        }
        self.api.get_with_query("/api/products", &query).await
    }

    pub async fn product(&self, id: i64) -> Result<Product> {
        self.api.get(&format!("/api/products/{}", id)).await
    }

    /// 人气商品
    pub async fn popular_products(&self) -> Result<Vec<Product>> {
        self.api.get("/api/products/trending/popular").await
    }

    /// 趋势商品
    pub async fn trending_products(&self) -> Result<Vec<Product>> {
        self.api.get("/api/products/trending/trending").await
    }

    /// 新建商品（管理端点）
    pub async fn create_product(&self, product: &NewProduct) -> Result<Product> {
        if product.name.trim().is_empty() {
            return Err(Error::Validation("product name must not be empty".to_string()));
        }
        if !(product.price.is_finite() && product.price >= 0.0) {
            return Err(Error::Validation("price must be a non-negative number".to_string()));
        }
        self.api.post("/api/products", product).await
    }

    // ---- 推荐 ----

    pub async fn recommendations(&self, top_n: u32) -> Result<Vec<Product>> {
        if top_n == 0 {
            return Err(Error::Validation("topN must be at least 1".to_string()));
        }
        let response: RecommendationResponse = self
            .api
            .get_with_query("/api/recommendations", &[("topN", top_n.to_string())])
            .await?;
        Ok(response.products)
    }

    /// 推荐失败时返回空列表，不影响页面其余部分
    pub async fn recommendations_or_default(&self, top_n: u32) -> Vec<Product> {
        match self.recommendations(top_n).await {
            Ok(products) => products,
            Err(e) => {
                warn!("Recommendations unavailable: {}", e);
                Vec::new()
            }
        }
    }

    // ---- 订单 ----

    pub async fn place_order(&self, product_id: i64, quantity: u32) -> Result<Order> {
        if quantity == 0 {
            return Err(Error::Validation("quantity must be at least 1".to_string()));
        }
        info!("Placing order: product {} x {}", product_id, quantity);
        let request = CreateOrderRequest { product_id, quantity };
        self.api.post("/api/orders", &request).await
    }

    pub async fn my_orders(&self) -> Result<Vec<Order>> {
        self.api.get("/api/orders/my").await
    }

    pub async fn cancel_order(&self, order_id: i64) -> Result<()> {
        info!("Cancelling order {}", order_id);
        self.api.delete(&format!("/api/orders/{}", order_id)).await
    }

    // ---- 评论 ----

    pub async fn reviews(&self) -> Result<Vec<Review>> {
        self.api.get("/api/reviews").await
    }

    pub async fn product_reviews(&self, product_id: i64) -> Result<Vec<Review>> {
        self.api.get(&format!("/api/reviews/product/{}", product_id)).await
    }

    /// 发表评论；必须来自某个订单
    pub async fn create_review(&self, draft: &ReviewDraft) -> Result<Review> {
        if draft.order_id.is_none() {
            return Err(Error::Validation(
                "a review must reference the order it was written for".to_string(),
            ));
        }
        validate_review(&draft.content, draft.rating)?;
        self.api.post("/api/reviews", draft).await
    }

    pub async fn update_review(&self, review_id: i64, edit: &ReviewEdit) -> Result<Review> {
        validate_review(&edit.content, edit.rating)?;
        self.api.put(&format!("/api/reviews/{}", review_id), edit).await
    }

    /// 删除评论；删除他人评论时后端返回错误，状态不变
    pub async fn delete_review(&self, review_id: i64) -> Result<()> {
        self.api.delete(&format!("/api/reviews/{}", review_id)).await
    }

    // ---- 销售统计 ----

    /// 销售统计，仅卖家可用
    pub async fn sales_stats(&self) -> Result<Vec<SalesStat>> {
        let user = self.gate.user().await.ok_or(Error::NotAuthenticated)?;
        if !user.is_seller() {
            return Err(Error::Forbidden("sales statistics are available to sellers only".to_string()));
        }
        let stats: Option<Vec<SalesStat>> = self.api.get("/api/sales/stats").await?;
        Ok(stats.unwrap_or_default())
    }

    /// 健康检查：后端可达即视为正常
    pub async fn health_check(&self) -> Result<bool> {
        match self.api.get::<serde_json::Value>("/api/products/trending/popular").await {
            Ok(_) => Ok(true),
            Err(Error::Api { .. }) | Err(Error::Unauthorized) => Ok(true),
            Err(Error::Network(_)) | Err(Error::Timeout(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn validate_credentials(email: &str, password: &str) -> Result<()> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(Error::Validation("a valid email is required".to_string()));
    }
    if password.is_empty() {
        return Err(Error::Validation("password must not be empty".to_string()));
    }
    Ok(())
}

/// 评论校验：内容非空，评分在 1..=5
pub fn validate_review(content: &str, rating: u8) -> Result<()> {
    if content.trim().is_empty() {
        return Err(Error::Validation("review content must not be empty".to_string()));
    }
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(Error::Validation(format!(
            "rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )));
    }
    Ok(())
}

/// 按分类在本地过滤商品；`all` 或空值返回全部
pub fn filter_by_category<'a>(products: &'a [Product], category: &str) -> Vec<&'a Product> {
    if category.is_empty() || category.eq_ignore_ascii_case(ALL_CATEGORIES) {
        return products.iter().collect();
    }
    products
        .iter()
        .filter(|p| p.category.as_deref() == Some(category))
        .collect()
}

/// 订单总金额
pub fn order_total(orders: &[Order]) -> i64 {
    orders.iter().map(|o| o.total_price).sum()
}

/// 总销售额
pub fn total_revenue(stats: &[SalesStat]) -> i64 {
    stats.iter().map(|s| s.total_sales).sum()
}
