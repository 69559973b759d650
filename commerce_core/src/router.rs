//! 路由表与路由守卫
//!
//! 受保护的视图只在已登录时渲染，否则重定向到 `/login`；
//! `/login`、`/signup` 在已登录时直接回到首页，避免重复认证。

use crate::session::AuthGate;
use crate::types::Role;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// 视图
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Signup,
    Home,
    Products,
    Orders,
    SalesStats,
    /// `/reviews` 与 `/review-management` 指向同一视图
    Reviews {
        product_id: Option<i64>,
        order_id: Option<i64>,
    },
}

/// 守卫求值结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    Render(Route),
    Redirect(Route),
}

impl Route {
    /// 解析路径；未知路径返回 `None`
    pub fn parse(path: &str) -> Option<Route> {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };
        let path = match path.trim_end_matches('/') {
            "" => "/",
            p => p,
        };

        match path {
            "/login" => Some(Route::Login),
            "/signup" => Some(Route::Signup),
            "/" => Some(Route::Home),
            "/products" => Some(Route::Products),
            "/orders" => Some(Route::Orders),
            "/sales-stats" => Some(Route::SalesStats),
            "/reviews" | "/review-management" => {
                let mut product_id = None;
                let mut order_id = None;
                for pair in query.unwrap_or("").split('&') {
                    match pair.split_once('=') {
                        Some(("productId", v)) => product_id = v.parse().ok(),
                        Some(("orderId", v)) => order_id = v.parse().ok(),
                        _ => {}
                    }
                }
                Some(Route::Reviews { product_id, order_id })
            }
            _ => None,
        }
    }

    /// 规范路径
    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Signup => "/signup".to_string(),
            Route::Home => "/".to_string(),
            Route::Products => "/products".to_string(),
            Route::Orders => "/orders".to_string(),
            Route::SalesStats => "/sales-stats".to_string(),
            Route::Reviews { product_id, order_id } => {
                let mut params = Vec::new();
                if let Some(id) = product_id {
                    params.push(format!("productId={}", id));
                }
                if let Some(id) = order_id {
                    params.push(format!("orderId={}", id));
                }
                if params.is_empty() {
                    "/review-management".to_string()
                } else {
                    format!("/review-management?{}", params.join("&"))
                }
            }
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::Login | Route::Signup)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// 对单个路由求值守卫
pub fn guard(route: &Route, authenticated: bool, role: Option<Role>) -> Guard {
    match route {
        Route::Login | Route::Signup if authenticated => Guard::Redirect(Route::Home),
        r if r.is_protected() && !authenticated => Guard::Redirect(Route::Login),
        Route::SalesStats if role != Some(Role::Seller) => Guard::Redirect(Route::Home),
        r => Guard::Render(r.clone()),
    }
}

/// 解析路径并沿重定向链走到最终渲染的视图
pub fn resolve(path: &str, authenticated: bool, role: Option<Role>) -> Route {
    // 通配路由回到首页
    let mut route = Route::parse(path).unwrap_or(Route::Home);
    // 限制跳数，防止守卫之间互相重定向
    for _ in 0..4 {
        match guard(&route, authenticated, role) {
            Guard::Render(r) => return r,
            Guard::Redirect(next) => route = next,
        }
    }
    route
}

/// 保留的导航记录条数
pub const HISTORY_LIMIT: usize = 64;

struct Location {
    current: Route,
    history: VecDeque<Route>,
}

impl Location {
    fn visit(&mut self, route: Route) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(route.clone());
        self.current = route;
    }
}

/// 导航器：持有当前位置，所有跳转都经过守卫
pub struct Navigator {
    gate: Arc<AuthGate>,
    location: Mutex<Location>,
}

impl Navigator {
    pub fn new(gate: Arc<AuthGate>) -> Self {
        let authenticated = *gate.subscribe().borrow();
        let current = if authenticated { Route::Home } else { Route::Login };
        Self {
            gate,
            location: Mutex::new(Location {
                current,
                history: VecDeque::new(),
            }),
        }
    }

    /// 打开路径，返回实际渲染的视图
    pub async fn open(&self, path: &str) -> Route {
        let authenticated = self.gate.is_authenticated().await;
        let role = self.gate.user().await.and_then(|u| u.role);
        let landed = resolve(path, authenticated, role);

        let mut location = self.location.lock().await;
        if landed.path() != path {
            debug!("Redirected {} -> {}", path, landed);
        }
        location.visit(landed.clone());
        landed
    }

    /// 会话变化后重新对当前视图求值
    pub async fn refresh(&self) -> Route {
        let path = self.current().await.path();
        self.open(&path).await
    }

    /// 跳转到登录页；已在登录页时不做任何事
    pub async fn redirect_to_login(&self) -> bool {
        let mut location = self.location.lock().await;
        if location.current == Route::Login {
            return false;
        }
        info!("Redirecting {} -> /login", location.current);
        location.visit(Route::Login);
        true
    }

    pub async fn current(&self) -> Route {
        self.location.lock().await.current.clone()
    }

    /// 最近到达过的视图，最多 `HISTORY_LIMIT` 条
    pub async fn history(&self) -> Vec<Route> {
        self.location.lock().await.history.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::UserProfile;

    #[test]
    fn test_parse_routes() {
        assert_eq!(Route::parse("/"), Some(Route::Home));
        assert_eq!(Route::parse("/orders/"), Some(Route::Orders));
        assert_eq!(Route::parse("/nope"), None);
        assert_eq!(
            Route::parse("/review-management?productId=3&orderId=9"),
            Some(Route::Reviews {
                product_id: Some(3),
                order_id: Some(9)
            })
        );
        assert_eq!(
            Route::parse("/reviews?productId=undefined"),
            Some(Route::Reviews {
                product_id: None,
                order_id: None
            })
        );
    }

    #[test]
    fn test_path_round_trips_through_parse() {
        let route = Route::Reviews {
            product_id: Some(1),
            order_id: None,
        };
        assert_eq!(Route::parse(&route.path()), Some(route));
    }

    #[test]
    fn test_protected_route_redirects_when_anonymous() {
        assert_eq!(guard(&Route::Orders, false, None), Guard::Redirect(Route::Login));
        assert_eq!(resolve("/orders", false, None), Route::Login);
    }

    #[test]
    fn test_login_redirects_home_when_authenticated() {
        assert_eq!(resolve("/login", true, None), Route::Home);
        assert_eq!(resolve("/signup", true, None), Route::Home);
        assert_eq!(resolve("/login", false, None), Route::Login);
    }

    #[test]
    fn test_sales_stats_is_seller_only() {
        assert_eq!(resolve("/sales-stats", true, Some(Role::Customer)), Route::Home);
        assert_eq!(resolve("/sales-stats", true, Some(Role::Seller)), Route::SalesStats);
        assert_eq!(resolve("/sales-stats", false, Some(Role::Seller)), Route::Login);
    }

    #[test]
    fn test_unknown_path_goes_home_through_guard() {
        assert_eq!(resolve("/whatever", true, None), Route::Home);
        assert_eq!(resolve("/whatever", false, None), Route::Login);
    }

    #[tokio::test]
    async fn test_navigator_follows_session() {
        let gate = Arc::new(AuthGate::restore(Arc::new(MemoryStore::new())).unwrap());
        let nav = Navigator::new(gate.clone());
        assert_eq!(nav.current().await, Route::Login);
        assert_eq!(nav.open("/orders").await, Route::Login);

        let user = UserProfile {
            user_id: 1,
            email: "a@b.com".to_string(),
            name: "A".to_string(),
            role: None,
        };
        gate.login(user, "T".to_string()).await.unwrap();
        assert_eq!(nav.refresh().await, Route::Home);
        assert_eq!(nav.open("/orders").await, Route::Orders);

        assert!(nav.redirect_to_login().await);
        assert!(!nav.redirect_to_login().await);
        assert_eq!(
            nav.history().await,
            vec![Route::Login, Route::Home, Route::Orders, Route::Login]
        );
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let gate = Arc::new(AuthGate::restore(Arc::new(MemoryStore::new())).unwrap());
        let nav = Navigator::new(gate);
        for _ in 0..HISTORY_LIMIT + 10 {
            nav.open("/signup").await;
        }
        nav.open("/login").await;

        let history = nav.history().await;
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.last(), Some(&Route::Login));
        assert_eq!(nav.current().await, Route::Login);
    }
}
