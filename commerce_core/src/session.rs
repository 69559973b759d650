//! 会话与认证网关
//!
//! `AuthGate` 是"当前是否已登录"的唯一来源：
//! - 令牌与用户信息同时写入持久化存储和内存
//! - `is_authenticated` 每次都由令牌是否存在推导
//! - 状态只有 Anonymous / Authenticated 两种，只能经由 `login`、`logout`、`expire` 切换

use crate::error::Result;
use crate::storage::{KeyValueStore, TOKEN_KEY, USER_KEY};
use crate::types::{Session, UserProfile};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

/// 后端认证失败时的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// 会话被本次失败清除
    Cleared,
    /// 当前本就处于未登录状态
    AlreadyAnonymous,
    /// 失败请求携带的是旧令牌，当前会话保持不变
    Superseded,
}

/// 认证网关
pub struct AuthGate {
    store: Arc<dyn KeyValueStore>,
    session: RwLock<Session>,
    authenticated: watch::Sender<bool>,
}

impl AuthGate {
    /// 从持久化存储恢复会话
    pub fn restore(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let token = store.get(TOKEN_KEY)?;
        let user = match store.get(USER_KEY)? {
            Some(raw) => match serde_json::from_str::<UserProfile>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!("Ignoring unreadable stored user profile: {}", e);
                    None
                }
            },
            None => None,
        };

        let session = Session { token, user };
        if session.is_authenticated() {
            info!("Restored session from storage");
        }
        let (authenticated, _) = watch::channel(session.is_authenticated());

        Ok(Self {
            store,
            session: RwLock::new(session),
            authenticated,
        })
    }

    /// 登录：持久化令牌与用户信息并更新内存状态
    pub async fn login(&self, user: UserProfile, token: String) -> Result<()> {
        let mut session = self.session.write().await;
        self.store.set(TOKEN_KEY, &token)?;
        self.store.set(USER_KEY, &serde_json::to_string(&user)?)?;

        info!("User logged in: {}", user.email);
        session.token = Some(token);
        session.user = Some(user);
        self.authenticated.send_replace(true);
        Ok(())
    }

    /// 登出：清除存储与内存中的会话
    pub async fn logout(&self) -> Result<()> {
        let mut session = self.session.write().await;
        self.clear(&mut session)?;
        info!("User logged out");
        Ok(())
    }

    /// 后端返回 401 时调用
    ///
    /// 只有失败请求携带的令牌仍是当前令牌时才清除会话，
    /// 所以并发的多个失败只会触发一次登出。
    pub async fn expire(&self, sent_token: Option<&str>) -> Result<Expiry> {
        let mut session = self.session.write().await;
        match (session.token.as_deref(), sent_token) {
            (None, _) => Ok(Expiry::AlreadyAnonymous),
            (Some(current), Some(sent)) if current != sent => Ok(Expiry::Superseded),
            (Some(_), None) => Ok(Expiry::Superseded),
            (Some(_), Some(_)) => {
                self.clear(&mut session)?;
                warn!("Session expired, logged out");
                Ok(Expiry::Cleared)
            }
        }
    }

    fn clear(&self, session: &mut Session) -> Result<()> {
        // 先清内存，存储失败时也不再携带令牌
        session.token = None;
        session.user = None;
        self.authenticated.send_replace(false);
        self.store.remove(TOKEN_KEY)?;
        self.store.remove(USER_KEY)?;
        Ok(())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_authenticated()
    }

    pub async fn token(&self) -> Option<String> {
        self.session.read().await.token.clone()
    }

    pub async fn user(&self) -> Option<UserProfile> {
        let session = self.session.read().await;
        if session.is_authenticated() {
            session.user.clone()
        } else {
            None
        }
    }

    /// 当前会话快照
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    /// 订阅登录状态变化，供路由守卫重新求值
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }
}
