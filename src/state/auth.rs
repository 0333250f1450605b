// state/auth.rs
// Persisted backend session and the operator sign-in flow.

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::RwLock;

use crate::error::{KosError, Result};
use crate::gateway::{AuthGateway, Credentials};
use crate::models::AuthUser;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub user: AuthUser,
}

/// On-disk layout under the `kosflow-auth` key.
#[derive(Serialize, Deserialize)]
struct PersistedAuth {
    state: PersistedState,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    user: Option<AuthUser>,
    token: Option<String>,
    #[serde(default)]
    is_authenticated: bool,
}

/// Bearer token and profile, persisted so a restart keeps the operator signed in.
pub struct SessionStore {
    path: PathBuf,
    current: RwLock<Option<AuthSession>>,
}

impl SessionStore {
    /// Loads a previously persisted session from `path`, if any.
    pub async fn restore(path: PathBuf) -> Self {
        let current = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<PersistedAuth>(&bytes) {
                Ok(PersistedAuth {
                    state:
                        PersistedState {
                            user: Some(user),
                            token: Some(token),
                            is_authenticated: true,
                        },
                }) => {
                    tracing::info!(user = %user.username, "restored persisted session");
                    Some(AuthSession { token, user })
                }
                Ok(_) => None,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "ignoring unreadable session file");
                    None
                }
            },
            Err(_) => None,
        };
        SessionStore {
            path,
            current: RwLock::new(current),
        }
    }

    pub async fn token(&self) -> Option<String> {
        self.current.read().await.as_ref().map(|s| s.token.clone())
    }

    pub async fn current(&self) -> Option<AuthSession> {
        self.current.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current.read().await.is_some()
    }

    pub async fn sign_in(&self, session: AuthSession) {
        *self.current.write().await = Some(session.clone());
        self.persist(Some(&session)).await;
    }

    pub async fn update_user(&self, user: AuthUser) {
        let mut guard = self.current.write().await;
        if let Some(session) = guard.as_mut() {
            session.user = user;
            let snapshot = session.clone();
            drop(guard);
            self.persist(Some(&snapshot)).await;
        }
    }

    /// Drops the session and its persisted copy. Called on logout and on any 401.
    pub async fn force_logout(&self) {
        let had_session = self.current.write().await.take().is_some();
        if had_session {
            tracing::warn!("session cleared; operator must sign in again");
        }
        self.persist(None).await;
    }

    async fn persist(&self, session: Option<&AuthSession>) {
        let result = match session {
            Some(session) => {
                let payload = PersistedAuth {
                    state: PersistedState {
                        user: Some(session.user.clone()),
                        token: Some(session.token.clone()),
                        is_authenticated: true,
                    },
                };
                match serde_json::to_vec_pretty(&payload) {
                    Ok(bytes) => {
                        if let Some(dir) = self.path.parent() {
                            if let Err(err) = tokio::fs::create_dir_all(dir).await {
                                tracing::warn!(error = %err, "cannot create state directory");
                            }
                        }
                        tokio::fs::write(&self.path, bytes).await
                    }
                    Err(err) => Err(std::io::Error::other(err)),
                }
            }
            None => match tokio::fs::remove_file(&self.path).await {
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(err) = result {
            tracing::warn!(path = %self.path.display(), error = %err, "session persistence failed");
        }
    }
}

/// Login/logout on top of the persisted session.
pub struct AuthStore {
    session: Arc<SessionStore>,
    gateway: Arc<dyn AuthGateway>,
    error: RwLock<Option<String>>,
}

impl AuthStore {
    pub fn new(session: Arc<SessionStore>, gateway: Arc<dyn AuthGateway>) -> Self {
        AuthStore {
            session,
            gateway,
            error: RwLock::new(None),
        }
    }

    pub async fn last_error(&self) -> Option<String> {
        self.error.read().await.clone()
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthSession> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(KosError::validation("Email dan password wajib diisi"));
        }
        match self.gateway.login(credentials).await {
            Ok(response) => {
                let session = AuthSession {
                    token: response.token,
                    user: response.user,
                };
                self.session.sign_in(session.clone()).await;
                *self.error.write().await = None;
                tracing::info!(user = %session.user.username, "operator signed in");
                Ok(session)
            }
            Err(err) => {
                // A rejected login is a wrong password, not an expired session.
                let err = match err {
                    KosError::Auth(_) => KosError::Auth("Username atau password salah".into()),
                    other => other,
                };
                *self.error.write().await = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub async fn logout(&self) {
        self.session.force_logout().await;
        *self.error.write().await = None;
    }

    /// Re-reads the profile from the backend and stores it with the session.
    pub async fn refresh_profile(&self) -> Result<AuthUser> {
        let user = self.gateway.profile().await?;
        self.session.update_user(user.clone()).await;
        Ok(user)
    }
}
