mod auth;

use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{Account, RecordId};
use crate::browser::{AutomationError, AutomationSurface, SurfaceLauncher};

pub use auth::{AuthOutcome, AuthState, Authenticator};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to open session for account {account}: {source}")]
    Launch {
        account: RecordId,
        #[source]
        source: AutomationError,
    },
    #[error("authentication failed for account {account} ({stage}): {source}")]
    Authentication {
        account: RecordId,
        stage: &'static str,
        #[source]
        source: AutomationError,
    },
    #[error("no session is bound")]
    NotBound,
    #[error(transparent)]
    Automation(#[from] AutomationError),
}

pub type SessionResult<T> = Result<T, SessionError>;

struct BoundSession {
    account: Account,
    surface: Box<dyn AutomationSurface>,
}

/// Owns the single live automation session and the account it belongs to.
pub struct SessionManager {
    launcher: Box<dyn SurfaceLauncher>,
    authenticator: Authenticator,
    bound: Option<BoundSession>,
}

impl SessionManager {
    pub fn new(launcher: impl SurfaceLauncher + 'static, authenticator: Authenticator) -> Self {
        Self {
            launcher: Box::new(launcher),
            authenticator,
            bound: None,
        }
    }

    pub fn bound_account(&self) -> Option<&Account> {
        self.bound.as_ref().map(|bound| &bound.account)
    }

    pub fn surface_mut(&mut self) -> Option<&mut dyn AutomationSurface> {
        self.bound
            .as_mut()
            .map(|bound| bound.surface.as_mut() as &mut dyn AutomationSurface)
    }

    /// Binds the session to `account`, replacing any session held for another account.
    pub async fn ensure_session(
        &mut self,
        account: &Account,
    ) -> SessionResult<&mut dyn AutomationSurface> {
        let reusable = self
            .bound
            .as_ref()
            .is_some_and(|bound| bound.account.same_identity(account));
        if !reusable {
            self.close_session().await;
            let mut surface =
                self.launcher
                    .open(account.id.as_str())
                    .await
                    .map_err(|source| SessionError::Launch {
                        account: account.id.clone(),
                        source,
                    })?;
            if let Err(err) = self
                .authenticator
                .authenticate(surface.as_mut(), account)
                .await
            {
                close_quietly(surface.as_mut(), &account.id).await;
                return Err(err);
            }
            info!(account = %account.id, "session bound");
            self.bound = Some(BoundSession {
                account: account.clone(),
                surface,
            });
        }
        self.surface_mut().ok_or(SessionError::NotBound)
    }

    /// Clears cookies on the bound session and logs in again.
    pub async fn reauthenticate(&mut self) -> SessionResult<()> {
        let Some(mut bound) = self.bound.take() else {
            return Err(SessionError::NotBound);
        };
        info!(account = %bound.account.id, "re-authenticating bound session");
        let result = match bound.surface.delete_all_cookies().await {
            Ok(()) => self
                .authenticator
                .authenticate(bound.surface.as_mut(), &bound.account)
                .await
                .map(drop),
            Err(err) => Err(SessionError::Automation(err)),
        };
        match result {
            Ok(()) => {
                self.bound = Some(bound);
                Ok(())
            }
            Err(err) => {
                close_quietly(bound.surface.as_mut(), &bound.account.id).await;
                Err(err)
            }
        }
    }

    pub async fn close_session(&mut self) {
        if let Some(mut bound) = self.bound.take() {
            close_quietly(bound.surface.as_mut(), &bound.account.id).await;
            info!(account = %bound.account.id, "session closed");
        }
    }
}

async fn close_quietly(surface: &mut dyn AutomationSurface, account: &RecordId) {
    if let Err(err) = surface.close().await {
        warn!(account = %account, error = %err, "failed to close session");
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(bound) = &self.bound {
            warn!(account = %bound.account.id, "session manager dropped with a bound session");
        }
    }
}
