use std::fmt;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::backend::Account;
use crate::browser::{
    click, click_if_present, AutomationError, AutomationSurface, Probe, TypeOptions,
};
use crate::config::{AuthSection, MarketplaceSection};
use crate::marketplace;

use super::{SessionError, SessionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unknown,
    CheckingSession,
    LoggingIn,
    Authenticated,
    Failed,
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthState::Unknown => "unknown",
            AuthState::CheckingSession => "checking-session",
            AuthState::LoggingIn => "logging-in",
            AuthState::Authenticated => "authenticated",
            AuthState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The persisted profile was still signed in.
    Resumed { display_name: String },
    LoggedIn,
}

#[derive(Debug, Clone)]
pub struct Authenticator {
    profile_url: String,
    login_url: String,
    settle: Duration,
}

impl Authenticator {
    pub fn new(marketplace: &MarketplaceSection, auth: &AuthSection) -> Self {
        Self {
            profile_url: marketplace.profile_url.clone(),
            login_url: marketplace.login_url.clone(),
            settle: auth.settle(),
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub async fn authenticate(
        &self,
        surface: &mut dyn AutomationSurface,
        account: &Account,
    ) -> SessionResult<AuthOutcome> {
        let mut state = AuthState::Unknown;
        advance(&mut state, AuthState::CheckingSession, account);

        if let Err(err) = surface.navigate(&self.profile_url).await {
            advance(&mut state, AuthState::Failed, account);
            return Err(auth_failure(account, "open profile page", err));
        }
        match surface.probe(&marketplace::profile_marker()).await {
            Probe::Found(()) => {
                let display_name = surface
                    .read_attribute(&marketplace::profile_marker(), "innerHTML")
                    .await
                    .found()
                    .unwrap_or_default();
                info!(account = %account.id, name = %display_name, "connected with stored session");
                advance(&mut state, AuthState::Authenticated, account);
                return Ok(AuthOutcome::Resumed { display_name });
            }
            Probe::NotFound => debug!(account = %account.id, "not logged in, attempting login"),
            Probe::Error(err) => {
                warn!(account = %account.id, error = %err, "session check failed, attempting login")
            }
        }

        advance(&mut state, AuthState::LoggingIn, account);
        match self.login(surface, account).await {
            Ok(()) => {
                advance(&mut state, AuthState::Authenticated, account);
                Ok(AuthOutcome::LoggedIn)
            }
            Err(err) => {
                advance(&mut state, AuthState::Failed, account);
                Err(err)
            }
        }
    }

    async fn login(
        &self,
        surface: &mut dyn AutomationSurface,
        account: &Account,
    ) -> SessionResult<()> {
        surface
            .navigate(&self.login_url)
            .await
            .map_err(|err| auth_failure(account, "open login page", err))?;
        match click_if_present(surface, &marketplace::consent_essential_only()).await {
            Probe::Found(_) => {
                debug!(account = %account.id, "consent interstitial dismissed");
                surface
                    .navigate(&self.login_url)
                    .await
                    .map_err(|err| auth_failure(account, "open login page", err))?;
            }
            Probe::NotFound => {}
            Probe::Error(err) => {
                debug!(account = %account.id, error = %err, "consent interstitial not dismissed")
            }
        }
        surface
            .navigate(&self.login_url)
            .await
            .map_err(|err| auth_failure(account, "open login page", err))?;

        let credentials = &account.credentials;
        surface
            .type_text(
                &marketplace::login_email(),
                &credentials.username,
                TypeOptions::default(),
            )
            .await
            .map_err(|err| auth_failure(account, "type username", err))?;
        surface
            .type_text(
                &marketplace::login_password(),
                &credentials.password,
                TypeOptions::default(),
            )
            .await
            .map_err(|err| auth_failure(account, "type password", err))?;
        click(surface, &marketplace::login_submit())
            .await
            .map_err(|err| auth_failure(account, "click login", err))?;

        if let Probe::Error(err) = click_if_present(surface, &marketplace::post_login_ok()).await {
            debug!(account = %account.id, error = %err, "post-login confirmation not clicked");
        }
        sleep(self.settle).await;
        info!(account = %account.id, "login attempt finished");
        Ok(())
    }
}

fn advance(state: &mut AuthState, next: AuthState, account: &Account) {
    debug!(account = %account.id, from = %state, to = %next, "auth state");
    *state = next;
}

fn auth_failure(account: &Account, stage: &'static str, source: AutomationError) -> SessionError {
    SessionError::Authentication {
        account: account.id.clone(),
        stage,
        source,
    }
}
