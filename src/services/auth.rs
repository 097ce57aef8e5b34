// src/services/auth.rs

//! Session and authentication lifecycle against the portal's SSO login.
//!
//! The login is a three-step Shibboleth dance: the portal's login
//! redirect yields the identity provider's form target, the credential
//! post yields the SAML relay fields, and posting those back to the
//! portal establishes the cookie session.
//!
//! State machine: `Unauthenticated → Authenticating → Authenticated`,
//! falling back to `Authenticating` on expiry or challenge. The
//! "authenticating" state is the held renewal lock: concurrent callers
//! needing a fresh session wait on the same in-flight login instead of
//! triggering duplicates.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, PortalConfig};
use crate::services::parse::{PageContent, parse_login_form, parse_saml_form};

/// An established portal session.
///
/// The actual token lives in the shared HTTP client's cookie store; this
/// value identifies the login it belongs to and estimates its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Account the session was established for
    pub user_name: String,
    /// When the login completed
    pub established: DateTime<Utc>,
    /// When the session is assumed stale and renewed proactively
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Stored login credentials; never logged, never serialized.
struct Credentials {
    user_name: String,
    password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_name", &self.user_name)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
enum AuthState {
    Unauthenticated,
    Authenticated {
        session: Session,
        credentials: Credentials,
    },
}

/// Owns the login/session lifecycle.
#[derive(Debug)]
pub struct Authenticator {
    client: Client,
    portal: PortalConfig,
    session_ttl: Duration,
    state: Mutex<AuthState>,
}

impl Authenticator {
    /// Create an authenticator sharing the crawl's HTTP client (and with
    /// it the cookie store that carries the session).
    pub fn new(client: Client, portal: PortalConfig, crawler: &CrawlerConfig) -> Self {
        Self {
            client,
            portal,
            session_ttl: Duration::seconds(crawler.session_ttl_secs as i64),
            state: Mutex::new(AuthState::Unauthenticated),
        }
    }

    /// Log in with the given credentials.
    ///
    /// On success the credentials are kept in memory for transparent
    /// renewal; on failure the state stays `Unauthenticated` and the
    /// caller must retry explicitly.
    pub async fn login(&self, user_name: &str, password: &str) -> Result<Session> {
        let mut state = self.state.lock().await;
        match self.do_login(user_name, password).await {
            Ok(session) => {
                log::info!("logged in as {user_name}");
                *state = AuthState::Authenticated {
                    session: session.clone(),
                    credentials: Credentials {
                        user_name: user_name.to_string(),
                        password: password.to_string(),
                    },
                };
                Ok(session)
            }
            Err(error) => {
                *state = AuthState::Unauthenticated;
                Err(error)
            }
        }
    }

    /// The current session, if logged in.
    pub async fn session(&self) -> Option<Session> {
        match &*self.state.lock().await {
            AuthState::Authenticated { session, .. } => Some(session.clone()),
            AuthState::Unauthenticated => None,
        }
    }

    /// Return a valid session, re-authenticating with the stored
    /// credentials if the given one expired or was challenged.
    ///
    /// `stale` is the session the caller saw fail. If another task
    /// already renewed it while the caller waited on the lock, the fresh
    /// session is returned without a second login round trip.
    pub async fn ensure_valid(&self, stale: Option<&Session>) -> Result<Session> {
        let mut state = self.state.lock().await;

        let (session, credentials) = match &*state {
            AuthState::Unauthenticated => {
                return Err(AppError::auth("not logged in"));
            }
            AuthState::Authenticated {
                session,
                credentials,
            } => (session, credentials),
        };

        let renewed_already = stale.is_some_and(|s| s.established != session.established);
        if renewed_already || (stale.is_none() && !session.is_expired()) {
            return Ok(session.clone());
        }

        log::info!("renewing portal session for {}", credentials.user_name);
        let user_name = credentials.user_name.clone();
        let password = credentials.password.clone();
        match self.do_login(&user_name, &password).await {
            Ok(session) => {
                *state = AuthState::Authenticated {
                    session: session.clone(),
                    credentials: Credentials {
                        user_name,
                        password,
                    },
                };
                Ok(session)
            }
            Err(error) => {
                *state = AuthState::Unauthenticated;
                Err(error)
            }
        }
    }

    async fn do_login(&self, user_name: &str, password: &str) -> Result<Session> {
        // Step 1: the portal's SSO redirect page names the login form target.
        let start_url = self
            .portal
            .studip_url("/studip/index.php?again=yes&sso=shib")?;
        let page = self.get_page(start_url).await.map_err(|e| {
            AppError::auth(format!("could not initialize SSO login: {e}"))
        })?;
        let action = parse_login_form(&page)
            .map_err(|e| AppError::auth(format!("could not initialize SSO login: {e}")))?;

        // Step 2: post credentials to the identity provider.
        let sso_url = self.portal.sso_url(&action)?;
        let response = self
            .client
            .post(sso_url)
            .form(&[
                ("j_username", user_name),
                ("j_password", password),
                ("uApprove.consent-revocation", ""),
                ("_eventId_proceed", ""),
            ])
            .send()
            .await
            .map_err(|e| AppError::auth(format!("SSO login request failed: {e}")))?;
        let page = PageContent::new(
            response.url().clone(),
            response
                .text()
                .await
                .map_err(|e| AppError::auth(format!("SSO login request failed: {e}")))?,
        );
        // A form-error here means rejected credentials; keep that error as-is.
        let fields = parse_saml_form(&page).map_err(|e| match e {
            auth @ AppError::Auth(_) => auth,
            other => AppError::auth(format!("SSO login failed: {other}")),
        })?;

        // Step 3: relay the SAML response back to the portal.
        let post_url = self.portal.studip_url("/Shibboleth.sso/SAML2/POST")?;
        let response = self
            .client
            .post(post_url)
            .form(&fields)
            .send()
            .await
            .map_err(|e| AppError::auth(format!("could not complete SSO login: {e}")))?;
        let final_path = response.url().path().to_string();
        response
            .text()
            .await
            .map_err(|e| AppError::auth(format!("could not complete SSO login: {e}")))?;

        if !final_path.starts_with("/studip") {
            return Err(AppError::auth(format!(
                "unexpected redirect after SSO login to {final_path}"
            )));
        }

        let now = Utc::now();
        Ok(Session {
            user_name: user_name.to_string(),
            established: now,
            expires_at: now + self.session_ttl,
        })
    }

    #[cfg(test)]
    async fn install_session(&self, session: Session, user_name: &str, password: &str) {
        *self.state.lock().await = AuthState::Authenticated {
            session,
            credentials: Credentials {
                user_name: user_name.to_string(),
                password: password.to_string(),
            },
        };
    }

    async fn get_page(&self, url: url::Url) -> Result<PageContent> {
        let response = self.client.get(url).send().await?;
        let final_url = response.url().clone();
        let body = response.text().await?;
        Ok(PageContent::new(final_url, body))
    }
}
