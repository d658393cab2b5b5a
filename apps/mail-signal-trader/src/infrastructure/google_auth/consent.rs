//! Browser consent flow with a loopback redirect.
//!
//! The bot listens on `127.0.0.1:<ephemeral>`, prints the consent URL, and
//! waits for Google to redirect the browser back with `?code=...&state=...`.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use rand::distr::{Alphanumeric, SampleString};
use reqwest::Url;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::client_secrets::ClientSecrets;
use crate::application::ports::AuthError;

/// Read/modify access to the mailbox; required to clear `UNREAD`.
pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// How long to wait for the user to finish the consent page.
pub const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

const STATE_LEN: usize = 32;

const SUCCESS_PAGE: &str =
    "<html><body><h3>Authorization complete.</h3>You can close this window.</body></html>";
const FAILURE_PAGE: &str =
    "<html><body><h3>Authorization failed.</h3>Check the bot log.</body></html>";

/// Query parameters of the redirect.
#[derive(Debug, Deserialize)]
struct Callback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Consent page URL for `redirect_uri` and `state`.
pub fn authorization_url(
    secrets: &ClientSecrets,
    redirect_uri: &str,
    state: &str,
) -> Result<Url, AuthError> {
    Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("response_type", "code"),
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", GMAIL_MODIFY_SCOPE),
            ("state", state),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| AuthError::ClientConfig(format!("invalid auth_uri: {e}")))
}

/// One-shot HTTP listener receiving the authorization code.
pub struct LoopbackReceiver {
    redirect_uri: String,
    state: String,
    callbacks: mpsc::Receiver<Callback>,
    shutdown: CancellationToken,
}

impl LoopbackReceiver {
    /// Bind an ephemeral loopback port and start serving the redirect.
    pub async fn bind() -> Result<Self, AuthError> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .map_err(|e| AuthError::Authorization(format!("cannot bind loopback: {e}")))?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthError::Authorization(e.to_string()))?
            .port();

        let (tx, callbacks) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let router = Router::new().route("/", get(callback)).with_state(tx);

        let stop = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(stop.cancelled_owned())
                .await
            {
                tracing::warn!(error = %e, "OAuth redirect listener failed");
            }
        });

        Ok(Self {
            redirect_uri: format!("http://127.0.0.1:{port}/"),
            state: Alphanumeric.sample_string(&mut rand::rng(), STATE_LEN),
            callbacks,
            shutdown,
        })
    }

    /// Where Google must send the browser back.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// CSRF token the redirect must echo.
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Wait for a redirect carrying our `state` and return its code.
    ///
    /// Redirects with a foreign `state` are ignored; an explicit `error`
    /// from the consent page ends the flow.
    pub async fn wait_for_code(self, timeout: Duration) -> Result<String, AuthError> {
        let Self {
            state,
            mut callbacks,
            shutdown,
            ..
        } = self;

        let result = tokio::time::timeout(timeout, async {
            while let Some(callback) = callbacks.recv().await {
                if callback.state.as_deref() != Some(state.as_str()) {
                    tracing::warn!("Ignoring OAuth redirect with mismatched state");
                    continue;
                }
                if let Some(error) = callback.error {
                    return Err(AuthError::Authorization(error));
                }
                if let Some(code) = callback.code {
                    return Ok(code);
                }
            }
            Err(AuthError::Authorization(
                "redirect listener closed".to_string(),
            ))
        })
        .await;

        shutdown.cancel();
        result.map_err(|_| {
            AuthError::Authorization(format!(
                "no authorization within {}s",
                timeout.as_secs()
            ))
        })?
    }
}

async fn callback(
    State(tx): State<mpsc::Sender<Callback>>,
    Query(params): Query<Callback>,
) -> Html<&'static str> {
    let page = if params.code.is_some() {
        SUCCESS_PAGE
    } else {
        FAILURE_PAGE
    };
    if tx.try_send(params).is_err() {
        tracing::debug!("OAuth redirect arrived after the flow finished");
    }
    Html(page)
}
