use std::future::Future;
use std::io::Write;
use std::pin::Pin;

use anyhow::{Context, Result};
use google_gmail1::oauth2;
use google_gmail1::oauth2::authenticator_delegate::InstalledFlowDelegate;
use log::{debug, info};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::GmailConfig;

const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Opaque bearer token for the message store.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Credential(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// How the account to analyse is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode {
    /// Reuse the cached account, consent is only asked when no token is cached.
    Cached,
    /// Always show Google's account chooser; the token cache is left untouched.
    SwitchAccount,
}

/// Obtains Gmail credentials through the OAuth2 installed-application flow.
pub struct IdentityProvider {
    credentials_path: String,
    token_cache_path: String,
}

impl IdentityProvider {
    pub fn new(config: &GmailConfig) -> Result<Self> {
        Ok(IdentityProvider {
            credentials_path: config.require_credentials()?.to_string(),
            token_cache_path: config.token_cache_path.clone(),
        })
    }

    pub async fn credential(&self, mode: IdentityMode) -> Result<Credential> {
        info!("🔐 Obtaining Gmail credential ({:?})", mode);

        // Read OAuth2 client credentials from file
        let secret = oauth2::read_application_secret(&self.credentials_path)
            .await
            .context("Unable to read OAuth2 client credentials file")?;

        let builder = oauth2::InstalledFlowAuthenticator::builder(
            secret,
            oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        );

        let auth = match mode {
            IdentityMode::Cached => builder
                .persist_tokens_to_disk(&self.token_cache_path)
                .flow_delegate(Box::new(ConsentPrompt::cached()))
                .build()
                .await
                .context("Unable to create OAuth2 authenticator")?,
            IdentityMode::SwitchAccount => builder
                .flow_delegate(Box::new(ConsentPrompt::select_account()))
                .build()
                .await
                .context("Unable to create OAuth2 authenticator")?,
        };

        let token = auth
            .token(&[GMAIL_READONLY_SCOPE])
            .await
            .context("Unable to obtain an access token")?;

        let bearer = token
            .token()
            .context("OAuth2 response did not contain an access token")?;

        debug!("Access token obtained");
        Ok(Credential::new(bearer))
    }
}

/// Presents the consent URL on stderr, stdout carries `serve` responses.
struct ConsentPrompt {
    select_account: bool,
}

impl ConsentPrompt {
    fn cached() -> Self {
        ConsentPrompt { select_account: false }
    }

    /// Forces Google's account chooser on.
    fn select_account() -> Self {
        ConsentPrompt { select_account: true }
    }

    fn url(&self, url: &str) -> String {
        if self.select_account {
            select_account_url(url)
        } else {
            url.to_string()
        }
    }

    async fn present(&self, url: &str, need_code: bool) -> std::result::Result<String, String> {
        write_prompt(&mut std::io::stderr(), &self.url(url), need_code)
            .map_err(|e| format!("Unable to show the consent URL: {}", e))?;

        if !need_code {
            return Ok(String::new());
        }

        let mut code = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut code)
            .await
            .map_err(|e| format!("Unable to read authorization code: {}", e))?;

        Ok(code.trim().to_string())
    }
}

impl InstalledFlowDelegate for ConsentPrompt {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        need_code: bool,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<String, String>> + Send + 'a>> {
        Box::pin(self.present(url, need_code))
    }
}

fn write_prompt<W: Write>(out: &mut W, url: &str, need_code: bool) -> std::io::Result<()> {
    writeln!(out, "Please choose the account to analyse by visiting:\n\n  {}\n", url)?;
    if need_code {
        writeln!(out, "Then paste the authorization code here:")?;
    }
    out.flush()
}

pub fn select_account_url(url: &str) -> String {
    if url.contains('?') {
        format!("{}&prompt=select_account", url)
    } else {
        format!("{}?prompt=select_account", url)
    }
}
