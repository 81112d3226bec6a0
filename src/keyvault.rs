use std::time::Duration;
use log::{debug, warn};
use serde::Deserialize;
use thiserror::Error;
use crate::auth;
use crate::secrets::StaticSecrets;

const API_VERSION: &str = "7.4";

#[derive(Error, Debug)]
pub enum Error {
    #[error("auth: {0}")]
    Auth(#[from] auth::Error),

    #[error("reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("secret {name}: status {status}")]
    Status { name: String, status: u16 },
}

#[derive(Deserialize)]
struct SecretBundle {
    value: String,
}

/// Azure Key Vault names allow only alphanumerics and dashes.
pub fn secret_name(key: &str) -> String {
    key.replace('_', "-")
}

pub fn secret_url(vault: &str, key: &str) -> String {
    format!(
        "https://{vault}.vault.azure.net/secrets/{}?api-version={API_VERSION}",
        secret_name(key)
    )
}

pub struct KeyVault {
    vault: String,
    token: String,
    client: reqwest::Client,
}

impl KeyVault {
    pub async fn connect(vault: &str) -> Result<Self, Error> {
        let token = auth::key_vault_token().await?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()?;
        Ok(Self {
            vault: vault.to_string(),
            token,
            client,
        })
    }

    /// Read the current version of a secret. A missing secret is `Ok(None)`.
    pub async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        debug!("Reading secret {key} from key vault {}", self.vault);
        let resp = self
            .client
            .get(secret_url(&self.vault, key))
            .bearer_auth(&self.token)
            .send()
            .await?;

        match resp.status().as_u16() {
            200 => Ok(Some(resp.json::<SecretBundle>().await?.value)),
            404 => Ok(None),
            status => Err(Error::Status {
                name: secret_name(key),
                status,
            }),
        }
    }

    /// Fetch the given keys up front. Keys that cannot be read are left out,
    /// so a later lookup reports them as absent.
    pub async fn prefetch(&self, keys: &[&str]) -> StaticSecrets {
        let mut secrets = StaticSecrets::default();
        for key in keys {
            match self.get(key).await {
                Ok(Some(value)) => secrets.insert(*key, value),
                Ok(None) => debug!("Secret {key} does not exist in key vault {}", self.vault),
                Err(err) => warn!("Secret {key} could not be read from key vault {}: {err}", self.vault),
            }
        }
        secrets
    }
}
