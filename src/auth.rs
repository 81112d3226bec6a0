use std::time::Duration;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Audience Azure AD expects on GitHub id tokens used as federated credentials.
const AZURE_TOKEN_EXCHANGE_AUDIENCE: &str = "api://AzureADTokenExchange";
const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";

#[derive(Error, Debug)]
pub enum Error {
    #[error("no Azure credentials: set AZURE_ACCESS_TOKEN, or run in GitHub Actions with id-token permissions and AZURE_CLIENT_ID/AZURE_TENANT_ID")]
    NoCredentials,

    #[error("reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("unexpected response (status {status}): {body}")]
    Deserialize { status: u16, body: String },
}

/// Obtain an access token for Azure Key Vault.
///
/// A token in `AZURE_ACCESS_TOKEN` is used as-is. Otherwise the GitHub Actions OIDC
/// id token is exchanged for an Azure AD token through workload identity federation.
pub async fn key_vault_token() -> Result<String, Error> {
    if let Ok(token) = std::env::var("AZURE_ACCESS_TOKEN") {
        debug!("Using Azure access token from environment");
        return Ok(token.strip_prefix("Bearer ").unwrap_or(&token).to_string());
    }

    let github_id_token_url = std::env::var("ACTIONS_ID_TOKEN_REQUEST_URL").ok();
    let github_token = std::env::var("ACTIONS_ID_TOKEN_REQUEST_TOKEN").ok();
    let client_id = std::env::var("AZURE_CLIENT_ID").ok();
    let tenant_id = std::env::var("AZURE_TENANT_ID").ok();

    match (github_id_token_url, github_token, client_id, tenant_id) {
        (Some(url), Some(github_token), Some(client_id), Some(tenant_id)) => {
            let id_token = github_id_token(&url, &github_token).await?;
            exchange_federated_token(&tenant_id, &client_id, &id_token.value)
                .await
                .map(|token| token.access_token)
        }
        _ => Err(Error::NoCredentials),
    }
}

#[derive(Serialize)]
struct TokenExchangeRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    scope: &'a str,
    client_assertion_type: &'a str,
    client_assertion: &'a str,
}

#[derive(Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
}

#[derive(Deserialize)]
pub struct GitHubTokenResponse {
    pub value: String,
}

pub async fn exchange_federated_token(
    tenant_id: &str,
    client_id: &str,
    github_id_token: &str,
) -> Result<TokenExchangeResponse, Error> {
    debug!("Exchanging federated GitHub token for an Azure AD token");
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()?;
    let request = TokenExchangeRequest {
        grant_type: "client_credentials",
        client_id,
        scope: KEY_VAULT_SCOPE,
        client_assertion_type: "urn:ietf:params:oauth:client-assertion-type:jwt-bearer",
        client_assertion: github_id_token,
    };

    let resp = client
        .post(format!("https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/token"))
        .form(&request)
        .send()
        .await?;

    parse_response(resp).await
}

pub async fn github_id_token(url: &str, bearer_token: &str) -> Result<GitHubTokenResponse, Error> {
    debug!("Getting GitHub actions id_token");
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()?;

    let resp = client
        .get(url)
        .bearer_auth(bearer_token)
        .query(&[("audience", AZURE_TOKEN_EXCHANGE_AUDIENCE)])
        .send()
        .await?;

    parse_response(resp).await
}

async fn parse_response<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status().as_u16();
    let bytes = resp.bytes().await?;

    serde_json::from_slice(&bytes).map_err(|_| Error::Deserialize {
        status,
        body: String::from_utf8_lossy(&bytes).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_exchange_form_fields() {
        let request = TokenExchangeRequest {
            grant_type: "client_credentials",
            client_id: "00000000-0000-0000-0000-000000000001",
            scope: KEY_VAULT_SCOPE,
            client_assertion_type: "urn:ietf:params:oauth:client-assertion-type:jwt-bearer",
            client_assertion: "eyJ.x.y",
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["scope"], "https://vault.azure.net/.default");
        assert_eq!(value["client_assertion"], "eyJ.x.y");
        assert_eq!(value["grant_type"], "client_credentials");
    }

    #[test]
    fn token_responses_deserialize() {
        let token: TokenExchangeResponse =
            serde_json::from_str(r#"{"token_type":"Bearer","expires_in":3599,"access_token":"abc"}"#).unwrap();
        assert_eq!(token.access_token, "abc");

        let id_token: GitHubTokenResponse = serde_json::from_str(r#"{"count":1,"value":"jwt"}"#).unwrap();
        assert_eq!(id_token.value, "jwt");
    }
}
