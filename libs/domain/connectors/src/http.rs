// [libs/domain/connectors/src/http.rs]
use std::time::Duration;

use aegis_domain_models::DecryptedCredential;
use reqwest::Client;

/// Builds a `reqwest::Client` carrying a Bearer header for one credential.
/// A fresh client per call keeps the header tied to the token that was
/// valid at call time — credentials are short-lived and must never be
/// cached across an `.await` suspension point, so neither is this client.
pub fn bearer_client(credential: &DecryptedCredential, user_agent: &str) -> reqwest::Result<Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    let auth_value = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", credential.access_token))
        .unwrap_or_else(|_| reqwest::header::HeaderValue::from_static("Bearer invalid"));
    headers.insert(reqwest::header::AUTHORIZATION, auth_value);

    Client::builder()
        .default_headers(headers)
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .build()
}
