//! Form-based login against the Modeus identity server.
//!
//! The flow is: open the OAuth authorize page (which lands on a login form),
//! post the credentials to the form, relay the hidden fields of the answer to
//! `/commonauth`, and follow redirects until one carries `#id_token=...`.

use async_trait::async_trait;
use modsync_core::session::Authenticator;
use modsync_core::{SyncError, SyncResult};
use reqwest::header::{LOCATION, REFERER};
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::{APP_URL, ModeusClient, network};

const CLIENT_ID: &str = "YDNCeCPsf1zL2etGQflijyfzo88a";
const STATE: &str = "abab35fcb9164912aa46d287a594a338";
const NONCE: &str = "08cd3a21e9724040acb48cf3a35b0c4b";

const MAX_REDIRECTS: usize = 10;

fn selector(css: &str) -> SyncResult<Selector> {
    Selector::parse(css).map_err(|e| SyncError::Authentication(format!("bad selector '{css}': {e}")))
}

/// Target of the first `<form>` on the page, resolved against `base`.
fn form_action(page: &str, base: &Url) -> SyncResult<Url> {
    let document = Html::parse_document(page);
    let form = selector("form[action]")?;

    let action = document
        .select(&form)
        .find_map(|element| element.value().attr("action"))
        .ok_or_else(|| SyncError::Authentication("login form not found".into()))?;

    base.join(action)
        .map_err(|e| SyncError::Authentication(format!("bad form action '{action}': {e}")))
}

/// `name`/`value` pairs of the hidden inputs on the page.
fn hidden_fields(page: &str) -> SyncResult<Vec<(String, String)>> {
    let document = Html::parse_document(page);
    let hidden = selector(r#"input[type="hidden"][name]"#)?;

    Ok(document
        .select(&hidden)
        .filter_map(|element| {
            let input = element.value();
            let name = input.attr("name")?;
            Some((name.to_string(), input.attr("value").unwrap_or_default().to_string()))
        })
        .collect())
}

/// The `id_token` carried in a URL fragment.
fn id_token(url: &str) -> Option<String> {
    let (_, fragment) = url.split_once('#')?;
    fragment
        .split('&')
        .find_map(|pair| pair.strip_prefix("id_token="))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl Authenticator for ModeusClient {
    async fn login(&self, email: &str, password: &str) -> SyncResult<String> {
        let response = self
            .http
            .get(self.auth_url("oauth2/authorize"))
            .query(&[
                ("client_id", CLIENT_ID),
                ("redirect_uri", APP_URL),
                ("response_type", "id_token"),
                ("scope", "openid"),
                ("state", STATE),
                ("nonce", NONCE),
            ])
            .send()
            .await
            .map_err(network)?;

        let login_page = response.url().clone();
        let page = response.text().await.map_err(network)?;
        let action = form_action(&page, &login_page)?;
        debug!(%action, "Posting credentials");

        let response = self
            .http
            .post(action)
            .header(REFERER, login_page.as_str())
            .form(&[
                ("UserName", email),
                ("Password", password),
                ("AuthMethod", "FormsAuthentication"),
            ])
            .send()
            .await
            .map_err(network)?;

        // A rejected login re-renders the form instead of the relay page
        let fields = hidden_fields(&response.text().await.map_err(network)?)?;
        if fields.len() < 2 {
            return Err(SyncError::Authentication(
                "credentials rejected (no relay form returned)".into(),
            ));
        }

        let mut response = self
            .http_manual
            .post(self.auth_url("commonauth"))
            .form(&fields)
            .send()
            .await
            .map_err(network)?;

        for _ in 0..MAX_REDIRECTS {
            let current = response.url().clone();
            if let Some(token) = id_token(current.as_str()) {
                return Ok(token);
            }

            let location = match response.headers().get(LOCATION) {
                Some(value) if response.status().is_redirection() => value
                    .to_str()
                    .map_err(|e| SyncError::Authentication(e.to_string()))?
                    .to_string(),
                _ => break,
            };
            if let Some(token) = id_token(&location) {
                debug!("Got id_token");
                return Ok(token);
            }

            let next = current
                .join(&location)
                .map_err(|e| SyncError::Authentication(format!("bad redirect '{location}': {e}")))?;
            response = self.http_manual.get(next).send().await.map_err(network)?;
        }

        Err(SyncError::Authentication(
            "login flow ended without an id_token".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_action_resolves_relative_and_entities() {
        let base = Url::parse("https://fs.example.org/adfs/ls/?x=1").unwrap();
        let page = r#"<form method="post" id="loginForm" autocomplete="off" action="/adfs/ls/?client-request-id=42&amp;pullStatus=0">"#;

        let action = form_action(page, &base).unwrap();
        assert_eq!(action.as_str(), "https://fs.example.org/adfs/ls/?client-request-id=42&pullStatus=0");
    }

    #[test]
    fn test_missing_form_is_authentication_error() {
        let base = Url::parse("https://fs.example.org/").unwrap();
        assert!(matches!(form_action("<html></html>", &base), Err(SyncError::Authentication(_))));
    }

    #[test]
    fn test_hidden_fields() {
        let page = r#"
            <input type="hidden" name="SAMLResponse" value="PHNhbWw&#x2b;" />
            <input type="hidden" name="RelayState" value="abc"/>
            <input type="text" name="other" value="ignored" />
        "#;
        let fields = hidden_fields(page).unwrap();
        assert_eq!(
            fields,
            vec![
                ("SAMLResponse".to_string(), "PHNhbWw+".to_string()),
                ("RelayState".to_string(), "abc".to_string()),
            ]
        );
    }

    #[test]
    fn test_hidden_fields_any_attribute_order_and_quoting() {
        let page = r#"<input name="SAMLResponse" type="hidden" value="abc" /><input type='hidden' name='RelayState' value='r1'><INPUT TYPE="hidden" NAME="Empty">"#;
        let fields = hidden_fields(page).unwrap();
        assert_eq!(
            fields,
            vec![
                ("SAMLResponse".to_string(), "abc".to_string()),
                ("RelayState".to_string(), "r1".to_string()),
                ("Empty".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_id_token_from_fragment() {
        assert_eq!(
            id_token("https://narfu.modeus.org/#id_token=eyJ.abc.def&state=xyz").as_deref(),
            Some("eyJ.abc.def")
        );
        assert_eq!(id_token("https://narfu.modeus.org/#state=xyz"), None);
        assert_eq!(id_token("https://narfu.modeus.org/?id_token=nope"), None);
    }
}
