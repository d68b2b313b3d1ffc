//! Shopify REST payloads.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

/// Body of the code-for-token exchange.
#[derive(Serialize)]
pub(super) struct AccessTokenRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub code: &'a str,
}

/// OAuth token response from Shopify.
#[derive(Deserialize)]
pub(super) struct AccessTokenResponse {
    #[serde(default, deserialize_with = "optional_secret")]
    pub access_token: Option<SecretString>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn optional_secret<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<SecretString>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// A script tag registered on a shop's storefront.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptTag {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub event: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct ScriptTagList {
    #[serde(default)]
    pub script_tags: Vec<ScriptTag>,
}

#[derive(Serialize)]
pub(super) struct NewScriptTag<'a> {
    pub event: &'a str,
    pub src: &'a str,
}

#[derive(Serialize)]
pub(super) struct CreateScriptTagRequest<'a> {
    pub script_tag: NewScriptTag<'a>,
}

#[derive(Deserialize)]
pub(super) struct CreateScriptTagResponse {
    pub script_tag: ScriptTag,
}
