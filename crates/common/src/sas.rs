//! Storage account shared access signatures
//!
//! Computes account SAS tokens with HMAC-SHA256 over the canonical
//! string-to-sign, keyed with the storage account key.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Service version signed into generated tokens
pub const SIGNED_VERSION: &str = "2017-07-29";

/// Parameters of an account SAS
#[derive(Debug, Clone, Default)]
pub struct AccountSas<'a> {
    pub account_name: &'a str,
    /// Base64 encoded account key
    pub account_key: &'a str,
    pub permissions: &'a str,
    pub services: &'a str,
    pub resource_types: &'a str,
    pub start: &'a str,
    pub expiry: &'a str,
    pub signed_protocol: &'a str,
    pub signed_ip: &'a str,
    pub signed_version: &'a str,
}

impl AccountSas<'_> {
    fn string_to_sign(&self) -> String {
        let mut s = String::new();
        for field in [
            self.account_name,
            self.permissions,
            self.services,
            self.resource_types,
            self.start,
            self.expiry,
            self.signed_ip,
            self.signed_protocol,
            self.signed_version,
        ] {
            s.push_str(field);
            s.push('\n');
        }
        s
    }

    /// Compute the token, including the leading `?`
    pub fn compute(&self) -> Result<String> {
        let key = STANDARD
            .decode(self.account_key)
            .map_err(|e| Error::Crypto(format!("account key is not valid base64: {}", e)))?;

        let mut mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| Error::Crypto(format!("invalid HMAC key: {}", e)))?;
        mac.update(self.string_to_sign().as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        let mut token = format!(
            "?sv={}&ss={}&srt={}&sp={}&se={}&st={}&spr={}",
            query_escape(self.signed_version),
            query_escape(self.services),
            query_escape(self.resource_types),
            query_escape(self.permissions),
            self.expiry,
            self.start,
            self.signed_protocol,
        );
        if !self.signed_ip.is_empty() {
            token.push_str("&sip=");
            token.push_str(self.signed_ip);
        }
        token.push_str("&sig=");
        token.push_str(&query_escape(&signature));
        Ok(token)
    }
}

/// Compute an account SAS token from its individual fields
#[allow(clippy::too_many_arguments)]
pub fn compute_account_sas(
    account_name: &str,
    account_key: &str,
    permissions: &str,
    services: &str,
    resource_types: &str,
    start: &str,
    expiry: &str,
    signed_protocol: &str,
    signed_ip: &str,
    signed_version: &str,
) -> Result<String> {
    AccountSas {
        account_name,
        account_key,
        permissions,
        services,
        resource_types,
        start,
        expiry,
        signed_protocol,
        signed_ip,
        signed_version,
    }
    .compute()
}

/// Split a storage connection string into its `key=value` parts
pub fn parse_connection_string(connection_string: &str) -> HashMap<String, String> {
    connection_string
        .split(';')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

fn query_escape(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // The storage account behind these keys has been deleted.
    const ACCOUNT: &str = "azurermtestsa0";

    #[test]
    fn test_known_token_without_ip() {
        let token = compute_account_sas(
            ACCOUNT,
            "T0ZQouXBDpWud/PlTRHIJH2+VUK8D+fnedEynb9Mx638IYnsMUe4mv1fFjC7t0NayTfFAQJzPZuV1WHFKOzGdg==",
            "rwac",
            "b",
            "c",
            "2018-03-20T04:00:00Z",
            "2020-03-20T04:00:00Z",
            "https",
            "",
            "2017-07-29",
        )
        .unwrap();
        assert_eq!(
            token,
            "?sv=2017-07-29&ss=b&srt=c&sp=rwac&se=2020-03-20T04:00:00Z&st=2018-03-20T04:00:00Z&spr=https&sig=SQigK%2FnFA4pv0F0oMLqr6DxUWV4vtFqWi6q3Mf7o9nY%3D"
        );
    }

    #[test]
    fn test_known_token_with_multiple_protocols() {
        let token = compute_account_sas(
            ACCOUNT,
            "2vJrjEyL4re2nxCEg590wJUUC7PiqqrDHjAN5RU304FNUQieiEwS2bfp83O0v28iSfWjvYhkGmjYQAdd9x+6nw==",
            "rwdlac",
            "b",
            "sco",
            "2018-03-20T04:00:00Z",
            "2018-03-28T05:04:25Z",
            "https,http",
            "",
            "2017-07-29",
        )
        .unwrap();
        assert_eq!(
            token,
            "?sv=2017-07-29&ss=b&srt=sco&sp=rwdlac&se=2018-03-28T05:04:25Z&st=2018-03-20T04:00:00Z&spr=https,http&sig=OLNwL%2B7gxeDQQaUyNdXcDPK2aCbCMgEkJNjha9te448%3D"
        );
    }

    #[test]
    fn test_signed_ip_is_included() {
        let token = AccountSas {
            account_name: ACCOUNT,
            account_key: "c2VjcmV0",
            permissions: "r",
            services: "b",
            resource_types: "o",
            start: "2018-03-20T04:00:00Z",
            expiry: "2018-03-21T04:00:00Z",
            signed_protocol: "https",
            signed_ip: "168.1.5.60-168.1.5.70",
            signed_version: SIGNED_VERSION,
        }
        .compute()
        .unwrap();
        assert!(token.contains("&sip=168.1.5.60-168.1.5.70&sig="));
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        let result = AccountSas {
            account_name: ACCOUNT,
            account_key: "not base64!!",
            ..Default::default()
        }
        .compute();
        assert!(matches!(result, Err(Error::Crypto(_))));
    }

    #[test]
    fn test_parse_connection_string() {
        let parsed = parse_connection_string(
            "DefaultEndpointsProtocol=https;AccountName=azurermtestsa0;AccountKey=T0ZQ+VUK8D==;EndpointSuffix=core.windows.net",
        );
        assert_eq!(parsed["AccountName"], "azurermtestsa0");
        assert_eq!(parsed["AccountKey"], "T0ZQ+VUK8D==");
        assert_eq!(parsed["EndpointSuffix"], "core.windows.net");
        assert_eq!(parsed.len(), 4);
    }
}
