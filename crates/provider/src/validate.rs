//! Attribute validators
//!
//! Each validator receives the value and the attribute name and returns the
//! problems it found. Null and unknown values never reach a validator.

use std::net::{IpAddr, Ipv6Addr};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::schema::ValidateFn;
use crate::state::DynamicValue;

static DB_ACCOUNT_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9\-]+$").unwrap());
static KEY_VAULT_CHILD_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-zA-Z-]+$").unwrap());
static DATA_LAKE_ACCOUNT_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]{3,24}$").unwrap());
static SAS_RESOURCE_TYPES: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[cos]{1,3}$").unwrap());
static AUTOMATION_SCHEDULE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^<>*%&:\\?.+/]{0,127}[^<>*%&:\\?.+/\s]$").unwrap());

const MAX_TAGS: usize = 15;
const MAX_TAG_KEY_LENGTH: usize = 512;
const MAX_TAG_VALUE_LENGTH: usize = 256;

fn string_check<F>(check: F) -> ValidateFn
where
    F: Fn(&str, &str) -> Vec<String> + Send + Sync + 'static,
{
    Arc::new(move |v: &DynamicValue, k: &str| match v.as_string() {
        Some(s) => check(s, k),
        None => vec![format!("expected type of {} to be string", k)],
    })
}

fn int_check<F>(check: F) -> ValidateFn
where
    F: Fn(i64, &str) -> Vec<String> + Send + Sync + 'static,
{
    Arc::new(move |v: &DynamicValue, k: &str| match v.as_i64() {
        Some(i) => check(i, k),
        None => vec![format!("expected type of {} to be int", k)],
    })
}

pub fn rfc3339_date() -> ValidateFn {
    string_check(|s, k| match DateTime::parse_from_rfc3339(s) {
        Ok(_) => vec![],
        Err(e) => vec![format!("{:?} is an invalid RFC3339 date: {}", k, e)],
    })
}

/// RFC3339 timestamp at least `duration` after now
pub fn rfc3339_date_in_future_by(duration: Duration) -> ValidateFn {
    string_check(move |s, k| check_in_future_by(s, k, duration, Utc::now()))
}

fn check_in_future_by(s: &str, k: &str, duration: Duration, now: DateTime<Utc>) -> Vec<String> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(t) if t.with_timezone(&Utc) < now + duration => vec![format!(
            "{:?} is {:?} and should be at least {} minutes in the future",
            k,
            s,
            duration.num_minutes()
        )],
        Ok(_) => vec![],
        Err(e) => vec![format!("{:?} is an invalid RFC3339 date: {}", k, e)],
    }
}

pub fn int_in_slice(valid: &'static [i64]) -> ValidateFn {
    int_check(move |v, k| {
        if valid.contains(&v) {
            vec![]
        } else {
            vec![format!("expected {:?} to be one of {:?}, got {}", k, valid, v)]
        }
    })
}

pub fn int_between(min: i64, max: i64) -> ValidateFn {
    int_check(move |v, k| {
        if v < min || v > max {
            vec![format!("expected {} to be in the range ({} - {}), got {}", k, min, max, v)]
        } else {
            vec![]
        }
    })
}

/// In the range and different from `not`
pub fn int_between_and_not(min: i64, max: i64, not: i64) -> ValidateFn {
    int_check(move |v, k| {
        if v < min || v > max {
            vec![format!("expected {} to be in the range ({} - {}), got {}", k, min, max, v)]
        } else if v == not {
            vec![format!("expected {} to not be {}, got {}", k, not, v)]
        } else {
            vec![]
        }
    })
}

pub fn uuid() -> ValidateFn {
    string_check(|s, k| match uuid::Uuid::parse_str(s) {
        Ok(_) => vec![],
        Err(e) => vec![format!("{:?} is an invalid UUID: {}", k, e)],
    })
}

fn length_between(s: &str, what: &str) -> Vec<String> {
    let length = s.chars().count();
    if !(3..=50).contains(&length) {
        vec![format!("{} can only be between 3 and 50 characters.", what)]
    } else {
        vec![]
    }
}

pub fn db_account_name() -> ValidateFn {
    string_check(|s, _| {
        let mut errors = Vec::new();
        if !DB_ACCOUNT_NAME.is_match(s) {
            errors.push(
                "Account Name can only contain lower-case characters, numbers and the `-` character."
                    .to_string(),
            );
        }
        errors.extend(length_between(s, "Account Name"));
        errors
    })
}

pub fn cosmos_db_name() -> ValidateFn {
    string_check(|s, _| {
        let mut errors = Vec::new();
        if !DB_ACCOUNT_NAME.is_match(s) {
            errors.push(
                "CosmosDB Name can only contain lower-case characters, numbers and the `-` character."
                    .to_string(),
            );
        }
        errors.extend(length_between(s, "CosmosDB Name"));
        errors
    })
}

pub fn string_length(max: usize) -> ValidateFn {
    string_check(move |s, k| {
        if s.chars().count() > max {
            vec![format!("The {:?} can be no longer than {} chars", k, max)]
        } else {
            vec![]
        }
    })
}

pub fn string_in_slice(valid: &'static [&'static str], ignore_case: bool) -> ValidateFn {
    string_check(move |s, k| {
        let found = valid.iter().any(|v| {
            if ignore_case {
                v.eq_ignore_ascii_case(s)
            } else {
                *v == s
            }
        });
        if found {
            vec![]
        } else {
            vec![format!("expected {} to be one of {:?}, got {}", k, valid, s)]
        }
    })
}

pub fn string_match(regex: &'static Lazy<Regex>, message: &'static str) -> ValidateFn {
    string_check(move |s, k| {
        if regex.is_match(s) {
            vec![]
        } else if message.is_empty() {
            vec![format!("invalid value for {} ({})", k, regex.as_str())]
        } else {
            vec![format!("invalid value for {} ({})", k, message)]
        }
    })
}

pub fn key_vault_child_name() -> ValidateFn {
    string_check(|s, k| {
        if KEY_VAULT_CHILD_NAME.is_match(s) {
            vec![]
        } else {
            vec![format!("{:?} may only contain alphanumeric characters and dashes", k)]
        }
    })
}

pub fn data_lake_account_name() -> ValidateFn {
    string_check(|s, k| {
        if DATA_LAKE_ACCOUNT_NAME.is_match(s) {
            vec![]
        } else {
            vec![format!(
                "{} must be 3 - 24 characters long, contain only lowercase letters and numbers.",
                k
            )]
        }
    })
}

pub fn storage_sas_resource_types() -> ValidateFn {
    string_check(|s, k| {
        if SAS_RESOURCE_TYPES.is_match(s) {
            vec![]
        } else {
            vec![format!(
                "{:?} must be one to three of the characters c, o and s",
                k
            )]
        }
    })
}

pub fn automation_schedule_name() -> ValidateFn {
    string_match(
        &AUTOMATION_SCHEDULE_NAME,
        r"The name length must be from 1 to 128 characters. The name cannot contain special characters < > * % & : \ ? . + / and cannot end with a whitespace character.",
    )
}

pub fn ipv6_address() -> ValidateFn {
    string_check(|s, k| match s.parse::<Ipv6Addr>() {
        Ok(_) => vec![],
        Err(_) => vec![format!("{} must be a valid IPv6 address: {:?}", k, s)],
    })
}

pub fn ip_address() -> ValidateFn {
    string_check(|s, k| match s.parse::<IpAddr>() {
        Ok(_) => vec![],
        Err(_) => vec![format!("{} must be a valid IP address: {:?}", k, s)],
    })
}

pub fn cidr() -> ValidateFn {
    string_check(|s, k| match s.parse::<ipnetwork::IpNetwork>() {
        Ok(_) if s.contains('/') => vec![],
        _ => vec![format!("{} must be a valid CIDR block: {:?}", k, s)],
    })
}

/// Limits Resource Manager puts on tags
pub fn tags() -> ValidateFn {
    Arc::new(|v: &DynamicValue, k: &str| {
        let Some(tags) = v.as_map() else {
            return vec![format!("expected type of {} to be map", k)];
        };
        let mut errors = Vec::new();
        if tags.len() > MAX_TAGS {
            errors.push(format!("a maximum of {} tags can be applied to each ARM resource", MAX_TAGS));
        }
        for (key, value) in tags {
            if key.chars().count() > MAX_TAG_KEY_LENGTH {
                errors.push(format!(
                    "the maximum length for a tag key is {} characters: {:?}",
                    MAX_TAG_KEY_LENGTH, key
                ));
            }
            if value.as_string().map(|s| s.chars().count()).unwrap_or(0) > MAX_TAG_VALUE_LENGTH {
                errors.push(format!(
                    "the maximum length for a tag value is {} characters: the value for {:?} is too long",
                    MAX_TAG_VALUE_LENGTH, key
                ));
            }
        }
        errors
    })
}
