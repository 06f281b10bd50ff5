//! Subscription lookup, defaulting to the provider's own subscription

use anyhow::{Context, Result};
use azurerm_common::models::subscription::{Subscription, API_VERSION};
use azurerm_common::ArmClient;

use super::DataSource;
use crate::schema::{AttrType, Attribute, Block};
use crate::state::{get_optional_string_attr, make_state, optional_string_value, string_value, DynamicValue};

pub struct SubscriptionDataSource;

#[async_trait::async_trait]
impl DataSource for SubscriptionDataSource {
    fn type_name(&self) -> &'static str {
        "azurerm_subscription"
    }

    fn schema(&self) -> Block {
        Block::new(vec![
            Attribute::computed("id", AttrType::String),
            Attribute::optional_computed("subscription_id", AttrType::String),
            Attribute::computed("display_name", AttrType::String),
            Attribute::computed("state", AttrType::String),
            Attribute::computed("location_placement_id", AttrType::String),
            Attribute::computed("quota_id", AttrType::String),
            Attribute::computed("spending_limit", AttrType::String),
        ])
    }

    async fn read(&self, client: &ArmClient, config: &DynamicValue) -> Result<DynamicValue> {
        let subscription_id = get_optional_string_attr(config, "subscription_id")
            .unwrap_or_else(|| client.subscription_id().to_string());

        let subscription: Subscription = client
            .get(&format!("/subscriptions/{}", subscription_id), API_VERSION)
            .await
            .with_context(|| format!("Error reading subscription {:?}", subscription_id))?
            .with_context(|| format!("Subscription {:?} was not found", subscription_id))?;

        Ok(subscription_to_state(&subscription_id, &subscription))
    }
}

fn subscription_to_state(subscription_id: &str, subscription: &Subscription) -> DynamicValue {
    let policies = subscription.subscription_policies.clone().unwrap_or_default();
    make_state(vec![
        (
            "id",
            string_value(
                subscription
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("/subscriptions/{}", subscription_id)),
            ),
        ),
        (
            "subscription_id",
            string_value(subscription.subscription_id.clone().unwrap_or_else(|| subscription_id.to_string())),
        ),
        ("display_name", optional_string_value(subscription.display_name.clone())),
        ("state", optional_string_value(subscription.state.clone())),
        ("location_placement_id", optional_string_value(policies.location_placement_id)),
        ("quota_id", optional_string_value(policies.quota_id)),
        ("spending_limit", optional_string_value(policies.spending_limit)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::get_string_attr;

    #[test]
    fn test_subscription_to_state() {
        let subscription: Subscription = serde_json::from_value(serde_json::json!({
            "id": "/subscriptions/00000000-0000-0000-0000-000000000001",
            "subscriptionId": "00000000-0000-0000-0000-000000000001",
            "displayName": "Pay-As-You-Go",
            "state": "Enabled",
            "subscriptionPolicies": {
                "locationPlacementId": "Public_2014-09-01",
                "quotaId": "PayAsYouGo_2014-09-01",
                "spendingLimit": "Off"
            }
        }))
        .unwrap();

        let state = subscription_to_state("00000000-0000-0000-0000-000000000001", &subscription);
        assert_eq!(get_string_attr(&state, "display_name"), "Pay-As-You-Go");
        assert_eq!(get_string_attr(&state, "location_placement_id"), "Public_2014-09-01");
        assert_eq!(get_string_attr(&state, "spending_limit"), "Off");
    }
}
