//! Automation Schedule Resource handler for Terraform

use anyhow::{Context, Result};
use azurerm_common::models::automation::{
    AdvancedSchedule, MonthlyOccurrence, Schedule, ScheduleCreateOrUpdateParameters, ScheduleCreateOrUpdateProperties,
    API_VERSION, FREQUENCIES, WEEK_DAYS,
};
use azurerm_common::{ArmClient, ResourceId};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tracing::info;

use super::common::{self, parse_id, read_back};
use super::Resource;
use crate::schema::{AttrType, Attribute, Block, NestedBlock, Suppress};
use crate::state::{
    get_block, get_int_list_attr, get_list_attr, get_optional_int_attr, get_optional_string_attr, get_string_attr,
    get_string_list_attr, int_value, list_value, make_state, optional_string_value, string_list_value, string_value,
    DynamicValue,
};
use crate::validate;

pub struct AutomationScheduleResource;

#[async_trait::async_trait]
impl Resource for AutomationScheduleResource {
    fn type_name(&self) -> &'static str {
        "azurerm_automation_schedule"
    }

    fn schema(&self) -> Block {
        Block::new(vec![
            common::id(),
            Attribute::required("name", AttrType::String)
                .force_new()
                .validate(validate::automation_schedule_name()),
            common::resource_group_name(),
            Attribute::optional_computed("account_name", AttrType::String)
                .deprecated("account_name has been renamed to automation_account_name for clarity and to match the azure API")
                .conflicts_with(&["automation_account_name"]),
            Attribute::optional_computed("automation_account_name", AttrType::String)
                .conflicts_with(&["account_name"]),
            Attribute::required("frequency", AttrType::String)
                .validate(common::one_of(FREQUENCIES))
                .suppress(Suppress::CaseInsensitive),
            Attribute::optional_computed("interval", AttrType::Number).validate(validate::int_between(1, 100)),
            Attribute::optional_computed("start_time", AttrType::String)
                .validate(validate::rfc3339_date_in_future_by(Duration::minutes(5)))
                .suppress(Suppress::Rfc3339Time),
            Attribute::optional_computed("expiry_time", AttrType::String)
                .validate(validate::rfc3339_date())
                .suppress(Suppress::CaseInsensitive),
            Attribute::optional("description", AttrType::String),
            Attribute::optional("timezone", AttrType::String).default(string_value("UTC")),
        ])
        .with_blocks(vec![NestedBlock::list(
            "advanced_schedule",
            Block::new(vec![
                Attribute::optional("week_days", AttrType::set_of(AttrType::String))
                    .validate_elements(common::one_of(WEEK_DAYS)),
                Attribute::optional("month_days", AttrType::set_of(AttrType::Number))
                    .validate_elements(validate::int_between_and_not(-1, 31, 0)),
            ])
            .with_blocks(vec![NestedBlock::list(
                "monthly_occurrence",
                Block::new(vec![
                    Attribute::required("day", AttrType::String)
                        .validate(common::one_of(WEEK_DAYS))
                        .suppress(Suppress::CaseInsensitive),
                    Attribute::required("occurrence", AttrType::Number).validate(validate::int_between(1, 5)),
                ]),
            )]),
        )
        .max_items(1)])
    }

    fn validate_plan(&self, config: &DynamicValue) -> Vec<String> {
        check_schedule(config)
    }

    fn customize_plan(&self, prior: &DynamicValue, planned: &mut DynamicValue, replace: &mut Vec<String>) {
        for key in ["automation_account_name", "account_name"] {
            let old = get_optional_string_attr(prior, key);
            let new = get_optional_string_attr(planned, key);
            if let (Some(old), Some(new)) = (old, new) {
                if old != new && !replace.iter().any(|r| r == key) {
                    replace.push(key.to_string());
                }
            }
        }
    }

    async fn create(&self, client: &ArmClient, planned: &DynamicValue) -> Result<DynamicValue> {
        let name = get_string_attr(planned, "name");
        let resource_group = get_string_attr(planned, "resource_group_name");
        let account = account_name(planned)?;
        let id = schedule_id(client, &resource_group, &account, &name);
        info!(
            "Creating Automation Schedule {:?} (Account {:?} / Resource Group {:?})",
            name, account, resource_group
        );

        client
            .put(&id, API_VERSION, &expand_schedule(planned, Utc::now()))
            .await
            .with_context(|| {
                format!(
                    "Error creating Automation Schedule {:?} (Account {:?} / Resource Group {:?})",
                    name, account, resource_group
                )
            })?;
        read_back(self, client, planned, id).await
    }

    async fn read(&self, client: &ArmClient, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let id = parse_id(state)?;
        let schedule: Option<Schedule> = client
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("Error making Read request on AzureRM Automation Schedule {}", id))?;
        match schedule {
            Some(schedule) => Ok(Some(schedule_to_state(&id, &schedule)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, client: &ArmClient, _prior: &DynamicValue, planned: &DynamicValue) -> Result<DynamicValue> {
        let id = parse_id(planned)?.to_string();
        client
            .put(&id, API_VERSION, &expand_schedule(planned, Utc::now()))
            .await
            .with_context(|| format!("Error updating Automation Schedule {}", id))?;
        read_back(self, client, planned, id).await
    }

    async fn delete(&self, client: &ArmClient, state: &DynamicValue) -> Result<()> {
        let id = parse_id(state)?.to_string();
        info!("Deleting Automation Schedule {}", id);
        client
            .delete(&id, API_VERSION)
            .await
            .with_context(|| format!("Error issuing AzureRM delete request for Automation Schedule {}", id))?;
        Ok(())
    }
}

fn schedule_id(client: &ArmClient, resource_group: &str, account: &str, name: &str) -> String {
    ResourceId::new(client.subscription_id(), resource_group)
        .provider("Microsoft.Automation")
        .child("automationAccounts", account)
        .child("schedules", name)
        .to_string()
}

fn account_name(planned: &DynamicValue) -> Result<String> {
    get_optional_string_attr(planned, "automation_account_name")
        .or_else(|| get_optional_string_attr(planned, "account_name"))
        .context("`automation_account_name` must be set")
}

fn frequency_is(value: &DynamicValue, frequency: &str) -> bool {
    get_string_attr(value, "frequency").eq_ignore_ascii_case(frequency)
}

/// Rules spanning several attributes, evaluated on configured values only
fn check_schedule(config: &DynamicValue) -> Vec<String> {
    let mut errors = Vec::new();
    let frequency_known = config.get("frequency").and_then(|f| f.as_string()).is_some();

    if frequency_known {
        if frequency_is(config, "OneTime") && get_optional_int_attr(config, "interval").unwrap_or(0) > 0 {
            errors.push("`interval` cannot be set when frequency is `OneTime`".to_string());
        }

        if let Some(advanced) = get_block(config, "advanced_schedule") {
            let week = frequency_is(config, "Week");
            let month = frequency_is(config, "Month");
            if !week && !month {
                errors.push("`advanced_schedule` can only be set when frequency is `Week` or `Month`".to_string());
            }
            if week && is_empty_attr(advanced, "week_days") {
                errors.push("`week_days` must be set when frequency is `Week`".to_string());
            }
            if month && is_empty_attr(advanced, "month_days") && get_list_attr(advanced, "monthly_occurrence").is_empty()
            {
                errors.push("Either `month_days` or `monthly_occurrence` must be set when frequency is `Month`".to_string());
            }
        }
    }

    let account_unset = |key: &str| config.get(key).map(|v| v.is_null()).unwrap_or(true);
    if account_unset("automation_account_name") && account_unset("account_name") {
        errors.push("`automation_account_name` must be set".to_string());
    }
    errors
}

/// Unknown counts as set
fn is_empty_attr(value: &DynamicValue, key: &str) -> bool {
    match value.get(key) {
        Some(DynamicValue::Unknown) => false,
        Some(v) => v.as_list().map(|l| l.is_empty()).unwrap_or(true),
        None => true,
    }
}

fn expand_schedule(planned: &DynamicValue, now: DateTime<Utc>) -> ScheduleCreateOrUpdateParameters {
    let frequency = get_string_attr(planned, "frequency");
    let start_time = get_optional_string_attr(planned, "start_time")
        .unwrap_or_else(|| (now + Duration::minutes(7)).to_rfc3339_opts(SecondsFormat::Secs, true));

    let interval = if frequency.eq_ignore_ascii_case("OneTime") {
        None
    } else {
        Some(get_optional_int_attr(planned, "interval").unwrap_or(1))
    };

    let advanced_schedule = if frequency.eq_ignore_ascii_case("Week") || frequency.eq_ignore_ascii_case("Month") {
        get_block(planned, "advanced_schedule").map(expand_advanced_schedule)
    } else {
        None
    };

    ScheduleCreateOrUpdateParameters {
        name: get_string_attr(planned, "name"),
        properties: ScheduleCreateOrUpdateProperties {
            description: get_optional_string_attr(planned, "description"),
            start_time,
            expiry_time: get_optional_string_attr(planned, "expiry_time"),
            interval,
            frequency,
            time_zone: get_optional_string_attr(planned, "timezone"),
            advanced_schedule,
        },
    }
}

fn expand_advanced_schedule(block: &DynamicValue) -> AdvancedSchedule {
    let week_days = get_string_list_attr(block, "week_days");
    let month_days = get_int_list_attr(block, "month_days");
    let monthly_occurrences: Vec<MonthlyOccurrence> = get_list_attr(block, "monthly_occurrence")
        .iter()
        .map(|o| MonthlyOccurrence {
            day: get_string_attr(o, "day"),
            occurrence: get_optional_int_attr(o, "occurrence").unwrap_or_default(),
        })
        .collect();

    AdvancedSchedule {
        week_days: (!week_days.is_empty()).then_some(week_days),
        month_days: (!month_days.is_empty()).then_some(month_days),
        monthly_occurrences: (!monthly_occurrences.is_empty()).then_some(monthly_occurrences),
    }
}

fn schedule_to_state(id: &ResourceId, schedule: &Schedule) -> Result<DynamicValue> {
    let props = schedule.properties.clone().unwrap_or_default();
    let account = id.require("automationAccounts")?;
    Ok(make_state(vec![
        ("id", string_value(id.to_string())),
        ("name", string_value(id.require("schedules")?)),
        ("resource_group_name", string_value(&id.resource_group)),
        ("automation_account_name", string_value(account)),
        ("account_name", string_value(account)),
        ("frequency", optional_string_value(props.frequency)),
        ("interval", props.interval.map(|i| int_value(i as i64)).unwrap_or_default()),
        ("start_time", optional_string_value(props.start_time.as_deref().map(format_time))),
        ("expiry_time", optional_string_value(props.expiry_time.as_deref().map(format_time))),
        ("description", optional_string_value(props.description.filter(|d| !d.is_empty()))),
        ("timezone", optional_string_value(props.time_zone)),
        ("advanced_schedule", flatten_advanced_schedule(props.advanced_schedule.as_ref())),
    ]))
}

/// Whole seconds, with `Z` for UTC
fn format_time(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) if t.offset().local_minus_utc() == 0 => t.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true),
        Ok(t) => t.to_rfc3339_opts(SecondsFormat::Secs, false),
        Err(_) => raw.to_string(),
    }
}

fn flatten_advanced_schedule(schedule: Option<&AdvancedSchedule>) -> DynamicValue {
    let Some(schedule) = schedule else {
        return list_value(vec![]);
    };
    let week_days = schedule.week_days.clone().unwrap_or_default();
    let month_days = schedule.month_days.clone().unwrap_or_default();
    let occurrences = schedule.monthly_occurrences.clone().unwrap_or_default();
    if week_days.is_empty() && month_days.is_empty() && occurrences.is_empty() {
        return list_value(vec![]);
    }

    list_value(vec![make_state(vec![
        ("week_days", string_list_value(week_days)),
        ("month_days", list_value(month_days.into_iter().map(int_value).collect())),
        (
            "monthly_occurrence",
            list_value(
                occurrences
                    .into_iter()
                    .map(|o| make_state(vec![("day", string_value(o.day)), ("occurrence", int_value(o.occurrence))]))
                    .collect(),
            ),
        ),
    ])])
}
