//! Fraud-detection feature repository
//!
//! Transaction and user features keyed by `user_id`, served through three
//! feature services. Precomputed aggregates are read from whatever
//! [`FeatureLookup`] the caller supplies.

use featx_core::{FeatureLookup, Field, FieldType, Result, Row, Schema, Value};
use featx_engine::{Entity, EngineConfig, FeatureView, FeatureViewBuilder, Registry};
use std::sync::Arc;

pub const USER: &str = "user";
pub const TRANSACTION_REQUEST: &str = "transaction_request";
pub const USER_TRANSACTION_METRICS: &str = "user_transaction_metrics";
pub const USER_TRANSACTION_AMOUNT_TOTALS: &str = "user_transaction_amount_totals";
pub const USERS: &str = "users";

pub const TRANSACTION_AMOUNT_IS_HIGH: &str = "transaction_amount_is_high";
pub const TRANSACTION_AMOUNT_IS_HIGHER_THAN_AVERAGE: &str = "transaction_amount_is_higher_than_average";
pub const USER_CREDIT_CARD_ISSUER: &str = "user_credit_card_issuer";

pub const FRAUD_DETECTION_FEATURE_SERVICE: &str = "fraud_detection_feature_service";
pub const FRAUD_DETECTION_FEATURE_SERVICE_V2: &str = "fraud_detection_feature_service:v2";
pub const FRAUD_DETECTION_FEATURE_SERVICE_STREAMING: &str = "fraud_detection_feature_service_streaming";

/// Amounts above this are flagged by `transaction_amount_is_high`
pub const HIGH_AMOUNT: f64 = 1000.0;

/// Card network by the first digit of the card number
pub fn credit_card_issuer(cc_num: &str) -> &'static str {
    match cc_num.chars().next() {
        Some('4') => "Visa",
        Some('5') => "MasterCard",
        Some('6') => "Discover",
        _ => "other",
    }
}

fn user_transaction_metrics_schema() -> Result<Schema> {
    Schema::from_pairs([
        ("amount_mean_1d_1d", FieldType::Float64),
        ("amount_mean_3d_1d", FieldType::Float64),
        ("amount_mean_7d_1d", FieldType::Float64),
        ("amount_count_1d_1d", FieldType::Int64),
        ("amount_count_3d_1d", FieldType::Int64),
        ("amount_count_7d_1d", FieldType::Int64),
    ])
}

fn user_transaction_amount_totals_schema() -> Result<Schema> {
    Schema::from_pairs([
        ("amount_sum_1m_continuous", FieldType::Float64),
        ("amount_sum_1h_continuous", FieldType::Float64),
        ("amount_sum_30d_continuous", FieldType::Float64),
    ])
}

fn users_schema() -> Result<Schema> {
    Schema::from_pairs([("cc_num", FieldType::String), ("signup_timestamp", FieldType::Timestamp)])
}

/// Declare every entity, source, view and service of the repository
pub fn declare(registry: &Registry, lookup: Arc<dyn FeatureLookup>) -> Result<()> {
    registry.declare_entity(
        Entity::new(USER, vec!["user_id".to_string()]).with_description("A credit card holder"),
    )?;

    registry.declare_request_source(
        TRANSACTION_REQUEST,
        Schema::from_pairs([("amount", FieldType::Float64)])?,
    )?;
    registry.declare_entity_source(
        USER_TRANSACTION_METRICS,
        user_transaction_metrics_schema()?,
        USER,
        lookup.clone(),
    )?;
    registry.declare_entity_source(
        USER_TRANSACTION_AMOUNT_TOTALS,
        user_transaction_amount_totals_schema()?,
        USER,
        lookup.clone(),
    )?;
    registry.declare_entity_source(USERS, users_schema()?, USER, lookup)?;

    registry.declare_feature_view(
        FeatureViewBuilder::passthrough(USER_TRANSACTION_METRICS, USER_TRANSACTION_METRICS)
            .description("Mean and count of transaction amounts over 1, 3 and 7 days")
            .tag("team", "finance")
            .tag("status", "production"),
    )?;
    registry.declare_feature_view(
        FeatureViewBuilder::passthrough(USER_TRANSACTION_AMOUNT_TOTALS, USER_TRANSACTION_AMOUNT_TOTALS)
            .description("Sum of transaction amounts over 1 minute, 1 hour and 30 days"),
    )?;

    registry.declare_feature_view(
        FeatureView::builder(TRANSACTION_AMOUNT_IS_HIGH)
            .source(TRANSACTION_REQUEST)
            .output(Schema::from_pairs([(TRANSACTION_AMOUNT_IS_HIGH, FieldType::Bool)])?)
            .description("Whether the transaction amount is above 1000")
            .transform(|inputs| {
                let amount = inputs
                    .require(TRANSACTION_REQUEST)?
                    .get_f64("amount")
                    .ok_or("amount is null")?;
                let mut row = Row::new();
                row.insert(TRANSACTION_AMOUNT_IS_HIGH.to_string(), Value::Bool(amount > HIGH_AMOUNT));
                Ok(row)
            }),
    )?;

    // a user without history has a null mean; compare against 0 then
    registry.declare_feature_view(
        FeatureView::builder(TRANSACTION_AMOUNT_IS_HIGHER_THAN_AVERAGE)
            .source(TRANSACTION_REQUEST)
            .source(USER_TRANSACTION_METRICS)
            .output(Schema::from_pairs([(TRANSACTION_AMOUNT_IS_HIGHER_THAN_AVERAGE, FieldType::Bool)])?)
            .description("Whether the transaction amount is above the user's 1-day mean")
            .transform(|inputs| {
                let amount = inputs
                    .require(TRANSACTION_REQUEST)?
                    .get_f64("amount")
                    .ok_or("amount is null")?;
                let mean = inputs
                    .require(USER_TRANSACTION_METRICS)?
                    .get_f64("amount_mean_1d_1d")
                    .unwrap_or(0.0);
                let mut row = Row::new();
                row.insert(
                    TRANSACTION_AMOUNT_IS_HIGHER_THAN_AVERAGE.to_string(),
                    Value::Bool(amount > mean),
                );
                Ok(row)
            }),
    )?;

    registry.declare_feature_view(
        FeatureView::builder(USER_CREDIT_CARD_ISSUER)
            .source(USERS)
            .output(Schema::new(vec![
                Field::new("signup_timestamp", FieldType::Timestamp).nullable(),
                Field::new("credit_card_issuer", FieldType::String).nullable(),
            ])?)
            .description("User credit card issuer derived from the user credit card number")
            .transform(|inputs| {
                let user = inputs.require(USERS)?;
                let mut row = Row::new();
                row.insert(
                    "signup_timestamp".to_string(),
                    user.get("signup_timestamp").cloned().unwrap_or(Value::Null),
                );
                row.insert(
                    "credit_card_issuer".to_string(),
                    user.get_str("cc_num")
                        .map(|n| Value::from(credit_card_issuer(n)))
                        .unwrap_or(Value::Null),
                );
                Ok(row)
            }),
    )?;

    registry.declare_feature_service(FRAUD_DETECTION_FEATURE_SERVICE, &[USER_TRANSACTION_METRICS])?;
    registry.declare_feature_service(
        FRAUD_DETECTION_FEATURE_SERVICE_V2,
        &[
            USER_TRANSACTION_AMOUNT_TOTALS,
            USER_TRANSACTION_METRICS,
            TRANSACTION_AMOUNT_IS_HIGHER_THAN_AVERAGE,
            USER_CREDIT_CARD_ISSUER,
        ],
    )?;
    registry.declare_feature_service(
        FRAUD_DETECTION_FEATURE_SERVICE_STREAMING,
        &[USER_TRANSACTION_AMOUNT_TOTALS],
    )?;
    Ok(())
}

/// A registry holding only the fraud-detection repository
pub fn registry(config: EngineConfig, lookup: Arc<dyn FeatureLookup>) -> Result<Registry> {
    let registry = Registry::new(config)?;
    declare(&registry, lookup)?;
    Ok(registry)
}
