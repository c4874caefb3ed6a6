use std::ops::RangeInclusive;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{Tool, ToolError};
use crate::types::ToolDefinition;

const SIDES: RangeInclusive<u32> = 2..=1000;
const COUNT: RangeInclusive<u32> = 1..=20;

/// `get_current_time`: the current time in an IANA zone
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentTime;

#[derive(Debug, Deserialize)]
struct CurrentTimeArgs {
    #[serde(default = "default_timezone")]
    timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_owned()
}

#[async_trait]
impl Tool for CurrentTime {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_current_time".to_owned(),
            description: "Get the current date and time in a time zone".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "timezone": {
                        "type": "string",
                        "description": "IANA time zone name, e.g. Europe/Paris. Defaults to UTC."
                    }
                }
            }),
        }
    }

    async fn call(&self, arguments: Value) -> Result<String, ToolError> {
        let args: CurrentTimeArgs = parse_args(arguments)?;

        let now = jiff::Timestamp::now()
            .in_tz(&args.timezone)
            .map_err(|e| ToolError::InvalidArguments(format!("unknown time zone '{}': {e}", args.timezone)))?;

        Ok(json!({
            "timezone": args.timezone,
            "datetime": now.strftime("%Y-%m-%dT%H:%M:%S%:z").to_string(),
        })
        .to_string())
    }
}

/// `roll_dice`: random rolls and their total
#[derive(Debug, Clone, Copy, Default)]
pub struct RollDice;

#[derive(Debug, Deserialize)]
struct RollDiceArgs {
    #[serde(default = "default_sides")]
    sides: u32,
    #[serde(default = "default_count")]
    count: u32,
}

const fn default_sides() -> u32 {
    6
}

const fn default_count() -> u32 {
    1
}

#[async_trait]
impl Tool for RollDice {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "roll_dice".to_owned(),
            description: "Roll one or more dice and report each roll and the total".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "sides": {
                        "type": "integer",
                        "minimum": SIDES.start(),
                        "maximum": SIDES.end(),
                        "description": "Faces per die. Defaults to 6."
                    },
                    "count": {
                        "type": "integer",
                        "minimum": COUNT.start(),
                        "maximum": COUNT.end(),
                        "description": "Number of dice. Defaults to 1."
                    }
                }
            }),
        }
    }

    async fn call(&self, arguments: Value) -> Result<String, ToolError> {
        let args: RollDiceArgs = parse_args(arguments)?;

        if !SIDES.contains(&args.sides) {
            return Err(ToolError::InvalidArguments(format!(
                "sides must be between {} and {}",
                SIDES.start(),
                SIDES.end()
            )));
        }
        if !COUNT.contains(&args.count) {
            return Err(ToolError::InvalidArguments(format!(
                "count must be between {} and {}",
                COUNT.start(),
                COUNT.end()
            )));
        }

        let rolls = roll(args.sides, args.count);
        let total: u32 = rolls.iter().sum();

        Ok(json!({ "sides": args.sides, "rolls": rolls, "total": total }).to_string())
    }
}

// The thread-local generator must not be held across an await
fn roll(sides: u32, count: u32) -> Vec<u32> {
    let mut rng = rand::rng();
    (0..count).map(|_| rng.random_range(1..=sides)).collect()
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    // Some models send `null` for zero-argument calls
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn current_time_defaults_to_utc() {
        let result: Value = serde_json::from_str(&CurrentTime.call(json!({})).await.unwrap()).unwrap();
        assert_eq!(result["timezone"], "UTC");

        let datetime = result["datetime"].as_str().unwrap();
        assert!(datetime.ends_with("+00:00"), "{datetime}");
        assert!(datetime.parse::<jiff::Timestamp>().is_ok(), "{datetime}");
    }

    #[tokio::test]
    async fn current_time_in_named_zone() {
        let result: Value = serde_json::from_str(
            &CurrentTime
                .call(json!({"timezone": "Asia/Kolkata"}))
                .await
                .unwrap(),
        )
        .unwrap();
        assert!(result["datetime"].as_str().unwrap().ends_with("+05:30"));
    }

    #[tokio::test]
    async fn current_time_rejects_unknown_zone() {
        let err = CurrentTime
            .call(json!({"timezone": "Mars/Olympus_Mons"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn dice_rolls_stay_in_range() {
        let result: Value =
            serde_json::from_str(&RollDice.call(json!({"sides": 20, "count": 5})).await.unwrap()).unwrap();

        let rolls: Vec<u64> = result["rolls"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_u64().unwrap())
            .collect();
        assert_eq!(rolls.len(), 5);
        assert!(rolls.iter().all(|r| (1..=20).contains(r)));
        assert_eq!(result["total"].as_u64().unwrap(), rolls.iter().sum::<u64>());
    }

    #[tokio::test]
    async fn dice_defaults_and_null_arguments() {
        let result: Value = serde_json::from_str(&RollDice.call(Value::Null).await.unwrap()).unwrap();
        assert_eq!(result["sides"], 6);
        assert_eq!(result["rolls"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dice_rejects_out_of_range() {
        for args in [json!({"sides": 1}), json!({"count": 21}), json!({"sides": -3})] {
            assert!(matches!(
                RollDice.call(args).await,
                Err(ToolError::InvalidArguments(_))
            ));
        }
    }
}
