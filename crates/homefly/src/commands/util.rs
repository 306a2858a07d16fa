//! Shared helpers for command handlers: argument parsing glue and
//! output rendering.

use chrono::{DateTime, TimeDelta, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use homefly_core::{Entity, EntityId, EntityPatch};

use crate::cli::{OutputFormat, WhenArgs};
use crate::error::CliError;

/// Parse an entity id argument.
pub fn parse_entity_id(raw: &str) -> Result<EntityId, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: "id".into(),
        reason: format!("'{raw}' is not an entity id (endpoint:aid:service-iid)"),
    })
}

/// Build a patch from the shared `--on/--off/--brightness` flags.
pub fn patch_from_flags(
    on: bool,
    off: bool,
    brightness: Option<f64>,
) -> Result<EntityPatch, CliError> {
    let patch = EntityPatch {
        on: match (on, off) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
        brightness,
    };
    if patch.is_empty() {
        return Err(CliError::Validation {
            field: "patch".into(),
            reason: "pass --on, --off, and/or --brightness".into(),
        });
    }
    Ok(patch)
}

/// Resolve `--in`/`--at` into an absolute run time. The time must be in
/// the future.
pub fn parse_when(when: &WhenArgs) -> Result<DateTime<Utc>, CliError> {
    let run_at = if let Some(ref delay) = when.delay {
        let duration = humantime::parse_duration(delay).map_err(|e| CliError::Validation {
            field: "in".into(),
            reason: format!("'{delay}': {e}"),
        })?;
        let delta = TimeDelta::from_std(duration).map_err(|_| CliError::Validation {
            field: "in".into(),
            reason: format!("'{delay}' is out of range"),
        })?;
        Utc::now() + delta
    } else if let Some(ref at) = when.at {
        DateTime::parse_from_rfc3339(at)
            .map_err(|e| CliError::Validation {
                field: "at".into(),
                reason: format!("'{at}': {e}"),
            })?
            .with_timezone(&Utc)
    } else {
        // clap's arg group guarantees one of the two is present
        unreachable!()
    };

    if run_at <= Utc::now() {
        return Err(CliError::Validation {
            field: "at".into(),
            reason: format!("{run_at} is in the past"),
        });
    }
    Ok(run_at)
}

// ── Output rendering ────────────────────────────────────────────────

/// Print a value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::Internal(format!("serialization failed: {e}")))?;
    println!("{json}");
    Ok(())
}

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "KIND")]
    kind: String,
    #[tabled(rename = "POWER")]
    power: String,
    #[tabled(rename = "BRIGHTNESS")]
    brightness: String,
}

/// Render entities as a table or JSON.
pub fn print_entities(entities: &[Entity], format: OutputFormat) -> Result<(), CliError> {
    if format == OutputFormat::Json {
        return print_json(&entities);
    }
    if entities.is_empty() {
        println!("No entities found.");
        return Ok(());
    }

    let rows: Vec<EntityRow> = entities
        .iter()
        .map(|e| EntityRow {
            id: e.id.to_string(),
            name: e.name.clone(),
            kind: e.kind.to_string(),
            power: if e.state.on {
                "on".green().to_string()
            } else {
                "off".red().to_string()
            },
            brightness: e
                .state
                .brightness
                .map_or_else(|| "-".into(), |b| format!("{b}%")),
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn patch_flags_combine() {
        let patch = patch_from_flags(true, false, Some(60.0)).unwrap();
        assert_eq!(patch.on, Some(true));
        assert_eq!(patch.brightness, Some(60.0));

        let off = patch_from_flags(false, true, None).unwrap();
        assert_eq!(off.on, Some(false));

        assert!(patch_from_flags(false, false, None).is_err());
    }

    #[test]
    fn when_accepts_relative_delay() {
        let when = WhenArgs {
            delay: Some("2h 30m".into()),
            at: None,
        };
        let run_at = parse_when(&when).unwrap();
        let delta = run_at - Utc::now();
        assert!(delta > TimeDelta::minutes(149) && delta <= TimeDelta::minutes(150));
    }

    #[test]
    fn when_rejects_past_absolute_time() {
        let when = WhenArgs {
            delay: None,
            at: Some("2001-01-01T00:00:00Z".into()),
        };
        assert!(parse_when(&when).is_err());
    }

    #[test]
    fn when_rejects_garbage() {
        let when = WhenArgs {
            delay: Some("soonish".into()),
            at: None,
        };
        assert!(parse_when(&when).is_err());
    }
}
