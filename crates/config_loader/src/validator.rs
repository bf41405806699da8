//! Config validation
//!
//! Rules:
//! - field ranges (derive attributes on the blueprint)
//! - GPIO pins unique across all hardware roles
//! - echo_end_timeout_ms >= echo_start_timeout_ms
//! - sink names non-empty and unique
//! - network sinks carry a parseable `addr` and a known `format`

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use contracts::{ContractError, ServerBlueprint, SinkType};
use validator::Validate;

/// Validate ServerBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &ServerBlueprint) -> Result<(), ContractError> {
    validate_ranges(blueprint)?;
    validate_pin_map(blueprint)?;
    validate_echo_timeouts(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// Derive-based range checks
fn validate_ranges(blueprint: &ServerBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let field = errors
            .errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "<root>".to_string());
        ContractError::config_validation(field, errors.to_string())
    })
}

/// Every hardware role needs its own pin
fn validate_pin_map(blueprint: &ServerBlueprint) -> Result<(), ContractError> {
    let mut seen: HashMap<u8, &str> = HashMap::new();
    for (role, pin) in blueprint.hardware.pin_roles() {
        if let Some(previous) = seen.insert(pin, role) {
            return Err(ContractError::config_validation(
                format!("hardware.{role}"),
                format!("duplicate pin {pin} (already used by {previous})"),
            ));
        }
    }
    Ok(())
}

fn validate_echo_timeouts(blueprint: &ServerBlueprint) -> Result<(), ContractError> {
    let hw = &blueprint.hardware;
    if hw.echo_end_timeout_ms < hw.echo_start_timeout_ms {
        return Err(ContractError::config_validation(
            "hardware.echo_end_timeout_ms",
            format!(
                "echo_end_timeout_ms ({}) must be >= echo_start_timeout_ms ({})",
                hw.echo_end_timeout_ms, hw.echo_start_timeout_ms
            ),
        ));
    }
    Ok(())
}

/// Validate sink config
fn validate_sinks(blueprint: &ServerBlueprint) -> Result<(), ContractError> {
    let mut names = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !names.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                format!("duplicate sink name '{}'", sink.name),
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].queue_capacity"),
                "queue_capacity must be > 0",
            ));
        }

        if sink.sink_type == SinkType::Network {
            let addr = sink.params.get("addr").ok_or_else(|| {
                ContractError::config_validation(
                    format!("sinks[{idx}].params.addr"),
                    "network sink requires 'addr'",
                )
            })?;
            addr.parse::<SocketAddr>().map_err(|e| {
                ContractError::config_validation(
                    format!("sinks[{idx}].params.addr"),
                    format!("invalid socket address '{addr}': {e}"),
                )
            })?;
            if let Some(format) = sink.params.get("format") {
                if !matches!(format.as_str(), "json" | "bincode") {
                    return Err(ContractError::config_validation(
                        format!("sinks[{idx}].params.format"),
                        format!("unknown format '{format}', expected json or bincode"),
                    ));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SinkConfig;

    fn network_sink(name: &str, addr: &str) -> SinkConfig {
        SinkConfig {
            name: name.into(),
            sink_type: SinkType::Network,
            queue_capacity: 100,
            params: HashMap::from([("addr".to_string(), addr.to_string())]),
        }
    }

    #[test]
    fn test_valid_config() {
        let mut bp = ServerBlueprint::default();
        bp.sinks.push(network_sink("uplink", "127.0.0.1:9000"));
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_duplicate_pin() {
        let mut bp = ServerBlueprint::default();
        bp.hardware.motion_pin = bp.hardware.rear_left.echo;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate pin 21"), "got: {err}");
        assert!(err.contains("motion_pin"), "got: {err}");
    }

    #[test]
    fn test_echo_timeout_order() {
        let mut bp = ServerBlueprint::default();
        bp.hardware.echo_end_timeout_ms = 5;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("echo_end_timeout_ms"), "got: {err}");
    }

    #[test]
    fn test_range_violation_is_reported() {
        let mut bp = ServerBlueprint::default();
        bp.simulation.motion_probability = 2.0;
        let err = validate(&bp).unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { .. }));
        assert!(err.to_string().contains("simulation"), "got: {err}");
    }

    #[test]
    fn test_empty_route_rejected() {
        let mut bp = ServerBlueprint::default();
        bp.position.route.clear();
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_empty_sink_name() {
        let mut bp = ServerBlueprint::default();
        bp.sinks.push(network_sink("", "127.0.0.1:9000"));
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut bp = ServerBlueprint::default();
        bp.sinks.push(network_sink("uplink", "127.0.0.1:9000"));
        bp.sinks.push(network_sink("uplink", "127.0.0.1:9001"));
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate sink name"), "got: {err}");
    }

    #[test]
    fn test_network_sink_addr() {
        let mut bp = ServerBlueprint::default();
        bp.sinks.push(network_sink("uplink", "not-an-address"));
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("invalid socket address"), "got: {err}");

        let mut bp = ServerBlueprint::default();
        let mut sink = network_sink("uplink", "127.0.0.1:9000");
        sink.params.remove("addr");
        bp.sinks.push(sink);
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("requires 'addr'"), "got: {err}");
    }

    #[test]
    fn test_network_sink_format() {
        let mut bp = ServerBlueprint::default();
        let mut sink = network_sink("uplink", "127.0.0.1:9000");
        sink.params.insert("format".into(), "xml".into());
        bp.sinks.push(sink);
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("unknown format"), "got: {err}");
    }
}
