// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use pretty_assertions::assert_eq;
use serde_json::json;

use gecko_loader::Command;
use gecko_swd::{Config, SwdError, Timing};

#[test]
fn default_timing() {
    let timing = Timing::default();
    assert_eq!(timing.settle_ms, 100);
    assert_eq!(timing.block_write_pacing_us, 10_000);
    assert_eq!(timing.half_word_pacing_us, 1_000);
    assert_eq!(timing.reset_polls, 1000);
    assert_eq!(timing.register_ready_polls, 1000);
    assert_eq!(timing.flash_busy_polls, 100_000);
    assert_eq!(timing.loader_ready_polls, 1000);
    assert_eq!(timing.loader_request_polls, 1_000_000);
}

#[test]
fn immediate_keeps_poll_budgets() {
    let timing = Timing::immediate();
    assert_eq!(timing.settle_ms, 0);
    assert_eq!(timing.block_write_pacing_us, 0);
    assert_eq!(timing.half_word_pacing_us, 0);
    assert_eq!(timing.reset_polls, Timing::default().reset_polls);
    assert_eq!(Config::immediate().ap_index, 0);
}

#[test]
fn config_round_trips_through_json() {
    let mut config = Config::default();
    config.ap_index = 1;
    config.timing.loader_ready_polls = 50;

    let text = serde_json::to_string(&config).unwrap();
    let parsed: Config = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn missing_fields_take_defaults() {
    let config: Config = serde_json::from_value(json!({"ap_index": 2})).unwrap();
    assert_eq!(config.ap_index, 2);
    assert_eq!(config.timing, Timing::default());

    let config: Config = serde_json::from_value(json!({})).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn error_serializes_kind_and_detail() {
    let err = SwdError::ResetTimeout {
        dhcsr: 0x0203_0003,
        polls: 1000,
    };
    assert_eq!(
        serde_json::to_value(&err).unwrap(),
        json!({"kind": "Reset Timeout", "detail": "DHCSR 0x02030003 after 1000 polls"})
    );

    assert_eq!(
        serde_json::to_value(SwdError::FaultAck).unwrap(),
        json!({"kind": "Fault ACK", "detail": ""})
    );
}

#[test]
fn error_display() {
    assert_eq!(
        SwdError::FlashFault {
            address: 0x200,
            status: 0x2,
        }
        .to_string(),
        "Flash Fault: 0x00000200, MSC_STATUS 0x00000002"
    );
    assert_eq!(SwdError::WaitAck.to_string(), "Wait ACK");
    assert_eq!(
        SwdError::LoaderRequestTimeout {
            command: Command::Write,
            status: 2,
            polls: 20,
        }
        .to_string(),
        format!(
            "Loader Request Timeout: {}: status 2 after 20 polls",
            Command::Write
        )
    );
}

#[test]
fn error_classification() {
    assert!(SwdError::WaitAck.requires_retry());
    assert!(!SwdError::WaitAck.requires_reset());
    assert!(SwdError::ReadParity.requires_reset());
    assert!(SwdError::Transport("usb".to_string()).requires_reset());
    let fault = SwdError::FlashFault {
        address: 0,
        status: 2,
    };
    assert!(!fault.requires_reset());
    let busy = SwdError::FlashBusyTimeout {
        address: 0,
        status: 1,
        polls: 10,
    };
    assert!(busy.is_timeout());
    assert!(!SwdError::UnsupportedPart { family: 1 }.is_timeout());
}
