// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use pretty_assertions::assert_eq;
use test_case::test_case;

use gecko_core::Mcu;
use gecko_core::arm::scs::{Aircr, Demcr, Dhcsr};
use gecko_core::efm32::Efm32Family;
use gecko_swd::sim::SimTarget;
use gecko_swd::{Config, DebugInterface, SwdError, TargetRunState};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn connect(target: &mut SimTarget) -> DebugInterface<&mut SimTarget> {
    init();
    DebugInterface::connect(target, &Config::immediate()).unwrap()
}

#[test_case(0; "reset already clear")]
#[test_case(1; "one poll")]
#[test_case(999; "last poll in budget")]
fn reset_and_halt_within_budget(reset_polls: u32) {
    let mut target = SimTarget::default().with_reset_polls(reset_polls);
    let mut debug = connect(&mut target);

    debug.reset_and_halt().unwrap();
    assert_eq!(debug.run_state().unwrap(), TargetRunState::Halted);
    drop(debug);

    assert_eq!(target.demcr(), Demcr::VC_CORERESET);
    assert_eq!(target.local_resets(), 1);
    assert!(target.is_halted());
}

#[test_case(1000; "budget exhausted")]
#[test_case(5000; "well over budget")]
fn reset_and_halt_times_out(reset_polls: u32) {
    let mut target = SimTarget::default().with_reset_polls(reset_polls);
    let mut debug = connect(&mut target);

    let err = debug.reset_and_halt().unwrap_err();
    match err {
        SwdError::ResetTimeout { dhcsr, polls } => {
            assert_eq!(polls, 1000);
            assert_ne!(dhcsr & Dhcsr::S_RESET_ST, 0);
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(err.is_timeout());
}

#[test]
fn reset_and_halt_detects_running_core() {
    let mut target = SimTarget::default().ignoring_halt_on_reset();
    let mut debug = connect(&mut target);

    let err = debug.reset_and_halt().unwrap_err();
    match err {
        SwdError::HaltVerificationFailure { dhcsr } => assert_eq!(dhcsr & Dhcsr::S_HALT, 0),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn reset_poll_budget_is_configurable() {
    init();
    let mut target = SimTarget::default().with_reset_polls(10);
    let mut config = Config::immediate();
    config.timing.reset_polls = 5;
    let mut debug = DebugInterface::connect(&mut target, &config).unwrap();

    assert_eq!(
        debug.reset_and_halt().unwrap_err(),
        SwdError::ResetTimeout {
            dhcsr: Dhcsr::S_RESET_ST
                | Dhcsr::S_REGRDY
                | Dhcsr::S_HALT
                | Dhcsr::C_HALT
                | Dhcsr::C_DEBUGEN,
            polls: 5,
        }
    );
}

#[test]
fn halt_run_and_step() {
    let mut target = SimTarget::default();
    let mut debug = connect(&mut target);
    assert_eq!(debug.run_state().unwrap(), TargetRunState::Running);

    debug.halt().unwrap();
    assert_eq!(debug.run_state().unwrap(), TargetRunState::Halted);

    debug.step().unwrap();
    assert_eq!(debug.run_state().unwrap(), TargetRunState::Halted);

    debug.run().unwrap();
    assert_eq!(debug.run_state().unwrap(), TargetRunState::Running);

    debug.halt().unwrap();
    debug.unhalt().unwrap();
    assert_eq!(debug.run_state().unwrap(), TargetRunState::Running);
}

#[test]
fn run_state_reports_reset() {
    let mut target = SimTarget::default().with_reset_polls(2);
    let mut debug = connect(&mut target);

    debug
        .mem_ap()
        .write_register::<Aircr>(Aircr::local_reset())
        .unwrap();
    assert_eq!(debug.run_state().unwrap(), TargetRunState::InReset);
    assert_eq!(debug.run_state().unwrap(), TargetRunState::InReset);
    assert_eq!(debug.run_state().unwrap(), TargetRunState::Running);
}

#[test]
fn system_reset_requested() {
    let mut target = SimTarget::default();
    let mut debug = connect(&mut target);
    debug.system_reset().unwrap();
    drop(debug);
    assert_eq!(target.system_resets(), 1);
    assert_eq!(target.local_resets(), 0);
}

#[test]
fn identify_default_part() {
    let mut target = SimTarget::default();
    let mut debug = connect(&mut target);
    assert_eq!(debug.mcu(), None);
    assert_eq!(debug.mem_ap().tar_wrap(), 0x3FF);

    let details = debug.identify().unwrap();
    assert_eq!(details.part_name(), "EFM32G890F128");
    assert_eq!(
        details.to_string(),
        "EFM32G890F128 (rev C, production ID 17)"
    );
    assert_eq!(details.flash_size_bytes(), 128 * 1024);
    assert_eq!(details.page_count(), 256);
    assert_eq!(details.ram_kib(), 16);

    match debug.mcu() {
        Some(Mcu::Efm32 {
            idcode,
            details: found,
        }) => {
            assert_eq!(idcode, debug.idcode());
            assert_eq!(found, details);
        }
        other => panic!("unexpected MCU {other:?}"),
    }
    assert_eq!(debug.mem_ap().tar_wrap(), 0xFFF);
}

#[test_case(72, Efm32Family::GiantGecko, 4096, 0xFFF; "giant gecko")]
#[test_case(73, Efm32Family::TinyGecko, 512, 0xFFF; "tiny gecko")]
#[test_case(74, Efm32Family::LeopardGecko, 2048, 0xFFF; "leopard gecko")]
#[test_case(76, Efm32Family::ZeroGecko, 1024, 0x3FF; "zero gecko")]
fn identify_families(code: u8, family: Efm32Family, page_size: u32, tar_wrap: u32) {
    let mut target = SimTarget::default().with_part(code, 222, 32, 4);
    let mut debug = connect(&mut target);

    let details = debug.identify().unwrap();
    assert_eq!(details.family(), family);
    assert_eq!(details.page_size(), page_size);
    assert_eq!(details.page_count(), 32 * 1024 / page_size);
    assert_eq!(debug.mem_ap().tar_wrap(), tar_wrap);
}

#[test]
fn identify_rejects_unknown_family() {
    let mut target = SimTarget::default().with_part(0x50, 100, 64, 8);
    let mut debug = connect(&mut target);

    assert_eq!(
        debug.identify().unwrap_err(),
        SwdError::UnsupportedPart { family: 0x50 }
    );
    assert_eq!(debug.mcu(), Some(Mcu::Unknown(debug.idcode())));
    assert_eq!(debug.mcu().and_then(|mcu| mcu.flash_base()), None);
}

#[test]
fn memory_access_through_debug_interface() {
    let mut target = SimTarget::default();
    let mut debug = connect(&mut target);

    debug.write_mem(0x2000_0010, 0xCAFE_F00D).unwrap();
    assert_eq!(debug.read_mem(0x2000_0010).unwrap(), 0xCAFE_F00D);

    // Flash is not writable over the bus
    debug.write_mem(0x0000_0100, 0).unwrap();
    assert_eq!(debug.read_mem(0x0000_0100).unwrap(), 0xFFFF_FFFF);
}
