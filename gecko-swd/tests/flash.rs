// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use pretty_assertions::assert_eq;

use gecko_core::efm32::MscStatus;
use gecko_swd::flash::{Operation, ProgressEvent};
use gecko_swd::sim::SimTarget;
use gecko_swd::{Config, DebugInterface, SwdError};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn connect_with<'a>(
    target: &'a mut SimTarget,
    config: &Config,
) -> DebugInterface<&'a mut SimTarget> {
    init();
    let mut debug = DebugInterface::connect(target, config).unwrap();
    debug.halt().unwrap();
    debug.flash_unlock().unwrap();
    debug
}

fn connect(target: &mut SimTarget) -> DebugInterface<&mut SimTarget> {
    connect_with(target, &Config::immediate())
}

#[test]
fn unlock_and_lock() {
    let mut target = SimTarget::default();
    let mut debug = connect(&mut target);
    let transport = debug.mem_ap().dp_mut().transport_mut();
    assert!(transport.flash_write_enabled());

    debug.flash_lock().unwrap();
    drop(debug);
    assert!(!target.flash_write_enabled());
}

#[test]
fn erase_whole_flash() {
    let mut target = SimTarget::default()
        .with_memory_word(0x0000_0100, 0)
        .with_memory_word(0x0001_FFFC, 0x1234_5678)
        .with_flash_busy_polls(3);
    let mut debug = connect(&mut target);

    let mut events = Vec::new();
    debug
        .flash_erase(128, 512, |event| events.push(event))
        .unwrap();
    assert_eq!(debug.read_mem(0x0000_0100).unwrap(), 0xFFFF_FFFF);
    drop(debug);

    let pages = target.erased_pages();
    assert_eq!(pages.len(), 256);
    assert_eq!(pages[0], 0);
    assert_eq!(pages[1], 0x200);
    assert_eq!(pages[255], 0x1_FE00);
    assert_eq!(target.memory_word(0x0001_FFFC), 0xFFFF_FFFF);

    assert_eq!(
        events.first(),
        Some(&ProgressEvent::Started {
            operation: Operation::Erase,
            total: 256,
        })
    );
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::Finished {
            operation: Operation::Erase,
            total: 256,
        })
    );
    let advanced = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::Advanced { .. }))
        .count();
    assert_eq!(advanced, 31);
    assert_eq!(
        events[1],
        ProgressEvent::Advanced {
            operation: Operation::Erase,
            done: 8,
            total: 256,
        }
    );
}

#[test]
fn erase_rejects_zero_page_size() {
    let mut target = SimTarget::default();
    let mut debug = connect(&mut target);
    assert!(matches!(
        debug.flash_erase(128, 0, |_| {}),
        Err(SwdError::OperationFailed(_))
    ));
}

#[test]
fn erase_rejects_out_of_range_flash_size() {
    let mut target = SimTarget::default();
    let mut debug = connect(&mut target);
    assert!(matches!(
        debug.flash_erase(u32::MAX, 512, |_| {}),
        Err(SwdError::OperationFailed(_))
    ));
    drop(debug);
    assert!(target.erased_pages().is_empty());
}

#[test]
fn program_words_in_order() {
    let mut target = SimTarget::default();
    let mut debug = connect(&mut target);

    let words = [0x2000_2000, 0x0000_00C1, 0xDEAD_BEEF];
    debug.flash_program(&words, |_| {}).unwrap();
    assert_eq!(debug.read_mem(0x4).unwrap(), 0x0000_00C1);
    drop(debug);

    let expected: [(u32, u32); 3] = [(0x0, 0x2000_2000), (0x4, 0x0000_00C1), (0x8, 0xDEAD_BEEF)];
    assert_eq!(target.programmed_words(), &expected);
    assert_eq!(target.memory_word(0xC), 0xFFFF_FFFF);
}

#[test]
fn program_at_offset_reports_progress() {
    let mut target = SimTarget::default();
    let mut debug = connect(&mut target);

    let words: Vec<u32> = (0..40).collect();
    let mut events = Vec::new();
    debug
        .flash_program_at(0x400, &words, |event| events.push(event))
        .unwrap();
    drop(debug);

    assert_eq!(target.memory_word(0x400 + 39 * 4), 39);
    assert_eq!(
        events,
        vec![
            ProgressEvent::Started {
                operation: Operation::Program,
                total: 160,
            },
            ProgressEvent::Advanced {
                operation: Operation::Program,
                done: 64,
                total: 160,
            },
            ProgressEvent::Advanced {
                operation: Operation::Program,
                done: 128,
                total: 160,
            },
            ProgressEvent::Finished {
                operation: Operation::Program,
                total: 160,
            },
        ]
    );
}

#[test]
fn program_rejects_unaligned_address() {
    let mut target = SimTarget::default();
    let mut debug = connect(&mut target);
    assert!(matches!(
        debug.flash_program_at(0x2, &[0], |_| {}),
        Err(SwdError::OperationFailed(_))
    ));
}

#[test]
fn program_rejects_wrap_past_end_of_address_space() {
    let mut target = SimTarget::default();
    let mut debug = connect(&mut target);
    assert!(matches!(
        debug.flash_program_at(0xFFFF_FFF8, &[1, 2, 3], |_| {}),
        Err(SwdError::OperationFailed(_))
    ));
    drop(debug);
    assert!(target.programmed_words().is_empty());
}

#[test]
fn stuck_busy_times_out() {
    let mut target = SimTarget::default().with_stuck_busy();
    let mut config = Config::immediate();
    config.timing.flash_busy_polls = 25;
    let mut debug = connect_with(&mut target, &config);

    let err = debug.flash_program(&[0], |_| {}).unwrap_err();
    match err {
        SwdError::FlashBusyTimeout {
            address,
            status,
            polls,
        } => {
            assert_eq!(address, 0);
            assert_eq!(polls, 25);
            assert!(MscStatus::from(status).busy());
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(err.is_timeout());
}

#[test]
fn locked_page_faults() {
    let mut target = SimTarget::default().with_locked_flash();
    let mut debug = connect(&mut target);

    let err = debug.flash_erase(128, 512, |_| {}).unwrap_err();
    match err {
        SwdError::FlashFault { address, status } => {
            assert_eq!(address, 0);
            assert!(MscStatus::from(status).locked());
        }
        other => panic!("unexpected error {other}"),
    }
    drop(debug);
    assert!(target.erased_pages().is_empty());
}

#[test]
fn write_outside_flash_faults() {
    let mut target = SimTarget::default().with_part(71, 890, 1, 16);
    let mut debug = connect(&mut target);

    let words = vec![0; 257];
    let err = debug.flash_program(&words, |_| {}).unwrap_err();
    match err {
        SwdError::FlashFault { address, status } => {
            assert_eq!(address, 0x400);
            assert!(MscStatus::from(status).invaddr());
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn erasing_erased_flash_is_idempotent() {
    let mut target = SimTarget::default().with_flash_busy_polls(10);
    let mut debug = connect(&mut target);

    debug.flash_erase(128, 512, |_| {}).unwrap();
    debug.flash_erase(128, 512, |_| {}).unwrap();
    let words = debug.mem_ap().read_block(0, 256).unwrap();
    assert!(words.iter().all(|&word| word == 0xFFFF_FFFF));
    drop(debug);

    assert_eq!(target.erased_pages().len(), 512);
    assert!(target.programmed_words().is_empty());
}

#[test]
fn three_word_image_on_128k_part() {
    let mut target = SimTarget::default();
    let mut debug = connect(&mut target);

    debug.flash_erase(128, 512, |_| {}).unwrap();
    debug
        .flash_program(&[0x1111_1111, 0x2222_2222, 0x3333_3333], |_| {})
        .unwrap();
    drop(debug);

    assert_eq!(target.erased_pages().len(), 256);
    let expected: [(u32, u32); 3] = [(0x0, 0x1111_1111), (0x4, 0x2222_2222), (0x8, 0x3333_3333)];
    assert_eq!(target.programmed_words(), &expected);
}
