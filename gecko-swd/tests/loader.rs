// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use pretty_assertions::assert_eq;
use test_case::test_case;

use gecko_core::arm::scs::CoreRegister;
use gecko_core::efm32::Efm32Family;
use gecko_loader::{Command, RAM_START, Request, ResultCode, STATE_LOCATION, payload_crc};
use gecko_swd::flash::{Operation, ProgressEvent};
use gecko_swd::loader::{FlashLoaderSession, LoaderImage};
use gecko_swd::sim::{LOADER_BUFFER, LOADER_BUFFER_SIZE, LOADER_ENTRY, LOADER_STACK, SimTarget};
use gecko_swd::{Config, DebugInterface, SwdError};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn start_loader_with<'a>(
    target: &'a mut SimTarget,
    config: &Config,
) -> (
    DebugInterface<&'a mut SimTarget>,
    Result<FlashLoaderSession, SwdError>,
) {
    init();
    let image = LoaderImage::from_words(target.loader_image_words()).unwrap();
    let mut debug = DebugInterface::connect(target, config).unwrap();
    debug
        .upload_flash_loader(Efm32Family::Gecko, &image)
        .unwrap();
    let session = debug.verify_flash_loader_ready();
    (debug, session)
}

fn start_loader(target: &mut SimTarget) -> (DebugInterface<&mut SimTarget>, FlashLoaderSession) {
    let (mut debug, session) = start_loader_with(target, &Config::immediate());
    let session = session.unwrap();
    debug.flash_unlock().unwrap();
    (debug, session)
}

#[test]
fn image_needs_stack_pointer_and_entry() {
    assert!(matches!(
        LoaderImage::from_words(vec![RAM_START]),
        Err(SwdError::InvalidImage(_))
    ));

    let bytes = [0x00, 0x20, 0x00, 0x20, 0x31, 0x00, 0x00, 0x20, 0xAA];
    let image = LoaderImage::from_bytes(&bytes).unwrap();
    assert_eq!(image.stack_pointer(), 0x2000_2000);
    assert_eq!(image.entry_point(), 0x2000_0031);
    assert_eq!(image.words()[2], 0xFFFF_FFAA);
    assert_eq!(image.len_bytes(), 12);
}

#[test]
fn upload_seeds_core_and_runs_loader() {
    let mut target = SimTarget::default();
    let (debug, session) = start_loader(&mut target);
    drop(debug);

    assert_eq!(target.memory_word(RAM_START), LOADER_STACK);
    assert_eq!(target.memory_word(RAM_START + 4), LOADER_ENTRY);
    assert_eq!(target.core_register(CoreRegister::Sp), LOADER_STACK);
    assert_eq!(target.core_register(CoreRegister::Pc), LOADER_ENTRY);
    assert!(target.loader_running());
    assert!(!target.is_halted());

    assert_eq!(session.buffer_address(), LOADER_BUFFER);
    assert_eq!(session.buffer_size(), LOADER_BUFFER_SIZE);
    assert_eq!(session.mailbox().status(), STATE_LOCATION);
}

#[test_case(0; "ready at once")]
#[test_case(1; "one not ready poll")]
#[test_case(999; "ready on last poll")]
fn loader_ready_within_budget(polls: u32) {
    let mut target = SimTarget::default().with_loader_ready_polls(polls);
    let (_debug, session) = start_loader_with(&mut target, &Config::immediate());
    assert_eq!(session.unwrap().buffer_size(), LOADER_BUFFER_SIZE);
}

#[test_case(1000; "budget exhausted")]
#[test_case(2000; "well over budget")]
fn loader_never_ready(polls: u32) {
    let mut target = SimTarget::default().with_loader_ready_polls(polls);
    let (_debug, session) = start_loader_with(&mut target, &Config::immediate());

    let err = session.unwrap_err();
    assert_eq!(
        err,
        SwdError::FlashLoaderNotReady {
            status: 0,
            polls: 1000,
        }
    );
    assert!(err.is_timeout());
}

#[test]
fn loader_upload_needs_reset_to_complete() {
    init();
    let mut target = SimTarget::default().with_reset_polls(5000);
    let image = LoaderImage::from_words(target.loader_image_words()).unwrap();
    let mut debug = DebugInterface::connect(&mut target, &Config::immediate()).unwrap();

    assert!(matches!(
        debug.upload_flash_loader(Efm32Family::Gecko, &image),
        Err(SwdError::ResetTimeout { .. })
    ));
    drop(debug);
    assert!(!target.loader_running());
}

#[test]
fn erase_with_loader() {
    let mut target = SimTarget::default()
        .with_memory_word(0x0, 0)
        .with_memory_word(0x3FC, 0);
    let (mut debug, session) = start_loader(&mut target);

    let mut events = Vec::new();
    debug
        .erase_pages_with_loader(&session, 0, 2, |event| events.push(event))
        .unwrap();
    drop(debug);

    assert_eq!(target.erased_pages(), &[0, 0x200]);
    assert_eq!(target.memory_word(0x3FC), 0xFFFF_FFFF);
    assert_eq!(
        target.loader_requests(),
        &[Request::ErasePages {
            address: 0,
            count: 2,
        }]
    );
    assert_eq!(
        events,
        vec![
            ProgressEvent::Started {
                operation: Operation::Erase,
                total: 2,
            },
            ProgressEvent::Finished {
                operation: Operation::Erase,
                total: 2,
            },
        ]
    );
}

#[test]
fn program_with_loader_in_buffer_sized_chunks() {
    let mut target = SimTarget::default().with_loader_buffer(LOADER_BUFFER, 16);
    let (mut debug, session) = start_loader(&mut target);

    let bytes: Vec<u8> = (0..40).collect();
    let mut events = Vec::new();
    debug
        .flash_program_with_loader(&session, 0x800, &bytes, |event| events.push(event))
        .unwrap();
    drop(debug);

    assert_eq!(
        target.loader_requests(),
        &[
            Request::write(0x800, &bytes[0..16]),
            Request::write(0x810, &bytes[16..32]),
            Request::write(0x820, &bytes[32..40]),
        ]
    );
    assert_eq!(target.memory_word(0x800), 0x0302_0100);
    assert_eq!(target.memory_word(0x824), 0x2726_2524);
    assert_eq!(target.memory_word(0x828), 0xFFFF_FFFF);

    let done: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Advanced { done, .. } => Some(*done),
            _ => None,
        })
        .collect();
    assert_eq!(done, vec![16, 32]);
}

#[test]
fn write_request_carries_payload_crc() {
    let payload = [1, 2, 3, 4, 5, 6];
    assert_eq!(
        Request::write(0x100, &payload),
        Request::Write {
            address: 0x100,
            length: 6,
            crc: payload_crc(&payload),
        }
    );
}

#[test]
fn loader_error_reported_with_result_code() {
    let mut target = SimTarget::default().with_loader_failing(ResultCode::FlashFault);
    let (mut debug, session) = start_loader(&mut target);

    let err = debug
        .erase_pages_with_loader(&session, 0, 1, |_| {})
        .unwrap_err();
    assert_eq!(
        err,
        SwdError::LoaderRequestFailed {
            command: Command::ErasePages,
            code: ResultCode::FlashFault.to_word(),
        }
    );
}

#[test]
fn locked_flash_fails_loader_write() {
    let mut target = SimTarget::default().with_locked_flash();
    let (mut debug, session) = start_loader(&mut target);

    let err = debug
        .flash_program_with_loader(&session, 0, &[0; 8], |_| {})
        .unwrap_err();
    assert_eq!(
        err,
        SwdError::LoaderRequestFailed {
            command: Command::Write,
            code: ResultCode::FlashFault.to_word(),
        }
    );
}

#[test]
fn stalled_loader_times_out() {
    let mut target = SimTarget::default().with_loader_stalled();
    let mut config = Config::immediate();
    config.timing.loader_request_polls = 20;
    let (mut debug, session) = start_loader_with(&mut target, &config);
    let session = session.unwrap();

    let err = debug
        .erase_pages_with_loader(&session, 0, 1, |_| {})
        .unwrap_err();
    assert_eq!(
        err,
        SwdError::LoaderRequestTimeout {
            command: Command::ErasePages,
            status: 2,
            polls: 20,
        }
    );
}

#[test]
fn oversized_payload_rejected() {
    let mut target = SimTarget::default().with_loader_buffer(LOADER_BUFFER, 16);
    let (mut debug, session) = start_loader(&mut target);

    let payload = [0; 20];
    let request = Request::write(0, &payload);
    assert!(matches!(
        debug.loader_request(&session, &request, &payload),
        Err(SwdError::OperationFailed(_))
    ));
    drop(debug);
    assert!(target.loader_requests().is_empty());
}

#[test]
fn program_rejects_wrap_past_end_of_address_space() {
    let mut target = SimTarget::default();
    let (mut debug, session) = start_loader(&mut target);

    assert!(matches!(
        debug.flash_program_with_loader(&session, 0xFFFF_FFF0, &[0; 32], |_| {}),
        Err(SwdError::OperationFailed(_))
    ));
    drop(debug);
    assert!(target.loader_requests().is_empty());
}

#[test]
fn unusable_loader_buffer_rejected() {
    let mut target = SimTarget::default().with_loader_buffer(0xFFFF_FF00, 0x200);
    let (_debug, session) = start_loader_with(&mut target, &Config::immediate());
    assert!(matches!(session, Err(SwdError::OperationFailed(_))));
}
