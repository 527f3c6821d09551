// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use embassy_time::Duration;
use pretty_assertions::assert_eq;

use gecko_core::efm32::{Efm32Details, MemInfo, PartInfo, Pid2, Pid3};
use gecko_loader::Request;
use gecko_swd::flash::{Operation, ProgressEvent};
use gecko_swd::loader::LoaderImage;
use gecko_swd::sim::SimTarget;
use gecko_swd::{Config, FirmwareImage, ProgramStats, Strategy, SwdError, program_image};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn firmware(len: usize) -> FirmwareImage {
    let bytes: Vec<u8> = (0..len).map(|ii| (ii * 7 + 3) as u8).collect();
    FirmwareImage::from_bytes(&bytes)
}

fn assert_programmed(target: &SimTarget, image: &FirmwareImage) {
    for (ii, word) in image.words().iter().enumerate() {
        let addr = (ii * 4) as u32;
        assert_eq!(target.memory_word(addr), *word, "word at 0x{addr:08X}");
    }
}

fn program_direct(
    target: &mut SimTarget,
    image: &FirmwareImage,
) -> Result<ProgramStats, SwdError> {
    init();
    let config = Config::immediate();
    program_image(target, &config, image, &Strategy::Direct, |_| {})
}

#[test]
fn image_padded_to_words() {
    let image = FirmwareImage::from_bytes(&[1, 2, 3]);
    assert_eq!(image.len_bytes(), 4);
    assert_eq!(image.as_bytes(), &[1, 2, 3, 0xFF]);
    assert_eq!(image.words(), vec![0xFF03_0201]);
    assert_eq!(image.pages(512), 1);
    assert_eq!(firmware(1025).pages(512), 3);

    let image = FirmwareImage::from_words(&[0x1122_3344]);
    assert_eq!(image.as_bytes(), &[0x44, 0x33, 0x22, 0x11]);
}

#[test]
fn direct_programming_end_to_end() {
    init();
    let mut target = SimTarget::default()
        .with_memory_word(0x1000, 0)
        .with_flash_busy_polls(2);
    let image = firmware(1000);

    let mut events = Vec::new();
    let stats = program_image(
        &mut target,
        &Config::immediate(),
        &image,
        &Strategy::Direct,
        |event| events.push(event),
    )
    .unwrap();

    assert_eq!(stats.bytes, 1000);
    assert_eq!(stats.part.part_name(), "EFM32G890F128");
    assert_programmed(&target, &image);

    // Everything was erased, not just the pages the image covers
    assert_eq!(target.erased_pages().len(), 256);
    assert_eq!(target.memory_word(0x1000), 0xFFFF_FFFF);
    assert_eq!(target.programmed_words().len(), 250);

    assert!(!target.flash_write_enabled());
    assert_eq!(target.system_resets(), 1);

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
            operation: Operation::Program,
            total: 1000,
        })
    );
}

#[test]
fn loader_programming_end_to_end() {
    init();
    let mut target = SimTarget::default().with_loader_ready_polls(3);
    let loader = LoaderImage::from_words(target.loader_image_words()).unwrap();
    let image = firmware(3000);

    let stats = program_image(
        &mut target,
        &Config::immediate(),
        &image,
        &Strategy::Loader(loader),
        |_| {},
    )
    .unwrap();

    assert_eq!(stats.bytes, 3000);
    assert_programmed(&target, &image);

    // Only the pages the image covers are erased
    assert_eq!(
        target.erased_pages(),
        &[0, 0x200, 0x400, 0x600, 0x800, 0xA00]
    );

    let requests = target.loader_requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(
        requests[0],
        Request::ErasePages {
            address: 0,
            count: 6,
        }
    );
    assert_eq!(requests[1], Request::write(0, &image.as_bytes()[..1024]));
    assert_eq!(requests[3], Request::write(2048, &image.as_bytes()[2048..]));

    assert!(!target.flash_write_enabled());
    assert_eq!(target.system_resets(), 1);
    assert!(!target.loader_running());
}

#[test]
fn empty_image_rejected_before_connecting() {
    let mut target = SimTarget::default();
    let image = FirmwareImage::from_bytes(&[]);

    let err = program_direct(&mut target, &image).unwrap_err();
    assert!(matches!(err, SwdError::InvalidImage(_)));
    assert!(target.transactions().is_empty());
}

#[test]
fn oversized_image_leaves_flash_untouched() {
    init();
    let mut target = SimTarget::default().with_part(71, 890, 1, 16);
    let image = firmware(2048);

    let err = program_direct(&mut target, &image).unwrap_err();
    assert_eq!(
        err,
        SwdError::ImageTooLarge {
            image_bytes: 2048,
            flash_bytes: 1024,
        }
    );
    assert!(target.erased_pages().is_empty());
    assert!(!target.flash_write_enabled());
}

#[test]
fn unsupported_part_leaves_flash_untouched() {
    init();
    let mut target = SimTarget::default().with_part(0x10, 1, 64, 8);

    let err = program_direct(&mut target, &firmware(16)).unwrap_err();
    assert_eq!(err, SwdError::UnsupportedPart { family: 0x10 });
    assert!(target.erased_pages().is_empty());
}

#[test]
fn power_up_failure_stops_programming() {
    init();
    let mut target = SimTarget::default().refusing_power_up();

    let err = program_direct(&mut target, &firmware(16)).unwrap_err();
    assert!(matches!(err, SwdError::PowerUpFailure { .. }));
}

#[test]
fn stats_throughput() {
    let part = Efm32Details::from_raw(
        PartInfo::from(0x1147_0000 | 890),
        MemInfo::from(0x0010_0080),
        Pid2::from(0x0A),
        Pid3::from(0x20),
    )
    .unwrap();
    let stats = ProgramStats {
        part,
        bytes: 4096,
        elapsed: Duration::from_secs(2),
    };

    assert_eq!(stats.throughput(), 2048);
    assert_eq!(stats.kib_per_second(), 2.0);
    assert_eq!(
        stats.to_string(),
        "Programmed 4096 bytes to EFM32G890F128 in 2.000s (2.00 KiB/s)"
    );
}

#[test]
fn strategy_names() {
    assert_eq!(Strategy::Direct.to_string(), "direct");
    let loader = LoaderImage::from_words(vec![0x2000_2000, 0x2000_0031]).unwrap();
    assert_eq!(Strategy::Loader(loader).to_string(), "flash loader");
}
