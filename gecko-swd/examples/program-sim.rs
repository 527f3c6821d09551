// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! gecko-swd example - Programs a firmware image into a simulated EFM32
//!
//! This example demonstrates the whole programming flow: connect, identify
//! the part, upload and start a flash loader, erase, program, lock and reset.
//! It then reads the image back to verify it.
//!
//! To run this example:
//! - `RUST_LOG=info cargo run -p gecko-swd --features sim --example program-sim`
//! - optionally pass the path of a raw binary to program instead of the
//!   built-in test pattern
//! - pass `--direct` to program through the MSC instead of the loader

use log::{error, info};

use gecko_swd::flash::ProgressEvent;
use gecko_swd::loader::LoaderImage;
use gecko_swd::sim::SimTarget;
use gecko_swd::{Config, DebugInterface, FirmwareImage, Strategy, program_image};

fn main() {
    env_logger::init();

    let mut direct = false;
    let mut path = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--direct" => direct = true,
            _ => path = Some(arg),
        }
    }

    let bytes = match path {
        Some(path) => match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to read {path}: {e}");
                std::process::exit(1);
            }
        },
        None => (0..6000u32).map(|ii| (ii * 13 + 5) as u8).collect(),
    };
    let firmware = FirmwareImage::from_bytes(&bytes);

    let mut target = SimTarget::default().with_loader_ready_polls(5);
    let strategy = if direct {
        Strategy::Direct
    } else {
        match LoaderImage::from_words(target.loader_image_words()) {
            Ok(image) => Strategy::Loader(image),
            Err(e) => {
                error!("Bad flash loader: {e}");
                std::process::exit(1);
            }
        }
    };

    let stats = match program_image(
        &mut target,
        &Config::immediate(),
        &firmware,
        &strategy,
        report,
    ) {
        Ok(stats) => stats,
        Err(e) => {
            error!("Programming failed: {e}");
            std::process::exit(1);
        }
    };
    info!("✓ {stats}");

    // Read the image back through a fresh session
    let mut debug = match DebugInterface::connect(&mut target, &Config::immediate()) {
        Ok(debug) => debug,
        Err(e) => {
            error!("Failed to reconnect: {e}");
            std::process::exit(1);
        }
    };
    let words = firmware.words();
    match debug.mem_ap().read_block(0, words.len()) {
        Ok(read) if read == words => info!("✓ Verified {} words", words.len()),
        Ok(_) => {
            error!("Verification failed: flash contents differ from the image");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Failed to read back flash: {e}");
            std::process::exit(1);
        }
    }
}

fn report(event: ProgressEvent) {
    match event {
        ProgressEvent::Started { operation, total } => info!("{operation}: 0/{total}"),
        ProgressEvent::Advanced {
            operation,
            done,
            total,
        } => info!("{operation}: {done}/{total}"),
        ProgressEvent::Finished { operation, total } => info!("{operation}: {total}/{total} done"),
    }
}
