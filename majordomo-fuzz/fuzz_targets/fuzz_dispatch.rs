#![no_main]

use std::time::Instant;

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use majordomo_core::broker::BrokerEngine;
use majordomo_core::config::BrokerConfig;
use majordomo_core::envelope::split_address;

fuzz_target!(|data: &[u8]| {
    // Re-frame arbitrary bytes into a frame list: 0x00 splits frames, so
    // empty delimiter frames occur naturally.
    let frames: Vec<Bytes> = data.split(|b| *b == 0).map(Bytes::copy_from_slice).collect();

    // The codec must never panic, whatever the envelope looks like.
    let _ = split_address(frames.clone());

    // Neither must the dispatcher, fed the same garbage twice with a tick
    // in between.
    let (front_tx, _front_rx) = flume::unbounded();
    let (back_tx, _back_rx) = flume::unbounded();
    let now = Instant::now();
    let mut engine = BrokerEngine::new(BrokerConfig::default(), front_tx, back_tx, now);
    engine.handle_frames(now, frames.clone());
    engine.on_tick(now + engine.config().hb_interval);
    engine.handle_frames(now, frames);
});
