#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use voltage_rtu_slave::{Dispatcher, FrameAssembler, RegisterStore, SlaveAddress};

#[derive(Debug, Arbitrary)]
enum Event {
    Byte(u8),
    Idle,
}

fuzz_target!(|events: Vec<Event>| {
    let Ok(address) = SlaveAddress::new(1) else {
        return;
    };
    let dispatcher = Dispatcher::new(address, RegisterStore::new(37));
    let mut assembler = FrameAssembler::new();

    for event in events {
        match event {
            Event::Byte(b) => {
                assembler.push_byte(b);
            }
            Event::Idle => {
                if let Some(frame) = assembler.on_idle_timeout() {
                    let _ = dispatcher.dispatch(frame);
                    assembler.complete();
                }
            }
        }
        assert!(assembler.len() <= voltage_rtu_slave::MAX_RTU_FRAME_SIZE);
    }
});
