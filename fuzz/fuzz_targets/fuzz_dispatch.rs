#![no_main]

use libfuzzer_sys::fuzz_target;
use voltage_rtu_slave::checksum;
use voltage_rtu_slave::{DispatchOutcome, Dispatcher, RegisterStore, RtuFrame, SlaveAddress};

fuzz_target!(|data: &[u8]| {
    let registers = RegisterStore::new(37);
    let Ok(address) = SlaveAddress::new(1) else {
        return;
    };
    let dispatcher = Dispatcher::new(address, registers);

    // Raw bytes exercise the drop paths
    let _ = dispatcher.dispatch(data);

    // With a valid CRC every frame reaches the function decoder
    let mut body = data.to_vec();
    body.truncate(254);
    if let Some(first) = body.first_mut() {
        *first = 1;
    }
    let Ok(mut frame) = RtuFrame::from_slice(&body) else {
        return;
    };
    if checksum::append(&mut frame).is_err() {
        return;
    }

    if let Ok(DispatchOutcome::Response(response)) = dispatcher.dispatch(frame.as_slice()) {
        assert!(checksum::verify(response.as_slice()));
        assert_eq!(response.slave_address(), Some(1));
    }
});
