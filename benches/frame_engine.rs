//! Benchmarks for the RTU slave frame engine
//!
//! CRC over typical frame sizes, dispatch of each supported function, and a
//! full byte-by-byte assembly and dispatch cycle.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use voltage_rtu_slave::checksum;
use voltage_rtu_slave::sync::{registers_to_struct, struct_to_registers};
use voltage_rtu_slave::{
    Dispatcher, FrameAssembler, FrameBuilder, ModbusData, RegisterMapped, RegisterStore,
    RegisterTable, SlaveAddress,
};

fn dispatcher() -> Dispatcher {
    Dispatcher::new(
        SlaveAddress::new(1).unwrap(),
        RegisterStore::new(ModbusData::WORD_COUNT),
    )
}

fn bench_crc(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc16");
    for size in [8usize, 64, 254] {
        let data: Vec<u8> = (0..size).map(|i| i as u8).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| checksum::compute(black_box(data)))
        });
    }
    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let dispatcher = dispatcher();
    let requests = [
        ("fc03_read_37", FrameBuilder::read_holding_registers(1, 0, 37).unwrap()),
        ("fc05_coil_on", FrameBuilder::write_single_coil(1, 10, true).unwrap()),
        ("fc06_write", FrameBuilder::write_single_register(1, 5, 1200).unwrap()),
        (
            "fc16_write_8",
            FrameBuilder::write_multiple_registers(1, 17, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap(),
        ),
        ("fc03_out_of_range", FrameBuilder::read_holding_registers(1, 36, 2).unwrap()),
        ("foreign_address", FrameBuilder::read_holding_registers(2, 0, 2).unwrap()),
    ];

    let mut group = c.benchmark_group("dispatch");
    for (name, request) in &requests {
        group.bench_function(*name, |b| {
            b.iter(|| dispatcher.dispatch(black_box(request.as_slice())).unwrap())
        });
    }
    group.finish();
}

fn bench_sync(c: &mut Criterion) {
    let data = ModbusData::default();
    let mut table = RegisterTable::new(ModbusData::WORD_COUNT);

    c.bench_function("sync_round_trip", |b| {
        b.iter(|| {
            let mut restored = ModbusData::default();
            struct_to_registers(black_box(&data), &mut table, 0);
            registers_to_struct(&table, &mut restored, 0);
            restored
        })
    });
}

fn bench_frame_cycle(c: &mut Criterion) {
    let dispatcher = dispatcher();
    let request = FrameBuilder::read_holding_registers(1, 0, 10).unwrap();

    c.bench_function("assemble_and_dispatch", |b| {
        let mut assembler = FrameAssembler::new();
        b.iter(|| {
            for &byte in request.as_slice() {
                assembler.push_byte(byte);
            }
            let outcome = assembler
                .on_idle_timeout()
                .map(|frame| dispatcher.dispatch(frame).unwrap());
            assembler.complete();
            outcome
        })
    });
}

criterion_group!(benches, bench_crc, bench_dispatch, bench_sync, bench_frame_cycle);
criterion_main!(benches);
