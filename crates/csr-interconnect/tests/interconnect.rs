//! Initiators sharing a decoder that reaches memory and CSR banks.

#![allow(clippy::pedantic, clippy::nursery)]

use csr_interconnect::wishbone::{BusParams, Decoder, Request, Response};
use csr_interconnect::{
    csr, Access, Arbiter, Bank, BankConfig, ErrorKind, Features, Field, RegisterBuilder,
    SharedInterconnect, Sram, WishboneCsrBridge,
};
use log as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

const SRAM_WORDS: u64 = 0;
const WIDE_CSR: u64 = 0x1000 >> 2;
const NARROW_CSR: u64 = 0x2000 >> 2;

fn bank(name: &str) -> Bank {
    let config = BankConfig {
        bus: csr::BusParams::new(8, 8),
        alignment: 0,
    };
    let mut bank = Bank::new(name, config).expect("legal bus");
    for (index, reset) in [0x11, 0x22, 0x33, 0x44].into_iter().enumerate() {
        let register = RegisterBuilder::new(format!("r{index}"), Access::RW)
            .field(Field::new("value").with_width(8).with_reset(reset))
            .and_then(RegisterBuilder::build)
            .expect("valid layout");
        bank.add(register, None).expect("fits");
    }
    bank
}

fn system(initiators: usize) -> SharedInterconnect {
    let params = BusParams::new(16, 32).with_granularity(8);
    let mut decoder = Decoder::new("system", params, 0).expect("legal bus");

    let memory = BusParams::new(8, 32).with_granularity(8);
    let sram = Sram::new(memory, 256, false).expect("legal memory");
    let window = decoder.add(Box::new(sram), None, false).expect("fits");
    assert_eq!((window.start, window.end, window.ratio), (0, 0x400, 1));

    let wide = WishboneCsrBridge::new(bank("wide"), Some(32)).expect("legal widths");
    let window = decoder.add(Box::new(wide), Some(0x1000), false).expect("fits");
    assert_eq!((window.start, window.end), (0x1000, 0x1100));

    let narrow = WishboneCsrBridge::new(bank("narrow"), None).expect("legal widths");
    let window = decoder.add(Box::new(narrow), Some(0x2000), true).expect("fits");
    assert_eq!((window.start, window.end), (0x2000, 0x2400));

    let mut system = Arbiter::new(decoder).expect("legal bus");
    for _ in 0..initiators {
        system.add(params).expect("compatible initiator");
    }
    system
}

/// Runs one script of transfers per initiator. Each transfer is held until
/// acknowledged and followed by one idle cycle. Returns the acknowledged
/// responses of every initiator.
fn run(system: &mut SharedInterconnect, scripts: &[Vec<Request>]) -> Vec<Vec<Response>> {
    let mut position = vec![0; scripts.len()];
    let mut resting = vec![false; scripts.len()];
    let mut acked = vec![Vec::new(); scripts.len()];
    for _ in 0..1000 {
        if position.iter().zip(scripts).all(|(done, script)| *done == script.len()) {
            return acked;
        }
        let requests: Vec<Request> = scripts
            .iter()
            .enumerate()
            .map(|(index, script)| match script.get(position[index]) {
                Some(request) if !resting[index] => *request,
                _ => Request::default(),
            })
            .collect();
        let responses = system.step(&requests);
        for (index, response) in responses.into_iter().enumerate() {
            assert!(!(response.ack && response.err));
            if resting[index] {
                resting[index] = false;
            } else if response.ack && position[index] < scripts[index].len() {
                acked[index].push(response);
                position[index] += 1;
                resting[index] = true;
            }
        }
    }
    panic!("scripts did not complete");
}

#[test]
fn memory_and_registers_are_reachable_from_every_initiator() {
    let mut system = system(2);
    let scripts = [
        vec![
            Request::write(SRAM_WORDS + 3, 0xcafe_babe, 0b1111),
            Request::read(WIDE_CSR, 0b1111),
        ],
        vec![
            Request::write(WIDE_CSR, 0xd4c3_b2a1, 0b0110),
            Request::read(SRAM_WORDS + 3, 0b1111),
        ],
    ];
    let acked = run(&mut system, &scripts);
    assert_eq!(acked[0].len(), 2);
    assert_eq!(acked[1].len(), 2);
    assert_eq!(acked[0][1].dat_r, 0x44c3_b211);
    assert_eq!(acked[1][1].dat_r, 0xcafe_babe);
}

#[test]
fn sparse_window_uses_the_low_lane_of_each_word() {
    let mut system = system(1);
    let acked = run(
        &mut system,
        &[vec![
            Request::read(NARROW_CSR, 0b1111),
            Request::read(NARROW_CSR + 2, 0b1111),
            Request::write(NARROW_CSR + 1, 0xffff_ff5a, 0b1111),
            Request::read(NARROW_CSR + 1, 0b0001),
        ]],
    );
    let data: Vec<u64> = acked[0].iter().map(|response| response.dat_r).collect();
    assert_eq!(data, [0x11, 0x33, 0, 0x5a]);
}

#[test]
fn unmapped_address_is_never_acknowledged() {
    let mut system = system(1);
    for _ in 0..8 {
        let responses = system.step(&[Request::read(0x3000 >> 2, 0b1111)]);
        assert_eq!(responses[0], Response::default());
    }
}

#[test]
fn subordinate_stall_needs_decoder_support() {
    let params = BusParams::new(16, 32).with_granularity(8);
    let mut decoder = Decoder::new("system", params, 0).expect("legal bus");
    let stalling = BusParams::new(8, 32).with_granularity(8).with_features(Features::STALL);
    let stalling = Sram::new(stalling, 4, true).expect("legal memory");
    let err = decoder.add(Box::new(stalling), None, false).expect_err("decoder has no stall");
    assert_eq!(err.kind(), ErrorKind::CapabilityMismatch);
}
