//! Deterministic bus session fingerprint used by CI cross-host comparison.

use csr_interconnect::wishbone::{BusParams, Decoder, Request, Response};
use csr_interconnect::{
    csr, Access, Arbiter, Bank, BankConfig, Field, RegisterBuilder, Sram, WishboneCsrBridge,
};
use log as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

const CYCLES: usize = 256;

fn bank() -> Bank {
    let config = BankConfig {
        bus: csr::BusParams::new(8, 8),
        alignment: 0,
    };
    let mut bank = Bank::new("ctrl", config).expect("legal bus");
    let status = RegisterBuilder::new("status", Access::R)
        .field(Field::new("ready").with_width(1).with_reset(1))
        .and_then(|builder| builder.field(Field::new("level").with_width(7)))
        .and_then(RegisterBuilder::build)
        .expect("valid layout");
    let counter = RegisterBuilder::new("counter", Access::RW)
        .atomic(true)
        .field(Field::new("value").with_width(24).with_reset(0x00c0_ffee))
        .and_then(RegisterBuilder::build)
        .expect("valid layout");
    bank.add(status, None).expect("fits");
    bank.add(counter, None).expect("fits");
    bank
}

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn hash_response(hash: &mut u64, response: &Response) {
    let flags = u8::from(response.ack)
        | u8::from(response.err) << 1
        | u8::from(response.rty) << 2
        | u8::from(response.stall) << 3;
    hash_bytes(hash, &[flags]);
    hash_bytes(hash, &response.dat_r.to_le_bytes());
}

/// Request of `initiator` on `cycle`: a fixed pattern mixing memory and
/// register traffic with idle gaps.
fn request(initiator: usize, cycle: usize) -> Request {
    let slot = (cycle / 8 + initiator) % 4;
    let word = (cycle / 32) as u64;
    match (slot, cycle % 8) {
        (_, 7) => Request::default(),
        (0, _) => Request::write(word, (cycle as u64) * 0x0101_0101, 0b1111),
        (1, _) => Request::read(word, 0b1111),
        (2, _) => Request::write(0x400 + word % 2, 0x1234_5678 ^ cycle as u64, 0b0101),
        _ => Request::read(0x400 + word % 2, 0b1111),
    }
}

fn fingerprint() -> String {
    let params = BusParams::new(16, 32).with_granularity(8);
    let mut decoder = Decoder::new("system", params, 0).expect("legal bus");
    let memory = BusParams::new(8, 32).with_granularity(8);
    let sram = Sram::new(memory, 64, false).expect("legal memory");
    decoder.add(Box::new(sram), None, false).expect("fits");
    let bridge = WishboneCsrBridge::new(bank(), Some(32)).expect("legal widths");
    decoder.add(Box::new(bridge), Some(0x1000), false).expect("fits");

    let mut system = Arbiter::new(decoder).expect("legal bus");
    system.add(params).expect("compatible initiator");
    system.add(params).expect("compatible initiator");

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    for cycle in 0..CYCLES {
        let requests = [request(0, cycle), request(1, cycle)];
        for response in system.step(&requests) {
            hash_response(&mut hash, &response);
        }
        hash_bytes(&mut hash, &(system.grant() as u64).to_le_bytes());
    }

    format!("{hash:016x}")
}

fn main() {
    println!("{}", fingerprint());
}
