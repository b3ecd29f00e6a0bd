#![no_main]

use csr_interconnect::wishbone::{BusParams, Decoder, Request};
use csr_interconnect::{
    csr, Access, Arbiter, Bank, BankConfig, Field, RegisterBuilder, SharedInterconnect, Sram,
    WishboneCsrBridge,
};
use libfuzzer_sys::fuzz_target;

const INITIATORS: usize = 3;

fn bank(width: u32) -> Bank {
    let config = BankConfig {
        bus: csr::BusParams::new(6, 8),
        alignment: 0,
    };
    let mut bank = Bank::new("fuzz", config).expect("legal bus");
    for (index, atomic) in [false, true].into_iter().enumerate() {
        let register = RegisterBuilder::new(format!("r{index}"), Access::RW)
            .atomic(atomic)
            .field(Field::new("value").with_width(width))
            .and_then(RegisterBuilder::build)
            .expect("valid layout");
        bank.add(register, None).expect("fits");
    }
    bank
}

fn system() -> SharedInterconnect {
    let params = BusParams::new(16, 32).with_granularity(8);
    let mut decoder = Decoder::new("fuzz", params, 0).expect("legal bus");
    let memory = BusParams::new(6, 32).with_granularity(8);
    let sram = Sram::new(memory, 64, false).expect("legal memory");
    decoder.add(Box::new(sram), None, false).expect("fits");
    let wide = WishboneCsrBridge::new(bank(24), Some(32)).expect("legal widths");
    decoder.add(Box::new(wide), None, false).expect("fits");
    let narrow = WishboneCsrBridge::new(bank(12), None).expect("legal widths");
    decoder.add(Box::new(narrow), None, true).expect("fits");
    let mut system = Arbiter::new(decoder).expect("legal bus");
    for _ in 0..INITIATORS {
        system.add(params).expect("compatible initiator");
    }
    system
}

fn request(bytes: &[u8]) -> Request {
    let control = bytes[0];
    let adr = u64::from(u16::from_le_bytes([bytes[1], bytes[2]])) >> 2;
    let dat_w = u64::from(u32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]));
    Request {
        adr,
        dat_w,
        sel: u64::from(control & 0x0f),
        cyc: control & 0x10 != 0,
        stb: control & 0x20 != 0,
        we: control & 0x40 != 0,
        ..Request::default()
    }
}

fuzz_target!(|data: &[u8]| {
    let mut system = system();
    for cycle in data.chunks_exact(7 * INITIATORS) {
        let requests: Vec<Request> = cycle.chunks_exact(7).map(request).collect();
        let grant = system.grant();
        let responses = system.step(&requests);
        assert_eq!(responses.len(), INITIATORS);
        for (index, response) in responses.iter().enumerate() {
            assert!(!(response.ack && response.err));
            if index != grant {
                assert!(!response.ack);
            }
        }
        assert!(system.grant() < INITIATORS);
    }
});
