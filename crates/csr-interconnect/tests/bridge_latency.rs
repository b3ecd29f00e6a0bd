//! Fixed latency and lane reassembly of the Wishbone-to-CSR bridge.

#![allow(clippy::pedantic, clippy::nursery)]

use csr_interconnect::csr::BusParams;
use csr_interconnect::wishbone::{Request, WishboneTarget};
use csr_interconnect::{Access, Bank, BankConfig, Field, RegisterBuilder, WishboneCsrBridge};
use log as _;
use proptest::prelude::*;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

/// Four byte registers behind a 32-bit bridge.
fn bridge() -> WishboneCsrBridge<Bank> {
    let config = BankConfig {
        bus: BusParams::new(8, 8),
        alignment: 0,
    };
    let mut bank = Bank::new("bytes", config).expect("legal bus");
    for index in 0..4 {
        let register = RegisterBuilder::new(format!("b{index}"), Access::RW)
            .field(Field::new("value").with_width(8))
            .and_then(RegisterBuilder::build)
            .expect("valid layout");
        bank.add(register, None).expect("fits");
    }
    WishboneCsrBridge::new(bank, Some(32)).expect("legal widths")
}

/// Cycles spent from the first strobe up to and including the ack.
fn latency(bridge: &mut WishboneCsrBridge<Bank>, request: Request) -> (usize, u64) {
    for cycle in 1..=16 {
        let response = bridge.step(&request);
        if response.ack {
            bridge.step(&Request::default());
            return (cycle, response.dat_r);
        }
    }
    panic!("bridge never acknowledged");
}

fn byte_mask(sel: u64) -> u64 {
    (0..4_u32).filter(|lane| sel >> lane & 1 == 1).fold(0, |mask, lane| mask | (0xff << (lane * 8)))
}

#[rstest]
#[case(8, 2)]
#[case(16, 3)]
#[case(32, 5)]
#[case(64, 9)]
fn latency_follows_the_width_ratio(#[case] data_width: u32, #[case] cycles: usize) {
    let config = BankConfig {
        bus: BusParams::new(8, 8),
        alignment: 0,
    };
    let bank = Bank::new("empty", config).expect("legal bus");
    let mut bridge = WishboneCsrBridge::new(bank, Some(data_width)).expect("legal widths");
    let sel = (1 << bridge.lanes()) - 1;
    let mut taken = 0;
    loop {
        taken += 1;
        if bridge.step(&Request::read(0, sel)).ack {
            break;
        }
    }
    assert_eq!(taken, cycles);
}

proptest! {
    #[test]
    fn property_five_cycles_for_every_lane_pattern(
        sel in 0_u64..16,
        data in any::<u32>(),
        we in any::<bool>(),
    ) {
        let mut bridge = bridge();
        let request = if we {
            Request::write(0, u64::from(data), sel)
        } else {
            Request::read(0, sel)
        };
        prop_assert_eq!(latency(&mut bridge, request).0, 5);
    }

    #[test]
    fn property_selected_lanes_round_trip(
        sel in 0_u64..16,
        first in any::<u32>(),
        second in any::<u32>(),
    ) {
        let mut bridge = bridge();
        latency(&mut bridge, Request::write(0, u64::from(first), 0b1111));
        latency(&mut bridge, Request::write(0, u64::from(second), sel));
        let expected = (u64::from(second) & byte_mask(sel)) | (u64::from(first) & !byte_mask(sel));
        let (cycles, data) = latency(&mut bridge, Request::read(0, 0b1111));
        prop_assert_eq!(cycles, 5);
        prop_assert_eq!(data, expected);
        let (_, partial) = latency(&mut bridge, Request::read(0, sel));
        prop_assert_eq!(partial, expected & byte_mask(sel));
    }
}
