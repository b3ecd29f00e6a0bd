//! Round-robin fairness of the scheduler and the Wishbone arbiter.

#![allow(clippy::pedantic, clippy::nursery)]

use csr_interconnect::wishbone::{BusParams, Request};
use csr_interconnect::{Arbiter, RoundRobin, Sram};
use log as _;
use proptest::prelude::*;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

fn shared_memory(initiators: usize) -> Arbiter<Sram> {
    let params = BusParams::new(8, 32).with_granularity(8);
    let sram = Sram::new(params, 256, false).expect("legal memory");
    let mut arbiter = Arbiter::new(sram).expect("legal bus");
    for _ in 0..initiators {
        arbiter.add(params).expect("compatible initiator");
    }
    arbiter
}

/// Every initiator keeps issuing single writes: it holds `cyc` until
/// acknowledged, then idles for one cycle. Returns the initiator of each
/// acknowledged transfer in order.
fn acknowledged_order(arbiter: &mut Arbiter<Sram>, cycles: usize) -> Vec<usize> {
    let count = arbiter.initiators().len();
    let mut resting = vec![false; count];
    let mut order = Vec::new();
    for _ in 0..cycles {
        let requests: Vec<Request> = (0..count)
            .map(|index| {
                if resting[index] {
                    Request::default()
                } else {
                    Request::write(index as u64, index as u64 + 1, 0b1111)
                }
            })
            .collect();
        let responses = arbiter.step(&requests);
        for (index, response) in responses.iter().enumerate() {
            if resting[index] {
                resting[index] = false;
            } else if response.ack {
                resting[index] = true;
                order.push(index);
            }
        }
    }
    order
}

#[test]
fn three_busy_initiators_take_turns() {
    let mut arbiter = shared_memory(3);
    let order = acknowledged_order(&mut arbiter, 30);
    assert!(order.len() >= 6);
    for (turn, initiator) in order.iter().enumerate() {
        assert_eq!(*initiator, turn % 3);
    }
    for index in 0..3 {
        assert_eq!(arbiter.target().word(index), Some(index as u64 + 1));
    }
}

#[test]
fn scheduler_cycles_through_continuous_requesters() {
    let mut scheduler = RoundRobin::new(3).expect("small");
    let mut grants = vec![scheduler.grant()];
    for _ in 0..6 {
        let released = 0b111 & !(1 << scheduler.grant());
        grants.push(scheduler.step(released, true));
    }
    assert_eq!(grants, [0, 1, 2, 0, 1, 2, 0]);
}

#[test]
fn holder_that_never_releases_keeps_the_grant() {
    let mut arbiter = shared_memory(3);
    let requests = [Request::read(0, 0b1111), Request::read(1, 0b1111), Request::read(2, 0b1111)];
    let mut acks = [0; 3];
    for _ in 0..20 {
        for (count, response) in acks.iter_mut().zip(arbiter.step(&requests)) {
            *count += usize::from(response.ack);
        }
        assert_eq!(arbiter.grant(), 0);
    }
    assert_eq!(acks, [10, 0, 0]);
}

proptest! {
    #[test]
    fn property_scheduler_never_preempts(
        count in 1_usize..=64,
        steps in proptest::collection::vec((any::<u64>(), any::<bool>()), 1..64),
    ) {
        let mut scheduler = RoundRobin::new(count).expect("within bounds");
        let live = u64::MAX >> (64 - count);
        for (requests, advance) in steps {
            let before = scheduler.grant();
            let requests = requests & live;
            let after = scheduler.step(requests, advance);
            prop_assert!(after < count);
            if !advance || requests >> before & 1 == 1 {
                prop_assert_eq!(after, before);
            }
        }
    }

    #[test]
    fn property_every_busy_initiator_is_served(count in 1_usize..=8) {
        let mut arbiter = shared_memory(count);
        let order = acknowledged_order(&mut arbiter, 4 * count + 4);
        let mut served = vec![false; count];
        for initiator in order {
            served[initiator] = true;
        }
        prop_assert!(served.into_iter().all(|served| served));
    }
}
