//! Composes `ringframe` and `cotask` behind `hostio::StdRuntime`: one task
//! frames a counter into a ring buffer, a second — parked on a named event
//! rather than a timer — drains it once triggered.
//!
//! Not a library; just wiring, to show the three crates in this workspace
//! cooperating end to end.

use std::cell::RefCell;
use std::rc::Rc;

use cotask::{Job, JobFault, Scheduler, SchedulerConfig, TaskId};
use hostio::StdRuntime;
use ringframe::RingBuffer;

const COUNTER_MSG_ID: u16 = 1;

#[derive(Clone)]
struct NoParams;

fn main() {
    let ring = Rc::new(RefCell::new(
        RingBuffer::new(256).expect("256 is a valid ring size"),
    ));

    // Seed one record directly, ahead of anything the scheduler runs, to
    // show the ring buffer is a plain value usable on its own.
    ring.borrow_mut()
        .put(COUNTER_MSG_ID, &0u32.to_be_bytes())
        .expect("empty ring has room");

    let mut sched: Scheduler<NoParams, StdRuntime> =
        Scheduler::new(SchedulerConfig::default(), StdRuntime::new())
            .expect("default config is always valid");

    let producer_ring = ring.clone();
    sched
        .do_now(
            Job::named("producer", move |_: NoParams| {
                producer_ring
                    .borrow_mut()
                    .put(COUNTER_MSG_ID, &1u32.to_be_bytes())
                    .map_err(|e| JobFault::new(e.to_string()))
            }),
            NoParams,
            TaskId::CURRENT,
        )
        .expect("scheduler has room");

    let consumer_ring = ring.clone();
    sched
        .on(
            Job::named("consumer", move |_: NoParams| {
                let mut ring = consumer_ring.borrow_mut();
                while !ring.is_empty() {
                    let (msg_id, payload) = ring.get();
                    if msg_id == COUNTER_MSG_ID && payload.len() == 4 {
                        let tick = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                        println!("drained tick {tick}");
                    }
                }
                Ok(())
            }),
            NoParams,
            "drain",
            0,
            false,
            TaskId::CURRENT,
        )
        .expect("scheduler has room");

    // Stands in for whatever external stimulus would normally call this —
    // a driver ISR, a peer task's message, and so on.
    let woken = sched.trigger_event("drain", NoParams);
    assert_eq!(woken, 1);

    // `producer` then `consumer` run once each; with no repeating tasks
    // left, the loop stops itself.
    sched.start();
}
