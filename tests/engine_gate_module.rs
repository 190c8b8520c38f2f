use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use vigil::engine::gate::{DeliverOutcome, RenderJobGate, WaitOutcome};
use vigil::engine::turn::{RenderAction, RenderJob};

fn job(seq: u64) -> RenderJob {
    RenderJob {
        seq,
        image_b64: "cmF3LXBuZw==".to_string(),
        actions: vec![RenderAction {
            name: "click".to_string(),
            args: vec!["100".to_string(), "200".to_string()],
            coords: Some([100, 200]),
        }],
    }
}

#[test]
fn peek_is_empty_until_publish_and_non_destructive() {
    let gate = RenderJobGate::new();
    assert!(gate.peek().is_none());

    gate.publish(job(1));
    let first = gate.peek().expect("pending job");
    let second = gate.peek().expect("still pending");
    assert_eq!(first, second);
    assert_eq!(first.seq, 1);
}

#[test]
fn deliver_without_job_is_no_pending() {
    let gate = RenderJobGate::new();
    assert_eq!(
        gate.deliver(1, "aW1n".to_string()),
        DeliverOutcome::NoPending
    );
}

#[test]
fn deliver_with_wrong_seq_is_stale() {
    let gate = RenderJobGate::new();
    gate.publish(job(1));
    assert_eq!(
        gate.deliver(2, "aW1n".to_string()),
        DeliverOutcome::Stale {
            expected: 1,
            got: 2
        }
    );
    // the matching seq still goes through afterwards
    assert_eq!(gate.deliver(1, "aW1n".to_string()), DeliverOutcome::Accepted);
}

#[test]
fn empty_image_is_rejected() {
    let gate = RenderJobGate::new();
    gate.publish(job(1));
    assert_eq!(gate.deliver(1, String::new()), DeliverOutcome::EmptyImage);
}

#[test]
fn redelivery_of_accepted_seq_is_idempotent() {
    let gate = RenderJobGate::new();
    gate.publish(job(3));
    assert_eq!(gate.deliver(3, "aW1n".to_string()), DeliverOutcome::Accepted);
    assert_eq!(gate.deliver(3, "b3RoZXI=".to_string()), DeliverOutcome::Accepted);

    // still idempotent after the engine consumed the image
    assert_eq!(
        gate.wait(3, Duration::from_millis(100)),
        WaitOutcome::Image("aW1n".to_string())
    );
    assert_eq!(gate.deliver(3, "aW1n".to_string()), DeliverOutcome::Accepted);
}

#[test]
fn wait_returns_image_delivered_from_another_thread() {
    let gate = Arc::new(RenderJobGate::new());
    gate.publish(job(7));

    let deliverer = {
        let gate = Arc::clone(&gate);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            gate.deliver(7, "YW5ub3RhdGVk".to_string())
        })
    };

    let outcome = gate.wait(7, Duration::from_secs(2));
    assert_eq!(outcome, WaitOutcome::Image("YW5ub3RhdGVk".to_string()));
    assert_eq!(deliverer.join().expect("join"), DeliverOutcome::Accepted);
    // slot was consumed
    assert!(gate.peek().is_none());
}

#[test]
fn wait_times_out_without_delivery() {
    let gate = RenderJobGate::new();
    gate.publish(job(1));
    let started = Instant::now();
    assert_eq!(
        gate.wait(1, Duration::from_millis(120)),
        WaitOutcome::TimedOut
    );
    assert!(started.elapsed() >= Duration::from_millis(120));
    // the stale job stays visible until the next publish
    assert!(gate.peek().is_some());
}

#[test]
fn publish_invalidates_prior_job_and_delivery() {
    let gate = RenderJobGate::new();
    gate.publish(job(1));
    assert_eq!(gate.deliver(1, "b2xk".to_string()), DeliverOutcome::Accepted);

    gate.publish(job(2));
    assert_eq!(gate.peek().expect("pending").seq, 2);
    // the old seq can no longer sneak in
    assert_eq!(
        gate.deliver(1, "b2xk".to_string()),
        DeliverOutcome::Stale {
            expected: 2,
            got: 1
        }
    );
    // and the old delivery was discarded, so a wait for seq 2 must time out
    assert_eq!(
        gate.wait(2, Duration::from_millis(80)),
        WaitOutcome::TimedOut
    );
}

#[test]
fn shutdown_cancels_waiters() {
    let gate = Arc::new(RenderJobGate::new());
    gate.publish(job(1));

    let waiter = {
        let gate = Arc::clone(&gate);
        thread::spawn(move || gate.wait(1, Duration::from_secs(5)))
    };

    thread::sleep(Duration::from_millis(50));
    gate.shutdown();
    assert_eq!(waiter.join().expect("join"), WaitOutcome::Cancelled);
    // all subsequent waits are cancelled as well
    assert_eq!(
        gate.wait(1, Duration::from_millis(10)),
        WaitOutcome::Cancelled
    );
}
