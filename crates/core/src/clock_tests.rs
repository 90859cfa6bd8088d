use super::*;

#[test]
fn fake_clock_advances_both_instant_and_epoch() {
    let clock = FakeClock::new();
    let t0 = clock.now();
    let e0 = clock.epoch_ns();

    clock.advance(Duration::from_secs(5));

    assert_eq!(clock.now(), t0 + Duration::from_secs(5));
    assert_eq!(clock.epoch_ns(), e0 + 5_000_000_000);
}

#[test]
fn fake_clock_set_epoch_ns_overrides_value() {
    let clock = FakeClock::new();
    clock.set_epoch_ns(42);
    assert_eq!(clock.epoch_ns(), 42);
}

#[test]
fn system_clock_epoch_ns_is_monotonic_nondecreasing() {
    let clock = SystemClock;
    let a = clock.epoch_ns();
    let b = clock.epoch_ns();
    assert!(b >= a);
}

#[test]
fn shared_clock_delegates_to_inner_fake() {
    let fake = FakeClock::new();
    fake.set_epoch_ns(100);
    let shared = SharedClock::new(fake.clone());
    assert_eq!(shared.epoch_ns(), 100);
    fake.advance(Duration::from_secs(1));
    assert_eq!(shared.epoch_ns(), 1_000_000_100);
}
