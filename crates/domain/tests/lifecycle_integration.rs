//! End-to-end exercises of the two state machines together, the way the
//! choreography drives them.

use common::{Currency, CustomerId, Money};
use domain::{Order, OrderError, OrderStatus, Payment, PaymentStatus};
use messaging::Event;

fn create_order(cents: i64) -> Order {
    Order::create(
        CustomerId::new(),
        Money::from_cents(cents),
        Currency::new("usd"),
        "it-key-1",
    )
    .unwrap()
}

#[test]
fn order_and_payment_walk_the_happy_path_in_lockstep() {
    let mut order = create_order(25000);
    assert_eq!(order.currency().as_str(), "USD");

    order.start_payment_authorization().unwrap();

    let mut payment = Payment::create(
        order.id(),
        order.amount(),
        order.currency().clone(),
        order.idempotency_key(),
    )
    .unwrap();
    payment.mark_authorized("sim_auth_42").unwrap();

    order.mark_authorized(payment.id()).unwrap();
    order.start_capture().unwrap();

    payment.mark_captured().unwrap();
    order.mark_captured().unwrap();

    assert_eq!(order.status(), OrderStatus::Captured);
    assert_eq!(payment.status(), PaymentStatus::Captured);

    let order_events: Vec<&'static str> = order
        .pending_events()
        .iter()
        .map(Event::event_type)
        .collect();
    assert_eq!(
        order_events,
        vec![
            "orders.order-created.v1",
            "orders.order-payment-authorizing.v1",
            "orders.order-authorized.v1",
            "orders.order-captured.v1",
        ]
    );

    let payment_events: Vec<&'static str> = payment
        .pending_events()
        .iter()
        .map(Event::event_type)
        .collect();
    assert_eq!(
        payment_events,
        vec![
            "payments.payment-authorized.v1",
            "payments.payment-captured.v1",
        ]
    );
}

#[test]
fn declined_authorization_fails_both_sides() {
    let mut order = create_order(9999);
    order.start_payment_authorization().unwrap();

    let mut payment = Payment::create(
        order.id(),
        order.amount(),
        order.currency().clone(),
        order.idempotency_key(),
    )
    .unwrap();
    payment
        .mark_failed("insufficient funds", "INSUFFICIENT_FUNDS")
        .unwrap();
    order.mark_failed("insufficient funds").unwrap();

    assert_eq!(order.status(), OrderStatus::Failed);
    assert_eq!(payment.status(), PaymentStatus::Failed);
    assert_eq!(payment.failure_code(), Some("INSUFFICIENT_FUNDS"));
}

#[test]
fn every_illegal_order_transition_is_rejected_without_side_effects() {
    let sequences: Vec<(&str, fn(&mut Order) -> Result<(), OrderError>)> = vec![
        ("capture from created", |o| o.mark_captured()),
        ("authorize from created", |o| {
            o.mark_authorized(common::PaymentId::new())
        }),
        ("start capture from created", |o| o.start_capture()),
    ];

    for (name, op) in sequences {
        let mut order = create_order(1000);
        let events_before = order.pending_events().len();
        assert!(op(&mut order).is_err(), "{name} should be rejected");
        assert_eq!(order.status(), OrderStatus::Created, "{name}");
        assert_eq!(order.pending_events().len(), events_before, "{name}");
    }
}
