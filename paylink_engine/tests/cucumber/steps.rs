use std::time::Duration;

use cucumber::{then, when};
use futures_util::future::join_all;
use paylink_engine::{
    db_types::{NewOrder, OrderId, OrderStatusType},
    plg_api::{
        link_objects::{LinkOptions, LinkRequest},
        reminder_objects::FireOutcome,
        webhook_objects::WebhookAck,
    },
    OrderStore,
    ReminderManagement,
};
use plg_common::{Currency, MinorUnits};

use crate::cucumber::PaylinkWorld;

const PHONE: &str = "+234 801 234 5678";

#[when(expr = "I receive an order with id {int} for {int} NGN")]
async fn receive_order(world: &mut PaylinkWorld, id: i64, naira: i64) {
    let total = MinorUnits::from(naira * Currency::Ngn.multiplier());
    let sys = world.system();
    let order = NewOrder::new(OrderId(id), total, Currency::Ngn, "ada@example.com").with_phone(PHONE);
    let (order, _) = sys.orders.register(order).await.expect("Error registering order");
    sys.reminders.schedule_for_order(&order).await.expect("Error scheduling reminders");
}

#[when(expr = "I create a payment link for order {int}")]
async fn create_link(world: &mut PaylinkWorld, id: i64) {
    let request = LinkRequest::Order { order_id: OrderId(id) };
    world.system().links.create(request, LinkOptions::default()).await.expect("Error creating link");
}

#[when(expr = "the customer pays {int} kobo for order {int}")]
async fn customer_pays(world: &mut PaylinkWorld, kobo: i64, id: i64) {
    let link = world.latest_link(id).await;
    world.system().processor.settle(&link.reference, kobo, "NGN");
}

#[when(expr = "Paystack delivers charge.success event {int} for order {int} with {int} kobo {int} time(s)")]
async fn deliver_charge_success(world: &mut PaylinkWorld, event_id: i64, id: i64, kobo: i64, times: usize) {
    let link = world.latest_link(id).await;
    let sys = world.system();
    let (body, sig) = sys.charge_success(event_id, &link.reference, kobo);
    let deliveries = (0..times).map(|_| sys.webhooks.ingest(&body, Some(&sig)));
    let results = join_all(deliveries).await;
    world.deliveries.extend(results);
}

#[when(expr = "reminder #{int} for order {int} fires")]
async fn reminder_fires(world: &mut PaylinkWorld, sequence: i64, id: i64) {
    let outcome = world.system().reminders.fire(OrderId(id), PHONE, sequence).await.expect("Error firing reminder");
    world.outcomes.push(outcome);
}

#[when("the due reminders are processed")]
async fn process_due(world: &mut PaylinkWorld) {
    world.system().reminders.process_due().await.expect("Error processing reminders");
}

#[when("the customer opts out of reminders")]
async fn opt_out(world: &mut PaylinkWorld) {
    world.system().reminders.opt_out(PHONE, Some("STOP")).await.expect("Error opting out");
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut PaylinkWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[then(expr = "every delivery was acknowledged with {int} processed and {int} duplicate(s)")]
async fn deliveries_acknowledged(world: &mut PaylinkWorld, processed: usize, duplicates: usize) {
    let acks = world
        .deliveries
        .iter()
        .map(|r| r.as_ref().map_err(|e| e.to_string()).cloned())
        .collect::<Result<Vec<WebhookAck>, String>>()
        .expect("A delivery was not acknowledged");
    assert_eq!(acks.iter().filter(|a| **a == WebhookAck::Processed).count(), processed);
    assert_eq!(acks.iter().filter(|a| **a == WebhookAck::Duplicate).count(), duplicates);
}

#[then(expr = "order {int} has status {word}")]
async fn order_status(world: &mut PaylinkWorld, id: i64, status: String) {
    let order =
        world.system().db.get_order(OrderId(id)).await.expect("Error fetching order").expect("Order does not exist");
    let expected = status.parse::<OrderStatusType>().expect("Not a valid order status");
    assert_eq!(order.status, expected, "Status is incorrect");
}

#[then(expr = "order {int} has {int} payment confirmation note(s)")]
async fn confirmation_notes(world: &mut PaylinkWorld, id: i64, count: usize) {
    let notes = world.system().db.fetch_notes(OrderId(id)).await.expect("Error fetching notes");
    let confirmations = notes.iter().filter(|n| n.note.contains("confirmed. Reference")).count();
    assert_eq!(confirmations, count, "{notes:?}");
}

#[then(expr = "order {int} has a note containing {string}")]
async fn note_containing(world: &mut PaylinkWorld, id: i64, text: String) {
    let notes = world.system().db.fetch_notes(OrderId(id)).await.expect("Error fetching notes");
    assert!(notes.iter().any(|n| n.note.contains(&text)), "No note contains '{text}': {notes:?}");
}

#[then(expr = "reminder #{int} for order {int} is {word}")]
async fn reminder_status(world: &mut PaylinkWorld, sequence: i64, id: i64, status: String) {
    let reminders = world.system().db.fetch_reminders_for_order(OrderId(id)).await.expect("Error fetching reminders");
    let reminder = reminders.iter().find(|r| r.sequence == sequence).expect("Reminder does not exist");
    assert_eq!(reminder.status.to_string(), status, "Reminder #{sequence} is {}", reminder.status);
}

#[then(expr = "{int} reminder(s) was/were sent to the customer")]
async fn reminders_sent(world: &mut PaylinkWorld, count: usize) {
    let sent = world.system().messenger.sent_to(crate::support::CONTACT);
    assert_eq!(sent, count);
}

#[then("no reminder fire reported a send after the first")]
async fn no_send_after_first(world: &mut PaylinkWorld) {
    for outcome in world.outcomes.iter().skip(1) {
        assert!(!matches!(outcome, FireOutcome::Sent { .. }), "Unexpected send: {outcome:?}");
    }
}
