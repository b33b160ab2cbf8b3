use fake::{Fake, Faker};
use serde_json::{json, Value};

use crate::tests::fixtures::*;
use crate::workflows::{conditions, presets, template, EventContext};

fn render_actions(key: &str, context: &EventContext) -> Vec<Value> {
    let template = presets::find(key).unwrap();
    template
        .actions
        .iter()
        .map(|action| template::render(&action.config, context))
        .collect()
}

#[test]
fn test_consultation_template_renders_from_booking() {
    let customer = customer();
    let context = EventContext::from_value(consultation_context(&customer));
    let template = presets::find("consultation-booked").unwrap();

    assert!(conditions::matches(&template.conditions, &context));

    let rendered = render_actions("consultation-booked", &context);
    assert_eq!(rendered[0]["to"], customer.email.as_str());
    assert_eq!(rendered[0]["subject"], "Your consultation on 2024-05-01");
    assert_eq!(
        rendered[1]["message"],
        format!(
            "{} {} booked a consultation for 2024-05-01",
            customer.first_name, customer.last_name
        )
    );
}

#[test]
fn test_consultation_template_skips_other_appointments() {
    let mut context = consultation_context(&customer());
    context["appointment"]["type"] = json!("Consultation");
    let template = presets::find("consultation-booked").unwrap();

    assert!(!conditions::matches(&template.conditions, &EventContext::from_value(context)));
}

#[test]
fn test_large_payment_threshold_over_random_amounts() {
    let template = presets::find("large-payment-alert").unwrap();
    let customer = customer();

    for _ in 0..50 {
        let payment: PaymentFixture = Faker.fake();
        let context = EventContext::from_value(payment_context(&customer, &payment));
        assert_eq!(
            conditions::matches(&template.conditions, &context),
            payment.amount > 1000,
            "amount {}",
            payment.amount
        );
    }
}

#[test]
fn test_payment_receipt_variables_are_filled() {
    let customer = customer();
    let payment = PaymentFixture::with_amount(250);
    let context = EventContext::from_value(payment_context(&customer, &payment));

    let rendered = render_actions("payment-receipt", &context);
    let variables = &rendered[0]["variables"];
    assert_eq!(variables["amount"], "250");
    assert_eq!(variables["currency"], "USD");
    assert_eq!(variables["reference"], payment.id.to_string());
    assert_eq!(
        variables["customerName"],
        format!("{} {}", customer.first_name, customer.last_name)
    );
    assert_eq!(rendered[0]["templateId"], "payment-receipt");
}

#[test]
fn test_missing_facts_render_as_empty_text() {
    let context = EventContext::from_value(json!({"customer": customer().to_json()}));

    let rendered = render_actions("payment-failed-followup", &context);
    let body = rendered[0]["body"].as_str().unwrap();
    assert!(body.contains("Your payment of   failed: ."));
    assert!(!body.contains("{{"));
}
