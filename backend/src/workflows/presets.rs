// Starter workflow templates offered to administrators

use cadence_shared::{Action, Condition, EventType, WorkflowTemplate};
use serde_json::json;

use super::actions;

fn template(
    key: &str,
    name: &str,
    description: &str,
    event_type: EventType,
    conditions: Vec<Condition>,
    actions: Vec<Action>,
) -> WorkflowTemplate {
    WorkflowTemplate {
        key: key.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        event_type,
        conditions,
        actions,
    }
}

pub fn templates() -> Vec<WorkflowTemplate> {
    vec![
        template(
            "welcome-new-customer",
            "Welcome new customer",
            "Send a welcome email when a customer record is created",
            EventType::CustomerCreated,
            vec![],
            vec![actions::send_email(
                "{{customer.email}}",
                "Welcome, {{customer.firstName}}!",
                "<p>Hi {{customer.firstName}},</p><p>Thanks for choosing us. We look forward to working with you.</p>",
            )],
        ),
        template(
            "consultation-booked",
            "Consultation booked",
            "Confirm consultation bookings and notify staff",
            EventType::AppointmentCreated,
            vec![Condition::equals("appointment.type", "consultation")],
            vec![
                actions::send_email(
                    "{{customer.email}}",
                    "Your consultation on {{appointment.date}}",
                    "<p>Hi {{customer.firstName}},</p><p>Your consultation is booked for {{appointment.date}} at {{appointment.time}}.</p>",
                ),
                actions::create_notification(
                    "New consultation booked",
                    "{{customer.firstName}} {{customer.lastName}} booked a consultation for {{appointment.date}}",
                    "appointment",
                ),
            ],
        ),
        template(
            "appointment-cancelled",
            "Appointment cancelled",
            "Alert staff about cancellations and flag the customer record",
            EventType::AppointmentCancelled,
            vec![],
            vec![
                actions::create_notification(
                    "Appointment cancelled",
                    "{{customer.firstName}} {{customer.lastName}} cancelled the appointment on {{appointment.date}}",
                    "appointment",
                ),
                actions::update_customer(
                    "{{customer.id}}",
                    json!({ "lastCancellationAt": "{{appointment.cancelledAt}}" }),
                ),
            ],
        ),
        template(
            "payment-receipt",
            "Payment receipt",
            "Email a receipt for every received payment",
            EventType::PaymentReceived,
            vec![],
            vec![actions::send_email_template(
                "{{customer.email}}",
                "Receipt for your payment of {{payment.amount}} {{payment.currency}}",
                "payment-receipt",
                json!({
                    "customerName": "{{customer.firstName}} {{customer.lastName}}",
                    "amount": "{{payment.amount}}",
                    "currency": "{{payment.currency}}",
                    "reference": "{{payment.id}}",
                }),
            )],
        ),
        template(
            "large-payment-alert",
            "Large payment alert",
            "Notify staff about payments over 1000",
            EventType::PaymentReceived,
            vec![Condition::greater_than("payment.amount", 1000)],
            vec![actions::create_notification(
                "Large payment received",
                "{{customer.firstName}} {{customer.lastName}} paid {{payment.amount}} {{payment.currency}}",
                "payment",
            )],
        ),
        template(
            "payment-failed-followup",
            "Payment failed follow-up",
            "Ask the customer to update billing details and alert staff",
            EventType::PaymentFailed,
            vec![],
            vec![
                actions::send_email(
                    "{{customer.email}}",
                    "We could not process your payment",
                    "<p>Hi {{customer.firstName}},</p><p>Your payment of {{payment.amount}} {{payment.currency}} failed: {{payment.failureReason}}. Please update your billing details.</p>",
                )
                .with_retry(3, 1000),
                actions::create_notification(
                    "Payment failed",
                    "Payment {{payment.id}} from {{customer.firstName}} {{customer.lastName}} failed",
                    "payment",
                ),
            ],
        ),
        template(
            "request-submitted-webhook",
            "Forward submitted requests",
            "Post submitted requests to an external endpoint",
            EventType::RequestSubmitted,
            vec![],
            vec![actions::webhook(
                "https://hooks.example.com/requests",
                json!({
                    "requestId": "{{request.id}}",
                    "subject": "{{request.subject}}",
                    "customerEmail": "{{customer.email}}",
                }),
            )
            .with_retry(3, 2000)],
        ),
        template(
            "maintenance-reminder",
            "Maintenance reminder",
            "Remind staff when scheduled maintenance runs",
            EventType::ScheduledMaintenance,
            vec![],
            vec![actions::create_notification(
                "Scheduled maintenance",
                "Maintenance run started at {{maintenance.runAt}}",
                "maintenance",
            )],
        ),
    ]
}

pub fn find(key: &str) -> Option<WorkflowTemplate> {
    templates().into_iter().find(|template| template.key == key)
}
