use crate::domain::payment::Payment;

/// Builds the canonical CRM push body from a payment row — a pure
/// function with no I/O. Deterministic for a given payment, per spec
/// §4.5: merchant/customer identifiers come from the opaque `context`
/// bag, `amount_minor` is carried verbatim, and the canonical status
/// plus `authorization_code` round out the body.
pub fn build(payment: &Payment) -> serde_json::Value {
    let merchant_id = payment.context.get("merchant_id").cloned();
    let customer_id = payment.context.get("customer_id").cloned();

    serde_json::json!({
        "payment_id": payment.id,
        "provider": payment.provider,
        "status": payment.status.as_str(),
        "amount_minor": payment.amount_minor,
        "product_id": payment.product_id,
        "authorization_code": payment.authorization_code,
        "merchant_id": merchant_id,
        "customer_id": customer_id,
    })
}
