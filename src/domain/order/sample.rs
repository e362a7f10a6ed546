use chrono::{TimeZone, Utc};

use super::aggregate::Order;
use super::value_objects::{Delivery, Item, Payment};

/// A complete, valid order with one item, keyed by `order_uid`.
///
/// Used by the demo producer and by tests. The payment transaction is derived
/// from the order id so that distinct samples never collide on it.
pub fn sample_order(order_uid: &str) -> Order {
    let date_created = Utc
        .with_ymd_and_hms(2021, 11, 26, 6, 22, 19)
        .single()
        .unwrap_or_else(Utc::now);

    Order {
        order_uid: order_uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: format!("trans-{order_uid}"),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1637907727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: vec![Item {
            chrt_id: 9934930,
            track_number: "WBILMTESTTRACK".to_string(),
            price: 453,
            rid: "ab4219087a764ae0btest".to_string(),
            name: "Mascaras".to_string(),
            sale: 30,
            size: "0".to_string(),
            total_price: 317,
            nm_id: 2389212,
            brand: "Vivienne Sabo".to_string(),
            status: 202,
        }],
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created,
        oof_shard: "1".to_string(),
    }
}

/// The `n`th numbered variant of `reference`: id `n`, its own track number
/// and transaction, and the payment amount raised by `n`.
///
/// `None` when the raised amount does not fit the payment's `i32`.
pub fn sample_variant(reference: &Order, n: u32) -> Option<Order> {
    let amount = i32::try_from(n)
        .ok()
        .and_then(|n| reference.payment.amount.checked_add(n))?;

    let mut order = reference.clone();
    order.order_uid = n.to_string();
    order.track_number = format!("TRACK-{n}");
    order.payment.transaction = format!("trans-{n}");
    order.payment.amount = amount;
    Some(order)
}
