use crate::orders::Order;
use crate::processor::OrderEventKind;

/// Subject line for one order notification.
pub fn subject(kind: OrderEventKind, order_id: &str) -> String {
    let label = match kind {
        OrderEventKind::Confirmed => "confirmed",
        OrderEventKind::Shipped => "shipped",
        OrderEventKind::Delivered => "delivered",
        OrderEventKind::Cancelled => "cancelled",
    };
    format!("Your order {order_id} has been {label}")
}

/// Escapes text for interpolation into the HTML body. The header comes in
/// over the public send endpoint, so nothing interpolated here can be
/// trusted as markup.
fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Builds the HTML notification body for an order.
pub fn order_email_html(order: &Order, header: &str) -> String {
    let mut rows = String::new();
    for item in &order.items {
        rows.push_str(&format!(
            "<tr><td><img src=\"{}\" width=\"48\" alt=\"\"/></td>\
             <td>{}</td><td>{}</td><td>{:.2}</td><td>{}%</td><td>{:.2}</td></tr>\n",
            escape_html(&item.image_url),
            escape_html(&item.name),
            item.qty,
            item.price,
            item.discount,
            item.total,
        ));
    }

    format!(
        "<html><body>\
         <h1>{header}</h1>\
         <p>Hi {name},</p>\
         <p>Order <b>{id}</b> placed on {created_at} is now <b>{status}</b>. \
         Expected delivery: {delivery_date}.</p>\
         <table>\
         <tr><th></th><th>Item</th><th>Qty</th><th>Price</th><th>Discount</th><th>Total</th></tr>\n\
         {rows}\
         </table>\
         <p>Delivery charges: {delivery_charges:.2}</p>\
         <p><b>Grand total: {grand_total:.2}</b></p>\
         </body></html>",
        header = escape_html(header),
        name = escape_html(&order.customer.name),
        id = escape_html(&order.id),
        created_at = escape_html(&order.created_at),
        status = escape_html(&order.status),
        delivery_date = escape_html(&order.delivery_date),
        rows = rows,
        delivery_charges = order.delivery_charges,
        grand_total = order.total(),
    )
}
