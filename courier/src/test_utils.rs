use crate::orders::{Address, Customer, Order, OrderItem};

pub fn sample_order() -> Order {
    Order {
        id: "ord-1042".to_string(),
        customer: Customer {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: "555-0142".to_string(),
            address: Address {
                street: "12 Analytical Row".to_string(),
                city: "London".to_string(),
                state: "LDN".to_string(),
                pin: "E1 6AN".to_string(),
            },
        },
        items: vec![
            OrderItem {
                name: "Mechanical keyboard".to_string(),
                price: 120.0,
                qty: 1,
                image_url: "https://img.example.com/kb.png".to_string(),
                discount: 10,
                total: 108.0,
            },
            OrderItem {
                name: "Desk mat".to_string(),
                price: 25.0,
                qty: 2,
                image_url: "https://img.example.com/mat.png".to_string(),
                discount: 0,
                total: 50.0,
            },
        ],
        created_at: "2024-03-02T10:15:00Z".to_string(),
        status: "confirmed".to_string(),
        delivery_date: "2024-03-06".to_string(),
        delivery_charges: 4.5,
    }
}
