use crate::common::setup;
use relq::prelude::*;
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
struct Order {
    id: i64,
    amount: f64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    name: String,
    orders: Vec<Order>,
    orders_count: i64,
}

fn users_with_orders(db: &Relq<rusqlite::Connection>) -> Query {
    let mut query = db.query("users").unwrap();
    query
        .select("id")
        .unwrap()
        .select("name")
        .unwrap()
        .with_many(Rel::new("orders", "user_id", "id").refine(|orders| {
            orders
                .select("id")?
                .select("amount")?
                .order_by("id", OrderBy::Asc)?;
            Ok(())
        }))
        .unwrap()
        .with_count(Rel::new("orders", "user_id", "id"))
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .unwrap();
    query
}

#[test]
fn test_deserialize_into_structs() {
    let db = setup();
    let users: Vec<User> = db
        .get(users_with_orders(&db))
        .unwrap()
        .deserialize()
        .unwrap();

    assert_eq!(users.len(), 4);
    assert_eq!(users[0].name, "ada");
    assert_eq!(
        users[0].orders,
        vec![
            Order { id: 1, amount: 600.0 },
            Order { id: 2, amount: 700.0 },
        ]
    );
    assert_eq!(users[0].orders_count, 2);
    assert_eq!(users[3].id, 4);
    assert!(users[3].orders.is_empty());
}

#[test]
fn test_synthetic_columns_never_surface() {
    let db = setup();
    let result = db.get(users_with_orders(&db)).unwrap();
    for row in result.rows() {
        assert!(row.keys().all(|k| !k.starts_with("__rq_")), "{row:?}");
        for order in row["orders"].as_array().unwrap() {
            let order = order.as_object().unwrap();
            assert!(order.keys().all(|k| !k.starts_with("__rq_")), "{order:?}");
        }
    }
}

#[test]
fn test_records() {
    let db = setup();
    let records = db.get(users_with_orders(&db)).unwrap().into_records();
    let ada = &records[0];
    assert_eq!(ada.get("name").and_then(|f| f.as_str()), Some("ada"));
    let orders = ada.get("orders").and_then(|f| f.as_list()).unwrap();
    assert_eq!(orders.len(), 2);
    let first = orders[0].as_record().unwrap();
    assert_eq!(first.get("amount").and_then(|f| f.as_f64()), Some(600.0));
    assert!(!first.contains("__rq_user_id"));
}

#[test]
fn test_mapping_error() {
    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Wrong {
        name: i64,
    }

    let db = setup();
    let result = db.get(db.query("users").unwrap()).unwrap();
    assert!(matches!(
        result.deserialize::<Wrong>(),
        Err(RelqError::Mapping(_))
    ));
}

#[test]
fn test_total_ignores_pagination() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query
        .order_by("id", OrderBy::Asc)
        .unwrap()
        .limit(2)
        .offset(1)
        .with_total();

    let result = db.get(query).unwrap();
    assert_eq!(result.num_rows(), 2);
    assert_eq!(result.total_rows(), Some(4));
    assert_eq!(result.first().unwrap()["name"], "brian");

    let plain = db.get(db.query("users").unwrap()).unwrap();
    assert_eq!(plain.total_rows(), None);
}

#[test]
fn test_result_iterates_rows() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query.r#where("active", 0).unwrap();
    let result = db.get(query).unwrap();
    assert!(!result.is_empty());

    let names: Vec<String> = result
        .into_iter()
        .map(|row| row["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["cleo"]);
}
