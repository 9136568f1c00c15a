use crate::common::setup;
use relq::prelude::*;
use serde_json::Value;

fn by_name<'a>(rows: &'a [relq::Row], name: &str) -> &'a relq::Row {
    rows.iter()
        .find(|row| row["name"] == name)
        .unwrap_or_else(|| panic!("no row for {name}"))
}

#[test]
fn test_aggregate_columns() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    let orders = || Rel::new("orders", "user_id", "id");
    query
        .with_count(orders())
        .unwrap()
        .with_sum(orders(), "amount")
        .unwrap()
        .with_avg(orders(), "amount")
        .unwrap()
        .with_min(orders(), "amount")
        .unwrap()
        .with_max(orders(), "amount")
        .unwrap();

    let rows = db.get(query).unwrap().into_maps();
    let ada = by_name(&rows, "ada");
    assert_eq!(ada["orders_count"], 2);
    assert_eq!(ada["orders_sum"].as_f64(), Some(1300.0));
    assert_eq!(ada["orders_avg"].as_f64(), Some(650.0));
    assert_eq!(ada["orders_min"].as_f64(), Some(600.0));
    assert_eq!(ada["orders_max"].as_f64(), Some(700.0));

    let dan = by_name(&rows, "dan");
    assert_eq!(dan["orders_count"], 0);
    assert_eq!(dan["orders_sum"], Value::Null);
}

#[test]
fn test_aggregate_filter_over_sum() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query
        .with_sum(Rel::new("orders", "user_id", "id"), "amount")
        .unwrap()
        .where_aggregate("orders_sum >", 1000)
        .unwrap();

    let sql = query.to_sql().unwrap();
    let subquery = concat!(
        r#"(SELECT SUM("orders_sum_s1"."amount") FROM "orders" AS "orders_sum_s1" "#,
        r#"WHERE "orders_sum_s1"."user_id" = "users"."id")"#
    );
    assert!(sql.contains(&format!(r#"{subquery} AS "orders_sum""#)));
    assert!(sql.contains(&format!("COALESCE({subquery}, 0) > 1000")));

    let rows = db.get(query).unwrap().into_maps();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "ada");
}

#[test]
fn test_aggregate_filter_counts_missing_as_zero() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query
        .with_sum(Rel::new("orders", "user_id", "id"), "amount")
        .unwrap()
        .where_aggregate("orders_sum <", 100)
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .unwrap();

    let rows = db.get(query).unwrap().into_maps();
    let names: Vec<_> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["brian", "cleo", "dan"]);
}

#[test]
fn test_or_aggregate_filter() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query
        .with_count(Rel::new("orders", "user_id", "id"))
        .unwrap()
        .r#where("name", "dan")
        .unwrap()
        .or_where_aggregate("orders_count =", 1)
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .unwrap();

    let rows = db.get(query).unwrap().into_maps();
    let names: Vec<_> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["brian", "dan"]);
}

#[test]
fn test_expression_aggregate() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query
        .with_sum(Rel::new("orders as revenue", "user_id", "id"), "price * quantity")
        .unwrap()
        .with_calc(
            Rel::new("orders as paid_share", "user_id", "id").refine(|o| {
                o.r#where("status", "paid")?;
                Ok(())
            }),
            "ROUND(SUM(amount) * 100.0 / COUNT(*), 1)",
        )
        .unwrap()
        .r#where("id", 1)
        .unwrap();

    let rows = db.get(query).unwrap().into_maps();
    assert_eq!(rows[0]["revenue"].as_f64(), Some(1300.0));
    assert_eq!(rows[0]["paid_share"].as_f64(), Some(65000.0));
}

#[test]
fn test_refined_aggregate() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query
        .with_count(
            Rel::new("orders as paid_orders", "user_id", "id").refine(|o| {
                o.r#where("status", "paid")?;
                Ok(())
            }),
        )
        .unwrap()
        .order_by_aggregate("paid_orders", OrderBy::Desc)
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .unwrap();

    let rows = db.get(query).unwrap().into_maps();
    let counts: Vec<_> = rows
        .iter()
        .map(|r| (r["name"].as_str().unwrap(), r["paid_orders"].as_i64().unwrap()))
        .collect();
    assert_eq!(
        counts,
        vec![("ada", 2), ("cleo", 2), ("brian", 0), ("dan", 0)]
    );
}

#[test]
fn test_filter_must_follow_its_aggregate() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    let err = query.where_aggregate("orders_sum >", 1).unwrap_err();
    assert!(matches!(err, RelqError::UnresolvedAlias(_)));
    assert!(err.is_configuration());
}
