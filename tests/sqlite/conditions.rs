use crate::common::setup;
use relq::prelude::*;

fn names(result: QueryResult) -> Vec<String> {
    result
        .into_maps()
        .into_iter()
        .map(|row| row["name"].as_str().unwrap_or_default().to_string())
        .collect()
}

fn orders() -> Rel {
    Rel::new("orders", "user_id", "id")
}

#[test]
fn test_exists_keeps_its_place_in_group() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query
        .r#where("active", 1)
        .unwrap()
        .group_start()
        .where_exists_relation(orders())
        .unwrap()
        .or_where("name", "dan")
        .unwrap()
        .group_end()
        .unwrap();

    assert_eq!(
        query.to_sql().unwrap(),
        concat!(
            r#"SELECT "users".* FROM "users" WHERE "active" = 1 AND "#,
            r#"(EXISTS (SELECT 1 FROM "orders" AS "orders_s1" "#,
            r#"WHERE "orders_s1"."user_id" = "users"."id") OR "name" = 'dan')"#
        )
    );

    query.order_by("id", OrderBy::Asc).unwrap();
    assert_eq!(names(db.get(query).unwrap()), vec!["ada", "brian", "dan"]);
}

#[test]
fn test_group_placement_survives_other_declarations() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query
        .r#where("active", 1)
        .unwrap()
        .group_start()
        .where_exists_relation(orders())
        .unwrap()
        .with_count(orders())
        .unwrap()
        .where_has(Rel::new("profiles", "user_id", "id"), ">=", 0)
        .unwrap()
        .or_where("name", "dan")
        .unwrap()
        .group_end()
        .unwrap();

    let sql = query.to_sql().unwrap();
    assert!(sql.contains(concat!(
        r#""active" = 1 AND (EXISTS (SELECT 1 FROM "orders" AS "orders_s1" "#,
        r#"WHERE "orders_s1"."user_id" = "users"."id") OR "name" = 'dan')"#
    )));
    assert!(sql.contains(r#"AS "orders_count""#));
}

#[test]
fn test_or_group_with_nested_exists() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query
        .r#where("name", "dan")
        .unwrap()
        .or_group_start()
        .r#where("active", 0)
        .unwrap()
        .group_start()
        .where_exists_relation(orders())
        .unwrap()
        .group_end()
        .unwrap()
        .group_end()
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .unwrap();

    assert_eq!(names(db.get(query).unwrap()), vec!["cleo", "dan"]);
}

#[test]
fn test_where_has_counts() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query
        .where_has(orders(), ">=", 2)
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .unwrap();
    assert!(
        query
            .to_sql()
            .unwrap()
            .contains(r#"(SELECT COUNT(*) FROM "orders" AS "orders_s1" WHERE "orders_s1"."user_id" = "users"."id") >= 2"#)
    );
    assert_eq!(names(db.get(query).unwrap()), vec!["ada", "cleo"]);
}

#[test]
fn test_or_where_has() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query
        .r#where("name", "dan")
        .unwrap()
        .or_where_has(orders(), "=", 1)
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .unwrap();
    assert_eq!(names(db.get(query).unwrap()), vec!["brian", "dan"]);
}

#[test]
fn test_where_doesnt_have() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query.where_doesnt_have(orders()).unwrap();
    assert_eq!(names(db.get(query).unwrap()), vec!["dan"]);
}

#[test]
fn test_refined_existence() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query
        .where_exists_relation(orders().refine(|orders| {
            orders
                .r#where("status", "void")?
                .or_where("amount >", 650)?;
            Ok(())
        }))
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .unwrap();

    let sql = query.to_sql().unwrap();
    assert!(sql.contains(
        r#"AND ("status" = 'void' OR "amount" > 650)"#
    ));
    assert_eq!(names(db.get(query).unwrap()), vec!["ada", "brian"]);
}

#[test]
fn test_nested_existence_anchors_on_outer_alias() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query
        .where_exists_relation(orders().refine(|orders| {
            orders.where_exists_relation(Rel::new("order_items", "order_id", "id"))?;
            Ok(())
        }))
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .unwrap();

    let sql = query.to_sql().unwrap();
    assert!(sql.contains(r#""order_items_s2"."order_id" = "orders_s1"."id""#));
    assert_eq!(names(db.get(query).unwrap()), vec!["ada", "cleo"]);
}

#[test]
fn test_exists_now_compiles_in_place() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query
        .group_start()
        .where_exists_now(orders())
        .unwrap()
        .or_where("name", "dan")
        .unwrap();
    assert_eq!(query.pending(), 0);
    query
        .group_end()
        .unwrap()
        .r#where("active", 1)
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .unwrap();

    assert_eq!(names(db.get(query).unwrap()), vec!["ada", "brian", "dan"]);
}

#[test]
fn test_where_in_and_not_in() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query
        .where_in("id", [1, 2, 3])
        .unwrap()
        .where_not_in("name", ["brian"])
        .unwrap()
        .order_by("id", OrderBy::Asc)
        .unwrap();
    assert_eq!(names(db.get(query).unwrap()), vec!["ada", "cleo"]);

    let mut empty = db.query("users").unwrap();
    empty.where_in("id", Vec::<i64>::new()).unwrap();
    assert_eq!(db.get(empty).unwrap().num_rows(), 0);
}

#[test]
fn test_unbalanced_groups() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    assert!(matches!(
        query.group_end(),
        Err(RelqError::UnbalancedGroup(_))
    ));

    query.group_start().r#where("id", 1).unwrap();
    let err = db.get(query).unwrap_err();
    assert!(matches!(err, RelqError::UnbalancedGroup(_)));
    assert!(err.is_configuration());
}
