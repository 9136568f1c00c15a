use crate::common::setup_db;
use relq::prelude::*;

const CONFIG: &str = r#"
dialect = "sqlite"
max_depth = 2
correlation_prefix = "__link_"
"#;

#[test]
fn test_toml_config_drives_compilation() {
    let config = QueryConfig::from_toml_str(CONFIG).unwrap();
    assert_eq!(config.max_depth, 2);
    assert_eq!(config.max_result_depth, 20);

    let db = Relq::with_config(setup_db(), config).unwrap();
    let mut query = db.query("users").unwrap();
    query
        .select("name")
        .unwrap()
        .with_many(Rel::new("orders", "user_id", "id"))
        .unwrap()
        .r#where("id", 1)
        .unwrap();
    assert!(query.to_sql().unwrap().contains(r#""users"."id" AS "__link_id""#));

    let rows = db.get(query).unwrap().into_maps();
    assert!(rows[0].keys().all(|key| !key.starts_with("__link_")));
    assert_eq!(rows[0]["orders"].as_array().unwrap().len(), 2);
}

#[test]
fn test_max_depth_from_config() {
    let config = QueryConfig::from_toml_str(CONFIG).unwrap();
    let db = Relq::with_config(setup_db(), config).unwrap();

    let items = || Rel::new("order_items", "order_id", "id");
    let mut shallow = db.query("users").unwrap();
    shallow
        .where_exists_relation(Rel::new("orders", "user_id", "id").refine(move |orders| {
            orders.where_exists_relation(items())?;
            Ok(())
        }))
        .unwrap();
    assert!(db.get(shallow).is_ok());

    let mut deep = db.query("users").unwrap();
    deep.where_exists_relation(Rel::new("orders", "user_id", "id").refine(move |orders| {
        orders.where_exists_relation(items().refine(|items| {
            items.where_exists_relation(Rel::new("orders", "id", "order_id"))?;
            Ok(())
        }))?;
        Ok(())
    }))
    .unwrap();
    let err = db.get(deep).unwrap_err();
    assert!(matches!(err, RelqError::RecursionLimit(2)));
    assert!(err.is_compilation());
}

#[test]
fn test_invalid_config_is_rejected() {
    assert!(matches!(
        QueryConfig::from_toml_str("correlation_prefix = \"bad-prefix\""),
        Err(RelqError::Config(_))
    ));
    assert!(matches!(
        QueryConfig::from_toml_str("max_depth = 0"),
        Err(RelqError::Config(_))
    ));
    assert!(matches!(
        QueryConfig::from_toml_str("unknown = 1"),
        Err(RelqError::Config(_))
    ));

    let config = QueryConfig::default().with_max_result_depth(0);
    assert!(Relq::with_config(setup_db(), config).is_err());
}

#[test]
fn test_dialect_changes_quoting() {
    let config = QueryConfig::default().with_dialect(Dialect::MySQL);
    let mut query = Query::new(config);
    query
        .from("users")
        .unwrap()
        .where_has(Rel::new("orders", "user_id", "id"), ">", 0)
        .unwrap();
    assert_eq!(
        query.to_sql().unwrap(),
        concat!(
            "SELECT `users`.* FROM `users` WHERE (SELECT COUNT(*) FROM `orders` AS `orders_s1` ",
            "WHERE `orders_s1`.`user_id` = `users`.`id`) > 0"
        )
    );
}
