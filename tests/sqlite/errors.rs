use crate::common::setup;
use relq::core::validate::{ExpressionMode, IdentifierKind, validate_expression, validate_identifier};
use relq::prelude::*;

#[test]
fn test_identifier_verdicts() {
    let column = |name| validate_identifier(name, IdentifierKind::Column);
    assert!(column("a; DROP TABLE x").is_err());
    assert!(column("user_name").is_ok());
    assert!(column("user.name").is_ok());
    assert!(column("user--name").is_err());
    assert!(column("sp_who").is_err());
    assert!(column("a.b.c").is_err());
}

#[test]
fn test_validation_is_repeatable() {
    let inputs = ["user_name", "a; DROP TABLE x", "price * quantity", "1 OR 1"];
    for input in inputs {
        let first = validate_expression(input, ExpressionMode::CustomColumn).is_ok();
        for _ in 0..3 {
            assert_eq!(
                validate_expression(input, ExpressionMode::CustomColumn).is_ok(),
                first,
                "{input}"
            );
            assert_eq!(
                validate_identifier(input, IdentifierKind::Column).is_ok(),
                validate_identifier(input, IdentifierKind::Column).is_ok()
            );
        }
    }
}

#[test]
fn test_injection_never_reaches_the_database() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    assert!(matches!(
        query.with_sum(Rel::new("orders", "user_id", "id"), "amount); DROP TABLE users; --"),
        Err(RelqError::InvalidExpression { .. })
    ));
    assert!(matches!(
        query.with_many(Rel::new("orders; DROP TABLE users", "user_id", "id")),
        Err(RelqError::InvalidIdentifier { .. })
    ));
    assert!(query.r#where("name = 'x' OR 1 =", 1).is_err());
    assert_eq!(query.pending(), 0);

    let rows = db.get(query).unwrap();
    assert_eq!(rows.num_rows(), 4);
}

#[test]
fn test_key_count_mismatch_at_declaration() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    let err = query
        .with_many(Rel::new("orders", ["tenant_id", "user_id"], "id"))
        .unwrap_err();
    match err {
        RelqError::KeyCountMismatch {
            relation,
            foreign,
            local,
        } => {
            assert_eq!(relation, "orders");
            assert_eq!((foreign, local), (2, 1));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(query.pending(), 0);
}

#[test]
fn test_duplicate_aggregate_alias() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query.with_count(Rel::new("orders", "user_id", "id")).unwrap();
    assert!(matches!(
        query.with_count(Rel::new("orders", "user_id", "id")),
        Err(RelqError::DuplicateAlias(alias)) if alias == "orders_count"
    ));
}

#[test]
fn test_invalid_has_parameters() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    let orders = || Rel::new("orders", "user_id", "id");
    assert!(matches!(
        query.where_has(orders(), "LIKE", 1),
        Err(RelqError::InvalidParameter(_))
    ));
    assert!(matches!(
        query.where_has(orders(), ">", -1),
        Err(RelqError::InvalidParameter(_))
    ));
}

#[test]
fn test_execution_error_carries_sql_and_call_site() {
    let db = setup();
    let mut query = db.query("no_such_table").unwrap();
    query.r#where("id", 1).unwrap();

    let line = line!() + 1;
    let err = db.get(query).unwrap_err();
    let diagnostic = err.diagnostic().expect("execution diagnostic");
    assert_eq!(
        diagnostic.sql,
        r#"SELECT "no_such_table".* FROM "no_such_table" WHERE "id" = 1"#
    );
    assert!(diagnostic.message.contains("no such table"));
    assert!(diagnostic.code.is_some());
    assert_eq!(diagnostic.location.file(), file!());
    assert_eq!(diagnostic.location.line(), line);

    let rendered = err.to_string();
    assert!(rendered.contains("no_such_table"));
    assert!(rendered.contains(file!()));
}

#[test]
fn test_failing_eager_load_reports_child_sql() {
    let db = setup();
    let mut query = db.query("users").unwrap();
    query
        .with_many(Rel::new("missing_orders", "user_id", "id"))
        .unwrap();

    let err = db.get(query).unwrap_err();
    let diagnostic = err.diagnostic().expect("execution diagnostic");
    assert!(diagnostic.sql.starts_with(r#"SELECT "missing_orders".* FROM "missing_orders""#));
    assert_eq!(diagnostic.location.file(), file!());
}

#[test]
fn test_error_categories() {
    let db = setup();

    let mut query = db.query("users").unwrap();
    let err = query.where_aggregate("nothing >", 1).unwrap_err();
    assert!(err.is_configuration());
    assert!(!err.is_compilation());
    assert!(err.diagnostic().is_none());

    let mut query = db.query("users").unwrap();
    query
        .where_exists_relation(Rel::new("orders", "user_id", "id").refine(|orders| {
            orders.with_one(Rel::new("users", "id", "user_id"))?;
            Ok(())
        }))
        .unwrap();
    let err = db.get(query).unwrap_err();
    assert!(err.is_compilation());
    assert!(!err.is_configuration());

    let query = db.query("users as u").unwrap();
    assert!(db.get(query).is_ok());
    assert!(db.query("users as 1u").is_err());
}
