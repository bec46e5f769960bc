use std::sync::Arc;

use pretty_assertions::assert_eq;
use rest_query_filters::{validation, Params, Query, QueryError, Scalar, Validations};

fn params(pairs: &[(&str, &str)]) -> Params {
    let mut map = Params::new();
    for (k, v) in pairs {
        map.entry(k.to_string())
            .or_default()
            .push(v.to_string());
    }
    map
}

fn session(pairs: &[(&str, &str)]) -> Query {
    Query::new().with_params(params(pairs)).with_validations(
        Validations::new()
            .add(
                "id:int",
                Some(Arc::new(|v: &Scalar| match v {
                    Scalar::Int(n) if *n > 10 => {
                        Err(QueryError::Validation("can't be greater than 10".into()))
                    }
                    _ => Ok(()),
                })),
            )
            .add("f:float", None)
            .add("s", Some(validation::one_of(["super", "best"])))
            .add("u:string", None)
            .add("b:bool", None),
    )
}

fn parse_ok(pairs: &[(&str, &str)]) -> Query {
    let mut q = session(pairs);
    q.parse().expect("parse should succeed");
    q
}

fn parse_err(pairs: &[(&str, &str)]) -> String {
    let mut q = session(pairs);
    q.parse().expect_err("parse should fail").to_string()
}

#[test]
fn empty_input_renders_nothing() {
    let q = parse_ok(&[]);
    assert_eq!(q.where_clause(), "");
    assert_eq!(q.where_sql(), "");
    assert!(q.args().is_empty());
}

#[test]
fn single_int_equality() {
    let q = parse_ok(&[("id", "4")]);
    assert_eq!(q.where_sql(), " WHERE id = ?");
    assert_eq!(q.args(), vec![Scalar::Int(4)]);
}

#[test]
fn bad_values_name_the_offending_key() {
    assert_eq!(parse_err(&[("id", "1.2")]), "id: bad format");
    assert_eq!(parse_err(&[("id[in]", "1.2,1.2")]), "id[in]: bad format");
    assert_eq!(parse_err(&[("id[nin]", "1.2")]), "id[nin]: bad format");
    assert_eq!(parse_err(&[("id[test]", "1")]), "id[test]: unknown method");
    assert_eq!(parse_err(&[("id[like]", "1")]), "id[like]: method not allowed");
    assert_eq!(parse_err(&[("id", "")]), "id: empty value");
    assert_eq!(parse_err(&[("u", "")]), "u: empty value");
}

#[test]
fn unclosed_bracket_is_rejected() {
    assert_eq!(parse_err(&[("id[gte", "1")]), "id[gte: bad format");
}

#[test]
fn custom_validator_failures_surface() {
    assert_eq!(
        parse_err(&[("id", "100")]),
        "id: can't be greater than 10"
    );
    assert_eq!(
        parse_err(&[("id[in]", "100,200")]),
        "id[in]: can't be greater than 10"
    );
}

#[test]
fn scope_validator_reports_first_offender() {
    assert_eq!(parse_err(&[("s", "puper")]), "s: puper: not in scope");
    assert_eq!(
        parse_err(&[("s[in]", "super,puper")]),
        "s[in]: puper: not in scope"
    );
    assert_eq!(
        parse_err(&[("s[nin]", "super,puper")]),
        "s[nin]: puper: not in scope"
    );
}

#[test]
fn in_lists_expand_placeholders() {
    let q = parse_ok(&[("id[in]", "1,2")]);
    assert_eq!(q.where_sql(), " WHERE id IN (?, ?)");
    assert_eq!(q.args(), vec![Scalar::Int(1), Scalar::Int(2)]);

    let q = parse_ok(&[("s[in]", "super,best")]);
    assert_eq!(q.where_sql(), " WHERE s IN (?, ?)");

    let q = parse_ok(&[("s[nin]", "super,best")]);
    assert_eq!(q.where_sql(), " WHERE s NOT IN (?, ?)");
}

#[test]
fn negated_pattern_matches() {
    let q = parse_ok(&[("u[nlike]", "superman")]);
    assert_eq!(q.where_sql(), " WHERE u NOT LIKE ?");

    let q = parse_ok(&[("u[nilike]", "superman")]);
    assert_eq!(q.where_sql(), " WHERE u NOT ILIKE ?");
}

#[test]
fn wildcard_bounds_become_sql_wildcards() {
    let q = parse_ok(&[("u[like]", "*super*")]);
    assert_eq!(q.where_sql(), " WHERE u LIKE ?");
    assert_eq!(q.args(), vec![Scalar::Str("%super%".into())]);
}

#[test]
fn repeated_keys_become_separate_filters() {
    let q = parse_ok(&[("id[eq]", "1"), ("id[eq]", "4")]);
    assert_eq!(q.where_sql(), " WHERE id = ? AND id = ?");
    assert_eq!(q.args(), vec![Scalar::Int(1), Scalar::Int(4)]);
}

#[test]
fn range_pair_renders_in_key_order() {
    let q = parse_ok(&[("id[gte]", "1"), ("id[lte]", "4")]);
    assert_eq!(q.where_sql(), " WHERE id >= ? AND id <= ?");
    assert_eq!(q.args(), vec![Scalar::Int(1), Scalar::Int(4)]);
}

#[test]
fn or_delimited_value_renders_one_group() {
    let q = parse_ok(&[("id[gte]", "1|id[lte]=4")]);
    assert_eq!(q.where_sql(), " WHERE (id >= ? OR id <= ?)");
    assert_eq!(q.args(), vec![Scalar::Int(1), Scalar::Int(4)]);
}

#[test]
fn float_ranges() {
    let q = parse_ok(&[("f[gte]", "1.5"), ("f[lte]", "4.7")]);
    assert_eq!(q.where_sql(), " WHERE f >= ? AND f <= ?");
    assert_eq!(q.args(), vec![Scalar::Float(1.5), Scalar::Float(4.7)]);

    let q = parse_ok(&[("f[gte]", "1.5|f[lte]=4.7")]);
    assert_eq!(q.where_sql(), " WHERE (f >= ? OR f <= ?)");
}

#[test]
fn null_checks() {
    let q = parse_ok(&[("u[not]", "NULL")]);
    assert_eq!(q.where_sql(), " WHERE u IS NOT NULL");
    assert!(q.args().is_empty());

    let q = parse_ok(&[("u[is]", "NULL")]);
    assert_eq!(q.where_sql(), " WHERE u IS NULL");
}

#[test]
fn bool_filters() {
    let q = parse_ok(&[("b", "true")]);
    assert_eq!(q.where_sql(), " WHERE b = ?");
    assert_eq!(q.args(), vec![Scalar::Bool(true)]);

    assert_eq!(parse_err(&[("b", "true1")]), "b: bad format");
    assert_eq!(parse_err(&[("b[not]", "true")]), "b[not]: bad format");
    assert_eq!(
        parse_err(&[("b[eq]", "true,false")]),
        "b[eq]: method not allowed"
    );
}

#[test]
fn cross_field_or_groups_stack() {
    let mut q = Query::new()
        .with_params(params(&[
            ("test1[eq]", "test10|test2[eq]=test20"),
            ("test1[eq]", "test11|test2[eq]=test21"),
        ]))
        .with_validations(Validations::new().add("test1", None).add("test2", None));
    q.parse().unwrap();
    assert_eq!(
        q.where_clause(),
        "(test1 = ? OR test2 = ?) AND (test1 = ? OR test2 = ?)"
    );
}

#[test]
fn mixed_filters_and_group() {
    let mut q = session(&[
        ("id[eq]", "10"),
        ("f[gt]", "4"),
        ("s[like]", "super|u[like]=*best*"),
        ("id[gt]", "1"),
    ]);
    q.parse().unwrap();
    assert_eq!(
        q.where_clause(),
        "f > ? AND id = ? AND id > ? AND (s LIKE ? OR u LIKE ?)"
    );
    assert_eq!(
        q.args(),
        vec![
            Scalar::Float(4.0),
            Scalar::Int(10),
            Scalar::Int(1),
            Scalar::Str("super".into()),
            Scalar::Str("%best%".into()),
        ]
    );
}

#[test]
fn empty_member_in_group_fails() {
    assert_eq!(
        parse_err(&[("s[like]", "super|u[like]=")]),
        "u[like]: empty value"
    );
}

#[test]
fn unknown_filters_follow_policy() {
    let mut q = Query::new().with_params(params(&[("id", "10")]));
    assert_eq!(
        q.parse().unwrap_err().to_string(),
        "id: filter not found"
    );

    q.ignore_unknown_filters(true);
    q.parse().unwrap();
    assert_eq!(q.where_clause(), "");

    let mut q = Query::new().with_params(params(&[("id[gt]", "10|id[lt]=10")]));
    q.ignore_unknown_filters(true);
    q.parse().unwrap();
    assert_eq!(q.where_clause(), "");

    q.ignore_unknown_filters(false);
    assert_eq!(
        q.parse().unwrap_err().root(),
        &QueryError::FilterNotFound
    );
}

#[test]
fn special_names_bypass_declarations() {
    let mut q = Query::new().with_params(params(&[("ghost", "boo")]));
    q.allow_special_filters(["ghost"]);
    q.parse().unwrap();
    assert_eq!(q.where_sql(), " WHERE ghost = ?");
    assert_eq!(q.args(), vec![Scalar::Str("boo".into())]);
}

#[test]
fn required_filters_must_be_present() {
    let mut q = Query::new()
        .with_params(params(&[]))
        .with_validations(Validations::new().add("limit:required", None));
    assert_eq!(q.parse().unwrap_err().to_string(), "limit: required");

    let mut q = Query::new()
        .with_params(params(&[("limit", "10"), ("one[eq]", "1"), ("count", "4")]))
        .with_validations(
            Validations::new()
                .add("limit:required", None)
                .add("one:int", None)
                .add("count:int:required", None),
        );
    q.parse().unwrap();
    assert_eq!(q.limit, Some(10));
    assert_eq!(q.where_clause(), "count = ? AND one = ?");
}
