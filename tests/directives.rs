//! Table-driven coverage of the `@IF`/`@AND`/`@OR` predicate rules and the
//! per-dialect pagination suffix, mirroring the `#[rstest]` case-table style
//! used for fixture-driven coverage elsewhere in this codebase.

use elsql::{AnsiDialect, Bundle, MapParams, MysqlDialect, PostgresDialect, UNLIMITED_FETCH};
use rstest::rstest;

fn canonicalise(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[rstest]
#[case::match_value_equal(Some("active"), "SELECT 1 AND active")]
#[case::match_value_different_case(Some("ACTIVE"), "SELECT 1 AND active")]
#[case::match_value_mismatch(Some("inactive"), "SELECT 1")]
#[case::match_value_absent_variable(None, "SELECT 1")]
fn if_directive_with_match_value(#[case] bound: Option<&str>, #[case] expected_sql: &str) {
    let bundle = Bundle::parse(
        AnsiDialect,
        &["@NAME(Sel)\n  SELECT 1\n  @IF(:kind = active)\n    AND active\n"],
    )
    .unwrap();

    let params = match bound {
        Some(v) => MapParams::new().insert("kind", v),
        None => MapParams::new(),
    };
    let sql = canonicalise(&bundle.get_sql_with_params("Sel", &params).unwrap());
    assert_eq!(sql, expected_sql);
}

#[rstest]
#[case::boolean_true(true, "SELECT 1 AND flagged")]
#[case::boolean_false(false, "SELECT 1")]
fn if_directive_without_match_value_uses_own_truth(#[case] flag: bool, #[case] expected: &str) {
    let bundle = Bundle::parse(
        AnsiDialect,
        &["@NAME(Sel)\n  SELECT 1\n  @IF(:flagged)\n    AND flagged\n"],
    )
    .unwrap();

    let params = MapParams::new().insert("flagged", flag);
    let sql = canonicalise(&bundle.get_sql_with_params("Sel", &params).unwrap());
    assert_eq!(sql, expected);
}

#[rstest]
#[case::both_present("a", "b", "SELECT * FROM t WHERE a = a AND b = b")]
#[case::only_first("a", "", "SELECT * FROM t WHERE a = a")]
#[case::only_second("", "b", "SELECT * FROM t WHERE b = b")]
#[case::neither("", "", "SELECT * FROM t")]
fn and_chain_suppresses_connective_on_first_clause(
    #[case] a: &str,
    #[case] b: &str,
    #[case] expected: &str,
) {
    let bundle = Bundle::parse(
        AnsiDialect,
        &[
            "@NAME(Sel)\n  SELECT * FROM t\n  @WHERE\n    @AND(:a)\n      a = :a\n    @AND(:b)\n      b = :b\n",
        ],
    )
    .unwrap();

    let mut params = MapParams::new();
    if !a.is_empty() {
        params = params.insert("a", a);
    }
    if !b.is_empty() {
        params = params.insert("b", b);
    }
    let sql = canonicalise(&bundle.get_sql_with_params("Sel", &params).unwrap());
    assert_eq!(sql, expected);
    assert!(!sql.contains("WHERE AND"));
    assert!(!sql.contains("WHERE OR"));
}

#[rstest]
#[case::ansi_both(5, 10, "SELECT * FROM t OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY")]
#[case::ansi_offset_only(5, UNLIMITED_FETCH, "SELECT * FROM t OFFSET 5 ROWS")]
#[case::ansi_fetch_only(0, 10, "SELECT * FROM t FETCH NEXT 10 ROWS ONLY")]
#[case::ansi_neither(0, UNLIMITED_FETCH, "SELECT * FROM t")]
fn ansi_paging_cases(#[case] offset: i64, #[case] fetch: i64, #[case] expected: &str) {
    let bundle = Bundle::parse(
        AnsiDialect,
        &["@NAME(Sel)\n  @PAGING(:off,:fetch)\n    SELECT * FROM t\n"],
    )
    .unwrap();
    let params = MapParams::new().insert("off", offset).insert("fetch", fetch);
    let sql = canonicalise(&bundle.get_sql_with_params("Sel", &params).unwrap());
    assert_eq!(sql, expected);
}

#[rstest]
#[case::postgres_both("postgres", 5, 10, "SELECT * FROM t LIMIT 10 OFFSET 5")]
#[case::postgres_offset_only("postgres", 5, UNLIMITED_FETCH, "SELECT * FROM t OFFSET 5")]
#[case::postgres_fetch_only("postgres", 0, 10, "SELECT * FROM t LIMIT 10")]
#[case::mysql_both("mysql", 5, 10, "SELECT * FROM t LIMIT 5, 10")]
#[case::mysql_unlimited("mysql", 0, UNLIMITED_FETCH, "SELECT * FROM t")]
fn vendor_paging_cases(
    #[case] dialect: &str,
    #[case] offset: i64,
    #[case] fetch: i64,
    #[case] expected: &str,
) {
    let bundle = Bundle::parse(
        AnsiDialect,
        &["@NAME(Sel)\n  @PAGING(:off,:fetch)\n    SELECT * FROM t\n"],
    )
    .unwrap();
    let params = MapParams::new().insert("off", offset).insert("fetch", fetch);

    let sql = match dialect {
        "postgres" => {
            let bundle = bundle.with_config(PostgresDialect);
            canonicalise(&bundle.get_sql_with_params("Sel", &params).unwrap())
        }
        "mysql" => {
            let bundle = bundle.with_config(MysqlDialect::default());
            canonicalise(&bundle.get_sql_with_params("Sel", &params).unwrap())
        }
        other => panic!("unexpected dialect case {other}"),
    };
    assert_eq!(sql, expected);
}
