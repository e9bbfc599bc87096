use proptest::prelude::*;
use sqlcache::SqlValue;

/// Short SQL-ish statements with mixed case and irregular spacing
pub fn statement_strategy() -> impl Strategy<Value = String> {
    "(SELECT|select|Select) [a-z_]{1,8}( ,[a-z_]{1,8}){0,3} (FROM|from) [a-z_]{1,12}( WHERE id = [0-9]{1,4})?"
}

/// Insert random whitespace runs between the tokens of `statement`
pub fn respaced(statement: &str, gaps: &[usize]) -> String {
    let mut out = String::new();
    for (i, token) in statement.split(' ').enumerate() {
        if i > 0 {
            let width = gaps.get(i).copied().unwrap_or(1).max(1);
            for n in 0..width {
                out.push(if n % 2 == 0 { ' ' } else { '\n' });
            }
        }
        out.push_str(token);
    }
    out
}

/// Scalar parameter values
pub fn scalar_strategy() -> impl Strategy<Value = SqlValue> {
    prop_oneof![
        Just(SqlValue::Null),
        any::<bool>().prop_map(SqlValue::Bool),
        any::<i64>().prop_map(SqlValue::Int),
        "[ -~]{0,16}".prop_map(SqlValue::Text),
    ]
}
