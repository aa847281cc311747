//! Property tests for the template-identity and predicate-consistency laws.

use maverick_expr::{evaluate_template, ExprContext};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashMap;

struct Ctx {
    inputs: HashMap<String, Value>,
}

impl ExprContext for Ctx {
    fn input(&self, name: &str) -> Option<Value> {
        self.inputs.get(name).cloned()
    }
    fn step_output(&self, _: &str) -> Option<Value> {
        None
    }
    fn iteration(&self) -> Option<(Value, Value)> {
        None
    }
}

proptest! {
    /// `evaluate("${{ inputs.x }}")` re-stringified equals `str(value)` for
    /// every string value `inputs.x` can hold (strings are injective under
    /// identity, so this is the representative case for the law).
    #[test]
    fn pure_string_template_round_trips(s in "[a-zA-Z0-9 _-]{0,40}") {
        let ctx = Ctx { inputs: HashMap::from([("x".to_string(), json!(s.clone()))]) };
        let raw = evaluate_template("${{ inputs.x }}", &ctx).unwrap();
        prop_assert_eq!(raw, json!(s.clone()));

        let mixed = evaluate_template("v=${{ inputs.x }}", &ctx).unwrap();
        prop_assert_eq!(mixed, json!(format!("v={s}")));
    }

    #[test]
    fn pure_integer_template_returns_raw_typed_value(n in any::<i64>()) {
        let ctx = Ctx { inputs: HashMap::from([("x".to_string(), json!(n))]) };
        let raw = evaluate_template("${{ inputs.x }}", &ctx).unwrap();
        prop_assert_eq!(raw, json!(n));

        let mixed = evaluate_template("n=${{ inputs.x }}", &ctx).unwrap();
        prop_assert_eq!(mixed, json!(format!("n={n}")));
    }
}
