use serde_json::Value;

/// Rough token estimate: four characters per token over the serialized
/// form. Good enough for budget packing; never used for billing.
pub fn estimate_tokens(value: &Value) -> usize {
    let serialized = match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    (serialized.chars().count() / 4).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn longer_payloads_cost_more() {
        let small = estimate_tokens(&json!({"id": "a"}));
        let large = estimate_tokens(&json!({"id": "a", "summary": "x".repeat(400)}));
        assert!(large > small);
        assert!(small >= 1);
    }
}
