use genome_core::{GenomeError, Result};
use serde_json::json;

/// How a tool interacts with the session contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolClass {
    /// `scan`; always permitted; the escape hatch for broken states.
    Scan,
    /// `validate`; always permitted; clears or sets the validation gate.
    Validate,
    /// Pre-edit impact check; permitted while an update is pending.
    Impact,
    /// Query-side tools; blocked while an update is pending.
    Reader,
    /// State-mutating tools (`update`, `set_context_session`).
    Writer,
}

#[derive(Debug, Clone)]
pub struct ImpactRecord {
    pub nodes: Vec<String>,
    pub operation: String,
    pub risk: f32,
}

/// Per-session agent-contract state.
///
/// Rules enforced: load-before-use, impact-before-edit, update-after-edit,
/// and a validation gate that only `scan`/`validate` can clear.
#[derive(Debug, Default)]
pub struct ContractState {
    loaded: bool,
    last_impact: Option<ImpactRecord>,
    pending_update: bool,
    validation_failed: bool,
}

impl ContractState {
    /// Gate a tool call. Returns a `ContractViolation` with a stable code
    /// when the session must remediate first; no state is mutated.
    pub fn check(&self, class: ToolClass) -> Result<()> {
        if matches!(class, ToolClass::Scan | ToolClass::Validate) {
            return Ok(());
        }

        if self.validation_failed {
            return Err(GenomeError::ContractViolation {
                code: "validation-failed",
                message: "validation failed; only `scan` and `validate` are permitted".into(),
            });
        }
        if !self.loaded {
            return Err(GenomeError::ContractViolation {
                code: "missing-load",
                message: "load the `current` resource (or `summary`) before using tools".into(),
            });
        }
        match class {
            ToolClass::Reader if self.pending_update => Err(GenomeError::ContractViolation {
                code: "pending-update",
                message: "an impact-checked edit is pending; call `update` (or a fresh `validate`) first"
                    .into(),
            }),
            _ => Ok(()),
        }
    }

    /// `update` specifically requires a prior impact check.
    pub fn check_update(&self) -> Result<()> {
        self.check(ToolClass::Writer)?;
        if self.last_impact.is_none() {
            return Err(GenomeError::ContractViolation {
                code: "missing-impact",
                message: "call `impact` with the affected ids before `update`".into(),
            });
        }
        Ok(())
    }

    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    /// Record an impact check; mutating operations arm the update gate.
    pub fn record_impact(&mut self, record: ImpactRecord) {
        let mutating = matches!(record.operation.as_str(), "modify" | "delete" | "add");
        self.last_impact = Some(record);
        if mutating {
            self.pending_update = true;
        }
    }

    pub fn mark_updated(&mut self) {
        self.pending_update = false;
        self.last_impact = None;
    }

    pub fn set_validation(&mut self, ok: bool) {
        self.validation_failed = !ok;
        if ok {
            // A fresh successful validation also releases the update gate.
            self.pending_update = false;
        }
    }

    pub fn status(&self) -> serde_json::Value {
        json!({
            "loaded": self.loaded,
            "pending_update": self.pending_update,
            "validation_failed": self.validation_failed,
            "last_impact": self.last_impact.as_ref().map(|record| json!({
                "nodes": record.nodes,
                "operation": record.operation,
                "risk": record.risk,
            })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation_code(result: Result<()>) -> &'static str {
        match result.unwrap_err() {
            GenomeError::ContractViolation { code, .. } => code,
            other => panic!("expected contract violation, got {other}"),
        }
    }

    #[test]
    fn update_without_load_is_missing_load() {
        let contract = ContractState::default();
        assert_eq!(violation_code(contract.check(ToolClass::Writer)), "missing-load");
    }

    #[test]
    fn update_without_impact_is_missing_impact() {
        let mut contract = ContractState::default();
        contract.mark_loaded();
        assert_eq!(violation_code(contract.check_update()), "missing-impact");
    }

    #[test]
    fn readers_are_blocked_while_update_pending() {
        let mut contract = ContractState::default();
        contract.mark_loaded();
        contract.record_impact(ImpactRecord {
            nodes: vec!["auth.login".into()],
            operation: "modify".into(),
            risk: 0.4,
        });
        assert_eq!(violation_code(contract.check(ToolClass::Reader)), "pending-update");
        // Impact re-checks stay permitted.
        assert!(contract.check(ToolClass::Impact).is_ok());

        contract.mark_updated();
        assert!(contract.check(ToolClass::Reader).is_ok());
    }

    #[test]
    fn successful_validate_releases_the_gate() {
        let mut contract = ContractState::default();
        contract.mark_loaded();
        contract.record_impact(ImpactRecord {
            nodes: vec![],
            operation: "delete".into(),
            risk: 0.9,
        });
        contract.set_validation(true);
        assert!(contract.check(ToolClass::Reader).is_ok());
    }

    #[test]
    fn failed_validation_blocks_everything_but_scan_and_validate() {
        let mut contract = ContractState::default();
        contract.mark_loaded();
        contract.set_validation(false);
        assert_eq!(
            violation_code(contract.check(ToolClass::Reader)),
            "validation-failed"
        );
        assert!(contract.check(ToolClass::Scan).is_ok());
        assert!(contract.check(ToolClass::Validate).is_ok());
    }

    #[test]
    fn read_only_impact_does_not_arm_the_gate() {
        let mut contract = ContractState::default();
        contract.mark_loaded();
        contract.record_impact(ImpactRecord {
            nodes: vec![],
            operation: "read".into(),
            risk: 0.1,
        });
        assert!(contract.check(ToolClass::Reader).is_ok());
    }
}
