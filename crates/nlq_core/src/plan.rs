use serde::{Deserialize, Serialize};

/// Aggregation operation for a `computeStats` step.
///
/// Tagged variant over a fixed op set, not a named-callable lookup, per the
/// "dynamic message dispatch" redesign flag — unknown ops fail to parse
/// rather than being silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum StatOp {
    Count,
    TopK { field: String, k: u32 },
    Mean { field: String },
    Min { field: String },
    Max { field: String },
    Sum { field: String },
    Distinct { field: String },
}

/// One step of a Plan. A fixed tagged variant over the three supported
/// tool kinds — extending the tool set means adding a variant here, not
/// registering a new named callable at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PlanStep {
    DbQuery { sub_query: String },
    ComputeStats { on_step: usize, ops: Vec<StatOp> },
    SecondaryAnalysis { on_steps: Vec<usize>, instructions: String },
}

/// An ordered sequence of PlanStep, produced by the Planner from
/// `{userText, schemaJson, memoryInsights, capabilitiesString,
/// keywordCandidates, kind}` and consumed step-by-step by the Executor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// The deterministic heuristic fallback: a single `dbQuery` step whose
    /// `subQuery` is the original user text.
    pub fn heuristic_single_step(user_text: impl Into<String>) -> Self {
        Self {
            steps: vec![PlanStep::DbQuery {
                    sub_query: user_text.into(),
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Validates that every step-index reference points at an earlier step
    /// (`computeStats.onStep`, `secondaryAnalysis.onSteps`) — required before
    /// the Executor runs the plan, since the Planner's LLM output is untrusted.
    pub fn validate_references(&self) -> Result<(), String> {
        for (idx, step) in self.steps.iter().enumerate() {
            match step {
                PlanStep::ComputeStats { on_step, .. } => {
                    if *on_step >= idx {
                        return Err(format!(
                                "computeStats step {} references non-prior step {}",
                                idx, on_step
                        ));
                    }
                }
                PlanStep::SecondaryAnalysis { on_steps, .. } => {
                    for referenced in on_steps {
                        if *referenced >= idx {
                            return Err(format!(
                                    "secondaryAnalysis step {} references non-prior step {}",
                                    idx, referenced
                            ));
                        }
                    }
                }
                PlanStep::DbQuery { .. } => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_plan_is_a_single_db_query_step() {
        let plan = Plan::heuristic_single_step("how many orders today");
        assert_eq!(plan.steps.len(), 1);
        match &plan.steps[0] {
            PlanStep::DbQuery { sub_query } => assert_eq!(sub_query, "how many orders today"),
            _ => panic!("expected dbQuery step"),
        }
    }

    #[test]
    fn validate_references_rejects_forward_reference() {
        let plan = Plan {
            steps: vec![
                PlanStep::DbQuery { sub_query: "x".into() },
                PlanStep::ComputeStats { on_step: 1, ops: vec![StatOp::Count] },
            ],
        };
        assert!(plan.validate_references().is_err());
    }

    #[test]
    fn validate_references_accepts_prior_reference() {
        let plan = Plan {
            steps: vec![
                PlanStep::DbQuery { sub_query: "x".into() },
                PlanStep::ComputeStats { on_step: 0, ops: vec![StatOp::Count] },
            ],
        };
        assert!(plan.validate_references().is_ok());
    }
}
