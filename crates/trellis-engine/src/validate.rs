//! Load-time validation of workflow definitions.
//!
//! Everything that can fail fast does: node references resolve against the
//! registry, expressions parse, step names are unique within their list.
//! A workflow that passes validation cannot hit an unknown node key at
//! run time.

use std::collections::HashSet;

use crate::expression;
use crate::registry::NodeRegistry;
use crate::workflow::{ConditionBranch, Element, InputBinding, StepDef, WorkflowDef};

/// Validate a workflow definition for structural correctness.
///
/// Returns `Ok(())` or a list of human-readable validation errors.
pub fn validate_workflow(def: &WorkflowDef, registry: &NodeRegistry) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if def.name.is_empty() {
        errors.push("workflow name must not be empty".to_string());
    }
    if def.triggers.is_empty() {
        errors.push(format!("workflow '{}' declares no triggers", def.name));
    }
    for trigger in &def.triggers {
        if !trigger.path.starts_with('/') {
            errors.push(format!(
                "trigger path must start with '/': {}",
                trigger.path
            ));
        }
    }

    let top_steps: Vec<&StepDef> = def
        .elements
        .iter()
        .filter_map(|e| match e {
            Element::Step(step) => Some(step),
            Element::Branch(_) => None,
        })
        .collect();
    check_step_list(&top_steps, registry, &mut errors);

    for element in &def.elements {
        if let Element::Branch(branch) = element {
            check_branch(branch, registry, &mut errors);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_branch(branch: &ConditionBranch, registry: &NodeRegistry, errors: &mut Vec<String>) {
    if branch.branches.is_empty() {
        errors.push("condition branch has no guarded alternatives".to_string());
    }
    for guarded in &branch.branches {
        let expr = guarded.expression();
        if expr.is_empty() {
            errors.push("guard expression must not be empty".to_string());
        } else if let Err(e) = expression::check(expr) {
            errors.push(format!("invalid guard expression '{expr}': {e}"));
        }
        check_step_list(&guarded.steps.iter().collect::<Vec<_>>(), registry, errors);
    }
    if let Some(otherwise) = &branch.otherwise {
        check_step_list(&otherwise.iter().collect::<Vec<_>>(), registry, errors);
    }
}

/// Validate one step list: node keys resolve, names are unique within the
/// list, expression inputs parse. The same step name in two alternative
/// branches is fine — only one of them runs.
fn check_step_list(steps: &[&StepDef], registry: &NodeRegistry, errors: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for step in steps {
        if step.name.is_empty() {
            errors.push("step name must not be empty".to_string());
        } else if !seen.insert(step.name.as_str()) {
            errors.push(format!("duplicate step name: {}", step.name));
        }
        if !registry.contains(&step.node) {
            errors.push(format!(
                "step '{}' references unknown node: {}",
                step.name, step.node
            ));
        }
        for (input, binding) in &step.inputs {
            if let InputBinding::Expr(source) = binding {
                if let Err(e) = expression::check(source) {
                    errors.push(format!(
                        "step '{}' input '{}' has an invalid expression: {e}",
                        step.name, input
                    ));
                }
            }
        }
    }
}
