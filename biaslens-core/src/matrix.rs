//! Prompt matrix generation.
//!
//! Expands one scenario into a `(group, name, prompt)` sequence. Iteration
//! order is part of the contract: groups in declared catalog order, then names
//! within each group in declared order. Metrics and downstream consumers rely
//! on it for stable group attribution across runs.

use crate::catalog::{Catalog, NAME_PLACEHOLDER, ScenarioTemplate, placeholders};
use crate::error::{AuditError, Result};
use crate::types::PromptInstance;

/// Generate the prompt matrix for `scenario_key`.
///
/// `groups` restricts the matrix to the given labels. Output order stays the
/// catalog's declared order regardless of the filter's order; an empty filter
/// selects every group. Every label is checked before anything is rendered.
pub fn generate(
    catalog: &Catalog,
    scenario_key: &str,
    groups: Option<&[String]>,
) -> Result<Vec<PromptInstance>> {
    let scenario = catalog
        .scenario(scenario_key)
        .ok_or_else(|| AuditError::UnknownScenario {
            scenario: scenario_key.to_string(),
            available: catalog.scenario_keys(),
        })?;

    let filter = match groups {
        Some(labels) if !labels.is_empty() => {
            if let Some(unknown) = labels.iter().find(|l| catalog.group(l).is_none()) {
                return Err(AuditError::UnknownGroup {
                    group: unknown.clone(),
                    available: catalog.group_labels(),
                });
            }
            Some(labels)
        }
        _ => None,
    };

    let selected = catalog
        .groups
        .iter()
        .filter(|g| filter.is_none_or(|labels| labels.contains(&g.label)));

    let mut prompts = Vec::with_capacity(catalog.groups.len() * catalog.names_per_group());
    for group in selected {
        for name in &group.names {
            prompts.push(PromptInstance {
                group: group.label.clone(),
                name: name.clone(),
                system_prompt: scenario.system_instruction.clone(),
                user_prompt: render_body(scenario, name)?,
            });
        }
    }

    Ok(prompts)
}

/// Substitute `name` into the scenario body.
///
/// Fails with [`AuditError::Template`] when the body has no `{name}` point or
/// when any placeholder survives substitution.
pub fn render_body(scenario: &ScenarioTemplate, name: &str) -> Result<String> {
    let template_error = |message: String| AuditError::Template {
        scenario: scenario.key.clone(),
        message,
    };

    if !scenario.body_template.contains(NAME_PLACEHOLDER) {
        return Err(template_error(format!(
            "body has no {NAME_PLACEHOLDER} substitution point"
        )));
    }

    // Placeholders present before substitution; anything other than {name}
    // would still be there afterwards.
    let unresolved: Vec<&str> = placeholders(&scenario.body_template)
        .into_iter()
        .filter(|p| *p != NAME_PLACEHOLDER)
        .collect();
    if !unresolved.is_empty() {
        return Err(template_error(format!(
            "unresolved placeholder(s) after substitution: {}",
            unresolved.join(", ")
        )));
    }

    Ok(scenario.body_template.replace(NAME_PLACEHOLDER, name))
}
