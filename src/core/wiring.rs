use crate::domain::ports::{provider_of, Component};
use crate::utils::error::{Ambiguity, Result, Unresolved, WiringError};
use std::collections::HashMap;
use std::sync::Arc;

/// Application-wide name-matching pass over an arbitrary set of top-level
/// components. For every still-unbound need: zero provide matches leave it
/// unbound (recorded as unresolved when `strict`); exactly one match binds
/// it; two or more are ambiguous. A component's own provides are never
/// candidates for its own needs.
///
/// The pass always runs to completion so one report lists every ambiguity
/// and every unresolved need it found.
pub fn auto_wire(components: &[Arc<dyn Component>], strict: bool) -> Result<()> {
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, component) in components.iter().enumerate() {
        for port in component.get_provides() {
            index.entry(port.name).or_default().push(i);
        }
    }

    let mut report = WiringError::default();
    for (ci, component) in components.iter().enumerate() {
        for need in component.get_needs() {
            if component.is_bound(&need.name)? {
                continue;
            }

            let candidates: Vec<usize> = index
                .get(&need.name)
                .map(|owners| owners.iter().copied().filter(|o| *o != ci).collect())
                .unwrap_or_default();

            match candidates.as_slice() {
                [] => {
                    if strict {
                        report.unresolved.push(Unresolved {
                            port: need.name.clone(),
                            component: component.name().to_string(),
                        });
                    } else {
                        tracing::debug!(
                            port = %need.name,
                            consumer = %component.name(),
                            "need left unbound; will raise DisconnectedPort if called"
                        );
                    }
                }
                [provider] => {
                    let func = provider_of(Arc::clone(&components[*provider]), &need.name)?;
                    component.connect_port(&need.name, func)?;
                    tracing::debug!(
                        port = %need.name,
                        consumer = %component.name(),
                        provider = %components[*provider].name(),
                        "port auto-wired"
                    );
                }
                many => {
                    report.ambiguities.push(Ambiguity {
                        port: need.name.clone(),
                        consumer: component.name().to_string(),
                        candidates: many
                            .iter()
                            .map(|o| components[*o].name().to_string())
                            .collect(),
                    });
                }
            }
        }
    }

    if report.is_empty() {
        Ok(())
    } else {
        tracing::error!(
            ambiguities = report.ambiguities.len(),
            unresolved = report.unresolved.len(),
            "auto-wiring failed"
        );
        Err(report.into())
    }
}
