use crate::catalog::{CheckContext, SanityCheck};
use crate::checks::graph;
use crate::domain::ResultRecord;
use crate::error::Result;

/// Every location must have at least one outgoing edge.
///
/// The first dead end reachable from its template's initial location comes
/// with a trace leading to it.
#[derive(Debug, Default)]
pub struct DeadlockLocations;

impl SanityCheck for DeadlockLocations {
    fn name(&self) -> &'static str {
        "Deadlock locations"
    }

    fn short_name(&self) -> &'static str {
        "deadlock-locations"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<ResultRecord> {
        let mut dead_ends = Vec::new();
        let mut trace = None;

        for template in &ctx.document.templates {
            ctx.cancel.check()?;
            for location in &template.locations {
                if template.outgoing(location).next().is_some() {
                    continue;
                }
                dead_ends.push(format!("{}.{}", template.name, location));
                if trace.is_none() && ctx.checker.produces_traces() {
                    trace = graph::path_to(template, location, ctx.cancel)?
                        .map(|path| graph::to_trace(template, path));
                }
            }
        }

        if dead_ends.is_empty() {
            return Ok(ResultRecord::satisfied(
                self.short_name(),
                "No deadlock locations",
            ));
        }

        let record = ResultRecord::violated(
            self.short_name(),
            format!("Deadlock locations found: {}", dead_ends.join(", ")),
        );

        Ok(match trace {
            Some(trace) => ctx.attach_trace(record, trace),
            None => record,
        })
    }
}
