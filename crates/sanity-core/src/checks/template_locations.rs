use crate::catalog::{CheckContext, SanityCheck};
use crate::checks::graph;
use crate::domain::ResultRecord;
use crate::error::Result;

/// Every location of every template must be reachable from its initial location.
#[derive(Debug, Default)]
pub struct TemplateLocations;

impl SanityCheck for TemplateLocations {
    fn name(&self) -> &'static str {
        "Template location reachability"
    }

    fn short_name(&self) -> &'static str {
        "template-locations"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<ResultRecord> {
        let mut unreachable = Vec::new();

        for template in &ctx.document.templates {
            let seen = graph::reachable(template, ctx.cancel)?;
            unreachable.extend(
                template
                    .locations
                    .iter()
                    .filter(|loc| !seen.contains(loc.as_str()))
                    .map(|loc| format!("{}.{}", template.name, loc)),
            );
        }

        if unreachable.is_empty() {
            Ok(ResultRecord::satisfied(self.short_name(), "All locations reachable"))
        } else {
            Ok(ResultRecord::violated(
                self.short_name(),
                format!("Unreachable locations found: {}", unreachable.join(", ")),
            ))
        }
    }
}
