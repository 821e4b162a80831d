use crate::catalog::{CheckContext, ParameterSpec, SanityCheck};
use crate::checks::graph;
use crate::domain::{ResultRecord, SyncKind};
use crate::error::{Result, SanityError};

const CHANNEL: &str = "channel";
const TEMPLATE: &str = "template";

/// Every send on a channel must have an edge able to receive it.
///
/// When `template` is given only receiving edges in that template count.
#[derive(Debug, Default)]
pub struct ReceiveSyncs;

impl SanityCheck for ReceiveSyncs {
    fn name(&self) -> &'static str {
        "Receive syncs"
    }

    fn short_name(&self) -> &'static str {
        "receivesyncs"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::checker(),
            ParameterSpec::text(CHANNEL, "Channel", true),
            ParameterSpec::text(TEMPLATE, "Receiving template", false),
        ]
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<ResultRecord> {
        let channel = ctx.request.require_str(CHANNEL)?;
        let receiver = ctx.request.param_str(TEMPLATE).filter(|t| !t.is_empty());

        if let Some(name) = receiver {
            if ctx.document.template(name).is_none() {
                return Err(SanityError::CheckExecution {
                    check: self.short_name().to_string(),
                    reason: format!("unknown template '{name}'"),
                });
            }
        }

        let received = ctx
            .document
            .templates
            .iter()
            .filter(|t| receiver.map_or(true, |name| t.name == name))
            .flat_map(|t| t.edges.iter())
            .any(|e| e.syncs_on(channel, SyncKind::Receive));

        if received {
            return Ok(ResultRecord::satisfied(
                self.short_name(),
                format!("All sends on '{channel}' can be received"),
            ));
        }

        let sender = ctx.document.templates.iter().find_map(|t| {
            t.edges
                .iter()
                .find(|e| e.syncs_on(channel, SyncKind::Send))
                .map(|e| (t, e))
        });

        let Some((template, send)) = sender else {
            return Ok(ResultRecord::satisfied(
                self.short_name(),
                format!("Channel '{channel}' is never sent on"),
            ));
        };

        let scope = receiver
            .map(|name| format!(" in template {name}"))
            .unwrap_or_default();
        let message = format!(
            "Send on '{channel}' at {}.{} -> {}.{} has no receiving edge{scope}",
            template.name, send.source, template.name, send.target
        );
        let record = ResultRecord::violated(self.short_name(), message);
        if !ctx.checker.produces_traces() {
            return Ok(record);
        }

        let Some(mut path) = graph::path_to(template, &send.source, ctx.cancel)? else {
            return Ok(record);
        };
        path.push(send);

        Ok(ctx.attach_trace(record, graph::to_trace(template, path)))
    }
}
