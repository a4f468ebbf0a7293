use crate::ast::{Branch, Instruction, NodeId};
use crate::error::QWebError;
use crate::executor::Executor;
use crate::output::OutputSink;
use qweb_expr::VariableScope;

impl Executor<'_> {
    /// Runs the first branch whose condition holds, or the `t-else` body.
    pub(crate) fn handle_if(
        &mut self,
        branches: &[Branch],
        otherwise: Option<&[Instruction]>,
        sink: &mut dyn OutputSink,
    ) -> Result<(), QWebError> {
        for branch in branches {
            let holds = self.at(branch.node, |this| {
                Ok(this.eval(&branch.condition)?.is_truthy())
            })?;
            if holds {
                return self.execute(&branch.body, sink);
            }
        }
        match otherwise {
            Some(body) => self.execute(body, sink),
            None => Ok(()),
        }
    }

    pub(crate) fn handle_groups(
        &mut self,
        groups: &str,
        body: &[Instruction],
        sink: &mut dyn OutputSink,
    ) -> Result<(), QWebError> {
        if self.env.permissions().user_has_groups(groups) {
            self.execute(body, sink)
        } else {
            log::trace!("skipped block restricted to groups '{}'", groups);
            Ok(())
        }
    }

    pub(crate) fn handle_debug(&self, node: NodeId) {
        let path = self
            .template
            .node(node)
            .map(|info| info.path.as_str())
            .unwrap_or_default();
        log::debug!(
            "t-debug in '{}' at {}: visible names {:?}",
            self.template.reference,
            path,
            self.scope.names()
        );
    }
}
