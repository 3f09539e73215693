use crate::crds::ConsoleApplication;
use crate::tasks::types::{AppKey, Context, Error, Result};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Controller entry point: run one pass for the triggering application
#[instrument(skip(app, ctx), fields(application = %app.name_any()))]
pub(crate) async fn reconcile_console_app(
    app: Arc<ConsoleApplication>,
    ctx: Arc<Context>,
) -> Result<Action> {
    let key = AppKey::from_resource(app.as_ref()).ok_or(Error::MissingObjectKey)?;
    info!(%key, "Reconciling ConsoleApplication");

    let outcome = ctx.reconciler.reconcile(&key).await?;
    Ok(outcome.into_action())
}

#[instrument(skip_all, fields(application = %app.name_any()))]
pub(crate) fn error_policy(app: Arc<ConsoleApplication>, err: &Error, ctx: Arc<Context>) -> Action {
    let action = ctx.reconciler.policy().on_error(err);
    error!(
        error = ?err,
        application = %app.name_any(),
        namespace = ?app.namespace(),
        action = ?action,
        watch_namespace = ctx.namespace.as_deref().unwrap_or("*"),
        "ConsoleApplication reconciliation failed, requeueing"
    );
    action
}
