use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::plan::TestElement;

use super::context::RunEnv;

/// Starts every enabled thread group under the plan root as an independent
/// worker driver and waits for all of them to finish. Non-thread-group
/// children at the root are ignored.
pub async fn run_plan(cancel: &CancellationToken, plan: &dyn TestElement, env: &RunEnv) {
    let mut groups = JoinSet::new();

    for child in plan.children() {
        if !child.enabled() || child.as_thread_group().is_none() {
            continue;
        }

        let child = Arc::clone(child);
        let cancel = cancel.clone();
        let env = env.clone();
        groups.spawn(async move {
            if let Some(group) = child.as_thread_group() {
                group.start(cancel, env).await;
            }
        });
    }

    while groups.join_next().await.is_some() {}
}
