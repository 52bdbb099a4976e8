use shipgate_rollout::{RolloutBlockController, WriteOutcome};

pub fn check(ctx: &super::Context, namespace: &str, name: &str, format: &str) -> anyhow::Result<()> {
    let controller = RolloutBlockController::new(ctx.store.clone(), ctx.config.controller.clone());
    let result = controller.reconcile_application(namespace, name)?;

    match format {
        "json" => {
            let output = serde_json::json!({
                "application": result.application.key(),
                "blocked": result.verdict.blocked,
                "message": result.verdict.message,
                "blocking": result.verdict.blocking,
                "overridden": result.verdict.overridden,
                "removed_overrides": result.removed_overrides,
                "write": result.write,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            let label = if result.verdict.blocked { "BLOCKED" } else { "CLEAR" };
            println!("{} {}", label, result.application.key());
            if !result.verdict.message.is_empty() {
                println!("  {}", result.verdict.message);
            }
            for removed in &result.removed_overrides {
                println!("  removed invalid override: {removed}");
            }
            if result.write == WriteOutcome::Abandoned {
                println!("  warning: application update conflicted; will retry next pass");
            }
        }
    }

    Ok(())
}

pub fn events(ctx: &super::Context, namespace: &str, name: &str, limit: usize) -> anyhow::Result<()> {
    let events = ctx.store.list_events(&format!("{namespace}/{name}"), limit)?;
    if events.is_empty() {
        println!("No events.");
        return Ok(());
    }
    for event in &events {
        println!(
            "{:<12} {:<8} {:<24} {}",
            event.timestamp,
            format!("{:?}", event.event_type),
            event.reason,
            event.message
        );
    }
    Ok(())
}
