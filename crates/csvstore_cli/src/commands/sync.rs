//! Change tracking commands.

use super::{print_value, CommandResult, Context, ObjectView};
use csvstore_core::{ChangeEvent, SyncHandler, SyncToken};
use serde::Serialize;

/// One printed change.
#[derive(Debug, Serialize)]
pub struct ChangeView {
    /// CREATE, UPDATE or DELETE.
    pub kind: String,
    /// Token of the new snapshot.
    pub token: String,
    /// The changed record.
    pub object: ObjectView,
}

/// Sync result.
#[derive(Debug, Default, Serialize)]
pub struct SyncOutput {
    /// Changes in delivery order.
    pub changes: Vec<ChangeView>,
    /// Token to pass to the next sync.
    pub token: String,
}

impl SyncHandler for SyncOutput {
    fn handle(&mut self, event: ChangeEvent) -> bool {
        self.changes.push(ChangeView {
            kind: event.kind.to_string(),
            token: event.token.to_string(),
            object: ObjectView::from(event.object),
        });
        true
    }

    fn handle_token(&mut self, token: SyncToken) {
        self.token = token.to_string();
    }
}

/// Runs the latest-token command.
pub fn latest_token(ctx: &Context<'_>) -> CommandResult {
    let token = ctx.connector.latest_sync_token(ctx.object_class)?;
    print_value(ctx, "token", &token.to_string())
}

/// Runs the sync command.
pub fn run(ctx: &Context<'_>, token: &str) -> CommandResult {
    let mut output = SyncOutput::default();
    let next = ctx.connector.sync(ctx.object_class, token, &mut output)?;
    output.token = next.to_string();

    if ctx.json() {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for change in &output.changes {
        print!("{:<6} ", change.kind);
        change.object.print_text();
    }
    if output.changes.is_empty() {
        println!("No changes");
    }
    println!("Next token: {}", output.token);
    Ok(())
}
