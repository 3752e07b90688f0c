//! Mosaic demo — two users editing one living dashboard.
//!
//! Runs a scripted session against an in-process `MemoryStore`: Alice builds
//! a board and invites Bob, both edit it, and Alice undoes her last change.
//! `RUST_LOG=info` (or `debug`) shows the engine's log; `MOSAIC_CONFIG` may
//! point at a JSON file overriding the defaults.

mod state;

use log::info;
use std::error::Error;
use std::sync::Arc;

use mosaic_collab::{EditOutcome, MemoryStore};
use mosaic_core::{Breakpoint, EditOp, Role, WidgetKind};
use mosaic_layout::Effect;
use state::{DemoConfig, Participant};

fn add(kind: WidgetKind) -> EditOp {
    EditOp::AddWidget {
        kind,
        parent_id: None,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    info!("Starting Mosaic demo...");
    let config = DemoConfig::load()?;
    let store = Arc::new(MemoryStore::new(config.store.clone()));

    // Alice has no projects yet: she gets a default one.
    let mut alice = Participant::join(&store, "alice", &config).await?;
    alice.rename("Team Board").await?;

    let folder = match alice.edit(add(WidgetKind::Folder)).await? {
        EditOutcome::Applied {
            effect: Some(Effect::ScrollTo(id)),
            ..
        } => id,
        other => return Err(format!("folder was not created: {other:?}").into()),
    };
    for kind in [WidgetKind::Note, WidgetKind::Counter] {
        alice
            .edit(EditOp::AddWidget {
                kind,
                parent_id: Some(folder),
            })
            .await?;
    }
    alice.invite("bob", Role::Editor).await?;
    alice.edit(add(WidgetKind::Chart)).await?;

    // Bob was invited before joining, so he lands on the shared board.
    let mut bob = Participant::join(&store, "bob", &config).await?;
    bob.edit(add(WidgetKind::Checklist)).await?;
    bob.edit(EditOp::ToggleFolder { id: folder }).await?;

    println!("{}", alice.describe(Breakpoint::Lg).await?);

    // Undo takes the board back to before the chart, dropping Bob's later
    // edits with it: snapshots overwrite the whole document.
    alice.undo().await?;
    println!("{}", bob.describe(Breakpoint::Lg).await?);

    alice.log_events();
    bob.log_events();
    info!(
        "Done: {} documents, {} writes",
        store.document_count().await,
        store.write_count()
    );
    Ok(())
}
