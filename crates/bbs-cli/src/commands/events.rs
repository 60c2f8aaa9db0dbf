use anyhow::bail;
use bbs_client::EventSource;
use clap::ValueEnum;
use tracing::info;

use super::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventKind {
    /// Actual LRP group events.
    Lrp,
    /// Actual LRP instance events.
    Instance,
    Task,
}

/// Which stream a subscription opens.
#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Lrp,
    LrpByCell(&'a str),
    Instance(&'a str),
    Task,
}

/// Task events carry no cell, so a cell filter on them is an error.
fn route(kind: EventKind, cell_id: Option<&str>) -> anyhow::Result<Route<'_>> {
    Ok(match (kind, cell_id) {
        (EventKind::Lrp, Some(cell_id)) => Route::LrpByCell(cell_id),
        (EventKind::Lrp, None) => Route::Lrp,
        (EventKind::Instance, cell_id) => Route::Instance(cell_id.unwrap_or_default()),
        (EventKind::Task, Some(_)) => bail!("--cell-id cannot be used with --kind task"),
        (EventKind::Task, None) => Route::Task,
    })
}

pub async fn stream(target: &Target, kind: EventKind, cell_id: Option<&str>) -> anyhow::Result<()> {
    let route = route(kind, cell_id)?;
    let client = target.client()?;
    let mut source: EventSource = match route {
        Route::Lrp => client.subscribe_to_events().await?,
        Route::LrpByCell(cell_id) => client.subscribe_to_events_by_cell_id(cell_id).await?,
        Route::Instance(cell_id) => client.subscribe_to_instance_events(cell_id).await?,
        Route::Task => client.subscribe_to_task_events().await?,
    };

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            next = source.next() => match next? {
                Some(event) => println!("{}", serde_json::to_string(&event)?),
                None => break,
            },
            _ = &mut shutdown => break,
        }
    }
    source.close();
    info!("event stream closed");
    Ok(())
}
