use bbs_client::ActualLrpGroupFilter;
use bbs_models::ActualLrpGroup;
use clap::ValueEnum;

use super::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

pub async fn list(
    target: &Target,
    domain: Option<String>,
    cell_id: Option<String>,
    process_guid: Option<&str>,
    format: Format,
) -> anyhow::Result<()> {
    let client = target.client()?;
    let groups = match process_guid {
        Some(guid) => client.actual_lrp_groups_by_process_guid(guid).await?,
        None => {
            let filter = ActualLrpGroupFilter {
                domain: domain.unwrap_or_default(),
                cell_id: cell_id.unwrap_or_default(),
            };
            client.actual_lrp_groups(&filter).await?
        }
    };

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&groups)?),
        Format::Text => {
            for group in &groups {
                println!("{}", format_group(group));
            }
        }
    }
    Ok(())
}

fn format_group(group: &ActualLrpGroup) -> String {
    let Some(lrp) = group.resolve() else {
        return "<empty>".to_string();
    };
    let mut line = format!(
        "{:<40} {:>4} {:<10} {:<20} {}",
        lrp.key.process_guid,
        lrp.key.index,
        lrp.state.as_str(),
        lrp.instance_key.cell_id,
        lrp.net_info.address,
    );
    if group.evacuating.is_some() && group.instance.is_some() {
        line.push_str(" (evacuating)");
    }
    line
}
