use chrono::Utc;
use desk_core::config::EngineConfig;

use crate::commands::common::{
    format_operation_lines, open_engine, operation_to_list_item, OperationListItem,
};
use crate::error::CliError;

pub async fn run_queue(as_json: bool, config: &EngineConfig) -> Result<(), CliError> {
    let session = open_engine(config, false, false).await?;
    let operations = session.engine.pending_operations().await?;

    if as_json {
        let items = operations
            .iter()
            .map(operation_to_list_item)
            .collect::<Vec<OperationListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if operations.is_empty() {
        println!("Sync queue is empty");
    } else {
        for line in format_operation_lines(&operations, Utc::now().timestamp_millis()) {
            println!("{line}");
        }
    }
    Ok(())
}
