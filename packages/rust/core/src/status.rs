//! Stopped/active classification from the status sheet.

use toolscope_shared::{StatusRow, ToolStatus, contract};

/// Classify a tool from its status sheet row.
///
/// A tool is `Stopped` only when the sheet says it is completed, at the
/// report-sent stage, ticked as sent, and both end-user surveys carry a close
/// date. Values are compared verbatim. No row means `Active`.
pub fn classify(row: Option<&StatusRow>) -> ToolStatus {
    let Some(row) = row else {
        return ToolStatus::Active;
    };

    let stopped = row.status == contract::STATUS_COMPLETED
        && row.current_step == contract::STEP_REPORT_SENT
        && row.report_sent == contract::REPORT_SENT_MARK
        && !row.direct_closed_at.is_empty()
        && !row.indirect_closed_at.is_empty();

    if stopped {
        ToolStatus::Stopped
    } else {
        ToolStatus::Active
    }
}
