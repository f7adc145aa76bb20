mod body;
mod dashboard;
mod helpers;
mod log;
mod settings;
mod transfer;
mod weeks;

pub(crate) use body::{cmd_body_delete, cmd_body_history, cmd_body_log};
pub(crate) use dashboard::cmd_dashboard;
pub(crate) use log::{cmd_delete, cmd_log};
pub(crate) use settings::{SetupArgs, cmd_settings, cmd_setup};
pub(crate) use transfer::{cmd_export, cmd_import, cmd_import_csv, cmd_reset};
pub(crate) use weeks::{cmd_trend, cmd_weeks};
