mod commands;
mod handlers;

pub use commands::{Cli, Commands};
pub use handlers::{
    handle_create, handle_delete, handle_get, handle_init, handle_join, handle_leave, handle_list,
    handle_log, handle_publish, handle_unpublish, handle_update,
};
