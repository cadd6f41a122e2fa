// SPDX-License-Identifier: MPL-2.0

mod admin_panel;
mod avatar_cache;
mod channel_sidebar;
mod chat_view;
mod friends_panel;
mod login_dialog;
mod message_row;
mod name_dialog;
mod server_bar;
mod server_settings_dialog;
mod user_settings_dialog;
mod window;

pub use admin_panel::AdminPanel;
pub use login_dialog::LoginDialog;
pub use name_dialog::NameDialog;
pub use server_settings_dialog::ServerSettingsDialog;
pub use user_settings_dialog::UserSettingsDialog;
pub use window::{Page, ParleyWindow};
