// SPDX-License-Identifier: MPL-2.0

mod dashboard;
mod friends;
mod session;
pub mod settings;
pub mod validation;

pub use dashboard::{Dashboard, Selection};
pub use friends::FriendList;
pub use session::{SessionError, SessionManager};
pub use settings::{AppSettings, BackendSettings};
pub use validation::ValidationError;
