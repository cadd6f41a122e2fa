// SPDX-License-Identifier: MPL-2.0

mod app;
mod cache;
mod config;
mod runtime;
mod state;
mod supabase;
mod ui;

use gtk4::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> gtk4::glib::ExitCode {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,parley=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let app = app::ParleyApplication::new();
    app.run()
}
