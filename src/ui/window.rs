// SPDX-License-Identifier: MPL-2.0
#![allow(clippy::type_complexity)]

use super::channel_sidebar::ChannelSidebar;
use super::chat_view::ChatView;
use super::friends_panel::FriendsPanel;
use super::server_bar::ServerBar;
use crate::config::{APP_NAME, ENV_ANON_KEY, ENV_BACKEND_URL, IS_DEVEL};
use gtk4::prelude::*;
use gtk4::subclass::prelude::*;
use gtk4::{gio, glib};
use libadwaita as adw;
use libadwaita::prelude::AdwApplicationWindowExt;
use libadwaita::subclass::prelude::*;
use std::cell::RefCell;

/// Top-level pages of the main stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Home,
    Friends,
    Server,
    Unconfigured,
}

impl Page {
    fn name(self) -> &'static str {
        match self {
            Page::Home => "home",
            Page::Friends => "friends",
            Page::Server => "server",
            Page::Unconfigured => "unconfigured",
        }
    }
}

mod imp {
    use super::*;

    #[derive(Default)]
    pub struct ParleyWindow {
        pub server_bar: RefCell<Option<ServerBar>>,
        pub channel_sidebar: RefCell<Option<ChannelSidebar>>,
        pub chat_view: RefCell<Option<ChatView>>,
        pub friends_panel: RefCell<Option<FriendsPanel>>,
        pub main_stack: RefCell<Option<gtk4::Stack>>,
        pub unconfigured_page: RefCell<Option<adw::StatusPage>>,
        pub refresh_callback: RefCell<Option<Box<dyn Fn() + 'static>>>,
        pub toast_overlay: RefCell<Option<adw::ToastOverlay>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for ParleyWindow {
        const NAME: &'static str = "ParleyWindow";
        type Type = super::ParleyWindow;
        type ParentType = adw::ApplicationWindow;
    }

    impl ObjectImpl for ParleyWindow {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();
            obj.setup_ui();
        }
    }

    impl WidgetImpl for ParleyWindow {}
    impl WindowImpl for ParleyWindow {}
    impl ApplicationWindowImpl for ParleyWindow {}
    impl AdwApplicationWindowImpl for ParleyWindow {}
}

glib::wrapper! {
    pub struct ParleyWindow(ObjectSubclass<imp::ParleyWindow>)
        @extends adw::ApplicationWindow, gtk4::ApplicationWindow, gtk4::Window, gtk4::Widget,
        @implements gio::ActionGroup, gio::ActionMap;
}

impl ParleyWindow {
    pub fn new(app: &adw::Application) -> Self {
        glib::Object::builder()
            .property("application", app)
            .property("default-width", 1100)
            .property("default-height", 720)
            .property("title", APP_NAME)
            .build()
    }

    fn setup_ui(&self) {
        if IS_DEVEL {
            self.add_css_class("devel");
        }

        let main_box = gtk4::Box::new(gtk4::Orientation::Horizontal, 0);

        let server_bar = ServerBar::new();
        main_box.append(&server_bar);
        main_box.append(&gtk4::Separator::new(gtk4::Orientation::Vertical));

        // No animation when switching between servers
        let main_stack = gtk4::Stack::new();
        main_stack.set_hexpand(true);
        main_stack.set_vexpand(true);
        main_stack.set_transition_type(gtk4::StackTransitionType::None);

        let home_page = status_page(
            "user-available-symbolic",
            &format!("Welcome to {APP_NAME}"),
            "Pick a server on the left, or open Friends to find people.",
        );
        main_stack.add_named(&home_page, Some(Page::Home.name()));

        let friends_panel = FriendsPanel::new();
        main_stack.add_named(&friends_panel, Some(Page::Friends.name()));

        let server_page = gtk4::Box::new(gtk4::Orientation::Horizontal, 0);
        let channel_sidebar = ChannelSidebar::new();
        server_page.append(&channel_sidebar);
        server_page.append(&gtk4::Separator::new(gtk4::Orientation::Vertical));
        let chat_view = ChatView::new();
        server_page.append(&chat_view);
        main_stack.add_named(&server_page, Some(Page::Server.name()));

        let unconfigured = adw::StatusPage::new();
        unconfigured.set_icon_name(Some("network-offline-symbolic"));
        unconfigured.set_title("Backend Not Configured");
        let unconfigured_box = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
        unconfigured_box.append(&adw::HeaderBar::new());
        unconfigured.set_vexpand(true);
        unconfigured_box.append(&unconfigured);
        main_stack.add_named(&unconfigured_box, Some(Page::Unconfigured.name()));

        main_box.append(&main_stack);

        let toast_overlay = adw::ToastOverlay::new();
        toast_overlay.set_child(Some(&main_box));
        self.set_content(Some(&toast_overlay));

        let imp = self.imp();
        imp.toast_overlay.replace(Some(toast_overlay));
        imp.server_bar.replace(Some(server_bar));
        imp.channel_sidebar.replace(Some(channel_sidebar));
        imp.chat_view.replace(Some(chat_view));
        imp.friends_panel.replace(Some(friends_panel));
        imp.main_stack.replace(Some(main_stack));
        imp.unconfigured_page.replace(Some(unconfigured));

        self.setup_shortcuts();
    }

    fn setup_shortcuts(&self) {
        let controller = gtk4::ShortcutController::new();
        controller.set_scope(gtk4::ShortcutScope::Managed);

        let refresh_action = gtk4::CallbackAction::new(glib::clone!(
            #[weak(rename_to = window)]
            self,
            #[upgrade_or]
            glib::Propagation::Proceed,
            move |_, _| {
                if let Some(cb) = window.imp().refresh_callback.borrow().as_ref() {
                    cb();
                }
                glib::Propagation::Stop
            }
        ));
        controller.add_shortcut(gtk4::Shortcut::new(
            gtk4::ShortcutTrigger::parse_string("F5"),
            Some(refresh_action.clone()),
        ));
        controller.add_shortcut(gtk4::Shortcut::new(
            gtk4::ShortcutTrigger::parse_string("<Control>r"),
            Some(refresh_action),
        ));

        self.add_controller(controller);
    }

    pub fn show_page(&self, page: Page) {
        let imp = self.imp();
        if let Some(stack) = imp.main_stack.borrow().as_ref() {
            stack.set_visible_child_name(page.name());
        }
        if let Some(bar) = imp.server_bar.borrow().as_ref() {
            bar.set_sensitive(page != Page::Unconfigured);
            bar.set_friends_active(page == Page::Friends);
        }
    }

    /// Explain where the backend url and key are read from
    pub fn show_unconfigured(&self, reason: &str, settings_path: Option<&str>) {
        if let Some(page) = self.imp().unconfigured_page.borrow().as_ref() {
            let mut description = format!(
                "{reason}.\n\nSet {ENV_BACKEND_URL} and {ENV_ANON_KEY} in the environment"
            );
            match settings_path {
                Some(path) => {
                    description.push_str(&format!(", or add a \"backend\" section to {path}."))
                }
                None => description.push('.'),
            }
            page.set_description(Some(&glib::markup_escape_text(&description)));
        }
        self.show_page(Page::Unconfigured);
    }

    pub fn server_bar(&self) -> Option<ServerBar> {
        self.imp().server_bar.borrow().clone()
    }

    pub fn channel_sidebar(&self) -> Option<ChannelSidebar> {
        self.imp().channel_sidebar.borrow().clone()
    }

    pub fn chat_view(&self) -> Option<ChatView> {
        self.imp().chat_view.borrow().clone()
    }

    pub fn friends_panel(&self) -> Option<FriendsPanel> {
        self.imp().friends_panel.borrow().clone()
    }

    pub fn set_refresh_callback<F: Fn() + 'static>(&self, callback: F) {
        self.imp()
            .refresh_callback
            .replace(Some(Box::new(callback)));
    }

    pub fn show_toast(&self, message: &str) {
        if let Some(overlay) = self.imp().toast_overlay.borrow().as_ref() {
            let toast = adw::Toast::new(message);
            toast.set_use_markup(false);
            toast.set_timeout(3);
            overlay.add_toast(toast);
        }
    }
}

fn status_page(icon: &str, title: &str, description: &str) -> gtk4::Box {
    let page = adw::StatusPage::new();
    page.set_icon_name(Some(icon));
    page.set_title(title);
    page.set_description(Some(description));
    page.set_vexpand(true);

    let container = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    container.append(&adw::HeaderBar::new());
    container.append(&page);
    container
}
