// SPDX-License-Identifier: MPL-2.0
#![allow(clippy::type_complexity)]

use crate::state::validation::initials;
use crate::supabase::Server;
use crate::ui::avatar_cache;
use gtk4::glib;
use gtk4::prelude::*;
use gtk4::subclass::prelude::*;
use libadwaita as adw;

mod imp {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    pub struct ServerBar {
        pub friends_btn: RefCell<Option<gtk4::ToggleButton>>,
        pub server_list: RefCell<Option<gtk4::ListBox>>,
        pub server_ids: RefCell<Vec<String>>,
        pub admin_btn: RefCell<Option<gtk4::Button>>,
        pub avatar: RefCell<Option<adw::Avatar>>,
        pub account_btn: RefCell<Option<gtk4::Button>>,
        pub add_btn: RefCell<Option<gtk4::Button>>,
        /// Set while the selection is changed programmatically
        pub syncing: Cell<bool>,
        pub server_selected_callback: RefCell<Option<Box<dyn Fn(String) + 'static>>>,
        pub friends_callback: RefCell<Option<Box<dyn Fn() + 'static>>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for ServerBar {
        const NAME: &'static str = "ParleyServerBar";
        type Type = super::ServerBar;
        type ParentType = gtk4::Box;
    }

    impl ObjectImpl for ServerBar {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();
            obj.setup_ui();
        }
    }

    impl WidgetImpl for ServerBar {}
    impl BoxImpl for ServerBar {}
}

glib::wrapper! {
    pub struct ServerBar(ObjectSubclass<imp::ServerBar>)
        @extends gtk4::Box, gtk4::Widget,
        @implements gtk4::Accessible, gtk4::Buildable, gtk4::ConstraintTarget, gtk4::Orientable;
}

impl ServerBar {
    pub fn new() -> Self {
        glib::Object::builder()
            .property("orientation", gtk4::Orientation::Vertical)
            .property("spacing", 0)
            .build()
    }

    fn setup_ui(&self) {
        self.set_width_request(72);
        self.add_css_class("server-bar");

        let friends_btn = gtk4::ToggleButton::new();
        friends_btn.set_icon_name("system-users-symbolic");
        friends_btn.set_tooltip_text(Some("Friends"));
        friends_btn.add_css_class("circular");
        friends_btn.add_css_class("server-bar-button");
        friends_btn.set_halign(gtk4::Align::Center);
        friends_btn.set_margin_top(12);
        friends_btn.set_margin_bottom(8);
        friends_btn.connect_clicked(glib::clone!(
            #[weak(rename_to = bar)]
            self,
            move |btn| {
                if bar.imp().syncing.get() {
                    return;
                }
                // Stays pressed until another view is picked
                btn.set_active(true);
                if let Some(cb) = bar.imp().friends_callback.borrow().as_ref() {
                    cb();
                }
            }
        ));
        self.append(&friends_btn);

        let separator = gtk4::Separator::new(gtk4::Orientation::Horizontal);
        separator.set_margin_start(20);
        separator.set_margin_end(20);
        self.append(&separator);

        let server_list = gtk4::ListBox::new();
        server_list.set_selection_mode(gtk4::SelectionMode::Single);
        server_list.add_css_class("server-list");
        server_list.connect_row_selected(glib::clone!(
            #[weak(rename_to = bar)]
            self,
            move |_, row| {
                let imp = bar.imp();
                if imp.syncing.get() {
                    return;
                }
                let Some(row) = row else {
                    return;
                };
                let id = imp.server_ids.borrow().get(row.index() as usize).cloned();
                if let Some(id) = id {
                    bar.set_friends_active(false);
                    if let Some(cb) = imp.server_selected_callback.borrow().as_ref() {
                        cb(id);
                    }
                }
            }
        ));

        let scrolled = gtk4::ScrolledWindow::new();
        scrolled.set_vexpand(true);
        scrolled.set_policy(gtk4::PolicyType::Never, gtk4::PolicyType::Automatic);
        scrolled.set_child(Some(&server_list));
        self.append(&scrolled);

        let add_btn = gtk4::Button::from_icon_name("list-add-symbolic");
        add_btn.set_tooltip_text(Some("Create a Server"));
        add_btn.add_css_class("circular");
        add_btn.add_css_class("server-bar-button");
        add_btn.add_css_class("add-server");
        add_btn.set_halign(gtk4::Align::Center);
        add_btn.set_margin_top(8);
        self.append(&add_btn);

        let admin_btn = gtk4::Button::from_icon_name("security-high-symbolic");
        admin_btn.set_tooltip_text(Some("Admin Panel"));
        admin_btn.add_css_class("circular");
        admin_btn.add_css_class("server-bar-button");
        admin_btn.set_halign(gtk4::Align::Center);
        admin_btn.set_margin_top(8);
        admin_btn.set_visible(false);
        self.append(&admin_btn);

        let account_btn = gtk4::Button::new();
        account_btn.add_css_class("flat");
        account_btn.add_css_class("circular");
        account_btn.set_tooltip_text(Some("User Settings"));
        account_btn.set_halign(gtk4::Align::Center);
        account_btn.set_margin_top(8);
        account_btn.set_margin_bottom(12);
        let avatar = adw::Avatar::new(40, None, true);
        account_btn.set_child(Some(&avatar));
        self.append(&account_btn);

        let imp = self.imp();
        imp.friends_btn.replace(Some(friends_btn));
        imp.server_list.replace(Some(server_list));
        imp.add_btn.replace(Some(add_btn));
        imp.admin_btn.replace(Some(admin_btn));
        imp.account_btn.replace(Some(account_btn));
        imp.avatar.replace(Some(avatar));
    }

    fn create_server_row(server: &Server) -> gtk4::ListBoxRow {
        let row = gtk4::ListBoxRow::new();
        row.set_tooltip_text(Some(&server.name));

        let avatar = adw::Avatar::new(48, Some(&initials(&server.name)), true);
        avatar.set_halign(gtk4::Align::Center);
        avatar.set_margin_top(4);
        avatar.set_margin_bottom(4);
        if let Some(url) = server.icon_url.as_deref() {
            avatar_cache::load_avatar(&avatar, url);
        }

        row.set_child(Some(&avatar));
        row
    }

    /// Rebuild the server list, keeping `selected` highlighted
    pub fn set_servers(&self, servers: &[Server], selected: Option<&str>) {
        let imp = self.imp();
        let Some(list) = imp.server_list.borrow().clone() else {
            return;
        };

        imp.syncing.set(true);
        while let Some(row) = list.row_at_index(0) {
            list.remove(&row);
        }
        for server in servers {
            list.append(&Self::create_server_row(server));
        }
        imp.server_ids
            .replace(servers.iter().map(|s| s.id.clone()).collect());
        imp.syncing.set(false);

        self.select_server(selected);
    }

    /// Highlight a server without notifying
    pub fn select_server(&self, server_id: Option<&str>) {
        let imp = self.imp();
        let Some(list) = imp.server_list.borrow().clone() else {
            return;
        };

        let index = server_id.and_then(|id| imp.server_ids.borrow().iter().position(|s| s == id));

        imp.syncing.set(true);
        match index.and_then(|i| list.row_at_index(i as i32)) {
            Some(row) => list.select_row(Some(&row)),
            None => list.unselect_all(),
        }
        imp.syncing.set(false);
    }

    pub fn set_friends_active(&self, active: bool) {
        let imp = self.imp();
        imp.syncing.set(true);
        if let Some(btn) = imp.friends_btn.borrow().as_ref() {
            btn.set_active(active);
        }
        imp.syncing.set(false);
    }

    pub fn set_user(&self, display_name: &str, avatar_url: Option<&str>) {
        if let Some(avatar) = self.imp().avatar.borrow().as_ref() {
            avatar.set_text(Some(&initials(display_name)));
            if let Some(url) = avatar_url {
                avatar_cache::load_avatar(avatar, url);
            }
        }
        if let Some(btn) = self.imp().account_btn.borrow().as_ref() {
            btn.set_tooltip_text(Some(display_name));
        }
    }

    pub fn set_admin_visible(&self, visible: bool) {
        if let Some(btn) = self.imp().admin_btn.borrow().as_ref() {
            btn.set_visible(visible);
        }
    }

    pub fn connect_server_selected<F: Fn(String) + 'static>(&self, callback: F) {
        self.imp()
            .server_selected_callback
            .replace(Some(Box::new(callback)));
    }

    pub fn connect_friends_clicked<F: Fn() + 'static>(&self, callback: F) {
        self.imp()
            .friends_callback
            .replace(Some(Box::new(callback)));
    }

    pub fn connect_add_server_clicked<F: Fn() + 'static>(&self, callback: F) {
        if let Some(btn) = self.imp().add_btn.borrow().as_ref() {
            btn.connect_clicked(move |_| callback());
        }
    }

    pub fn connect_admin_clicked<F: Fn() + 'static>(&self, callback: F) {
        if let Some(btn) = self.imp().admin_btn.borrow().as_ref() {
            btn.connect_clicked(move |_| callback());
        }
    }

    pub fn connect_account_clicked<F: Fn() + 'static>(&self, callback: F) {
        if let Some(btn) = self.imp().account_btn.borrow().as_ref() {
            btn.connect_clicked(move |_| callback());
        }
    }
}

impl Default for ServerBar {
    fn default() -> Self {
        Self::new()
    }
}
