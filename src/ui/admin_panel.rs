// SPDX-License-Identifier: MPL-2.0
#![allow(clippy::type_complexity)]

//! Platform overview for owner accounts: totals, every user and every server.

use crate::state::validation::initials;
use crate::supabase::{AdminOverview, format_date};
use gtk4::glib;
use gtk4::prelude::*;
use gtk4::subclass::prelude::*;
use libadwaita as adw;
use libadwaita::prelude::*;
use std::rc::Rc;

mod imp {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    pub struct AdminPanel {
        pub users_stat: RefCell<Option<gtk4::Label>>,
        pub servers_stat: RefCell<Option<gtk4::Label>>,
        pub messages_stat: RefCell<Option<gtk4::Label>>,
        pub users_list: RefCell<Option<gtk4::ListBox>>,
        pub servers_list: RefCell<Option<gtk4::ListBox>>,
        pub spinner: RefCell<Option<gtk4::Spinner>>,
        pub refresh_callback: RefCell<Option<Box<dyn Fn() + 'static>>>,
        pub delete_user_callback: RefCell<Option<Rc<dyn Fn(String) + 'static>>>,
        pub delete_server_callback: RefCell<Option<Rc<dyn Fn(String) + 'static>>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for AdminPanel {
        const NAME: &'static str = "ParleyAdminPanel";
        type Type = super::AdminPanel;
        type ParentType = gtk4::Window;
    }

    impl ObjectImpl for AdminPanel {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();
            obj.setup_ui();
        }
    }

    impl WidgetImpl for AdminPanel {}
    impl WindowImpl for AdminPanel {}
}

glib::wrapper! {
    pub struct AdminPanel(ObjectSubclass<imp::AdminPanel>)
        @extends gtk4::Window, gtk4::Widget,
        @implements gtk4::Accessible, gtk4::Buildable, gtk4::ConstraintTarget,
                    gtk4::Native, gtk4::Root, gtk4::ShortcutManager;
}

impl AdminPanel {
    pub fn new(parent: &impl IsA<gtk4::Window>) -> Self {
        glib::Object::builder()
            .property("title", "Admin Panel")
            .property("modal", true)
            .property("transient-for", parent)
            .property("default-width", 640)
            .property("default-height", 560)
            .build()
    }

    fn setup_ui(&self) {
        let content = gtk4::Box::new(gtk4::Orientation::Vertical, 0);

        let stack = gtk4::Stack::new();
        stack.set_vexpand(true);
        stack.set_transition_type(gtk4::StackTransitionType::None);

        let switcher = gtk4::StackSwitcher::new();
        switcher.set_stack(Some(&stack));

        let header = adw::HeaderBar::new();
        header.set_title_widget(Some(&switcher));

        let refresh_btn = gtk4::Button::from_icon_name("view-refresh-symbolic");
        refresh_btn.set_tooltip_text(Some("Refresh"));
        refresh_btn.connect_clicked(glib::clone!(
            #[weak(rename_to = panel)]
            self,
            move |_| {
                if let Some(cb) = panel.imp().refresh_callback.borrow().as_ref() {
                    cb();
                }
            }
        ));
        header.pack_start(&refresh_btn);

        let spinner = gtk4::Spinner::new();
        spinner.set_visible(false);
        header.pack_start(&spinner);

        content.append(&header);

        // Overview
        let stats = gtk4::Box::new(gtk4::Orientation::Horizontal, 12);
        stats.set_homogeneous(true);
        stats.set_margin_start(24);
        stats.set_margin_end(24);
        stats.set_margin_top(24);
        stats.set_valign(gtk4::Align::Start);
        let (users_card, users_stat) = stat_card("Total Users");
        let (servers_card, servers_stat) = stat_card("Total Servers");
        let (messages_card, messages_stat) = stat_card("Total Messages");
        stats.append(&users_card);
        stats.append(&servers_card);
        stats.append(&messages_card);
        stack.add_titled(&stats, Some("overview"), "Overview");

        let (users_page, users_list) = list_page();
        stack.add_titled(&users_page, Some("users"), "Users");

        let (servers_page, servers_list) = list_page();
        stack.add_titled(&servers_page, Some("servers"), "Servers");

        content.append(&stack);
        self.set_child(Some(&content));

        let imp = self.imp();
        imp.users_stat.replace(Some(users_stat));
        imp.servers_stat.replace(Some(servers_stat));
        imp.messages_stat.replace(Some(messages_stat));
        imp.users_list.replace(Some(users_list));
        imp.servers_list.replace(Some(servers_list));
        imp.spinner.replace(Some(spinner));
    }

    pub fn set_overview(&self, overview: &AdminOverview) {
        let imp = self.imp();

        if let Some(label) = imp.users_stat.borrow().as_ref() {
            label.set_text(&overview.total_users().to_string());
        }
        if let Some(label) = imp.servers_stat.borrow().as_ref() {
            label.set_text(&overview.total_servers().to_string());
        }
        if let Some(label) = imp.messages_stat.borrow().as_ref() {
            label.set_text(&overview.total_messages.to_string());
        }

        if let Some(list) = imp.users_list.borrow().as_ref() {
            clear_list(list);
            let on_delete = imp.delete_user_callback.borrow().clone();
            for user in &overview.users {
                let row = adw::ActionRow::new();
                row.set_title(&glib::markup_escape_text(user.display_label()));
                row.set_subtitle(&glib::markup_escape_text(&format!(
                    "@{} · joined {}",
                    user.username,
                    format_date(&user.created_at)
                )));
                row.add_prefix(&adw::Avatar::new(32, Some(&initials(user.display_label())), true));

                if user.is_owner {
                    let badge = gtk4::Label::new(Some("OWNER"));
                    badge.add_css_class("owner-badge");
                    badge.set_valign(gtk4::Align::Center);
                    row.add_suffix(&badge);
                } else if let Some(cb) = on_delete.clone() {
                    row.add_suffix(&confirm_delete_button(user.id.clone(), cb));
                }
                list.append(&row);
            }
        }

        if let Some(list) = imp.servers_list.borrow().as_ref() {
            clear_list(list);
            let on_delete = imp.delete_server_callback.borrow().clone();
            for server in &overview.servers {
                let row = adw::ActionRow::new();
                row.set_title(&glib::markup_escape_text(&server.name));
                row.set_subtitle(&format!("Created {}", format_date(&server.created_at)));
                row.add_prefix(&adw::Avatar::new(32, Some(&initials(&server.name)), true));
                if let Some(cb) = on_delete.clone() {
                    row.add_suffix(&confirm_delete_button(server.id.clone(), cb));
                }
                list.append(&row);
            }
        }
    }

    pub fn set_loading(&self, loading: bool) {
        if let Some(spinner) = self.imp().spinner.borrow().as_ref() {
            spinner.set_visible(loading);
            if loading {
                spinner.start();
            } else {
                spinner.stop();
            }
        }
    }

    pub fn connect_refresh<F: Fn() + 'static>(&self, callback: F) {
        self.imp()
            .refresh_callback
            .replace(Some(Box::new(callback)));
    }

    pub fn connect_delete_user<F: Fn(String) + 'static>(&self, callback: F) {
        self.imp()
            .delete_user_callback
            .replace(Some(Rc::new(callback)));
    }

    pub fn connect_delete_server<F: Fn(String) + 'static>(&self, callback: F) {
        self.imp()
            .delete_server_callback
            .replace(Some(Rc::new(callback)));
    }
}

impl Default for AdminPanel {
    fn default() -> Self {
        panic!("AdminPanel requires a parent window")
    }
}

fn stat_card(title: &str) -> (gtk4::Box, gtk4::Label) {
    let card = gtk4::Box::new(gtk4::Orientation::Vertical, 4);
    card.add_css_class("card");
    card.add_css_class("stat-card");

    let value = gtk4::Label::new(Some("0"));
    value.add_css_class("title-1");
    card.append(&value);

    let caption = gtk4::Label::new(Some(title));
    caption.add_css_class("dim-label");
    card.append(&caption);

    (card, value)
}

fn list_page() -> (gtk4::ScrolledWindow, gtk4::ListBox) {
    let list = gtk4::ListBox::new();
    list.set_selection_mode(gtk4::SelectionMode::None);
    list.add_css_class("boxed-list");
    list.set_margin_start(24);
    list.set_margin_end(24);
    list.set_margin_top(24);
    list.set_margin_bottom(24);
    list.set_valign(gtk4::Align::Start);

    let scrolled = gtk4::ScrolledWindow::new();
    scrolled.set_policy(gtk4::PolicyType::Never, gtk4::PolicyType::Automatic);
    scrolled.set_child(Some(&list));
    (scrolled, list)
}

/// Trash button that turns into Cancel/Delete before firing
fn confirm_delete_button(id: String, on_delete: Rc<dyn Fn(String)>) -> gtk4::Stack {
    let stack = gtk4::Stack::new();
    stack.set_transition_type(gtk4::StackTransitionType::Crossfade);
    stack.set_valign(gtk4::Align::Center);

    let trash = gtk4::Button::from_icon_name("user-trash-symbolic");
    trash.add_css_class("flat");
    trash.set_tooltip_text(Some("Delete"));
    stack.add_named(&trash, Some("idle"));

    let confirm_box = gtk4::Box::new(gtk4::Orientation::Horizontal, 6);
    let cancel = gtk4::Button::with_label("Cancel");
    cancel.add_css_class("flat");
    confirm_box.append(&cancel);
    let delete = gtk4::Button::with_label("Delete");
    delete.add_css_class("destructive-action");
    confirm_box.append(&delete);
    stack.add_named(&confirm_box, Some("confirm"));

    let stack_weak = stack.downgrade();
    trash.connect_clicked(move |_| {
        if let Some(stack) = stack_weak.upgrade() {
            stack.set_visible_child_name("confirm");
        }
    });
    let stack_weak = stack.downgrade();
    cancel.connect_clicked(move |_| {
        if let Some(stack) = stack_weak.upgrade() {
            stack.set_visible_child_name("idle");
        }
    });
    delete.connect_clicked(move |btn| {
        btn.set_sensitive(false);
        on_delete(id.clone());
    });

    stack
}

fn clear_list(list: &gtk4::ListBox) {
    while let Some(row) = list.row_at_index(0) {
        list.remove(&row);
    }
}
