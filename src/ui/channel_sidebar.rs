// SPDX-License-Identifier: MPL-2.0
#![allow(clippy::type_complexity)]

use crate::supabase::Channel;
use gtk4::glib;
use gtk4::prelude::*;
use gtk4::subclass::prelude::*;

mod imp {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    pub struct ChannelSidebar {
        pub server_name: RefCell<Option<gtk4::Label>>,
        pub settings_btn: RefCell<Option<gtk4::Button>>,
        pub add_channel_btn: RefCell<Option<gtk4::Button>>,
        pub channel_list: RefCell<Option<gtk4::ListBox>>,
        pub channel_ids: RefCell<Vec<String>>,
        pub syncing: Cell<bool>,
        pub channel_selected_callback: RefCell<Option<Box<dyn Fn(String) + 'static>>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for ChannelSidebar {
        const NAME: &'static str = "ParleyChannelSidebar";
        type Type = super::ChannelSidebar;
        type ParentType = gtk4::Box;
    }

    impl ObjectImpl for ChannelSidebar {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();
            obj.setup_ui();
        }
    }

    impl WidgetImpl for ChannelSidebar {}
    impl BoxImpl for ChannelSidebar {}
}

glib::wrapper! {
    pub struct ChannelSidebar(ObjectSubclass<imp::ChannelSidebar>)
        @extends gtk4::Box, gtk4::Widget,
        @implements gtk4::Accessible, gtk4::Buildable, gtk4::ConstraintTarget, gtk4::Orientable;
}

impl ChannelSidebar {
    pub fn new() -> Self {
        glib::Object::builder()
            .property("orientation", gtk4::Orientation::Vertical)
            .property("spacing", 0)
            .build()
    }

    fn setup_ui(&self) {
        self.set_width_request(220);
        self.add_css_class("channel-sidebar");

        let header = gtk4::Box::new(gtk4::Orientation::Horizontal, 6);
        header.set_margin_start(12);
        header.set_margin_end(6);
        header.set_margin_top(10);
        header.set_margin_bottom(10);

        let server_name = gtk4::Label::new(None);
        server_name.add_css_class("heading");
        server_name.set_halign(gtk4::Align::Start);
        server_name.set_hexpand(true);
        server_name.set_ellipsize(gtk4::pango::EllipsizeMode::End);
        header.append(&server_name);

        let settings_btn = gtk4::Button::from_icon_name("emblem-system-symbolic");
        settings_btn.add_css_class("flat");
        settings_btn.set_tooltip_text(Some("Server Settings"));
        settings_btn.set_visible(false);
        header.append(&settings_btn);

        self.append(&header);
        self.append(&gtk4::Separator::new(gtk4::Orientation::Horizontal));

        let section = gtk4::Box::new(gtk4::Orientation::Horizontal, 6);
        section.set_margin_start(12);
        section.set_margin_end(6);
        section.set_margin_top(12);

        let section_label = gtk4::Label::new(Some("TEXT CHANNELS"));
        section_label.add_css_class("caption-heading");
        section_label.add_css_class("dim-label");
        section_label.set_halign(gtk4::Align::Start);
        section_label.set_hexpand(true);
        section.append(&section_label);

        let add_channel_btn = gtk4::Button::from_icon_name("list-add-symbolic");
        add_channel_btn.add_css_class("flat");
        add_channel_btn.set_tooltip_text(Some("Create Channel"));
        add_channel_btn.set_visible(false);
        section.append(&add_channel_btn);

        self.append(&section);

        let channel_list = gtk4::ListBox::new();
        channel_list.set_selection_mode(gtk4::SelectionMode::Single);
        channel_list.add_css_class("navigation-sidebar");
        channel_list.connect_row_selected(glib::clone!(
            #[weak(rename_to = sidebar)]
            self,
            move |_, row| {
                let imp = sidebar.imp();
                if imp.syncing.get() {
                    return;
                }
                let Some(row) = row else {
                    return;
                };
                let id = imp.channel_ids.borrow().get(row.index() as usize).cloned();
                if let Some(id) = id
                    && let Some(cb) = imp.channel_selected_callback.borrow().as_ref()
                {
                    cb(id);
                }
            }
        ));

        let scrolled = gtk4::ScrolledWindow::new();
        scrolled.set_vexpand(true);
        scrolled.set_policy(gtk4::PolicyType::Never, gtk4::PolicyType::Automatic);
        scrolled.set_child(Some(&channel_list));
        self.append(&scrolled);

        let imp = self.imp();
        imp.server_name.replace(Some(server_name));
        imp.settings_btn.replace(Some(settings_btn));
        imp.add_channel_btn.replace(Some(add_channel_btn));
        imp.channel_list.replace(Some(channel_list));
    }

    fn create_channel_row(channel: &Channel) -> gtk4::ListBoxRow {
        let row = gtk4::ListBoxRow::new();
        let row_box = gtk4::Box::new(gtk4::Orientation::Horizontal, 6);

        let hash = gtk4::Label::new(Some("#"));
        hash.add_css_class("dim-label");
        row_box.append(&hash);

        let name = gtk4::Label::new(Some(&channel.name));
        name.set_halign(gtk4::Align::Start);
        name.set_ellipsize(gtk4::pango::EllipsizeMode::End);
        row_box.append(&name);

        row.set_child(Some(&row_box));
        row
    }

    pub fn set_server_name(&self, name: &str) {
        if let Some(label) = self.imp().server_name.borrow().as_ref() {
            label.set_text(name);
        }
    }

    /// Channel and server management is for owners and admins
    pub fn set_can_manage(&self, can_manage: bool) {
        let imp = self.imp();
        if let Some(btn) = imp.add_channel_btn.borrow().as_ref() {
            btn.set_visible(can_manage);
        }
        if let Some(btn) = imp.settings_btn.borrow().as_ref() {
            btn.set_visible(can_manage);
        }
    }

    pub fn set_channels(&self, channels: &[Channel], selected: Option<&str>) {
        let imp = self.imp();
        let Some(list) = imp.channel_list.borrow().clone() else {
            return;
        };

        imp.syncing.set(true);
        while let Some(row) = list.row_at_index(0) {
            list.remove(&row);
        }
        for channel in channels {
            list.append(&Self::create_channel_row(channel));
        }
        imp.channel_ids
            .replace(channels.iter().map(|c| c.id.clone()).collect());
        imp.syncing.set(false);

        self.select_channel(selected);
    }

    pub fn select_channel(&self, channel_id: Option<&str>) {
        let imp = self.imp();
        let Some(list) = imp.channel_list.borrow().clone() else {
            return;
        };

        let index =
            channel_id.and_then(|id| imp.channel_ids.borrow().iter().position(|c| c == id));

        imp.syncing.set(true);
        match index.and_then(|i| list.row_at_index(i as i32)) {
            Some(row) => list.select_row(Some(&row)),
            None => list.unselect_all(),
        }
        imp.syncing.set(false);
    }

    pub fn connect_channel_selected<F: Fn(String) + 'static>(&self, callback: F) {
        self.imp()
            .channel_selected_callback
            .replace(Some(Box::new(callback)));
    }

    pub fn connect_add_channel_clicked<F: Fn() + 'static>(&self, callback: F) {
        if let Some(btn) = self.imp().add_channel_btn.borrow().as_ref() {
            btn.connect_clicked(move |_| callback());
        }
    }

    pub fn connect_settings_clicked<F: Fn() + 'static>(&self, callback: F) {
        if let Some(btn) = self.imp().settings_btn.borrow().as_ref() {
            btn.connect_clicked(move |_| callback());
        }
    }
}

impl Default for ChannelSidebar {
    fn default() -> Self {
        Self::new()
    }
}
