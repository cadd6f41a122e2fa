// SPDX-License-Identifier: MPL-2.0
#![allow(clippy::type_complexity)]

use crate::supabase::{Server, format_date};
use gtk4::glib;
use gtk4::prelude::*;
use gtk4::subclass::prelude::*;
use libadwaita as adw;

mod imp {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    pub struct ServerSettingsDialog {
        pub name_entry: RefCell<Option<gtk4::Entry>>,
        pub created_label: RefCell<Option<gtk4::Label>>,
        pub delete_button: RefCell<Option<gtk4::Button>>,
        pub owner_only_label: RefCell<Option<gtk4::Label>>,
        pub confirm_box: RefCell<Option<gtk4::Box>>,
        pub confirm_button: RefCell<Option<gtk4::Button>>,
        pub error_label: RefCell<Option<gtk4::Label>>,
        pub delete_callback: RefCell<Option<Box<dyn Fn() + 'static>>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for ServerSettingsDialog {
        const NAME: &'static str = "ParleyServerSettingsDialog";
        type Type = super::ServerSettingsDialog;
        type ParentType = gtk4::Window;
    }

    impl ObjectImpl for ServerSettingsDialog {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();
            obj.setup_ui();
        }
    }

    impl WidgetImpl for ServerSettingsDialog {}
    impl WindowImpl for ServerSettingsDialog {}
}

glib::wrapper! {
    pub struct ServerSettingsDialog(ObjectSubclass<imp::ServerSettingsDialog>)
        @extends gtk4::Window, gtk4::Widget,
        @implements gtk4::Accessible, gtk4::Buildable, gtk4::ConstraintTarget,
                    gtk4::Native, gtk4::Root, gtk4::ShortcutManager;
}

impl ServerSettingsDialog {
    pub fn new(parent: &impl IsA<gtk4::Window>, server: &Server) -> Self {
        let dialog: Self = glib::Object::builder()
            .property("title", "Server Settings")
            .property("modal", true)
            .property("transient-for", parent)
            .property("default-width", 420)
            .property("resizable", false)
            .build();

        let imp = dialog.imp();
        if let Some(entry) = imp.name_entry.borrow().as_ref() {
            entry.set_text(&server.name);
        }
        if let Some(label) = imp.created_label.borrow().as_ref() {
            label.set_text(&format!("Created {}", format_date(&server.created_at)));
        }
        dialog
    }

    fn setup_ui(&self) {
        let content = gtk4::Box::new(gtk4::Orientation::Vertical, 0);

        let header = adw::HeaderBar::new();
        content.append(&header);

        let form_box = gtk4::Box::new(gtk4::Orientation::Vertical, 12);
        form_box.set_margin_start(24);
        form_box.set_margin_end(24);
        form_box.set_margin_top(16);
        form_box.set_margin_bottom(24);

        let name_title = gtk4::Label::new(Some("Server Name"));
        name_title.set_halign(gtk4::Align::Start);
        name_title.add_css_class("dim-label");
        form_box.append(&name_title);

        // Renaming isn't supported
        let name_entry = gtk4::Entry::new();
        name_entry.set_sensitive(false);
        form_box.append(&name_entry);

        let created_label = gtk4::Label::new(None);
        created_label.set_halign(gtk4::Align::Start);
        created_label.add_css_class("caption");
        created_label.add_css_class("dim-label");
        form_box.append(&created_label);

        form_box.append(&gtk4::Separator::new(gtk4::Orientation::Horizontal));

        let danger_title = gtk4::Label::new(Some("Danger Zone"));
        danger_title.set_halign(gtk4::Align::Start);
        danger_title.add_css_class("heading");
        danger_title.add_css_class("error");
        form_box.append(&danger_title);

        let delete_button = gtk4::Button::with_label("Delete Server");
        delete_button.add_css_class("destructive-action");
        form_box.append(&delete_button);

        let owner_only_label = gtk4::Label::new(Some("Only the server owner can delete it."));
        owner_only_label.set_halign(gtk4::Align::Start);
        owner_only_label.add_css_class("dim-label");
        owner_only_label.set_visible(false);
        form_box.append(&owner_only_label);

        let confirm_box = gtk4::Box::new(gtk4::Orientation::Vertical, 8);
        confirm_box.set_visible(false);

        let warning = gtk4::Label::new(Some(
            "Are you sure? This permanently deletes the server with all its channels and messages.",
        ));
        warning.set_wrap(true);
        warning.set_halign(gtk4::Align::Start);
        confirm_box.append(&warning);

        let confirm_buttons = gtk4::Box::new(gtk4::Orientation::Horizontal, 8);
        confirm_buttons.set_homogeneous(true);
        let cancel_button = gtk4::Button::with_label("Cancel");
        confirm_buttons.append(&cancel_button);
        let confirm_button = gtk4::Button::with_label("Delete");
        confirm_button.add_css_class("destructive-action");
        confirm_buttons.append(&confirm_button);
        confirm_box.append(&confirm_buttons);
        form_box.append(&confirm_box);

        let error_label = gtk4::Label::new(None);
        error_label.set_halign(gtk4::Align::Start);
        error_label.add_css_class("error");
        error_label.set_wrap(true);
        error_label.set_visible(false);
        form_box.append(&error_label);

        content.append(&form_box);
        self.set_child(Some(&content));

        delete_button.connect_clicked(glib::clone!(
            #[weak(rename_to = dialog)]
            self,
            move |_| dialog.set_confirming(true)
        ));
        cancel_button.connect_clicked(glib::clone!(
            #[weak(rename_to = dialog)]
            self,
            move |_| dialog.set_confirming(false)
        ));
        confirm_button.connect_clicked(glib::clone!(
            #[weak(rename_to = dialog)]
            self,
            move |_| {
                if let Some(cb) = dialog.imp().delete_callback.borrow().as_ref() {
                    cb();
                }
            }
        ));

        let imp = self.imp();
        imp.name_entry.replace(Some(name_entry));
        imp.created_label.replace(Some(created_label));
        imp.delete_button.replace(Some(delete_button));
        imp.owner_only_label.replace(Some(owner_only_label));
        imp.confirm_box.replace(Some(confirm_box));
        imp.confirm_button.replace(Some(confirm_button));
        imp.error_label.replace(Some(error_label));
    }

    fn set_confirming(&self, confirming: bool) {
        let imp = self.imp();
        if let Some(btn) = imp.delete_button.borrow().as_ref() {
            btn.set_visible(!confirming);
        }
        if let Some(confirm_box) = imp.confirm_box.borrow().as_ref() {
            confirm_box.set_visible(confirming);
        }
    }

    /// Server admins see the settings but can't delete
    pub fn set_can_delete(&self, can_delete: bool) {
        let imp = self.imp();
        if let Some(btn) = imp.delete_button.borrow().as_ref() {
            btn.set_visible(can_delete);
        }
        if let Some(label) = imp.owner_only_label.borrow().as_ref() {
            label.set_visible(!can_delete);
        }
    }

    pub fn set_loading(&self, loading: bool) {
        if let Some(btn) = self.imp().confirm_button.borrow().as_ref() {
            btn.set_sensitive(!loading);
            btn.set_label(if loading { "Deleting…" } else { "Delete" });
        }
    }

    pub fn show_error(&self, message: &str) {
        if let Some(label) = self.imp().error_label.borrow().as_ref() {
            label.set_text(message);
            label.set_visible(true);
        }
    }

    pub fn connect_delete<F: Fn() + 'static>(&self, callback: F) {
        self.imp()
            .delete_callback
            .replace(Some(Box::new(callback)));
    }
}

impl Default for ServerSettingsDialog {
    fn default() -> Self {
        panic!("ServerSettingsDialog requires a parent window and a server")
    }
}
