// SPDX-License-Identifier: MPL-2.0

//! Single-field dialog used to name a new server or channel.

use gtk4::glib;
use gtk4::prelude::*;
use gtk4::subclass::prelude::*;
use libadwaita as adw;

mod imp {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    pub struct NameDialog {
        pub description: RefCell<Option<gtk4::Label>>,
        pub entry: RefCell<Option<gtk4::Entry>>,
        pub create_button: RefCell<Option<gtk4::Button>>,
        pub error_label: RefCell<Option<gtk4::Label>>,
        pub submit_callback: RefCell<Option<Box<dyn Fn(String) + 'static>>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for NameDialog {
        const NAME: &'static str = "ParleyNameDialog";
        type Type = super::NameDialog;
        type ParentType = gtk4::Window;
    }

    impl ObjectImpl for NameDialog {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();
            obj.setup_ui();
        }
    }

    impl WidgetImpl for NameDialog {}
    impl WindowImpl for NameDialog {}
}

glib::wrapper! {
    pub struct NameDialog(ObjectSubclass<imp::NameDialog>)
        @extends gtk4::Window, gtk4::Widget,
        @implements gtk4::Accessible, gtk4::Buildable, gtk4::ConstraintTarget,
                    gtk4::Native, gtk4::Root, gtk4::ShortcutManager;
}

impl NameDialog {
    fn new(parent: &impl IsA<gtk4::Window>, title: &str, description: &str) -> Self {
        let dialog: Self = glib::Object::builder()
            .property("title", title)
            .property("modal", true)
            .property("transient-for", parent)
            .property("default-width", 380)
            .property("resizable", false)
            .build();

        if let Some(label) = dialog.imp().description.borrow().as_ref() {
            label.set_text(description);
        }
        dialog
    }

    pub fn for_server(parent: &impl IsA<gtk4::Window>) -> Self {
        Self::new(
            parent,
            "Create a Server",
            "Your server is where you and your friends hang out.",
        )
    }

    pub fn for_channel(parent: &impl IsA<gtk4::Window>) -> Self {
        Self::new(
            parent,
            "Create Channel",
            "New text channels are added below the existing ones.",
        )
    }

    fn setup_ui(&self) {
        let content = gtk4::Box::new(gtk4::Orientation::Vertical, 0);

        let header = adw::HeaderBar::new();
        header.set_show_start_title_buttons(false);
        header.set_show_end_title_buttons(false);

        let cancel_btn = gtk4::Button::with_label("Cancel");
        cancel_btn.connect_clicked(glib::clone!(
            #[weak(rename_to = dialog)]
            self,
            move |_| {
                dialog.close();
            }
        ));
        header.pack_start(&cancel_btn);

        let create_btn = gtk4::Button::with_label("Create");
        create_btn.add_css_class("suggested-action");
        create_btn.set_sensitive(false);
        header.pack_end(&create_btn);

        content.append(&header);

        let form_box = gtk4::Box::new(gtk4::Orientation::Vertical, 12);
        form_box.set_margin_start(24);
        form_box.set_margin_end(24);
        form_box.set_margin_top(16);
        form_box.set_margin_bottom(24);

        let description = gtk4::Label::new(None);
        description.set_wrap(true);
        description.set_halign(gtk4::Align::Start);
        description.add_css_class("dim-label");
        form_box.append(&description);

        let entry = gtk4::Entry::new();
        entry.set_placeholder_text(Some("Name"));
        form_box.append(&entry);

        let error_label = gtk4::Label::new(None);
        error_label.set_halign(gtk4::Align::Start);
        error_label.add_css_class("error");
        error_label.set_wrap(true);
        error_label.set_visible(false);
        form_box.append(&error_label);

        content.append(&form_box);
        self.set_child(Some(&content));

        let btn_weak = create_btn.downgrade();
        entry.connect_changed(move |entry| {
            if let Some(btn) = btn_weak.upgrade() {
                btn.set_sensitive(!entry.text().trim().is_empty());
            }
        });

        entry.connect_activate(glib::clone!(
            #[weak(rename_to = dialog)]
            self,
            move |_| dialog.emit_submit()
        ));
        create_btn.connect_clicked(glib::clone!(
            #[weak(rename_to = dialog)]
            self,
            move |_| dialog.emit_submit()
        ));

        let imp = self.imp();
        imp.description.replace(Some(description));
        imp.entry.replace(Some(entry));
        imp.create_button.replace(Some(create_btn));
        imp.error_label.replace(Some(error_label));
    }

    fn emit_submit(&self) {
        let imp = self.imp();
        if !imp
            .create_button
            .borrow()
            .as_ref()
            .is_some_and(|b| b.is_sensitive())
        {
            return;
        }

        let name = imp
            .entry
            .borrow()
            .as_ref()
            .map(|e| e.text().trim().to_string())
            .unwrap_or_default();
        if name.is_empty() {
            return;
        }

        if let Some(cb) = imp.submit_callback.borrow().as_ref() {
            cb(name);
        }
    }

    pub fn connect_submit<F: Fn(String) + 'static>(&self, callback: F) {
        self.imp()
            .submit_callback
            .replace(Some(Box::new(callback)));
    }

    pub fn set_loading(&self, loading: bool) {
        let imp = self.imp();
        if let Some(btn) = imp.create_button.borrow().as_ref() {
            btn.set_sensitive(!loading);
        }
        if let Some(entry) = imp.entry.borrow().as_ref() {
            entry.set_sensitive(!loading);
        }
    }

    pub fn show_error(&self, message: &str) {
        if let Some(label) = self.imp().error_label.borrow().as_ref() {
            label.set_text(message);
            label.set_visible(true);
        }
    }

    pub fn hide_error(&self) {
        if let Some(label) = self.imp().error_label.borrow().as_ref() {
            label.set_visible(false);
        }
    }
}
