// SPDX-License-Identifier: MPL-2.0
#![allow(clippy::type_complexity)]

use crate::state::validation::initials;
use crate::supabase::Profile;
use crate::ui::avatar_cache;
use gtk4::glib;
use gtk4::prelude::*;
use gtk4::subclass::prelude::*;
use libadwaita as adw;
use std::cell::RefCell;

mod imp {
    use super::*;

    #[derive(Default)]
    pub struct UserSettingsDialog {
        pub avatar: RefCell<Option<adw::Avatar>>,
        pub username_label: RefCell<Option<gtk4::Label>>,
        pub display_name_entry: RefCell<Option<gtk4::Entry>>,
        pub save_button: RefCell<Option<gtk4::Button>>,
        pub password_entry: RefCell<Option<gtk4::PasswordEntry>>,
        pub confirm_entry: RefCell<Option<gtk4::PasswordEntry>>,
        pub password_button: RefCell<Option<gtk4::Button>>,
        pub error_label: RefCell<Option<gtk4::Label>>,
        pub info_label: RefCell<Option<gtk4::Label>>,
        pub save_callback: RefCell<Option<Box<dyn Fn(String) + 'static>>>,
        pub password_callback: RefCell<Option<Box<dyn Fn(String, String) + 'static>>>,
        pub sign_out_callback: RefCell<Option<Box<dyn Fn() + 'static>>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for UserSettingsDialog {
        const NAME: &'static str = "ParleyUserSettingsDialog";
        type Type = super::UserSettingsDialog;
        type ParentType = gtk4::Window;
    }

    impl ObjectImpl for UserSettingsDialog {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();
            obj.setup_ui();
        }
    }

    impl WidgetImpl for UserSettingsDialog {}
    impl WindowImpl for UserSettingsDialog {}
}

glib::wrapper! {
    pub struct UserSettingsDialog(ObjectSubclass<imp::UserSettingsDialog>)
        @extends gtk4::Window, gtk4::Widget,
        @implements gtk4::Accessible, gtk4::Buildable, gtk4::ConstraintTarget,
                    gtk4::Native, gtk4::Root, gtk4::ShortcutManager;
}

impl UserSettingsDialog {
    pub fn new(parent: &impl IsA<gtk4::Window>, profile: &Profile) -> Self {
        let dialog: Self = glib::Object::builder()
            .property("title", "User Settings")
            .property("modal", true)
            .property("transient-for", parent)
            .property("default-width", 440)
            .property("resizable", false)
            .build();
        dialog.set_profile(profile);
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

        // Profile
        let identity = gtk4::Box::new(gtk4::Orientation::Horizontal, 12);
        let avatar = adw::Avatar::new(56, None, true);
        identity.append(&avatar);
        let username_label = gtk4::Label::new(None);
        username_label.add_css_class("title-4");
        username_label.set_halign(gtk4::Align::Start);
        identity.append(&username_label);
        form_box.append(&identity);

        form_box.append(&field_title("Display Name"));
        let name_row = gtk4::Box::new(gtk4::Orientation::Horizontal, 8);
        let display_name_entry = gtk4::Entry::new();
        display_name_entry.set_hexpand(true);
        display_name_entry.set_placeholder_text(Some("Shown instead of your username"));
        name_row.append(&display_name_entry);
        let save_button = gtk4::Button::with_label("Save");
        save_button.add_css_class("suggested-action");
        name_row.append(&save_button);
        form_box.append(&name_row);

        form_box.append(&gtk4::Separator::new(gtk4::Orientation::Horizontal));

        // Password
        form_box.append(&field_title("New Password"));
        let password_entry = gtk4::PasswordEntry::new();
        password_entry.set_show_peek_icon(true);
        form_box.append(&password_entry);

        form_box.append(&field_title("Confirm New Password"));
        let confirm_entry = gtk4::PasswordEntry::new();
        confirm_entry.set_show_peek_icon(true);
        form_box.append(&confirm_entry);

        let password_button = gtk4::Button::with_label("Change Password");
        password_button.set_halign(gtk4::Align::End);
        password_button.set_sensitive(false);
        form_box.append(&password_button);

        let error_label = gtk4::Label::new(None);
        error_label.set_halign(gtk4::Align::Start);
        error_label.add_css_class("error");
        error_label.set_wrap(true);
        error_label.set_visible(false);
        form_box.append(&error_label);

        let info_label = gtk4::Label::new(None);
        info_label.set_halign(gtk4::Align::Start);
        info_label.add_css_class("success");
        info_label.set_wrap(true);
        info_label.set_visible(false);
        form_box.append(&info_label);

        form_box.append(&gtk4::Separator::new(gtk4::Orientation::Horizontal));

        let sign_out_button = gtk4::Button::with_label("Sign Out");
        sign_out_button.add_css_class("destructive-action");
        form_box.append(&sign_out_button);

        content.append(&form_box);
        self.set_child(Some(&content));

        save_button.connect_clicked(glib::clone!(
            #[weak(rename_to = dialog)]
            self,
            move |_| {
                let name = dialog
                    .imp()
                    .display_name_entry
                    .borrow()
                    .as_ref()
                    .map(|e| e.text().to_string())
                    .unwrap_or_default();
                if let Some(cb) = dialog.imp().save_callback.borrow().as_ref() {
                    cb(name);
                }
            }
        ));

        password_entry.connect_changed(glib::clone!(
            #[weak(rename_to = dialog)]
            self,
            move |_| dialog.update_password_sensitivity(false)
        ));
        confirm_entry.connect_changed(glib::clone!(
            #[weak(rename_to = dialog)]
            self,
            move |_| dialog.update_password_sensitivity(false)
        ));

        password_button.connect_clicked(glib::clone!(
            #[weak(rename_to = dialog)]
            self,
            move |_| {
                let (new, confirm) = dialog.passwords();
                if let Some(cb) = dialog.imp().password_callback.borrow().as_ref() {
                    cb(new, confirm);
                }
            }
        ));

        sign_out_button.connect_clicked(glib::clone!(
            #[weak(rename_to = dialog)]
            self,
            move |_| {
                if let Some(cb) = dialog.imp().sign_out_callback.borrow().as_ref() {
                    cb();
                }
            }
        ));

        let imp = self.imp();
        imp.avatar.replace(Some(avatar));
        imp.username_label.replace(Some(username_label));
        imp.display_name_entry.replace(Some(display_name_entry));
        imp.save_button.replace(Some(save_button));
        imp.password_entry.replace(Some(password_entry));
        imp.confirm_entry.replace(Some(confirm_entry));
        imp.password_button.replace(Some(password_button));
        imp.error_label.replace(Some(error_label));
        imp.info_label.replace(Some(info_label));
    }

    pub fn set_profile(&self, profile: &Profile) {
        let imp = self.imp();
        if let Some(avatar) = imp.avatar.borrow().as_ref() {
            avatar.set_text(Some(&initials(profile.display_label())));
            if let Some(url) = profile.avatar_url.as_deref() {
                avatar_cache::load_avatar(avatar, url);
            }
        }
        if let Some(label) = imp.username_label.borrow().as_ref() {
            label.set_text(&format!("@{}", profile.username));
        }
        if let Some(entry) = imp.display_name_entry.borrow().as_ref() {
            entry.set_text(profile.display_name.as_deref().unwrap_or_default());
        }
    }

    fn passwords(&self) -> (String, String) {
        let imp = self.imp();
        let read = |entry: &RefCell<Option<gtk4::PasswordEntry>>| {
            entry
                .borrow()
                .as_ref()
                .map(|e| e.text().to_string())
                .unwrap_or_default()
        };
        (read(&imp.password_entry), read(&imp.confirm_entry))
    }

    pub fn clear_passwords(&self) {
        let imp = self.imp();
        if let Some(entry) = imp.password_entry.borrow().as_ref() {
            entry.set_text("");
        }
        if let Some(entry) = imp.confirm_entry.borrow().as_ref() {
            entry.set_text("");
        }
    }

    pub fn set_loading(&self, loading: bool) {
        let imp = self.imp();
        if let Some(btn) = imp.save_button.borrow().as_ref() {
            btn.set_sensitive(!loading);
        }
        self.update_password_sensitivity(loading);
    }

    fn update_password_sensitivity(&self, loading: bool) {
        let (new, confirm) = self.passwords();
        if let Some(btn) = self.imp().password_button.borrow().as_ref() {
            btn.set_sensitive(!loading && !new.is_empty() && !confirm.is_empty());
        }
    }

    pub fn show_error(&self, message: &str) {
        let imp = self.imp();
        if let Some(label) = imp.info_label.borrow().as_ref() {
            label.set_visible(false);
        }
        if let Some(label) = imp.error_label.borrow().as_ref() {
            label.set_text(message);
            label.set_visible(true);
        }
    }

    pub fn show_info(&self, message: &str) {
        let imp = self.imp();
        if let Some(label) = imp.error_label.borrow().as_ref() {
            label.set_visible(false);
        }
        if let Some(label) = imp.info_label.borrow().as_ref() {
            label.set_text(message);
            label.set_visible(true);
        }
    }

    pub fn connect_save_display_name<F: Fn(String) + 'static>(&self, callback: F) {
        self.imp().save_callback.replace(Some(Box::new(callback)));
    }

    pub fn connect_change_password<F: Fn(String, String) + 'static>(&self, callback: F) {
        self.imp()
            .password_callback
            .replace(Some(Box::new(callback)));
    }

    pub fn connect_sign_out<F: Fn() + 'static>(&self, callback: F) {
        self.imp()
            .sign_out_callback
            .replace(Some(Box::new(callback)));
    }
}

impl Default for UserSettingsDialog {
    fn default() -> Self {
        panic!("UserSettingsDialog requires a parent window and a profile")
    }
}

fn field_title(text: &str) -> gtk4::Label {
    let label = gtk4::Label::new(Some(text));
    label.set_halign(gtk4::Align::Start);
    label.add_css_class("dim-label");
    label
}
